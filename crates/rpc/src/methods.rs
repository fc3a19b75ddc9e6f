use std::sync::Arc;
use serde_json::Value;

use crate::backend::OracleBackend;
use crate::net::NetApi;
use crate::oracle::{param, positional, to_value, OracleApi};
use crate::web3::Web3Api;
use crate::{RpcError, RpcRequest, Result};

pub struct RpcHandler {
    oracle_api: OracleApi,
    net_api: NetApi,
    web3_api: Web3Api,
}

impl RpcHandler {
    pub fn new(backend: Arc<dyn OracleBackend>, chain_id: u64, client_version: String) -> Self {
        Self {
            oracle_api: OracleApi::new(backend, chain_id),
            net_api: NetApi::new(chain_id),
            web3_api: Web3Api::new(client_version),
        }
    }

    pub async fn handle_request(&self, request: RpcRequest) -> Result<Value> {
        if request.jsonrpc != "2.0" {
            return Err(RpcError::InvalidRequest);
        }

        let Some((namespace, method)) = request.method.split_once('_') else {
            return Err(RpcError::MethodNotFound(request.method.clone()));
        };
        let params = request.params.unwrap_or(Value::Null);

        match namespace {
            "oracle" => self.oracle_api.call(method, params).await,
            "net" => self.handle_net_method(method).await,
            "web3" => self.handle_web3_method(method, params).await,
            _ => Err(RpcError::MethodNotFound(request.method.clone())),
        }
    }

    async fn handle_net_method(&self, method: &str) -> Result<Value> {
        match method {
            "version" => to_value(self.net_api.version().await?),
            _ => Err(RpcError::MethodNotFound(format!("net_{}", method))),
        }
    }

    async fn handle_web3_method(&self, method: &str, params: Value) -> Result<Value> {
        match method {
            "clientVersion" => to_value(self.web3_api.client_version().await?),
            "sha3" => {
                let params = positional(params)?;
                let data: String = param(&params, 0, "data")?;
                to_value(self.web3_api.sha3(data).await?)
            }
            _ => Err(RpcError::MethodNotFound(format!("web3_{}", method))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::{sign_call, Signer};
    use async_trait::async_trait;
    use predict_core::{CallContext, DeploymentInfo, EventRecord, ModelState, PredictionRequest, Receipt};
    use predict_crypto::{address_from_label, key_address, secret_key_from_label, SecretKey};
    use predict_ledger::{link, OracleAuthority, PredictionLedger};
    use predict_types::{Address, Bytes, RequestId, U256};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct LocalState {
        ledger: PredictionLedger,
        authority: OracleAuthority,
        journal: Vec<EventRecord>,
        nonces: HashMap<Address, u64>,
    }

    impl LocalState {
        fn caller(&mut self, signer: Signer) -> Result<Address> {
            if matches!(self.nonces.get(&signer.address), Some(last) if signer.nonce <= *last) {
                return Err(RpcError::Unauthenticated(format!("stale nonce {}", signer.nonce)));
            }
            self.nonces.insert(signer.address, signer.nonce);
            Ok(signer.address)
        }

        fn record(&mut self, receipt: Receipt) {
            for (emitter, event) in receipt.events {
                let sequence = self.journal.len() as u64;
                self.journal.push(EventRecord { sequence, emitter, event });
            }
        }
    }

    /// In-process backend over a real ledger, without persistence.
    pub(crate) struct LocalBackend {
        state: Mutex<LocalState>,
    }

    pub(crate) fn owner_key() -> SecretKey {
        secret_key_from_label("owner")
    }

    pub(crate) fn owner() -> Address {
        key_address(&owner_key())
    }

    impl LocalBackend {
        pub(crate) fn new() -> Self {
            let owner = owner();
            let mut ledger = PredictionLedger::new(address_from_label("ledger"), owner, "test-model", U256::from(1000));
            let mut authority = OracleAuthority::new(address_from_label("authority"), owner);
            link(&CallContext::new(owner, 0), &mut ledger, &mut authority).unwrap();
            Self {
                state: Mutex::new(LocalState {
                    ledger,
                    authority,
                    journal: Vec::new(),
                    nonces: HashMap::new(),
                }),
            }
        }
    }

    #[async_trait]
    impl OracleBackend for LocalBackend {
        async fn request_prediction(&self, caller: Signer, value: U256, input: Bytes) -> Result<RequestId> {
            let mut state = self.state.lock().unwrap();
            let ctx = CallContext::new(state.caller(caller)?, 1).with_value(value);
            let (id, receipt) = state.ledger.request_prediction(&ctx, input)?;
            state.record(receipt);
            Ok(id)
        }

        async fn get_prediction(&self, request_id: RequestId) -> Result<PredictionRequest> {
            Ok(self.state.lock().unwrap().ledger.get_prediction(&request_id)?)
        }

        async fn fulfill_prediction(&self, caller: Signer, request_id: RequestId, result: U256, confidence: u64) -> Result<()> {
            let mut guard = self.state.lock().unwrap();
            let state = &mut *guard;
            let ctx = CallContext::new(state.caller(caller)?, 2);
            let receipt = state.authority.fulfill_prediction(&ctx, &mut state.ledger, request_id, result, confidence)?;
            state.record(receipt);
            Ok(())
        }

        async fn train_model(&self, caller: Signer) -> Result<ModelState> {
            let mut state = self.state.lock().unwrap();
            let ctx = CallContext::new(state.caller(caller)?, 3);
            state.ledger.train_model(&ctx)?;
            Ok(state.ledger.model_state().clone())
        }

        async fn authorize_oracle(&self, caller: Signer, oracle: Address) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            let ctx = CallContext::new(state.caller(caller)?, 0);
            let receipt = state.ledger.authorize_oracle(&ctx, oracle)?;
            state.record(receipt);
            Ok(())
        }

        async fn revoke_oracle(&self, caller: Signer, oracle: Address) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            let ctx = CallContext::new(state.caller(caller)?, 0);
            state.ledger.revoke_oracle(&ctx, oracle)?;
            Ok(())
        }

        async fn set_prediction_fee(&self, caller: Signer, fee: U256) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            let ctx = CallContext::new(state.caller(caller)?, 0);
            state.ledger.set_prediction_fee(&ctx, fee)?;
            Ok(())
        }

        async fn withdraw(&self, caller: Signer) -> Result<U256> {
            let mut state = self.state.lock().unwrap();
            let ctx = CallContext::new(state.caller(caller)?, 0);
            Ok(state.ledger.withdraw(&ctx)?.0)
        }

        async fn prediction_fee(&self) -> Result<U256> {
            Ok(self.state.lock().unwrap().ledger.prediction_fee())
        }

        async fn owner(&self) -> Result<Address> {
            Ok(self.state.lock().unwrap().ledger.owner())
        }

        async fn model_state(&self) -> Result<ModelState> {
            Ok(self.state.lock().unwrap().ledger.model_state().clone())
        }

        async fn treasury(&self) -> Result<U256> {
            Ok(self.state.lock().unwrap().ledger.treasury())
        }

        async fn is_authorized(&self, oracle: Address) -> Result<bool> {
            Ok(self.state.lock().unwrap().ledger.is_authorized(&oracle))
        }

        async fn events_since(&self, sequence: u64, limit: usize) -> Result<Vec<EventRecord>> {
            let state = self.state.lock().unwrap();
            Ok(state.journal.iter().filter(|r| r.sequence >= sequence).take(limit).cloned().collect())
        }

        async fn deployment(&self) -> Result<DeploymentInfo> {
            let state = self.state.lock().unwrap();
            Ok(DeploymentInfo {
                network: "test".into(),
                chain_id: 1337,
                ledger: state.ledger.address(),
                authority: state.authority.address(),
                owner: state.ledger.owner(),
                model_name: state.ledger.model_state().name.clone(),
                deployed_at: 0,
            })
        }
    }

    pub(crate) fn handler() -> RpcHandler {
        RpcHandler::new(Arc::new(LocalBackend::new()), 1337, "prediction-oracle/test".into())
    }

    /// `params` with the auth parameter for `key` appended.
    pub(crate) fn signed(method: &str, params: Value, key: &SecretKey, nonce: u64) -> Value {
        let params = params.as_array().cloned().unwrap_or_default();
        Value::Array(sign_call(1337, method, params, nonce, key).unwrap())
    }

    async fn call(handler: &RpcHandler, method: &str, params: Value) -> Result<Value> {
        handler
            .handle_request(RpcRequest {
                jsonrpc: "2.0".into(),
                method: method.into(),
                params: Some(params),
                id: Some(json!(1)),
            })
            .await
    }

    #[tokio::test]
    async fn test_request_and_fulfill_over_rpc() {
        let handler = handler();
        let owner = owner().to_string();
        let oracle_key = secret_key_from_label("oracle");
        let oracle = key_address(&oracle_key).to_string();

        let params = signed("oracle_authorizeOracle", json!([owner, oracle]), &owner_key(), 1);
        call(&handler, "oracle_authorizeOracle", params).await.unwrap();

        let params = signed(
            "oracle_requestPrediction",
            json!([{ "from": owner, "value": "0x3e8", "inputData": "0x5b312e305d" }]),
            &owner_key(),
            2,
        );
        let accepted = call(&handler, "oracle_requestPrediction", params).await.unwrap();
        let request_id = accepted["requestId"].clone();

        let params = signed(
            "oracle_fulfillPrediction",
            json!([{ "from": oracle, "requestId": request_id, "result": "0x4e2", "confidence": 85 }]),
            &oracle_key,
            1,
        );
        let ok = call(&handler, "oracle_fulfillPrediction", params).await.unwrap();
        assert_eq!(ok, json!(true));

        let stored = call(&handler, "oracle_getPrediction", json!([request_id])).await.unwrap();
        assert_eq!(stored["fulfilled"], json!(true));
        assert_eq!(stored["result"], json!("0x4e2"));
        assert_eq!(stored["confidence"], json!(85));

        let events = call(&handler, "oracle_getEvents", json!([0])).await.unwrap();
        assert_eq!(events.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_claiming_another_sender_is_rejected() {
        let handler = handler();
        let owner = owner().to_string();
        let attacker_key = secret_key_from_label("attacker");
        let attacker = key_address(&attacker_key).to_string();

        let params = signed(
            "oracle_requestPrediction",
            json!([{ "from": attacker, "value": "0x3e8", "inputData": "0x00" }]),
            &attacker_key,
            1,
        );
        call(&handler, "oracle_requestPrediction", params).await.unwrap();

        let params = signed("oracle_withdraw", json!([owner]), &attacker_key, 2);
        let err = call(&handler, "oracle_withdraw", params).await.unwrap_err();
        assert_eq!(err.code(), -32010);
        assert!(matches!(err, RpcError::Unauthenticated(_)));

        let params = signed("oracle_authorizeOracle", json!([owner, attacker]), &attacker_key, 3);
        let err = call(&handler, "oracle_authorizeOracle", params).await.unwrap_err();
        assert_eq!(err.code(), -32010);

        // A bare `from` is not accepted either.
        let err = call(&handler, "oracle_withdraw", json!([owner])).await.unwrap_err();
        assert_eq!(err.code(), -32602);

        assert_eq!(call(&handler, "oracle_treasury", Value::Null).await.unwrap(), json!("0x3e8"));
        assert_eq!(
            call(&handler, "oracle_isAuthorized", json!([attacker])).await.unwrap(),
            json!(false)
        );
    }

    #[tokio::test]
    async fn test_replayed_call_is_rejected() {
        let handler = handler();
        let params = signed("oracle_setPredictionFee", json!([owner().to_string(), "0x10"]), &owner_key(), 5);

        call(&handler, "oracle_setPredictionFee", params.clone()).await.unwrap();
        let err = call(&handler, "oracle_setPredictionFee", params).await.unwrap_err();
        assert!(matches!(err, RpcError::Unauthenticated(_)));

        let older = signed("oracle_setPredictionFee", json!([owner().to_string(), "0x20"]), &owner_key(), 4);
        assert!(call(&handler, "oracle_setPredictionFee", older).await.is_err());
        assert_eq!(call(&handler, "oracle_predictionFee", Value::Null).await.unwrap(), json!("0x10"));
    }

    #[tokio::test]
    async fn test_ledger_errors_keep_their_codes() {
        let handler = handler();
        let stranger_key = secret_key_from_label("stranger");
        let stranger = key_address(&stranger_key).to_string();

        let params = signed("oracle_withdraw", json!([stranger]), &stranger_key, 1);
        let err = call(&handler, "oracle_withdraw", params).await.unwrap_err();
        assert_eq!(err.code(), -32010);
        assert!(matches!(err, RpcError::Oracle(_)));

        let params = signed(
            "oracle_requestPrediction",
            json!([{ "from": stranger, "value": "0x1", "inputData": "0x" }]),
            &stranger_key,
            2,
        );
        let err = call(&handler, "oracle_requestPrediction", params).await.unwrap_err();
        assert_eq!(err.code(), -32011);

        let missing = format!("0x{}", "ab".repeat(32));
        let err = call(&handler, "oracle_getPrediction", json!([missing])).await.unwrap_err();
        assert_eq!(err.code(), -32012);

        let params = signed("oracle_withdraw", json!([owner().to_string()]), &owner_key(), 1);
        let err = call(&handler, "oracle_withdraw", params).await.unwrap_err();
        assert_eq!(err.code(), -32014);
    }

    #[tokio::test]
    async fn test_wide_confidence_maps_to_range_error() {
        let handler = handler();
        let owner = owner().to_string();
        let params = signed("oracle_authorizeOracle", json!([owner, owner]), &owner_key(), 1);
        call(&handler, "oracle_authorizeOracle", params).await.unwrap();
        let params = signed(
            "oracle_requestPrediction",
            json!([{ "from": owner, "value": "0x3e8", "inputData": "0x00" }]),
            &owner_key(),
            2,
        );
        let request_id = call(&handler, "oracle_requestPrediction", params).await.unwrap()["requestId"].clone();

        let params = signed(
            "oracle_fulfillPrediction",
            json!([{ "from": owner, "requestId": request_id, "result": "0x1", "confidence": 300 }]),
            &owner_key(),
            3,
        );
        let err = call(&handler, "oracle_fulfillPrediction", params).await.unwrap_err();
        assert_eq!(err.code(), -32016);
        assert_eq!(err.data(), Some(json!("ConfidenceOutOfRange")));
    }

    #[tokio::test]
    async fn test_namespaces() {
        let handler = handler();
        assert_eq!(
            call(&handler, "web3_clientVersion", Value::Null).await.unwrap(),
            json!("prediction-oracle/test")
        );
        assert_eq!(call(&handler, "net_version", Value::Null).await.unwrap(), json!("1337"));
        assert_eq!(
            call(&handler, "oracle_deployment", Value::Null).await.unwrap()["chainId"],
            json!(1337)
        );
        let hash = call(&handler, "web3_sha3", json!(["0x"])).await.unwrap();
        assert_eq!(
            hash,
            json!("0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );

        let err = call(&handler, "admin_nodeInfo", Value::Null).await.unwrap_err();
        assert_eq!(err.code(), -32601);
        let err = call(&handler, "oracle_selfDestruct", Value::Null).await.unwrap_err();
        assert_eq!(err.code(), -32601);
        let err = call(&handler, "noNamespace", Value::Null).await.unwrap_err();
        assert_eq!(err.code(), -32601);
    }
}
