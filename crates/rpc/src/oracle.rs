use std::sync::Arc;

use predict_types::{Address, RequestId, U256};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::{authenticate, Signer};
use crate::backend::OracleBackend;
use crate::types::{FulfillmentCall, PredictionCall, RequestAccepted, Withdrawal};
use crate::{Result, RpcError};

/// Default page size of `oracle_getEvents`.
pub const DEFAULT_EVENT_PAGE: usize = 100;
/// Largest page `oracle_getEvents` returns.
pub const MAX_EVENT_PAGE: usize = 1000;

/// The `oracle_` namespace.
pub struct OracleApi {
    backend: Arc<dyn OracleBackend>,
    chain_id: u64,
}

impl OracleApi {
    pub fn new(backend: Arc<dyn OracleBackend>, chain_id: u64) -> Self {
        Self { backend, chain_id }
    }

    fn signer(&self, method: &str, params: &mut Vec<Value>) -> Result<Signer> {
        authenticate(self.chain_id, &format!("oracle_{}", method), params)
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let mut params = positional(params)?;
        debug!("oracle_{} with {} params", method, params.len());

        match method {
            "requestPrediction" => {
                let signer = self.signer(method, &mut params)?;
                let call: PredictionCall = param(&params, 0, "call")?;
                signer.check_sender(&call.from)?;
                let request_id = self
                    .backend
                    .request_prediction(signer, call.value, call.input_data)
                    .await?;
                to_value(RequestAccepted { request_id })
            }
            "getPrediction" => {
                let request_id: RequestId = param(&params, 0, "requestId")?;
                to_value(self.backend.get_prediction(request_id).await?)
            }
            "fulfillPrediction" => {
                let signer = self.signer(method, &mut params)?;
                let call: FulfillmentCall = param(&params, 0, "call")?;
                signer.check_sender(&call.from)?;
                self.backend
                    .fulfill_prediction(signer, call.request_id, call.result, call.confidence)
                    .await?;
                Ok(Value::Bool(true))
            }
            "trainModel" => {
                let signer = self.signer(method, &mut params)?;
                signer.check_sender(&param::<Address>(&params, 0, "from")?)?;
                to_value(self.backend.train_model(signer).await?)
            }
            "authorizeOracle" => {
                let signer = self.signer(method, &mut params)?;
                signer.check_sender(&param::<Address>(&params, 0, "from")?)?;
                let oracle: Address = param(&params, 1, "oracle")?;
                self.backend.authorize_oracle(signer, oracle).await?;
                Ok(Value::Bool(true))
            }
            "revokeOracle" => {
                let signer = self.signer(method, &mut params)?;
                signer.check_sender(&param::<Address>(&params, 0, "from")?)?;
                let oracle: Address = param(&params, 1, "oracle")?;
                self.backend.revoke_oracle(signer, oracle).await?;
                Ok(Value::Bool(true))
            }
            "setPredictionFee" => {
                let signer = self.signer(method, &mut params)?;
                signer.check_sender(&param::<Address>(&params, 0, "from")?)?;
                let fee: U256 = param(&params, 1, "fee")?;
                self.backend.set_prediction_fee(signer, fee).await?;
                Ok(Value::Bool(true))
            }
            "withdraw" => {
                let signer = self.signer(method, &mut params)?;
                signer.check_sender(&param::<Address>(&params, 0, "from")?)?;
                let amount = self.backend.withdraw(signer).await?;
                to_value(Withdrawal {
                    to: signer.address,
                    amount,
                })
            }
            "predictionFee" => to_value(self.backend.prediction_fee().await?),
            "owner" => to_value(self.backend.owner().await?),
            "modelState" => to_value(self.backend.model_state().await?),
            "treasury" => to_value(self.backend.treasury().await?),
            "isAuthorized" => {
                let oracle: Address = param(&params, 0, "oracle")?;
                to_value(self.backend.is_authorized(oracle).await?)
            }
            "getEvents" => {
                let from: u64 = param(&params, 0, "fromSequence")?;
                let limit = match params.get(1) {
                    Some(_) => param::<usize>(&params, 1, "limit")?.min(MAX_EVENT_PAGE),
                    None => DEFAULT_EVENT_PAGE,
                };
                to_value(self.backend.events_since(from, limit).await?)
            }
            "deployment" => to_value(self.backend.deployment().await?),
            _ => Err(RpcError::MethodNotFound(format!("oracle_{}", method))),
        }
    }
}

/// Params are positional; a missing `params` member means none.
pub(crate) fn positional(params: Value) -> Result<Vec<Value>> {
    match params {
        Value::Null => Ok(Vec::new()),
        Value::Array(values) => Ok(values),
        other => Err(RpcError::InvalidParams(format!("expected an array, got {}", other))),
    }
}

pub(crate) fn param<T: DeserializeOwned>(params: &[Value], index: usize, name: &str) -> Result<T> {
    let value = params
        .get(index)
        .ok_or_else(|| RpcError::InvalidParams(format!("Missing {} parameter", name)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| RpcError::InvalidParams(format!("{}: {}", name, e)))
}

pub(crate) fn to_value<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| RpcError::InternalError(e.to_string()))
}
