use async_trait::async_trait;
use predict_core::{DeploymentInfo, EventRecord, ModelState, PredictionRequest};
use predict_types::{Address, Bytes, RequestId, U256};

use crate::auth::Signer;
use crate::Result;

/// What the RPC layer needs from a running node. Mutating calls carry the
/// signer recovered from the request; the backend rejects stale nonces.
#[async_trait]
pub trait OracleBackend: Send + Sync {
    async fn request_prediction(&self, caller: Signer, value: U256, input: Bytes) -> Result<RequestId>;

    async fn get_prediction(&self, request_id: RequestId) -> Result<PredictionRequest>;

    async fn fulfill_prediction(
        &self,
        caller: Signer,
        request_id: RequestId,
        result: U256,
        confidence: u64,
    ) -> Result<()>;

    async fn train_model(&self, caller: Signer) -> Result<ModelState>;

    async fn authorize_oracle(&self, caller: Signer, oracle: Address) -> Result<()>;

    async fn revoke_oracle(&self, caller: Signer, oracle: Address) -> Result<()>;

    async fn set_prediction_fee(&self, caller: Signer, fee: U256) -> Result<()>;

    async fn withdraw(&self, caller: Signer) -> Result<U256>;

    async fn prediction_fee(&self) -> Result<U256>;

    async fn owner(&self) -> Result<Address>;

    async fn model_state(&self) -> Result<ModelState>;

    async fn treasury(&self) -> Result<U256>;

    async fn is_authorized(&self, oracle: Address) -> Result<bool>;

    async fn events_since(&self, sequence: u64, limit: usize) -> Result<Vec<EventRecord>>;

    async fn deployment(&self) -> Result<DeploymentInfo>;
}
