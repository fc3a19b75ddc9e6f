use predict_types::Address;
use serde::{Deserialize, Serialize};

/// Where a ledger/authority pair lives and who deployed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub network: String,
    pub chain_id: u64,
    pub ledger: Address,
    pub authority: Address,
    pub owner: Address,
    pub model_name: String,
    pub deployed_at: u64,
}
