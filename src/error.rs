use predict_core::OracleError;
use predict_rpc::RpcError;
use predict_storage::StorageError;
use predict_types::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    /// The ledger or authority rejected the call; nothing changed.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A signed call reused a nonce; nothing changed.
    #[error("Stale nonce {nonce} from {signer}: last used {last}")]
    StaleNonce { signer: Address, nonce: u64, last: u64 },

    #[error("Invalid deployment configuration: {0}")]
    Config(String),

    #[error("Node has shut down")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, NodeError>;

impl From<NodeError> for RpcError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Oracle(err) => RpcError::Oracle(err),
            err @ NodeError::StaleNonce { .. } => RpcError::Unauthenticated(err.to_string()),
            other => RpcError::InternalError(other.to_string()),
        }
    }
}
