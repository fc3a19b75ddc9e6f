//! JSON-RPC surface for a prediction oracle node.

use predict_core::OracleError;
use serde_json::Value;
use thiserror::Error;

pub mod auth;
pub mod backend;
pub mod methods;
pub mod net;
pub mod oracle;
pub mod server;
pub mod types;
pub mod web3;

pub use auth::{authenticate, call_digest, sign_call, CallAuth, Signer};
pub use backend::OracleBackend;
pub use methods::RpcHandler;
pub use axum::http::HeaderValue;
pub use server::{dispatch, RpcServer};
pub use types::*;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid request")]
    InvalidRequest,

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    /// The call's signature is missing, malformed, stale, or not from the
    /// claimed sender.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::InvalidRequest => -32600,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidParams(_) => -32602,
            RpcError::InternalError(_) => -32603,
            RpcError::ParseError(_) => -32700,
            RpcError::Unauthenticated(_) => -32010,
            RpcError::Oracle(err) => match err {
                OracleError::Unauthorized { .. } => -32010,
                OracleError::InsufficientFee { .. } => -32011,
                OracleError::NotFound(_) => -32012,
                OracleError::AlreadyFulfilled(_) => -32013,
                OracleError::NothingToWithdraw => -32014,
                OracleError::NotLinked => -32015,
                _ => -32016,
            },
        }
    }

    /// Machine-readable detail for ledger rejections.
    pub fn data(&self) -> Option<Value> {
        match self {
            RpcError::Oracle(err) => Some(Value::String(err.kind().to_string())),
            RpcError::Unauthenticated(_) => Some(Value::from("Unauthenticated")),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
