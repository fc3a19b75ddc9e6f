use predict_types::{Address, RequestId, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Capability an operation demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// The identity that deployed the ledger.
    Owner,
    /// The oracle authority linked to the ledger.
    Relay,
    /// A member of the authorized fulfiller set.
    Fulfiller,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Relay => write!(f, "linked relay"),
            Role::Fulfiller => write!(f, "authorized fulfiller"),
        }
    }
}

/// Typed rejection. Every variant aborts the operation with no state change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("Unauthorized: {caller} is not the {required}")]
    Unauthorized { caller: Address, required: Role },

    #[error("Insufficient fee: required {required} wei, paid {paid} wei")]
    InsufficientFee { required: U256, paid: U256 },

    #[error("Prediction request {0:?} not found")]
    NotFound(RequestId),

    #[error("Prediction request {0:?} already fulfilled")]
    AlreadyFulfilled(RequestId),

    #[error("Nothing to withdraw")]
    NothingToWithdraw,

    #[error("Ledger and authority are not linked")]
    NotLinked,

    #[error("Component is already linked")]
    AlreadyLinked,

    #[error("Confidence {0} is out of range (0-100)")]
    ConfidenceOutOfRange(u64),

    #[error("Request id {0:?} already exists")]
    RequestIdCollision(RequestId),

    #[error("Treasury balance overflow")]
    TreasuryOverflow,
}

impl OracleError {
    /// Stable variant name, for wire error payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OracleError::Unauthorized { .. } => "Unauthorized",
            OracleError::InsufficientFee { .. } => "InsufficientFee",
            OracleError::NotFound(_) => "NotFound",
            OracleError::AlreadyFulfilled(_) => "AlreadyFulfilled",
            OracleError::NothingToWithdraw => "NothingToWithdraw",
            OracleError::NotLinked => "NotLinked",
            OracleError::AlreadyLinked => "AlreadyLinked",
            OracleError::ConfidenceOutOfRange(_) => "ConfidenceOutOfRange",
            OracleError::RequestIdCollision(_) => "RequestIdCollision",
            OracleError::TreasuryOverflow => "TreasuryOverflow",
        }
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
