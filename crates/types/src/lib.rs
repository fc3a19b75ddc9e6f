pub mod address;
pub mod amount;
pub mod bytes;
pub mod hash;
pub mod uint;

pub use address::Address;
pub use amount::{format_ether, parse_ether, WEI_PER_ETHER};
pub use bytes::Bytes;
pub use hash::{H160, H256};
pub use uint::{UintExt, U256};

use thiserror::Error;

/// Identifier minted for every accepted prediction request.
pub type RequestId = H256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid address checksum")]
    InvalidChecksum,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Overflow in arithmetic operation")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, TypesError>;
