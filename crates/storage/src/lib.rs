use thiserror::Error;
use predict_types::{Address, RequestId};

pub mod traits;
pub mod memory;
pub mod rocksdb;
pub mod store;

pub use traits::*;
pub use memory::*;
pub use rocksdb::*;
pub use store::{OracleStore, StoredState};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Key-value pair type alias
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// One prefix byte per record family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    Request = 0x00,
    Model = 0x01,
    Fee = 0x02,
    Treasury = 0x03,
    Authorized = 0x04,
    LedgerMeta = 0x05,
    Authority = 0x06,
    Event = 0x07,
    Deployment = 0x08,
    Nonce = 0x09,
}

impl KeyPrefix {
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    pub fn make_key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + suffix.len());
        key.push(self.as_byte());
        key.extend_from_slice(suffix);
        key
    }
}

/// Key builders for every record the node persists.
pub mod keys {
    use super::*;

    pub fn request_key(id: &RequestId) -> Vec<u8> {
        KeyPrefix::Request.make_key(id.as_bytes())
    }

    pub fn model_key(ledger: &Address) -> Vec<u8> {
        KeyPrefix::Model.make_key(ledger.as_bytes())
    }

    pub fn fee_key(ledger: &Address) -> Vec<u8> {
        KeyPrefix::Fee.make_key(ledger.as_bytes())
    }

    pub fn treasury_key(ledger: &Address) -> Vec<u8> {
        KeyPrefix::Treasury.make_key(ledger.as_bytes())
    }

    pub fn authorized_key(ledger: &Address) -> Vec<u8> {
        KeyPrefix::Authorized.make_key(ledger.as_bytes())
    }

    /// There is one ledger per store, so its meta lives under the bare prefix.
    pub fn ledger_meta_key() -> Vec<u8> {
        KeyPrefix::LedgerMeta.make_key(&[])
    }

    pub fn authority_key() -> Vec<u8> {
        KeyPrefix::Authority.make_key(&[])
    }

    pub fn deployment_key() -> Vec<u8> {
        KeyPrefix::Deployment.make_key(&[])
    }

    /// Last nonce used by a signer.
    pub fn nonce_key(signer: &Address) -> Vec<u8> {
        KeyPrefix::Nonce.make_key(signer.as_bytes())
    }

    /// Big-endian so journal order is key order.
    pub fn event_key(sequence: u64) -> Vec<u8> {
        KeyPrefix::Event.make_key(&sequence.to_be_bytes())
    }

    pub fn sequence_from_event_key(key: &[u8]) -> Option<u64> {
        if key.len() != 9 || key[0] != KeyPrefix::Event.as_byte() {
            return None;
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&key[1..]);
        Some(u64::from_be_bytes(bytes))
    }
}
