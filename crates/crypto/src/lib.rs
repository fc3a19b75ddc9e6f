use sha3::{Digest, Keccak256};
use thiserror::Error;
use predict_types::{Address, H256, RequestId, UintExt, U256};

pub mod signature;
pub use signature::*;
pub use secp256k1::SecretKey;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Compute the Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

/// Compute the Keccak-256 hash of multiple slices of data
pub fn keccak256_concat(data: &[&[u8]]) -> H256 {
    let mut hasher = Keccak256::new();
    for slice in data {
        hasher.update(slice);
    }
    H256::from_slice(&hasher.finalize())
}

/// Derive the id of a prediction request.
///
/// `nonce` is the ledger's request counter and never repeats for a given
/// ledger, so ids are unique by construction; hashing in the ledger address,
/// requester, payload and timestamp keeps them unguessable and distinct
/// across deployments.
pub fn request_id(
    ledger: &Address,
    requester: &Address,
    input: &[u8],
    nonce: u64,
    timestamp: u64,
) -> RequestId {
    let nonce_word = U256::from(nonce).to_be_bytes32();

    keccak256_concat(&[
        ledger.as_bytes(),
        requester.as_bytes(),
        input,
        &nonce_word,
        &timestamp.to_be_bytes(),
    ])
}

/// Deterministic address for the `nonce`-th component created by `deployer`.
pub fn component_address(deployer: &Address, nonce: u64) -> Address {
    let hash = keccak256_concat(&[deployer.as_bytes(), &nonce.to_be_bytes()]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

/// Address derived from a human-readable label. Used for well-known dev
/// identities in configuration presets and tests.
pub fn address_from_label(label: &str) -> Address {
    let hash = keccak256(label.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}
