//! Signed calls.
//!
//! Every mutating `oracle_` method takes one extra trailing parameter,
//! `{"nonce": n, "signature": "0x…"}`. The signature is a 65-byte `r ‖ s ‖ v`
//! secp256k1 signature over [`call_digest`] of the other parameters, and the
//! signer it recovers to is the caller the node acts for. Nonces must grow
//! per signer; the node rejects any nonce at or below the last one it saw.

use predict_crypto::{keccak256_concat, recover_address, sign_message, SecretKey, Signature};
use predict_types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, RpcError};

/// Trailing parameter of a signed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAuth {
    pub nonce: u64,
    pub signature: Bytes,
}

/// Caller recovered from a signed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    pub address: Address,
    pub nonce: u64,
}

impl Signer {
    /// Reject a call whose claimed sender is not the one that signed it.
    pub fn check_sender(&self, from: &Address) -> Result<()> {
        if self.address != *from {
            return Err(RpcError::Unauthenticated(format!(
                "call from {} is signed by {}",
                from, self.address
            )));
        }
        Ok(())
    }
}

/// `keccak256(chain_id_be8 ‖ method ‖ params ‖ nonce_be8)`, where `params`
/// is the compact JSON array of the call's parameters without the auth
/// parameter, object keys sorted.
pub fn call_digest(chain_id: u64, method: &str, params: &[Value], nonce: u64) -> H256 {
    let body = Value::Array(params.to_vec()).to_string();
    keccak256_concat(&[
        &chain_id.to_be_bytes(),
        method.as_bytes(),
        body.as_bytes(),
        &nonce.to_be_bytes(),
    ])
}

/// Append the auth parameter to `params`, signed with `key`.
pub fn sign_call(
    chain_id: u64,
    method: &str,
    mut params: Vec<Value>,
    nonce: u64,
    key: &SecretKey,
) -> Result<Vec<Value>> {
    let digest = call_digest(chain_id, method, &params, nonce);
    let signature = sign_message(&digest, key).map_err(|e| RpcError::InternalError(e.to_string()))?;
    let auth = CallAuth {
        nonce,
        signature: Bytes::from_slice(&signature.to_bytes()),
    };
    params.push(serde_json::to_value(auth).map_err(|e| RpcError::InternalError(e.to_string()))?);
    Ok(params)
}

/// Take the auth parameter off `params` and recover who signed the rest.
pub fn authenticate(chain_id: u64, method: &str, params: &mut Vec<Value>) -> Result<Signer> {
    let auth = params
        .pop()
        .ok_or_else(|| RpcError::InvalidParams("Missing auth parameter".to_string()))?;
    let auth: CallAuth =
        serde_json::from_value(auth).map_err(|e| RpcError::InvalidParams(format!("auth: {}", e)))?;

    let signature = Signature::from_bytes(auth.signature.as_slice())
        .map_err(|e| RpcError::Unauthenticated(e.to_string()))?;
    let digest = call_digest(chain_id, method, params, auth.nonce);
    let address =
        recover_address(&digest, &signature).map_err(|e| RpcError::Unauthenticated(e.to_string()))?;

    Ok(Signer {
        address,
        nonce: auth.nonce,
    })
}
