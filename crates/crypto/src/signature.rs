use crate::{keccak256, CryptoError, Result};
use predict_types::{Address, H256};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, Secp256k1, SecretKey,
};

/// ECDSA signature with recovery ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: H256,
    pub s: H256,
    pub v: u8,
}

impl Signature {
    /// Compact representation (65 bytes: r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(self.r.as_bytes());
        bytes[32..64].copy_from_slice(self.s.as_bytes());
        bytes[64] = self.v;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignature);
        }
        Ok(Signature {
            r: H256::from_slice(&bytes[0..32]),
            s: H256::from_slice(&bytes[32..64]),
            v: bytes[64],
        })
    }
}

/// Sign a 32-byte digest with a private key
pub fn sign_message(message: &H256, private_key: &SecretKey) -> Result<Signature> {
    let secp = Secp256k1::new();
    let message = Message::from_slice(message.as_bytes())?;
    let (recovery_id, sig_bytes) = secp
        .sign_ecdsa_recoverable(&message, private_key)
        .serialize_compact();

    Ok(Signature {
        r: H256::from_slice(&sig_bytes[0..32]),
        s: H256::from_slice(&sig_bytes[32..64]),
        v: recovery_id.to_i32() as u8 + 27,
    })
}

/// Recover the public key that produced `signature` over `message`
pub fn recover_public_key(message: &H256, signature: &Signature) -> Result<PublicKey> {
    let secp = Secp256k1::new();
    let message = Message::from_slice(message.as_bytes())?;

    let recovery_id = RecoveryId::from_i32(i32::from(signature.v) - 27)
        .map_err(|_| CryptoError::InvalidSignature)?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[0..32].copy_from_slice(signature.r.as_bytes());
    sig_bytes[32..64].copy_from_slice(signature.s.as_bytes());

    let recoverable_sig = RecoverableSignature::from_compact(&sig_bytes, recovery_id)?;
    Ok(secp.recover_ecdsa(&message, &recoverable_sig)?)
}

/// Recover the address of the signer
pub fn recover_address(message: &H256, signature: &Signature) -> Result<Address> {
    let public_key = recover_public_key(message, signature)?;
    Ok(public_key_to_address(&public_key))
}

/// Last 20 bytes of the hash of the uncompressed key, without its 0x04 tag.
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let hash = keccak256(&public_key.serialize_uncompressed()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

pub fn key_address(private_key: &SecretKey) -> Address {
    public_key_to_address(&PublicKey::from_secret_key(&Secp256k1::new(), private_key))
}

/// Deterministic key for a human-readable label. Development identities
/// only: anyone who knows the label holds the key.
pub fn secret_key_from_label(label: &str) -> SecretKey {
    let mut seed = keccak256(label.as_bytes());
    loop {
        // Out of range for roughly one seed in 2^128.
        if let Ok(key) = SecretKey::from_slice(seed.as_bytes()) {
            return key;
        }
        seed = keccak256(seed.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_recover() {
        let private_key = SecretKey::from_slice(&[0x01; 32]).unwrap();
        let message = H256::from_slice(&[0x02; 32]);

        let signature = sign_message(&message, &private_key).unwrap();
        assert_eq!(recover_address(&message, &signature).unwrap(), key_address(&private_key));

        let other = H256::from_slice(&[0x03; 32]);
        assert_ne!(recover_address(&other, &signature).unwrap(), key_address(&private_key));
    }

    #[test]
    fn test_public_key_to_address() {
        // Test vector from the Ethereum yellow paper
        let private_key = SecretKey::from_slice(
            &hex::decode("c85ef7d79691fe79573b1a7064c19c1a9819ebdbd1faaab1a8ec92344438aaf4").unwrap(),
        )
        .unwrap();
        assert_eq!(
            hex::encode(key_address(&private_key).as_bytes()),
            "cd2a3d9f938e13cd947ec05abc7fe734df8dd826"
        );
    }

    #[test]
    fn test_signature_bytes() {
        let private_key = secret_key_from_label("signer");
        let sig = sign_message(&H256::from_slice(&[0x07; 32]), &private_key).unwrap();
        assert_eq!(Signature::from_bytes(&sig.to_bytes()).unwrap(), sig);
        assert!(matches!(Signature::from_bytes(&[0u8; 64]), Err(CryptoError::InvalidSignature)));
    }

    #[test]
    fn test_bad_recovery_id() {
        let mut sig = sign_message(&H256::from_slice(&[0x07; 32]), &secret_key_from_label("signer")).unwrap();
        sig.v = 3;
        assert!(recover_address(&H256::from_slice(&[0x07; 32]), &sig).is_err());
    }

    #[test]
    fn test_label_keys_are_stable() {
        assert_eq!(
            key_address(&secret_key_from_label("owner")),
            key_address(&secret_key_from_label("owner"))
        );
        assert_ne!(
            key_address(&secret_key_from_label("owner")),
            key_address(&secret_key_from_label("fulfiller"))
        );
    }
}
