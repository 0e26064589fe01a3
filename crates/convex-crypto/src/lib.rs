//! # Convex Crypto - Key Pairs and Cell Signing
//!
//! Ed25519 signing and verification over cell hashes. A signature always
//! covers the 32-byte SHA3-256 identity of the signed cell, so verifying
//! a `SignedData` needs only the payload's hash, never its full bytes.
//!
//! ## Security Properties
//!
//! - Deterministic nonces: no RNG dependency during signing
//! - Key material zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

use convex_types::{AccountKey, Hash, SignedData, Signature, Value};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;
use zeroize::Zeroize;

/// Errors from key handling and signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Bytes do not form a valid Ed25519 public key point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Signature does not verify against the key and message.
    #[error("signature verification failed")]
    BadSignature,
}

/// An Ed25519 key pair.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a random key pair.
    #[must_use]
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Deterministic key pair from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// The public account key.
    #[must_use]
    pub fn account_key(&self) -> AccountKey {
        AccountKey::new(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign raw bytes (deterministic).
    #[must_use]
    pub fn sign_bytes(&self, message: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(message).to_bytes())
    }

    /// Sign a cell hash.
    #[must_use]
    pub fn sign_hash(&self, hash: &Hash) -> Signature {
        self.sign_bytes(hash.as_bytes())
    }

    /// Wrap a cell as signed data, signing its hash.
    #[must_use]
    pub fn sign_cell(&self, value: Value) -> SignedData {
        let sig = self.sign_hash(&value.cell_hash());
        SignedData::new(self.account_key(), sig, value)
    }

    /// The secret seed, for storage by external key management.
    #[must_use]
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

/// Verify a signature over raw bytes.
pub fn verify(key: &AccountKey, message: &[u8], sig: &Signature) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_bytes(key.as_bytes()).map_err(|_| CryptoError::InvalidPublicKey)?;
    let dalek_sig = ed25519_dalek::Signature::from_bytes(sig.as_bytes());
    verifying_key
        .verify(message, &dalek_sig)
        .map_err(|_| CryptoError::BadSignature)
}

/// Verify a signed cell: the signature must cover the payload's hash
/// under the embedded key.
pub fn verify_signed(signed: &SignedData) -> Result<(), CryptoError> {
    let hash = signed.value().cell_hash();
    verify(signed.key(), hash.as_bytes(), signed.signature())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let kp = KeyPair::generate();
        let sig = kp.sign_bytes(b"message");
        assert!(verify(&kp.account_key(), b"message", &sig).is_ok());
        assert!(verify(&kp.account_key(), b"other", &sig).is_err());
    }

    #[test]
    fn test_seed_deterministic() {
        let a = KeyPair::from_seed([7u8; 32]);
        let b = KeyPair::from_seed([7u8; 32]);
        assert_eq!(a.account_key(), b.account_key());
        assert_eq!(a.sign_bytes(b"x"), b.sign_bytes(b"x"));
    }

    #[test]
    fn test_signed_cell_roundtrip() {
        let kp = KeyPair::from_seed([1u8; 32]);
        let signed = kp.sign_cell(Value::Long(42));
        assert!(verify_signed(&signed).is_ok());

        // Tampering with the payload breaks verification.
        let forged = SignedData::new(
            *signed.key(),
            *signed.signature(),
            Value::Long(43),
        );
        assert!(verify_signed(&forged).is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let kp = KeyPair::from_seed([1u8; 32]);
        let other = KeyPair::from_seed([2u8; 32]);
        let signed = kp.sign_cell(Value::Long(1));
        let moved = SignedData::new(
            other.account_key(),
            *signed.signature(),
            Value::Long(1),
        );
        assert!(verify_signed(&moved).is_err());
    }
}
