//! Ed25519 signing primitives: the `sign`/`verify` pair from the external
//! interface in the spec, plus typed wrappers so keys and signatures never
//! get confused with arbitrary byte vectors.

use crate::error::{CryptoError, Result};
use ed25519_dalek::Signer as _;
use ed25519_dalek::Verifier as _;
use serde::{Deserialize, Serialize};

/// An Ed25519 signature, serialized as 64 raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Borrow the raw signature bytes.
    pub fn to_bytes(self) -> [u8; 64] {
        self.0
    }

    /// Parse a signature from a 64-byte slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            field: "signature".into(),
            expected: 64,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

/// An Ed25519 signing (secret) key.
#[derive(Clone, Serialize, Deserialize, zeroize::ZeroizeOnDrop)]
pub struct SigningKey([u8; 32]);

impl SigningKey {
    /// Generate a fresh random signing key.
    pub fn generate() -> Self {
        let key = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        Self(key.to_bytes())
    }

    /// Wrap raw key bytes (e.g. recovered from a lockbox).
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the matching verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        let key = ed25519_dalek::SigningKey::from_bytes(&self.0);
        VerifyingKey(key.verifying_key().to_bytes())
    }

    /// Sign a message, producing a detached signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let key = ed25519_dalek::SigningKey::from_bytes(&self.0);
        Signature(key.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// An Ed25519 verifying (public) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyingKey(pub [u8; 32]);

impl VerifyingKey {
    /// Parse a verifying key from 32 bytes, rejecting points off the curve.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            field: "verifying_key".into(),
            expected: 32,
            actual: bytes.len(),
        })?;
        ed25519_dalek::VerifyingKey::from_bytes(&arr)
            .map_err(|_| CryptoError::SignatureInvalid)?;
        Ok(Self(arr))
    }

    /// Raw key bytes.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Verify a message against a detached signature.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let key =
            ed25519_dalek::VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::SignatureInvalid)?;
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify(message, &sig)
            .map_err(|_| CryptoError::SignatureInvalid)
    }
}

/// Free-standing `sign`/`verify` functions matching the external interface
/// in the spec, for callers that would rather not hold a `SigningKey`.
pub fn sign(message: &[u8], secret: &SigningKey) -> Signature {
    secret.sign(message)
}

/// See [`sign`].
pub fn verify(message: &[u8], signature: &Signature, public: &VerifyingKey) -> bool {
    public.verify(message, signature).is_ok()
}
