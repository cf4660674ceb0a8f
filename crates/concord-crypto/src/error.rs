//! Error taxonomy for cryptographic operations.

use serde::{Deserialize, Serialize};

/// Errors raised by primitive crypto, keyset, and lockbox operations.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// A key, signature, or nonce did not have the expected byte length.
    #[error("invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        /// Name of the offending field.
        field: String,
        /// Expected byte length.
        expected: usize,
        /// Actual byte length supplied.
        actual: usize,
    },

    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// AEAD or sealed-box decryption failed (bad key or tampered ciphertext).
    #[error("decryption failed")]
    DecryptionFailed,

    /// A lockbox's recipient keyset generation does not match the opener's.
    #[error("lockbox recipient generation mismatch: expected {expected}, got {actual}")]
    GenerationMismatch {
        /// Generation the lockbox was addressed to.
        expected: u64,
        /// Generation the opener attempted to use.
        actual: u64,
    },
}

/// Result alias used throughout `concord-crypto`.
pub type Result<T> = std::result::Result<T, CryptoError>;
