//! # concord-crypto
//!
//! Primitive cryptographic wrapper (sign/verify, AEAD, sealed asymmetric
//! encryption, content hashing, base58) plus the lockbox-based key
//! distribution scheme used to propagate team key material.
//!
//! Every type here is `Send + Sync` and free of interior mutability; the
//! crate contains no I/O and no global state.

#![forbid(unsafe_code)]

pub mod error;
pub mod hash;
pub mod lockbox;
pub mod scope;
pub mod sealed;
pub mod signing;

pub use error::{CryptoError, Result};
pub use hash::{hash, random_key, Hash};
pub use lockbox::{create as create_lockbox, open as open_lockbox, rotate as rotate_lockbox, visible_scopes, Lockbox};
pub use scope::{KeyScope, Keyset, KeysetRef, KeysetWithSecrets, ScopeType};
pub use sealed::{
    decrypt as symmetric_decrypt, encrypt as symmetric_encrypt, open as open_sealed, seal,
    seal_with_sender, SealPublicKey, SealSecretKey, Sealed, SymmetricKey,
};
pub use signing::{sign, verify, Signature, SigningKey, VerifyingKey};
