//! Content hashing and base58 encoding for hash-addressed graph data.
//!
//! The hash algorithm is declared once here; code elsewhere never imports
//! `blake3` directly, so swapping algorithms only touches this module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte content hash, the unique identifier of a [`crate::Link`](../../concord_graph/struct.Link.html).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Wrap a raw 32-byte digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as base58, the wire/debug representation used for link ids.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Decode from a base58 string.
    pub fn from_base58(s: &str) -> Option<Self> {
        let bytes = bs58::decode(s).into_vec().ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_base58())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

/// Hash `data` under a domain-separation `scope` tag.
///
/// Two calls with different `scope` values never collide even on identical
/// `data`, which keeps link hashes, lockbox ids, and invitation ids in
/// disjoint namespaces despite sharing one algorithm.
pub fn hash(scope: &str, data: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new_derive_key(scope);
    hasher.update(data);
    Hash(*hasher.finalize().as_bytes())
}

/// Generate a random 32-byte key (team keyset material, session-key halves).
pub fn random_key() -> [u8; 32] {
    use rand_core::RngCore;
    let mut out = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut out);
    out
}
