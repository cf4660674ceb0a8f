//! A single signed, encrypted entry in the team graph.

use concord_crypto::{hash, KeyScope, Signature, SigningKey, VerifyingKey};
use concord_crypto::Hash;
use serde::{Deserialize, Serialize};

/// The unencrypted shape of a link, before it is sealed into the graph.
///
/// `prev` lists the predecessor hashes present at the author's moment of
/// authorship — this is what forms the DAG (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkBody {
    /// Tag identifying which `TeamAction` variant `payload` decodes to.
    pub action_type: String,
    /// Opaque, caller-defined action payload (the encoded `TeamAction`).
    pub payload: Vec<u8>,
    /// Scope of the user who authored this link.
    pub user: KeyScope,
    /// Scope of the device that authored this link.
    pub device: KeyScope,
    /// Author's wall-clock timestamp (Lamport-adjacent, not authoritative).
    pub timestamp: u64,
    /// Predecessor hashes: the graph's head as seen by the author.
    pub prev: Vec<Hash>,
    /// Team-keyset generation the body was encrypted under.
    pub key_generation: u64,
}

/// One immutable, signed, encrypted entry in a [`crate::Graph`].
///
/// `hash` is the content hash of the encrypted body and is the link's
/// unique id; `signature` is over that hash, made with the author
/// device's signing secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// Content hash of the encrypted body — this link's unique id.
    pub hash: Hash,
    /// Signature over `hash`, made by the author device.
    pub signature: Signature,
    /// The scope (device) that produced `signature`.
    pub signer: KeyScope,
}

/// Domain tag used when hashing encrypted link bodies, keeping link hashes
/// in a namespace disjoint from lockbox ids and invitation ids.
pub const LINK_HASH_SCOPE: &str = "concord.link";

impl Link {
    /// Hash an encrypted body under the link domain tag.
    pub fn hash_body(encrypted_body: &[u8]) -> Hash {
        hash(LINK_HASH_SCOPE, encrypted_body)
    }

    /// Sign an already-hashed, already-encrypted body, producing a [`Link`].
    pub fn seal(hash: Hash, signer: KeyScope, signing_key: &SigningKey) -> Self {
        let signature = signing_key.sign(hash.as_bytes());
        Self {
            hash,
            signature,
            signer,
        }
    }

    /// Verify this link's signature against a claimed verifying key.
    pub fn verify_signature(&self, verifying_key: &VerifyingKey) -> bool {
        verifying_key.verify(self.hash.as_bytes(), &self.signature).is_ok()
    }
}
