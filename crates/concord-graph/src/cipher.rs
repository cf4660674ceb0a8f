//! The body-encryption seam: `concord-graph` knows how to hash, sign, and
//! order links, but never holds key material directly. Callers supply a
//! [`BodyCipher`] (backed by `concord-crypto` and a team keyring) to
//! encrypt bodies on `append` and decrypt them on `load`/`reduce`.

use crate::error::{GraphError, Result};
use crate::link::LinkBody;
use concord_crypto::Hash;

/// Encrypts and decrypts link bodies under the team's current (or a
/// historical) keyset generation.
pub trait BodyCipher {
    /// Serialize and encrypt `body` under the *current* team keyset
    /// generation, returning the ciphertext and the generation used.
    fn encrypt_body(&self, body: &LinkBody) -> (Vec<u8>, u64);

    /// Decrypt `ciphertext`, which was encrypted under `generation`,
    /// returning the decoded [`LinkBody`]. Implementations must be able to
    /// decrypt under any generation still present in the local keyring so
    /// that historical links remain readable after rotation (§4.4).
    fn decrypt_body(&self, ciphertext: &[u8], generation: u64) -> Option<LinkBody>;
}

pub(crate) fn decrypt_or_fail(
    cipher: &dyn BodyCipher,
    link_hash: Hash,
    ciphertext: &[u8],
    generation: u64,
) -> Result<LinkBody> {
    cipher
        .decrypt_body(ciphertext, generation)
        .ok_or(GraphError::DecryptionFailed { link: link_hash })
}
