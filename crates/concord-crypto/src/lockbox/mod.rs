//! Lockboxes: encrypted envelopes delivering one keyset to the holder of a
//! recipient scope's secret key, and the visibility closure they induce.

mod visibility;

pub use visibility::visible_scopes;

use crate::error::{CryptoError, Result};
use crate::scope::{KeysetRef, KeysetWithSecrets};
use crate::sealed::{self, SealPublicKey, SealSecretKey, Sealed};
use serde::{Deserialize, Serialize};

/// An encrypted envelope granting the holder of `recipient`'s secret key
/// read access to `contents` (a full [`KeysetWithSecrets`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockbox {
    /// The sealed, serialized [`KeysetWithSecrets`].
    pub sealed: Sealed,
    /// The `(scope, generation)` that can open this lockbox.
    pub recipient: KeysetRef,
}

/// Create a lockbox granting `recipient_public` access to `contents`.
///
/// A fresh ephemeral X25519 keypair is generated for this lockbox alone so
/// that compromising one lockbox's sender secret never affects another.
pub fn create(
    contents: &KeysetWithSecrets,
    recipient: KeysetRef,
    recipient_public: &SealPublicKey,
) -> Result<Lockbox> {
    let plaintext = bincode::serialize(contents)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let sealed = sealed::seal(&plaintext, recipient_public)?;
    Ok(Lockbox { sealed, recipient })
}

/// Open a lockbox with the recipient's secret key, recovering the keyset
/// it delivers. Fails with [`CryptoError::DecryptionFailed`] if the MAC is
/// invalid (wrong key, or tampered contents).
pub fn open(lockbox: &Lockbox, recipient_secret: &SealSecretKey) -> Result<KeysetWithSecrets> {
    let plaintext = sealed::open(&lockbox.sealed, recipient_secret)?;
    bincode::deserialize(&plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

/// Re-address or re-key a lockbox: same logical grant, next generation of
/// either the contents, the recipient, or both.
///
/// `sender_secret` is the previous lockbox's opener's secret, used so the
/// rotated lockbox's sender identity is stable across a rotation chain
/// rather than yet another throwaway ephemeral key.
pub fn rotate(
    new_contents: &KeysetWithSecrets,
    new_recipient: KeysetRef,
    new_recipient_public: &SealPublicKey,
    sender_secret: &SealSecretKey,
) -> Result<Lockbox> {
    let plaintext = bincode::serialize(new_contents).map_err(|_| CryptoError::DecryptionFailed)?;
    let sealed = sealed::seal_with_sender(&plaintext, new_recipient_public, sender_secret)?;
    Ok(Lockbox {
        sealed,
        recipient: new_recipient,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::KeyScope;

    fn recipient_keyset(scope: KeyScope, generation: u64) -> (KeysetWithSecrets, KeysetRef) {
        let ks = KeysetWithSecrets::generate_at(scope, generation);
        let r = ks.public.keyset_ref();
        (ks, r)
    }

    #[test]
    fn create_then_open_roundtrip() {
        let (recipient_keys, recipient_ref) = recipient_keyset(KeyScope::user("bob"), 0);
        let contents = KeysetWithSecrets::generate(KeyScope::team("acme"));

        let lockbox = create(&contents, recipient_ref.clone(), &recipient_keys.public.enc_public)
            .unwrap();
        assert_eq!(lockbox.recipient, recipient_ref);

        let opened = open(&lockbox, &recipient_keys.enc_secret).unwrap();
        assert_eq!(opened.public, contents.public);
    }

    #[test]
    fn open_with_wrong_secret_fails() {
        let (recipient_keys, recipient_ref) = recipient_keyset(KeyScope::user("bob"), 0);
        let intruder = KeysetWithSecrets::generate(KeyScope::user("mallory"));
        let contents = KeysetWithSecrets::generate(KeyScope::team("acme"));

        let lockbox = create(&contents, recipient_ref, &recipient_keys.public.enc_public).unwrap();
        assert!(open(&lockbox, &intruder.enc_secret).is_err());
    }

    #[test]
    fn rotate_keeps_recipient_scope_bumps_contents() {
        let (recipient_keys, recipient_ref) = recipient_keyset(KeyScope::user("bob"), 0);
        let v0 = KeysetWithSecrets::generate_at(KeyScope::team("acme"), 0);
        let v1 = KeysetWithSecrets::generate_at(KeyScope::team("acme"), 1);

        let first = create(&v0, recipient_ref.clone(), &recipient_keys.public.enc_public).unwrap();
        let sender_secret = crate::sealed::SealSecretKey::generate();
        let rotated = rotate(
            &v1,
            recipient_ref.clone(),
            &recipient_keys.public.enc_public,
            &sender_secret,
        )
        .unwrap();

        assert_eq!(rotated.recipient, first.recipient);
        let opened = open(&rotated, &recipient_keys.enc_secret).unwrap();
        assert_eq!(opened.public.generation, 1);
    }
}
