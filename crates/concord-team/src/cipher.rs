//! The [`BodyCipher`] implementation backing every `Team`: link bodies are
//! symmetrically encrypted under a key derived from the team scope's
//! current encryption secret (§4.1 "encrypt with current team secret key").

use crate::keyring::TeamKeyring;
use concord_crypto::{symmetric_decrypt, symmetric_encrypt, SealSecretKey, SymmetricKey};
use concord_graph::{BodyCipher, LinkBody};

const BODY_KEY_DOMAIN: &str = "concord.link.body";
const APPLICATION_KEY_DOMAIN: &str = "concord.application.data";

/// Derive the symmetric body-encryption key for one team keyset generation
/// from its X25519 encryption secret, the same domain-separated-hash
/// pattern `concord-crypto::sealed` uses to turn an ECDH output into an
/// AEAD key.
fn derive_body_key(enc_secret: &SealSecretKey) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(BODY_KEY_DOMAIN);
    hasher.update(&enc_secret.to_bytes());
    SymmetricKey::from_bytes(*hasher.finalize().as_bytes())
}

/// Derive the symmetric key backing [`crate::Team::encrypt`]/`decrypt`,
/// domain-separated from `derive_body_key` so application data and link
/// bodies never share a key even when they share a team keyset generation.
pub fn derive_application_key(enc_secret: &SealSecretKey) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(APPLICATION_KEY_DOMAIN);
    hasher.update(&enc_secret.to_bytes());
    SymmetricKey::from_bytes(*hasher.finalize().as_bytes())
}

/// A [`BodyCipher`] backed by a [`TeamKeyring`], so `concord-graph` can
/// append/decode links without ever holding key material itself.
pub struct TeamCipher<'a> {
    keyring: &'a TeamKeyring,
}

impl<'a> TeamCipher<'a> {
    /// Borrow a cipher over `keyring` for the lifetime of one graph call.
    pub fn new(keyring: &'a TeamKeyring) -> Self {
        Self { keyring }
    }
}

impl BodyCipher for TeamCipher<'_> {
    fn encrypt_body(&self, body: &LinkBody) -> (Vec<u8>, u64) {
        let keys = self.keyring.current();
        let key = derive_body_key(&keys.enc_secret);
        let plaintext = bincode::serialize(body).expect("LinkBody is always serializable");
        let ciphertext = symmetric_encrypt(&plaintext, &key).expect("AEAD encryption cannot fail");
        (ciphertext, keys.public.generation)
    }

    fn decrypt_body(&self, ciphertext: &[u8], generation: u64) -> Option<LinkBody> {
        let keys = self.keyring.get(generation)?;
        let key = derive_body_key(&keys.enc_secret);
        let plaintext = symmetric_decrypt(ciphertext, &key).ok()?;
        bincode::deserialize(&plaintext).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_crypto::{KeyScope, KeysetWithSecrets, ScopeType};

    fn body() -> LinkBody {
        LinkBody {
            action_type: "CREATE_TEAM".into(),
            payload: vec![1, 2, 3],
            user: KeyScope::new(ScopeType::User, "alice"),
            device: KeyScope::new(ScopeType::Device, "alice-device"),
            timestamp: 0,
            prev: vec![],
            key_generation: 0,
        }
    }

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let keys = KeysetWithSecrets::generate(KeyScope::team("acme"));
        let keyring = TeamKeyring::new(keys);
        let cipher = TeamCipher::new(&keyring);

        let (ciphertext, generation) = cipher.encrypt_body(&body());
        assert_eq!(generation, 0);
        let decoded = cipher.decrypt_body(&ciphertext, generation).unwrap();
        assert_eq!(decoded.action_type, "CREATE_TEAM");
    }

    #[test]
    fn old_generation_decrypts_after_rotation() {
        let gen0 = KeysetWithSecrets::generate(KeyScope::team("acme"));
        let mut keyring = TeamKeyring::new(gen0);
        let cipher = TeamCipher::new(&keyring);
        let (ciphertext, generation) = cipher.encrypt_body(&body());
        drop(cipher);

        keyring.install(KeysetWithSecrets::generate_at(KeyScope::team("acme"), 1));
        let cipher = TeamCipher::new(&keyring);
        assert!(cipher.decrypt_body(&ciphertext, generation).is_some());
    }
}
