//! Symmetric AEAD and X25519-sealed asymmetric encryption.
//!
//! These are the `symmetric.*` and `asymmetric.*` primitives from the
//! spec's external interface. Symmetric encryption wraps link bodies and
//! lockbox contents under XChaCha20-Poly1305; asymmetric encryption seals
//! a lockbox's symmetric contents to a recipient's X25519 public key using
//! an ephemeral sender keypair plus a Diffie-Hellman shared secret.

use crate::error::{CryptoError, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};

const NONCE_LEN: usize = 24;

/// A symmetric key for XChaCha20-Poly1305.
#[derive(Clone, Serialize, Deserialize, zeroize::ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(crate::hash::random_key())
    }

    /// Raw key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Encrypt `plaintext` under `key`. The nonce is generated randomly and
/// prepended to the returned ciphertext, per the spec's wire convention.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.0.as_ref().into());
    let mut nonce_bytes = [0u8; NONCE_LEN];
    use rand::RngCore;
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);
    let mut ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let mut out = nonce_bytes.to_vec();
    out.append(&mut ciphertext);
    Ok(out)
}

/// Decrypt ciphertext produced by [`encrypt`] (nonce-prefixed).
pub fn decrypt(ciphertext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_LEN {
        return Err(CryptoError::DecryptionFailed);
    }
    let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(key.0.as_ref().into());
    let nonce = XNonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, body)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// An X25519 public key used as an asymmetric-encryption recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealPublicKey(pub [u8; 32]);

/// An X25519 secret key used to open sealed envelopes addressed to us.
#[derive(Clone, Serialize, Deserialize, zeroize::ZeroizeOnDrop)]
pub struct SealSecretKey([u8; 32]);

impl SealSecretKey {
    /// Generate a fresh random X25519 keypair's secret half.
    pub fn generate() -> Self {
        let secret = x25519_dalek::StaticSecret::random_from_rng(rand::rngs::OsRng);
        Self(secret.to_bytes())
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> SealPublicKey {
        let secret = x25519_dalek::StaticSecret::from(self.0);
        SealPublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }

    /// Raw scalar bytes, for deriving other key material from this secret
    /// (e.g. a scope's link-body encryption key).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl std::fmt::Debug for SealSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealSecretKey(..)")
    }
}

/// A sealed envelope: an ephemeral sender public key plus the ciphertext
/// of a Diffie-Hellman-derived AEAD encryption of the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    /// Ephemeral (or static, for `rotate`) sender public key.
    pub sender_public: SealPublicKey,
    /// Nonce-prefixed AEAD ciphertext.
    pub ciphertext: Vec<u8>,
}

fn shared_symmetric_key(shared_secret: &x25519_dalek::SharedSecret) -> SymmetricKey {
    // Domain-separate the raw ECDH output before using it as an AEAD key.
    SymmetricKey(*blake3::hash(shared_secret.as_bytes()).as_bytes())
}

/// Seal `plaintext` to `recipient_public`, generating a fresh ephemeral
/// sender keypair for this single envelope (forward secrecy per lockbox).
pub fn seal(plaintext: &[u8], recipient_public: &SealPublicKey) -> Result<Sealed> {
    let ephemeral = SealSecretKey::generate();
    seal_with_sender(plaintext, recipient_public, &ephemeral)
}

/// Seal `plaintext` to `recipient_public` using an explicit sender secret
/// key, for callers (e.g. lockbox rotation) that need a stable sender
/// identity rather than a fresh ephemeral one.
pub fn seal_with_sender(
    plaintext: &[u8],
    recipient_public: &SealPublicKey,
    sender_secret: &SealSecretKey,
) -> Result<Sealed> {
    let secret = x25519_dalek::StaticSecret::from(sender_secret.0);
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(recipient_public.0));
    let key = shared_symmetric_key(&shared);
    let ciphertext = encrypt(plaintext, &key)?;
    Ok(Sealed {
        sender_public: sender_secret.public_key(),
        ciphertext,
    })
}

/// Open a [`Sealed`] envelope using the recipient's secret key.
pub fn open(sealed: &Sealed, recipient_secret: &SealSecretKey) -> Result<Vec<u8>> {
    let secret = x25519_dalek::StaticSecret::from(recipient_secret.0);
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(sealed.sender_public.0));
    let key = shared_symmetric_key(&shared);
    decrypt(&sealed.ciphertext, &key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn symmetric_roundtrip() {
        let key = SymmetricKey::generate();
        let ct = encrypt(b"team secret", &key).unwrap();
        assert_eq!(decrypt(&ct, &key).unwrap(), b"team secret");
    }

    #[test]
    fn symmetric_wrong_key_fails() {
        let key = SymmetricKey::generate();
        let other = SymmetricKey::generate();
        let ct = encrypt(b"team secret", &key).unwrap();
        assert_matches!(decrypt(&ct, &other), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn sealed_roundtrip() {
        let recipient = SealSecretKey::generate();
        let sealed = seal(b"keyset", &recipient.public_key()).unwrap();
        assert_eq!(open(&sealed, &recipient).unwrap(), b"keyset");
    }

    #[test]
    fn sealed_wrong_recipient_fails() {
        let recipient = SealSecretKey::generate();
        let intruder = SealSecretKey::generate();
        let sealed = seal(b"keyset", &recipient.public_key()).unwrap();
        assert_matches!(open(&sealed, &intruder), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn ciphertext_too_short_rejected() {
        let key = SymmetricKey::generate();
        assert_matches!(decrypt(&[0u8; 4], &key), Err(CryptoError::DecryptionFailed));
    }
}
