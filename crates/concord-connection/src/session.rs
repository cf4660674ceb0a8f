//! Session-key negotiation (§4.6): each side contributes a random half,
//! exchanged sealed to the peer's device encryption key; the session key
//! is the XOR of the two halves.

use concord_crypto::{random_key, seal, Sealed, SealPublicKey, SealSecretKey, SymmetricKey};

/// One side's contribution to the session key.
#[derive(Clone, Copy)]
pub struct SessionHalf(pub [u8; 32]);

impl SessionHalf {
    /// Generate a fresh random half.
    pub fn generate() -> Self {
        Self(random_key())
    }

    /// Seal this half to the peer's device encryption key for delivery.
    pub fn seal_to(&self, peer_enc_public: &SealPublicKey) -> concord_crypto::Result<Sealed> {
        seal(&self.0, peer_enc_public)
    }

    /// Open a half sealed by the peer, using our own device decryption key.
    pub fn open_from(sealed: &Sealed, our_enc_secret: &SealSecretKey) -> concord_crypto::Result<Self> {
        let bytes = concord_crypto::open_sealed(sealed, our_enc_secret)?;
        Self::from_bytes(bytes)
    }

    /// Reconstruct a half from already-decrypted bytes, e.g. the output
    /// of `Team::open_sealed`.
    pub fn from_bytes(bytes: Vec<u8>) -> concord_crypto::Result<Self> {
        let actual = bytes.len();
        let arr: [u8; 32] = bytes.try_into().map_err(|_| concord_crypto::CryptoError::InvalidLength {
            field: "session half".into(),
            expected: 32,
            actual,
        })?;
        Ok(Self(arr))
    }
}

/// Combine our half with the peer's half into the session key: XOR, the
/// same "neither side alone controls the result" construction as a
/// two-party coin flip.
pub fn derive_session_key(ours: &SessionHalf, theirs: &SessionHalf) -> SymmetricKey {
    let mut combined = [0u8; 32];
    for i in 0..32 {
        combined[i] = ours.0[i] ^ theirs.0[i];
    }
    SymmetricKey::from_bytes(combined)
}
