//! Key scopes and keysets: the principals that own key material.

use crate::sealed::{SealPublicKey, SealSecretKey};
use crate::signing::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

/// The kind of principal a [`KeyScope`] identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScopeType {
    /// The team itself.
    Team,
    /// A named role (e.g. "admin").
    Role,
    /// A member user.
    User,
    /// One device belonging to a user.
    Device,
    /// A server participant.
    Server,
    /// A short-lived scope used only for one cryptographic exchange.
    Ephemeral,
}

/// A principal or grant-target: `(type, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyScope {
    /// Which kind of principal this is.
    pub kind: ScopeType,
    /// The principal's name within its kind (user id, role name, device name, ...).
    pub name: String,
}

impl KeyScope {
    /// Construct a scope.
    pub fn new(kind: ScopeType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for a team scope.
    pub fn team(name: impl Into<String>) -> Self {
        Self::new(ScopeType::Team, name)
    }

    /// Shorthand for a user scope.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(ScopeType::User, id)
    }

    /// Shorthand for a role scope.
    pub fn role(name: impl Into<String>) -> Self {
        Self::new(ScopeType::Role, name)
    }

    /// Shorthand for a device scope.
    pub fn device(id: impl Into<String>) -> Self {
        Self::new(ScopeType::Device, id)
    }
}

/// A reference to one generation of a scope's keyset, used as a lockbox
/// recipient address without requiring the full public keyset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeysetRef {
    /// The scope this keyset belongs to.
    pub scope: KeyScope,
    /// The keyset generation.
    pub generation: u64,
}

/// A scope's public key material at one generation.
///
/// Invariant: `generation` only increases for a given `scope`, and a given
/// generation's keys never change once issued (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyset {
    /// The scope (principal) this keyset belongs to.
    pub scope: KeyScope,
    /// Monotonically increasing generation number.
    pub generation: u64,
    /// Signature (Ed25519) public key.
    pub sig_public: VerifyingKey,
    /// Encryption (X25519) public key.
    pub enc_public: SealPublicKey,
}

impl Keyset {
    /// This keyset's `(scope, generation)` address.
    pub fn keyset_ref(&self) -> KeysetRef {
        KeysetRef {
            scope: self.scope.clone(),
            generation: self.generation,
        }
    }
}

/// A [`Keyset`] plus the matching secret keys, held only by the scope's
/// owner (or by a lockbox recipient who just opened one addressed to them).
#[derive(Clone, Serialize, Deserialize)]
pub struct KeysetWithSecrets {
    /// The public half.
    pub public: Keyset,
    /// Ed25519 signing secret.
    pub sig_secret: SigningKey,
    /// X25519 decryption secret.
    pub enc_secret: SealSecretKey,
}

impl std::fmt::Debug for KeysetWithSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeysetWithSecrets")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl KeysetWithSecrets {
    /// Generate a fresh generation-0 keyset for `scope`.
    pub fn generate(scope: KeyScope) -> Self {
        Self::generate_at(scope, 0)
    }

    /// Generate a fresh keyset for `scope` at a specific generation
    /// (used by rotation, which must skip to `old.generation + 1`).
    pub fn generate_at(scope: KeyScope, generation: u64) -> Self {
        let sig_secret = SigningKey::generate();
        let enc_secret = SealSecretKey::generate();
        let public = Keyset {
            scope,
            generation,
            sig_public: sig_secret.verifying_key(),
            enc_public: enc_secret.public_key(),
        };
        Self {
            public,
            sig_secret,
            enc_secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keyset_is_internally_consistent() {
        let ks = KeysetWithSecrets::generate(KeyScope::team("acme"));
        assert_eq!(ks.public.sig_public, ks.sig_secret.verifying_key());
        assert_eq!(ks.public.enc_public, ks.enc_secret.public_key());
        assert_eq!(ks.public.generation, 0);
    }

    #[test]
    fn rotation_bumps_generation_only() {
        let scope = KeyScope::user("alice");
        let gen0 = KeysetWithSecrets::generate_at(scope.clone(), 0);
        let gen1 = KeysetWithSecrets::generate_at(scope, 1);
        assert_eq!(gen0.public.generation, 0);
        assert_eq!(gen1.public.generation, 1);
        assert_ne!(gen0.public.sig_public, gen1.public.sig_public);
    }
}
