//! Seitan-style invitation proofs (§4.5): a deterministic Ed25519 keypair
//! derived from a shared secret seed lets the invitee prove possession of
//! the seed without ever transmitting it, by signing a fixed challenge
//! (the invitation id itself).

use crate::error::InvitationError;
use crate::seed::normalize;
use concord_crypto::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

const SEED_KEY_DOMAIN: &str = "concord.invitation.seed";
const ID_PREFIX_LEN: usize = 16;

/// Derive the invitation keypair for a normalized seed. Same seed, same
/// keypair, every time — this is what lets the invitee regenerate it
/// independently instead of receiving it over the wire.
fn derive_keypair(normalized_seed: &str) -> SigningKey {
    let mut hasher = blake3::Hasher::new_derive_key(SEED_KEY_DOMAIN);
    hasher.update(normalized_seed.as_bytes());
    SigningKey::from_bytes(*hasher.finalize().as_bytes())
}

/// Derive an invitation id from its public key: base58 of a fixed-length
/// prefix, short enough to read aloud alongside the seed.
fn derive_id(public_key: &VerifyingKey) -> String {
    bs58::encode(&public_key.to_bytes()[..ID_PREFIX_LEN]).into_string()
}

/// What the admitting member gets back from [`create`]: the invitation id
/// and public key to store, but never the seed or secret key — those are
/// reconstructed on demand by whoever holds the seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedInvitation {
    /// The invitation id, derived from the public key.
    pub id: String,
    /// The public key the invitee's proof will be checked against.
    pub public_key: VerifyingKey,
}

/// Derive an invitation's id and public key from a seed (§4.5 `create`).
pub fn create(seed: &str) -> CreatedInvitation {
    let public_key = derive_keypair(&normalize(seed)).verifying_key();
    CreatedInvitation {
        id: derive_id(&public_key),
        public_key,
    }
}

/// A proof of seed possession, presented by the invitee (§4.5 `generateProof`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// The invitation id the invitee believes they are proving possession of.
    pub id: String,
    /// Signature over `id`'s bytes, under the seed-derived secret key.
    pub signature: Signature,
}

/// Derive the same keypair from `seed` and sign the id, proving possession
/// of the seed without revealing it (§4.5 `generateProof`).
pub fn generate_proof(seed: &str) -> Proof {
    let signing_key = derive_keypair(&normalize(seed));
    let id = derive_id(&signing_key.verifying_key());
    let signature = signing_key.sign(id.as_bytes());
    Proof { id, signature }
}

/// Verify `proof` against the invitation's stored public key (§4.5 `validate`).
pub fn validate(proof: &Proof, public_key: &VerifyingKey) -> Result<(), InvitationError> {
    if proof.id != derive_id(public_key) {
        return Err(InvitationError::InvalidInvitation);
    }
    concord_crypto::verify(proof.id.as_bytes(), &proof.signature, public_key)
        .then_some(())
        .ok_or(InvitationError::InvalidInvitation)
}

/// Whether an invitation is still usable (§4.5 `invitationCanBeUsed`):
/// not revoked, under its use limit, and not expired.
///
/// Takes plain fields rather than a `concord_reducer::Invitation` so this
/// crate stays a leaf dependency with no knowledge of team state.
pub fn invitation_can_be_used(revoked: bool, uses: u32, max_uses: u32, now: u64, expiration: u64) -> bool {
    !revoked && uses < max_uses && now < expiration
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_round_trips_for_the_right_seed() {
        let created = create("abc 123");
        let proof = generate_proof("abc123");
        assert_eq!(proof.id, created.id);
        assert!(validate(&proof, &created.public_key).is_ok());
    }

    #[test]
    fn proof_rejected_for_the_wrong_seed() {
        let created = create("abc 123");
        let proof = generate_proof("wrong seed");
        assert!(validate(&proof, &created.public_key).is_err());
    }

    #[test]
    fn proof_rejected_against_the_wrong_public_key() {
        let created = create("abc 123");
        let other = create("xyz 789");
        let proof = generate_proof("abc123");
        assert!(validate(&proof, &other.public_key).is_err());
    }

    #[test]
    fn normalization_differences_still_match() {
        let created = create("Correct Horse-Battery!");
        let proof = generate_proof("correcthorsebattery");
        assert!(validate(&proof, &created.public_key).is_ok());
    }

    #[test]
    fn usability_predicate() {
        assert!(invitation_can_be_used(false, 0, 1, 0, 100));
        assert!(!invitation_can_be_used(true, 0, 1, 0, 100));
        assert!(!invitation_can_be_used(false, 1, 1, 0, 100));
        assert!(!invitation_can_be_used(false, 0, 1, 100, 100));
    }
}
