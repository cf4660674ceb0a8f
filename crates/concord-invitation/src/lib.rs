//! # concord-invitation
//!
//! Seitan-style invitation proofs: a shared secret seed deterministically
//! derives an Ed25519 keypair, letting an invitee prove possession of the
//! seed without ever transmitting it. A leaf crate — it knows nothing
//! about team state or the graph, only the seed-to-proof cryptography.

#![forbid(unsafe_code)]

pub mod error;
pub mod proof;
pub mod seed;

pub use error::InvitationError;
pub use proof::{create, generate_proof, invitation_can_be_used, validate, CreatedInvitation, Proof};
pub use seed::normalize;
