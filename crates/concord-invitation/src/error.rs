//! The invitation error taxonomy (§7): the same vocabulary
//! `concord_team::ErrorKind` uses for its invitation-lifecycle variants,
//! scoped here to proof verification.

use serde::{Deserialize, Serialize};

/// Errors from proof creation/validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, thiserror::Error, PartialEq, Eq)]
pub enum InvitationError {
    /// The proof's signature does not verify against the invitation's
    /// public key, or its id does not match the invitation it claims.
    #[error("invalid invitation")]
    InvalidInvitation,
}
