//! The public error taxonomy (§7). Every fallible `Team` operation returns
//! `Result<T>` against this single enum so callers match on kind rather
//! than parse message text.

use concord_crypto::CryptoError;
use concord_graph::GraphError;
use serde::{Deserialize, Serialize};

/// Errors surfaced by `concord-team`'s public API.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// The invitation id is not known to this team.
    #[error("invalid invitation")]
    InvalidInvitation,
    /// The invitation's expiration has passed.
    #[error("invitation expired")]
    ExpiredInvitation,
    /// The invitation has already reached its use limit.
    #[error("invitation already used")]
    UsedInvitation,
    /// The invitation was explicitly revoked.
    #[error("invitation revoked")]
    RevokedInvitation,

    /// No member with this id exists.
    #[error("member unknown")]
    MemberUnknown,
    /// The member exists but was removed from the team.
    #[error("member removed")]
    MemberRemoved,
    /// No device with this name exists for the member.
    #[error("device unknown")]
    DeviceUnknown,
    /// The device exists but was removed from its member.
    #[error("device removed")]
    DeviceRemoved,

    /// An identity proof failed to verify.
    #[error("identity proof invalid")]
    IdentityProofInvalid,
    /// An identity challenge was answered too late to be trusted.
    #[error("identity challenge stale")]
    ChallengeStale,

    /// A link or lockbox failed to decrypt.
    #[error("decryption failed")]
    DecryptionFailed,
    /// A signature failed to verify.
    #[error("signature invalid")]
    SignatureInvalid,
    /// The graph failed an integrity check; the connection must disconnect.
    #[error("graph corrupt")]
    GraphCorrupt,

    /// The caller does not hold the admin role required for this operation.
    #[error("not admin")]
    NotAdmin,
    /// The operation would remove the team's last remaining admin.
    #[error("cannot remove the last admin")]
    CannotRemoveLastAdmin,
    /// Server participants cannot issue invitations.
    #[error("servers cannot invite")]
    CannotInviteOnServer,
    /// Server participants cannot join via invitation.
    #[error("servers cannot join via invitation")]
    CannotJoinOnServer,

    /// A connection or operation exceeded its configured deadline.
    #[error("timeout")]
    Timeout,
}

impl From<GraphError> for ErrorKind {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::DecryptionFailed { .. } => ErrorKind::DecryptionFailed,
            GraphError::SignatureInvalid { .. } => ErrorKind::SignatureInvalid,
            GraphError::DanglingPredecessor { .. }
            | GraphError::UnsupportedVersion { .. }
            | GraphError::Malformed { .. } => ErrorKind::GraphCorrupt,
        }
    }
}

impl From<CryptoError> for ErrorKind {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::SignatureInvalid => ErrorKind::SignatureInvalid,
            CryptoError::DecryptionFailed
            | CryptoError::InvalidLength { .. }
            | CryptoError::GenerationMismatch { .. } => ErrorKind::DecryptionFailed,
        }
    }
}

impl From<concord_invitation::InvitationError> for ErrorKind {
    fn from(err: concord_invitation::InvitationError) -> Self {
        match err {
            concord_invitation::InvitationError::InvalidInvitation => ErrorKind::InvalidInvitation,
        }
    }
}

/// Result alias used throughout `concord-team`'s public API.
pub type Result<T> = std::result::Result<T, ErrorKind>;
