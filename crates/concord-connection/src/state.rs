//! The hierarchical connection state (§4.6).
//!
//! A tagged `enum` rather than a state-chart engine: the source system
//! uses a third-party statechart library with nested and parallel
//! regions; here the hierarchy is flattened into nested enum payloads, and
//! the `checkingIdentity` parallel region becomes a struct holding both
//! sub-state variants at once (`spec.md` §9's "product of two sub-state
//! variants").

use concord_crypto::Keyset;
use std::time::Instant;

/// Where a connection is in the `checkingInvitations` sub-flow (invitee
/// path only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationPhase {
    /// Waiting on the local side to check whether the presented proof
    /// matches a known invitation. Collapsed into `ValidatingInvitation`
    /// in practice, since the admitter resolves both in one step; kept as
    /// a distinct variant so the hierarchy still names the sub-phase
    /// `spec.md` §4.6 describes.
    CheckingForInvitations,
    /// Admitted; waiting for the invitee to acknowledge the delivered
    /// graph and keyring.
    AwaitingInvitationAcceptance,
    /// The admitter side: the proof checked out and `AdmitMember`/
    /// `AdmitDevice` is being dispatched for the keyset the invitee
    /// presented.
    ValidatingInvitation {
        /// The invitee's presented public keys, carried through so the
        /// welcome lockbox can be addressed once admission succeeds.
        public_keys: Keyset,
    },
}

/// This side's progress proving its own identity to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvingIdentity {
    /// Waiting for the peer's `CHALLENGE_IDENTITY`.
    AwaitingIdentityChallenge,
    /// Challenge answered; waiting for `ACCEPT_IDENTITY`/`REJECT_IDENTITY`.
    AwaitingIdentityAcceptance,
    /// Our identity has been accepted.
    Done,
}

/// This side's progress verifying the peer's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyingIdentity {
    /// About to issue a challenge.
    ChallengingIdentity,
    /// Challenge issued; waiting for `PROVE_IDENTITY`.
    AwaitingIdentityProof {
        /// The nonce we challenged with.
        nonce: [u8; 32],
        /// When the challenge was issued (unix seconds).
        issued_at: u64,
        /// The user id the peer claimed in `HELLO`.
        user_id: String,
        /// The device name the peer claimed in `HELLO`.
        device_name: String,
    },
    /// The peer's identity has been accepted.
    Done,
}

impl VerifyingIdentity {
    /// Whether both directions of the identity check have finished.
    pub fn is_done(&self) -> bool {
        matches!(self, VerifyingIdentity::Done)
    }
}

/// The `checkingIdentity` parallel region (§4.6): both sub-machines run
/// concurrently and `authenticating` only completes once both are `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckingIdentity {
    /// Our progress proving our own identity.
    pub proving: ProvingIdentity,
    /// Our progress verifying the peer's identity.
    pub verifying: VerifyingIdentity,
}

impl CheckingIdentity {
    /// Start both sub-machines: we await a challenge, we're about to issue one.
    pub fn start() -> Self {
        Self {
            proving: ProvingIdentity::AwaitingIdentityChallenge,
            verifying: VerifyingIdentity::ChallengingIdentity,
        }
    }

    /// Whether both the prove and verify sub-machines have reached `Done`.
    pub fn is_done(&self) -> bool {
        matches!(self.proving, ProvingIdentity::Done) && self.verifying.is_done()
    }
}

/// `negotiating`'s sub-phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiatingPhase {
    /// Waiting on the peer's `SEED` half.
    AwaitingSeed,
    /// Both halves exchanged; the session key is ready.
    Done,
}

/// The `authenticating` state's two mutually exclusive sub-flows: an
/// invitee presenting a proof of invitation, or an existing member
/// proving/verifying device identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatingPhase {
    /// Invitee path (§4.6 "Invitee path").
    CheckingInvitation(InvitationPhase),
    /// Existing-device path.
    CheckingIdentity(CheckingIdentity),
}

/// One connection's place in the handshake/sync hierarchy (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handshake in progress.
    Disconnected,
    /// `start()` was called; waiting for the peer's `HELLO`.
    AwaitingIdentityClaim,
    /// The identity/invitation check is underway.
    Authenticating(AuthenticatingPhase),
    /// Authenticated; exchanging heads and missing links.
    Synchronizing,
    /// Graphs converged; negotiating the session key.
    Negotiating(NegotiatingPhase),
    /// Fully connected: application traffic may flow.
    Connected,
}

impl ConnectionState {
    /// Whether this state counts toward the connection timeout (every
    /// state but `Connected`, per §4.6 "Cancellation / timeout").
    pub fn is_timeout_eligible(&self) -> bool {
        !matches!(self, ConnectionState::Connected)
    }
}

/// Wall-clock deadline tracking for the timeout rule, kept outside
/// `ConnectionState` itself so the state stays `PartialEq`-comparable in
/// tests without embedding a non-deterministic `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    /// When the current state was entered.
    pub entered_at: Instant,
}

impl Deadline {
    /// Start a fresh deadline window now.
    pub fn now() -> Self {
        Self {
            entered_at: Instant::now(),
        }
    }

    /// Whether `timeout` has elapsed since the window started.
    pub fn has_elapsed(&self, timeout: std::time::Duration) -> bool {
        self.entered_at.elapsed() >= timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checking_identity_is_done_only_once_both_sub_machines_finish() {
        let mut both = CheckingIdentity::start();
        assert!(!both.is_done());
        both.proving = ProvingIdentity::Done;
        assert!(!both.is_done());
        both.verifying = VerifyingIdentity::Done;
        assert!(both.is_done());
    }

    #[test]
    fn connected_is_the_only_timeout_exempt_state() {
        assert!(!ConnectionState::Connected.is_timeout_eligible());
        assert!(ConnectionState::Synchronizing.is_timeout_eligible());
    }
}
