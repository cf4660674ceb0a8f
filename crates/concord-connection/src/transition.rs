//! The pure transition core (§4.6): given the current state and an
//! event, decides the next state and the actions the effectful
//! `Connection` driver should carry out. Mirrors the split
//! `aura-anti-entropy::pure` draws between deciding and doing — nothing
//! here performs I/O or mutates `Team`; `&Team` is borrowed read-only for
//! the deterministic operations (`sign`, `verify`, `open_sealed`,
//! selector reads) that don't require it.
//!
//! Two transitions fall outside this module entirely because they
//! genuinely require a `&mut Team` the pure core cannot hold: admitting
//! an invitee and merging a peer's graph fragment. Those are driven
//! directly by [`crate::connection::Connection`], which executes the
//! mutation and feeds the outcome back in as a further [`Event`].

use crate::identity::{challenge_bytes, challenge_is_fresh, lookup_identity};
use crate::message::{IdentityClaim, Message};
use crate::session::{derive_session_key, SessionHalf};
use crate::state::{
    AuthenticatingPhase, CheckingIdentity, ConnectionState, InvitationPhase, NegotiatingPhase, ProvingIdentity,
    VerifyingIdentity,
};
use crate::sync::{heads_already_converged, missing_hashes};
use concord_crypto::{Hash, Keyset, SymmetricKey};
use concord_invitation::Proof;
use concord_team::{ErrorKind, Team};
use std::collections::BTreeSet;

/// This side's own identity, fixed for the life of one `Connection`.
#[derive(Debug, Clone)]
pub enum LocalIdentity {
    /// An existing member claiming one of their own devices.
    Device,
    /// A party with no team yet, presenting proof of an invitation.
    Invitation {
        /// Proof of the seed the invitation was created from.
        proof: Proof,
        /// The user id to admit as (member invitations only).
        user_id: String,
        /// Display name (member invitation) or device name (device
        /// invitation).
        name: String,
        /// This side's freshly generated public keys.
        public_keys: Keyset,
    },
}

/// Build the opening `HELLO` and the state it leaves us in. Does not
/// need `&Team`: an invitee has none yet, and an existing member's own
/// claim is just its own user/device id.
pub fn start(local: &LocalIdentity, own_user_id: &str, own_device_name: &str) -> (ConnectionState, Message) {
    let claim = match local {
        LocalIdentity::Device => IdentityClaim::Device {
            user_id: own_user_id.to_string(),
            device_name: own_device_name.to_string(),
        },
        LocalIdentity::Invitation {
            proof,
            user_id,
            name,
            public_keys,
        } => IdentityClaim::Invitation {
            proof: proof.clone(),
            user_id: user_id.clone(),
            name: name.clone(),
            public_keys: public_keys.clone(),
        },
    };
    (ConnectionState::AwaitingIdentityClaim, Message::hello(claim))
}

/// Something that moves a connection forward: a message from the peer,
/// an elapsed deadline, or the outcome of a mutation the driver just
/// performed on our behalf.
#[derive(Debug, Clone)]
pub enum Event {
    /// A message arrived from the peer.
    Received(Message),
    /// The connection's deadline elapsed while not yet `connected`.
    TimedOut,
    /// The driver finished admitting the invitee `AdmitMember`/
    /// `AdmitDevice` asked for.
    Admitted(Result<(), ErrorKind>),
    /// The driver finished merging a `SyncLinks` batch.
    Merged(Result<(), ErrorKind>),
}

/// Something the driver must do in response to a transition.
#[derive(Debug, Clone)]
pub enum Action {
    /// Send a message to the peer.
    Send(Message),
    /// Admit the invitee as a new member.
    AdmitMember {
        proof: Proof,
        user_id: String,
        user_name: String,
        public_keys: Keyset,
    },
    /// Admit the invitee as a new device of an existing member.
    AdmitDevice {
        proof: Proof,
        user_id: String,
        device_name: String,
        public_keys: Keyset,
    },
    /// Merge a peer's graph fragment (full-graph transfer in this
    /// implementation; see `sync.rs`).
    Merge(Vec<u8>),
    /// The session key is ready; the driver should install it and treat
    /// the connection as open for application traffic.
    SessionEstablished(SymmetricKey),
    /// Tell the host the connection reached `connected`.
    EmitConnected,
    /// A local decision rejected the peer (bad proof, stale challenge, ...).
    EmitLocalError(ErrorKind),
    /// The peer rejected or disconnected us.
    EmitRemoteError(ErrorKind),
}

fn disconnect(kind: ErrorKind) -> (ConnectionState, Vec<Action>) {
    (
        ConnectionState::Disconnected,
        vec![Action::Send(Message::Disconnect { kind: kind.clone() }), Action::EmitLocalError(kind)],
    )
}

/// Context the pure core reads from but never mutates.
pub struct Context<'a> {
    /// This participant's local view of the team. `None` only for an
    /// invitee that has not yet processed `ACCEPT_INVITATION`.
    pub team: Option<&'a Team>,
    /// This side's own identity.
    pub local: LocalIdentity,
    /// Current unix time, for challenge freshness and stamping our own
    /// challenges.
    pub now: u64,
    /// A fresh random nonce, used only when this call issues a new
    /// challenge.
    pub fresh_nonce: [u8; 32],
    /// This side's session-key contribution, generated once and held by
    /// the driver until negotiation completes.
    pub our_session_half: SessionHalf,
    /// The peer's resolved keyset, once their identity/admission is
    /// known — needed to address the `SEED` message.
    pub peer_keys: Option<Keyset>,
    /// The peer's graph head as of the last `SYNC` we received, used to
    /// decide whether merging just converged.
    pub peer_head: Option<BTreeSet<Hash>>,
}

fn own_identity(ctx: &Context) -> (String, String) {
    match &ctx.local {
        LocalIdentity::Device => {
            let team = ctx.team.expect("device identity always has a team");
            (team.user_id().to_string(), team.device_name().to_string())
        }
        LocalIdentity::Invitation { user_id, name, .. } => (user_id.clone(), name.clone()),
    }
}

fn checking_identity_done(checking: CheckingIdentity, team: &Team) -> (ConnectionState, Vec<Action>) {
    if checking.is_done() {
        advance_to_synchronizing(team)
    } else {
        (
            ConnectionState::Authenticating(AuthenticatingPhase::CheckingIdentity(checking)),
            Vec::new(),
        )
    }
}

fn advance_to_synchronizing(team: &Team) -> (ConnectionState, Vec<Action>) {
    let parent_map = team.graph().parent_map(Default::default());
    (
        ConnectionState::Synchronizing,
        vec![Action::Send(Message::Sync {
            head: team.head().clone(),
            parent_map,
        })],
    )
}

fn seed_action(ctx: &Context) -> Option<Action> {
    let peer_keys = ctx.peer_keys.as_ref()?;
    let sealed = ctx.our_session_half.seal_to(&peer_keys.enc_public).ok()?;
    Some(Action::Send(Message::Seed { sealed_half: sealed }))
}

/// Advance the state machine by one event.
pub fn step(state: &ConnectionState, event: Event, ctx: &Context) -> (ConnectionState, Vec<Action>) {
    match (state, event) {
        (ConnectionState::AwaitingIdentityClaim, Event::Received(Message::Hello { claim, .. })) => {
            handle_hello(claim, ctx)
        }

        (
            ConnectionState::Authenticating(AuthenticatingPhase::CheckingIdentity(checking)),
            Event::Received(Message::ChallengeIdentity { nonce, timestamp }),
        ) => {
            let team = ctx.team.expect("identity path always has a team");
            let (user_id, device_name) = own_identity(ctx);
            let signature = team.sign(&challenge_bytes(&user_id, &device_name, &nonce, timestamp));
            let mut checking = checking.clone();
            checking.proving = ProvingIdentity::AwaitingIdentityAcceptance;
            let mut actions = vec![Action::Send(Message::ProveIdentity { signature, timestamp })];
            let (next, mut more) = checking_identity_done(checking, team);
            actions.append(&mut more);
            (next, actions)
        }

        (
            ConnectionState::Authenticating(AuthenticatingPhase::CheckingIdentity(checking)),
            Event::Received(Message::ProveIdentity { signature, timestamp }),
        ) => {
            let team = ctx.team.expect("identity path always has a team");
            let VerifyingIdentity::AwaitingIdentityProof {
                nonce,
                issued_at,
                user_id,
                device_name,
            } = &checking.verifying
            else {
                return disconnect(ErrorKind::IdentityProofInvalid);
            };
            if !challenge_is_fresh(*issued_at, ctx.now) {
                return disconnect(ErrorKind::ChallengeStale);
            }
            let claimed = match lookup_identity(team, user_id, device_name) {
                Ok(keys) => keys,
                Err(kind) => return disconnect(kind),
            };
            let bytes = challenge_bytes(user_id, device_name, nonce, timestamp);
            if !team.verify(&bytes, &signature, &claimed.sig_public) {
                return disconnect(ErrorKind::IdentityProofInvalid);
            }
            let mut checking = checking.clone();
            checking.verifying = VerifyingIdentity::Done;
            let mut actions = vec![Action::Send(Message::AcceptIdentity)];
            let (next, mut more) = checking_identity_done(checking, team);
            actions.append(&mut more);
            (next, actions)
        }

        (
            ConnectionState::Authenticating(AuthenticatingPhase::CheckingIdentity(checking)),
            Event::Received(Message::AcceptIdentity),
        ) => {
            let team = ctx.team.expect("identity path always has a team");
            let mut checking = checking.clone();
            checking.proving = ProvingIdentity::Done;
            checking_identity_done(checking, team)
        }

        (ConnectionState::Authenticating(_), Event::Received(Message::RejectIdentity { kind })) => (
            ConnectionState::Disconnected,
            vec![Action::EmitRemoteError(kind)],
        ),

        (ConnectionState::Synchronizing, Event::Received(Message::Sync { head, parent_map })) => {
            let team = ctx.team.expect("synchronizing always has a team");
            let missing = missing_hashes(team.graph(), &head, &parent_map);
            if missing.is_empty() && heads_already_converged(team.head(), &head) {
                let mut actions = Vec::new();
                if let Some(seed) = seed_action(ctx) {
                    actions.push(seed);
                }
                (
                    ConnectionState::Negotiating(NegotiatingPhase::AwaitingSeed),
                    actions,
                )
            } else {
                (
                    ConnectionState::Synchronizing,
                    vec![Action::Send(Message::SyncLinks { graph: team.save() })],
                )
            }
        }

        (ConnectionState::Synchronizing, Event::Merged(Ok(()))) => {
            let team = ctx.team.expect("synchronizing always has a team");
            let converged = ctx
                .peer_head
                .as_ref()
                .map(|peer_head| heads_already_converged(team.head(), peer_head))
                .unwrap_or(false);
            if converged {
                let mut actions = Vec::new();
                if let Some(seed) = seed_action(ctx) {
                    actions.push(seed);
                }
                (
                    ConnectionState::Negotiating(NegotiatingPhase::AwaitingSeed),
                    actions,
                )
            } else {
                (ConnectionState::Synchronizing, Vec::new())
            }
        }
        (ConnectionState::Synchronizing, Event::Merged(Err(kind))) => disconnect(kind),

        (
            ConnectionState::Negotiating(NegotiatingPhase::AwaitingSeed),
            Event::Received(Message::Seed { sealed_half }),
        ) => {
            let team = ctx.team.expect("negotiating always has a team");
            let theirs = match team
                .open_sealed(&sealed_half)
                .and_then(|bytes| SessionHalf::from_bytes(bytes).map_err(ErrorKind::from))
            {
                Ok(half) => half,
                Err(kind) => return disconnect(kind),
            };
            let key = derive_session_key(&ctx.our_session_half, &theirs);
            (
                ConnectionState::Connected,
                vec![Action::SessionEstablished(key), Action::EmitConnected],
            )
        }

        (ConnectionState::Authenticating(AuthenticatingPhase::CheckingInvitation(phase)), Event::Admitted(result)) => {
            match (phase, result) {
                (InvitationPhase::ValidatingInvitation { public_keys }, Ok(())) => {
                    let team = ctx.team.expect("admitter always has a team");
                    let Some(team_scope) = team.team_keys().map(|keys| keys.scope.clone()) else {
                        return disconnect(ErrorKind::GraphCorrupt);
                    };
                    let lockbox = match team.lockbox_for(&team_scope, public_keys) {
                        Ok(lockbox) => lockbox,
                        Err(kind) => return disconnect(kind),
                    };
                    let mut actions = vec![Action::Send(Message::AcceptInvitation {
                        graph: team.save(),
                        team_keys: lockbox,
                        admin_keys: None,
                    })];
                    if let Ok(sealed) = ctx.our_session_half.seal_to(&public_keys.enc_public) {
                        actions.push(Action::Send(Message::Seed { sealed_half: sealed }));
                    }
                    (ConnectionState::Negotiating(NegotiatingPhase::AwaitingSeed), actions)
                }
                (_, Err(kind)) => disconnect(kind),
                (InvitationPhase::CheckingForInvitations | InvitationPhase::AwaitingInvitationAcceptance, Ok(())) => {
                    disconnect(ErrorKind::GraphCorrupt)
                }
            }
        }

        (_, Event::TimedOut) => (
            ConnectionState::Disconnected,
            vec![
                Action::Send(Message::Disconnect { kind: ErrorKind::Timeout }),
                Action::EmitLocalError(ErrorKind::Timeout),
            ],
        ),

        (_, Event::Received(Message::Disconnect { kind })) => {
            (ConnectionState::Disconnected, vec![Action::EmitRemoteError(kind)])
        }

        (other, _unhandled) => (other.clone(), Vec::new()),
    }
}

fn handle_hello(claim: IdentityClaim, ctx: &Context) -> (ConnectionState, Vec<Action>) {
    match claim {
        IdentityClaim::Device { user_id, device_name } => {
            let Some(team) = ctx.team else {
                // An invitee with no team yet cannot verify a peer's
                // device claim; the peer's own identity is established
                // once the invitation admits us, so this HELLO is simply
                // noted and otherwise ignored.
                return (ConnectionState::AwaitingIdentityClaim, Vec::new());
            };
            match lookup_identity(team, &user_id, &device_name) {
                Ok(_keys) => {
                    let checking = CheckingIdentity {
                        proving: ProvingIdentity::AwaitingIdentityChallenge,
                        verifying: VerifyingIdentity::AwaitingIdentityProof {
                            nonce: ctx.fresh_nonce,
                            issued_at: ctx.now,
                            user_id,
                            device_name,
                        },
                    };
                    (
                        ConnectionState::Authenticating(AuthenticatingPhase::CheckingIdentity(checking)),
                        vec![Action::Send(Message::ChallengeIdentity {
                            nonce: ctx.fresh_nonce,
                            timestamp: ctx.now,
                        })],
                    )
                }
                Err(kind) => disconnect(kind),
            }
        }
        IdentityClaim::Invitation {
            proof,
            user_id,
            name,
            public_keys,
        } => {
            let Some(team) = ctx.team else {
                return disconnect(ErrorKind::InvalidInvitation);
            };
            let Some(invitation) = team.invitations().get(&proof.id) else {
                return disconnect(ErrorKind::InvalidInvitation);
            };
            let action = match &invitation.user_id {
                None => Action::AdmitMember {
                    proof,
                    user_id,
                    user_name: name,
                    public_keys: public_keys.clone(),
                },
                Some(existing) => Action::AdmitDevice {
                    proof,
                    user_id: existing.clone(),
                    device_name: name,
                    public_keys: public_keys.clone(),
                },
            };
            (
                ConnectionState::Authenticating(AuthenticatingPhase::CheckingInvitation(
                    InvitationPhase::ValidatingInvitation { public_keys },
                )),
                vec![action],
            )
        }
    }
}
