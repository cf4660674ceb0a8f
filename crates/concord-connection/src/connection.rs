//! `Connection`: the effectful driver around the pure [`crate::transition`]
//! core. Owns one peer's handshake/sync session, executes the
//! [`Action`]s `step` returns — including the two that need a `&mut
//! Team` the pure core cannot hold, admitting an invitee and merging a
//! graph fragment — and surfaces [`ConnectionEvent`]s to its caller.

use crate::message::{IdentityClaim, Message};
use crate::session::SessionHalf;
use crate::state::{ConnectionState, Deadline};
use crate::transition::{self, Action, Context, Event, LocalIdentity};
use concord_crypto::{random_key, Keyset, KeysetWithSecrets, SigningKey, SymmetricKey};
use concord_invitation::Proof;
use concord_team::{ErrorKind, Team, TeamConfig};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// What a [`Connection`] reports to its host as the handshake progresses.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The session key is up and application traffic may flow.
    Connected,
    /// A brand-new participant finished joining the team through this
    /// connection (invitee path only).
    Joined {
        /// The invitee's own user id, as admitted.
        user_id: String,
    },
    /// The team's derived state changed as a result of this connection.
    Updated,
    /// The connection ended.
    Disconnected,
    /// A local decision rejected the peer.
    LocalError(ErrorKind),
    /// The peer rejected or disconnected us.
    RemoteError(ErrorKind),
}

/// What the invitee side needs before it has a [`Team`] at all: its own
/// freshly generated secrets and the invitation proof it is presenting.
pub struct InviteeCredentials {
    /// Proof of the seed the invitation was created from.
    pub proof: Proof,
    /// The user id to admit as (member invitations only — ignored by the
    /// admitter for a device invitation, which is already bound to an
    /// existing user).
    pub user_id: String,
    /// Display name (member invitation) or device name (device
    /// invitation).
    pub name: String,
    /// This device's own freshly generated link-signing key.
    pub device_signing_key: SigningKey,
    /// This participant's freshly generated user-scope keyset.
    pub user_secrets: KeysetWithSecrets,
}

enum Identity {
    Device,
    Invitee(InviteeCredentials),
}

/// One peer connection's handshake/sync/negotiation session (§4.6).
pub struct Connection {
    state: ConnectionState,
    deadline: Deadline,
    timeout: Duration,
    team: Option<Team>,
    config: TeamConfig,
    team_name: String,
    identity: Identity,
    own_user_id: String,
    own_device_name: String,
    session_half: SessionHalf,
    peer_head: Option<std::collections::BTreeSet<concord_crypto::Hash>>,
    pending_peer_device_claim: Option<(String, String)>,
    session_key: Option<SymmetricKey>,
}

impl Connection {
    /// Start a connection as an existing member claiming one of its own
    /// devices, already holding `team`.
    pub fn new_device(team: Team) -> Self {
        let config = team.config().clone();
        let own_user_id = team.user_id().to_string();
        let own_device_name = team.device_name().to_string();
        let team_name = team
            .team_keys()
            .map(|k| k.scope.name.clone())
            .unwrap_or_default();
        Self {
            state: ConnectionState::Disconnected,
            deadline: Deadline::now(),
            timeout: config.connection_timeout,
            team: Some(team),
            config,
            team_name,
            identity: Identity::Device,
            own_user_id,
            own_device_name,
            session_half: SessionHalf::generate(),
            peer_head: None,
            pending_peer_device_claim: None,
            session_key: None,
        }
    }

    /// Start a connection as an invitee with no team yet, presenting
    /// `credentials` in `HELLO`.
    pub fn new_invitee(config: TeamConfig, team_name: impl Into<String>, credentials: InviteeCredentials) -> Self {
        let team_name = team_name.into();
        let own_user_id = credentials.user_id.clone();
        let own_device_name = credentials.name.clone();
        Self {
            state: ConnectionState::Disconnected,
            deadline: Deadline::now(),
            timeout: config.connection_timeout,
            team: None,
            config,
            team_name,
            identity: Identity::Invitee(credentials),
            own_user_id,
            own_device_name,
            session_half: SessionHalf::generate(),
            peer_head: None,
            pending_peer_device_claim: None,
            session_key: None,
        }
    }

    /// The peer's user-scope public keys, once their `(user_id,
    /// device_name)` claim is known and a team is available to resolve
    /// it against — what a `SEED` reply must be addressed to, since this
    /// participant only ever holds its own decryption secret at user
    /// scope (see [`concord_team::Team::open_sealed`]).
    fn peer_user_keys(&self) -> Option<Keyset> {
        let team = self.team.as_ref()?;
        let (user_id, _) = self.pending_peer_device_claim.as_ref()?;
        team.members().iter().find(|m| &m.user_id == user_id).map(|m| m.public_keys.clone())
    }

    fn local_identity(&self) -> LocalIdentity {
        match &self.identity {
            Identity::Device => LocalIdentity::Device,
            Identity::Invitee(creds) => LocalIdentity::Invitation {
                proof: creds.proof.clone(),
                user_id: creds.user_id.clone(),
                name: creds.name.clone(),
                public_keys: creds.user_secrets.public.clone(),
            },
        }
    }

    /// Enter `awaitingIdentityClaim`, returning the opening `HELLO` for
    /// the caller to send.
    pub fn start(&mut self) -> Message {
        let local = self.local_identity();
        let (state, hello) = transition::start(&local, &self.own_user_id, &self.own_device_name);
        self.state = state;
        self.deadline = Deadline::now();
        hello
    }

    /// The connection's established session key, once `connected`.
    pub fn session_key(&self) -> Option<&SymmetricKey> {
        self.session_key.as_ref()
    }

    /// The team this connection has built or was given, once available.
    pub fn team(&self) -> Option<&Team> {
        self.team.as_ref()
    }

    /// Whether the connection has been sitting in a non-`connected` state
    /// longer than its configured timeout (§4.6 "Cancellation / timeout").
    pub fn is_overdue(&self) -> bool {
        self.state.is_timeout_eligible() && self.deadline.has_elapsed(self.timeout)
    }

    fn context(&self) -> Context<'_> {
        Context {
            team: self.team.as_ref(),
            local: self.local_identity(),
            now: now_unix(),
            fresh_nonce: random_key(),
            our_session_half: self.session_half,
            peer_keys: self.peer_user_keys(),
            peer_head: self.peer_head.clone(),
        }
    }

    /// Deliver one message from the peer, advancing the handshake and
    /// returning whatever outgoing messages and events resulted.
    pub fn deliver(&mut self, message: Message) -> (Vec<Message>, Vec<ConnectionEvent>) {
        if self.team.is_none() {
            if let Some(outcome) = self.handle_invitee_preamble(&message) {
                return outcome;
            }
        }
        if let Message::Hello {
            claim: IdentityClaim::Device { user_id, device_name },
            ..
        } = &message
        {
            self.pending_peer_device_claim = Some((user_id.clone(), device_name.clone()));
        }
        let ctx = self.context();
        let (next, actions) = transition::step(&self.state, Event::Received(message), &ctx);
        self.apply(next, actions)
    }

    /// Tell the connection its deadline elapsed.
    pub fn timed_out(&mut self) -> (Vec<Message>, Vec<ConnectionEvent>) {
        let ctx = self.context();
        let (next, actions) = transition::step(&self.state, Event::TimedOut, &ctx);
        self.apply(next, actions)
    }

    /// Handle the one leg of the handshake the pure core cannot see: an
    /// invitee with no `Team` yet receiving `ACCEPT_INVITATION`, or
    /// noting (but not yet verifying) the admitter's own `HELLO`.
    fn handle_invitee_preamble(&mut self, message: &Message) -> Option<(Vec<Message>, Vec<ConnectionEvent>)> {
        match message {
            Message::Hello {
                claim: IdentityClaim::Device { user_id, device_name },
                ..
            } => {
                self.pending_peer_device_claim = Some((user_id.clone(), device_name.clone()));
                Some((Vec::new(), Vec::new()))
            }
            Message::AcceptInvitation {
                graph,
                team_keys,
                admin_keys,
            } => Some(self.accept_invitation(graph, team_keys, admin_keys.as_ref())),
            _ => None,
        }
    }

    fn accept_invitation(
        &mut self,
        graph_bytes: &[u8],
        team_keys: &concord_crypto::Lockbox,
        admin_keys: Option<&concord_crypto::Lockbox>,
    ) -> (Vec<Message>, Vec<ConnectionEvent>) {
        let Identity::Invitee(creds) = &self.identity else {
            return (Vec::new(), Vec::new());
        };
        // No team state exists yet to check signers against; the
        // connection's identity handshake is the trust anchor here, not
        // per-link re-verification.
        let (graph, _edges) = match concord_graph::load(graph_bytes, |_| None) {
            Ok(loaded) => loaded,
            Err(_) => return (Vec::new(), vec![ConnectionEvent::LocalError(ErrorKind::GraphCorrupt)]),
        };

        let user_scope = concord_crypto::KeyScope::user(&creds.user_id);
        let device_scope = concord_crypto::KeyScope::device(&creds.name);
        let mut keyrings = HashMap::new();
        keyrings.insert(user_scope.clone(), concord_team::TeamKeyring::new(creds.user_secrets.clone()));

        let team_delivered = match concord_crypto::open_lockbox(team_keys, &creds.user_secrets.enc_secret) {
            Ok(delivered) => delivered,
            Err(_) => return (Vec::new(), vec![ConnectionEvent::LocalError(ErrorKind::DecryptionFailed)]),
        };
        keyrings.insert(team_delivered.public.scope.clone(), concord_team::TeamKeyring::new(team_delivered));

        if let Some(admin_lockbox) = admin_keys {
            if let Ok(admin_delivered) = concord_crypto::open_lockbox(admin_lockbox, &creds.user_secrets.enc_secret) {
                keyrings.insert(admin_delivered.public.scope.clone(), concord_team::TeamKeyring::new(admin_delivered));
            }
        }

        let signing_key = creds.device_signing_key.clone();
        let team = match Team::join(
            self.config.clone(),
            graph,
            self.team_name.clone(),
            user_scope,
            device_scope,
            signing_key,
            keyrings,
        ) {
            Ok(team) => team,
            Err(kind) => return (Vec::new(), vec![ConnectionEvent::LocalError(kind)]),
        };

        self.team = Some(team);
        self.state = ConnectionState::Negotiating(crate::state::NegotiatingPhase::AwaitingSeed);
        self.deadline = Deadline::now();

        let mut messages = Vec::new();
        if let Some(peer_keys) = self.peer_user_keys() {
            if let Ok(sealed) = self.session_half.seal_to(&peer_keys.enc_public) {
                messages.push(Message::Seed { sealed_half: sealed });
            }
        }
        (messages, vec![ConnectionEvent::Joined { user_id: creds.user_id.clone() }])
    }

    /// Execute the driver-side actions `step` asked for — admitting an
    /// invitee, merging a graph fragment, or installing the session key —
    /// looping back into `step` with the outcome when a mutation changes
    /// what the pure core would decide next.
    fn apply(&mut self, mut next: ConnectionState, actions: Vec<Action>) -> (Vec<Message>, Vec<ConnectionEvent>) {
        let mut messages = Vec::new();
        let mut events = Vec::new();
        let mut followup: Option<Event> = None;

        for action in actions {
            match action {
                Action::Send(message) => {
                    if let Message::Sync { head, .. } = &message {
                        self.peer_head = Some(head.clone());
                    }
                    messages.push(message);
                }
                Action::AdmitMember {
                    proof,
                    user_id,
                    user_name,
                    public_keys,
                } => {
                    let team = self.team.as_mut().expect("admitter always has a team");
                    let result = team.admit_member(&proof, user_id, user_name, public_keys).map(|_| ());
                    if result.is_ok() {
                        events.push(ConnectionEvent::Updated);
                    }
                    followup = Some(Event::Admitted(result));
                }
                Action::AdmitDevice {
                    proof,
                    user_id,
                    device_name,
                    public_keys,
                } => {
                    let team = self.team.as_mut().expect("admitter always has a team");
                    let result = team.admit_device(&proof, &user_id, device_name, public_keys).map(|_| ());
                    if result.is_ok() {
                        events.push(ConnectionEvent::Updated);
                    }
                    followup = Some(Event::Admitted(result));
                }
                Action::Merge(graph_bytes) => {
                    let team = self.team.as_ref();
                    let loaded = concord_graph::load(&graph_bytes, |scope| {
                        team.and_then(|t| t.signer_verifying_key(scope))
                    });
                    let outcome = loaded.map_err(|_| ErrorKind::GraphCorrupt).and_then(|(graph, _)| {
                        self.team
                            .as_mut()
                            .expect("synchronizing always has a team")
                            .merge(&graph)
                    });
                    if outcome.is_ok() {
                        events.push(ConnectionEvent::Updated);
                    }
                    followup = Some(Event::Merged(outcome));
                }
                Action::SessionEstablished(key) => {
                    self.session_key = Some(key);
                }
                Action::EmitConnected => events.push(ConnectionEvent::Connected),
                Action::EmitLocalError(kind) => events.push(ConnectionEvent::LocalError(kind)),
                Action::EmitRemoteError(kind) => events.push(ConnectionEvent::RemoteError(kind)),
            }
        }

        if next == ConnectionState::Disconnected {
            events.push(ConnectionEvent::Disconnected);
        }
        self.state = next.clone();
        self.deadline = Deadline::now();

        if let Some(event) = followup {
            let ctx = self.context();
            let (followup_next, followup_actions) = transition::step(&self.state, event, &ctx);
            next = followup_next;
            let (mut more_messages, mut more_events) = self.apply(next, followup_actions);
            messages.append(&mut more_messages);
            events.append(&mut more_events);
        }

        (messages, events)
    }
}
