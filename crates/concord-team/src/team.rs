//! `Team`: the high-level façade driving `dispatch → append → merge →
//! reduce` (§5) over one participant's local view of one team's graph.

use crate::cipher::TeamCipher;
use crate::config::TeamConfig;
use crate::error::{ErrorKind, Result};
use crate::events::{EventEmitter, TeamEvent};
use crate::keyring::TeamKeyring;
use crate::rotation::{self, LockboxIndex};
use crate::selectors;
use concord_crypto::{
    create_lockbox, open_lockbox, Hash, KeyScope, Keyset, KeysetWithSecrets, Lockbox,
    SealPublicKey, SigningKey, VerifyingKey,
};
use concord_graph::{Graph, LinkBody};
use concord_reducer::{reduce, Invitation, Member, Role, Server, TeamAction, TeamState, ADMIN_ROLE};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Borrow the team scope's cipher from `keyrings` alone, so the borrow
/// does not extend to the rest of `Team` (its caller still needs a
/// mutable borrow of `graph` in the same statement).
fn team_cipher<'a>(
    keyrings: &'a HashMap<KeyScope, TeamKeyring>,
    team_scope: &KeyScope,
) -> Result<TeamCipher<'a>> {
    keyrings
        .get(team_scope)
        .map(TeamCipher::new)
        .ok_or(ErrorKind::GraphCorrupt)
}

/// Look up `scope`'s currently known signature-verifying key from `state`
/// alone (mirrors [`Team::member_enc_public`]'s scope match), so a caller
/// that also needs a mutable borrow of `graph` in the same statement isn't
/// blocked by borrowing all of `Team`.
fn signer_verifying_key(state: &TeamState, scope: &KeyScope) -> Option<VerifyingKey> {
    match scope.kind {
        concord_crypto::ScopeType::Team | concord_crypto::ScopeType::Role => {
            state.scope_keys(scope).map(|k| k.sig_public)
        }
        concord_crypto::ScopeType::User => state.member(&scope.name).map(|m| m.public_keys.sig_public),
        concord_crypto::ScopeType::Device => state
            .members
            .iter()
            .flat_map(|m| m.devices.iter())
            .find(|d| d.device_name == scope.name)
            .map(|d| d.public_keys.sig_public),
        concord_crypto::ScopeType::Server | concord_crypto::ScopeType::Ephemeral => None,
    }
}

/// One participant's local view of a team: its signed-action graph, the
/// state derived from it, the key material this participant currently
/// holds, and the event listeners watching for changes.
pub struct Team {
    graph: Graph,
    state: TeamState,
    team_name: String,
    user: KeyScope,
    device: KeyScope,
    signing_key: SigningKey,
    /// Every scope this participant currently holds secret keys for
    /// (its own user/device scopes, the team scope, and any role it has
    /// been granted), each with its full generation history.
    keyrings: HashMap<KeyScope, TeamKeyring>,
    lockbox_index: LockboxIndex,
    config: TeamConfig,
    events: EventEmitter,
}

impl Team {
    /// Found a new team, installing `founder_id` as its sole admin.
    ///
    /// Returns the team together with the founder's own user-scope
    /// secrets, since nothing upstream of this call generated them yet.
    pub fn create(
        config: TeamConfig,
        team_name: impl Into<String>,
        founder_id: impl Into<String>,
        founder_name: impl Into<String>,
    ) -> (Self, KeysetWithSecrets) {
        let team_name = team_name.into();
        let founder_id = founder_id.into();
        let founder_name = founder_name.into();

        let user = KeyScope::user(&founder_id);
        let device = KeyScope::device(format!("{founder_id}-device"));
        let signing_key = SigningKey::generate();

        let founder_keys = KeysetWithSecrets::generate(user.clone());
        let team_scope = KeyScope::team(&team_name);
        let team_keys = KeysetWithSecrets::generate(team_scope.clone());
        let admin_role_scope = KeyScope::role(ADMIN_ROLE);
        let admin_role_keys = KeysetWithSecrets::generate(admin_role_scope.clone());

        let mut keyrings = HashMap::new();
        keyrings.insert(user.clone(), TeamKeyring::new(founder_keys.clone()));
        keyrings.insert(team_scope, TeamKeyring::new(team_keys.clone()));
        keyrings.insert(admin_role_scope, TeamKeyring::new(admin_role_keys.clone()));

        let mut team = Self {
            graph: Graph::new(),
            state: TeamState::empty(),
            team_name,
            user,
            device,
            signing_key,
            keyrings,
            lockbox_index: LockboxIndex::new(),
            config,
            events: EventEmitter::new(),
        };

        let action = TeamAction::CreateTeam {
            team_name: team.team_name.clone(),
            founder_id,
            founder_name,
            founder_keys: founder_keys.public.clone(),
            team_keys: team_keys.public,
            admin_role_keys: admin_role_keys.public,
        };
        team.dispatch(action)
            .expect("CREATE_TEAM on a fresh Team cannot fail");
        (team, founder_keys)
    }

    /// Rebuild a `Team` from a previously saved graph and the keyring
    /// material this participant holds (§6 `load(graph, keyring)`).
    pub fn load(
        config: TeamConfig,
        graph: Graph,
        team_name: impl Into<String>,
        user: KeyScope,
        device: KeyScope,
        signing_key: SigningKey,
        keyrings: HashMap<KeyScope, TeamKeyring>,
    ) -> Result<Self> {
        let team_name = team_name.into();
        let team_scope = KeyScope::team(&team_name);
        let cipher = team_cipher(&keyrings, &team_scope)?;
        let state = reduce(TeamState::empty(), &graph, &cipher);
        Ok(Self {
            graph,
            state,
            team_name,
            user,
            device,
            signing_key,
            keyrings,
            lockbox_index: LockboxIndex::new(),
            config,
            events: EventEmitter::new(),
        })
    }

    /// Serialize this team's graph to its versioned wire format (§6).
    pub fn save(&self) -> Vec<u8> {
        concord_graph::save(&self.graph, |h| self.graph.parents_of(h))
    }

    /// Absorb another participant's graph, re-reducing afterward.
    ///
    /// Every incoming link whose signer is already a known device in this
    /// participant's own state must carry a valid signature from that
    /// device's current key (§3); a signer not yet known (its own first
    /// link) is admitted unverified, the same bootstrap trust any fresh
    /// identity's first appearance requires.
    pub fn merge(&mut self, other: &Graph) -> Result<()> {
        let team_scope = self.team_scope();
        let cipher = team_cipher(&self.keyrings, &team_scope)?;
        let prev_of = |h: &Hash| other.decode_body(h, &cipher).ok().map(|b| b.prev);
        let state = &self.state;
        let resolve_signer = |scope: &KeyScope| signer_verifying_key(state, scope);
        self.graph.merge(other, prev_of, resolve_signer)?;
        drop(cipher);
        self.rereduce();
        Ok(())
    }

    /// The configuration this team was built with.
    pub fn config(&self) -> &TeamConfig {
        &self.config
    }

    /// Register an `updated`/... listener (§9 "Event emitter").
    pub fn on_event(&mut self, listener: impl FnMut(&TeamEvent) + Send + 'static) {
        self.events.on(listener);
    }

    fn team_scope(&self) -> KeyScope {
        KeyScope::team(&self.team_name)
    }

    fn admin_role_scope(&self) -> KeyScope {
        KeyScope::role(ADMIN_ROLE)
    }

    fn require_admin(&self) -> Result<()> {
        if selectors::member_is_admin(&self.state, &self.user.name)? {
            Ok(())
        } else {
            Err(ErrorKind::NotAdmin)
        }
    }

    fn rereduce(&mut self) {
        if let Ok(cipher) = team_cipher(&self.keyrings, &self.team_scope()) {
            self.state = reduce(TeamState::empty(), &self.graph, &cipher);
            self.events.emit(TeamEvent::Updated {
                head: self.state.head.clone(),
            });
        }
    }

    fn dispatch(&mut self, action: TeamAction) -> Result<Hash> {
        let body = LinkBody {
            action_type: action.type_name().to_string(),
            payload: bincode::serialize(&action).expect("TeamAction is always serializable"),
            user: self.user.clone(),
            device: self.device.clone(),
            timestamp: now_unix(),
            prev: Vec::new(),
            key_generation: 0,
        };
        let team_scope = self.team_scope();
        let cipher = team_cipher(&self.keyrings, &team_scope)?;
        let hash = self
            .graph
            .append(body, self.device.clone(), &self.signing_key, &cipher)?;
        drop(cipher);
        self.rereduce();
        Ok(hash)
    }

    /// Add a new member, lockboxing the team keys (and any role keys
    /// granted on admission) to their public encryption key.
    pub fn add(
        &mut self,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        public_keys: Keyset,
        roles: Vec<String>,
    ) -> Result<Hash> {
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
        }
        let lockboxes = self.lockbox_current_scopes(&public_keys, &roles)?;
        self.dispatch(TeamAction::AddMember {
            user_id: user_id.into(),
            user_name: user_name.into(),
            public_keys,
            roles,
            lockboxes,
        })
    }

    fn lockbox_current_scopes(&mut self, public_keys: &Keyset, roles: &[String]) -> Result<Vec<Lockbox>> {
        let mut lockboxes = Vec::new();
        let team_scope = self.team_scope();
        if let Some(keyring) = self.keyrings.get(&team_scope) {
            let lockbox = create_lockbox(
                keyring.current(),
                public_keys.keyset_ref(),
                &public_keys.enc_public,
            )?;
            self.lockbox_index.record(lockbox.clone(), team_scope);
            lockboxes.push(lockbox);
        }
        for role_name in roles {
            let role_scope = KeyScope::role(role_name);
            if let Some(keyring) = self.keyrings.get(&role_scope) {
                let lockbox =
                    create_lockbox(keyring.current(), public_keys.keyset_ref(), &public_keys.enc_public)?;
                self.lockbox_index.record(lockbox.clone(), role_scope);
                lockboxes.push(lockbox);
            }
        }
        Ok(lockboxes)
    }

    /// Remove a member, triggering a key rotation of everything they
    /// could see (§4.4 "Rotation policy").
    pub fn remove(&mut self, user_id: &str) -> Result<Hash> {
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
            if self.state.is_last_admin(user_id) {
                return Err(ErrorKind::CannotRemoveLastAdmin);
            }
        }
        let user_scope = KeyScope::user(user_id);
        let (rotated_keys, rotation_lockboxes) = self.rotate(&user_scope);
        self.dispatch(TeamAction::RemoveMember {
            user_id: user_id.to_string(),
            rotation_lockboxes,
            rotated_keys,
        })
    }

    fn rotate(&self, compromised: &KeyScope) -> (Vec<Keyset>, Vec<Lockbox>) {
        rotation::rotate_from(
            compromised,
            &self.state,
            &self.lockbox_index,
            |scope| self.state.scope_keys(scope).map(|k| k.generation),
            |scope, _generation| self.member_enc_public(scope),
        )
    }

    fn member_enc_public(&self, scope: &KeyScope) -> Option<SealPublicKey> {
        match scope.kind {
            concord_crypto::ScopeType::Team | concord_crypto::ScopeType::Role => {
                self.state.scope_keys(scope).map(|k| k.enc_public)
            }
            concord_crypto::ScopeType::User => self
                .state
                .member(&scope.name)
                .map(|m| m.public_keys.enc_public),
            concord_crypto::ScopeType::Device => self
                .state
                .members
                .iter()
                .flat_map(|m| m.devices.iter())
                .find(|d| d.device_name == scope.name)
                .map(|d| d.public_keys.enc_public),
            concord_crypto::ScopeType::Server | concord_crypto::ScopeType::Ephemeral => None,
        }
    }

    /// Define a new role.
    pub fn add_role(&mut self, role_name: impl Into<String>, permissions: Vec<String>) -> Result<Hash> {
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
        }
        self.dispatch(TeamAction::AddRole {
            role_name: role_name.into(),
            permissions,
        })
    }

    /// Remove a role definition.
    pub fn remove_role(&mut self, role_name: &str) -> Result<Hash> {
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
        }
        self.dispatch(TeamAction::RemoveRole {
            role_name: role_name.to_string(),
        })
    }

    /// Grant `role_name` to `user_id`, lockboxing the role's current keys
    /// to them if this participant holds that role's secret keys.
    pub fn add_member_role(&mut self, user_id: &str, role_name: &str) -> Result<Hash> {
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
        }
        let role_scope = KeyScope::role(role_name);
        let lockbox = match (self.keyrings.get(&role_scope), self.state.member(user_id)) {
            (Some(keyring), Some(member)) => {
                let lockbox = create_lockbox(
                    keyring.current(),
                    member.public_keys.keyset_ref(),
                    &member.public_keys.enc_public,
                )?;
                self.lockbox_index.record(lockbox.clone(), role_scope.clone());
                Some(lockbox)
            }
            _ => None,
        };
        self.dispatch(TeamAction::AddMemberRole {
            user_id: user_id.to_string(),
            role_name: role_name.to_string(),
            lockbox,
        })
    }

    /// Revoke `role_name` from `user_id`, triggering a rotation of the
    /// role's scope and everything visible from it.
    pub fn remove_member_role(&mut self, user_id: &str, role_name: &str) -> Result<Hash> {
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
            if role_name == ADMIN_ROLE && self.state.is_last_admin(user_id) {
                return Err(ErrorKind::CannotRemoveLastAdmin);
            }
        }
        let role_scope = KeyScope::role(role_name);
        let (rotated_keys, rotation_lockboxes) = self.rotate(&role_scope);
        self.dispatch(TeamAction::RemoveMemberRole {
            user_id: user_id.to_string(),
            role_name: role_name.to_string(),
            rotation_lockboxes,
            rotated_keys,
        })
    }

    /// Add a device to `user_id`.
    pub fn add_device(&mut self, user_id: &str, device_name: impl Into<String>, public_keys: Keyset) -> Result<Hash> {
        self.dispatch(TeamAction::AddDevice {
            user_id: user_id.to_string(),
            device_name: device_name.into(),
            public_keys,
        })
    }

    /// Remove a device from its owning member.
    pub fn remove_device(&mut self, user_id: &str, device_name: &str) -> Result<Hash> {
        let device_scope = KeyScope::device(device_name);
        let (rotated_keys, rotation_lockboxes) = self.rotate(&device_scope);
        if !rotated_keys.is_empty() {
            self.dispatch(TeamAction::RotateKeys {
                rotated_keys,
                triggered_by: device_scope,
                rotation_lockboxes,
            })?;
        }
        self.dispatch(TeamAction::RemoveDevice {
            user_id: user_id.to_string(),
            device_name: device_name.to_string(),
        })
    }

    /// Add a server participant (never granted admin; §4 server
    /// restrictions).
    pub fn add_server(&mut self, host: impl Into<String>, public_keys: Keyset) -> Result<Hash> {
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
        }
        self.dispatch(TeamAction::AddServer {
            host: host.into(),
            public_keys,
        })
    }

    /// Remove a server participant.
    pub fn remove_server(&mut self, host: &str) -> Result<Hash> {
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
        }
        self.dispatch(TeamAction::RemoveServer {
            host: host.to_string(),
        })
    }

    /// Create a member invitation from a shared secret seed (§4.5
    /// `create`), returning its id for out-of-band delivery alongside the
    /// seed. Servers may never invite (§7 `CANNOT_INVITE_ON_SERVER`).
    pub fn invite_member(&mut self, seed: &str, expiration: u64, max_uses: u32) -> Result<String> {
        if self.user.kind == concord_crypto::ScopeType::Server {
            return Err(ErrorKind::CannotInviteOnServer);
        }
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
        }
        let created = concord_invitation::create(seed);
        self.dispatch(TeamAction::InviteMember {
            id: created.id.clone(),
            public_key: created.public_key,
            expiration,
            max_uses,
        })?;
        Ok(created.id)
    }

    /// Create a device invitation extending an existing member, from a
    /// shared secret seed.
    pub fn invite_device(&mut self, seed: &str, expiration: u64, user_id: impl Into<String>) -> Result<String> {
        if self.user.kind == concord_crypto::ScopeType::Server {
            return Err(ErrorKind::CannotInviteOnServer);
        }
        let created = concord_invitation::create(seed);
        self.dispatch(TeamAction::InviteDevice {
            id: created.id.clone(),
            public_key: created.public_key,
            expiration,
            user_id: user_id.into(),
        })?;
        Ok(created.id)
    }

    /// Revoke an open invitation.
    pub fn revoke_invitation(&mut self, id: &str) -> Result<Hash> {
        if self.config.enforce_dispatch_invariants {
            self.require_admin()?;
        }
        self.dispatch(TeamAction::RevokeInvitation { id: id.to_string() })
    }

    /// Admit an invitee as a new member, consuming the invitation that
    /// `proof` was generated against.
    pub fn admit_member(
        &mut self,
        proof: &concord_invitation::Proof,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        public_keys: Keyset,
    ) -> Result<Hash> {
        self.check_invitation_usable(&proof.id)?;
        self.verify_invitation_proof(proof)?;
        let lockboxes = self.lockbox_current_scopes(&public_keys, &[])?;
        self.dispatch(TeamAction::AdmitMember {
            invitation_id: proof.id.clone(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            public_keys,
            lockboxes,
        })
    }

    /// Admit an invitee as a new device of an existing member, consuming
    /// the invitation that `proof` was generated against.
    pub fn admit_device(
        &mut self,
        proof: &concord_invitation::Proof,
        user_id: &str,
        device_name: impl Into<String>,
        public_keys: Keyset,
    ) -> Result<Hash> {
        self.check_invitation_usable(&proof.id)?;
        self.verify_invitation_proof(proof)?;
        let invitation = self
            .state
            .invitations
            .get(&proof.id)
            .ok_or(ErrorKind::InvalidInvitation)?;
        if invitation.user_id.as_deref() != Some(user_id) {
            return Err(ErrorKind::InvalidInvitation);
        }
        let lockboxes = self.lockbox_current_scopes(&public_keys, &[])?;
        self.dispatch(TeamAction::AdmitDevice {
            invitation_id: proof.id.clone(),
            user_id: user_id.to_string(),
            device_name: device_name.into(),
            public_keys,
            lockboxes,
        })
    }

    /// Verify that `proof` was generated from the seed this invitation
    /// was created with (§4.5), without the seed ever having to transit
    /// the wire.
    fn verify_invitation_proof(&self, proof: &concord_invitation::Proof) -> Result<()> {
        let invitation = self
            .state
            .invitations
            .get(&proof.id)
            .ok_or(ErrorKind::InvalidInvitation)?;
        concord_invitation::validate(proof, &invitation.public_key)?;
        Ok(())
    }

    fn check_invitation_usable(&self, invitation_id: &str) -> Result<()> {
        let invitation = self
            .state
            .invitations
            .get(invitation_id)
            .ok_or(ErrorKind::InvalidInvitation)?;
        concord_invitation::invitation_can_be_used(
            invitation.revoked,
            invitation.uses,
            invitation.max_uses,
            now_unix(),
            invitation.expiration,
        )
        .then_some(())
        .ok_or_else(|| {
            if invitation.revoked {
                ErrorKind::RevokedInvitation
            } else if invitation.uses >= invitation.max_uses {
                ErrorKind::UsedInvitation
            } else {
                ErrorKind::ExpiredInvitation
            }
        })
    }

    /// Join a team as a freshly admitted participant, given the graph
    /// and keyring handed over by the admitting peer during invitation
    /// acceptance (§4.6 "Invitee path").
    pub fn join(
        config: TeamConfig,
        graph: Graph,
        team_name: impl Into<String>,
        user: KeyScope,
        device: KeyScope,
        signing_key: SigningKey,
        keyrings: HashMap<KeyScope, TeamKeyring>,
    ) -> Result<Self> {
        Self::load(config, graph, team_name, user, device, signing_key, keyrings)
    }

    /// Replace this participant's own user-scope keyset.
    pub fn change_member_keys(&mut self, public_keys: Keyset) -> Result<Hash> {
        let user_id = self.user.name.clone();
        self.keyrings.insert(
            self.user.clone(),
            TeamKeyring::new(KeysetWithSecrets::generate_at(self.user.clone(), public_keys.generation)),
        );
        self.dispatch(TeamAction::ChangeMemberKeys { user_id, public_keys })
    }

    /// Encrypt application data under the team's current key (§1
    /// "convenience wrapping the team scope").
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let keyring = self
            .keyrings
            .get(&self.team_scope())
            .ok_or(ErrorKind::GraphCorrupt)?;
        let key = crate::cipher::derive_application_key(&keyring.current().enc_secret);
        concord_crypto::symmetric_encrypt(plaintext, &key).map_err(ErrorKind::from)
    }

    /// Decrypt application data previously produced by [`Team::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let keyring = self
            .keyrings
            .get(&self.team_scope())
            .ok_or(ErrorKind::GraphCorrupt)?;
        let key = crate::cipher::derive_application_key(&keyring.current().enc_secret);
        concord_crypto::symmetric_decrypt(ciphertext, &key).map_err(ErrorKind::from)
    }

    /// Sign `message` with this participant's device signing key.
    pub fn sign(&self, message: &[u8]) -> concord_crypto::Signature {
        self.signing_key.sign(message)
    }

    /// The public half of this participant's device signing key — what a
    /// peer's `lookupIdentity` must see registered as this device's
    /// `Device.publicKeys.sig_public` for an identity proof to verify
    /// (§4.6 "Identity proof"). `create`/`join` generate the signing key
    /// itself but register no `Device` entry for it; callers publish one
    /// with this key via [`Team::add_device`] once they hold dispatch
    /// rights, the same way any other device is added.
    pub fn device_verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Verify a signature against `public_key`.
    pub fn verify(&self, message: &[u8], signature: &concord_crypto::Signature, public_key: &VerifyingKey) -> bool {
        concord_crypto::verify(message, signature, public_key)
    }

    /// `scope`'s currently known signature-verifying key, if this
    /// participant's state has one on file — what a graph fragment
    /// received out of band (e.g. during invitation acceptance, before a
    /// `Team` exists to call [`Team::merge`] on) should verify incoming
    /// links' signatures against.
    pub fn signer_verifying_key(&self, scope: &KeyScope) -> Option<VerifyingKey> {
        signer_verifying_key(&self.state, scope)
    }

    /// Open a lockbox addressed to one of this participant's own scopes,
    /// installing the delivered keyset into its keyring.
    pub fn accept_lockbox(&mut self, recipient_scope: KeyScope, lockbox: &Lockbox) -> Result<()> {
        let keyring = self
            .keyrings
            .get(&recipient_scope)
            .ok_or(ErrorKind::DeviceUnknown)?;
        let secret = keyring.current().enc_secret.clone();
        let delivered = open_lockbox(lockbox, &secret)?;
        let contents_scope = delivered.public.scope.clone();
        self.keyrings
            .entry(contents_scope.clone())
            .or_insert_with(|| TeamKeyring::new(delivered.clone()))
            .install(delivered);
        self.lockbox_index.record(lockbox.clone(), contents_scope);
        Ok(())
    }

    /// Seal one of this participant's currently held scopes to `recipient`,
    /// for delivery outside the graph during a connection handshake (§4.6)
    /// — e.g. handing a freshly admitted member the team and role keys they
    /// need before they can decrypt anything in the graph themselves.
    ///
    /// Distinct from the lockboxes recorded inside `AddMember`/`AdmitMember`
    /// links: those are for *existing* members who can already decrypt the
    /// graph to learn who else has access. A brand-new member cannot, so
    /// the admitting peer must hand this over directly.
    pub fn lockbox_for(&self, scope: &KeyScope, recipient: &Keyset) -> Result<Lockbox> {
        let keyring = self.keyrings.get(scope).ok_or(ErrorKind::GraphCorrupt)?;
        Ok(create_lockbox(
            keyring.current(),
            recipient.keyset_ref(),
            &recipient.enc_public,
        )?)
    }

    /// Open something sealed to this participant's own user-scope
    /// encryption key — e.g. the peer's half of a session seed during
    /// connection negotiation (§4.6 "Session-key negotiation"). Device
    /// scopes hold no encryption secret of their own in this workspace,
    /// so the user scope is the encryption identity a connection's own
    /// secrets are addressed to.
    pub fn open_sealed(&self, sealed: &concord_crypto::Sealed) -> Result<Vec<u8>> {
        let keyring = self.keyrings.get(&self.user).ok_or(ErrorKind::GraphCorrupt)?;
        Ok(concord_crypto::open_sealed(
            sealed,
            &keyring.current().enc_secret,
        )?)
    }

    // --- selectors ---

    /// This participant's own user id, for a `Connection` to claim during
    /// the identity handshake (§4.6).
    pub fn user_id(&self) -> &str {
        &self.user.name
    }

    /// This participant's own device name.
    pub fn device_name(&self) -> &str {
        &self.device.name
    }

    /// This participant's own device scope.
    pub fn device_scope(&self) -> KeyScope {
        self.device.clone()
    }

    /// Whether `user_id` is a current (non-removed) member.
    pub fn has(&self, user_id: &str) -> bool {
        selectors::has(&self.state, user_id)
    }

    /// Current members.
    pub fn members(&self) -> &[Member] {
        selectors::members(&self.state)
    }

    /// Current role definitions.
    pub fn roles(&self) -> &[Role] {
        selectors::roles(&self.state)
    }

    /// Current server participants.
    pub fn servers(&self) -> &[Server] {
        selectors::servers(&self.state)
    }

    /// Open invitations.
    pub fn invitations(&self) -> &HashMap<String, Invitation> {
        selectors::invitations(&self.state)
    }

    /// Whether `user_id` currently holds the admin role.
    pub fn member_is_admin(&self, user_id: &str) -> Result<bool> {
        Ok(selectors::member_is_admin(&self.state, user_id)?)
    }

    /// Whether `user_id` was ever a member and was later removed.
    pub fn member_was_removed(&self, user_id: &str) -> bool {
        selectors::member_was_removed(&self.state, user_id)
    }

    /// Whether `user_id` once had a `device_name` device that was later
    /// removed.
    pub fn device_was_removed(&self, user_id: &str, device_name: &str) -> bool {
        selectors::device_was_removed(&self.state, user_id, device_name)
    }

    /// The team scope's current public keyset.
    pub fn team_keys(&self) -> Option<&Keyset> {
        selectors::team_keys(&self.state, &self.team_scope())
    }

    /// The built-in admin role's current public keyset.
    pub fn admin_keys(&self) -> Option<&Keyset> {
        selectors::admin_keys(&self.state, &self.admin_role_scope())
    }

    /// The graph head this team's derived state reflects.
    pub fn head(&self) -> &std::collections::BTreeSet<Hash> {
        &self.state.head
    }

    /// Borrow the underlying graph, e.g. to drive a `Connection`'s sync.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}
