//! `TeamState`: the derived, in-memory projection of a team's graph.
//!
//! Never persisted directly — always recomputed by [`crate::reduce::reduce`]
//! from the graph's resolved link order (§3).

use concord_crypto::{KeyScope, Keyset, Lockbox};
use concord_graph::Hash as LinkHash;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One team member: a user with zero or more devices and role grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    /// Stable member identifier.
    pub user_id: String,
    /// Display name.
    pub user_name: String,
    /// The member's current (user-scope) keyset.
    pub public_keys: Keyset,
    /// Devices belonging to this member.
    pub devices: Vec<Device>,
    /// Role names currently granted to this member.
    pub roles: Vec<String>,
}

impl Member {
    /// Whether this member currently holds the built-in `"admin"` role.
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }
}

/// A named role and the permission strings it grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    /// The role's name; `"admin"` is reserved (§4.3, §4.2).
    pub role_name: String,
    /// Opaque permission identifiers.
    pub permissions: Vec<String>,
}

/// The name of the built-in administrative role.
pub const ADMIN_ROLE: &str = "admin";

/// One device belonging to a [`Member`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    /// The owning member's id.
    pub user_id: String,
    /// Display name for the device.
    pub device_name: String,
    /// The device's current keyset.
    pub public_keys: Keyset,
}

/// A server participant (§3): authenticates like a device but never holds
/// admin roles and cannot invite or join via invitation (§7 `CANNOT_*_ON_SERVER`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    /// The server's network host identifier.
    pub host: String,
    /// The server's current keyset.
    pub public_keys: Keyset,
}

/// A pending invitation record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invitation {
    /// The invitation's id (derived from its public key, §4.5).
    pub id: String,
    /// The invitation keypair's public half.
    pub public_key: concord_crypto::VerifyingKey,
    /// Unix-epoch seconds after which the invitation is no longer usable.
    pub expiration: u64,
    /// Maximum number of successful admissions.
    pub max_uses: u32,
    /// Number of successful admissions so far.
    pub uses: u32,
    /// Whether the invitation has been explicitly revoked.
    pub revoked: bool,
    /// Set for device invitations: the existing member being extended.
    pub user_id: Option<String>,
}

/// The full derived state of a team at some point in its graph's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamState {
    /// Human-readable team name, set at creation.
    pub team_name: String,
    /// Current members.
    pub members: Vec<Member>,
    /// Current roles.
    pub roles: Vec<Role>,
    /// Current server participants.
    pub servers: Vec<Server>,
    /// All lockboxes ever issued (old generations retained, §4.4).
    pub lockboxes: Vec<Lockbox>,
    /// Open invitations, keyed by id.
    pub invitations: HashMap<String, Invitation>,
    /// Members removed from the team (retained for historic lookback).
    pub removed_members: Vec<Member>,
    /// Devices removed from their member (retained for historic lookback).
    pub removed_devices: Vec<Device>,
    /// Servers removed from the team.
    pub removed_servers: Vec<Server>,
    /// User ids awaiting a key-rotation lockbox (compromise in progress).
    pub pending_key_rotations: Vec<String>,
    /// Latest known public `Keyset` for every scope with its own keyring
    /// (the team scope, and each role), so selectors like `teamKeys()`/
    /// `adminKeys()` can report a generation without needing the secrets.
    pub scope_keys: HashMap<KeyScope, Keyset>,
    /// The graph head this state was folded up to.
    pub head: BTreeSet<LinkHash>,
}

impl TeamState {
    /// An empty state with no team name yet assigned (before `CREATE_TEAM`).
    pub fn empty() -> Self {
        Self {
            team_name: String::new(),
            members: Vec::new(),
            roles: Vec::new(),
            servers: Vec::new(),
            lockboxes: Vec::new(),
            invitations: HashMap::new(),
            removed_members: Vec::new(),
            removed_devices: Vec::new(),
            removed_servers: Vec::new(),
            pending_key_rotations: Vec::new(),
            scope_keys: HashMap::new(),
            head: BTreeSet::new(),
        }
    }

    /// The latest known public keyset for `scope`, if any rotation or
    /// creation event has recorded one.
    pub fn scope_keys(&self, scope: &KeyScope) -> Option<&Keyset> {
        self.scope_keys.get(scope)
    }

    /// Look up a current (non-removed) member by id.
    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    /// Mutable lookup of a current member by id.
    pub fn member_mut(&mut self, user_id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.user_id == user_id)
    }

    /// Whether `user_id` was ever removed from the team.
    pub fn was_removed(&self, user_id: &str) -> bool {
        self.removed_members.iter().any(|m| m.user_id == user_id)
    }

    /// Number of current members holding the admin role.
    pub fn admin_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_admin()).count()
    }

    /// Whether `user_id` is the team's sole remaining admin.
    pub fn is_last_admin(&self, user_id: &str) -> bool {
        self.member(user_id).is_some_and(Member::is_admin) && self.admin_count() == 1
    }
}
