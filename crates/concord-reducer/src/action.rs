//! `TeamAction`: the tagged sum of every team-management operation (§3).
//!
//! Encoded as a link body's `payload` (via bincode) and decoded back by
//! [`crate::transform::transform`] before dispatch.

use concord_crypto::{KeyScope, Keyset, Lockbox, VerifyingKey};
use serde::{Deserialize, Serialize};

/// One team-management action. The `type` field on the wire (via
/// `#[serde(tag = "type")]`) keeps the payload self-describing, matching
/// the "tagged sum" framing in `spec.md` §3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TeamAction {
    /// Found the team: names it and installs the founder as its first,
    /// sole admin member.
    CreateTeam {
        /// Team display name.
        team_name: String,
        /// The founder's user id.
        founder_id: String,
        /// The founder's display name.
        founder_name: String,
        /// The founder's user-scope keyset.
        founder_keys: Keyset,
        /// The team scope's generation-0 keyset.
        team_keys: Keyset,
        /// The built-in admin role's generation-0 keyset.
        admin_role_keys: Keyset,
    },
    /// Add a new member to the team.
    AddMember {
        /// The new member's id.
        user_id: String,
        /// The new member's display name.
        user_name: String,
        /// The new member's user-scope keyset.
        public_keys: Keyset,
        /// Roles granted on admission.
        roles: Vec<String>,
        /// Lockboxes granting the new member's scope access to role/team
        /// keys, created by the dispatcher (who holds the live secrets)
        /// before this action was signed.
        lockboxes: Vec<Lockbox>,
    },
    /// Remove a member from the team.
    RemoveMember {
        /// The member to remove.
        user_id: String,
        /// Rotation lockboxes re-addressing every scope the removed
        /// member could see, generated by the dispatcher per §4.4.
        rotation_lockboxes: Vec<Lockbox>,
        /// Fresh public keysets for every scope rotated as a result of
        /// this removal (the removed member's own scope plus, when they
        /// were an admin, the admin role and everything visible from it).
        rotated_keys: Vec<Keyset>,
    },
    /// Define a new role.
    AddRole {
        /// The new role's name.
        role_name: String,
        /// Permissions it grants.
        permissions: Vec<String>,
    },
    /// Remove a role definition.
    RemoveRole {
        /// The role to remove.
        role_name: String,
    },
    /// Grant a role to a member.
    AddMemberRole {
        /// The member receiving the role.
        user_id: String,
        /// The role being granted.
        role_name: String,
        /// Lockbox granting the member's scope access to the role's keys.
        lockbox: Option<Lockbox>,
    },
    /// Revoke a role from a member.
    RemoveMemberRole {
        /// The member losing the role.
        user_id: String,
        /// The role being revoked.
        role_name: String,
        /// Rotation lockboxes re-addressing the role's key and everything
        /// visible from it, since losing a role is a privilege revocation.
        rotation_lockboxes: Vec<Lockbox>,
        /// Fresh public keysets for the role and everything visible from
        /// it, rotated because losing a role is a privilege revocation.
        rotated_keys: Vec<Keyset>,
    },
    /// Add a device to a member.
    AddDevice {
        /// The owning member's id.
        user_id: String,
        /// Display name for the device.
        device_name: String,
        /// The device's keyset.
        public_keys: Keyset,
    },
    /// Remove a device from a member.
    RemoveDevice {
        /// The owning member's id.
        user_id: String,
        /// The device's scope name.
        device_name: String,
    },
    /// Add a server participant.
    AddServer {
        /// The server's host identifier.
        host: String,
        /// The server's keyset.
        public_keys: Keyset,
    },
    /// Remove a server participant.
    RemoveServer {
        /// The server's host identifier.
        host: String,
    },
    /// Create a member invitation.
    InviteMember {
        /// The invitation's id.
        id: String,
        /// The invitation keypair's public half.
        public_key: VerifyingKey,
        /// Unix-epoch expiration.
        expiration: u64,
        /// Maximum admissions.
        max_uses: u32,
    },
    /// Create a device invitation extending an existing member.
    InviteDevice {
        /// The invitation's id.
        id: String,
        /// The invitation keypair's public half.
        public_key: VerifyingKey,
        /// Unix-epoch expiration.
        expiration: u64,
        /// The member this invitation extends.
        user_id: String,
    },
    /// Revoke an open invitation.
    RevokeInvitation {
        /// The invitation to revoke.
        id: String,
    },
    /// Admit an invitee as a new member, consuming a member invitation.
    AdmitMember {
        /// The invitation id that was used.
        invitation_id: String,
        /// The new member's id.
        user_id: String,
        /// The new member's display name.
        user_name: String,
        /// The new member's real (non-invitation) user-scope keyset.
        public_keys: Keyset,
        /// Lockboxes granting the new member's scope access to team keys.
        lockboxes: Vec<Lockbox>,
    },
    /// Admit an invitee as a new device, consuming a device invitation.
    AdmitDevice {
        /// The invitation id that was used.
        invitation_id: String,
        /// The owning member's id (must match the invitation's `user_id`).
        user_id: String,
        /// Display name for the new device.
        device_name: String,
        /// The new device's real keyset.
        public_keys: Keyset,
        /// Lockboxes granting the new device's scope access to its owner's keys.
        lockboxes: Vec<Lockbox>,
    },
    /// Replace a member's user-scope keyset.
    ChangeMemberKeys {
        /// The member whose keys are changing.
        user_id: String,
        /// The new keyset (generation must be `old.generation + 1`).
        public_keys: Keyset,
    },
    /// Replace a device's keyset.
    ChangeDeviceKeys {
        /// The owning member's id.
        user_id: String,
        /// The device's scope name.
        device_name: String,
        /// The new keyset.
        public_keys: Keyset,
    },
    /// Replace a server's keyset.
    ChangeServerKeys {
        /// The server's host identifier.
        host: String,
        /// The new keyset.
        public_keys: Keyset,
    },
    /// Rotate one or more scopes' keysets and install fresh rotation
    /// lockboxes. Carries every scope rotated in this event, since a
    /// single compromise rotates the compromised scope plus everything
    /// visible from it (§4.4 "Rotation policy").
    RotateKeys {
        /// Fresh public keysets for every scope rotated by this event.
        rotated_keys: Vec<Keyset>,
        /// Scope this rotation was triggered by (for audit/logging).
        triggered_by: KeyScope,
        /// Rotation lockboxes re-addressing every affected scope to the
        /// new generations.
        rotation_lockboxes: Vec<Lockbox>,
    },
}

impl TeamAction {
    /// The wire tag string for this action (matches `action_type` on a
    /// [`concord_graph::LinkBody`]).
    pub fn type_name(&self) -> &'static str {
        match self {
            TeamAction::CreateTeam { .. } => "CREATE_TEAM",
            TeamAction::AddMember { .. } => "ADD_MEMBER",
            TeamAction::RemoveMember { .. } => "REMOVE_MEMBER",
            TeamAction::AddRole { .. } => "ADD_ROLE",
            TeamAction::RemoveRole { .. } => "REMOVE_ROLE",
            TeamAction::AddMemberRole { .. } => "ADD_MEMBER_ROLE",
            TeamAction::RemoveMemberRole { .. } => "REMOVE_MEMBER_ROLE",
            TeamAction::AddDevice { .. } => "ADD_DEVICE",
            TeamAction::RemoveDevice { .. } => "REMOVE_DEVICE",
            TeamAction::AddServer { .. } => "ADD_SERVER",
            TeamAction::RemoveServer { .. } => "REMOVE_SERVER",
            TeamAction::InviteMember { .. } => "INVITE_MEMBER",
            TeamAction::InviteDevice { .. } => "INVITE_DEVICE",
            TeamAction::RevokeInvitation { .. } => "REVOKE_INVITATION",
            TeamAction::AdmitMember { .. } => "ADMIT_MEMBER",
            TeamAction::AdmitDevice { .. } => "ADMIT_DEVICE",
            TeamAction::ChangeMemberKeys { .. } => "CHANGE_MEMBER_KEYS",
            TeamAction::ChangeDeviceKeys { .. } => "CHANGE_DEVICE_KEYS",
            TeamAction::ChangeServerKeys { .. } => "CHANGE_SERVER_KEYS",
            TeamAction::RotateKeys { .. } => "ROTATE_KEYS",
        }
    }
}
