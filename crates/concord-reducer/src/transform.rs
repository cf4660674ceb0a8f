//! One total, infallible transform per [`TeamAction`] variant, dispatched
//! by [`transform`]. Malformed or impossible states — a malicious peer's
//! link claiming an action that violates an invariant — are absorbed as
//! a no-op and logged, never a panic (§7, §4.2).

use crate::action::TeamAction;
use crate::state::{Device, Invitation, Member, Role, Server, TeamState, ADMIN_ROLE};
use concord_graph::Link;

/// Fold one decoded action into `state`, mutating it in place.
///
/// `link` is the already-verified, already-decrypted link the action was
/// carried in; its `signer`/author scope is available to transforms that
/// need to know who performed the action, but transforms never fail —
/// authorization is the resolver's and dispatcher's job, not the fold's.
pub fn transform(state: &mut TeamState, _link: &Link, action: TeamAction) {
    match action {
        TeamAction::CreateTeam {
            team_name,
            founder_id,
            founder_name,
            founder_keys,
            team_keys,
            admin_role_keys,
        } => apply_create_team(
            state,
            team_name,
            founder_id,
            founder_name,
            founder_keys,
            team_keys,
            admin_role_keys,
        ),
        TeamAction::AddMember {
            user_id,
            user_name,
            public_keys,
            roles,
            lockboxes,
        } => apply_add_member(state, user_id, user_name, public_keys, roles, lockboxes),
        TeamAction::RemoveMember {
            user_id,
            rotation_lockboxes,
            rotated_keys,
        } => apply_remove_member(state, &user_id, rotation_lockboxes, rotated_keys),
        TeamAction::AddRole {
            role_name,
            permissions,
        } => apply_add_role(state, role_name, permissions),
        TeamAction::RemoveRole { role_name } => apply_remove_role(state, &role_name),
        TeamAction::AddMemberRole {
            user_id,
            role_name,
            lockbox,
        } => apply_add_member_role(state, &user_id, role_name, lockbox),
        TeamAction::RemoveMemberRole {
            user_id,
            role_name,
            rotation_lockboxes,
            rotated_keys,
        } => apply_remove_member_role(state, &user_id, &role_name, rotation_lockboxes, rotated_keys),
        TeamAction::AddDevice {
            user_id,
            device_name,
            public_keys,
        } => apply_add_device(state, &user_id, device_name, public_keys),
        TeamAction::RemoveDevice {
            user_id,
            device_name,
        } => apply_remove_device(state, &user_id, &device_name),
        TeamAction::AddServer { host, public_keys } => apply_add_server(state, host, public_keys),
        TeamAction::RemoveServer { host } => apply_remove_server(state, &host),
        TeamAction::InviteMember {
            id,
            public_key,
            expiration,
            max_uses,
        } => apply_invite_member(state, id, public_key, expiration, max_uses),
        TeamAction::InviteDevice {
            id,
            public_key,
            expiration,
            user_id,
        } => apply_invite_device(state, id, public_key, expiration, user_id),
        TeamAction::RevokeInvitation { id } => apply_revoke_invitation(state, &id),
        TeamAction::AdmitMember {
            invitation_id,
            user_id,
            user_name,
            public_keys,
            lockboxes,
        } => apply_admit_member(state, &invitation_id, user_id, user_name, public_keys, lockboxes),
        TeamAction::AdmitDevice {
            invitation_id,
            user_id,
            device_name,
            public_keys,
            lockboxes,
        } => apply_admit_device(state, &invitation_id, &user_id, device_name, public_keys, lockboxes),
        TeamAction::ChangeMemberKeys {
            user_id,
            public_keys,
        } => apply_change_member_keys(state, &user_id, public_keys),
        TeamAction::ChangeDeviceKeys {
            user_id,
            device_name,
            public_keys,
        } => apply_change_device_keys(state, &user_id, &device_name, public_keys),
        TeamAction::ChangeServerKeys { host, public_keys } => {
            apply_change_server_keys(state, &host, public_keys)
        }
        TeamAction::RotateKeys {
            rotated_keys,
            triggered_by,
            rotation_lockboxes,
        } => apply_rotate_keys(state, &triggered_by, rotated_keys, rotation_lockboxes),
    }
}

fn apply_create_team(
    state: &mut TeamState,
    team_name: String,
    founder_id: String,
    founder_name: String,
    founder_keys: concord_crypto::Keyset,
    team_keys: concord_crypto::Keyset,
    admin_role_keys: concord_crypto::Keyset,
) {
    if !state.team_name.is_empty() {
        tracing::warn!(team = %team_name, "ignoring duplicate CREATE_TEAM");
        return;
    }
    state.team_name = team_name;
    state.members.push(Member {
        user_id: founder_id,
        user_name: founder_name,
        public_keys: founder_keys,
        devices: Vec::new(),
        roles: vec![ADMIN_ROLE.to_string()],
    });
    state.roles.push(Role {
        role_name: ADMIN_ROLE.to_string(),
        permissions: vec!["*".to_string()],
    });
    state.scope_keys.insert(team_keys.scope.clone(), team_keys);
    state.scope_keys.insert(admin_role_keys.scope.clone(), admin_role_keys);
}

fn apply_add_member(
    state: &mut TeamState,
    user_id: String,
    user_name: String,
    public_keys: concord_crypto::Keyset,
    roles: Vec<String>,
    lockboxes: Vec<concord_crypto::Lockbox>,
) {
    if state.member(&user_id).is_some() && !state.was_removed(&user_id) {
        tracing::warn!(user_id, "ignoring ADD_MEMBER for already-present member");
        return;
    }
    state.removed_members.retain(|m| m.user_id != user_id);
    state.members.push(Member {
        user_id,
        user_name,
        public_keys,
        devices: Vec::new(),
        roles,
    });
    state.lockboxes.extend(lockboxes);
}

fn apply_remove_member(
    state: &mut TeamState,
    user_id: &str,
    rotation_lockboxes: Vec<concord_crypto::Lockbox>,
    rotated_keys: Vec<concord_crypto::Keyset>,
) {
    let Some(pos) = state.members.iter().position(|m| m.user_id == user_id) else {
        tracing::warn!(user_id, "ignoring REMOVE_MEMBER for unknown member");
        return;
    };
    if state.is_last_admin(user_id) {
        tracing::warn!(user_id, "ignoring REMOVE_MEMBER that would remove the last admin");
        return;
    }
    let member = state.members.remove(pos);
    let was_admin = member.is_admin();
    state.removed_devices.extend(member.devices.clone());
    state.removed_members.push(member);

    if was_admin {
        tracing::debug!(user_id, rotated = rotated_keys.len(), "admin removal triggers key rotation");
        state.pending_key_rotations.push(user_id.to_string());
    }
    for keys in rotated_keys {
        state.scope_keys.insert(keys.scope.clone(), keys);
    }
    state.lockboxes.extend(rotation_lockboxes);
}

fn apply_add_role(state: &mut TeamState, role_name: String, permissions: Vec<String>) {
    if state.roles.iter().any(|r| r.role_name == role_name) {
        tracing::warn!(role_name, "ignoring ADD_ROLE for already-defined role");
        return;
    }
    state.roles.push(Role {
        role_name,
        permissions,
    });
}

fn apply_remove_role(state: &mut TeamState, role_name: &str) {
    if role_name == ADMIN_ROLE {
        tracing::warn!("ignoring REMOVE_ROLE for the built-in admin role");
        return;
    }
    state.roles.retain(|r| r.role_name != role_name);
    for member in &mut state.members {
        member.roles.retain(|r| r != role_name);
    }
}

fn apply_add_member_role(
    state: &mut TeamState,
    user_id: &str,
    role_name: String,
    lockbox: Option<concord_crypto::Lockbox>,
) {
    let role_exists = state.roles.iter().any(|r| r.role_name == role_name);
    let Some(member) = state.member_mut(user_id) else {
        tracing::warn!(user_id, "ignoring ADD_MEMBER_ROLE for unknown member");
        return;
    };
    if !role_exists {
        tracing::warn!(role_name, "ignoring ADD_MEMBER_ROLE for undefined role");
        return;
    }
    if !member.roles.contains(&role_name) {
        member.roles.push(role_name);
    }
    if let Some(lockbox) = lockbox {
        state.lockboxes.push(lockbox);
    }
}

fn apply_remove_member_role(
    state: &mut TeamState,
    user_id: &str,
    role_name: &str,
    rotation_lockboxes: Vec<concord_crypto::Lockbox>,
    rotated_keys: Vec<concord_crypto::Keyset>,
) {
    if role_name == ADMIN_ROLE && state.is_last_admin(user_id) {
        tracing::warn!(user_id, "ignoring REMOVE_MEMBER_ROLE that would demote the last admin");
        return;
    }
    let Some(member) = state.member_mut(user_id) else {
        tracing::warn!(user_id, "ignoring REMOVE_MEMBER_ROLE for unknown member");
        return;
    };
    member.roles.retain(|r| r != role_name);
    for keys in rotated_keys {
        state.scope_keys.insert(keys.scope.clone(), keys);
    }
    state.lockboxes.extend(rotation_lockboxes);
}

fn apply_add_device(
    state: &mut TeamState,
    user_id: &str,
    device_name: String,
    public_keys: concord_crypto::Keyset,
) {
    let Some(member) = state.member_mut(user_id) else {
        tracing::warn!(user_id, "ignoring ADD_DEVICE for unknown member");
        return;
    };
    if member.devices.iter().any(|d| d.device_name == device_name) {
        tracing::warn!(user_id, device_name, "ignoring ADD_DEVICE for already-present device");
        return;
    }
    member.devices.push(Device {
        user_id: user_id.to_string(),
        device_name,
        public_keys,
    });
}

fn apply_remove_device(state: &mut TeamState, user_id: &str, device_name: &str) {
    let Some(member) = state.member_mut(user_id) else {
        tracing::warn!(user_id, "ignoring REMOVE_DEVICE for unknown member");
        return;
    };
    let Some(pos) = member.devices.iter().position(|d| d.device_name == device_name) else {
        tracing::warn!(user_id, device_name, "ignoring REMOVE_DEVICE for unknown device");
        return;
    };
    let device = member.devices.remove(pos);
    state.removed_devices.push(device);
}

fn apply_add_server(state: &mut TeamState, host: String, public_keys: concord_crypto::Keyset) {
    if state.servers.iter().any(|s| s.host == host) {
        tracing::warn!(host, "ignoring ADD_SERVER for already-present host");
        return;
    }
    state.servers.push(Server { host, public_keys });
}

fn apply_remove_server(state: &mut TeamState, host: &str) {
    let Some(pos) = state.servers.iter().position(|s| s.host == host) else {
        tracing::warn!(host, "ignoring REMOVE_SERVER for unknown host");
        return;
    };
    let server = state.servers.remove(pos);
    state.removed_servers.push(server);
}

fn apply_invite_member(
    state: &mut TeamState,
    id: String,
    public_key: concord_crypto::VerifyingKey,
    expiration: u64,
    max_uses: u32,
) {
    state.invitations.insert(
        id.clone(),
        Invitation {
            id,
            public_key,
            expiration,
            max_uses: max_uses.max(1),
            uses: 0,
            revoked: false,
            user_id: None,
        },
    );
}

fn apply_invite_device(
    state: &mut TeamState,
    id: String,
    public_key: concord_crypto::VerifyingKey,
    expiration: u64,
    user_id: String,
) {
    if state.member(&user_id).is_none() {
        tracing::warn!(user_id, "ignoring INVITE_DEVICE for unknown member");
        return;
    }
    state.invitations.insert(
        id.clone(),
        Invitation {
            id,
            public_key,
            expiration,
            max_uses: 1,
            uses: 0,
            revoked: false,
            user_id: Some(user_id),
        },
    );
}

fn apply_revoke_invitation(state: &mut TeamState, id: &str) {
    if let Some(invitation) = state.invitations.get_mut(id) {
        invitation.revoked = true;
    } else {
        tracing::warn!(id, "ignoring REVOKE_INVITATION for unknown invitation");
    }
}

fn apply_admit_member(
    state: &mut TeamState,
    invitation_id: &str,
    user_id: String,
    user_name: String,
    public_keys: concord_crypto::Keyset,
    lockboxes: Vec<concord_crypto::Lockbox>,
) {
    let Some(invitation) = state.invitations.get_mut(invitation_id) else {
        tracing::warn!(invitation_id, "ignoring ADMIT_MEMBER for unknown invitation");
        return;
    };
    if invitation.revoked || invitation.uses >= invitation.max_uses {
        tracing::warn!(invitation_id, "ignoring ADMIT_MEMBER for spent or revoked invitation");
        return;
    }
    invitation.uses += 1;
    apply_add_member(state, user_id, user_name, public_keys, Vec::new(), lockboxes);
}

fn apply_admit_device(
    state: &mut TeamState,
    invitation_id: &str,
    user_id: &str,
    device_name: String,
    public_keys: concord_crypto::Keyset,
    lockboxes: Vec<concord_crypto::Lockbox>,
) {
    let Some(invitation) = state.invitations.get_mut(invitation_id) else {
        tracing::warn!(invitation_id, "ignoring ADMIT_DEVICE for unknown invitation");
        return;
    };
    if invitation.revoked || invitation.uses >= invitation.max_uses {
        tracing::warn!(invitation_id, "ignoring ADMIT_DEVICE for spent or revoked invitation");
        return;
    }
    if invitation.user_id.as_deref() != Some(user_id) {
        tracing::warn!(
            invitation_id,
            user_id,
            "ignoring ADMIT_DEVICE: invitation was not issued for this member"
        );
        return;
    }
    invitation.uses += 1;
    apply_add_device(state, user_id, device_name, public_keys);
    state.lockboxes.extend(lockboxes);
}

fn apply_change_member_keys(state: &mut TeamState, user_id: &str, public_keys: concord_crypto::Keyset) {
    let Some(member) = state.member_mut(user_id) else {
        tracing::warn!(user_id, "ignoring CHANGE_MEMBER_KEYS for unknown member");
        return;
    };
    if public_keys.generation <= member.public_keys.generation {
        tracing::warn!(user_id, "ignoring CHANGE_MEMBER_KEYS with non-increasing generation");
        return;
    }
    member.public_keys = public_keys;
}

fn apply_change_device_keys(
    state: &mut TeamState,
    user_id: &str,
    device_name: &str,
    public_keys: concord_crypto::Keyset,
) {
    let Some(member) = state.member_mut(user_id) else {
        tracing::warn!(user_id, "ignoring CHANGE_DEVICE_KEYS for unknown member");
        return;
    };
    let Some(device) = member.devices.iter_mut().find(|d| d.device_name == device_name) else {
        tracing::warn!(user_id, device_name, "ignoring CHANGE_DEVICE_KEYS for unknown device");
        return;
    };
    if public_keys.generation <= device.public_keys.generation {
        tracing::warn!(user_id, device_name, "ignoring CHANGE_DEVICE_KEYS with non-increasing generation");
        return;
    }
    device.public_keys = public_keys;
}

fn apply_change_server_keys(state: &mut TeamState, host: &str, public_keys: concord_crypto::Keyset) {
    let Some(server) = state.servers.iter_mut().find(|s| s.host == host) else {
        tracing::warn!(host, "ignoring CHANGE_SERVER_KEYS for unknown server");
        return;
    };
    server.public_keys = public_keys;
}

fn apply_rotate_keys(
    state: &mut TeamState,
    triggered_by: &concord_crypto::KeyScope,
    rotated_keys: Vec<concord_crypto::Keyset>,
    rotation_lockboxes: Vec<concord_crypto::Lockbox>,
) {
    tracing::debug!(triggered_by = ?triggered_by, rotated = rotated_keys.len(), "applying key rotation");
    for keys in rotated_keys {
        state.scope_keys.insert(keys.scope.clone(), keys);
    }
    state.lockboxes.extend(rotation_lockboxes);
    state
        .pending_key_rotations
        .retain(|u| Some(u.as_str()) != Some(triggered_by.name.as_str()));
}
