//! Read-only queries over a [`crate::Team`]'s derived state (§6's
//! selector list: `has`, `members`, `roles`, `memberIsAdmin`, `teamKeys`,
//! `adminKeys`, `visibleScopes`, ...).
//!
//! Plain functions over `&TeamState` rather than methods on `Team`, so
//! they can be unit-tested against a hand-built state without a graph.

use crate::error::ErrorKind;
use concord_crypto::{KeyScope, Keyset, Lockbox};
use concord_reducer::{Device, Invitation, Member, Role, Server, TeamState};
use std::collections::HashSet;

/// Whether `user_id` is a current (non-removed) member.
pub fn has(state: &TeamState, user_id: &str) -> bool {
    state.member(user_id).is_some()
}

/// Current members, in reducer-insertion order.
pub fn members(state: &TeamState) -> &[Member] {
    &state.members
}

/// Current role definitions.
pub fn roles(state: &TeamState) -> &[Role] {
    &state.roles
}

/// Current server participants.
pub fn servers(state: &TeamState) -> &[Server] {
    &state.servers
}

/// Open invitations, keyed by id.
pub fn invitations(state: &TeamState) -> &std::collections::HashMap<String, Invitation> {
    &state.invitations
}

/// Whether `user_id` currently holds the admin role.
///
/// Errors [`ErrorKind::MemberUnknown`] rather than silently reporting
/// `false`, since "not admin" and "no such member" are distinct facts a
/// caller may need to tell apart (§7).
pub fn member_is_admin(state: &TeamState, user_id: &str) -> Result<bool, ErrorKind> {
    state
        .member(user_id)
        .map(Member::is_admin)
        .ok_or(ErrorKind::MemberUnknown)
}

/// `user_id`'s current devices.
pub fn member_devices<'a>(state: &'a TeamState, user_id: &str) -> Result<&'a [Device], ErrorKind> {
    state
        .member(user_id)
        .map(|m| m.devices.as_slice())
        .ok_or(ErrorKind::MemberUnknown)
}

/// Whether `user_id` was ever a member and was later removed.
pub fn member_was_removed(state: &TeamState, user_id: &str) -> bool {
    state.was_removed(user_id)
}

/// Whether `user_id` ever had a `device_name` device that was later
/// removed (distinct from having never had one at all — §7
/// `DEVICE_REMOVED` vs. `DEVICE_UNKNOWN`).
pub fn device_was_removed(state: &TeamState, user_id: &str, device_name: &str) -> bool {
    state
        .removed_devices
        .iter()
        .any(|d| d.user_id == user_id && d.device_name == device_name)
}

/// The team scope's current public keyset and its generation (§8 scenarios
/// 1 and 2: `teamKeys().generation`).
pub fn team_keys<'a>(state: &'a TeamState, team_scope: &KeyScope) -> Option<&'a Keyset> {
    state.scope_keys(team_scope)
}

/// The built-in admin role's current public keyset (`adminKeys()`).
pub fn admin_keys<'a>(state: &'a TeamState, admin_role_scope: &KeyScope) -> Option<&'a Keyset> {
    state.scope_keys(admin_role_scope)
}

/// Scopes reachable from `from` by following the team's recorded
/// lockboxes (§4.4 "Visibility closure").
///
/// `contents_scope` maps one of `state.lockboxes` to the scope of the
/// keyset it delivers. A `Lockbox`'s contents are ciphertext, so this
/// mapping cannot be recovered from the lockbox alone; callers pass in
/// whatever index they maintain locally (see `crate::rotation::LockboxIndex`).
pub fn visible_scopes(
    state: &TeamState,
    from: &KeyScope,
    contents_scope: impl Fn(&Lockbox) -> KeyScope,
) -> HashSet<KeyScope> {
    concord_crypto::visible_scopes(from, &state.lockboxes, contents_scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn member_is_admin_reports_unknown_member() {
        let state = TeamState::empty();
        assert_matches!(member_is_admin(&state, "alice"), Err(ErrorKind::MemberUnknown));
    }

    #[test]
    fn has_is_false_before_any_member_added() {
        let state = TeamState::empty();
        assert!(!has(&state, "alice"));
    }
}
