//! Device identity challenge/response (§4.6 "Identity proof").

use concord_crypto::Keyset;
use concord_team::{ErrorKind, Team};

/// The canonical bytes an identity proof signs over: `(scope=DEVICE,
/// userId, deviceId, nonce, timestamp)`. Domain-prefixed so a device
/// signature can never be mistaken for a signature over link or lockbox
/// bytes produced elsewhere in the workspace.
pub fn challenge_bytes(user_id: &str, device_name: &str, nonce: &[u8; 32], timestamp: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(b"concord.connection.device-challenge".len() + user_id.len() + device_name.len() + 40);
    buf.extend_from_slice(b"concord.connection.device-challenge");
    buf.push(0);
    buf.extend_from_slice(user_id.as_bytes());
    buf.push(0);
    buf.extend_from_slice(device_name.as_bytes());
    buf.push(0);
    buf.extend_from_slice(nonce);
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf
}

/// Resolve a claimed `(user_id, device_name)` to its current keyset, or
/// the specific reason the claim cannot be honored — `lookupIdentity`'s
/// `VALID_DEVICE` / `MEMBER_UNKNOWN` / `MEMBER_REMOVED` / `DEVICE_UNKNOWN`
/// / `DEVICE_REMOVED` outcomes (§4.6). The full keyset is returned (not
/// just the signature key) since the session-key negotiation step also
/// needs the device's encryption key.
pub fn lookup_identity(team: &Team, user_id: &str, device_name: &str) -> Result<Keyset, ErrorKind> {
    if team.member_was_removed(user_id) {
        return Err(ErrorKind::MemberRemoved);
    }
    let member = team
        .members()
        .iter()
        .find(|m| m.user_id == user_id)
        .ok_or(ErrorKind::MemberUnknown)?;

    match member.devices.iter().find(|d| d.device_name == device_name) {
        Some(device) => Ok(device.public_keys.clone()),
        None if team.device_was_removed(user_id, device_name) => Err(ErrorKind::DeviceRemoved),
        None => Err(ErrorKind::DeviceUnknown),
    }
}

/// How stale a challenge may be before a proof against it is rejected
/// (§7 `CHALLENGE_STALE`).
pub const CHALLENGE_FRESHNESS_SECS: u64 = 60;

/// Whether `timestamp` (the challenge's issue time) is still within the
/// freshness window of `now`.
pub fn challenge_is_fresh(timestamp: u64, now: u64) -> bool {
    now.saturating_sub(timestamp) <= CHALLENGE_FRESHNESS_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_team::TeamConfig;

    #[test]
    fn unknown_member_is_distinguished_from_unknown_device() {
        let (team, _) = Team::create(TeamConfig::default(), "acme", "alice", "Alice");
        assert_eq!(lookup_identity(&team, "nobody", "phone"), Err(ErrorKind::MemberUnknown));
        assert_eq!(lookup_identity(&team, "alice", "phone"), Err(ErrorKind::DeviceUnknown));
    }

    #[test]
    fn freshness_window() {
        assert!(challenge_is_fresh(100, 130));
        assert!(!challenge_is_fresh(100, 200));
    }
}
