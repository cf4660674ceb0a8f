//! Visibility closure over lockbox "can-read" edges.

use crate::lockbox::Lockbox;
use crate::scope::KeyScope;
use std::collections::{HashSet, VecDeque};

/// Scopes reachable by following lockbox edges starting at `from`, where a
/// lockbox whose `recipient.scope == X` and whose `contents` scope is `Y`
/// forms an edge `X -> Y` ("X sees Y").
///
/// `contents_scope` extracts the scope a lockbox's contents belong to;
/// callers pass this in rather than opening every lockbox, since the
/// visibility walk itself never needs the secret material, only the
/// caller's already-known mapping of lockbox id to contents scope (e.g.
/// from team-state bookkeeping recorded when the lockbox was created).
pub fn visible_scopes(
    from: &KeyScope,
    lockboxes: &[Lockbox],
    contents_scope: impl Fn(&Lockbox) -> KeyScope,
) -> HashSet<KeyScope> {
    let mut visible = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(from.clone());
    visible.insert(from.clone());

    while let Some(scope) = queue.pop_front() {
        for lockbox in lockboxes {
            if lockbox.recipient.scope != scope {
                continue;
            }
            let target = contents_scope(lockbox);
            if visible.insert(target.clone()) {
                queue.push_back(target);
            }
        }
    }

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockbox::create;
    use crate::scope::KeysetWithSecrets;

    #[test]
    fn closure_follows_chained_lockboxes() {
        let team = KeyScope::team("acme");
        let role = KeyScope::role("admin");
        let user = KeyScope::user("alice");

        let team_keys = KeysetWithSecrets::generate(team.clone());
        let role_keys = KeysetWithSecrets::generate(role.clone());
        let user_keys = KeysetWithSecrets::generate(user.clone());

        // Lockbox addressed to `user`, delivering `role`'s keys: user -> role.
        let lb_user_to_role = create(
            &role_keys,
            user_keys.public.keyset_ref(),
            &user_keys.public.enc_public,
        )
        .unwrap();
        // Lockbox addressed to `role`, delivering `team`'s keys: role -> team.
        let lb_role_to_team = create(
            &team_keys,
            role_keys.public.keyset_ref(),
            &role_keys.public.enc_public,
        )
        .unwrap();

        let contents_scope_of = |lb: &Lockbox| {
            if lb.recipient.scope == user {
                role.clone()
            } else {
                team.clone()
            }
        };
        let lockboxes = vec![lb_user_to_role, lb_role_to_team];
        let seen = visible_scopes(&user, &lockboxes, contents_scope_of);

        assert!(seen.contains(&user));
        assert!(seen.contains(&role));
        assert!(seen.contains(&team));
    }

    #[test]
    fn unreachable_scope_not_visible() {
        let user = KeyScope::user("alice");
        let stranger = KeyScope::user("zed");
        let seen = visible_scopes(&user, &[], |_| stranger.clone());
        assert!(!seen.contains(&stranger));
    }
}
