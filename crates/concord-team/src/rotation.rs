//! Key-rotation policy (§4.4 "Rotation policy"): when a scope is
//! compromised (member removed, device removed, role revoked), every
//! scope visible from it gets a fresh keyset, and every surviving
//! lockbox granting access to a rotated scope is reissued to the new
//! generation — except lockboxes addressed to the compromised scope
//! itself, which are dropped rather than reissued.
//!
//! Needs both the visibility closure (`concord-crypto::lockbox`) and the
//! live `TeamState` (who else is visible from the compromised scope), so
//! it lives here rather than in either crate alone.

use crate::selectors;
use concord_crypto::{
    create_lockbox, KeyScope, Keyset, KeysetRef, KeysetWithSecrets, Lockbox, SealPublicKey,
};
use concord_reducer::TeamState;
use std::collections::HashMap;

/// Records which scope's keyset each lockbox in `state.lockboxes`
/// delivers.
///
/// A [`Lockbox`]'s contents are ciphertext — recovering the scope they
/// belong to is only possible for whoever created the lockbox (who chose
/// the contents) or a recipient who has opened it. `Team` populates this
/// as it issues or opens lockboxes locally; it is not itself replicated.
#[derive(Debug, Default, Clone)]
pub struct LockboxIndex {
    entries: Vec<(Lockbox, KeyScope)>,
}

impl LockboxIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `lockbox` delivers a keyset belonging to `contents_scope`.
    pub fn record(&mut self, lockbox: Lockbox, contents_scope: KeyScope) {
        self.entries.push((lockbox, contents_scope));
    }

    /// Look up the contents scope for one of `state.lockboxes`, if known.
    pub fn contents_scope(&self, lockbox: &Lockbox) -> Option<KeyScope> {
        self.entries
            .iter()
            .find(|(lb, _)| lb == lockbox)
            .map(|(_, scope)| scope.clone())
    }
}

/// Rotate `compromised` and everything visible from it.
///
/// `current_generation` reports a scope's latest known keyset generation
/// (from `TeamState::scope_keys`, or a member/device record); `recipient_key`
/// looks up a scope's public encryption key at a specific generation, to
/// address reissued lockboxes. Both are callbacks rather than direct
/// `TeamState` reads because user/device public keys live on `Member`s,
/// not in `scope_keys`.
///
/// Returns the fresh public keysets (installed into `TeamState::scope_keys`
/// by the next `RotateKeys`/`RemoveMember`/`RemoveMemberRole` transform)
/// and the replacement lockboxes.
pub fn rotate_from(
    compromised: &KeyScope,
    state: &TeamState,
    index: &LockboxIndex,
    current_generation: impl Fn(&KeyScope) -> Option<u64>,
    recipient_key: impl Fn(&KeyScope, u64) -> Option<SealPublicKey>,
) -> (Vec<Keyset>, Vec<Lockbox>) {
    let affected = selectors::visible_scopes(state, compromised, |lb| {
        index
            .contents_scope(lb)
            .unwrap_or_else(|| lb.recipient.scope.clone())
    });

    let mut fresh: HashMap<KeyScope, KeysetWithSecrets> = HashMap::new();
    for scope in &affected {
        if let Some(generation) = current_generation(scope) {
            fresh.insert(
                scope.clone(),
                KeysetWithSecrets::generate_at(scope.clone(), generation + 1),
            );
        }
    }

    let mut lockboxes = Vec::new();
    for lockbox in &state.lockboxes {
        let Some(contents_scope) = index.contents_scope(lockbox) else {
            continue;
        };
        let Some(new_contents) = fresh.get(&contents_scope) else {
            continue;
        };
        if lockbox.recipient.scope == *compromised {
            // The compromised principal is cut off, not re-granted.
            continue;
        }
        let recipient_scope = lockbox.recipient.scope.clone();
        // A recipient that is itself being rotated in this same cascade
        // (e.g. a role scope that both receives the team key and is
        // visible from a removed member) has no pre-existing public key
        // to look up — use the keyset this function just minted for it.
        let (recipient_generation, recipient_public) = match fresh.get(&recipient_scope) {
            Some(rotated_recipient) => (rotated_recipient.public.generation, rotated_recipient.public.enc_public),
            None => {
                let generation = lockbox.recipient.generation;
                let Some(public) = recipient_key(&recipient_scope, generation) else {
                    continue;
                };
                (generation, public)
            }
        };
        let recipient_ref = KeysetRef {
            scope: recipient_scope,
            generation: recipient_generation,
        };
        if let Ok(reissued) = create_lockbox(new_contents, recipient_ref, &recipient_public) {
            lockboxes.push(reissued);
        }
    }

    let rotated_keys = fresh.values().map(|k| k.public.clone()).collect();
    (rotated_keys, lockboxes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_crypto::KeysetWithSecrets;

    #[test]
    fn compromised_recipient_is_dropped_others_reissued() {
        let team = KeyScope::team("acme");
        let alice = KeyScope::user("alice");
        let bob = KeyScope::user("bob");

        let team_keys = KeysetWithSecrets::generate(team.clone());
        let alice_keys = KeysetWithSecrets::generate(alice.clone());
        let bob_keys = KeysetWithSecrets::generate(bob.clone());

        let lb_alice = create_lockbox(
            &team_keys,
            alice_keys.public.keyset_ref(),
            &alice_keys.public.enc_public,
        )
        .unwrap();
        let lb_bob = create_lockbox(
            &team_keys,
            bob_keys.public.keyset_ref(),
            &bob_keys.public.enc_public,
        )
        .unwrap();

        let mut index = LockboxIndex::new();
        index.record(lb_alice.clone(), team.clone());
        index.record(lb_bob.clone(), team.clone());

        let mut state = TeamState::empty();
        state.scope_keys.insert(team.clone(), team_keys.public.clone());
        state.lockboxes = vec![lb_alice, lb_bob];

        let (rotated, lockboxes) = rotate_from(
            &alice,
            &state,
            &index,
            |scope| if *scope == team { Some(0) } else { None },
            |scope, _generation| {
                if *scope == bob {
                    Some(bob_keys.public.enc_public)
                } else {
                    None
                }
            },
        );

        assert_eq!(rotated.len(), 1);
        assert_eq!(rotated[0].generation, 1);
        assert_eq!(lockboxes.len(), 1);
        assert_eq!(lockboxes[0].recipient.scope, bob);
    }

    #[test]
    fn scope_with_no_visibility_rotates_alone() {
        let device = KeyScope::device("alice-device");
        let state = TeamState::empty();
        let index = LockboxIndex::new();

        let (rotated, lockboxes) = rotate_from(
            &device,
            &state,
            &index,
            |scope| if *scope == device { Some(2) } else { None },
            |_, _| None,
        );

        assert_eq!(rotated.len(), 1);
        assert_eq!(rotated[0].generation, 3);
        assert!(lockboxes.is_empty());
    }
}
