//! The concurrent admin-conflict scenarios from §8, exercised directly
//! against the resolver and reducer without any transport or team façade.

use assert_matches::assert_matches;
use concord_crypto::{KeyScope, KeysetWithSecrets, ScopeType, SigningKey};
use concord_graph::{BodyCipher, Graph, Link, LinkBody};
use concord_reducer::{reduce, TeamAction, TeamState};

/// Bincode-in-the-clear body cipher: these tests exercise conflict
/// resolution, not encryption, so a real AEAD key would only add noise.
struct PlainCipher;

impl BodyCipher for PlainCipher {
    fn encrypt_body(&self, body: &LinkBody) -> (Vec<u8>, u64) {
        (bincode::serialize(body).unwrap(), 0)
    }

    fn decrypt_body(&self, ciphertext: &[u8], _generation: u64) -> Option<LinkBody> {
        bincode::deserialize(ciphertext).ok()
    }
}

struct Actor {
    signing_key: SigningKey,
    user: KeyScope,
    device: KeyScope,
}

impl Actor {
    fn new(name: &str) -> Self {
        Self {
            signing_key: SigningKey::generate(),
            user: KeyScope::user(name),
            device: KeyScope::device(format!("{name}-device")),
        }
    }

    fn act(&self, graph: &mut Graph, cipher: &dyn BodyCipher, action: &TeamAction) -> concord_crypto::Hash {
        let body = LinkBody {
            action_type: action.type_name().to_string(),
            payload: bincode::serialize(action).unwrap(),
            user: self.user.clone(),
            device: self.device.clone(),
            timestamp: 0,
            prev: vec![],
            key_generation: 0,
        };
        graph
            .append(body, self.device.clone(), &self.signing_key, cipher)
            .unwrap()
    }
}

fn create_team(graph: &mut Graph, cipher: &dyn BodyCipher, founder: &Actor) {
    let founder_keys = KeysetWithSecrets::generate(KeyScope::new(ScopeType::User, "alice")).public;
    let team_keys = KeysetWithSecrets::generate(KeyScope::team("acme")).public;
    let admin_role_keys = KeysetWithSecrets::generate(KeyScope::role("admin")).public;
    founder.act(
        graph,
        cipher,
        &TeamAction::CreateTeam {
            team_name: "acme".into(),
            founder_id: "alice".into(),
            founder_name: "Alice".into(),
            founder_keys,
            team_keys,
            admin_role_keys,
        },
    );
}

fn add_member(graph: &mut Graph, cipher: &dyn BodyCipher, adder: &Actor, user_id: &str, roles: Vec<String>) {
    let keys = KeysetWithSecrets::generate(KeyScope::new(ScopeType::User, user_id)).public;
    adder.act(
        graph,
        cipher,
        &TeamAction::AddMember {
            user_id: user_id.into(),
            user_name: user_id.into(),
            public_keys: keys,
            roles,
            lockboxes: vec![],
        },
    );
}

#[test]
fn concurrent_mutual_demote_senior_wins() {
    let cipher = PlainCipher;
    let alice = Actor::new("alice");
    let bob = Actor::new("bob");

    let mut base = Graph::new();
    create_team(&mut base, &cipher, &alice);
    add_member(&mut base, &cipher, &alice, "bob", vec!["admin".into()]);

    let mut at_alice = base.clone();
    let mut at_bob = base.clone();

    alice.act(
        &mut at_alice,
        &cipher,
        &TeamAction::RemoveMemberRole {
            user_id: "bob".into(),
            role_name: "admin".into(),
            rotation_lockboxes: vec![],
            rotated_keys: vec![],
        },
    );
    bob.act(
        &mut at_bob,
        &cipher,
        &TeamAction::RemoveMemberRole {
            user_id: "alice".into(),
            role_name: "admin".into(),
            rotation_lockboxes: vec![],
            rotated_keys: vec![],
        },
    );

    let prev_of_alice = |h: &concord_crypto::Hash| at_alice.decode_body(h, &cipher).ok().map(|b| b.prev);
    base.merge(&at_alice, prev_of_alice, |_| None).unwrap();
    let prev_of_bob = |h: &concord_crypto::Hash| at_bob.decode_body(h, &cipher).ok().map(|b| b.prev);
    base.merge(&at_bob, prev_of_bob, |_| None).unwrap();

    let state = reduce(TeamState::empty(), &base, &cipher);
    assert_matches!(state.member("alice"), Some(m) if m.is_admin());
    assert_matches!(state.member("bob"), Some(m) if !m.is_admin());
}

#[test]
fn concurrent_mutual_remove_converges_same_for_every_peer() {
    let cipher = PlainCipher;
    let alice = Actor::new("alice");
    let bob = Actor::new("bob");

    let mut base = Graph::new();
    create_team(&mut base, &cipher, &alice);
    add_member(&mut base, &cipher, &alice, "bob", vec!["admin".into()]);
    add_member(&mut base, &cipher, &alice, "charlie", vec!["admin".into()]);

    let mut at_alice = base.clone();
    let mut at_bob = base.clone();

    alice.act(
        &mut at_alice,
        &cipher,
        &TeamAction::RemoveMember {
            user_id: "bob".into(),
            rotation_lockboxes: vec![],
            rotated_keys: vec![],
        },
    );
    bob.act(
        &mut at_bob,
        &cipher,
        &TeamAction::RemoveMember {
            user_id: "alice".into(),
            rotation_lockboxes: vec![],
            rotated_keys: vec![],
        },
    );

    // Charlie receives bob's branch first, then alice's.
    let mut charlie_view = base.clone();
    let prev_of_bob = |h: &concord_crypto::Hash| at_bob.decode_body(h, &cipher).ok().map(|b| b.prev);
    charlie_view.merge(&at_bob, prev_of_bob, |_| None).unwrap();
    let after_bob_only = reduce(TeamState::empty(), &charlie_view, &cipher);
    assert!(after_bob_only.was_removed("alice"));

    let prev_of_alice = |h: &concord_crypto::Hash| at_alice.decode_body(h, &cipher).ok().map(|b| b.prev);
    charlie_view.merge(&at_alice, prev_of_alice, |_| None).unwrap();
    let converged = reduce(TeamState::empty(), &charlie_view, &cipher);

    assert!(converged.was_removed("bob"));
    assert!(converged.member("alice").is_some());
    assert!(converged.member("charlie").is_some());
}

#[test]
fn demoted_admins_promotion_is_invalidated() {
    let cipher = PlainCipher;
    let alice = Actor::new("alice");
    let bob = Actor::new("bob");

    let mut base = Graph::new();
    create_team(&mut base, &cipher, &alice);
    add_member(&mut base, &cipher, &alice, "bob", vec!["admin".into()]);
    add_member(&mut base, &cipher, &alice, "charlie", vec![]);

    let mut at_alice = base.clone();
    let mut at_bob = base.clone();

    alice.act(
        &mut at_alice,
        &cipher,
        &TeamAction::RemoveMemberRole {
            user_id: "bob".into(),
            role_name: "admin".into(),
            rotation_lockboxes: vec![],
            rotated_keys: vec![],
        },
    );
    bob.act(
        &mut at_bob,
        &cipher,
        &TeamAction::AddMemberRole {
            user_id: "charlie".into(),
            role_name: "admin".into(),
            lockbox: None,
        },
    );

    let prev_of_bob = |h: &concord_crypto::Hash| at_bob.decode_body(h, &cipher).ok().map(|b| b.prev);
    base.merge(&at_bob, prev_of_bob, |_| None).unwrap();
    let prev_of_alice = |h: &concord_crypto::Hash| at_alice.decode_body(h, &cipher).ok().map(|b| b.prev);
    base.merge(&at_alice, prev_of_alice, |_| None).unwrap();

    let state = reduce(TeamState::empty(), &base, &cipher);
    assert!(!state.member("bob").unwrap().is_admin());
    assert!(!state.member("charlie").unwrap().is_admin());
}
