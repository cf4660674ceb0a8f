//! The six end-to-end scenarios from §8, driven entirely through `Team`'s
//! public API rather than the raw graph/reducer (see
//! `concord-reducer/tests/conflict_scenarios.rs` for the same conflicts
//! exercised one layer down).

use concord_crypto::{open_lockbox, KeyScope, KeysetWithSecrets, SigningKey};
use concord_team::{Team, TeamConfig, TeamKeyring, ADMIN_ROLE};
use std::collections::HashMap;

const TEAM: &str = "acme";
const FAR_FUTURE: u64 = u64::MAX;

/// Add `user_id` to `founder`'s team and hand back a `Team` for them,
/// simulating the out-of-band key delivery a connection handshake would
/// perform (§4.6): the founder lockboxes the team/role keys directly to
/// the new member's public encryption key, and the new member opens them
/// to build their own keyring before loading the shared graph.
fn join(founder: &mut Team, user_id: &str, roles: Vec<String>) -> Team {
    let user_scope = KeyScope::user(user_id);
    let keys = KeysetWithSecrets::generate(user_scope.clone());
    founder
        .add(user_id, user_id, keys.public.clone(), roles.clone())
        .unwrap();

    let team_scope = KeyScope::team(TEAM);
    let admin_scope = KeyScope::role(ADMIN_ROLE);

    let mut keyrings = HashMap::new();
    keyrings.insert(user_scope.clone(), TeamKeyring::new(keys.clone()));

    let team_lockbox = founder.lockbox_for(&team_scope, &keys.public).unwrap();
    let team_delivered = open_lockbox(&team_lockbox, &keys.enc_secret).unwrap();
    keyrings.insert(team_scope, TeamKeyring::new(team_delivered));

    if roles.iter().any(|r| r == ADMIN_ROLE) {
        let admin_lockbox = founder.lockbox_for(&admin_scope, &keys.public).unwrap();
        let admin_delivered = open_lockbox(&admin_lockbox, &keys.enc_secret).unwrap();
        keyrings.insert(admin_scope, TeamKeyring::new(admin_delivered));
    }

    let device = KeyScope::device(format!("{user_id}-device"));
    Team::load(
        TeamConfig::default(),
        founder.graph().clone(),
        TEAM,
        user_scope,
        device,
        SigningKey::generate(),
        keyrings,
    )
    .unwrap()
}

#[test]
fn root_team_founder_is_sole_admin() {
    let (team, _founder_keys) = Team::create(TeamConfig::default(), TEAM, "alice", "Alice");

    assert_eq!(team.members().len(), 1);
    assert_eq!(team.members()[0].user_id, "alice");
    assert!(team.member_is_admin("alice").unwrap());
    assert_eq!(team.team_keys().unwrap().generation, 0);
    assert_eq!(team.admin_keys().unwrap().generation, 0);
}

#[test]
fn removing_an_admin_rotates_team_and_admin_keys() {
    let (mut alice, _) = Team::create(TeamConfig::default(), TEAM, "alice", "Alice");
    let _bob = join(&mut alice, "bob", vec![ADMIN_ROLE.to_string()]);

    alice.remove("bob").unwrap();

    assert_eq!(alice.team_keys().unwrap().generation, 1);
    assert_eq!(alice.admin_keys().unwrap().generation, 1);
    assert!(alice.member_was_removed("bob"));
    assert!(!alice.has("bob"));
}

#[test]
fn concurrent_mutual_demote_senior_wins() {
    let (mut alice, _) = Team::create(TeamConfig::default(), TEAM, "alice", "Alice");
    let mut bob = join(&mut alice, "bob", vec![ADMIN_ROLE.to_string()]);

    alice.remove_member_role("bob", ADMIN_ROLE).unwrap();
    bob.remove_member_role("alice", ADMIN_ROLE).unwrap();

    let bob_graph = bob.graph().clone();
    let alice_graph = alice.graph().clone();
    alice.merge(&bob_graph).unwrap();
    bob.merge(&alice_graph).unwrap();

    // Alice is the founder, so the senior, and stays admin on both sides.
    assert!(alice.member_is_admin("alice").unwrap());
    assert!(!alice.member_is_admin("bob").unwrap());
    assert!(bob.member_is_admin("alice").unwrap());
    assert!(!bob.member_is_admin("bob").unwrap());
}

#[test]
fn concurrent_mutual_remove_converges_with_third_observer() {
    let (mut alice, _) = Team::create(TeamConfig::default(), TEAM, "alice", "Alice");
    let mut bob = join(&mut alice, "bob", vec![ADMIN_ROLE.to_string()]);
    let mut charlie = join(&mut alice, "charlie", vec![ADMIN_ROLE.to_string()]);

    // Sync bob with charlie's admission before the branches diverge.
    let base_graph = alice.graph().clone();
    bob.merge(&base_graph).unwrap();

    alice.remove("bob").unwrap();
    bob.remove("alice").unwrap();

    let graph_a = alice.graph().clone();
    let graph_b = bob.graph().clone();

    // Charlie receives bob's branch first: alice looks removed.
    charlie.merge(&graph_b).unwrap();
    assert!(charlie.member_was_removed("alice"));

    // Then alice's branch arrives: bob is removed, alice is back.
    charlie.merge(&graph_a).unwrap();
    assert!(charlie.member_was_removed("bob"));
    assert!(charlie.has("alice"));
    assert!(charlie.has("charlie"));
}

#[test]
fn demoted_admins_promotion_is_invalidated() {
    let (mut alice, _) = Team::create(TeamConfig::default(), TEAM, "alice", "Alice");
    let mut bob = join(&mut alice, "bob", vec![ADMIN_ROLE.to_string()]);
    let _charlie = join(&mut alice, "charlie", vec![]);

    // Sync bob with charlie's admission before the branches diverge.
    let base_graph = alice.graph().clone();
    bob.merge(&base_graph).unwrap();

    alice.remove_member_role("bob", ADMIN_ROLE).unwrap();
    bob.add_member_role("charlie", ADMIN_ROLE).unwrap();

    let graph_a = alice.graph().clone();
    let graph_b = bob.graph().clone();
    alice.merge(&graph_b).unwrap();
    bob.merge(&graph_a).unwrap();

    assert!(!alice.member_is_admin("bob").unwrap());
    assert!(!alice.member_is_admin("charlie").unwrap());
    assert!(!bob.member_is_admin("bob").unwrap());
    assert!(!bob.member_is_admin("charlie").unwrap());
}

#[test]
fn invitation_admits_new_member() {
    let (mut alice, _) = Team::create(TeamConfig::default(), TEAM, "alice", "Alice");

    let id = alice.invite_member("abc 123", FAR_FUTURE, 1).unwrap();
    assert!(alice.invitations().contains_key(&id));

    let proof = concord_invitation::generate_proof("abc123");
    assert_eq!(proof.id, id);

    let bob_keys = KeysetWithSecrets::generate(KeyScope::user("bob"));
    alice
        .admit_member(&proof, "bob", "Bob", bob_keys.public.clone())
        .unwrap();

    assert!(alice.has("bob"));
    assert_eq!(
        alice.members().iter().find(|m| m.user_id == "bob").unwrap().user_id,
        "bob"
    );
    assert_eq!(alice.invitations()[&id].uses, 1);
}
