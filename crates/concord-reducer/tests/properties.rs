//! Property test for the determinism/commutativity invariant §8 names:
//! two peers who receive the same set of concurrent links in different
//! orders derive the same `TeamState`, regardless of merge order.

use concord_crypto::{KeyScope, KeysetWithSecrets, ScopeType, SigningKey};
use concord_graph::{BodyCipher, Graph, Hash, LinkBody};
use concord_reducer::{reduce, TeamAction, TeamState};
use proptest::prelude::*;

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

    fn act(&self, graph: &mut Graph, cipher: &dyn BodyCipher, action: &TeamAction) -> Hash {
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

fn add_member(graph: &mut Graph, cipher: &dyn BodyCipher, adder: &Actor, user_id: &str) {
    let keys = KeysetWithSecrets::generate(KeyScope::new(ScopeType::User, user_id)).public;
    adder.act(
        graph,
        cipher,
        &TeamAction::AddMember {
            user_id: user_id.into(),
            user_name: user_id.into(),
            public_keys: keys,
            roles: vec![],
            lockboxes: vec![],
        },
    );
}

proptest! {
    /// A handful of members, each added by a distinct concurrent branch off
    /// the same root, converge to the same derived `TeamState` (same member
    /// set, same removal set) no matter which order the branches merge in.
    #[test]
    fn reduce_is_deterministic_across_merge_order(
        member_count in 1usize..5,
        seed in 0u64..1000,
    ) {
        let cipher = PlainCipher;
        let alice = Actor::new("alice");
        let mut base = Graph::new();
        create_team(&mut base, &cipher, &alice);

        let names: Vec<String> = (0..member_count).map(|i| format!("member{i}")).collect();
        let branches: Vec<Graph> = names
            .iter()
            .map(|name| {
                let mut branch = base.clone();
                add_member(&mut branch, &cipher, &alice, name);
                branch
            })
            .collect();

        let mut forward = base.clone();
        for branch in &branches {
            let prev_of = |h: &Hash| branch.decode_body(h, &cipher).ok().map(|b| b.prev);
            forward.merge(branch, prev_of, |_| None).unwrap();
        }

        let mut indices: Vec<usize> = (0..branches.len()).collect();
        indices.sort_by_key(|&i| (i as u64).wrapping_mul(seed.wrapping_add(1)) % (branches.len() as u64 + 1));
        let mut permuted = base.clone();
        for &i in &indices {
            let branch = &branches[i];
            let prev_of = |h: &Hash| branch.decode_body(h, &cipher).ok().map(|b| b.prev);
            permuted.merge(branch, prev_of, |_| None).unwrap();
        }

        let state_forward = reduce(TeamState::empty(), &forward, &cipher);
        let state_permuted = reduce(TeamState::empty(), &permuted, &cipher);

        let mut members_forward: Vec<&str> = state_forward.members.iter().map(|m| m.user_id.as_str()).collect();
        let mut members_permuted: Vec<&str> = state_permuted.members.iter().map(|m| m.user_id.as_str()).collect();
        members_forward.sort_unstable();
        members_permuted.sort_unstable();

        prop_assert_eq!(members_forward, members_permuted);
        prop_assert_eq!(state_forward.head, state_permuted.head);
    }
}
