//! Pure graph-sync decision helpers (§4.6 "Graph sync"): no I/O, so the
//! frontier search is unit-testable without a channel, the same split
//! `aura-anti-entropy::pure` draws from its effectful driver.

use concord_graph::Graph;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Hash identifying one signed action link.
pub type Hash = concord_crypto::Hash;

/// Walk `remote_parent_map` outward from `remote_head`, stopping at any
/// hash `local` already has, to find the hashes `local` is missing. This
/// is the "iterate `getParentMap` expansions until a common frontier is
/// found" step (§4.6); the caller ships back whatever remains.
pub fn missing_hashes(local: &Graph, remote_head: &BTreeSet<Hash>, remote_parent_map: &HashMap<Hash, Vec<Hash>>) -> HashSet<Hash> {
    let mut missing = HashSet::new();
    let mut frontier: Vec<Hash> = remote_head.iter().copied().collect();
    let mut visited: HashSet<Hash> = HashSet::new();

    while let Some(hash) = frontier.pop() {
        if !visited.insert(hash) {
            continue;
        }
        if local.get(&hash).is_some() {
            continue;
        }
        missing.insert(hash);
        if let Some(parents) = remote_parent_map.get(&hash) {
            frontier.extend(parents.iter().copied());
        }
    }
    missing
}

/// Whether two heads already agree, meaning `synchronizing` can advance
/// straight to `negotiating` without any link exchange.
pub fn heads_already_converged(local_head: &BTreeSet<Hash>, remote_head: &BTreeSet<Hash>) -> bool {
    local_head == remote_head
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_graph::cipher::BodyCipher;
    use concord_graph::{LinkBody, ParentMapOptions};

    struct PlainCipher;
    impl BodyCipher for PlainCipher {
        fn encrypt_body(&self, body: &LinkBody) -> (Vec<u8>, u64) {
            (bincode::serialize(body).unwrap(), 0)
        }
        fn decrypt_body(&self, ciphertext: &[u8], _generation: u64) -> Option<LinkBody> {
            bincode::deserialize(ciphertext).ok()
        }
    }

    fn body(tag: u8) -> LinkBody {
        LinkBody {
            action_type: "test".to_string(),
            payload: vec![tag],
            user: concord_crypto::KeyScope::user("alice"),
            device: concord_crypto::KeyScope::device("alice-device"),
            timestamp: 0,
            prev: vec![],
            key_generation: 0,
        }
    }

    #[test]
    fn empty_graphs_have_nothing_missing() {
        let local = Graph::new();
        assert!(missing_hashes(&local, &BTreeSet::new(), &HashMap::new()).is_empty());
    }

    #[test]
    fn everything_in_remote_head_chain_is_missing_from_empty_local() {
        let cipher = PlainCipher;
        let signing_key = concord_crypto::SigningKey::generate();
        let device = concord_crypto::KeyScope::device("alice-device");
        let mut remote = Graph::new();
        let root = remote.append(body(0), device.clone(), &signing_key, &cipher).unwrap();
        let second = remote.append(body(1), device, &signing_key, &cipher).unwrap();

        let parent_map = remote.parent_map(ParentMapOptions::default());
        let local = Graph::new();
        let missing = missing_hashes(&local, remote.head(), &parent_map);
        assert!(missing.contains(&root));
        assert!(missing.contains(&second));
    }
}
