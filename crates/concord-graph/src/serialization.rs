//! Wire format for persisting and transmitting a [`Graph`].
//!
//! Envelope layout: one version byte, then a bincode-encoded
//! [`GraphEnvelope`]. Bumping the version lets a future format change
//! without breaking readers of old data (§6).

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::link::Link;
use concord_crypto::{Hash, KeyScope, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const WIRE_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct GraphEnvelope {
    links: Vec<Link>,
    encrypted_bodies: HashMap<Hash, Vec<u8>>,
    key_generations: HashMap<Hash, u64>,
    edges: HashMap<Hash, Vec<Hash>>,
}

/// Serialize `graph` to its versioned wire format.
///
/// `edges` supplies each link's plaintext `prev` set (the caller already
/// holds these from appending or from a prior decrypt pass) so that
/// reloading does not require decrypting every body up front.
pub fn save(graph: &Graph, edges: impl Fn(&Hash) -> Vec<Hash>) -> Vec<u8> {
    let links: Vec<Link> = graph.hashes().map(|h| graph.get(h).unwrap().clone()).collect();
    let encrypted_bodies = links
        .iter()
        .map(|l| (l.hash, graph.encrypted_body(&l.hash).unwrap().to_vec()))
        .collect();
    let key_generations = links
        .iter()
        .map(|l| (l.hash, graph.key_generation(&l.hash).unwrap_or(0)))
        .collect();
    let edge_map = links.iter().map(|l| (l.hash, edges(&l.hash))).collect();

    let envelope = GraphEnvelope {
        links,
        encrypted_bodies,
        key_generations,
        edges: edge_map,
    };
    let body = bincode::serialize(&envelope).expect("GraphEnvelope is always serializable");

    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(WIRE_VERSION);
    out.extend(body);
    out
}

/// Parse a wire-format buffer back into a [`Graph`].
///
/// Returns the graph together with the plaintext `prev` edges recovered
/// from the envelope, so callers can pass them straight to
/// [`Graph::merge`]'s `prev_of` or re-derive a `parent_map`.
///
/// `resolve_signer` looks up each link's claimed signer's currently known
/// key (see [`Graph::insert_remote`]); links whose signer resolves to a
/// known key and whose signature does not verify against it are rejected.
pub fn load(
    bytes: &[u8],
    resolve_signer: impl Fn(&KeyScope) -> Option<VerifyingKey>,
) -> Result<(Graph, HashMap<Hash, Vec<Hash>>)> {
    let (version, body) = bytes.split_first().ok_or_else(|| GraphError::Malformed {
        message: "empty buffer".into(),
    })?;
    if *version != WIRE_VERSION {
        return Err(GraphError::UnsupportedVersion { version: *version });
    }
    let envelope: GraphEnvelope = bincode::deserialize(body).map_err(|e| GraphError::Malformed {
        message: e.to_string(),
    })?;

    let mut graph = Graph::new();
    // Links must be inserted in an order where each one's predecessors
    // already exist. A single pass suffices because `links` was written
    // out by `save` directly from `graph.hashes()`, which has no ordering
    // guarantee — so sort by following `edges` topologically.
    let mut remaining: Vec<Link> = envelope.links;
    let mut inserted: std::collections::HashSet<Hash> = std::collections::HashSet::new();

    while !remaining.is_empty() {
        let mut progressed = false;
        let mut next_round = Vec::new();
        for link in remaining {
            let prev = envelope.edges.get(&link.hash).cloned().unwrap_or_default();
            if prev.iter().all(|p| inserted.contains(p)) {
                let ciphertext = envelope
                    .encrypted_bodies
                    .get(&link.hash)
                    .cloned()
                    .unwrap_or_default();
                let generation = *envelope.key_generations.get(&link.hash).unwrap_or(&0);
                let hash = link.hash;
                let verifying_key = resolve_signer(&link.signer);
                graph.insert_remote(link, ciphertext, generation, &prev, verifying_key.as_ref())?;
                inserted.insert(hash);
                progressed = true;
            } else {
                next_round.push(link);
            }
        }
        if !progressed && !next_round.is_empty() {
            return Err(GraphError::Malformed {
                message: "envelope contains links with unresolvable predecessors".into(),
            });
        }
        remaining = next_round;
    }

    Ok((graph, envelope.edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::BodyCipher;
    use crate::link::LinkBody;
    use assert_matches::assert_matches;
    use concord_crypto::{KeyScope, ScopeType, SigningKey};

    struct PlainCipher;

    impl BodyCipher for PlainCipher {
        fn encrypt_body(&self, body: &LinkBody) -> (Vec<u8>, u64) {
            (bincode::serialize(body).unwrap(), 0)
        }

        fn decrypt_body(&self, ciphertext: &[u8], _generation: u64) -> Option<LinkBody> {
            bincode::deserialize(ciphertext).ok()
        }
    }

    #[test]
    fn save_then_load_roundtrips() {
        let mut graph = Graph::new();
        let key = SigningKey::generate();
        let cipher = PlainCipher;
        let device = KeyScope::new(ScopeType::Device, "d1");

        let h1 = graph
            .append(
                LinkBody {
                    action_type: "CREATE_TEAM".into(),
                    payload: vec![],
                    user: KeyScope::new(ScopeType::User, "alice"),
                    device: device.clone(),
                    timestamp: 0,
                    prev: vec![],
                    key_generation: 0,
                },
                device.clone(),
                &key,
                &cipher,
            )
            .unwrap();
        let h2 = graph
            .append(
                LinkBody {
                    action_type: "ADD_MEMBER".into(),
                    payload: vec![],
                    user: KeyScope::new(ScopeType::User, "alice"),
                    device: device.clone(),
                    timestamp: 1,
                    prev: vec![],
                    key_generation: 0,
                },
                device,
                &key,
                &cipher,
            )
            .unwrap();

        let edges = |h: &Hash| graph.parents_of(h);
        let bytes = save(&graph, edges);
        assert_eq!(bytes[0], WIRE_VERSION);

        let (loaded, _edges) = load(&bytes, |_| None).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.root(), Some(h1));
        assert_eq!(loaded.head(), &std::collections::BTreeSet::from([h2]));
        assert!(loaded.is_predecessor(&h1, &h2));
    }

    #[test]
    fn load_rejects_a_link_whose_signature_does_not_match_the_known_signer() {
        let mut graph = Graph::new();
        let key = SigningKey::generate();
        let cipher = PlainCipher;
        let device = KeyScope::new(ScopeType::Device, "d1");

        graph
            .append(
                LinkBody {
                    action_type: "CREATE_TEAM".into(),
                    payload: vec![],
                    user: KeyScope::new(ScopeType::User, "alice"),
                    device: device.clone(),
                    timestamp: 0,
                    prev: vec![],
                    key_generation: 0,
                },
                device.clone(),
                &key,
                &cipher,
            )
            .unwrap();

        let edges = |h: &Hash| graph.parents_of(h);
        let bytes = save(&graph, edges);

        let impostor_key = SigningKey::generate();
        let resolve_signer = |scope: &KeyScope| (*scope == device).then(|| impostor_key.verifying_key());
        assert_matches!(load(&bytes, resolve_signer), Err(GraphError::SignatureInvalid { .. }));
    }

    #[test]
    fn load_accepts_a_link_verified_against_its_real_signer() {
        let mut graph = Graph::new();
        let key = SigningKey::generate();
        let cipher = PlainCipher;
        let device = KeyScope::new(ScopeType::Device, "d1");

        graph
            .append(
                LinkBody {
                    action_type: "CREATE_TEAM".into(),
                    payload: vec![],
                    user: KeyScope::new(ScopeType::User, "alice"),
                    device: device.clone(),
                    timestamp: 0,
                    prev: vec![],
                    key_generation: 0,
                },
                device.clone(),
                &key,
                &cipher,
            )
            .unwrap();

        let edges = |h: &Hash| graph.parents_of(h);
        let bytes = save(&graph, edges);

        let resolve_signer = |scope: &KeyScope| (*scope == device).then(|| key.verifying_key());
        assert!(load(&bytes, resolve_signer).is_ok());
    }

    #[test]
    fn unsupported_version_rejected() {
        let bytes = vec![99u8, 0, 0, 0];
        assert_matches!(load(&bytes, |_| None), Err(GraphError::UnsupportedVersion { version: 99 }));
    }

    #[test]
    fn empty_buffer_rejected() {
        assert_matches!(load(&[], |_| None), Err(GraphError::Malformed { .. }));
    }
}
