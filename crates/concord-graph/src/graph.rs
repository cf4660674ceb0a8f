//! The append-only, content-addressed DAG of links.

use crate::cipher::{decrypt_or_fail, BodyCipher};
use crate::error::{GraphError, Result};
use crate::link::{Link, LinkBody};
use concord_crypto::{Hash, KeyScope, SigningKey, VerifyingKey};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// The hash-linked DAG of a team's signed actions.
///
/// Invariants (§3): the root has no predecessor; every `prev` entry
/// exists in `links`; `head` is exactly the hashes with no child; the
/// graph is acyclic by construction (links can only reference hashes that
/// already exist).
#[derive(Debug, Clone, Default)]
pub struct Graph {
    root: Option<Hash>,
    head: BTreeSet<Hash>,
    links: HashMap<Hash, Link>,
    encrypted_bodies: HashMap<Hash, Vec<u8>>,
    key_generations: HashMap<Hash, u64>,
    child_map: HashMap<Hash, Vec<Hash>>,
}

impl Graph {
    /// An empty graph with no root, ready for its first `append`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The root link's hash, if any link has been appended yet.
    pub fn root(&self) -> Option<Hash> {
        self.root
    }

    /// The current frontier: hashes with no child.
    pub fn head(&self) -> &BTreeSet<Hash> {
        &self.head
    }

    /// Number of links in the graph.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the graph has no links yet.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Look up a link by hash.
    pub fn get(&self, hash: &Hash) -> Option<&Link> {
        self.links.get(hash)
    }

    /// Look up a link's encrypted body by hash.
    pub fn encrypted_body(&self, hash: &Hash) -> Option<&[u8]> {
        self.encrypted_bodies.get(hash).map(Vec::as_slice)
    }

    /// The team-keyset generation a link's body was encrypted under.
    pub fn key_generation(&self, hash: &Hash) -> Option<u64> {
        self.key_generations.get(hash).copied()
    }

    /// Decrypt and decode the body of `hash` using `cipher`.
    pub fn decode_body(&self, hash: &Hash, cipher: &dyn BodyCipher) -> Result<LinkBody> {
        let ciphertext = self
            .encrypted_bodies
            .get(hash)
            .ok_or(GraphError::DanglingPredecessor {
                missing: *hash,
                link: *hash,
            })?;
        let generation = *self.key_generations.get(hash).unwrap_or(&0);
        decrypt_or_fail(cipher, *hash, ciphertext, generation)
    }

    /// Iterate all link hashes in the graph (unordered).
    pub fn hashes(&self) -> impl Iterator<Item = &Hash> {
        self.links.keys()
    }

    fn insert_link(&mut self, link: Link, ciphertext: Vec<u8>, generation: u64) {
        let hash = link.hash;
        if self.links.contains_key(&hash) {
            return; // content-addressed: duplicate insert is a no-op
        }
        if self.root.is_none() {
            self.root = Some(hash);
        }
        // Recover `prev` by peeking the plaintext length prefix is not
        // possible without decrypting; callers that need prev-aware
        // bookkeeping (merge, parent map) read it back out of
        // `child_map`, which we build from the caller-visible `prev` set
        // recorded at insert time via `record_edges`.
        self.links.insert(hash, link);
        self.encrypted_bodies.insert(hash, ciphertext);
        self.key_generations.insert(hash, generation);
        self.head.insert(hash);
    }

    /// Record the DAG edges for a freshly inserted link given its
    /// plaintext `prev` set (known to the inserter, who just encrypted or
    /// decrypted the body). Keeps `child_map` and `head` consistent.
    ///
    /// A non-root link with an empty `prev` is accepted rather than
    /// rejected: it is a disconnected root, which `merge` produces
    /// transiently when two teams' histories have not yet synced.
    fn record_edges(&mut self, hash: Hash, prev: &[Hash]) -> Result<()> {
        for parent in prev {
            if !self.links.contains_key(parent) {
                return Err(GraphError::DanglingPredecessor {
                    missing: *parent,
                    link: hash,
                });
            }
            self.child_map.entry(*parent).or_default().push(hash);
            self.head.remove(parent);
        }
        Ok(())
    }

    /// Append a new link authored on top of the current head.
    ///
    /// Stamps `body.prev = self.head()`, encrypts it under the current
    /// team keyset via `cipher`, hashes the ciphertext, signs the hash
    /// with `signing_key`, inserts the link, and advances `head` to
    /// `{new_hash}`.
    pub fn append(
        &mut self,
        body: LinkBody,
        signer: KeyScope,
        signing_key: &SigningKey,
        cipher: &dyn BodyCipher,
    ) -> Result<Hash> {
        let mut body = body;
        body.prev = self.head.iter().copied().collect();
        let (ciphertext, generation) = cipher.encrypt_body(&body);
        let hash = Link::hash_body(&ciphertext);
        let link = Link::seal(hash, signer, signing_key);
        let prev = body.prev.clone();

        self.insert_link(link, ciphertext, generation);
        self.record_edges(hash, &prev)?;
        Ok(hash)
    }

    /// Insert a link received from a peer, together with its plaintext
    /// `prev` set (recovered by the caller via [`BodyCipher::decrypt_body`]),
    /// validating that every predecessor is already present.
    ///
    /// `verifying_key` is the claimed signer's currently known key, if the
    /// caller has one on file — when present, the link's signature must
    /// verify against it or the link is rejected (§3 "every link is signed
    /// by a key valid for its author"). `None` means the signer is not yet
    /// established (a fresh device's own first link); such links are
    /// admitted unverified, the same bootstrap trust any first appearance
    /// of an identity requires.
    pub fn insert_remote(
        &mut self,
        link: Link,
        ciphertext: Vec<u8>,
        generation: u64,
        prev: &[Hash],
        verifying_key: Option<&VerifyingKey>,
    ) -> Result<()> {
        if let Some(key) = verifying_key {
            if !link.verify_signature(key) {
                return Err(GraphError::SignatureInvalid { link: link.hash });
            }
        }
        let hash = link.hash;
        self.insert_link(link, ciphertext, generation);
        self.record_edges(hash, prev)
    }

    /// Merge `other` into `self`: union of links, head recomputed as the
    /// hashes with no child across the union. Idempotent, commutative,
    /// associative — duplicate hashes are discarded by content-addressed
    /// equality (§4.1).
    ///
    /// `prev_of` recovers each incoming link's plaintext `prev` set (the
    /// caller must be able to decrypt it, or have cached it locally).
    /// `resolve_signer` looks up the claimed signer's currently known key
    /// for each incoming link (see [`Graph::insert_remote`]).
    pub fn merge(
        &mut self,
        other: &Graph,
        prev_of: impl Fn(&Hash) -> Option<Vec<Hash>>,
        resolve_signer: impl Fn(&KeyScope) -> Option<VerifyingKey>,
    ) -> Result<()> {
        // Insert in an order where each link's predecessors are already
        // present — a topological walk of `other` driven by its own
        // child_map, starting from hashes with no recorded parent in `other`.
        let mut pending: VecDeque<Hash> = other
            .links
            .keys()
            .filter(|h| !other.has_any_parent(h))
            .copied()
            .collect();
        let mut inserted: HashSet<Hash> = HashSet::new();

        while let Some(hash) = pending.pop_front() {
            if self.links.contains_key(&hash) || inserted.contains(&hash) {
                continue;
            }
            let prev = prev_of(&hash).unwrap_or_default();
            if prev.iter().any(|p| !self.links.contains_key(p) && !inserted.contains(p)) {
                // Not ready yet; requeue behind links it depends on.
                pending.push_back(hash);
                continue;
            }
            let link = other.links[&hash].clone();
            let ciphertext = other.encrypted_bodies[&hash].clone();
            let generation = *other.key_generations.get(&hash).unwrap_or(&0);
            let verifying_key = resolve_signer(&link.signer);
            self.insert_remote(link, ciphertext, generation, &prev, verifying_key.as_ref())?;
            inserted.insert(hash);
            for child in other.child_map.get(&hash).into_iter().flatten() {
                pending.push_back(*child);
            }
        }
        Ok(())
    }

    fn has_any_parent(&self, hash: &Hash) -> bool {
        self.child_map.values().any(|children| children.contains(hash))
    }

    /// Immediate predecessors recorded for `hash`.
    pub fn parents_of(&self, hash: &Hash) -> Vec<Hash> {
        self.child_map
            .iter()
            .filter(|(_, children)| children.contains(hash))
            .map(|(parent, _)| *parent)
            .collect()
    }

    /// Immediate successors (children) of `hash`.
    pub fn children_of(&self, hash: &Hash) -> Vec<Hash> {
        self.child_map.get(hash).cloned().unwrap_or_default()
    }

    /// All predecessors of `hash` (transitive), via breadth-first walk.
    pub fn predecessors(&self, hash: &Hash) -> HashSet<Hash> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<Hash> = self.parents_of(hash).into();
        while let Some(h) = queue.pop_front() {
            if seen.insert(h) {
                queue.extend(self.parents_of(&h));
            }
        }
        seen
    }

    /// All successors of `hash` (transitive).
    pub fn successors(&self, hash: &Hash) -> HashSet<Hash> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<Hash> = self.children_of(hash).into();
        while let Some(h) = queue.pop_front() {
            if seen.insert(h) {
                queue.extend(self.children_of(&h));
            }
        }
        seen
    }

    /// Whether `a` is a (transitive) predecessor of `b`.
    pub fn is_predecessor(&self, a: &Hash, b: &Hash) -> bool {
        self.predecessors(b).contains(a)
    }

    /// Whether `a` and `b` are concurrent (no path in either direction).
    pub fn is_concurrent(&self, a: &Hash, b: &Hash) -> bool {
        a != b && !self.is_predecessor(a, b) && !self.is_predecessor(b, a)
    }

    /// Parent map for incremental sync: each selected link's hash to its
    /// immediate predecessors.
    ///
    /// - With `depth`: include only links within that many hops of `head`.
    /// - With `end`: include only links reachable from `head` that are
    ///   not at or beyond any hash in `end`.
    /// - With `complement_of`: return the complement of that set instead.
    pub fn parent_map(&self, opts: ParentMapOptions) -> HashMap<Hash, Vec<Hash>> {
        let mut included: HashSet<Hash> = HashSet::new();
        let mut frontier: VecDeque<(Hash, usize)> =
            self.head.iter().map(|h| (*h, 0)).collect();
        let mut visited: HashSet<Hash> = HashSet::new();

        while let Some((hash, depth)) = frontier.pop_front() {
            if !visited.insert(hash) {
                continue;
            }
            if let Some(end) = &opts.end {
                if end.contains(&hash) {
                    continue;
                }
            }
            if let Some(max_depth) = opts.depth {
                if depth > max_depth {
                    continue;
                }
            }
            included.insert(hash);
            for parent in self.parents_of(&hash) {
                frontier.push_back((parent, depth + 1));
            }
        }

        if opts.complement {
            self.links
                .keys()
                .filter(|h| !included.contains(h))
                .map(|h| (*h, self.parents_of(h)))
                .collect()
        } else {
            included
                .into_iter()
                .map(|h| {
                    let parents = self.parents_of(&h);
                    (h, parents)
                })
                .collect()
        }
    }
}

/// Options controlling [`Graph::parent_map`]'s selection window.
#[derive(Debug, Clone, Default)]
pub struct ParentMapOptions {
    /// Limit to links within this many hops of `head`.
    pub depth: Option<usize>,
    /// Stop expanding past any hash in this set.
    pub end: Option<HashSet<Hash>>,
    /// Return the complement of the selected set instead of the set itself.
    pub complement: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::BodyCipher;
    use assert_matches::assert_matches;
    use concord_crypto::ScopeType;

    /// A cipher that "encrypts" by bincode-serializing in the clear, for
    /// graph-layer tests that don't exercise real cryptography.
    struct PlainCipher;

    impl BodyCipher for PlainCipher {
        fn encrypt_body(&self, body: &LinkBody) -> (Vec<u8>, u64) {
            (bincode::serialize(body).unwrap(), 0)
        }

        fn decrypt_body(&self, ciphertext: &[u8], _generation: u64) -> Option<LinkBody> {
            bincode::deserialize(ciphertext).ok()
        }
    }

    fn body(user: &str) -> LinkBody {
        LinkBody {
            action_type: "ADD_MEMBER".into(),
            payload: vec![],
            user: KeyScope::new(ScopeType::User, user),
            device: KeyScope::new(ScopeType::Device, format!("{user}-device")),
            timestamp: 0,
            prev: vec![],
            key_generation: 0,
        }
    }

    #[test]
    fn append_advances_head_and_root() {
        let mut g = Graph::new();
        let key = SigningKey::generate();
        let cipher = PlainCipher;
        let h1 = g
            .append(body("alice"), KeyScope::new(ScopeType::Device, "d1"), &key, &cipher)
            .unwrap();
        assert_eq!(g.root(), Some(h1));
        assert_eq!(g.head(), &BTreeSet::from([h1]));

        let h2 = g
            .append(body("bob"), KeyScope::new(ScopeType::Device, "d1"), &key, &cipher)
            .unwrap();
        assert_eq!(g.root(), Some(h1));
        assert_eq!(g.head(), &BTreeSet::from([h2]));
        assert!(g.is_predecessor(&h1, &h2));
    }

    #[test]
    fn insert_remote_rejects_a_link_whose_signature_does_not_match_the_resolved_key() {
        let mut g = Graph::new();
        let key = SigningKey::generate();
        let impostor = SigningKey::generate();
        let cipher = PlainCipher;
        let signer = KeyScope::new(ScopeType::Device, "d1");

        let mut other = Graph::new();
        other
            .append(body("alice"), signer.clone(), &impostor, &cipher)
            .unwrap();
        let link = other.get(other.root().as_ref().unwrap()).unwrap().clone();
        let ciphertext = other.encrypted_body(&link.hash).unwrap().to_vec();

        let err = g
            .insert_remote(link, ciphertext, 0, &[], Some(&key.verifying_key()))
            .unwrap_err();
        assert_matches!(err, GraphError::SignatureInvalid { .. });
        assert!(g.is_empty());
    }

    #[test]
    fn insert_remote_accepts_an_unknown_signer_unverified() {
        let mut g = Graph::new();
        let key = SigningKey::generate();
        let cipher = PlainCipher;
        let signer = KeyScope::new(ScopeType::Device, "d1");

        let mut other = Graph::new();
        let hash = other.append(body("alice"), signer, &key, &cipher).unwrap();
        let link = other.get(&hash).unwrap().clone();
        let ciphertext = other.encrypted_body(&hash).unwrap().to_vec();

        g.insert_remote(link, ciphertext, 0, &[], None).unwrap();
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn duplicate_append_via_merge_is_idempotent() {
        let mut g = Graph::new();
        let key = SigningKey::generate();
        let cipher = PlainCipher;
        g.append(body("alice"), KeyScope::new(ScopeType::Device, "d1"), &key, &cipher)
            .unwrap();

        let clone = g.clone();
        let prev_of = |h: &Hash| clone.decode_body(h, &cipher).ok().map(|b| b.prev);
        g.merge(&clone, prev_of, |_| None).unwrap();
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn merge_unions_concurrent_branches_into_shared_head() {
        let key = SigningKey::generate();
        let cipher = PlainCipher;

        let mut base = Graph::new();
        let root = base
            .append(body("alice"), KeyScope::new(ScopeType::Device, "d1"), &key, &cipher)
            .unwrap();

        let mut a = base.clone();
        let ha = a
            .append(body("bob"), KeyScope::new(ScopeType::Device, "d1"), &key, &cipher)
            .unwrap();
        let mut b = base.clone();
        let hb = b
            .append(body("carol"), KeyScope::new(ScopeType::Device, "d1"), &key, &cipher)
            .unwrap();

        let prev_of_a = |h: &Hash| a.decode_body(h, &cipher).ok().map(|bd| bd.prev);
        base.merge(&a, prev_of_a, |_| None).unwrap();
        let prev_of_b = |h: &Hash| b.decode_body(h, &cipher).ok().map(|bd| bd.prev);
        base.merge(&b, prev_of_b, |_| None).unwrap();

        assert_eq!(base.head(), &BTreeSet::from([ha, hb]));
        assert!(base.is_concurrent(&ha, &hb));
        assert!(base.is_predecessor(&root, &ha));
        assert!(base.is_predecessor(&root, &hb));
    }

    #[test]
    fn parent_map_respects_depth() {
        let mut g = Graph::new();
        let key = SigningKey::generate();
        let cipher = PlainCipher;
        let h1 = g
            .append(body("a"), KeyScope::new(ScopeType::Device, "d1"), &key, &cipher)
            .unwrap();
        let h2 = g
            .append(body("b"), KeyScope::new(ScopeType::Device, "d1"), &key, &cipher)
            .unwrap();

        let map = g.parent_map(ParentMapOptions {
            depth: Some(0),
            ..Default::default()
        });
        assert!(map.contains_key(&h2));
        assert!(!map.contains_key(&h1));
    }
}
