//! Deterministic topological ordering of a [`Graph`]'s links.
//!
//! `concord-graph` has no notion of team seniority or role, so it cannot
//! decide how to break ties between concurrent links on its own. It takes
//! a [`Comparator`] trait object from the caller instead — `concord-reducer`
//! supplies one backed by seniority order (§4.1, §4.3).

use crate::graph::Graph;
use concord_crypto::Hash;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

/// Breaks ties between links that have no ordering relation in the DAG
/// (i.e. links in the same antichain).
///
/// Must be a total order over any set of hashes it is asked to compare,
/// or `topo_sort` will not be deterministic.
pub trait Comparator {
    /// Compare two concurrent links by their hashes.
    fn compare(&self, a: &Hash, b: &Hash) -> Ordering;
}

/// A comparator that breaks ties by raw hash byte order. Used where no
/// richer seniority information is available (tests, tools).
pub struct HashOrder;

impl Comparator for HashOrder {
    fn compare(&self, a: &Hash, b: &Hash) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }
}

/// Produce a deterministic total order over every link in `graph`.
///
/// Kahn's algorithm over in-degree, with the ready set at each step
/// ordered by `comparator` before picking the next link. Two graphs with
/// the same link set always produce the same order, regardless of
/// insertion history, which is what makes [`crate::Graph::merge`]
/// commutative at the reducer layer (§8).
pub fn topo_sort(graph: &Graph, comparator: &dyn Comparator) -> Vec<Hash> {
    let mut in_degree: HashMap<Hash, usize> = HashMap::new();
    for hash in graph.hashes() {
        in_degree.entry(*hash).or_insert(0);
    }
    for hash in graph.hashes() {
        for child in graph.children_of(hash) {
            *in_degree.entry(child).or_insert(0) += 1;
        }
    }

    let mut ready: Vec<Hash> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(h, _)| *h)
        .collect();
    sort_by(&mut ready, comparator);
    let mut ready: VecDeque<Hash> = ready.into();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(hash) = ready.pop_front() {
        order.push(hash);
        let mut newly_ready = Vec::new();
        for child in graph.children_of(&hash) {
            let deg = in_degree.get_mut(&child).expect("child tracked in in_degree");
            *deg -= 1;
            if *deg == 0 {
                newly_ready.push(child);
            }
        }
        sort_by(&mut newly_ready, comparator);
        // Merge-insert the newly-ready links into `ready`, keeping the
        // whole queue ordered by `comparator` so ties always resolve the
        // same way regardless of discovery order.
        for hash in newly_ready {
            let pos = ready
                .iter()
                .position(|h| comparator.compare(h, &hash) == Ordering::Greater)
                .unwrap_or(ready.len());
            ready.insert(pos, hash);
        }
    }
    order
}

fn sort_by(hashes: &mut [Hash], comparator: &dyn Comparator) {
    hashes.sort_by(|a, b| comparator.compare(a, b));
}
