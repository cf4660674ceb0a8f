//! The total order over members used to break admin conflicts (§4.3).
//!
//! Founder first; otherwise a member introduced by a DAG-predecessor
//! `ADD_MEMBER`/`ADMIT_MEMBER`/`CREATE_TEAM` link is senior to one
//! introduced later; concurrent introductions tie-break on link hash.
//! This is exactly what `topo_sort` with [`concord_graph::HashOrder`]
//! already computes, restricted to membership-introducing links — the
//! open tie-break question in the original design (§9) is settled here.

use crate::action::TeamAction;
use concord_crypto::Hash;
use concord_graph::{topo_sort, BodyCipher, Graph, HashOrder};
use std::collections::HashMap;

/// The computed seniority rank of every member ever introduced to a team.
#[derive(Debug, Clone, Default)]
pub struct Seniority {
    rank: HashMap<String, usize>,
    introduced_by: HashMap<String, Hash>,
}

impl Seniority {
    /// Compute seniority over every member-introducing link in `graph`.
    pub fn compute(graph: &Graph, cipher: &dyn BodyCipher) -> Self {
        let order = topo_sort(graph, &HashOrder);
        let mut rank = HashMap::new();
        let mut introduced_by = HashMap::new();

        for hash in order {
            let Ok(body) = graph.decode_body(&hash, cipher) else {
                continue;
            };
            let Ok(action) = bincode::deserialize::<TeamAction>(&body.payload) else {
                continue;
            };
            let user_id = match action {
                TeamAction::CreateTeam { founder_id, .. } => Some(founder_id),
                TeamAction::AddMember { user_id, .. } => Some(user_id),
                TeamAction::AdmitMember { user_id, .. } => Some(user_id),
                _ => None,
            };
            if let Some(user_id) = user_id {
                if !rank.contains_key(&user_id) {
                    rank.insert(user_id.clone(), rank.len());
                    introduced_by.insert(user_id, hash);
                }
            }
        }

        Self { rank, introduced_by }
    }

    /// This member's rank (lower is more senior), if they were ever introduced.
    pub fn rank_of(&self, user_id: &str) -> Option<usize> {
        self.rank.get(user_id).copied()
    }

    /// Whether `a` outranks (is senior to) `b`. Unknown members rank last.
    pub fn is_senior(&self, a: &str, b: &str) -> bool {
        match (self.rank_of(a), self.rank_of(b)) {
            (Some(ra), Some(rb)) => ra < rb,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// The hash of the link that introduced `user_id`, if known.
    pub fn introducing_link(&self, user_id: &str) -> Option<Hash> {
        self.introduced_by.get(user_id).copied()
    }
}
