//! The membership resolver: filters and re-orders concurrent links to
//! enforce admin-conflict policy before the reducer sees them (§4.3).

use crate::action::TeamAction;
use crate::seniority::Seniority;
use concord_crypto::Hash;
use concord_graph::{topo_sort, BodyCipher, Comparator, Graph, HashOrder};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Orders concurrent links by the author's seniority, tie-broken by hash —
/// the default comparator named in §4.1/§4.3.
pub struct SeniorityComparator<'a> {
    graph: &'a Graph,
    cipher: &'a dyn BodyCipher,
    seniority: &'a Seniority,
}

impl<'a> SeniorityComparator<'a> {
    /// Build a comparator backed by a precomputed [`Seniority`] order.
    pub fn new(graph: &'a Graph, cipher: &'a dyn BodyCipher, seniority: &'a Seniority) -> Self {
        Self {
            graph,
            cipher,
            seniority,
        }
    }

    fn author_of(&self, hash: &Hash) -> Option<String> {
        let body = self.graph.decode_body(hash, self.cipher).ok()?;
        Some(body.user.name)
    }
}

impl Comparator for SeniorityComparator<'_> {
    fn compare(&self, a: &Hash, b: &Hash) -> Ordering {
        let (author_a, author_b) = (self.author_of(a), self.author_of(b));
        match (author_a, author_b) {
            (Some(ua), Some(ub)) if ua != ub => {
                match (self.seniority.rank_of(&ua), self.seniority.rank_of(&ub)) {
                    (Some(ra), Some(rb)) if ra != rb => ra.cmp(&rb),
                    _ => a.as_bytes().cmp(b.as_bytes()),
                }
            }
            _ => a.as_bytes().cmp(b.as_bytes()),
        }
    }
}

/// The resolved, filtered link order ready for [`crate::reduce::reduce`].
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Hashes to fold, in the order the reducer should apply them.
    pub order: Vec<Hash>,
    /// Hashes present in the graph but dropped by resolver policy, with a
    /// short reason (for logging/inspection, never user-facing text).
    pub excluded: Vec<(Hash, &'static str)>,
}

struct DecodedLink {
    hash: Hash,
    user_id: String,
    action: TeamAction,
}

/// Resolve `graph` into an ordered, conflict-filtered sequence of link
/// hashes. Pure: any two callers with the same graph get the same result.
pub fn resolve(graph: &Graph, cipher: &dyn BodyCipher) -> Resolution {
    let seniority = Seniority::compute(graph, cipher);
    let comparator = SeniorityComparator::new(graph, cipher, &seniority);
    let order = topo_sort(graph, &comparator);

    let decoded: Vec<DecodedLink> = order
        .iter()
        .filter_map(|hash| {
            let body = graph.decode_body(hash, cipher).ok()?;
            let action = bincode::deserialize::<TeamAction>(&body.payload).ok()?;
            Some(DecodedLink {
                hash: *hash,
                user_id: body.user.name,
                action,
            })
        })
        .collect();

    let mut excluded: HashMap<Hash, &'static str> = HashMap::new();
    let mut voided_admins: HashSet<String> = HashSet::new();

    apply_mutual_conflict_rule(graph, &decoded, &seniority, &mut excluded, &mut voided_admins);
    apply_invalidated_authority_cascade(&decoded, &mut excluded, &mut voided_admins);
    apply_duplicate_admission_rule(&decoded, &seniority, &mut excluded);

    let filtered_order: Vec<Hash> = order.into_iter().filter(|h| !excluded.contains_key(h)).collect();
    let excluded_list = excluded.into_iter().collect();

    Resolution {
        order: filtered_order,
        excluded: excluded_list,
    }
}

/// Rule 1: mutual remove/demote, plus the one-sided case a demotion
/// concurrent with its author's own admin-gated action (§4.3 rule 1).
///
/// Two shapes both land here:
/// - X and Y concurrently target each other (`mutual_conflict_loser`):
///   the senior's action wins, the junior's is excluded.
/// - A senior's demotion of Y is concurrent with some other admin-gated
///   action Y authored (e.g. a promotion Y issued before learning of the
///   demotion): Y's action is excluded and Y is voided, seeding rule 2's
///   cascade even without a reciprocal removal from Y.
fn apply_mutual_conflict_rule(
    graph: &Graph,
    decoded: &[DecodedLink],
    seniority: &Seniority,
    excluded: &mut HashMap<Hash, &'static str>,
    voided_admins: &mut HashSet<String>,
) {
    let revocations: Vec<(&DecodedLink, String)> = decoded
        .iter()
        .filter_map(|link| admin_conflict_target(&link.action).map(|t| (link, t)))
        .collect();

    for i in 0..revocations.len() {
        for j in (i + 1)..revocations.len() {
            let (link_a, target_a) = &revocations[i];
            let (link_b, target_b) = &revocations[j];
            if link_a.user_id != *target_b || link_b.user_id != *target_a {
                continue; // not a mutual pair
            }
            if !graph.is_concurrent(&link_a.hash, &link_b.hash) {
                continue;
            }
            let junior = if seniority.is_senior(&link_a.user_id, &link_b.user_id) {
                link_b
            } else {
                link_a
            };
            excluded.entry(junior.hash).or_insert("mutual_conflict_loser");
            voided_admins.insert(junior.user_id.clone());
        }
    }

    for (revocation, target) in &revocations {
        if excluded.contains_key(&revocation.hash) {
            continue; // this demotion itself lost a mutual conflict
        }
        for link in decoded {
            if &link.user_id != target || !is_admin_gated(&link.action) {
                continue;
            }
            if excluded.contains_key(&link.hash) || link.hash == revocation.hash {
                continue;
            }
            if graph.is_concurrent(&revocation.hash, &link.hash) {
                excluded.entry(link.hash).or_insert("concurrent_with_own_demotion");
                voided_admins.insert(target.clone());
            }
        }
    }
}

fn admin_conflict_target(action: &TeamAction) -> Option<String> {
    match action {
        TeamAction::RemoveMember { user_id, .. } => Some(user_id.clone()),
        TeamAction::RemoveMemberRole {
            user_id, role_name, ..
        } if role_name == crate::state::ADMIN_ROLE => Some(user_id.clone()),
        _ => None,
    }
}

/// Whether `action` requires its author to currently hold admin. Used to
/// decide which of a voided admin's links the invalidated-authority
/// cascade (rule 2) must also strike.
fn is_admin_gated(action: &TeamAction) -> bool {
    matches!(
        action,
        TeamAction::AddMember { .. }
            | TeamAction::RemoveMember { .. }
            | TeamAction::AddRole { .. }
            | TeamAction::RemoveRole { .. }
            | TeamAction::AddMemberRole { .. }
            | TeamAction::RemoveMemberRole { .. }
            | TeamAction::AddServer { .. }
            | TeamAction::RemoveServer { .. }
            | TeamAction::InviteMember { .. }
            | TeamAction::InviteDevice { .. }
            | TeamAction::RevokeInvitation { .. }
            | TeamAction::AdmitMember { .. }
            | TeamAction::AdmitDevice { .. }
            | TeamAction::ChangeServerKeys { .. }
            | TeamAction::RotateKeys { .. }
    )
}

/// Rule 2: invalidated authority. Whenever an `AddMemberRole(admin)`
/// promotion ends up excluded (by rule 1, or by an earlier round of this
/// cascade), the promoted party never actually held admin — so every
/// admin-gated action they themselves authored is void too, which can
/// invalidate further promotions in turn (§4.3 rule 2).
fn apply_invalidated_authority_cascade(
    decoded: &[DecodedLink],
    excluded: &mut HashMap<Hash, &'static str>,
    voided_admins: &mut HashSet<String>,
) {
    loop {
        let newly_voided: Vec<String> = decoded
            .iter()
            .filter(|link| excluded.contains_key(&link.hash))
            .filter_map(|link| match &link.action {
                TeamAction::AddMemberRole { user_id, role_name, .. }
                    if role_name == crate::state::ADMIN_ROLE && !voided_admins.contains(user_id) =>
                {
                    Some(user_id.clone())
                }
                _ => None,
            })
            .collect();
        if newly_voided.is_empty() {
            break;
        }
        for user_id in newly_voided {
            voided_admins.insert(user_id);
        }
        for link in decoded {
            if voided_admins.contains(&link.user_id)
                && is_admin_gated(&link.action)
                && !excluded.contains_key(&link.hash)
            {
                excluded.entry(link.hash).or_insert("authored_by_voided_admin");
            }
        }
    }
}

/// Rule 3: duplicate admission. If the same invitation is admitted
/// concurrently beyond its `maxUses`, the earliest admissions (by
/// seniority of author, then hash — i.e. resolved order) win (§4.3 rule 3).
fn apply_duplicate_admission_rule(
    decoded: &[DecodedLink],
    seniority: &Seniority,
    excluded: &mut HashMap<Hash, &'static str>,
) {
    let mut max_uses: HashMap<String, u32> = HashMap::new();
    for link in decoded {
        match &link.action {
            TeamAction::InviteMember { id, max_uses: m, .. } => {
                max_uses.insert(id.clone(), *m);
            }
            TeamAction::InviteDevice { id, .. } => {
                max_uses.insert(id.clone(), 1);
            }
            _ => {}
        }
    }

    let mut admissions: HashMap<String, Vec<&DecodedLink>> = HashMap::new();
    for link in decoded {
        if excluded.contains_key(&link.hash) {
            continue;
        }
        let invitation_id = match &link.action {
            TeamAction::AdmitMember { invitation_id, .. }
            | TeamAction::AdmitDevice { invitation_id, .. } => invitation_id.clone(),
            _ => continue,
        };
        admissions.entry(invitation_id).or_default().push(link);
    }

    for (invitation_id, mut uses) in admissions {
        let limit = max_uses.get(&invitation_id).copied().unwrap_or(1) as usize;
        if uses.len() <= limit {
            continue;
        }
        uses.sort_by(|a, b| {
            match (seniority.rank_of(&a.user_id), seniority.rank_of(&b.user_id)) {
                (Some(ra), Some(rb)) if ra != rb => ra.cmp(&rb),
                _ => a.hash.as_bytes().cmp(b.hash.as_bytes()),
            }
        });
        for link in uses.into_iter().skip(limit) {
            excluded.entry(link.hash).or_insert("duplicate_admission_over_max_uses");
        }
    }
}
