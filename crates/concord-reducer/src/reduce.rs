//! The pure fold `reduce(initial, resolved_links) -> TeamState` (§4.2).

use crate::action::TeamAction;
use crate::resolver::resolve;
use crate::state::TeamState;
use crate::transform::transform;
use concord_graph::{BodyCipher, Graph};

/// Fold `graph`'s resolved link order into a [`TeamState`] starting from
/// `initial`. Deterministic: two graphs with the same link set always
/// produce the same state regardless of merge/insertion history (§8).
pub fn reduce(initial: TeamState, graph: &Graph, cipher: &dyn BodyCipher) -> TeamState {
    let resolution = resolve(graph, cipher);
    let mut state = initial;

    for exclusion in &resolution.excluded {
        tracing::warn!(link = %exclusion.0, reason = exclusion.1, "resolver excluded link from reduce");
    }

    for hash in &resolution.order {
        let Some(link) = graph.get(hash) else { continue };
        let body = match graph.decode_body(hash, cipher) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(link = %hash, error = %err, "skipping link that failed to decrypt");
                continue;
            }
        };
        let action = match bincode::deserialize::<TeamAction>(&body.payload) {
            Ok(action) => action,
            Err(err) => {
                tracing::warn!(
                    link = %hash,
                    error = %err,
                    "skipping link with malformed action payload"
                );
                continue;
            }
        };
        tracing::debug!(link = %hash, action = action.type_name(), "applying action");
        transform(&mut state, link, action);
        state.head = graph.head().clone();
    }

    state
}
