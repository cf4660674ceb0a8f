//! The `updated`/`connected`/`joined`/`disconnected` publish mechanism
//! (§9 "Event emitter"): a registry of typed callbacks invoked
//! synchronously at dispatch boundaries, not a control-flow primitive.

use concord_crypto::Hash;
use std::collections::BTreeSet;

/// One event a [`crate::Team`] emits to its registered listeners.
#[derive(Debug, Clone)]
pub enum TeamEvent {
    /// The derived state changed; carries the new graph head.
    Updated {
        /// The graph head after the change.
        head: BTreeSet<Hash>,
    },
}

/// A synchronous registry of [`TeamEvent`] listeners.
///
/// Listeners are invoked in registration order, inline on the thread that
/// triggered the event — there is no queue, no async delivery, matching
/// §5's single-threaded cooperative model.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Vec<Box<dyn FnMut(&TeamEvent) + Send>>,
}

impl EventEmitter {
    /// Create an empty emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, invoked on every subsequent [`EventEmitter::emit`].
    pub fn on(&mut self, listener: impl FnMut(&TeamEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Deliver `event` to every registered listener, in order.
    pub fn emit(&mut self, event: TeamEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
