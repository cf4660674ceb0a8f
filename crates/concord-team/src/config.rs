//! `TeamConfig`: the small set of knobs a host can tune, built with a
//! validated constructor rather than a file-backed loader (there is no
//! host filesystem in scope here).

use std::time::Duration;

/// Configuration shared by a [`crate::Team`] and the connections it drives.
#[derive(Debug, Clone)]
pub struct TeamConfig {
    /// How long a `Connection` may sit in any non-`connected` state before
    /// it is forced to `disconnected` (§4.6 "Cancellation / timeout").
    pub connection_timeout: Duration,
    /// Whether `dispatch` re-checks admin/last-admin invariants locally
    /// before appending, in addition to the resolver's reduce-time check.
    /// Disabling this is only useful for fuzzing malicious-peer behavior.
    pub enforce_dispatch_invariants: bool,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            enforce_dispatch_invariants: true,
        }
    }
}

impl TeamConfig {
    /// Build a config, rejecting a zero timeout (a connection could never
    /// make progress).
    pub fn new(connection_timeout: Duration) -> Result<Self, &'static str> {
        if connection_timeout.is_zero() {
            return Err("connection_timeout must be greater than zero");
        }
        Ok(Self {
            connection_timeout,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_thirty_seconds() {
        assert_eq!(TeamConfig::default().connection_timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(TeamConfig::new(Duration::ZERO).is_err());
    }
}
