//! Graph-integrity errors.

use concord_crypto::Hash;
use serde::{Deserialize, Serialize};

/// Errors raised while appending to, merging, or traversing a [`crate::Graph`].
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    /// A link's `prev` entry does not exist in the graph (§3 invariant b).
    #[error("dangling predecessor {missing} referenced by link {link}")]
    DanglingPredecessor {
        /// The missing predecessor hash.
        missing: Hash,
        /// The link that referenced it.
        link: Hash,
    },

    /// A link's signature did not verify against its claimed author.
    #[error("signature invalid for link {link}")]
    SignatureInvalid {
        /// The offending link.
        link: Hash,
    },

    /// A link body failed to decrypt under any keyset in the supplied keyring.
    #[error("failed to decrypt link {link} under any known team keyset generation")]
    DecryptionFailed {
        /// The offending link.
        link: Hash,
    },

    /// The serialized graph envelope carried an unsupported version byte.
    #[error("unsupported graph wire format version {version}")]
    UnsupportedVersion {
        /// The version byte found.
        version: u8,
    },

    /// The serialized graph envelope was malformed.
    #[error("malformed graph envelope: {message}")]
    Malformed {
        /// Description of the malformation.
        message: String,
    },
}

/// Result alias used throughout `concord-graph`.
pub type Result<T> = std::result::Result<T, GraphError>;
