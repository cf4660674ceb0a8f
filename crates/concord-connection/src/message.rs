//! Wire messages exchanged over one `Connection` channel (§4.6).
//!
//! This is the envelope a transport carries; encrypting all non-`Hello`
//! traffic under the evolving session key is the host's job once
//! `Connection` hands it a `Message` to send, the same separation
//! `aura-anti-entropy::wire`'s `SyncWireMessage` draws between the wire
//! payload and the channel that moves it.

use concord_crypto::{Hash, Keyset, Lockbox, Sealed, Signature};
use concord_invitation::Proof;
use concord_team::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Bumped whenever a variant's shape changes incompatibly.
pub const WIRE_SCHEMA_VERSION: u16 = 1;

/// What a connecting party claims to be, presented in `HELLO`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IdentityClaim {
    /// An existing member claiming one of their own devices.
    Device {
        /// The claimed member id.
        user_id: String,
        /// The claimed device name.
        device_name: String,
    },
    /// A party with no team state yet, presenting proof of an invitation
    /// instead of a device identity (§4.6 "Invitee path").
    Invitation {
        /// Proof the presenter holds the invitation's seed.
        proof: Proof,
        /// The user id to admit as. Honored only for a member invitation;
        /// a device invitation is already bound to an existing user id
        /// and this is ignored in favor of that binding.
        user_id: String,
        /// The new member's display name, or the new device's name, per
        /// which kind of invitation `proof` was issued against.
        name: String,
        /// The public keys to admit, if the proof validates.
        public_keys: Keyset,
    },
}

/// One message on a `Connection` channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Opening claim: a device identity or an invitation proof.
    Hello {
        /// Protocol version the sender speaks.
        schema_version: u16,
        /// The sender's identity claim.
        claim: IdentityClaim,
    },
    /// Sent by the member side to an admitted invitee: the graph and the
    /// current team (and, if applicable, admin) keyring, sealed to the
    /// invitee's freshly admitted encryption key.
    AcceptInvitation {
        /// The serialized graph (`concord_graph::save` output).
        graph: Vec<u8>,
        /// The team scope's current keyset, lockboxed to the invitee.
        team_keys: Lockbox,
        /// The admin role's current keyset, lockboxed to the invitee, if
        /// the invitee was admitted with the admin role.
        admin_keys: Option<Lockbox>,
    },
    /// A freshness nonce the verifier wants the prover to sign.
    ChallengeIdentity {
        /// Random nonce, unique per challenge.
        nonce: [u8; 32],
        /// Unix-epoch seconds the challenge was issued, to detect replay
        /// of a stale challenge (§7 `CHALLENGE_STALE`).
        timestamp: u64,
    },
    /// The prover's signature over the challenge bytes.
    ProveIdentity {
        /// Signature over `identity::challenge_bytes(..)`.
        signature: Signature,
        /// Echoes the challenge's timestamp.
        timestamp: u64,
    },
    /// The verifier accepts the proof.
    AcceptIdentity,
    /// The verifier rejects the proof or the claimed identity.
    RejectIdentity {
        /// Why the identity was rejected.
        kind: ErrorKind,
    },
    /// Announce the sender's current graph head, to find a common
    /// frontier (§4.6 "Graph sync").
    Sync {
        /// The sender's current graph head.
        head: BTreeSet<Hash>,
        /// The sender's parent map rooted at `head`, for frontier search.
        parent_map: HashMap<Hash, Vec<Hash>>,
    },
    /// A batch of links the recipient is missing, as a serialized graph
    /// fragment merged incrementally (§4.6 "each batch is merged
    /// immediately").
    SyncLinks {
        /// `concord_graph::save` output covering at least the missing links.
        graph: Vec<u8>,
    },
    /// Half of the session seed, asymmetrically encrypted to the peer's
    /// device encryption key (§4.6 "Session-key negotiation").
    Seed {
        /// This side's random half, sealed to the peer.
        sealed_half: Sealed,
    },
    /// Terminate the connection, carrying the reason.
    Disconnect {
        /// Why the connection is ending.
        kind: ErrorKind,
    },
}

impl Message {
    /// Build a `HELLO` at the current wire schema version.
    pub fn hello(claim: IdentityClaim) -> Self {
        Message::Hello {
            schema_version: WIRE_SCHEMA_VERSION,
            claim,
        }
    }
}
