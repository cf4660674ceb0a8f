//! # concord-connection
//!
//! The per-peer handshake/sync/negotiation session (§4.6): a wire
//! [`Message`] envelope, a hierarchical [`ConnectionState`], a pure
//! transition core deciding what happens next, and the effectful
//! [`Connection`] driver that carries out the mutations the pure core
//! cannot — admitting an invitee, merging a peer's graph fragment — and
//! hands the caller whatever messages to send and events to surface.
//!
//! This crate moves no bytes itself; a transport (whatever the host
//! wires up) is handed each outgoing [`Message`] and feeds each incoming
//! one back into [`Connection::deliver`].

#![forbid(unsafe_code)]

pub mod connection;
pub mod identity;
pub mod message;
pub mod session;
pub mod state;
pub mod sync;
pub mod transition;

pub use connection::{Connection, ConnectionEvent, InviteeCredentials};
pub use message::{IdentityClaim, Message, WIRE_SCHEMA_VERSION};
pub use session::SessionHalf;
pub use state::{
    AuthenticatingPhase, CheckingIdentity, ConnectionState, Deadline, InvitationPhase, NegotiatingPhase,
    ProvingIdentity, VerifyingIdentity,
};
pub use transition::{Action, Context, Event, LocalIdentity};
