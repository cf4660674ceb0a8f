//! # concord-team
//!
//! The `Team` façade: one participant's local view of a team's signed-action
//! graph, the `dispatch → append → merge → reduce` loop that drives it, the
//! key-rotation policy that follows a compromise, and the read-only
//! selectors applications query against the derived state.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod config;
pub mod error;
pub mod events;
pub mod keyring;
pub mod rotation;
pub mod selectors;
pub mod team;

pub use config::TeamConfig;
pub use error::{ErrorKind, Result};
pub use events::{EventEmitter, TeamEvent};
pub use keyring::TeamKeyring;
pub use rotation::LockboxIndex;
pub use team::Team;

pub use concord_invitation::{CreatedInvitation, Proof};
pub use concord_reducer::{Device, Invitation, Member, Role, Server, TeamState, ADMIN_ROLE};
