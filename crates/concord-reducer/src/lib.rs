//! The membership reducer: `TeamAction`, the pure fold into [`state::TeamState`],
//! and the resolver that filters/re-orders concurrent admin-conflicting
//! links before the fold sees them.
//!
//! This crate knows team semantics but nothing about transport, storage,
//! or lockbox creation — those live in `concord-connection`/`concord-team`
//! and `concord-crypto` respectively.

#![forbid(unsafe_code)]

pub mod action;
pub mod reduce;
pub mod resolver;
pub mod seniority;
pub mod state;
pub mod transform;

pub use action::TeamAction;
pub use reduce::reduce;
pub use resolver::{resolve, Resolution, SeniorityComparator};
pub use seniority::Seniority;
pub use state::{Device, Invitation, Member, Role, Server, TeamState, ADMIN_ROLE};
