//! The append-only, hash-linked DAG of signed actions that underlies a
//! team's membership history.
//!
//! This crate knows how to hash, sign, link, merge, and order; it holds no
//! key material and no team-membership semantics. Those live in
//! `concord-reducer` (interpretation) and `concord-crypto` (body
//! encryption), which this crate consumes only through the [`cipher::BodyCipher`]
//! and [`topo::Comparator`] trait seams.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod error;
pub mod graph;
pub mod link;
pub mod serialization;
pub mod topo;

pub use cipher::BodyCipher;
pub use error::{GraphError, Result};
pub use graph::{Graph, ParentMapOptions};
pub use link::{Link, LinkBody, LINK_HASH_SCOPE};
pub use serialization::{load, save};
pub use topo::{topo_sort, Comparator, HashOrder};
