//! World provider seam and in-memory world for the colony scheduling core.
//!
//! The scheduling components never own world entities. They hold handles
//! and re-resolve them through the [`World`] trait every cycle, tolerating
//! any entity having been destroyed since the previous cycle.
//!
//! # Modules
//!
//! - [`error`] -- [`WorldError`], [`CreateError`], and [`TransferError`].
//! - [`provider`] -- The [`World`] trait: lookups, spatial queries, and the
//!   two mutating primitives (agent creation, resource transfer).
//! - [`spatial`] -- Range helpers, neighbour enumeration, closest-by-range.
//! - [`sim`] -- [`SimWorld`], a deterministic in-memory [`World`].
//! - [`starting_colony`] -- A small single-region colony for demos and tests.

pub mod error;
pub mod provider;
pub mod sim;
pub mod spatial;
pub mod starting_colony;

// Re-export primary types at crate root.
pub use error::{CreateError, TransferError, WorldError};
pub use provider::World;
pub use sim::SimWorld;
pub use starting_colony::{StartingColonyIds, create_starting_colony};
