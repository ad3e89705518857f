//! Resource allocation and scheduling core for the colony simulation.
//!
//! This crate decides which agents get created, where they work, and what
//! they refill from. It runs once per cycle against a [`World`] and keeps
//! all of its bookkeeping in a serializable [`ColonyState`].
//!
//! # Modules
//!
//! - [`composition`] -- Capability profiles from ratios and a budget.
//! - [`config`] -- Configuration loading from `colony-config.yaml` into
//!   strongly-typed structs.
//! - [`cycle`] -- The per-cycle driver, [`Consumers`] trait and
//!   [`NoConsumers`] stub.
//! - [`error`] -- [`CoreError`].
//! - [`haul`] -- Haul tasks between two sites and their transporters.
//! - [`occupancy`] -- Extraction node slots, dedicated harvesters, and the
//!   location health signal.
//! - [`provider`] -- The refill flow consumer roles call into.
//! - [`scheduler`] -- Per-location production queues with four priority
//!   tiers.
//! - [`state`] -- Persistent state and the [`StateStore`] seam.
//!
//! [`World`]: colony_world::World
//! [`ColonyState`]: state::ColonyState
//! [`StateStore`]: state::StateStore
//! [`Consumers`]: cycle::Consumers
//! [`NoConsumers`]: cycle::NoConsumers
//! [`CoreError`]: error::CoreError

pub mod composition;
pub mod config;
pub mod cycle;
pub mod error;
pub mod haul;
pub mod occupancy;
pub mod provider;
pub mod scheduler;
pub mod state;

pub use cycle::{Consumers, CycleContext, CycleReport, CycleRunner, NoConsumers};
pub use error::CoreError;
pub use state::{ColonyState, JsonFileStore, MemoryStore, StateStore};
