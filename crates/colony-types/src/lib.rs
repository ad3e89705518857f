//! Shared type definitions for the colony scheduling core.
//!
//! This crate is the single source of truth for identifiers, enumerations,
//! and the read-only entity views that flow between the world provider and
//! the scheduling components.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier wrappers for every world entity
//! - [`enums`] -- Capabilities, mobility modes, priority tiers, roles, terrain
//! - [`structs`] -- Positions, creation payloads, and entity views

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Capability, MobilityMode, Priority, Role, SiteKind, Terrain};
pub use ids::{AgentId, FacilityId, HaulTaskId, LocationId, NodeId, SiteId};
pub use structs::{
    AgentSpec, AgentView, Assignment, ClaimTarget, FacilityView, NodeView, Payload, Position,
    SiteView,
};
