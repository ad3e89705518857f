//! Type-safe identifier wrappers.
//!
//! Every entity the world can destroy between cycles (agents, sites,
//! extraction nodes, facilities) is referenced through a strongly-typed
//! handle so that a persisted site id can never be looked up as an agent.
//! Handles are opaque: holding one says nothing about whether the entity
//! still exists, and every lookup through the world returns an `Option`.
//!
//! Locations are the exception. They are named regions of the map rather
//! than destructible entities, so [`LocationId`] wraps the region name.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a mobile agent.
    AgentId
}

define_id! {
    /// Unique identifier for a resource site (container, storage, link).
    SiteId
}

define_id! {
    /// Unique identifier for an extraction node.
    NodeId
}

define_id! {
    /// Unique identifier for a facility that creates agents.
    FacilityId
}

define_id! {
    /// Stable identifier of a haul task, assigned on first validation.
    HaulTaskId
}

/// Name of a map region (the unit the scheduler and trackers key on).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub String);

impl LocationId {
    /// Create a location identifier from a region name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the region name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}
