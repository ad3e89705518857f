//! Core structs shared between the world provider and the scheduling
//! components.
//!
//! The `*View` structs are read-only snapshots the world hands out for a
//! single lookup. They are never persisted: only identifiers are, and every
//! identifier is re-resolved against the live world on the next cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{Capability, Role, SiteKind};
use crate::ids::{AgentId, FacilityId, HaulTaskId, LocationId, NodeId, SiteId};

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// A cell inside a location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Region the cell belongs to.
    pub location: LocationId,
    /// Column within the region.
    pub x: u8,
    /// Row within the region.
    pub y: u8,
}

impl Position {
    /// Create a position.
    pub fn new(location: impl Into<LocationId>, x: u8, y: u8) -> Self {
        Self {
            location: location.into(),
            x,
            y,
        }
    }

    /// Chebyshev distance to `other`, or `None` across locations.
    ///
    /// Diagonal steps cost the same as straight ones, so a range of 1
    /// means the two cells touch.
    pub fn range_to(&self, other: &Self) -> Option<u32> {
        if self.location != other.location {
            return None;
        }
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        Some(u32::from(dx.max(dy)))
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{} {},{}]", self.location, self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Creation payloads
// ---------------------------------------------------------------------------

/// Marker linking a newly created agent back to the demand that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assignment {
    /// The agent belongs to a haul task.
    HaulTask {
        /// The originating task.
        task: HaulTaskId,
    },
    /// The agent is the dedicated harvester of an extraction node.
    Node {
        /// Region of the node.
        location: LocationId,
        /// The originating node.
        node: NodeId,
    },
}

/// Data handed to a facility together with a profile and stored on the
/// created agent.
///
/// Only [`Payload::assignment`] is interpreted by the scheduling core; the
/// remaining entries belong to the consumer roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Assignment marker, if the agent was created for a specific task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
    /// Consumer-specific data, passed through untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Payload {
    /// A payload carrying only an assignment marker.
    pub const fn assigned(assignment: Assignment) -> Self {
        Self {
            assignment: Some(assignment),
            extra: BTreeMap::new(),
        }
    }
}

/// Everything a facility needs to create one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique display name (`<role>-<uuid>`).
    pub name: String,
    /// Role tag.
    pub role: Role,
    /// Ordered capability units.
    pub profile: Vec<Capability>,
    /// Creation payload stored on the agent.
    pub payload: Payload,
}

// ---------------------------------------------------------------------------
// Entity views
// ---------------------------------------------------------------------------

/// Snapshot of a live agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentView {
    /// Agent handle.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Role tag.
    pub role: Role,
    /// Current cell.
    pub position: Position,
    /// Resource currently carried.
    pub carried: u32,
    /// Maximum resource the agent can carry.
    pub carry_capacity: u32,
    /// Creation payload.
    pub payload: Payload,
}

impl AgentView {
    /// Room left in the agent's cargo.
    pub const fn free_capacity(&self) -> u32 {
        self.carry_capacity.saturating_sub(self.carried)
    }

    /// Whether the agent cannot carry any more.
    pub const fn is_full(&self) -> bool {
        self.carried >= self.carry_capacity
    }
}

/// Snapshot of a live resource site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteView {
    /// Site handle.
    pub id: SiteId,
    /// Site kind.
    pub kind: SiteKind,
    /// Cell of the site.
    pub position: Position,
    /// Resource currently stored.
    pub content: u32,
    /// Maximum storable resource.
    pub capacity: u32,
}

/// Snapshot of a live extraction node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    /// Node handle.
    pub id: NodeId,
    /// Cell of the node.
    pub position: Position,
    /// Raw resource left in the node.
    pub content: u32,
}

/// Snapshot of a live facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityView {
    /// Facility handle.
    pub id: FacilityId,
    /// Cell of the facility.
    pub position: Position,
    /// Whether the facility is currently creating an agent.
    pub busy: bool,
    /// Budget available right now.
    pub budget: u32,
    /// Budget available once fully refilled.
    pub budget_capacity: u32,
}

// ---------------------------------------------------------------------------
// Claim targets
// ---------------------------------------------------------------------------

/// What a reservation record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ClaimTarget {
    /// A ledger-tracked site; the record holds part of its content.
    Site(SiteId),
    /// An extraction node; the record holds one harvesting slot.
    Node(NodeId),
}

impl core::fmt::Display for ClaimTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Site(id) => write!(f, "site {id}"),
            Self::Node(id) => write!(f, "node {id}"),
        }
    }
}
