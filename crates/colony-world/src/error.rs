//! Error types for the `colony-world` crate.
//!
//! [`CreateError`] and [`TransferError`] are the result codes of the two
//! mutating world primitives. [`WorldError`] covers construction of the
//! in-memory world.

use colony_types::{AgentId, FacilityId, LocationId, NodeId, SiteId};

/// Errors returned by [`World::create_agent`](crate::World::create_agent).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateError {
    /// The facility is already creating an agent.
    #[error("facility is busy")]
    Busy,

    /// The facility budget does not cover the profile right now.
    #[error("insufficient budget: need {needed}, have {available}")]
    InsufficientBudget {
        /// Cost of the requested profile.
        needed: u32,
        /// Budget currently available.
        available: u32,
    },

    /// The facility no longer exists.
    #[error("facility not found: {0}")]
    FacilityNotFound(FacilityId),

    /// The profile is empty or exceeds the unit limit.
    #[error("invalid profile: {reason}")]
    InvalidProfile {
        /// Why the profile was rejected.
        reason: String,
    },

    /// Another agent already carries the requested name.
    #[error("name already in use: {0}")]
    NameTaken(String),
}

impl CreateError {
    /// Whether the failure is expected to clear on its own in a later cycle.
    ///
    /// Busy facilities and temporarily short budgets are transient; every
    /// other failure means the request itself is unusable.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Busy | Self::InsufficientBudget { .. })
    }
}

/// Errors returned by the resource transfer primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The agent is not adjacent to the target.
    #[error("target not in range")]
    NotInRange,

    /// The target holds less than requested.
    #[error("not enough resource at target")]
    NotEnoughResource,

    /// The agent is still being created.
    #[error("agent is busy")]
    Busy,

    /// The agent cannot carry the requested amount.
    #[error("agent cargo is full")]
    Full,

    /// The requested amount is zero.
    #[error("invalid transfer amount")]
    InvalidAmount,

    /// The agent has no unit able to perform the transfer.
    #[error("agent lacks the required capability")]
    MissingCapability,

    /// The target no longer exists.
    #[error("invalid transfer target")]
    InvalidTarget,

    /// The agent no longer exists.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),
}

/// Errors that can occur while building or mutating the in-memory world.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The location is not part of the world.
    #[error("location not found: {0}")]
    LocationNotFound(LocationId),

    /// A location with this name already exists.
    #[error("duplicate location: {0}")]
    DuplicateLocation(LocationId),

    /// The agent is not part of the world.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The site is not part of the world.
    #[error("site not found: {0}")]
    SiteNotFound(SiteId),

    /// The node is not part of the world.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// A coordinate lies outside the region grid.
    #[error("position ({x},{y}) outside the {size}x{size} grid")]
    OutOfBounds {
        /// Column.
        x: u8,
        /// Row.
        y: u8,
        /// Grid edge length.
        size: u8,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,
}
