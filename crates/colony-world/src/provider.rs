//! The world provider trait.
//!
//! The scheduling core reads the world through lookups that may return
//! `None` at any time (entities are destroyed between cycles without
//! notice) and mutates it through exactly two kinds of primitive: agent
//! creation at a facility, and resource transfer into an agent.
//!
//! Implementations decide how the world is actually stored. The core only
//! relies on lookups being consistent within a single cycle.

use colony_types::{
    AgentId, AgentSpec, AgentView, FacilityId, FacilityView, LocationId, NodeId, NodeView,
    Position, SiteId, SiteView, Terrain,
};

use crate::error::{CreateError, TransferError};

/// Read access to the live world plus the mutating primitives the core
/// invokes.
pub trait World {
    /// Whether the location is currently visible (resolvable) at all.
    fn has_location(&self, location: &LocationId) -> bool;

    /// Resolve an agent handle.
    fn agent(&self, id: AgentId) -> Option<AgentView>;

    /// All live agents.
    fn agents(&self) -> Vec<AgentView>;

    /// Resolve a site handle.
    fn site(&self, id: SiteId) -> Option<SiteView>;

    /// All live sites in a location.
    fn sites_in(&self, location: &LocationId) -> Vec<SiteView>;

    /// Resolve an extraction node handle.
    fn node(&self, id: NodeId) -> Option<NodeView>;

    /// All live extraction nodes in a location.
    fn nodes_in(&self, location: &LocationId) -> Vec<NodeView>;

    /// All live facilities in a location.
    fn facilities_in(&self, location: &LocationId) -> Vec<FacilityView>;

    /// Terrain of a cell. Cells outside the grid are reported as walls.
    fn terrain(&self, position: &Position) -> Terrain;

    /// Create an agent at a facility, charging the profile cost against the
    /// facility budget.
    ///
    /// # Errors
    ///
    /// Returns [`CreateError`]; see [`CreateError::is_transient`] for the
    /// split between transient and fatal failures.
    fn create_agent(&mut self, facility: FacilityId, spec: AgentSpec)
    -> Result<AgentId, CreateError>;

    /// Move `amount` units from a site into an agent's cargo.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] if the agent is out of range, the site
    /// holds too little, the agent is full, or either handle is stale.
    fn transfer_resource(
        &mut self,
        agent: AgentId,
        site: SiteId,
        amount: u32,
    ) -> Result<(), TransferError>;

    /// Extract raw resource from a node into an agent's cargo.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] under the same conditions as
    /// [`World::transfer_resource`].
    fn harvest(&mut self, agent: AgentId, node: NodeId) -> Result<(), TransferError>;

    /// The facility used for agent creation in a location: the first one
    /// the world reports.
    fn primary_facility(&self, location: &LocationId) -> Option<FacilityView> {
        self.facilities_in(location).into_iter().next()
    }

    /// Largest budget any facility in the location can hold once refilled.
    fn budget_capacity(&self, location: &LocationId) -> Option<u32> {
        self.facilities_in(location)
            .iter()
            .map(|facility| facility.budget_capacity)
            .max()
    }
}
