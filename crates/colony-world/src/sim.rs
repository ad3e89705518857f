//! Deterministic in-memory [`World`] implementation.
//!
//! [`SimWorld`] stores every entity in ordered maps so that iteration order,
//! and therefore every "closest" or "first facility" decision, is
//! reproducible. Identifiers are UUID v7, so map order is creation order.
//!
//! Besides the [`World`] trait it exposes the destructive mutations the
//! scheduling core has to survive: removing agents, sites, nodes, and
//! facilities, and rewriting site content behind the ledger's back.

use std::collections::{BTreeMap, BTreeSet};

use colony_types::{
    AgentId, AgentSpec, AgentView, Capability, FacilityId, FacilityView, LocationId, NodeId,
    NodeView, Payload, Position, Role, SiteId, SiteKind, SiteView, Terrain,
};
use tracing::debug;

use crate::error::{CreateError, TransferError, WorldError};
use crate::provider::World;
use crate::spatial::GRID_SIZE;

/// Maximum number of capability units in one profile.
pub const MAX_PROFILE_UNITS: usize = 50;

/// Ticks a facility stays busy per created capability unit.
pub const CREATE_TICKS_PER_UNIT: u32 = 3;

/// Cargo capacity contributed by each carry unit.
pub const CARRY_UNIT_CAPACITY: u32 = 50;

/// Raw resource extracted per work unit per harvest call.
pub const HARVEST_PER_WORK_UNIT: u32 = 2;

#[derive(Debug, Clone, Default)]
struct SimLocation {
    walls: BTreeSet<(u8, u8)>,
    swamps: BTreeSet<(u8, u8)>,
}

#[derive(Debug, Clone)]
struct SimAgent {
    view: AgentView,
    profile: Vec<Capability>,
    creating_ticks: u32,
}

#[derive(Debug, Clone)]
struct SimFacility {
    id: FacilityId,
    position: Position,
    budget: u32,
    budget_capacity: u32,
    refill_per_tick: u32,
    busy_ticks: u32,
}

impl SimFacility {
    fn view(&self) -> FacilityView {
        FacilityView {
            id: self.id,
            position: self.position.clone(),
            busy: self.busy_ticks > 0,
            budget: self.budget,
            budget_capacity: self.budget_capacity,
        }
    }
}

/// In-memory world used by the engine binary and by tests.
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    tick: u64,
    locations: BTreeMap<LocationId, SimLocation>,
    agents: BTreeMap<AgentId, SimAgent>,
    sites: BTreeMap<SiteId, SiteView>,
    nodes: BTreeMap<NodeId, NodeView>,
    facilities: BTreeMap<FacilityId, SimFacility>,
}

impl SimWorld {
    /// Create an empty world at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current world tick.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    // -------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------

    /// Add an empty, fully walkable location.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateLocation`] if the name is taken.
    pub fn add_location(&mut self, location: impl Into<LocationId>) -> Result<(), WorldError> {
        let location = location.into();
        if self.locations.contains_key(&location) {
            return Err(WorldError::DuplicateLocation(location));
        }
        self.locations.insert(location, SimLocation::default());
        Ok(())
    }

    /// Mark a cell as permanently blocked.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if the position is outside a known location.
    pub fn add_wall(&mut self, position: &Position) -> Result<(), WorldError> {
        self.location_mut(position)?
            .walls
            .insert((position.x, position.y));
        Ok(())
    }

    /// Mark a cell as swamp.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if the position is outside a known location.
    pub fn add_swamp(&mut self, position: &Position) -> Result<(), WorldError> {
        self.location_mut(position)?
            .swamps
            .insert((position.x, position.y));
        Ok(())
    }

    /// Place a resource site.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if the position is outside a known location.
    pub fn add_site(
        &mut self,
        kind: SiteKind,
        position: Position,
        content: u32,
        capacity: u32,
    ) -> Result<SiteId, WorldError> {
        self.location_mut(&position)?;
        let id = SiteId::new();
        self.sites.insert(
            id,
            SiteView {
                id,
                kind,
                position,
                content: content.min(capacity),
                capacity,
            },
        );
        Ok(id)
    }

    /// Place an extraction node.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if the position is outside a known location.
    pub fn add_node(&mut self, position: Position, content: u32) -> Result<NodeId, WorldError> {
        self.location_mut(&position)?;
        let id = NodeId::new();
        self.nodes.insert(
            id,
            NodeView {
                id,
                position,
                content,
            },
        );
        Ok(id)
    }

    /// Place a facility with a starting budget and a per-tick refill rate.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if the position is outside a known location.
    pub fn add_facility(
        &mut self,
        position: Position,
        budget_capacity: u32,
        refill_per_tick: u32,
    ) -> Result<FacilityId, WorldError> {
        self.location_mut(&position)?;
        let id = FacilityId::new();
        self.facilities.insert(
            id,
            SimFacility {
                id,
                position,
                budget: budget_capacity,
                budget_capacity,
                refill_per_tick,
                busy_ticks: 0,
            },
        );
        Ok(id)
    }

    /// Place a fully created agent directly, bypassing any facility.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if the position is outside a known location.
    pub fn add_agent(
        &mut self,
        role: Role,
        position: Position,
        profile: Vec<Capability>,
        payload: Payload,
    ) -> Result<AgentId, WorldError> {
        self.location_mut(&position)?;
        let id = AgentId::new();
        let view = AgentView {
            id,
            name: format!("{role}-{id}"),
            role,
            position,
            carried: 0,
            carry_capacity: carry_capacity_of(&profile),
            payload,
        };
        self.agents.insert(
            id,
            SimAgent {
                view,
                profile,
                creating_ticks: 0,
            },
        );
        Ok(id)
    }

    // -------------------------------------------------------------------
    // Destructive mutation
    // -------------------------------------------------------------------

    /// Destroy an agent. Returns whether it existed.
    pub fn remove_agent(&mut self, id: AgentId) -> bool {
        self.agents.remove(&id).is_some()
    }

    /// Destroy a site. Returns whether it existed.
    pub fn remove_site(&mut self, id: SiteId) -> bool {
        self.sites.remove(&id).is_some()
    }

    /// Destroy an extraction node. Returns whether it existed.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        self.nodes.remove(&id).is_some()
    }

    /// Destroy a facility. Returns whether it existed.
    pub fn remove_facility(&mut self, id: FacilityId) -> bool {
        self.facilities.remove(&id).is_some()
    }

    /// Overwrite a site's content (clamped to its capacity).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::SiteNotFound`] for a stale handle.
    pub fn set_site_content(&mut self, id: SiteId, content: u32) -> Result<(), WorldError> {
        let site = self.sites.get_mut(&id).ok_or(WorldError::SiteNotFound(id))?;
        site.content = content.min(site.capacity);
        Ok(())
    }

    /// Teleport an agent.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] for a stale handle or an unknown position.
    pub fn move_agent(&mut self, id: AgentId, position: Position) -> Result<(), WorldError> {
        self.location_mut(&position)?;
        let agent = self.agents.get_mut(&id).ok_or(WorldError::AgentNotFound(id))?;
        agent.view.position = position;
        Ok(())
    }

    /// Overwrite an agent's cargo (clamped to its capacity).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] for a stale handle.
    pub fn set_carried(&mut self, id: AgentId, carried: u32) -> Result<(), WorldError> {
        let agent = self.agents.get_mut(&id).ok_or(WorldError::AgentNotFound(id))?;
        agent.view.carried = carried.min(agent.view.carry_capacity);
        Ok(())
    }

    /// Capability profile of a live agent.
    pub fn profile_of(&self, id: AgentId) -> Option<&[Capability]> {
        self.agents.get(&id).map(|agent| agent.profile.as_slice())
    }

    /// Advance the world by one tick: facilities cool down and refill their
    /// budget, agents under creation finish.
    pub fn advance(&mut self) {
        self.tick = self.tick.saturating_add(1);
        for facility in self.facilities.values_mut() {
            facility.busy_ticks = facility.busy_ticks.saturating_sub(1);
            facility.budget = facility
                .budget
                .saturating_add(facility.refill_per_tick)
                .min(facility.budget_capacity);
        }
        for agent in self.agents.values_mut() {
            agent.creating_ticks = agent.creating_ticks.saturating_sub(1);
        }
    }

    fn location_mut(&mut self, position: &Position) -> Result<&mut SimLocation, WorldError> {
        if position.x >= GRID_SIZE || position.y >= GRID_SIZE {
            return Err(WorldError::OutOfBounds {
                x: position.x,
                y: position.y,
                size: GRID_SIZE,
            });
        }
        self.locations
            .get_mut(&position.location)
            .ok_or_else(|| WorldError::LocationNotFound(position.location.clone()))
    }
}

fn carry_capacity_of(profile: &[Capability]) -> u32 {
    let carry_units = profile
        .iter()
        .filter(|unit| **unit == Capability::Carry)
        .count();
    u32::try_from(carry_units)
        .unwrap_or(u32::MAX)
        .saturating_mul(CARRY_UNIT_CAPACITY)
}

fn work_units_of(profile: &[Capability]) -> u32 {
    let work_units = profile
        .iter()
        .filter(|unit| **unit == Capability::Work)
        .count();
    u32::try_from(work_units).unwrap_or(u32::MAX)
}

fn adjacent(a: &Position, b: &Position) -> bool {
    matches!(a.range_to(b), Some(distance) if distance <= 1)
}

impl World for SimWorld {
    fn has_location(&self, location: &LocationId) -> bool {
        self.locations.contains_key(location)
    }

    fn agent(&self, id: AgentId) -> Option<AgentView> {
        self.agents.get(&id).map(|agent| agent.view.clone())
    }

    fn agents(&self) -> Vec<AgentView> {
        self.agents.values().map(|agent| agent.view.clone()).collect()
    }

    fn site(&self, id: SiteId) -> Option<SiteView> {
        self.sites.get(&id).cloned()
    }

    fn sites_in(&self, location: &LocationId) -> Vec<SiteView> {
        self.sites
            .values()
            .filter(|site| site.position.location == *location)
            .cloned()
            .collect()
    }

    fn node(&self, id: NodeId) -> Option<NodeView> {
        self.nodes.get(&id).cloned()
    }

    fn nodes_in(&self, location: &LocationId) -> Vec<NodeView> {
        self.nodes
            .values()
            .filter(|node| node.position.location == *location)
            .cloned()
            .collect()
    }

    fn facilities_in(&self, location: &LocationId) -> Vec<FacilityView> {
        self.facilities
            .values()
            .filter(|facility| facility.position.location == *location)
            .map(SimFacility::view)
            .collect()
    }

    fn terrain(&self, position: &Position) -> Terrain {
        if position.x >= GRID_SIZE || position.y >= GRID_SIZE {
            return Terrain::Wall;
        }
        let Some(location) = self.locations.get(&position.location) else {
            return Terrain::Wall;
        };
        let cell = (position.x, position.y);
        if location.walls.contains(&cell) {
            Terrain::Wall
        } else if location.swamps.contains(&cell) {
            Terrain::Swamp
        } else {
            Terrain::Plain
        }
    }

    fn create_agent(
        &mut self,
        facility_id: FacilityId,
        spec: AgentSpec,
    ) -> Result<AgentId, CreateError> {
        if spec.profile.is_empty() {
            return Err(CreateError::InvalidProfile {
                reason: String::from("profile is empty"),
            });
        }
        if spec.profile.len() > MAX_PROFILE_UNITS {
            return Err(CreateError::InvalidProfile {
                reason: format!(
                    "{} units exceed the limit of {MAX_PROFILE_UNITS}",
                    spec.profile.len()
                ),
            });
        }
        if self.agents.values().any(|agent| agent.view.name == spec.name) {
            return Err(CreateError::NameTaken(spec.name));
        }

        let facility = self
            .facilities
            .get_mut(&facility_id)
            .ok_or(CreateError::FacilityNotFound(facility_id))?;
        if facility.busy_ticks > 0 {
            return Err(CreateError::Busy);
        }
        let cost = Capability::profile_cost(&spec.profile);
        if cost > facility.budget {
            return Err(CreateError::InsufficientBudget {
                needed: cost,
                available: facility.budget,
            });
        }

        let units = u32::try_from(spec.profile.len()).unwrap_or(u32::MAX);
        let creating_ticks = units.saturating_mul(CREATE_TICKS_PER_UNIT);
        facility.budget = facility.budget.saturating_sub(cost);
        facility.busy_ticks = creating_ticks;
        let position = facility.position.clone();

        let id = AgentId::new();
        let view = AgentView {
            id,
            name: spec.name,
            role: spec.role,
            position,
            carried: 0,
            carry_capacity: carry_capacity_of(&spec.profile),
            payload: spec.payload,
        };
        debug!(agent_id = %id, name = %view.name, cost, tick = self.tick, "Created agent");
        self.agents.insert(
            id,
            SimAgent {
                view,
                profile: spec.profile,
                creating_ticks,
            },
        );
        Ok(id)
    }

    fn transfer_resource(
        &mut self,
        agent_id: AgentId,
        site_id: SiteId,
        amount: u32,
    ) -> Result<(), TransferError> {
        if amount == 0 {
            return Err(TransferError::InvalidAmount);
        }
        let agent = self
            .agents
            .get(&agent_id)
            .ok_or(TransferError::AgentNotFound(agent_id))?;
        if agent.creating_ticks > 0 {
            return Err(TransferError::Busy);
        }
        let site = self.sites.get(&site_id).ok_or(TransferError::InvalidTarget)?;
        if !adjacent(&agent.view.position, &site.position) {
            return Err(TransferError::NotInRange);
        }
        if site.content < amount {
            return Err(TransferError::NotEnoughResource);
        }
        if agent.view.free_capacity() < amount {
            return Err(TransferError::Full);
        }

        if let Some(site) = self.sites.get_mut(&site_id) {
            site.content = site.content.saturating_sub(amount);
        }
        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.view.carried = agent.view.carried.saturating_add(amount);
        }
        Ok(())
    }

    fn harvest(&mut self, agent_id: AgentId, node_id: NodeId) -> Result<(), TransferError> {
        let agent = self
            .agents
            .get(&agent_id)
            .ok_or(TransferError::AgentNotFound(agent_id))?;
        if agent.creating_ticks > 0 {
            return Err(TransferError::Busy);
        }
        let node = self.nodes.get(&node_id).ok_or(TransferError::InvalidTarget)?;
        if !adjacent(&agent.view.position, &node.position) {
            return Err(TransferError::NotInRange);
        }
        let work_units = work_units_of(&agent.profile);
        if work_units == 0 {
            return Err(TransferError::MissingCapability);
        }
        if node.content == 0 {
            return Err(TransferError::NotEnoughResource);
        }
        let free = agent.view.free_capacity();
        if free == 0 {
            return Err(TransferError::Full);
        }
        let amount = work_units
            .saturating_mul(HARVEST_PER_WORK_UNIT)
            .min(free)
            .min(node.content);

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.content = node.content.saturating_sub(amount);
        }
        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.view.carried = agent.view.carried.saturating_add(amount);
        }
        Ok(())
    }
}
