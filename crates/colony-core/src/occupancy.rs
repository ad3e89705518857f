//! Occupancy tracker for extraction nodes.
//!
//! For every registered location the tracker remembers each extraction
//! node's harvesting capacity (open cells around it), the container next
//! to it, how many direct-harvest slots are taken, and which dedicated
//! harvesters work it. From that it derives a coarse health signal that
//! tells consumers whether direct harvesting should be enabled.

use std::collections::BTreeMap;

use colony_ledger::NodeOccupancy;
use colony_types::{AgentId, Assignment, LocationId, NodeId, Payload, Role, SiteId, SiteKind};
use colony_world::World;
use colony_world::spatial::{closest_by_range, open_neighbor_count};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::HarvestConfig;
use crate::error::CoreError;
use crate::scheduler::ProductionScheduler;

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// Bookkeeping for one extraction node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Open cells around the node.
    pub capacity: u32,
    /// Nearest container at registration time.
    #[serde(default)]
    pub container: Option<SiteId>,
    /// Direct-harvest slots currently claimed through the ledger.
    #[serde(default)]
    pub occupation: u32,
    /// Dedicated harvesters working the node.
    #[serde(default)]
    pub assigned: Vec<AgentId>,
}

impl NodeRecord {
    /// Whether a direct-harvest slot is free.
    pub const fn has_open_slot(&self) -> bool {
        self.occupation < self.capacity
    }
}

/// Nodes of one location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationNodes {
    /// Node handle to record.
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, NodeRecord>,
}

/// The tracker's persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyState {
    /// Registered locations.
    #[serde(default)]
    pub locations: BTreeMap<LocationId, LocationNodes>,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Bucketed ratio of dedicated harvesters to extraction nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HealthState {
    /// At most a quarter of the nodes are covered.
    Critical,
    /// Over a quarter.
    Low,
    /// Over half.
    Fair,
    /// Over three quarters.
    Good,
}

impl HealthState {
    /// Bucket `assigned / nodes` at the 1/4, 2/4, 3/4 breakpoints.
    ///
    /// A location without nodes is [`HealthState::Critical`].
    pub fn from_counts(assigned: usize, nodes: usize) -> Self {
        if nodes == 0 {
            return Self::Critical;
        }
        // Compare 4·assigned against k·nodes to stay in integers.
        let scaled = assigned.saturating_mul(4);
        if scaled > nodes.saturating_mul(3) {
            Self::Good
        } else if scaled > nodes.saturating_mul(2) {
            Self::Fair
        } else if scaled > nodes {
            Self::Low
        } else {
            Self::Critical
        }
    }

    /// Numeric level, 0 (critical) through 3 (good).
    pub const fn level(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::Low => 1,
            Self::Fair => 2,
            Self::Good => 3,
        }
    }
}

/// What a [`OccupancyTracker::reconcile`] pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyReport {
    /// Nodes that no longer resolve and were dropped.
    pub dropped_nodes: Vec<NodeId>,
    /// Dedicated harvesters that no longer exist.
    pub pruned_agents: Vec<AgentId>,
    /// Newly created harvesters linked to their node.
    pub adopted: Vec<AgentId>,
    /// Nodes for which a harvester was requested.
    pub requested: Vec<NodeId>,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Tracks extraction node capacity and assignment per location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyTracker {
    state: OccupancyState,
}

impl OccupancyTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the tracker from persisted state.
    pub const fn from_state(state: OccupancyState) -> Self {
        Self { state }
    }

    /// Borrow the persisted state.
    pub const fn state(&self) -> &OccupancyState {
        &self.state
    }

    /// Hand the state back for persisting.
    pub fn into_state(self) -> OccupancyState {
        self.state
    }

    /// Whether the location is registered.
    pub fn is_registered(&self, location: &LocationId) -> bool {
        self.state.locations.contains_key(location)
    }

    /// Record of one node.
    pub fn node(&self, location: &LocationId, node: NodeId) -> Option<&NodeRecord> {
        self.state.locations.get(location)?.nodes.get(&node)
    }

    /// Derive node records for a location from the world.
    ///
    /// Capacity is the number of non-wall cells around each node. The
    /// container is the closest container site to the node. Nodes already
    /// registered keep their assignment and occupation; vanished ones are
    /// dropped. Returns the number of nodes registered.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownLocation`] if the world does not know the location.
    pub fn register_location<W: World + ?Sized>(
        &mut self,
        world: &W,
        location: &LocationId,
    ) -> Result<usize, CoreError> {
        if !world.has_location(location) {
            return Err(CoreError::UnknownLocation(location.clone()));
        }
        let containers: Vec<_> = world
            .sites_in(location)
            .into_iter()
            .filter(|site| site.kind == SiteKind::Container)
            .collect();
        let mut previous = self
            .state
            .locations
            .remove(location)
            .unwrap_or_default()
            .nodes;

        let mut nodes = BTreeMap::new();
        for node in world.nodes_in(location) {
            let mut record = previous.remove(&node.id).unwrap_or_default();
            record.capacity = open_neighbor_count(world, &node.position);
            record.container = closest_by_range(&node.position, &containers, |site| &site.position)
                .map(|site| site.id);
            record.occupation = record.occupation.min(record.capacity);
            debug!(
                location = %location,
                node = %node.id,
                capacity = record.capacity,
                container = ?record.container,
                "Registered extraction node"
            );
            nodes.insert(node.id, record);
        }
        let count = nodes.len();
        self.state
            .locations
            .insert(location.clone(), LocationNodes { nodes });
        info!(location = %location, nodes = count, "Registered extraction nodes");
        Ok(count)
    }

    /// Bucketed harvester coverage of a location, or `None` if the
    /// location is not registered.
    pub fn health_state(&self, location: &LocationId) -> Option<HealthState> {
        let Some(nodes) = self.state.locations.get(location) else {
            debug!(location = %location, "No health state for unregistered location");
            return None;
        };
        let assigned = nodes
            .nodes
            .values()
            .map(|record| record.assigned.len())
            .fold(0_usize, usize::saturating_add);
        Some(HealthState::from_counts(assigned, nodes.nodes.len()))
    }

    /// Nodes of a location with a free direct-harvest slot.
    pub fn open_nodes(&self, location: &LocationId) -> Vec<NodeId> {
        self.state
            .locations
            .get(location)
            .map(|nodes| {
                nodes
                    .nodes
                    .iter()
                    .filter(|(_, record)| record.has_open_slot())
                    .map(|(&id, _)| id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Take one direct-harvest slot. Returns `false` if the node is full or
    /// not tracked.
    pub fn occupy(&mut self, location: &LocationId, node: NodeId) -> bool {
        let Some(record) = self
            .state
            .locations
            .get_mut(location)
            .and_then(|nodes| nodes.nodes.get_mut(&node))
        else {
            return false;
        };
        if !record.has_open_slot() {
            return false;
        }
        record.occupation = record.occupation.saturating_add(1);
        true
    }

    /// Start-of-cycle reconciliation.
    ///
    /// Drops vanished nodes, links newly created harvesters to their node,
    /// prunes dead harvesters, and requests a dedicated harvester for every
    /// node whose container still exists and that has none.
    pub fn reconcile<W: World + ?Sized>(
        &mut self,
        world: &W,
        scheduler: &mut ProductionScheduler,
        harvest: &HarvestConfig,
    ) -> OccupancyReport {
        let mut report = OccupancyReport::default();

        for (location, nodes) in &mut self.state.locations {
            nodes.nodes.retain(|&node, _| {
                let alive = world.node(node).is_some();
                if !alive {
                    info!(location = %location, node = %node, "Dropped vanished extraction node");
                    report.dropped_nodes.push(node);
                }
                alive
            });
            for record in nodes.nodes.values_mut() {
                let before = record.assigned.len();
                record.assigned.retain(|&agent| {
                    let alive = world.agent(agent).is_some();
                    if !alive {
                        report.pruned_agents.push(agent);
                    }
                    alive
                });
                if record.assigned.len() != before {
                    debug!(location = %location, pruned = before.saturating_sub(record.assigned.len()), "Pruned dead harvesters");
                }
            }
        }

        report.adopted = self.adopt(world);

        for (location, nodes) in &self.state.locations {
            for (&node, record) in &nodes.nodes {
                if !record.assigned.is_empty() {
                    continue;
                }
                let Some(container) = record.container else {
                    continue;
                };
                if world.site(container).is_none() {
                    continue;
                }
                let payload = Payload::assigned(Assignment::Node {
                    location: location.clone(),
                    node,
                });
                let registered = scheduler.register(
                    world,
                    location,
                    Role::ContainerHarvester,
                    &harvest.profile,
                    payload,
                    harvest.priority,
                );
                if registered.is_ok() {
                    report.requested.push(node);
                }
            }
        }
        report
    }

    /// Link harvesters created for a node (by their assignment marker) into
    /// its assigned list. Idempotent.
    pub fn adopt<W: World + ?Sized>(&mut self, world: &W) -> Vec<AgentId> {
        let mut adopted = Vec::new();
        for agent in world.agents() {
            if agent.role != Role::ContainerHarvester {
                continue;
            }
            let Some(Assignment::Node { location, node }) = &agent.payload.assignment else {
                continue;
            };
            let Some(record) = self
                .state
                .locations
                .get_mut(location)
                .and_then(|nodes| nodes.nodes.get_mut(node))
            else {
                debug!(agent_id = %agent.id, node = %node, "Harvester marker points at untracked node");
                continue;
            };
            if record.assigned.contains(&agent.id) {
                continue;
            }
            record.assigned.push(agent.id);
            info!(agent_id = %agent.id, node = %node, "Harvester assigned to node");
            adopted.push(agent.id);
        }
        adopted
    }
}

impl NodeOccupancy for OccupancyTracker {
    fn is_tracked(&self, location: &LocationId, node: NodeId) -> bool {
        self.node(location, node).is_some()
    }

    fn vacate(&mut self, location: &LocationId, node: NodeId) -> bool {
        let Some(record) = self
            .state
            .locations
            .get_mut(location)
            .and_then(|nodes| nodes.nodes.get_mut(&node))
        else {
            return false;
        };
        record.occupation = record.occupation.saturating_sub(1);
        true
    }
}
