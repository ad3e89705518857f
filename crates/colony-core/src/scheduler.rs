//! Production scheduler: priority-tiered agent creation per location.
//!
//! Components register demand for new agents during a cycle; the scheduler
//! drains everything at the end of the cycle, highest tier first and FIFO
//! within a tier, creating agents at the location's facility.
//!
//! Queues are ephemeral. Whatever is not created this cycle is dropped and
//! reappears only if the demand behind it is detected again next cycle.
//! There is no aging, so a low tier can starve while higher tiers stay busy.

use std::collections::{BTreeMap, VecDeque};

use colony_types::{AgentId, AgentSpec, Capability, LocationId, Payload, Priority, Role};
use colony_world::World;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::composition::{CompositionSpec, ProfileRequest, compose};

/// Errors returned when registering a production request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The location is not served by the scheduler.
    #[error("location {0} is not a production location")]
    UnknownLocation(LocationId),

    /// The location has no facility to compose against.
    #[error("location {0} has no facility")]
    NoFacility(LocationId),

    /// The profile has no units; the request can never be fulfilled.
    #[error("empty profile requested for {role}")]
    EmptyProfile {
        /// Role of the refused request.
        role: Role,
    },
}

/// One pending agent creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionRequest {
    /// Role tag of the agent.
    pub role: Role,
    /// Capability units in creation order.
    pub profile: Vec<Capability>,
    /// Data stored on the created agent.
    pub payload: Payload,
}

/// Four FIFO queues, indexed by `Priority::index`.
#[derive(Debug, Clone, Default)]
struct TierQueues {
    tiers: [VecDeque<ProductionRequest>; 4],
}

impl TierQueues {
    fn push(&mut self, priority: Priority, request: ProductionRequest) {
        if let Some(tier) = self.tiers.get_mut(priority.index()) {
            tier.push_back(request);
        }
    }

    fn len(&self, priority: Priority) -> usize {
        self.tiers.get(priority.index()).map_or(0, VecDeque::len)
    }

    fn total(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    /// Empty all tiers into one list, highest tier first.
    fn take_ordered(&mut self) -> Vec<ProductionRequest> {
        let mut ordered = Vec::with_capacity(self.total());
        for priority in Priority::DRAIN_ORDER {
            if let Some(tier) = self.tiers.get_mut(priority.index()) {
                ordered.extend(tier.drain(..));
            }
        }
        ordered
    }
}

/// Outcome of one [`ProductionScheduler::drain`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Agents created, in creation order.
    pub created: Vec<(LocationId, AgentId)>,
    /// Locations whose drain stopped on a transient failure.
    pub stalled: Vec<LocationId>,
    /// Requests discarded on a fatal failure.
    pub discarded: usize,
    /// Requests dropped unattempted (after a stall or with no facility).
    pub dropped: usize,
}

/// Per-location tiered production queues.
#[derive(Debug, Clone, Default)]
pub struct ProductionScheduler {
    queues: BTreeMap<LocationId, TierQueues>,
    summary_interval: u64,
}

impl ProductionScheduler {
    /// Create a scheduler serving the given locations.
    ///
    /// A queue summary is logged on cycles divisible by `summary_interval`;
    /// 0 disables it.
    pub fn new(locations: impl IntoIterator<Item = LocationId>, summary_interval: u64) -> Self {
        Self {
            queues: locations
                .into_iter()
                .map(|location| (location, TierQueues::default()))
                .collect(),
            summary_interval,
        }
    }

    /// Start serving a location. Returns `false` if it was already served.
    pub fn add_location(&mut self, location: LocationId) -> bool {
        if self.queues.contains_key(&location) {
            return false;
        }
        self.queues.insert(location, TierQueues::default());
        true
    }

    /// Served locations, in name order.
    pub fn locations(&self) -> impl Iterator<Item = &LocationId> {
        self.queues.keys()
    }

    /// Whether the location is served.
    pub fn serves(&self, location: &LocationId) -> bool {
        self.queues.contains_key(location)
    }

    /// Queued requests of one tier, or `None` for an unserved location.
    pub fn queue_len(&self, location: &LocationId, priority: Priority) -> Option<usize> {
        let Some(queues) = self.queues.get(location) else {
            debug!(location = %location, "Queue state requested for unknown location");
            return None;
        };
        Some(queues.len(priority))
    }

    /// Queue a request with an explicit profile.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnknownLocation`] if the location is not served,
    /// [`SchedulerError::NoFacility`] if the world reports no facility there,
    /// [`SchedulerError::EmptyProfile`] if `profile` is empty.
    pub fn register_profile<W: World + ?Sized>(
        &mut self,
        world: &W,
        location: &LocationId,
        role: Role,
        profile: Vec<Capability>,
        payload: Payload,
        priority: Priority,
    ) -> Result<(), SchedulerError> {
        let Some(queues) = self.queues.get_mut(location) else {
            warn!(location = %location, %role, "Production requested in a non-production location");
            return Err(SchedulerError::UnknownLocation(location.clone()));
        };
        if world.primary_facility(location).is_none() {
            warn!(location = %location, %role, "No facility to create agents at");
            return Err(SchedulerError::NoFacility(location.clone()));
        }
        if profile.is_empty() {
            error!(location = %location, %role, "Refusing request with empty profile");
            return Err(SchedulerError::EmptyProfile { role });
        }
        debug!(location = %location, %role, priority = priority.get(), units = profile.len(), "Production request queued");
        queues.push(
            priority,
            ProductionRequest {
                role,
                profile,
                payload,
            },
        );
        Ok(())
    }

    /// Queue a request whose profile is composed from ratios against the
    /// location's budget capacity.
    ///
    /// # Errors
    ///
    /// As [`ProductionScheduler::register_profile`].
    pub fn register_ratio<W: World + ?Sized>(
        &mut self,
        world: &W,
        location: &LocationId,
        role: Role,
        spec: &CompositionSpec,
        payload: Payload,
        priority: Priority,
    ) -> Result<(), SchedulerError> {
        if !self.serves(location) {
            warn!(location = %location, %role, "Production requested in a non-production location");
            return Err(SchedulerError::UnknownLocation(location.clone()));
        }
        let Some(budget) = world.budget_capacity(location) else {
            warn!(location = %location, %role, "No facility to compose against");
            return Err(SchedulerError::NoFacility(location.clone()));
        };
        self.register_profile(world, location, role, compose(spec, budget), payload, priority)
    }

    /// Queue a request from a configured [`ProfileRequest`].
    ///
    /// # Errors
    ///
    /// See [`ProductionScheduler::register_profile`] and
    /// [`ProductionScheduler::register_ratio`].
    pub fn register<W: World + ?Sized>(
        &mut self,
        world: &W,
        location: &LocationId,
        role: Role,
        request: &ProfileRequest,
        payload: Payload,
        priority: Priority,
    ) -> Result<(), SchedulerError> {
        match request {
            ProfileRequest::Explicit { units } => {
                self.register_profile(world, location, role, units.clone(), payload, priority)
            }
            ProfileRequest::Ratio(spec) => {
                self.register_ratio(world, location, role, spec, payload, priority)
            }
        }
    }

    /// Attempt every queued request, then leave all queues empty.
    ///
    /// Per location, requests are tried highest tier first. A transient
    /// failure (facility busy, budget short) stops that location for the
    /// cycle; any other failure discards only the failing request.
    pub fn drain<W: World + ?Sized>(&mut self, world: &mut W, cycle: u64) -> DrainReport {
        let mut report = DrainReport::default();
        let summarize = self.summary_interval > 0 && cycle.checked_rem(self.summary_interval) == Some(0);

        for (location, queues) in &mut self.queues {
            if summarize {
                log_summary(location, queues);
            }
            let requests = queues.take_ordered();
            if requests.is_empty() {
                continue;
            }
            if !world.has_location(location) {
                warn!(location = %location, dropped = requests.len(), "Production location not known");
                report.dropped = report.dropped.saturating_add(requests.len());
                continue;
            }
            let Some(facility) = world.primary_facility(location) else {
                warn!(location = %location, dropped = requests.len(), "Production location has no facility");
                report.dropped = report.dropped.saturating_add(requests.len());
                continue;
            };

            let mut remaining = requests.into_iter();
            while let Some(request) = remaining.next() {
                let role = request.role;
                let spec = AgentSpec {
                    name: agent_name(role),
                    role,
                    profile: request.profile,
                    payload: request.payload,
                };
                let name = spec.name.clone();
                match world.create_agent(facility.id, spec) {
                    Ok(agent_id) => {
                        info!(location = %location, %agent_id, %name, "Agent created");
                        report.created.push((location.clone(), agent_id));
                    }
                    Err(err) if err.is_transient() => {
                        let dropped = remaining.len();
                        debug!(location = %location, %role, %err, dropped, "Production stalled for this cycle");
                        report.stalled.push(location.clone());
                        report.dropped = report.dropped.saturating_add(dropped);
                        break;
                    }
                    Err(err) => {
                        error!(location = %location, %role, %err, "Production request discarded");
                        report.discarded = report.discarded.saturating_add(1);
                    }
                }
            }
        }
        report
    }
}

/// `<role>-<uuid>` display name for a new agent.
fn agent_name(role: Role) -> String {
    format!("{role}-{}", Uuid::new_v4())
}

fn log_summary(location: &LocationId, queues: &TierQueues) {
    info!(location = %location, queued = queues.total(), "Production queue length");
    for priority in Priority::DRAIN_ORDER {
        let Some(tier) = queues.tiers.get(priority.index()) else {
            continue;
        };
        if tier.is_empty() {
            continue;
        }
        let roles: Vec<String> = tier.iter().map(|request| request.role.to_string()).collect();
        info!(location = %location, priority = priority.get(), roles = %roles.join(","), "Production tier");
    }
}
