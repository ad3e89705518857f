//! Haul task registry.
//!
//! A haul task moves resource from a source site to a sink site. Each cycle
//! the registry checks that both ends still exist, keeps the task's
//! assigned transporters in sync with the world, and asks the scheduler
//! for a transporter when a task has none. The requested profile depends on
//! how far apart the two ends are.

use colony_types::{AgentId, Assignment, HaulTaskId, Payload, Priority, Role, SiteId};
use colony_world::World;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::composition::ProfileRequest;
use crate::config::HaulConfig;
use crate::error::CoreError;
use crate::scheduler::ProductionScheduler;

/// A source-to-sink transfer task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaulTask {
    /// Site the resource is taken from.
    pub source: SiteId,
    /// Site the resource is delivered to.
    pub sink: SiteId,
    /// Stable identifier, assigned on first reconciliation.
    #[serde(default)]
    pub id: Option<HaulTaskId>,
    /// Raw priority tier, defaulted on first reconciliation. Values outside
    /// 1..=4 fall back to the configured default.
    #[serde(default)]
    pub priority: Option<u8>,
    /// Transporters working the task.
    #[serde(default)]
    pub assigned: Vec<AgentId>,
}

impl HaulTask {
    /// A fresh task with no identifier, priority, or agents yet.
    pub const fn new(source: SiteId, sink: SiteId) -> Self {
        Self {
            source,
            sink,
            id: None,
            priority: None,
            assigned: Vec::new(),
        }
    }
}

/// The registry's persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaulState {
    /// Tasks in registration order.
    #[serde(default)]
    pub tasks: Vec<HaulTask>,
}

/// What a [`HaulTaskRegistry::reconcile`] pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HaulReport {
    /// Indices of tasks with an unresolvable end, left dormant.
    pub dormant: Vec<usize>,
    /// Transporters that no longer exist.
    pub pruned_agents: Vec<AgentId>,
    /// Newly created transporters linked to their task.
    pub adopted: Vec<AgentId>,
    /// Tasks for which a transporter was requested.
    pub requested: Vec<HaulTaskId>,
}

/// Registry of haul tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HaulTaskRegistry {
    state: HaulState,
}

impl HaulTaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the registry from persisted state.
    pub const fn from_state(state: HaulState) -> Self {
        Self { state }
    }

    /// Borrow the persisted state.
    pub const fn state(&self) -> &HaulState {
        &self.state
    }

    /// Hand the state back for persisting.
    pub fn into_state(self) -> HaulState {
        self.state
    }

    /// Tasks in registration order.
    pub fn tasks(&self) -> &[HaulTask] {
        &self.state.tasks
    }

    /// Look a task up by identifier.
    pub fn task(&self, id: HaulTaskId) -> Option<&HaulTask> {
        self.state.tasks.iter().find(|task| task.id == Some(id))
    }

    /// Register a new task and return its identifier.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownSite`] if either end does not exist.
    pub fn add_task<W: World + ?Sized>(
        &mut self,
        world: &W,
        source: SiteId,
        sink: SiteId,
        priority: Option<Priority>,
    ) -> Result<HaulTaskId, CoreError> {
        for site in [source, sink] {
            if world.site(site).is_none() {
                return Err(CoreError::UnknownSite(site));
            }
        }
        let id = HaulTaskId::new();
        self.state.tasks.push(HaulTask {
            id: Some(id),
            priority: priority.map(Priority::get),
            ..HaulTask::new(source, sink)
        });
        info!(task = %id, source = %source, sink = %sink, "Haul task registered");
        Ok(id)
    }

    /// Pick the transporter profile for a source-sink range.
    pub const fn profile_for(config: &HaulConfig, range: u32) -> &ProfileRequest {
        if range <= 1 {
            &config.adjacent_profile
        } else {
            &config.distant_profile
        }
    }

    /// Start-of-cycle reconciliation.
    ///
    /// Tasks with an unresolvable end are skipped and stay registered.
    /// Every other task gets its identifier and priority defaulted, its
    /// dead transporters pruned, newly created transporters adopted, and a
    /// transporter requested if it has none.
    pub fn reconcile<W: World + ?Sized>(
        &mut self,
        world: &W,
        scheduler: &mut ProductionScheduler,
        config: &HaulConfig,
    ) -> HaulReport {
        let mut report = HaulReport::default();
        let mut live = Vec::new();

        for (index, task) in self.state.tasks.iter_mut().enumerate() {
            let (Some(source), Some(sink)) = (world.site(task.source), world.site(task.sink)) else {
                warn!(index, source = %task.source, sink = %task.sink, "Invalid haul task");
                report.dormant.push(index);
                continue;
            };
            let id = *task.id.get_or_insert_with(HaulTaskId::new);
            let priority = task
                .priority
                .and_then(Priority::new)
                .unwrap_or(config.default_priority);
            task.priority = Some(priority.get());

            task.assigned.retain(|&agent| {
                let alive = world.agent(agent).is_some();
                if !alive {
                    debug!(task = %id, agent_id = %agent, "Pruned dead transporter");
                    report.pruned_agents.push(agent);
                }
                alive
            });
            live.push((index, id, priority, source, sink));
        }

        report.adopted = self.adopt(world);

        for (index, id, priority, source, sink) in live {
            let has_agents = self
                .state
                .tasks
                .get(index)
                .is_some_and(|task| !task.assigned.is_empty());
            if has_agents {
                continue;
            }
            // Ends in different locations count as far apart.
            let range = source.position.range_to(&sink.position).unwrap_or(u32::MAX);
            let profile = Self::profile_for(config, range);
            let payload = Payload::assigned(Assignment::HaulTask { task: id });
            let location = &source.position.location;
            if scheduler
                .register(world, location, Role::Transporter, profile, payload, priority)
                .is_ok()
            {
                report.requested.push(id);
            }
        }
        report
    }

    /// Link transporters created for a task (by their assignment marker)
    /// into its assigned list. Idempotent.
    pub fn adopt<W: World + ?Sized>(&mut self, world: &W) -> Vec<AgentId> {
        let mut adopted = Vec::new();
        for agent in world.agents() {
            if agent.role != Role::Transporter {
                continue;
            }
            let Some(Assignment::HaulTask { task: task_id }) = agent.payload.assignment else {
                continue;
            };
            let Some(task) = self
                .state
                .tasks
                .iter_mut()
                .find(|task| task.id == Some(task_id))
            else {
                debug!(agent_id = %agent.id, task = %task_id, "Transporter marker points at unknown task");
                continue;
            };
            if task.assigned.contains(&agent.id) {
                continue;
            }
            task.assigned.push(agent.id);
            info!(agent_id = %agent.id, task = %task_id, "Transporter assigned to haul task");
            adopted.push(agent.id);
        }
        adopted
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use colony_types::{Capability, LocationId, Position};
    use colony_world::{SimWorld, StartingColonyIds, create_starting_colony};

    use super::*;

    fn colony() -> (SimWorld, StartingColonyIds, ProductionScheduler) {
        let (world, ids) = create_starting_colony().unwrap();
        let scheduler = ProductionScheduler::new([ids.location.clone()], 0);
        (world, ids, scheduler)
    }

    fn queued(scheduler: &ProductionScheduler, location: &LocationId) -> usize {
        Priority::DRAIN_ORDER
            .iter()
            .map(|&p| scheduler.queue_len(location, p).unwrap_or(0))
            .sum()
    }

    #[test]
    fn ids_and_priority_are_assigned_lazily() {
        let (world, ids, mut scheduler) = colony();
        let mut registry = HaulTaskRegistry::from_state(HaulState {
            tasks: vec![HaulTask::new(ids.container_a, ids.storage)],
        });
        registry.reconcile(&world, &mut scheduler, &HaulConfig::default());
        let task = registry.tasks().first().unwrap();
        let id = task.id.unwrap();
        assert_eq!(task.priority, Some(2));

        // Stable across passes.
        registry.reconcile(&world, &mut scheduler, &HaulConfig::default());
        assert_eq!(registry.tasks().first().unwrap().id, Some(id));
    }

    #[test]
    fn out_of_range_priority_falls_back_to_default() {
        let (world, ids, mut scheduler) = colony();
        let mut task = HaulTask::new(ids.container_a, ids.storage);
        task.priority = Some(9);
        let mut registry = HaulTaskRegistry::from_state(HaulState { tasks: vec![task] });
        registry.reconcile(&world, &mut scheduler, &HaulConfig::default());
        assert_eq!(registry.tasks().first().unwrap().priority, Some(2));
        assert_eq!(scheduler.queue_len(&ids.location, Priority::DEFAULT), Some(1));
    }

    #[test]
    fn task_with_missing_end_stays_dormant() {
        let (mut world, ids, mut scheduler) = colony();
        let mut registry = HaulTaskRegistry::new();
        registry
            .add_task(&world, ids.container_a, ids.storage, None)
            .unwrap();
        world.remove_site(ids.storage);
        let report = registry.reconcile(&world, &mut scheduler, &HaulConfig::default());
        assert_eq!(report.dormant, vec![0]);
        assert!(report.requested.is_empty());
        assert_eq!(registry.tasks().len(), 1);
        assert_eq!(queued(&scheduler, &ids.location), 0);
    }

    #[test]
    fn add_task_rejects_missing_site() {
        let (world, ids, _) = colony();
        let mut registry = HaulTaskRegistry::new();
        let missing = SiteId::new();
        let result = registry.add_task(&world, ids.storage, missing, None);
        assert!(matches!(result, Err(CoreError::UnknownSite(site)) if site == missing));
    }

    #[test]
    fn profile_depends_on_range() {
        let config = HaulConfig::default();
        assert_eq!(HaulTaskRegistry::profile_for(&config, 1), &config.adjacent_profile);
        assert_eq!(HaulTaskRegistry::profile_for(&config, 0), &config.adjacent_profile);
        assert_eq!(HaulTaskRegistry::profile_for(&config, 2), &config.distant_profile);
    }

    #[test]
    fn distant_task_requests_explicit_transporter() {
        let (world, ids, mut scheduler) = colony();
        let mut registry = HaulTaskRegistry::new();
        let id = registry
            .add_task(&world, ids.container_a, ids.storage, Some(Priority::ELEVATED))
            .unwrap();
        let report = registry.reconcile(&world, &mut scheduler, &HaulConfig::default());
        assert_eq!(report.requested, vec![id]);
        assert_eq!(scheduler.queue_len(&ids.location, Priority::ELEVATED), Some(1));
    }

    #[test]
    fn transporter_is_adopted_then_pruned() {
        let (mut world, ids, mut scheduler) = colony();
        let mut registry = HaulTaskRegistry::new();
        let id = registry
            .add_task(&world, ids.container_a, ids.storage, None)
            .unwrap();
        let agent = world
            .add_agent(
                Role::Transporter,
                Position::new("W1N1", 12, 12),
                vec![Capability::Carry, Capability::Move],
                Payload::assigned(Assignment::HaulTask { task: id }),
            )
            .unwrap();

        let report = registry.reconcile(&world, &mut scheduler, &HaulConfig::default());
        assert_eq!(report.adopted, vec![agent]);
        assert!(report.requested.is_empty());
        assert_eq!(registry.task(id).unwrap().assigned, vec![agent]);

        // A second pass changes nothing.
        let report = registry.reconcile(&world, &mut scheduler, &HaulConfig::default());
        assert!(report.adopted.is_empty());
        assert_eq!(registry.task(id).unwrap().assigned, vec![agent]);

        world.remove_agent(agent);
        let report = registry.reconcile(&world, &mut scheduler, &HaulConfig::default());
        assert_eq!(report.pruned_agents, vec![agent]);
        assert_eq!(report.requested, vec![id]);
    }

    #[test]
    fn state_roundtrips_through_json() {
        let (world, ids, mut scheduler) = colony();
        let mut registry = HaulTaskRegistry::new();
        registry
            .add_task(&world, ids.link, ids.storage, None)
            .unwrap();
        registry.reconcile(&world, &mut scheduler, &HaulConfig::default());
        let json = serde_json::to_string(registry.state()).unwrap();
        let back: HaulState = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, registry.state());
    }
}
