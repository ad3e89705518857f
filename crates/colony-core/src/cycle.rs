//! The per-cycle driver.
//!
//! Each cycle runs these phases in order:
//!
//! 1. **Load** -- read [`ColonyState`] and build every component from it.
//! 2. **Register** -- make sure every served location has its extraction
//!    nodes registered and its sites tracked by the ledger.
//! 3. **Reconcile** -- ledger `validate`, occupancy and haul reconciliation.
//!    The latter two raise harvester and transporter demand.
//! 4. **Demand** -- standing role targets raise demand for missing agents.
//! 5. **Consumers** -- consumer roles act through the [`CycleContext`]
//!    (refill, withdraw, release).
//! 6. **Drain** -- the production scheduler creates agents. Always last, so
//!    it sees the whole cycle's demand.
//! 7. **Save** -- verify the ledger balance and write the state back.
//!
//! A failing phase is logged and the cycle moves on to the next one.

use colony_ledger::{
    BalanceResult, ReservationLedger, ValidationReport, verify_balance,
};
use colony_types::{LocationId, Payload};
use colony_world::World;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::{ColonyConfig, RoleTarget};
use crate::error::CoreError;
use crate::haul::{HaulReport, HaulTaskRegistry};
use crate::occupancy::{OccupancyReport, OccupancyTracker};
use crate::provider::EnergyProvider;
use crate::scheduler::{DrainReport, ProductionScheduler};
use crate::state::{ColonyState, StateStore};

// ---------------------------------------------------------------------------
// Consumer seam
// ---------------------------------------------------------------------------

/// Components a consumer may use during the consumer phase.
#[derive(Debug)]
pub struct CycleContext<'a> {
    /// The cycle being run.
    pub tick: u64,
    /// Reservation ledger.
    pub ledger: &'a mut ReservationLedger,
    /// Extraction node occupancy.
    pub occupancy: &'a mut OccupancyTracker,
    /// Haul tasks.
    pub haul: &'a mut HaulTaskRegistry,
    /// Production queues; demand registered here is drained this cycle.
    pub scheduler: &'a mut ProductionScheduler,
    /// Active configuration.
    pub config: &'a ColonyConfig,
}

impl CycleContext<'_> {
    /// Refill entry point over this cycle's ledger and occupancy.
    pub const fn provider(&mut self) -> EnergyProvider<'_> {
        EnergyProvider::new(self.ledger, self.occupancy, &self.config.harvest)
    }
}

/// Consumer roles: whatever acts on the world between reconciliation and
/// draining.
pub trait Consumers<W: World + ?Sized> {
    /// Run every consumer once.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`]; the runner logs it and continues with the
    /// drain phase.
    fn act(&mut self, world: &mut W, ctx: &mut CycleContext<'_>) -> Result<(), CoreError>;
}

/// Consumer stub that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConsumers;

impl<W: World + ?Sized> Consumers<W> for NoConsumers {
    fn act(&mut self, _world: &mut W, _ctx: &mut CycleContext<'_>) -> Result<(), CoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Summary of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// The cycle that was run.
    pub tick: u64,
    /// Ledger reconciliation.
    pub ledger: ValidationReport,
    /// Occupancy reconciliation.
    pub occupancy: OccupancyReport,
    /// Haul reconciliation.
    pub haul: HaulReport,
    /// Requests raised by standing role targets.
    pub target_requests: usize,
    /// Scheduler drain.
    pub drain: DrainReport,
    /// Ledger balance at cycle end.
    pub balance: BalanceResult,
    /// Phases that failed and were skipped.
    pub failed_phases: Vec<&'static str>,
}

/// Runs cycles against a world, persisting through a [`StateStore`].
#[derive(Debug)]
pub struct CycleRunner<S> {
    config: ColonyConfig,
    store: S,
}

impl<S: StateStore> CycleRunner<S> {
    /// Create a runner.
    pub const fn new(config: ColonyConfig, store: S) -> Self {
        Self { config, store }
    }

    /// Active configuration.
    pub const fn config(&self) -> &ColonyConfig {
        &self.config
    }

    /// Borrow the state store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Mutably borrow the state store.
    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Run one full cycle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::State`] if the state cannot be loaded or saved.
    /// Every other failure is logged and isolated to its phase.
    pub fn run_cycle<W, C>(&mut self, world: &mut W, consumers: &mut C) -> Result<CycleReport, CoreError>
    where
        W: World + ?Sized,
        C: Consumers<W> + ?Sized,
    {
        // --- Phase 1: Load ---
        let state = self.store.load()?;
        let tick = state.tick.saturating_add(1);
        let mut locations = state.scheduler_locations;
        for location in &self.config.scheduler.locations {
            if !locations.contains(location) {
                locations.push(location.clone());
            }
        }
        let mut ledger = ReservationLedger::from_state(state.ledger);
        let mut occupancy = OccupancyTracker::from_state(state.occupancy);
        let mut haul = HaulTaskRegistry::from_state(state.haul);
        let mut scheduler = ProductionScheduler::new(
            locations.iter().cloned(),
            self.config.scheduler.summary_interval_cycles,
        );
        let mut failed_phases = Vec::new();
        debug!(tick, "Cycle started");

        // --- Phase 2: Register ---
        if let Err(err) = register_locations(world, &locations, &mut ledger, &mut occupancy) {
            warn!(tick, %err, "Location registration failed");
            failed_phases.push("register");
        }

        // --- Phase 3: Reconcile ---
        let ledger_report = ledger.validate(world, &mut occupancy);
        if !ledger_report.is_clean() {
            info!(
                tick,
                dropped_sites = ledger_report.dropped_sites.len(),
                released_agents = ledger_report.released_agents.len(),
                dropped_records = ledger_report.dropped_records.len(),
                healed_sites = ledger_report.healed_sites.len(),
                "Ledger reconciled"
            );
        }
        let occupancy_report = occupancy.reconcile(world, &mut scheduler, &self.config.harvest);
        let haul_report = haul.reconcile(world, &mut scheduler, &self.config.haul);

        // --- Phase 4: Demand ---
        let target_requests = raise_target_demand(world, &mut scheduler, &self.config.scheduler.targets);

        // --- Phase 5: Consumers ---
        let mut ctx = CycleContext {
            tick,
            ledger: &mut ledger,
            occupancy: &mut occupancy,
            haul: &mut haul,
            scheduler: &mut scheduler,
            config: &self.config,
        };
        if let Err(err) = consumers.act(world, &mut ctx) {
            error!(tick, %err, "Consumer phase failed");
            failed_phases.push("consumers");
        }

        // --- Phase 6: Drain ---
        let drain = scheduler.drain(world, tick);

        // --- Phase 7: Save ---
        let balance = verify_balance(ledger.state());
        if let BalanceResult::Anomaly(anomaly) = &balance {
            error!(tick, message = %anomaly.message, "Ledger out of balance");
        }
        let state = ColonyState {
            tick,
            saved_at: Some(Utc::now()),
            ledger: ledger.into_state(),
            occupancy: occupancy.into_state(),
            haul: haul.into_state(),
            scheduler_locations: locations,
        };
        self.store.save(&state)?;

        info!(
            tick,
            created = drain.created.len(),
            stalled = drain.stalled.len(),
            "Cycle complete"
        );
        Ok(CycleReport {
            tick,
            ledger: ledger_report,
            occupancy: occupancy_report,
            haul: haul_report,
            target_requests,
            drain,
            balance,
            failed_phases,
        })
    }
}

/// Register unregistered locations with the occupancy tracker and track
/// every site of every served location in the ledger.
fn register_locations<W: World + ?Sized>(
    world: &W,
    locations: &[LocationId],
    ledger: &mut ReservationLedger,
    occupancy: &mut OccupancyTracker,
) -> Result<(), CoreError> {
    let mut first_error = None;
    for location in locations {
        // Re-derive slots whenever the world shows a node not yet tracked.
        let stale = !occupancy.is_registered(location)
            || world
                .nodes_in(location)
                .iter()
                .any(|node| occupancy.node(location, node.id).is_none());
        if stale {
            if let Err(err) = occupancy.register_location(world, location) {
                warn!(location = %location, %err, "Cannot register extraction nodes");
                first_error.get_or_insert(err);
                continue;
            }
        }
        for site in world.sites_in(location) {
            if ledger.track_site(location.clone(), site.id) {
                debug!(location = %location, site = %site.id, kind = ?site.kind, "Tracking site");
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Register one request per missing agent of every standing role target.
fn raise_target_demand<W: World + ?Sized>(
    world: &W,
    scheduler: &mut ProductionScheduler,
    targets: &[RoleTarget],
) -> usize {
    let agents = world.agents();
    let locations: Vec<LocationId> = scheduler.locations().cloned().collect();
    let mut requested = 0_usize;
    for location in &locations {
        for target in targets {
            let alive = agents
                .iter()
                .filter(|agent| agent.role == target.role && agent.position.location == *location)
                .count();
            let alive = u32::try_from(alive).unwrap_or(u32::MAX);
            for _ in alive..target.count {
                let registered = scheduler.register(
                    world,
                    location,
                    target.role,
                    &target.profile,
                    Payload::default(),
                    target.priority,
                );
                if registered.is_ok() {
                    requested = requested.saturating_add(1);
                }
            }
        }
    }
    requested
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use colony_types::Role;
    use colony_world::{SimWorld, create_starting_colony};

    use super::*;
    use crate::state::MemoryStore;

    fn config_without_targets() -> ColonyConfig {
        let mut config = ColonyConfig::default();
        config.scheduler.targets.clear();
        config
    }

    #[test]
    fn first_cycle_registers_and_requests_harvesters() {
        let (mut world, ids) = create_starting_colony().unwrap();
        let mut runner = CycleRunner::new(config_without_targets(), MemoryStore::new());
        let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();

        assert_eq!(report.tick, 1);
        assert!(report.failed_phases.is_empty());
        assert_eq!(report.occupancy.requested.len(), 2);
        // One harvester fits the budget; the facility is then busy.
        assert_eq!(report.drain.created.len(), 1);
        assert!(report.balance.is_balanced());

        let saved = runner.store().last().unwrap();
        assert_eq!(saved.tick, 1);
        assert!(saved.occupancy.locations.contains_key(&ids.location));
        assert_eq!(saved.ledger.locations.get(&ids.location).unwrap().sites.len(), 4);
    }

    #[test]
    fn unknown_location_fails_only_its_phase() {
        let mut world = SimWorld::new();
        let mut runner = CycleRunner::new(config_without_targets(), MemoryStore::new());
        let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
        assert_eq!(report.failed_phases, vec!["register"]);
        assert!(report.drain.created.is_empty());
        assert_eq!(runner.store().saves(), 1);
    }

    #[test]
    fn role_targets_raise_demand_for_missing_agents() {
        let (mut world, _) = create_starting_colony().unwrap();
        let mut runner = CycleRunner::new(ColonyConfig::default(), MemoryStore::new());
        let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
        // One worker and two upgraders.
        assert_eq!(report.target_requests, 3);
        // The worker sits in the highest tier and goes first.
        let (_, created) = report.drain.created.first().unwrap();
        assert_eq!(world.agent(*created).unwrap().role, Role::Worker);
    }

    struct FailingConsumers;

    impl Consumers<SimWorld> for FailingConsumers {
        fn act(&mut self, _world: &mut SimWorld, _ctx: &mut CycleContext<'_>) -> Result<(), CoreError> {
            Err(CoreError::UnknownLocation(LocationId::from("nowhere")))
        }
    }

    #[test]
    fn failing_consumers_do_not_block_drain() {
        let (mut world, _) = create_starting_colony().unwrap();
        let mut runner = CycleRunner::new(config_without_targets(), MemoryStore::new());
        let report = runner.run_cycle(&mut world, &mut FailingConsumers).unwrap();
        assert_eq!(report.failed_phases, vec!["consumers"]);
        assert_eq!(report.drain.created.len(), 1);
    }
}
