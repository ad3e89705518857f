//! Multi-cycle runs of the scheduling core against the simulated starting
//! colony.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use colony_core::config::ColonyConfig;
use colony_core::cycle::{Consumers, CycleContext, CycleRunner, NoConsumers};
use colony_core::haul::HaulTaskRegistry;
use colony_core::provider::RefillOutcome;
use colony_core::state::{ColonyState, JsonFileStore, MemoryStore, StateStore};
use colony_core::CoreError;
use colony_types::{AgentId, Assignment, Capability, Payload, Position, Role};
use colony_world::{SimWorld, StartingColonyIds, World, create_starting_colony};

fn quiet_config() -> ColonyConfig {
    let mut config = ColonyConfig::default();
    config.scheduler.targets.clear();
    config
}

fn run<S: StateStore, C: Consumers<SimWorld>>(
    runner: &mut CycleRunner<S>,
    world: &mut SimWorld,
    consumers: &mut C,
    cycles: u64,
) {
    for _ in 0..cycles {
        let report = runner.run_cycle(world, consumers).unwrap();
        assert!(report.balance.is_balanced(), "unbalanced at cycle {}", report.tick);
        world.advance();
    }
}

fn harvesters(world: &SimWorld) -> Vec<AgentId> {
    world
        .agents()
        .into_iter()
        .filter(|agent| agent.role == Role::ContainerHarvester)
        .map(|agent| agent.id)
        .collect()
}

fn seeded_store(world: &SimWorld, ids: &StartingColonyIds) -> MemoryStore {
    let mut haul = HaulTaskRegistry::new();
    haul.add_task(world, ids.container_a, ids.storage, None).unwrap();
    let mut store = MemoryStore::new();
    store
        .save(&ColonyState {
            haul: haul.into_state(),
            ..ColonyState::default()
        })
        .unwrap();
    store
}

// ---------------------------------------------------------------------------
// Harvesters
// ---------------------------------------------------------------------------

#[test]
fn every_node_gets_exactly_one_harvester() {
    let (mut world, ids) = create_starting_colony().unwrap();
    let mut runner = CycleRunner::new(quiet_config(), MemoryStore::new());

    run(&mut runner, &mut world, &mut NoConsumers, 80);

    let created = harvesters(&world);
    assert_eq!(created.len(), 2);
    let state = runner.store().last().unwrap();
    let nodes = &state.occupancy.locations[&ids.location].nodes;
    for node in [ids.node_a, ids.node_b] {
        assert_eq!(nodes[&node].assigned.len(), 1);
    }
}

#[test]
fn dead_harvester_is_replaced() {
    let (mut world, ids) = create_starting_colony().unwrap();
    let mut runner = CycleRunner::new(quiet_config(), MemoryStore::new());
    run(&mut runner, &mut world, &mut NoConsumers, 80);

    let victim = harvesters(&world)[0];
    assert!(world.remove_agent(victim));

    let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
    assert_eq!(report.occupancy.pruned_agents, vec![victim]);
    assert_eq!(report.occupancy.requested.len(), 1);
    world.advance();

    run(&mut runner, &mut world, &mut NoConsumers, 40);
    let replaced = harvesters(&world);
    assert_eq!(replaced.len(), 2);
    assert!(!replaced.contains(&victim));
    let nodes = &runner.store().last().unwrap().occupancy.locations[&ids.location].nodes;
    assert!(nodes.values().all(|record| record.assigned.len() == 1));
}

#[test]
fn vanished_node_is_dropped() {
    let (mut world, ids) = create_starting_colony().unwrap();
    let mut runner = CycleRunner::new(quiet_config(), MemoryStore::new());
    runner.run_cycle(&mut world, &mut NoConsumers).unwrap();

    assert!(world.remove_node(ids.node_b));
    let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
    assert_eq!(report.occupancy.dropped_nodes, vec![ids.node_b]);
    let nodes = &runner.store().last().unwrap().occupancy.locations[&ids.location].nodes;
    assert!(!nodes.contains_key(&ids.node_b));
}

#[test]
fn node_added_later_gets_a_harvester() {
    let (mut world, ids) = create_starting_colony().unwrap();
    let mut runner = CycleRunner::new(quiet_config(), MemoryStore::new());
    run(&mut runner, &mut world, &mut NoConsumers, 80);
    assert_eq!(harvesters(&world).len(), 2);

    let late = world.add_node(Position::new("W1N1", 20, 40), 3000).unwrap();
    let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
    assert_eq!(report.occupancy.requested.len(), 1);
    world.advance();

    run(&mut runner, &mut world, &mut NoConsumers, 60);
    assert_eq!(harvesters(&world).len(), 3);
    let nodes = &runner.store().last().unwrap().occupancy.locations[&ids.location].nodes;
    assert_eq!(nodes[&late].assigned.len(), 1);
    // Earlier assignments survive the re-derivation.
    assert_eq!(nodes[&ids.node_a].assigned.len(), 1);
    assert_eq!(nodes[&ids.node_b].assigned.len(), 1);
}

// ---------------------------------------------------------------------------
// Haul tasks
// ---------------------------------------------------------------------------

#[test]
fn haul_task_gets_one_transporter() {
    let (mut world, ids) = create_starting_colony().unwrap();
    let store = seeded_store(&world, &ids);
    let mut config = quiet_config();
    config.harvest.priority = colony_types::Priority::LOWEST;
    let mut runner = CycleRunner::new(config, store);

    let first = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
    assert_eq!(first.haul.requested.len(), 1);
    world.advance();

    run(&mut runner, &mut world, &mut NoConsumers, 5);
    let transporters: Vec<_> = world
        .agents()
        .into_iter()
        .filter(|agent| agent.role == Role::Transporter)
        .collect();
    assert_eq!(transporters.len(), 1);

    let state = runner.store().last().unwrap();
    let task = &state.haul.tasks[0];
    assert_eq!(task.assigned, vec![transporters[0].id]);
    assert_eq!(
        transporters[0].payload.assignment,
        Some(Assignment::HaulTask { task: task.id.unwrap() })
    );
}

#[test]
fn task_with_destroyed_sink_stays_dormant() {
    let (mut world, ids) = create_starting_colony().unwrap();
    let store = seeded_store(&world, &ids);
    let mut runner = CycleRunner::new(quiet_config(), store);

    assert!(world.remove_site(ids.storage));
    let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
    assert_eq!(report.haul.dormant, vec![0]);
    assert!(report.haul.requested.is_empty());
    assert_eq!(runner.store().last().unwrap().haul.tasks.len(), 1);
}

// ---------------------------------------------------------------------------
// Consumers and the ledger
// ---------------------------------------------------------------------------

/// Claims storage for one fixed agent every cycle and never withdraws.
struct Hoarder {
    agent: AgentId,
    outcomes: Vec<RefillOutcome>,
}

impl Consumers<SimWorld> for Hoarder {
    fn act(&mut self, world: &mut SimWorld, ctx: &mut CycleContext<'_>) -> Result<(), CoreError> {
        let outcome = ctx.provider().refill(world, self.agent);
        self.outcomes.push(outcome);
        Ok(())
    }
}

#[test]
fn claims_survive_between_cycles_and_die_with_their_agent() {
    let (mut world, ids) = create_starting_colony().unwrap();
    let agent = world
        .add_agent(
            Role::Worker,
            Position::new("W1N1", 25, 30),
            vec![Capability::Carry, Capability::Move],
            Payload::default(),
        )
        .unwrap();
    let mut runner = CycleRunner::new(quiet_config(), MemoryStore::new());
    let mut hoarder = Hoarder {
        agent,
        outcomes: Vec::new(),
    };

    run(&mut runner, &mut world, &mut hoarder, 2);
    assert!(matches!(hoarder.outcomes[0], RefillOutcome::MoveTo(_)));
    let ledger = &runner.store().last().unwrap().ledger;
    assert_eq!(ledger.agents[&agent].reserved, 50);
    assert_eq!(ledger.locations[&ids.location].sites[&ids.storage], 50);

    assert!(world.remove_agent(agent));
    let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
    assert_eq!(report.ledger.released_agents, vec![agent]);
    let ledger = &runner.store().last().unwrap().ledger;
    assert!(ledger.agents.is_empty());
    assert_eq!(ledger.locations[&ids.location].sites[&ids.storage], 0);
}

#[test]
fn drained_site_shrinks_claims() {
    let (mut world, ids) = create_starting_colony().unwrap();
    let agent = world
        .add_agent(
            Role::Worker,
            Position::new("W1N1", 25, 30),
            vec![Capability::Carry, Capability::Move],
            Payload::default(),
        )
        .unwrap();
    let mut runner = CycleRunner::new(quiet_config(), MemoryStore::new());
    let mut hoarder = Hoarder {
        agent,
        outcomes: Vec::new(),
    };
    run(&mut runner, &mut world, &mut hoarder, 1);

    world.set_site_content(ids.storage, 20).unwrap();
    let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
    assert_eq!(report.ledger.healed_sites, vec![ids.storage]);
    assert!(report.balance.is_balanced());
    let ledger = &runner.store().last().unwrap().ledger;
    assert_eq!(ledger.agents[&agent].reserved, 20);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn state_round_trips_through_a_json_file() {
    let path = std::env::temp_dir().join(format!("colony-cycle-{}.json", uuid::Uuid::new_v4()));
    let (mut world, ids) = create_starting_colony().unwrap();

    let mut runner = CycleRunner::new(quiet_config(), JsonFileStore::new(&path));
    run(&mut runner, &mut world, &mut NoConsumers, 3);

    // A fresh runner resumes from the file.
    let mut runner = CycleRunner::new(quiet_config(), JsonFileStore::new(&path));
    let report = runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
    assert_eq!(report.tick, 4);
    // The first harvester was adopted before the restart.
    assert_eq!(report.occupancy.requested.len(), 1);

    let state = runner.store().load().unwrap();
    assert_eq!(state.tick, 4);
    assert!(state.saved_at.is_some());
    assert!(state.occupancy.locations.contains_key(&ids.location));
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn scheduler_locations_are_persisted() {
    let (mut world, ids) = create_starting_colony().unwrap();
    let mut runner = CycleRunner::new(quiet_config(), MemoryStore::new());
    runner.run_cycle(&mut world, &mut NoConsumers).unwrap();
    assert_eq!(
        runner.store().last().unwrap().scheduler_locations,
        vec![ids.location]
    );
}
