//! Demo consumer roles for the simulated world.
//!
//! The core only decides who gets created and who may take what. These
//! consumers give the created agents something to do so a run of the engine
//! actually moves resource around. Harvesters fill their node's container
//! and transporters carry from a task's source to its sink. Workers and
//! upgraders refill through the energy provider and spend what they carry.
//! Movement is a teleport to the target cell.

use colony_core::cycle::{Consumers, CycleContext};
use colony_core::provider::RefillOutcome;
use colony_core::CoreError;
use colony_types::{AgentId, AgentView, Assignment, HaulTaskId, LocationId, NodeId, Role, SiteId};
use colony_world::{SimWorld, World, WorldError};
use tracing::debug;

/// Consumer roles acting on a [`SimWorld`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SimConsumers;

impl Consumers<SimWorld> for SimConsumers {
    fn act(&mut self, world: &mut SimWorld, ctx: &mut CycleContext<'_>) -> Result<(), CoreError> {
        for agent in world.agents() {
            match (&agent.role, &agent.payload.assignment) {
                (Role::ContainerHarvester, Some(Assignment::Node { location, node })) => {
                    harvest(world, ctx, &agent, location, *node)?;
                }
                (Role::Transporter, Some(Assignment::HaulTask { task })) => {
                    haul(world, ctx, &agent, *task)?;
                }
                (Role::Worker | Role::Upgrader, _) => upgrade(world, ctx, &agent)?,
                _ => {}
            }
        }
        Ok(())
    }
}

/// Park next to the node, harvest, and empty into the node's container.
fn harvest(
    world: &mut SimWorld,
    ctx: &CycleContext<'_>,
    agent: &AgentView,
    location: &LocationId,
    node: NodeId,
) -> Result<(), WorldError> {
    let Some(node_view) = world.node(node) else {
        return Ok(());
    };
    let container = ctx
        .occupancy
        .node(location, node)
        .and_then(|record| record.container)
        .and_then(|id| world.site(id));
    let post = container
        .as_ref()
        .map_or_else(|| node_view.position.clone(), |site| site.position.clone());
    if agent.position != post {
        world.move_agent(agent.id, post)?;
    }
    if let Err(err) = world.harvest(agent.id, node) {
        debug!(agent_id = %agent.id, node = %node, %err, "Harvest skipped");
    }
    if let Some(site) = container {
        deposit(world, agent.id, site.id)?;
    }
    Ok(())
}

/// Load at the task's source while empty, unload at its sink otherwise.
fn haul(
    world: &mut SimWorld,
    ctx: &mut CycleContext<'_>,
    agent: &AgentView,
    task: HaulTaskId,
) -> Result<(), CoreError> {
    let Some((source, sink)) = ctx.haul.task(task).map(|task| (task.source, task.sink)) else {
        return Ok(());
    };
    let (Some(source), Some(sink)) = (world.site(source), world.site(sink)) else {
        return Ok(());
    };

    if agent.carried == 0 {
        world.move_agent(agent.id, source.position)?;
        match ctx
            .ledger
            .withdraw_up_to(world, agent.id, source.id, agent.free_capacity())
        {
            Ok(amount) => debug!(agent_id = %agent.id, site = %source.id, amount, "Loaded"),
            Err(err) => debug!(agent_id = %agent.id, site = %source.id, %err, "Nothing to load"),
        }
    } else {
        world.move_agent(agent.id, sink.position)?;
        deposit(world, agent.id, sink.id)?;
    }
    Ok(())
}

/// Refill through the energy provider; a full agent spends its cargo.
fn upgrade(
    world: &mut SimWorld,
    ctx: &mut CycleContext<'_>,
    agent: &AgentView,
) -> Result<(), CoreError> {
    match ctx.provider().refill(world, agent.id) {
        RefillOutcome::MoveTo(position) => world.move_agent(agent.id, position)?,
        RefillOutcome::Full => world.set_carried(agent.id, 0)?,
        RefillOutcome::Refilling | RefillOutcome::Unavailable => {}
    }
    Ok(())
}

/// Empty the agent's cargo into a site, up to the site's free space.
fn deposit(world: &mut SimWorld, agent: AgentId, site: SiteId) -> Result<u32, WorldError> {
    let (Some(view), Some(target)) = (world.agent(agent), world.site(site)) else {
        return Ok(0);
    };
    let amount = view
        .carried
        .min(target.capacity.saturating_sub(target.content));
    if amount == 0 {
        return Ok(0);
    }
    world.set_site_content(site, target.content.saturating_add(amount))?;
    world.set_carried(agent, view.carried.saturating_sub(amount))?;
    Ok(amount)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use colony_core::config::ColonyConfig;
    use colony_core::haul::HaulTaskRegistry;
    use colony_core::state::{ColonyState, MemoryStore, StateStore};
    use colony_core::CycleRunner;
    use colony_world::create_starting_colony;

    use super::*;

    fn run(runner: &mut CycleRunner<MemoryStore>, world: &mut SimWorld, cycles: u64) {
        for _ in 0..cycles {
            let report = runner.run_cycle(world, &mut SimConsumers).unwrap();
            assert!(report.balance.is_balanced(), "unbalanced at cycle {}", report.tick);
            world.advance();
        }
    }

    #[test]
    fn harvesters_fill_their_containers() {
        let (mut world, ids) = create_starting_colony().unwrap();
        let mut config = ColonyConfig::default();
        config.scheduler.targets.clear();
        let mut runner = CycleRunner::new(config, MemoryStore::new());

        run(&mut runner, &mut world, 40);

        let harvesters = world
            .agents()
            .into_iter()
            .filter(|agent| agent.role == Role::ContainerHarvester)
            .count();
        assert!(harvesters >= 1);
        let filled = [ids.container_a, ids.container_b]
            .iter()
            .map(|&site| world.site(site).unwrap().content)
            .sum::<u32>();
        assert!(filled > 0);
    }

    #[test]
    fn workers_draw_from_storage() {
        let (mut world, ids) = create_starting_colony().unwrap();
        let mut runner = CycleRunner::new(ColonyConfig::default(), MemoryStore::new());

        run(&mut runner, &mut world, 30);

        assert!(world.agents().iter().any(|agent| agent.role == Role::Worker));
        assert!(world.site(ids.storage).unwrap().content < 5000);
    }

    #[test]
    fn transporters_move_resource_to_storage() {
        let (mut world, ids) = create_starting_colony().unwrap();
        world.set_site_content(ids.container_a, 500).unwrap();
        world.set_site_content(ids.storage, 0).unwrap();

        let mut haul = HaulTaskRegistry::new();
        haul.add_task(&world, ids.container_a, ids.storage, None).unwrap();
        let mut store = MemoryStore::new();
        store
            .save(&ColonyState {
                haul: haul.into_state(),
                ..ColonyState::default()
            })
            .unwrap();

        let mut config = ColonyConfig::default();
        config.scheduler.targets.clear();
        // Harvesters queue below the transporter.
        config.harvest.priority = colony_types::Priority::LOWEST;
        let mut runner = CycleRunner::new(config, store);

        // A distant transporter takes 63 ticks to create.
        run(&mut runner, &mut world, 70);

        assert!(world.agents().iter().any(|agent| agent.role == Role::Transporter));
        assert!(world.site(ids.storage).unwrap().content > 0);
    }
}
