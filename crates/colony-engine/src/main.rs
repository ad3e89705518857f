//! Engine binary for the colony simulation.
//!
//! Wires the cycle runner to a simulated starting colony and paces cycles
//! on a fixed interval until the configured cycle limit or Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `colony-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the starting colony
//! 4. Reset the saved state and seed the haul tasks
//! 5. Run the cycle loop
//! 6. Log the result

mod consumers;
mod error;

use std::path::Path;
use std::time::Duration;

use colony_core::config::ColonyConfig;
use colony_core::haul::HaulTaskRegistry;
use colony_core::state::{ColonyState, JsonFileStore, StateStore};
use colony_core::CycleRunner;
use colony_world::{SimWorld, StartingColonyIds, World as _};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::consumers::SimConsumers;
use crate::error::EngineError;

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, world setup, or state persistence
/// fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("colony-engine starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        tick_interval_ms = config.cycle.tick_interval_ms,
        max_cycles = config.cycle.max_cycles,
        locations = config.scheduler.locations.len(),
        targets = config.scheduler.targets.len(),
        state_path = %config.state.path.display(),
        "Configuration loaded"
    );

    // 3. Create the starting colony.
    let (mut world, ids) = colony_world::create_starting_colony()?;
    info!(
        location = %ids.location,
        facility = %ids.facility,
        "Starting colony created"
    );

    // 4. Reset state and seed haul tasks.
    let mut store = JsonFileStore::new(&config.state.path);
    seed_state(&mut store, &world, &ids)?;

    // 5. Run the cycle loop.
    let interval_ms = config.cycle.tick_interval_ms;
    let max_cycles = config.cycle.max_cycles;
    let mut runner = CycleRunner::new(config, store);
    let mut consumers = SimConsumers;
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut completed: u64 = 0;
    let end_reason = loop {
        tokio::select! {
            _ = &mut shutdown => break "interrupted",
            _ = interval.tick() => {}
        }

        let report = runner.run_cycle(&mut world, &mut consumers)?;
        if !report.failed_phases.is_empty() {
            warn!(tick = report.tick, failed = ?report.failed_phases, "Cycle finished with failed phases");
        }
        world.advance();
        completed = completed.saturating_add(1);

        if max_cycles > 0 && completed >= max_cycles {
            break "max_cycles";
        }
    };

    // 6. Log the result.
    let agents = world.agents().len();
    info!(
        end_reason,
        total_cycles = completed,
        agents,
        "colony-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `colony-config.yaml` in the working directory.
///
/// Returns the configuration and whether it came from the file.
fn load_config() -> Result<(ColonyConfig, bool), EngineError> {
    let config_path = Path::new("colony-config.yaml");
    if config_path.exists() {
        Ok((ColonyConfig::from_file(config_path)?, true))
    } else {
        let mut config = ColonyConfig::default();
        config.state.apply_env_overrides();
        Ok((config, false))
    }
}

/// Replace any saved state with a fresh one holding the starting haul
/// tasks: both containers feed the storage.
///
/// The simulated world is rebuilt on every start, so handles saved by an
/// earlier run never resolve.
fn seed_state<S: StateStore>(
    store: &mut S,
    world: &SimWorld,
    ids: &StartingColonyIds,
) -> Result<(), EngineError> {
    match store.load() {
        Ok(previous) if previous.tick > 0 => {
            info!(tick = previous.tick, "Discarding saved state from an earlier run");
        }
        Ok(_) => {}
        Err(err) => warn!(%err, "Saved state unreadable, overwriting"),
    }

    let mut haul = HaulTaskRegistry::new();
    for container in [ids.container_a, ids.container_b] {
        let task = haul.add_task(world, container, ids.storage, None)?;
        info!(task = %task, source = %container, sink = %ids.storage, "Haul task seeded");
    }
    store.save(&ColonyState {
        haul: haul.into_state(),
        ..ColonyState::default()
    })?;
    Ok(())
}
