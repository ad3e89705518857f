//! Persistent colony state.
//!
//! Every component keeps its bookkeeping in a plain serializable struct.
//! [`ColonyState`] bundles them under one key per component; the cycle
//! runner loads it at cycle start, builds the components from it, and
//! writes the components' state back at cycle end. Nothing else survives
//! between cycles.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use colony_ledger::LedgerState;
use colony_types::LocationId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::haul::HaulState;
use crate::occupancy::OccupancyState;

/// Errors from loading or saving the colony state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Failed to read or write the state file.
    #[error("state file I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The state file is not valid JSON for the expected schema.
    #[error("state file is malformed: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Everything the core persists between cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyState {
    /// Last completed cycle.
    #[serde(default)]
    pub tick: u64,
    /// When the state was last written.
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    /// Reservation ledger.
    #[serde(default)]
    pub ledger: LedgerState,
    /// Extraction node occupancy.
    #[serde(default)]
    pub occupancy: OccupancyState,
    /// Haul tasks.
    #[serde(default)]
    pub haul: HaulState,
    /// Locations the production scheduler serves.
    #[serde(default)]
    pub scheduler_locations: Vec<LocationId>,
}

/// Durable storage for [`ColonyState`].
pub trait StateStore {
    /// Load the last saved state; a store that was never written yields
    /// the default state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the stored state cannot be read.
    fn load(&self) -> Result<ColonyState, StateError>;

    /// Persist the state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the state cannot be written.
    fn save(&mut self, state: &ColonyState) -> Result<(), StateError>;
}

/// State store backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<ColonyState, StateError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No saved state, starting fresh");
            return Ok(ColonyState::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let state: ColonyState = serde_json::from_str(&contents)?;
        debug!(path = %self.path.display(), tick = state.tick, "Loaded colony state");
        Ok(state)
    }

    fn save(&mut self, state: &ColonyState) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), tick = state.tick, "Saved colony state");
        Ok(())
    }
}

/// In-memory state store for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Option<ColonyState>,
    saves: u64,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves.
    pub const fn saves(&self) -> u64 {
        self.saves
    }

    /// The last saved state, if any.
    pub const fn last(&self) -> Option<&ColonyState> {
        self.state.as_ref()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<ColonyState, StateError> {
        Ok(self.state.clone().unwrap_or_default())
    }

    fn save(&mut self, state: &ColonyState) -> Result<(), StateError> {
        self.state = Some(state.clone());
        self.saves = self.saves.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> ColonyState {
        ColonyState {
            tick: 42,
            saved_at: Some(Utc::now()),
            scheduler_locations: vec![LocationId::from("W1N1")],
            ..ColonyState::default()
        }
    }

    #[test]
    fn memory_store_starts_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), ColonyState::default());
        assert!(store.last().is_none());
    }

    #[test]
    fn memory_store_returns_last_save() {
        let mut store = MemoryStore::new();
        let state = sample();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
        assert_eq!(store.saves(), 1);
    }

    #[test]
    fn json_file_store_roundtrips() {
        let path = std::env::temp_dir().join(format!("colony-state-{}.json", uuid::Uuid::new_v4()));
        let mut store = JsonFileStore::new(&path);
        assert_eq!(store.load().unwrap(), ColonyState::default());

        let state = sample();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn json_file_store_rejects_garbage() {
        let path = std::env::temp_dir().join(format!("colony-state-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StateError::Json { .. })));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_fields_default() {
        let state: ColonyState = serde_json::from_str(r#"{"tick": 3}"#).unwrap();
        assert_eq!(state.tick, 3);
        assert!(state.ledger.agents.is_empty());
    }
}
