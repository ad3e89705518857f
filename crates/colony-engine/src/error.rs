//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: colony_core::config::ConfigError,
    },

    /// Starting colony construction failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: colony_world::WorldError,
    },

    /// A cycle could not load or save its state.
    #[error("cycle error: {source}")]
    Cycle {
        /// The underlying core error.
        #[from]
        source: colony_core::CoreError,
    },

    /// Reading or seeding the saved state failed.
    #[error("state error: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: colony_core::state::StateError,
    },
}
