//! Error types for the colony core.

use colony_ledger::LedgerError;
use colony_types::{LocationId, SiteId};
use colony_world::WorldError;

use crate::scheduler::SchedulerError;
use crate::state::StateError;

/// Errors surfaced by core components.
///
/// None of these stop a cycle: the cycle runner logs a failing phase and
/// moves on to the next one.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The world does not know the location.
    #[error("location {0} is not visible")]
    UnknownLocation(LocationId),

    /// The world does not know the site.
    #[error("site {0} does not exist")]
    UnknownSite(SiteId),

    /// A production request was refused.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: SchedulerError,
    },

    /// A ledger operation failed.
    #[error("ledger error: {source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: LedgerError,
    },

    /// A world mutation failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// Loading or saving the colony state failed.
    #[error("state error: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: StateError,
    },
}
