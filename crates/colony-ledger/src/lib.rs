//! Reservation ledger for shared resource sites.
//!
//! Several agents may decide in the same cycle to refill from the same
//! container. The ledger prevents them from over-claiming it: an agent first
//! claims part of a site's content, and only the unclaimed remainder is
//! offered to the next agent. Claims live across cycles, so the ledger also
//! has to survive agents dying and sites being destroyed between cycles.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`ReservationLedger`]: claim, release, withdraw, and
//!   the start-of-cycle `validate` pass.
//! - [`balance`] -- Balance verification for the per-site sum invariant.
//!
//! # Balance Invariant
//!
//! For every tracked site S:
//!
//! ```text
//! reserved(S) == sum(record.reserved for every agent record targeting S)
//! reserved(S) <= content(S)
//! ```
//!
//! The first half holds by construction after every operation. The second
//! half can be broken by the world (content drained by something outside
//! the ledger); `validate` detects it and self-heals by shrinking claims.
//! The ledger never panics; it returns errors and logs.
//!
//! # Usage
//!
//! ```
//! use colony_ledger::{NodeOccupancy, ReservationLedger};
//! use colony_types::{Capability, LocationId, NodeId, Payload, Position, Role, SiteKind};
//! use colony_world::{SimWorld, World};
//!
//! struct NoNodes;
//! impl NodeOccupancy for NoNodes {
//!     fn is_tracked(&self, _: &LocationId, _: NodeId) -> bool { false }
//!     fn vacate(&mut self, _: &LocationId, _: NodeId) -> bool { false }
//! }
//!
//! let mut world = SimWorld::new();
//! world.add_location("W1N1").ok();
//! let site = world
//!     .add_site(SiteKind::Container, Position::new("W1N1", 5, 5), 100, 2000)
//!     .ok()
//!     .unwrap_or_default();
//! let agent = world
//!     .add_agent(Role::Worker, Position::new("W1N1", 6, 6), vec![Capability::Carry], Payload::default())
//!     .ok()
//!     .and_then(|id| world.agent(id));
//!
//! let mut ledger = ReservationLedger::new();
//! ledger.track_site(LocationId::from("W1N1"), site);
//! if let Some(agent) = agent {
//!     let claimed = ledger.claim(&world, &agent, &[site], 40, &mut NoNodes);
//!     assert_eq!(claimed, Some(site));
//!     assert_eq!(ledger.reserved(site), Some(40));
//! }
//! ```

pub mod balance;
pub mod ledger;

// Re-export primary types at crate root.
pub use balance::{BalanceResult, ReservationAnomaly, SiteImbalance, verify_balance};
pub use ledger::{
    LedgerState, LocationReservations, ReservationLedger, ReservationRecord, ValidationReport,
};

use colony_types::{AgentId, LocationId, NodeId, SiteId};
use colony_world::TransferError;

// ---------------------------------------------------------------------------
// Node occupancy seam
// ---------------------------------------------------------------------------

/// Access to extraction-node harvesting slots.
///
/// Reservation records may point at an extraction node instead of a site
/// (an agent harvesting directly). The slots of those nodes are owned by
/// the occupancy tracker; the ledger only gives them back through this
/// trait when it releases such a record.
pub trait NodeOccupancy {
    /// Whether the node is tracked for the location.
    fn is_tracked(&self, location: &LocationId, node: NodeId) -> bool;

    /// Give back one harvesting slot. Returns `false` if the node is not
    /// tracked.
    fn vacate(&mut self, location: &LocationId, node: NodeId) -> bool;
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned by ledger withdrawals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The site is not tracked by the ledger.
    #[error("site {0} is not tracked by the ledger")]
    UntrackedSite(SiteId),

    /// The site no longer exists in the world.
    #[error("site {0} no longer exists")]
    StaleSite(SiteId),

    /// The agent no longer exists in the world.
    #[error("agent {0} no longer exists")]
    StaleAgent(AgentId),

    /// More is reserved at the site than it holds.
    #[error("site {site} exhausted: content {content}, reserved {reserved}")]
    Exhausted {
        /// The over-reserved site.
        site: SiteId,
        /// Live content.
        content: u32,
        /// Reserved amount before self-healing.
        reserved: u32,
    },

    /// The agent holds no reservation.
    #[error("agent {0} holds no reservation")]
    NoReservation(AgentId),

    /// The agent's reservation targets an extraction node, not a site.
    #[error("agent {0} holds a node claim, not a site reservation")]
    NotASiteClaim(AgentId),

    /// The underlying world transfer failed.
    #[error("transfer failed: {source}")]
    Transfer {
        /// The underlying transfer error.
        #[from]
        source: TransferError,
    },
}

impl LedgerError {
    /// Whether the caller should move the agent closer and retry next cycle.
    pub const fn needs_approach(&self) -> bool {
        matches!(
            self,
            Self::Transfer {
                source: TransferError::NotInRange
            }
        )
    }
}
