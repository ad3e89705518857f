//! Energy provider: the refill flow consumer roles call into.
//!
//! An agent that needs resource asks [`EnergyProvider::refill`] every cycle
//! until it is full. The first call claims the nearest tracked site with
//! enough unreserved content for the agent's free cargo. When no site
//! qualifies and the location's harvester coverage is poor, the agent is
//! sent to harvest an extraction node directly instead, taking one of the
//! node's slots. Once the agent is full its claim is released.

use colony_ledger::{LedgerError, NodeOccupancy, ReservationLedger};
use colony_types::{AgentId, AgentView, ClaimTarget, NodeId, Position, SiteId};
use colony_world::spatial::closest_by_range;
use colony_world::{TransferError, World};
use tracing::{debug, warn};

use crate::config::HarvestConfig;
use crate::occupancy::OccupancyTracker;

/// Result of one [`EnergyProvider::refill`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefillOutcome {
    /// The agent is loading from its target.
    Refilling,
    /// The agent is full; its claim has been released.
    Full,
    /// Nothing to refill from in the agent's location.
    Unavailable,
    /// The target is out of reach; move the agent here and call again.
    MoveTo(Position),
}

/// Refill entry point, borrowing the components it coordinates.
#[derive(Debug)]
pub struct EnergyProvider<'a> {
    ledger: &'a mut ReservationLedger,
    occupancy: &'a mut OccupancyTracker,
    harvest: &'a HarvestConfig,
}

impl<'a> EnergyProvider<'a> {
    /// Bundle the ledger and occupancy tracker for refill calls.
    pub const fn new(
        ledger: &'a mut ReservationLedger,
        occupancy: &'a mut OccupancyTracker,
        harvest: &'a HarvestConfig,
    ) -> Self {
        Self {
            ledger,
            occupancy,
            harvest,
        }
    }

    /// Advance the agent's refill by one cycle.
    pub fn refill<W: World + ?Sized>(&mut self, world: &mut W, agent_id: AgentId) -> RefillOutcome {
        let Some(agent) = world.agent(agent_id) else {
            self.ledger.release(agent_id, self.occupancy);
            return RefillOutcome::Unavailable;
        };
        if agent.is_full() {
            self.ledger.release(agent_id, self.occupancy);
            return RefillOutcome::Full;
        }

        // A site claim can run dry before the agent is full, e.g. after a
        // self-heal shrank it. Drop it and claim afresh.
        if self
            .ledger
            .record(agent_id)
            .is_some_and(|record| matches!(record.target, ClaimTarget::Site(_)) && record.reserved == 0)
        {
            debug!(agent_id = %agent_id, "Site claim used up before the agent filled");
            self.ledger.release(agent_id, self.occupancy);
        }

        let target = match self.ledger.record(agent_id) {
            Some(record) => record.target,
            None => match self.claim(world, &agent) {
                Some(target) => target,
                None => return RefillOutcome::Unavailable,
            },
        };

        match target {
            ClaimTarget::Site(site) => self.withdraw(world, agent_id, site),
            ClaimTarget::Node(node) => self.harvest_node(world, agent_id, node),
        }
    }

    /// Claim a site, or failing that an extraction slot.
    fn claim<W: World + ?Sized>(&mut self, world: &W, agent: &AgentView) -> Option<ClaimTarget> {
        let location = &agent.position.location;
        let candidates = self.ledger.tracked_sites(location);
        if let Some(site) =
            self.ledger
                .claim(world, agent, &candidates, agent.free_capacity(), self.occupancy)
        {
            return Some(ClaimTarget::Site(site));
        }

        let health = self.occupancy.health_state(location)?;
        if health.level() > self.harvest.enable_below_health {
            debug!(agent_id = %agent.id, location = %location, "No site to refill from");
            return None;
        }
        let open: Vec<_> = self
            .occupancy
            .open_nodes(location)
            .into_iter()
            .filter_map(|node| world.node(node))
            .collect();
        let node = closest_by_range(&agent.position, &open, |node| &node.position)?.id;
        if !self.occupancy.occupy(location, node) {
            return None;
        }
        if !self.ledger.record_node_claim(agent.id, location.clone(), node) {
            self.occupancy.vacate(location, node);
            return None;
        }
        debug!(agent_id = %agent.id, node = %node, "Claimed extraction slot");
        Some(ClaimTarget::Node(node))
    }

    fn withdraw<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        agent_id: AgentId,
        site: SiteId,
    ) -> RefillOutcome {
        let Some(view) = world.site(site) else {
            self.ledger.release(agent_id, self.occupancy);
            return RefillOutcome::Unavailable;
        };
        match self.ledger.withdraw_reserved(world, agent_id) {
            Ok(_) => RefillOutcome::Refilling,
            Err(err) if err.needs_approach() || is_short(&err) => RefillOutcome::MoveTo(view.position),
            Err(err) => {
                warn!(agent_id = %agent_id, site = %site, %err, "Refill error while withdrawing");
                RefillOutcome::Refilling
            }
        }
    }

    fn harvest_node<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        agent_id: AgentId,
        node: NodeId,
    ) -> RefillOutcome {
        let Some(view) = world.node(node) else {
            self.ledger.release(agent_id, self.occupancy);
            return RefillOutcome::Unavailable;
        };
        match world.harvest(agent_id, node) {
            Ok(()) | Err(TransferError::Busy) => RefillOutcome::Refilling,
            Err(TransferError::NotInRange | TransferError::NotEnoughResource) => {
                RefillOutcome::MoveTo(view.position)
            }
            Err(err) => {
                warn!(agent_id = %agent_id, node = %node, %err, "Refill error while harvesting");
                RefillOutcome::Refilling
            }
        }
    }
}

const fn is_short(err: &LedgerError) -> bool {
    matches!(
        err,
        LedgerError::Transfer {
            source: TransferError::NotEnoughResource
        }
    )
}
