//! The reservation ledger.
//!
//! [`ReservationLedger`] owns the persisted [`LedgerState`] for one cycle:
//! it is built from the state store at cycle start, mutated by `claim`,
//! `release`, `withdraw_*`, and `validate`, and handed back with
//! [`ReservationLedger::into_state`] at cycle end.
//!
//! # Design
//!
//! - **Sole owner**: no other component touches a site's reserved counter.
//! - **Re-validated**: every handle is re-resolved through the world on use;
//!   a missing entity is pruned, never an error that escapes the cycle.
//! - **Unsigned**: counters are `u32` with saturating/checked arithmetic.

use std::collections::BTreeMap;

use colony_types::{AgentId, AgentView, ClaimTarget, LocationId, NodeId, SiteId};
use colony_world::World;
use colony_world::spatial::closest_by_range;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{LedgerError, NodeOccupancy};

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// Reserved amounts of the tracked sites in one location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationReservations {
    /// Site handle to reserved amount.
    #[serde(default)]
    pub sites: BTreeMap<SiteId, u32>,
}

/// One agent's outstanding claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    /// Location of the claimed target.
    pub location: LocationId,
    /// The claimed site or node.
    pub target: ClaimTarget,
    /// Amount held at a site; always zero for node claims.
    pub reserved: u32,
}

/// The ledger's persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Per-location site counters.
    #[serde(default)]
    pub locations: BTreeMap<LocationId, LocationReservations>,
    /// Per-agent claims.
    #[serde(default)]
    pub agents: BTreeMap<AgentId, ReservationRecord>,
}

/// What a [`ReservationLedger::validate`] pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Tracked sites that no longer resolve and were dropped.
    pub dropped_sites: Vec<SiteId>,
    /// Records of agents that no longer exist, released.
    pub released_agents: Vec<AgentId>,
    /// Records whose target is no longer tracked, dropped.
    pub dropped_records: Vec<AgentId>,
    /// Sites whose counter was repaired or clamped to live content.
    pub healed_sites: Vec<SiteId>,
}

impl ValidationReport {
    /// Whether the pass changed nothing.
    pub fn is_clean(&self) -> bool {
        self.dropped_sites.is_empty()
            && self.released_agents.is_empty()
            && self.dropped_records.is_empty()
            && self.healed_sites.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Tracks per-site reserved amounts and per-agent claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationLedger {
    state: LedgerState,
}

impl ReservationLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the ledger from persisted state.
    pub const fn from_state(state: LedgerState) -> Self {
        Self { state }
    }

    /// Borrow the persisted state.
    pub const fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Hand the state back for persisting.
    pub fn into_state(self) -> LedgerState {
        self.state
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Start tracking a site. Returns `false` if it was already tracked.
    pub fn track_site(&mut self, location: LocationId, site: SiteId) -> bool {
        if self.location_of(site).is_some() {
            return false;
        }
        self.state
            .locations
            .entry(location)
            .or_default()
            .sites
            .insert(site, 0);
        true
    }

    /// Location a tracked site belongs to.
    pub fn location_of(&self, site: SiteId) -> Option<&LocationId> {
        self.state
            .locations
            .iter()
            .find(|(_, reservations)| reservations.sites.contains_key(&site))
            .map(|(location, _)| location)
    }

    /// Whether the site is tracked.
    pub fn is_tracked(&self, site: SiteId) -> bool {
        self.location_of(site).is_some()
    }

    /// Reserved amount of a tracked site.
    pub fn reserved(&self, site: SiteId) -> Option<u32> {
        self.state
            .locations
            .values()
            .find_map(|reservations| reservations.sites.get(&site).copied())
    }

    /// Tracked sites of a location, in handle order.
    pub fn tracked_sites(&self, location: &LocationId) -> Vec<SiteId> {
        self.state
            .locations
            .get(location)
            .map(|reservations| reservations.sites.keys().copied().collect())
            .unwrap_or_default()
    }

    /// The agent's outstanding claim.
    pub fn record(&self, agent: AgentId) -> Option<&ReservationRecord> {
        self.state.agents.get(&agent)
    }

    /// Unreserved content of a tracked, live site.
    pub fn slack<W: World + ?Sized>(&self, world: &W, site: SiteId) -> Option<u32> {
        let reserved = self.reserved(site)?;
        let view = world.site(site)?;
        Some(view.content.saturating_sub(reserved))
    }

    // -------------------------------------------------------------------
    // Claims
    // -------------------------------------------------------------------

    /// Reserve `amount` at the closest candidate with enough slack.
    ///
    /// Candidates that are untracked, no longer resolve, lie in another
    /// location, or have `content - reserved < amount` are skipped. Ties on
    /// range go to the earlier candidate. An existing record of the agent
    /// is released first, so an agent never holds two claims.
    ///
    /// Returns `None` if no candidate qualifies or `amount` is zero.
    pub fn claim<W, N>(
        &mut self,
        world: &W,
        agent: &AgentView,
        candidates: &[SiteId],
        amount: u32,
        nodes: &mut N,
    ) -> Option<SiteId>
    where
        W: World + ?Sized,
        N: NodeOccupancy + ?Sized,
    {
        if amount == 0 {
            return None;
        }
        if self.state.agents.contains_key(&agent.id) {
            self.release(agent.id, nodes);
        }

        let eligible: Vec<_> = candidates
            .iter()
            .filter_map(|&site| {
                let reserved = self.reserved(site)?;
                let view = world.site(site)?;
                let slack = view.content.checked_sub(reserved)?;
                (slack >= amount).then_some(view)
            })
            .collect();
        let chosen = closest_by_range(&agent.position, &eligible, |site| &site.position)?;
        let (site, location) = (chosen.id, chosen.position.location.clone());

        let counter = self
            .state
            .locations
            .get_mut(&location)
            .and_then(|reservations| reservations.sites.get_mut(&site))?;
        *counter = counter.checked_add(amount)?;
        self.state.agents.insert(
            agent.id,
            ReservationRecord {
                location,
                target: ClaimTarget::Site(site),
                reserved: amount,
            },
        );
        debug!(agent_id = %agent.id, site = %site, amount, "Reserved site content");
        Some(site)
    }

    /// Record a harvesting-slot claim on an extraction node.
    ///
    /// The slot itself is taken by the caller from the occupancy tracker;
    /// the ledger only remembers it so that `release` and `validate` can
    /// hand it back. Returns `false` if the agent already holds a claim.
    pub fn record_node_claim(&mut self, agent: AgentId, location: LocationId, node: NodeId) -> bool {
        if self.state.agents.contains_key(&agent) {
            return false;
        }
        self.state.agents.insert(
            agent,
            ReservationRecord {
                location,
                target: ClaimTarget::Node(node),
                reserved: 0,
            },
        );
        true
    }

    /// Drop the agent's claim and give back what it held.
    ///
    /// A site claim decrements the site's counter if the site is still
    /// tracked; a node claim frees one harvesting slot. No-op for agents
    /// without a record.
    pub fn release<N>(&mut self, agent: AgentId, nodes: &mut N) -> Option<ReservationRecord>
    where
        N: NodeOccupancy + ?Sized,
    {
        let record = self.state.agents.remove(&agent)?;
        match record.target {
            ClaimTarget::Site(site) => {
                if let Some(counter) = self
                    .state
                    .locations
                    .get_mut(&record.location)
                    .and_then(|reservations| reservations.sites.get_mut(&site))
                {
                    *counter = counter.saturating_sub(record.reserved);
                }
            }
            ClaimTarget::Node(node) => {
                if !nodes.vacate(&record.location, node) {
                    debug!(agent_id = %agent, node = %node, "Released claim on untracked node");
                }
            }
        }
        Some(record)
    }

    // -------------------------------------------------------------------
    // Withdrawals
    // -------------------------------------------------------------------

    /// Withdraw only unreserved content from a tracked site.
    ///
    /// Hands the agent `min(max_amount, content - reserved, free cargo)`.
    /// Returns the amount moved (possibly zero). The agent's own claims are
    /// not touched: this is for agents that take whatever nobody reserved.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Exhausted`] if more is reserved than the site holds;
    ///   the site's claims are clamped to its content before returning.
    /// - [`LedgerError::Transfer`] if the world refuses the transfer;
    ///   [`LedgerError::needs_approach`] tells the caller to move closer.
    /// - [`LedgerError::UntrackedSite`], [`LedgerError::StaleSite`],
    ///   [`LedgerError::StaleAgent`] for unusable handles.
    pub fn withdraw_up_to<W>(
        &mut self,
        world: &mut W,
        agent: AgentId,
        site: SiteId,
        max_amount: u32,
    ) -> Result<u32, LedgerError>
    where
        W: World + ?Sized,
    {
        let reserved = self.reserved(site).ok_or(LedgerError::UntrackedSite(site))?;
        let view = world.site(site).ok_or(LedgerError::StaleSite(site))?;
        let Some(available) = view.content.checked_sub(reserved) else {
            warn!(
                site = %site,
                content = view.content,
                reserved,
                "Reservations exceed site content, clamping"
            );
            self.clamp_site(site, view.content);
            return Err(LedgerError::Exhausted {
                site,
                content: view.content,
                reserved,
            });
        };
        let free = world
            .agent(agent)
            .ok_or(LedgerError::StaleAgent(agent))?
            .free_capacity();

        let amount = max_amount.min(available).min(free);
        if amount == 0 {
            return Ok(0);
        }
        world.transfer_resource(agent, site, amount)?;
        Ok(amount)
    }

    /// Withdraw the agent's own reservation from its claimed site.
    ///
    /// Moves `min(reserved, free cargo)` and takes the moved amount off both
    /// the record and the site counter. The record itself stays in place
    /// until the agent reports itself full and calls `release`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NoReservation`] / [`LedgerError::NotASiteClaim`] if
    /// the agent holds no site claim, [`LedgerError::StaleAgent`] for a dead
    /// agent, and [`LedgerError::Transfer`] if the world refuses.
    pub fn withdraw_reserved<W>(&mut self, world: &mut W, agent: AgentId) -> Result<u32, LedgerError>
    where
        W: World + ?Sized,
    {
        let record = self
            .state
            .agents
            .get(&agent)
            .ok_or(LedgerError::NoReservation(agent))?;
        let ClaimTarget::Site(site) = record.target else {
            return Err(LedgerError::NotASiteClaim(agent));
        };
        let free = world
            .agent(agent)
            .ok_or(LedgerError::StaleAgent(agent))?
            .free_capacity();
        let amount = record.reserved.min(free);
        if amount == 0 {
            return Ok(0);
        }
        world.transfer_resource(agent, site, amount)?;

        if let Some(record) = self.state.agents.get_mut(&agent) {
            record.reserved = record.reserved.saturating_sub(amount);
            if let Some(counter) = self
                .state
                .locations
                .get_mut(&record.location)
                .and_then(|reservations| reservations.sites.get_mut(&site))
            {
                *counter = counter.saturating_sub(amount);
            }
        }
        Ok(amount)
    }

    // -------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------

    /// Start-of-cycle reconciliation against the live world.
    ///
    /// 1. Tracked sites that no longer resolve are dropped with their
    ///    counters.
    /// 2. Records of agents that no longer exist are released.
    /// 3. Records whose target is neither a tracked site nor a tracked
    ///    node are dropped.
    /// 4. Each site counter is reset to the sum of its records, then
    ///    clamped to live content by shrinking the largest claims first.
    ///    Claims shrunk to zero are dropped.
    ///
    /// Running it twice without a world change leaves the state unchanged.
    pub fn validate<W, N>(&mut self, world: &W, nodes: &mut N) -> ValidationReport
    where
        W: World + ?Sized,
        N: NodeOccupancy + ?Sized,
    {
        let mut report = ValidationReport::default();

        for (location, reservations) in &mut self.state.locations {
            let stale: Vec<SiteId> = reservations
                .sites
                .keys()
                .copied()
                .filter(|&site| world.site(site).is_none())
                .collect();
            for site in stale {
                reservations.sites.remove(&site);
                info!(location = %location, site = %site, "Dropped vanished site from ledger");
                report.dropped_sites.push(site);
            }
        }

        let agents: Vec<AgentId> = self.state.agents.keys().copied().collect();
        for agent in agents {
            if world.agent(agent).is_none() {
                self.release(agent, nodes);
                debug!(agent_id = %agent, "Released claim of vanished agent");
                report.released_agents.push(agent);
                continue;
            }
            let Some(record) = self.state.agents.get(&agent) else {
                continue;
            };
            let target_tracked = match record.target {
                ClaimTarget::Site(site) => self
                    .state
                    .locations
                    .get(&record.location)
                    .is_some_and(|reservations| reservations.sites.contains_key(&site)),
                ClaimTarget::Node(node) => nodes.is_tracked(&record.location, node),
            };
            if !target_tracked {
                debug!(agent_id = %agent, target = %record.target, "Dropped claim on untracked target");
                self.state.agents.remove(&agent);
                report.dropped_records.push(agent);
            }
        }

        let sites: Vec<(LocationId, SiteId)> = self
            .state
            .locations
            .iter()
            .flat_map(|(location, reservations)| {
                reservations
                    .sites
                    .keys()
                    .map(move |&site| (location.clone(), site))
            })
            .collect();
        for (location, site) in sites {
            let content = world.site(site).map_or(0, |view| view.content);
            if self.heal_site(&location, site, content) {
                report.healed_sites.push(site);
            }
        }

        report
    }

    /// Clamp the claims on one site to `content`.
    fn clamp_site(&mut self, site: SiteId, content: u32) {
        if let Some(location) = self.location_of(site).cloned() {
            self.heal_site(&location, site, content);
        }
    }

    /// Repair a site counter from its records and clamp it to `content`.
    /// Returns whether anything changed.
    fn heal_site(&mut self, location: &LocationId, site: SiteId, content: u32) -> bool {
        let mut claims: Vec<(AgentId, u32)> = self
            .state
            .agents
            .iter()
            .filter(|(_, record)| record.target == ClaimTarget::Site(site))
            .map(|(&agent, record)| (agent, record.reserved))
            .collect();
        let summed = claims
            .iter()
            .fold(0_u32, |acc, (_, reserved)| acc.saturating_add(*reserved));

        let Some(counter) = self
            .state
            .locations
            .get_mut(location)
            .and_then(|reservations| reservations.sites.get_mut(&site))
        else {
            return false;
        };
        let mut changed = false;
        if *counter != summed {
            warn!(site = %site, tracked = *counter, summed, "Reservation counter out of sync, repairing");
            *counter = summed;
            changed = true;
        }
        if summed <= content {
            return changed;
        }

        warn!(site = %site, reserved = summed, content, "Reservations exceed site content, shrinking claims");
        let mut excess = summed.saturating_sub(content);
        claims.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (agent, reserved) in claims {
            if excess == 0 {
                break;
            }
            let cut = reserved.min(excess);
            excess = excess.saturating_sub(cut);
            let remaining = reserved.saturating_sub(cut);
            if remaining == 0 {
                self.state.agents.remove(&agent);
            } else if let Some(record) = self.state.agents.get_mut(&agent) {
                record.reserved = remaining;
            }
        }
        *counter = content.min(summed);
        true
    }
}
