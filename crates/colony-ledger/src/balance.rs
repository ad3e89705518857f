//! Balance verification for the reservation ledger.
//!
//! After every ledger operation, each tracked site's counter must equal
//! the sum of the agent records that target it. This module checks that
//! invariant over a [`LedgerState`] snapshot; the cycle runner calls it at
//! the end of each cycle and logs any anomaly.

use std::collections::BTreeMap;

use colony_types::{ClaimTarget, SiteId};

use crate::ledger::LedgerState;

/// A site whose counter disagrees with its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteImbalance {
    /// Counter stored for the site.
    pub tracked: u32,
    /// Sum of the records targeting the site.
    pub summed: u32,
}

/// Details of a balance violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationAnomaly {
    /// Per-site mismatches.
    pub imbalances: BTreeMap<SiteId, SiteImbalance>,
    /// Site records pointing at untracked sites.
    pub orphaned_records: usize,
    /// Human-readable summary.
    pub message: String,
}

/// Result of a balance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceResult {
    /// Every tracked counter matches its records.
    Balanced,
    /// At least one counter or record is inconsistent.
    Anomaly(ReservationAnomaly),
}

impl BalanceResult {
    /// Whether the check passed.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Verify that every tracked site's counter equals the sum of its records.
pub fn verify_balance(state: &LedgerState) -> BalanceResult {
    let mut summed: BTreeMap<SiteId, u32> = BTreeMap::new();
    for record in state.agents.values() {
        if let ClaimTarget::Site(site) = record.target {
            let entry = summed.entry(site).or_insert(0);
            *entry = entry.saturating_add(record.reserved);
        }
    }

    let mut imbalances = BTreeMap::new();
    for reservations in state.locations.values() {
        for (&site, &tracked) in &reservations.sites {
            let sum = summed.remove(&site).unwrap_or(0);
            if sum != tracked {
                imbalances.insert(
                    site,
                    SiteImbalance {
                        tracked,
                        summed: sum,
                    },
                );
            }
        }
    }
    // Whatever is left in `summed` was claimed against sites no location tracks.
    let orphaned_records = summed.len();

    if imbalances.is_empty() && orphaned_records == 0 {
        return BalanceResult::Balanced;
    }
    let message = format!(
        "{} site(s) out of balance, {} orphaned site claim(s)",
        imbalances.len(),
        orphaned_records
    );
    BalanceResult::Anomaly(ReservationAnomaly {
        imbalances,
        orphaned_records,
        message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use colony_types::{AgentId, LocationId};

    use super::*;
    use crate::ledger::{LocationReservations, ReservationRecord};

    fn state_with(counter: u32, claims: &[u32]) -> (LedgerState, SiteId) {
        let site = SiteId::new();
        let location = LocationId::from("W1N1");
        let mut state = LedgerState::default();
        state.locations.insert(
            location.clone(),
            LocationReservations {
                sites: BTreeMap::from([(site, counter)]),
            },
        );
        for &reserved in claims {
            state.agents.insert(
                AgentId::new(),
                ReservationRecord {
                    location: location.clone(),
                    target: ClaimTarget::Site(site),
                    reserved,
                },
            );
        }
        (state, site)
    }

    #[test]
    fn empty_state_is_balanced() {
        assert!(verify_balance(&LedgerState::default()).is_balanced());
    }

    #[test]
    fn matching_sum_is_balanced() {
        let (state, _) = state_with(30, &[10, 20]);
        assert_eq!(verify_balance(&state), BalanceResult::Balanced);
    }

    #[test]
    fn mismatch_is_reported_per_site() {
        let (state, site) = state_with(25, &[10, 20]);
        let BalanceResult::Anomaly(anomaly) = verify_balance(&state) else {
            panic!("expected anomaly");
        };
        assert_eq!(
            anomaly.imbalances.get(&site),
            Some(&SiteImbalance {
                tracked: 25,
                summed: 30
            })
        );
        assert_eq!(anomaly.orphaned_records, 0);
    }

    #[test]
    fn claim_on_untracked_site_is_orphaned() {
        let (mut state, _) = state_with(0, &[]);
        state.agents.insert(
            AgentId::new(),
            ReservationRecord {
                location: LocationId::from("W1N1"),
                target: ClaimTarget::Site(SiteId::new()),
                reserved: 5,
            },
        );
        let BalanceResult::Anomaly(anomaly) = verify_balance(&state) else {
            panic!("expected anomaly");
        };
        assert_eq!(anomaly.orphaned_records, 1);
        assert!(anomaly.imbalances.is_empty());
    }
}
