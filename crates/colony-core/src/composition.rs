//! Capability profile composition.
//!
//! Given capability ratios, a mobility mode, an optional cost cap, and the
//! budget a facility can hold, compute the largest whole multiple `x` of
//! the ratio set that fits, then append the mobility units the mode needs.
//! The calculation is closed-form; there is no search.
//!
//! With `usable = min(cap, budget)`, `sum1 = Σ cost·ratio`, `sum2 = Σ ratio`:
//!
//! | Mode         | `x`                                        | mobility units   |
//! |--------------|--------------------------------------------|------------------|
//! | `Stationary` | `usable / (sum1 + cost(Move))`             | 1                |
//! | `RoadMix`    | `usable / (sum1 + sum2·cost(Move)/2)`      | `ceil(x·sum2/2)` |
//! | `OffRoad`    | `usable / (sum1 + sum2·cost(Move))`        | `x·sum2`         |
//!
//! `x == 0` yields an empty profile, which callers treat as "cannot afford".

use colony_types::{Capability, MobilityMode};
use serde::{Deserialize, Serialize};

/// One `(capability, ratio)` pair of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioPart {
    /// Capability to scale.
    pub capability: Capability,
    /// Units of the capability per multiple.
    pub ratio: u32,
}

impl RatioPart {
    /// Shorthand constructor.
    pub const fn new(capability: Capability, ratio: u32) -> Self {
        Self { capability, ratio }
    }
}

/// Input to [`compose`], minus the budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionSpec {
    /// Ratio pairs. Pairs with a zero ratio are ignored.
    pub ratios: Vec<RatioPart>,
    /// How mobility units scale with the rest of the profile.
    pub mobility: MobilityMode,
    /// Optional cap on the total cost.
    #[serde(default)]
    pub max_cost: Option<u32>,
}

/// A requested profile: either spelled out or derived from ratios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileRequest {
    /// A fixed unit list.
    Explicit {
        /// Units in creation order.
        units: Vec<Capability>,
    },
    /// Ratios composed against the location's budget capacity.
    Ratio(CompositionSpec),
}

impl ProfileRequest {
    /// Resolve to a concrete unit list. Ratio requests compose against
    /// `budget`; explicit ones are returned as-is.
    pub fn resolve(&self, budget: u32) -> Vec<Capability> {
        match self {
            Self::Explicit { units } => units.clone(),
            Self::Ratio(spec) => compose(spec, budget),
        }
    }
}

/// Compose a profile from ratios under a budget.
///
/// Capability units come first, in ratio order, followed by the mobility
/// units. Returns an empty profile when not even one multiple fits.
pub fn compose(spec: &CompositionSpec, budget: u32) -> Vec<Capability> {
    let parts: Vec<RatioPart> = spec
        .ratios
        .iter()
        .copied()
        .filter(|part| part.ratio > 0)
        .collect();
    if parts.is_empty() {
        return Vec::new();
    }

    let usable = spec.max_cost.map_or(budget, |cap| cap.min(budget));
    let sum1 = parts.iter().fold(0_u64, |acc, part| {
        acc.saturating_add(u64::from(part.capability.cost()).saturating_mul(u64::from(part.ratio)))
    });
    let sum2 = parts
        .iter()
        .fold(0_u64, |acc, part| acc.saturating_add(u64::from(part.ratio)));
    let mobility_cost = u64::from(Capability::Move.cost());
    let usable = u64::from(usable);

    let (x, mobility_units) = match spec.mobility {
        MobilityMode::Stationary => {
            let x = usable
                .checked_div(sum1.saturating_add(mobility_cost))
                .unwrap_or(0);
            (x, 1)
        }
        MobilityMode::RoadMix => {
            // Doubled on both sides to keep the half-rate mobility cost integral.
            let per_multiple = sum1
                .saturating_mul(2)
                .saturating_add(sum2.saturating_mul(mobility_cost));
            let x = usable
                .saturating_mul(2)
                .checked_div(per_multiple)
                .unwrap_or(0);
            (x, x.saturating_mul(sum2).div_ceil(2))
        }
        MobilityMode::OffRoad => {
            let per_multiple = sum1.saturating_add(sum2.saturating_mul(mobility_cost));
            let x = usable.checked_div(per_multiple).unwrap_or(0);
            (x, x.saturating_mul(sum2))
        }
    };
    if x == 0 {
        return Vec::new();
    }

    let mut profile = Vec::new();
    for part in &parts {
        let count = usize::try_from(u64::from(part.ratio).saturating_mul(x)).unwrap_or(0);
        profile.extend(std::iter::repeat_n(part.capability, count));
    }
    let mobility_units = usize::try_from(mobility_units).unwrap_or(0);
    profile.extend(std::iter::repeat_n(Capability::Move, mobility_units));
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(profile: &[Capability], capability: Capability) -> usize {
        profile.iter().filter(|unit| **unit == capability).count()
    }

    #[test]
    fn stationary_single_ratio() {
        let spec = CompositionSpec {
            ratios: vec![RatioPart::new(Capability::Work, 1)],
            mobility: MobilityMode::Stationary,
            max_cost: None,
        };
        assert_eq!(
            compose(&spec, 300),
            vec![Capability::Work, Capability::Work, Capability::Move]
        );
    }

    #[test]
    fn road_mix_rounds_mobility_up() {
        let spec = CompositionSpec {
            ratios: vec![
                RatioPart::new(Capability::Work, 2),
                RatioPart::new(Capability::Carry, 1),
            ],
            mobility: MobilityMode::RoadMix,
            max_cost: None,
        };
        let profile = compose(&spec, 850);
        assert_eq!(count(&profile, Capability::Work), 4);
        assert_eq!(count(&profile, Capability::Carry), 2);
        assert_eq!(count(&profile, Capability::Move), 3);
        assert!(Capability::profile_cost(&profile) <= 850);
        // Mobility comes last.
        assert_eq!(profile.last(), Some(&Capability::Move));
        assert_eq!(profile.first(), Some(&Capability::Work));

        // One more multiple would not fit.
        let bigger = compose(&spec, 1300);
        assert!(Capability::profile_cost(&bigger) > 850);
    }

    #[test]
    fn off_road_pairs_every_unit_with_mobility() {
        let spec = CompositionSpec {
            ratios: vec![RatioPart::new(Capability::Carry, 2)],
            mobility: MobilityMode::OffRoad,
            max_cost: None,
        };
        // 2 carry + 2 move = 200 per multiple.
        let profile = compose(&spec, 650);
        assert_eq!(count(&profile, Capability::Carry), 6);
        assert_eq!(count(&profile, Capability::Move), 6);
    }

    #[test]
    fn cap_limits_below_budget() {
        let spec = CompositionSpec {
            ratios: vec![RatioPart::new(Capability::Carry, 1)],
            mobility: MobilityMode::Stationary,
            max_cost: Some(850),
        };
        let profile = compose(&spec, 5000);
        // x = 850 / 100 = 8.
        assert_eq!(count(&profile, Capability::Carry), 8);
        assert_eq!(count(&profile, Capability::Move), 1);
    }

    #[test]
    fn cap_above_budget_is_ignored() {
        let spec = CompositionSpec {
            ratios: vec![RatioPart::new(Capability::Work, 1)],
            mobility: MobilityMode::Stationary,
            max_cost: Some(10_000),
        };
        assert_eq!(compose(&spec, 300).len(), 3);
    }

    #[test]
    fn unaffordable_is_empty() {
        let spec = CompositionSpec {
            ratios: vec![RatioPart::new(Capability::Claim, 1)],
            mobility: MobilityMode::OffRoad,
            max_cost: None,
        };
        assert!(compose(&spec, 600).is_empty());
    }

    #[test]
    fn zero_ratios_are_ignored() {
        let spec = CompositionSpec {
            ratios: vec![
                RatioPart::new(Capability::Work, 0),
                RatioPart::new(Capability::Carry, 0),
            ],
            mobility: MobilityMode::Stationary,
            max_cost: None,
        };
        assert!(compose(&spec, 10_000).is_empty());
    }

    #[test]
    fn explicit_request_resolves_verbatim() {
        let request = ProfileRequest::Explicit {
            units: vec![Capability::Claim, Capability::Move],
        };
        assert_eq!(request.resolve(0), vec![Capability::Claim, Capability::Move]);
    }
}
