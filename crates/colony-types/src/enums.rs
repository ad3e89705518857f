//! Enumeration types for the colony scheduling core.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// An atomic functional building block of an agent's profile.
///
/// Every capability unit has a fixed creation cost that is charged against
/// the facility budget when the agent is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Mobility unit. Offsets the fatigue produced by every other unit.
    Move,
    /// Extraction and construction unit.
    Work,
    /// Carrying unit, adds hauling capacity.
    Carry,
    /// Melee combat unit.
    Attack,
    /// Ranged combat unit.
    RangedAttack,
    /// Cheap hit-point padding.
    Tough,
    /// Healing unit.
    Heal,
    /// Region-claiming unit.
    Claim,
}

impl Capability {
    /// Creation cost of one unit of this capability.
    pub const fn cost(self) -> u32 {
        match self {
            Self::Move | Self::Carry => 50,
            Self::Work => 100,
            Self::Attack => 80,
            Self::RangedAttack => 150,
            Self::Tough => 10,
            Self::Heal => 250,
            Self::Claim => 600,
        }
    }

    /// Total creation cost of a profile.
    pub fn profile_cost(profile: &[Self]) -> u32 {
        profile
            .iter()
            .fold(0_u32, |acc, unit| acc.saturating_add(unit.cost()))
    }
}

// ---------------------------------------------------------------------------
// Mobility
// ---------------------------------------------------------------------------

/// How much mobility a composed profile needs relative to its other units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MobilityMode {
    /// A single mobility unit regardless of scale; the agent parks and works.
    Stationary,
    /// One mobility unit per two other units; enough on roads.
    RoadMix,
    /// One mobility unit per other unit; full speed on any terrain.
    OffRoad,
}

// ---------------------------------------------------------------------------
// Priority tiers
// ---------------------------------------------------------------------------

/// Production priority tier, 1 (lowest) through 4 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Lowest tier.
    pub const LOWEST: Self = Self(1);
    /// Default tier for requests that do not specify one.
    pub const DEFAULT: Self = Self(2);
    /// Elevated tier.
    pub const ELEVATED: Self = Self(3);
    /// Highest tier.
    pub const HIGHEST: Self = Self(4);

    /// All tiers in drain order, highest first.
    pub const DRAIN_ORDER: [Self; 4] = [Self::HIGHEST, Self::ELEVATED, Self::DEFAULT, Self::LOWEST];

    /// Build a tier from its raw value, or `None` if outside `1..=4`.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw >= 1 && raw <= 4 {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Build a tier from a raw value, falling back to [`Priority::DEFAULT`].
    pub const fn or_default(raw: u8) -> Self {
        match Self::new(raw) {
            Some(priority) => priority,
            None => Self::DEFAULT,
        }
    }

    /// Raw tier value.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Zero-based index into a four-slot tier array.
    pub fn index(self) -> usize {
        // 1..=4 maps to 0..=3; the constructor guarantees the lower bound.
        usize::from(self.0).saturating_sub(1)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| format!("priority {raw} outside 1..=4"))
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl core::fmt::Display for Priority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Role tag carried by a production request and by the agent it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Parks on an extraction node and fills its container.
    ContainerHarvester,
    /// Hauls resource from a source site to a sink site.
    Transporter,
    /// Feeds the region's controller.
    Upgrader,
    /// General builder / repairer / filler.
    Worker,
    /// Claims or reserves neighbouring regions.
    Conqueror,
}

impl Role {
    /// Stable lowercase tag used in agent names and log lines.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::ContainerHarvester => "containerHarvester",
            Self::Transporter => "transporter",
            Self::Upgrader => "upgrader",
            Self::Worker => "worker",
            Self::Conqueror => "conqueror",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// Sites and terrain
// ---------------------------------------------------------------------------

/// Kind of a stationary resource site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteKind {
    /// Small drop-off next to an extraction node.
    Container,
    /// Large central store.
    Storage,
    /// Remote transfer endpoint.
    Link,
}

/// Terrain of a single map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    /// Walkable at normal speed.
    Plain,
    /// Walkable at reduced speed.
    Swamp,
    /// Permanently blocked.
    Wall,
}

impl Terrain {
    /// Whether agents can stand on this cell.
    pub const fn is_walkable(self) -> bool {
        !matches!(self, Self::Wall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_cost_sums_units() {
        let profile = [Capability::Work, Capability::Work, Capability::Move];
        assert_eq!(Capability::profile_cost(&profile), 250);
    }

    #[test]
    fn priority_out_of_range_falls_back_to_default() {
        assert_eq!(Priority::or_default(0), Priority::DEFAULT);
        assert_eq!(Priority::or_default(5), Priority::DEFAULT);
        assert_eq!(Priority::or_default(4), Priority::HIGHEST);
        assert!(Priority::new(9).is_none());
    }

    #[test]
    fn priority_index_is_zero_based() {
        assert_eq!(Priority::LOWEST.index(), 0);
        assert_eq!(Priority::HIGHEST.index(), 3);
    }

    #[test]
    fn priority_rejects_invalid_json() {
        let parsed: Result<Priority, _> = serde_json::from_str("7");
        assert!(parsed.is_err());
        let parsed: Result<Priority, _> = serde_json::from_str("3");
        assert_eq!(parsed.ok(), Some(Priority::ELEVATED));
    }

    #[test]
    fn role_tag_matches_serde_name() {
        let json = serde_json::to_string(&Role::ContainerHarvester).ok();
        assert_eq!(json.as_deref(), Some("\"containerHarvester\""));
    }
}
