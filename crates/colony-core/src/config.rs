//! Configuration loading and typed config structures for the colony core.
//!
//! The canonical configuration lives in `colony-config.yaml` at the project
//! root. Every field has a default, so an empty file (or no file) yields a
//! working setup for the starting colony.

use std::path::{Path, PathBuf};

use colony_types::{Capability, LocationId, MobilityMode, Priority, Role};
use serde::Deserialize;

use crate::composition::{CompositionSpec, ProfileRequest, RatioPart};

/// Environment variable overriding `state.path`.
pub const STATE_PATH_ENV: &str = "COLONY_STATE_PATH";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level colony configuration, mirroring `colony-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ColonyConfig {
    /// Cycle pacing.
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Production scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Haul task profiles.
    #[serde(default)]
    pub haul: HaulConfig,

    /// Dedicated harvester settings.
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Persistent state location.
    #[serde(default)]
    pub state: StateConfig,
}

impl ColonyConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `COLONY_STATE_PATH` overrides `state.path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.state.apply_env_overrides();
        Ok(config)
    }
}

/// Cycle pacing for the engine binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CycleConfig {
    /// Real-time milliseconds between cycles.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Cycles to run before exiting; 0 runs until interrupted.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_cycles: default_max_cycles(),
        }
    }
}

/// Production scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Log a queue summary every N cycles.
    #[serde(default = "default_summary_interval_cycles")]
    pub summary_interval_cycles: u64,

    /// Locations whose facility serves production requests.
    #[serde(default = "default_scheduler_locations")]
    pub locations: Vec<LocationId>,

    /// Standing headcount per role in every served location.
    #[serde(default = "default_role_targets")]
    pub targets: Vec<RoleTarget>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            summary_interval_cycles: default_summary_interval_cycles(),
            locations: default_scheduler_locations(),
            targets: default_role_targets(),
        }
    }
}

/// Keep `count` agents of `role` alive in each served location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleTarget {
    /// Role to maintain.
    pub role: Role,
    /// Desired number of live agents.
    pub count: u32,
    /// Profile requested for each missing agent.
    pub profile: ProfileRequest,
    /// Priority of the requests.
    #[serde(default)]
    pub priority: Priority,
}

/// Haul task profile configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HaulConfig {
    /// Profile for tasks whose source and sink are adjacent.
    #[serde(default = "default_adjacent_profile")]
    pub adjacent_profile: ProfileRequest,

    /// Profile for tasks whose source and sink are apart.
    #[serde(default = "default_distant_profile")]
    pub distant_profile: ProfileRequest,

    /// Priority given to tasks that do not carry one yet.
    #[serde(default)]
    pub default_priority: Priority,
}

impl Default for HaulConfig {
    fn default() -> Self {
        Self {
            adjacent_profile: default_adjacent_profile(),
            distant_profile: default_distant_profile(),
            default_priority: Priority::DEFAULT,
        }
    }
}

/// Dedicated harvester configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HarvestConfig {
    /// Profile requested for a node without a harvester.
    #[serde(default = "default_harvest_profile")]
    pub profile: ProfileRequest,

    /// Priority of harvester requests.
    #[serde(default = "default_harvest_priority")]
    pub priority: Priority,

    /// Agents may claim extraction slots directly when the location's
    /// health state is at or below this bucket.
    #[serde(default = "default_enable_below_health")]
    pub enable_below_health: u8,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            profile: default_harvest_profile(),
            priority: default_harvest_priority(),
            enable_below_health: default_enable_below_health(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Persistent state configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateConfig {
    /// JSON file holding the colony state between runs.
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl StateConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(STATE_PATH_ENV) {
            self.path = PathBuf::from(val);
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    500
}

const fn default_max_cycles() -> u64 {
    100
}

const fn default_summary_interval_cycles() -> u64 {
    10
}

fn default_scheduler_locations() -> Vec<LocationId> {
    vec![LocationId::from("W1N1")]
}

fn default_role_targets() -> Vec<RoleTarget> {
    vec![
        RoleTarget {
            role: Role::Worker,
            count: 1,
            profile: ProfileRequest::Explicit {
                units: vec![
                    Capability::Work,
                    Capability::Work,
                    Capability::Carry,
                    Capability::Move,
                ],
            },
            priority: Priority::HIGHEST,
        },
        RoleTarget {
            role: Role::Upgrader,
            count: 2,
            profile: ProfileRequest::Ratio(CompositionSpec {
                ratios: vec![
                    RatioPart::new(Capability::Work, 2),
                    RatioPart::new(Capability::Carry, 1),
                ],
                mobility: MobilityMode::RoadMix,
                max_cost: None,
            }),
            priority: Priority::LOWEST,
        },
    ]
}

fn default_adjacent_profile() -> ProfileRequest {
    ProfileRequest::Ratio(CompositionSpec {
        ratios: vec![RatioPart::new(Capability::Carry, 1)],
        mobility: MobilityMode::Stationary,
        max_cost: Some(850),
    })
}

fn default_distant_profile() -> ProfileRequest {
    let mut units = vec![Capability::Carry; 14];
    units.extend([Capability::Move; 7]);
    ProfileRequest::Explicit { units }
}

fn default_harvest_profile() -> ProfileRequest {
    let mut units = vec![Capability::Work; 7];
    units.extend([Capability::Carry, Capability::Move]);
    ProfileRequest::Explicit { units }
}

const fn default_harvest_priority() -> Priority {
    Priority::ELEVATED
}

const fn default_enable_below_health() -> u8 {
    1
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_state_path() -> PathBuf {
    PathBuf::from("colony-state.json")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ColonyConfig::default();
        assert_eq!(config.cycle.tick_interval_ms, 500);
        assert_eq!(config.scheduler.summary_interval_cycles, 10);
        assert_eq!(config.haul.default_priority, Priority::DEFAULT);
        assert_eq!(config.harvest.priority, Priority::ELEVATED);
        assert_eq!(config.harvest.profile.resolve(0).len(), 9);
        assert_eq!(config.haul.distant_profile.resolve(0).len(), 21);
        assert_eq!(config.scheduler.targets.len(), 2);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
cycle:
  tick_interval_ms: 100
  max_cycles: 5

scheduler:
  summary_interval_cycles: 3
  locations:
    - E68S3
  targets:
    - role: conqueror
      count: 1
      profile:
        kind: explicit
        units: [Claim, Move]

haul:
  adjacent_profile:
    kind: ratio
    ratios:
      - capability: Carry
        ratio: 2
    mobility: RoadMix
    max_cost: 600
  distant_profile:
    kind: explicit
    units: [Carry, Carry, Move]
  default_priority: 1

harvest:
  profile:
    kind: explicit
    units: [Work, Work, Carry, Move]
  priority: 4
  enable_below_health: 2

logging:
  level: debug
";
        let config = ColonyConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.cycle.max_cycles, 5);
        assert_eq!(config.scheduler.locations, vec![LocationId::from("E68S3")]);
        let target = config.scheduler.targets.first().unwrap();
        assert_eq!(target.role, Role::Conqueror);
        assert_eq!(target.priority, Priority::DEFAULT);
        assert_eq!(config.haul.default_priority, Priority::LOWEST);
        assert_eq!(
            config.haul.distant_profile,
            ProfileRequest::Explicit {
                units: vec![Capability::Carry, Capability::Carry, Capability::Move]
            }
        );
        assert!(matches!(
            config.haul.adjacent_profile,
            ProfileRequest::Ratio(CompositionSpec {
                mobility: MobilityMode::RoadMix,
                max_cost: Some(600),
                ..
            })
        ));
        assert_eq!(config.harvest.priority, Priority::HIGHEST);
        assert_eq!(config.harvest.enable_below_health, 2);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = ColonyConfig::parse("cycle:\n  max_cycles: 7\n");
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();
        assert_eq!(config.cycle.max_cycles, 7);
        assert_eq!(config.cycle.tick_interval_ms, 500);
        assert_eq!(config.harvest.enable_below_health, 1);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(ColonyConfig::parse("").is_ok());
    }

    #[test]
    fn out_of_range_priority_is_rejected() {
        assert!(ColonyConfig::parse("harvest:\n  priority: 9\n").is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("colony-config.yaml");
        if path.exists() {
            let config = ColonyConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
