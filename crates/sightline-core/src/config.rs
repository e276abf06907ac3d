//! Configuration loading and typed config structures for Sightline.
//!
//! The canonical configuration lives in `sightline-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

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

    /// A value parsed but is unusable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `sightline-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SightlineConfig {
    /// Known-list refresh scheduler settings.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Gameplay policy switches.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Attack-stance tracking settings.
    #[serde(default)]
    pub engagement: EngagementConfig,

    /// World partition and demo population.
    #[serde(default)]
    pub world: WorldConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Engine binary run settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SightlineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// The `SIGHTLINE_LOG` environment variable overrides `logging.level`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.logging.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the services cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.refresh.interval_ms, "refresh.interval_ms"),
            (self.engagement.sweep_interval_ms, "engagement.sweep_interval_ms"),
            (self.engagement.stance_timeout_ms, "engagement.stance_timeout_ms"),
            (self.engine.activity_interval_ms, "engine.activity_interval_ms"),
            (u64::from(self.world.width), "world.width"),
            (u64::from(self.world.height), "world.height"),
            (u64::from(self.world.cell_size), "world.cell_size"),
        ];
        for (value, field) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    reason: format!("{field} must be at least 1"),
                });
            }
        }
        Ok(())
    }
}

/// Known-list refresh scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshConfig {
    /// Milliseconds between refresh cycles.
    #[serde(default = "default_refresh_interval_ms")]
    pub interval_ms: u64,

    /// Number of ordinary cycles between two full-update cycles.
    #[serde(default = "default_full_update_period")]
    pub full_update_period: u32,
}

impl RefreshConfig {
    /// Refresh interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_refresh_interval_ms(),
            full_update_period: default_full_update_period(),
        }
    }
}

/// Gameplay policy switches consulted by the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PolicyConfig {
    /// Guards engage aggressive monsters, not only hostile players.
    #[serde(default)]
    pub guard_attack_aggro_mob: bool,
}

/// Attack-stance tracking settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngagementConfig {
    /// Milliseconds between eviction sweeps.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Milliseconds without a hostile action before the stance ends.
    #[serde(default = "default_stance_timeout_ms")]
    pub stance_timeout_ms: u64,
}

impl EngagementConfig {
    /// Sweep interval as a [`Duration`].
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Stance timeout as a [`Duration`].
    pub const fn stance_timeout(&self) -> Duration {
        Duration::from_millis(self.stance_timeout_ms)
    }
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
            stance_timeout_ms: default_stance_timeout_ms(),
        }
    }
}

/// World partition and demo population settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Grid cells along x.
    #[serde(default = "default_grid_width")]
    pub width: u32,

    /// Grid cells along y.
    #[serde(default = "default_grid_height")]
    pub height: u32,

    /// Side length of one cell in world units.
    #[serde(default = "default_cell_size")]
    pub cell_size: u32,

    /// Random seed for the demo population.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Players to spawn.
    #[serde(default = "default_players")]
    pub players: u32,

    /// Guards to spawn.
    #[serde(default = "default_guards")]
    pub guards: u32,

    /// Monsters to spawn.
    #[serde(default = "default_monsters")]
    pub monsters: u32,

    /// Harmless NPCs to spawn.
    #[serde(default = "default_npcs")]
    pub npcs: u32,

    /// Ground items to spawn.
    #[serde(default = "default_items")]
    pub items: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_grid_width(),
            height: default_grid_height(),
            cell_size: default_cell_size(),
            seed: default_seed(),
            players: default_players(),
            guards: default_guards(),
            monsters: default_monsters(),
            npcs: default_npcs(),
            items: default_items(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    /// Override the level with `SIGHTLINE_LOG` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SIGHTLINE_LOG") {
            self.level = val;
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Engine binary run settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Stop after this many seconds (0 = run until Ctrl-C).
    #[serde(default)]
    pub max_runtime_seconds: u64,

    /// Milliseconds between foreground activity steps.
    #[serde(default = "default_activity_interval_ms")]
    pub activity_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_runtime_seconds: 0,
            activity_interval_ms: default_activity_interval_ms(),
        }
    }
}

const fn default_refresh_interval_ms() -> u64 {
    750
}

const fn default_full_update_period() -> u32 {
    100
}

const fn default_sweep_interval_ms() -> u64 {
    1_000
}

const fn default_stance_timeout_ms() -> u64 {
    15_000
}

const fn default_grid_width() -> u32 {
    32
}

const fn default_grid_height() -> u32 {
    32
}

const fn default_cell_size() -> u32 {
    2_048
}

const fn default_seed() -> u64 {
    42
}

const fn default_players() -> u32 {
    20
}

const fn default_guards() -> u32 {
    30
}

const fn default_monsters() -> u32 {
    200
}

const fn default_npcs() -> u32 {
    100
}

const fn default_items() -> u32 {
    50
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_activity_interval_ms() -> u64 {
    500
}
