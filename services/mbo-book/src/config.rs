//! Service configuration
//!
//! Every section has defaults, so an empty TOML document is a valid config.
//! Values are validated after loading.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    pub reaper: ReaperConfig,
    pub channel: ChannelConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Sweep period in milliseconds.
    pub interval_ms: u64,
    /// Sweeps a flagged order stays visible before it is purged.
    pub grace_cycles: u32,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval_ms: 250,
            grace_cycles: 1,
        }
    }
}

impl ReaperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Enqueue the host's full-book snapshot ahead of the first order batch.
    pub prime_with_snapshot: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            prime_with_snapshot: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Upper bound on ticks walked by one range copy or aggregate scan.
    pub max_range_levels: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            max_range_levels: 2000,
        }
    }
}

impl BookConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: BookConfig = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reaper.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "reaper.interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reaper.grace_cycles == 0 {
            return Err(ConfigError::Invalid {
                field: "reaper.grace_cycles",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.view.max_range_levels == 0 {
            return Err(ConfigError::Invalid {
                field: "view.max_range_levels",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
