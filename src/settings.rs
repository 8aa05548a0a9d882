//! Settings loaded from a file or built in code.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LimitConfig, StrategyKind, TallyguardError};

/// Limiter settings as consumed from configuration files.
///
/// ```yaml
/// store_uri: redis://127.0.0.1:6379/0
/// strategy: sliding_window
/// max: 100
/// period_seconds: 1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Store URI, `redis://[:password@]host:port[/db]`.
    #[serde(default = "default_store_uri")]
    pub store_uri: String,

    /// Strategy name, one of the registered names.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Maximum actions per period.
    #[serde(default = "default_max")]
    pub max: u64,

    /// Period length in seconds.
    #[serde(default = "default_period_seconds")]
    pub period_seconds: u64,

    /// Store round-trip timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Key prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Number of pooled store connections.
    #[serde(default = "default_connection_count")]
    pub connection_count: usize,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            store_uri: default_store_uri(),
            strategy: default_strategy(),
            max: default_max(),
            period_seconds: default_period_seconds(),
            timeout_ms: default_timeout_ms(),
            prefix: default_prefix(),
            connection_count: default_connection_count(),
        }
    }
}

fn default_store_uri() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_strategy() -> String {
    "fixed_window".to_string()
}

fn default_max() -> u64 {
    100
}

fn default_period_seconds() -> u64 {
    1
}

fn default_timeout_ms() -> u64 {
    500
}

fn default_prefix() -> String {
    "tallyguard".to_string()
}

fn default_connection_count() -> usize {
    1
}

impl LimiterSettings {
    /// Parse settings from a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, TallyguardError> {
        serde_yaml::from_str(contents).map_err(|e| TallyguardError::InvalidConfig(e.to_string()))
    }

    /// Load settings from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TallyguardError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TallyguardError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Validated `max` / `period`.
    pub fn limit_config(&self) -> Result<LimitConfig, TallyguardError> {
        LimitConfig::new(self.max, self.period_seconds)
    }

    /// Validated strategy name.
    pub fn strategy_kind(&self) -> Result<StrategyKind, TallyguardError> {
        self.strategy.parse()
    }
}
