//! # Engine Configuration
//!
//! Configuration for refresh retries, balance polling, catalog filtering and
//! the publisher.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BOOST_REFRESH_MAX_ATTEMPTS=5                                       │
//! │     BOOST_BALANCE_POLL_INTERVAL_MS=2000                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/boost-client/sync.toml (Linux)                           │
//! │     ~/Library/Application Support/com.boost.client/sync.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [refresh]
//! max_attempts = 3
//! initial_delay_ms = 1000
//! multiplier = 4.0
//! max_delay_secs = 60
//!
//! [balance_poll]
//! max_attempts = 10
//! interval_ms = 2000
//!
//! [catalog]
//! transaction_class = "speed-boost"
//! distinguishers = ["1hr", "2hr", "3hr"]
//!
//! [publisher]
//! channel_capacity = 64
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use boost_core::{DEFAULT_TARGET_DISTINGUISHERS, SPEED_BOOST_CLASS};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Refresh Settings
// =============================================================================

/// Retry settings for the general (tunnel-connected) refresh.
///
/// Attempt `n` waits `initial_delay_ms * multiplier^(n-1)` before attempt
/// `n + 1`, capped at `max_delay_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSettings {
    #[serde(default = "default_refresh_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

fn default_refresh_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_multiplier() -> f64 {
    4.0
}
fn default_max_delay() -> u64 {
    60
}

impl Default for RefreshSettings {
    fn default() -> Self {
        RefreshSettings {
            max_attempts: default_refresh_attempts(),
            initial_delay_ms: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay_secs: default_max_delay(),
        }
    }
}

// =============================================================================
// Balance Poll Settings
// =============================================================================

/// Settings for polling until the balance moves (after a rewarded activity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePollSettings {
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

fn default_poll_attempts() -> u32 {
    10
}
fn default_poll_interval() -> u64 {
    2000
}

impl Default for BalancePollSettings {
    fn default() -> Self {
        BalancePollSettings {
            max_attempts: default_poll_attempts(),
            interval_ms: default_poll_interval(),
        }
    }
}

// =============================================================================
// Catalog Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Transaction class of every Speed Boost purchase.
    #[serde(default = "default_transaction_class")]
    pub transaction_class: String,

    /// Distinguishers offered for sale, in display order.
    #[serde(default = "default_distinguishers")]
    pub distinguishers: Vec<String>,
}

fn default_transaction_class() -> String {
    SPEED_BOOST_CLASS.to_string()
}

fn default_distinguishers() -> Vec<String> {
    DEFAULT_TARGET_DISTINGUISHERS
        .iter()
        .map(|d| d.to_string())
        .collect()
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            transaction_class: default_transaction_class(),
            distinguishers: default_distinguishers(),
        }
    }
}

// =============================================================================
// Publisher Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherSettings {
    /// Buffer size of the engine event channel. An event subscriber that
    /// falls further behind than this loses the oldest unread events.
    /// Model and reward-token subscriptions are not bounded by it.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for PublisherSettings {
    fn default() -> Self {
        PublisherSettings {
            channel_capacity: default_channel_capacity(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoostConfig {
    #[serde(default)]
    pub refresh: RefreshSettings,

    #[serde(default)]
    pub balance_poll: BalancePollSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub publisher: PublisherSettings,
}

impl BoostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading boost config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load boost config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Boost config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.refresh.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "refresh.max_attempts must be greater than 0".into(),
            ));
        }

        if self.refresh.multiplier.is_nan() || self.refresh.multiplier < 1.0 {
            return Err(SyncError::InvalidConfig(format!(
                "refresh.multiplier must be at least 1.0, got {}",
                self.refresh.multiplier
            )));
        }

        if self.balance_poll.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "balance_poll.max_attempts must be greater than 0".into(),
            ));
        }

        if self.catalog.transaction_class.is_empty() {
            return Err(SyncError::InvalidConfig(
                "catalog.transaction_class must not be empty".into(),
            ));
        }

        if self.publisher.channel_capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "publisher.channel_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `BOOST_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are logged
    /// and ignored.
    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(key: &str, raw: String) -> Option<T> {
            match raw.parse::<T>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key, value = %raw, "Ignoring unparseable config override");
                    None
                }
            }
        }

        if let Some(v) = lookup("BOOST_REFRESH_MAX_ATTEMPTS")
            .and_then(|raw| parsed("BOOST_REFRESH_MAX_ATTEMPTS", raw))
        {
            debug!(max_attempts = v, "Overriding refresh attempts from environment");
            self.refresh.max_attempts = v;
        }

        if let Some(v) = lookup("BOOST_REFRESH_INITIAL_DELAY_MS")
            .and_then(|raw| parsed("BOOST_REFRESH_INITIAL_DELAY_MS", raw))
        {
            self.refresh.initial_delay_ms = v;
        }

        if let Some(v) = lookup("BOOST_REFRESH_MAX_DELAY_SECS")
            .and_then(|raw| parsed("BOOST_REFRESH_MAX_DELAY_SECS", raw))
        {
            self.refresh.max_delay_secs = v;
        }

        if let Some(v) = lookup("BOOST_BALANCE_POLL_MAX_ATTEMPTS")
            .and_then(|raw| parsed("BOOST_BALANCE_POLL_MAX_ATTEMPTS", raw))
        {
            self.balance_poll.max_attempts = v;
        }

        if let Some(v) = lookup("BOOST_BALANCE_POLL_INTERVAL_MS")
            .and_then(|raw| parsed("BOOST_BALANCE_POLL_INTERVAL_MS", raw))
        {
            debug!(interval_ms = v, "Overriding balance poll interval from environment");
            self.balance_poll.interval_ms = v;
        }

        if let Some(class) = lookup("BOOST_TRANSACTION_CLASS") {
            self.catalog.transaction_class = class;
        }

        // Comma-separated, e.g. "1hr,2hr,3hr"
        if let Some(list) = lookup("BOOST_DISTINGUISHERS") {
            self.catalog.distinguishers = list
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "boost", "client")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = BoostConfig::default();
        assert_eq!(config.refresh.multiplier, 4.0);
        assert_eq!(config.balance_poll.max_attempts, 10);
        assert_eq!(config.catalog.transaction_class, SPEED_BOOST_CLASS);
        assert_eq!(config.catalog.distinguishers.len(), 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = BoostConfig::default();

        config.refresh.max_attempts = 0;
        assert!(config.validate().unwrap_err().is_config_error());

        config.refresh.max_attempts = 3;
        config.refresh.multiplier = 0.5;
        assert!(config.validate().is_err());

        config.refresh.multiplier = 4.0;
        config.catalog.transaction_class = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BOOST_REFRESH_MAX_ATTEMPTS", "7"),
            ("BOOST_BALANCE_POLL_INTERVAL_MS", "not-a-number"),
            ("BOOST_DISTINGUISHERS", "1hr, 24hr ,"),
        ]);

        let mut config = BoostConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.refresh.max_attempts, 7);
        assert_eq!(config.balance_poll.interval_ms, 2000);
        assert_eq!(config.catalog.distinguishers, vec!["1hr", "24hr"]);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: BoostConfig = toml::from_str(
            r#"
            [refresh]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.refresh.max_attempts, 5);
        assert_eq!(config.refresh.initial_delay_ms, 1000);
        assert_eq!(config.publisher.channel_capacity, 64);
    }

    #[test]
    fn test_toml_serialization() {
        let config = BoostConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[refresh]"));
        assert!(toml_str.contains("[catalog]"));
    }
}
