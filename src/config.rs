//! Configuration module
//!
//! TOML-based persistent configuration with defaults for every key, so a
//! partial (or absent) file always yields a usable configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::support::ConfigError;

/// Root charge point configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargePointConfig {
    /// Transaction message delivery settings
    #[serde(default)]
    pub transactions: TransactionsConfig,

    /// Connector layout
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

/// Settings for transaction-critical message delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsConfig {
    /// Maximum delivery attempts for a queued transaction message
    /// (`TransactionMessageAttempts`)
    #[serde(default = "default_message_attempts")]
    pub message_attempts: u32,

    /// Delay between delivery retries, in seconds
    /// (`TransactionMessageRetryInterval`)
    #[serde(default = "default_message_retry_interval")]
    pub message_retry_interval_secs: u64,

    /// Whether a reservation on connector 0 may be consumed by a
    /// transaction on any connector (`ReserveConnectorZeroSupported`)
    #[serde(default)]
    pub reserve_connector_zero_supported: bool,
}

/// Connector layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorsConfig {
    /// Number of physical connectors (connector 0 is always added on top)
    #[serde(default = "default_connector_count")]
    pub count: u32,
}

impl TransactionsConfig {
    /// Retry interval as a [`Duration`].
    pub fn message_retry_interval(&self) -> Duration {
        Duration::from_secs(self.message_retry_interval_secs)
    }
}

impl ChargePointConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for ChargePointConfig {
    fn default() -> Self {
        Self {
            transactions: TransactionsConfig::default(),
            connectors: ConnectorsConfig::default(),
        }
    }
}

impl Default for TransactionsConfig {
    fn default() -> Self {
        Self {
            message_attempts: default_message_attempts(),
            message_retry_interval_secs: default_message_retry_interval(),
            reserve_connector_zero_supported: false,
        }
    }
}

impl Default for ConnectorsConfig {
    fn default() -> Self {
        Self {
            count: default_connector_count(),
        }
    }
}

// ── Default value helpers ──────────────────────────────────────

fn default_message_attempts() -> u32 {
    3
}
fn default_message_retry_interval() -> u64 {
    60
}
fn default_connector_count() -> u32 {
    1
}
