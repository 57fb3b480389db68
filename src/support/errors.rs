use thiserror::Error;

/// Persistence errors.
///
/// A store failure is fatal to the operation that triggered it: a
/// transaction must not appear to have started or stopped if its record
/// could not be durably committed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Send-level errors reported by the call transport.
///
/// These never propagate out of the transaction core: a failed
/// transaction-critical send is captured into the FIFO instead.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Not connected to the central system")]
    NotConnected,

    #[error("Call timed out")]
    Timeout,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Configuration load/save errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize config: {0}")]
    Format(#[from] toml::ser::Error),
}
