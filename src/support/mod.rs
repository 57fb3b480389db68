//! Cross-cutting utilities

pub mod errors;

pub use errors::{ConfigError, StoreError, TransportError};
