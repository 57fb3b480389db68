//! # Texnouz Charge Point
//!
//! OCPP 1.6 charge-point-side transaction core: per-connector transaction
//! state, the durable transaction-message FIFO, start/stop orchestration
//! and the background FIFO drain engine.
//!
//! ## Architecture
//!
//! - **support**: Cross-cutting utilities (errors)
//! - **domain**: Core entities — connector state, transaction FIFO
//! - **application**: Ports (collaborator contracts), message sender,
//!   transaction manager and FIFO drainer
//! - **infrastructure**: Storage port and the in-memory reference store
//! - **config**: Application configuration (TOML-based)
//!
//! The transport (WebSocket/OCPP-J), authorization cache, reservation,
//! smart-charging, metering and status layers are consumed through the
//! traits in [`application::ports`]; this crate carries their contracts,
//! not their implementations.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod support;

// Re-export commonly used types at crate root
pub use application::messaging::{CallOutcome, MessageSender};
pub use application::transaction::TransactionManager;
pub use config::{ChargePointConfig, ConnectorsConfig, TransactionsConfig};
pub use domain::connector::{Connector, ConnectorState, Connectors, CONNECTOR_ID_CHARGE_POINT};
pub use domain::fifo::{FifoEntry, MessageAction, TransactionFifo};
pub use infrastructure::storage::{InMemoryStore, PersistentStore};
