//! Core domain entities

pub mod connector;
pub mod fifo;

pub use connector::{Connector, ConnectorState, Connectors, CONNECTOR_ID_CHARGE_POINT};
pub use fifo::{FifoEntry, MessageAction, TransactionFifo};
