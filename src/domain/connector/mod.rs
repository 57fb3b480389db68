//! Connector state and registry

pub mod model;
pub mod registry;

pub use model::{ConnectorState, CONNECTOR_ID_CHARGE_POINT, PROVISIONAL_TRANSACTION_ID};
pub use registry::{Connector, Connectors};
