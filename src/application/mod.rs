//! Use-case orchestration: ports, messaging, transaction lifecycle

pub mod messaging;
pub mod ports;
pub mod transaction;

pub use messaging::{CallOutcome, MessageSender};
pub use transaction::TransactionManager;
