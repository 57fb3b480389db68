//! Storage trait definitions

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::connector::ConnectorState;
use crate::domain::fifo::FifoEntry;
use crate::support::StoreError;

/// Durable key-value store backing the transaction core.
///
/// Two tables: connector records keyed by connector id, and the message
/// FIFO keyed by a monotonically increasing sequence. Every write method
/// must have durably committed before it returns — a crash between a
/// state mutation and its commit would orphan a central-system-side
/// transaction. Implementations serialize row access internally.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    // Connector state table
    async fn save_connector(&self, state: &ConnectorState) -> Result<(), StoreError>;
    async fn load_connectors(&self) -> Result<Vec<ConnectorState>, StoreError>;

    // Transaction FIFO table
    async fn fifo_append(&self, seq: u64, action: &str, payload: &Value) -> Result<(), StoreError>;
    async fn fifo_front(&self) -> Result<Option<FifoEntry>, StoreError>;
    async fn fifo_pop(&self) -> Result<(), StoreError>;
    async fn fifo_count(&self) -> Result<usize, StoreError>;
    /// Sequence to assign to the next appended row (max persisted + 1).
    async fn fifo_next_seq(&self) -> Result<u64, StoreError>;
}
