//! In-memory storage implementation
//!
//! Reference implementation of the storage port, used by tests and
//! development builds. Rows are serialized to JSON text exactly like a
//! disk-backed store would persist them, so serialization problems
//! surface here too.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::PersistentStore;
use crate::domain::connector::ConnectorState;
use crate::domain::fifo::FifoEntry;
use crate::support::StoreError;

/// In-memory store for development and testing.
pub struct InMemoryStore {
    connectors: DashMap<u32, String>,
    fifo: Mutex<BTreeMap<u64, (String, String)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            connectors: DashMap::new(),
            fifo: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    async fn save_connector(&self, state: &ConnectorState) -> Result<(), StoreError> {
        let row = serde_json::to_string(state)?;
        self.connectors.insert(state.id, row);
        Ok(())
    }

    async fn load_connectors(&self) -> Result<Vec<ConnectorState>, StoreError> {
        let mut states = Vec::with_capacity(self.connectors.len());
        for row in self.connectors.iter() {
            states.push(serde_json::from_str(row.value())?);
        }
        Ok(states)
    }

    async fn fifo_append(&self, seq: u64, action: &str, payload: &Value) -> Result<(), StoreError> {
        let row = serde_json::to_string(payload)?;
        let mut fifo = self.fifo.lock().expect("fifo table poisoned");
        fifo.insert(seq, (action.to_string(), row));
        Ok(())
    }

    async fn fifo_front(&self) -> Result<Option<FifoEntry>, StoreError> {
        let fifo = self.fifo.lock().expect("fifo table poisoned");
        match fifo.iter().next() {
            Some((&seq, (action, row))) => Ok(Some(FifoEntry {
                seq,
                action: action.clone(),
                payload: serde_json::from_str(row)?,
            })),
            None => Ok(None),
        }
    }

    async fn fifo_pop(&self) -> Result<(), StoreError> {
        let mut fifo = self.fifo.lock().expect("fifo table poisoned");
        let head = fifo.keys().next().copied();
        if let Some(seq) = head {
            fifo.remove(&seq);
        }
        Ok(())
    }

    async fn fifo_count(&self) -> Result<usize, StoreError> {
        Ok(self.fifo.lock().expect("fifo table poisoned").len())
    }

    async fn fifo_next_seq(&self) -> Result<u64, StoreError> {
        let fifo = self.fifo.lock().expect("fifo table poisoned");
        Ok(fifo.keys().next_back().map_or(0, |&seq| seq + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn connector_rows_overwrite_by_id() {
        let store = InMemoryStore::new();
        let mut state = ConnectorState::new(1);
        store.save_connector(&state).await.unwrap();

        state.begin_transaction(7, "TAG");
        store.save_connector(&state).await.unwrap();

        let loaded = store.load_connectors().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].transaction_id, 7);
    }

    #[tokio::test]
    async fn fifo_rows_sorted_by_sequence() {
        let store = InMemoryStore::new();
        store.fifo_append(1, "StopTransaction", &json!({})).await.unwrap();
        store.fifo_append(0, "StartTransaction", &json!({})).await.unwrap();

        let head = store.fifo_front().await.unwrap().unwrap();
        assert_eq!(head.seq, 0);
        assert_eq!(head.action, "StartTransaction");
        assert_eq!(store.fifo_next_seq().await.unwrap(), 2);

        store.fifo_pop().await.unwrap();
        assert_eq!(store.fifo_count().await.unwrap(), 1);
        assert_eq!(store.fifo_front().await.unwrap().unwrap().seq, 1);
    }

    #[tokio::test]
    async fn empty_fifo() {
        let store = InMemoryStore::new();
        assert!(store.fifo_front().await.unwrap().is_none());
        assert_eq!(store.fifo_count().await.unwrap(), 0);
        assert_eq!(store.fifo_next_seq().await.unwrap(), 0);
        // pop on empty is a no-op
        store.fifo_pop().await.unwrap();
    }
}
