//! Connector registry
//!
//! Holds one [`Connector`] per physical attachment point plus connector 0
//! for the whole charge point. Every multi-field mutation happens under
//! the connector's own mutex and is written through to the store before
//! the guard is released.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::infrastructure::storage::PersistentStore;
use crate::support::StoreError;

use super::model::{ConnectorState, CONNECTOR_ID_CHARGE_POINT};

/// A single connector with its serialized state.
pub struct Connector {
    /// Connector id (0 = whole charge point)
    pub id: u32,
    state: Mutex<ConnectorState>,
}

impl Connector {
    fn new(state: ConnectorState) -> Self {
        Self {
            id: state.id,
            state: Mutex::new(state),
        }
    }

    /// Acquire the connector's exclusive lock.
    pub async fn lock(&self) -> MutexGuard<'_, ConnectorState> {
        self.state.lock().await
    }
}

/// Registry of all connectors of the charge point.
pub struct Connectors {
    store: Arc<dyn PersistentStore>,
    connectors: Vec<Arc<Connector>>,
}

impl Connectors {
    /// Restore connector states from the store, seeding fresh `Available`
    /// records for connectors with no persisted row.
    pub async fn restore(
        store: Arc<dyn PersistentStore>,
        connector_count: u32,
    ) -> Result<Self, StoreError> {
        let mut persisted: HashMap<u32, ConnectorState> = store
            .load_connectors()
            .await?
            .into_iter()
            .map(|state| (state.id, state))
            .collect();

        let connectors = (0..=connector_count)
            .map(|id| {
                let state = persisted
                    .remove(&id)
                    .unwrap_or_else(|| ConnectorState::new(id));
                Arc::new(Connector::new(state))
            })
            .collect();

        info!(connector_count, "Connector registry restored");

        Ok(Self { store, connectors })
    }

    /// Number of physical connectors (excluding connector 0).
    pub fn count(&self) -> u32 {
        (self.connectors.len() - 1) as u32
    }

    /// Get a connector by id (including connector 0).
    pub fn get(&self, id: u32) -> Option<&Arc<Connector>> {
        self.connectors.get(id as usize)
    }

    /// The connector representing the whole charge point.
    pub fn charge_point(&self) -> &Arc<Connector> {
        &self.connectors[CONNECTOR_ID_CHARGE_POINT as usize]
    }

    /// Iterate over the physical connectors (ids ≥ 1).
    pub fn physical(&self) -> impl Iterator<Item = &Arc<Connector>> {
        self.connectors.iter().skip(1)
    }

    /// Durably persist one connector record.
    ///
    /// Callers invoke this while still holding the connector lock so the
    /// mutation and its commit are atomic with respect to other actors.
    pub async fn save(&self, state: &ConnectorState) -> Result<(), StoreError> {
        self.store.save_connector(state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStore;

    #[tokio::test]
    async fn restore_seeds_fresh_states() {
        let store = Arc::new(InMemoryStore::new());
        let connectors = Connectors::restore(store, 2).await.unwrap();

        assert_eq!(connectors.count(), 2);
        assert_eq!(connectors.charge_point().id, 0);
        assert!(connectors.get(1).is_some());
        assert!(connectors.get(2).is_some());
        assert!(connectors.get(3).is_none());
        assert_eq!(connectors.physical().count(), 2);
    }

    #[tokio::test]
    async fn save_and_restore_roundtrip() {
        let store = Arc::new(InMemoryStore::new());

        {
            let connectors = Connectors::restore(store.clone(), 1).await.unwrap();
            let connector = connectors.get(1).unwrap();
            let mut state = connector.lock().await;
            state.begin_transaction(42, "TAG01");
            connectors.save(&state).await.unwrap();
        }

        let connectors = Connectors::restore(store, 1).await.unwrap();
        let state = connectors.get(1).unwrap().lock().await;
        assert_eq!(state.transaction_id, 42);
        assert_eq!(state.transaction_id_tag.as_deref(), Some("TAG01"));
    }
}
