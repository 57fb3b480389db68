//! Durable transaction-message FIFO
//!
//! Ordered queue of transaction-critical outbound messages
//! (StartTransaction / StopTransaction / MeterValues) awaiting delivery.
//! Entries are appended durably before `push` returns and removed durably
//! by `pop`, giving at-least-once delivery across process restarts.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::infrastructure::storage::PersistentStore;
use crate::support::StoreError;

/// Actions carried by the FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAction {
    StartTransaction,
    StopTransaction,
    MeterValues,
}

impl MessageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartTransaction => "StartTransaction",
            Self::StopTransaction => "StopTransaction",
            Self::MeterValues => "MeterValues",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "StartTransaction" => Some(Self::StartTransaction),
            "StopTransaction" => Some(Self::StopTransaction),
            "MeterValues" => Some(Self::MeterValues),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted FIFO row.
///
/// The action is kept as the raw persisted string: rows written by a
/// newer firmware may carry actions this build does not know, and the
/// drain loop decides what to do with those.
#[derive(Debug, Clone)]
pub struct FifoEntry {
    pub seq: u64,
    pub action: String,
    pub payload: Value,
}

/// Durable FIFO of outbound transaction messages.
///
/// Multi-producer (transaction manager, meter-values sampler),
/// single-consumer (the drainer). Pushes are serialized so sequence
/// allocation and the durable append happen in emission order.
pub struct TransactionFifo {
    store: Arc<dyn PersistentStore>,
    push_lock: Mutex<()>,
    next_seq: AtomicU64,
    len: AtomicUsize,
}

impl TransactionFifo {
    /// Open the FIFO, restoring length and sequence from persisted rows.
    pub async fn open(store: Arc<dyn PersistentStore>) -> Result<Self, StoreError> {
        let len = store.fifo_count().await?;
        let next_seq = store.fifo_next_seq().await?;
        Ok(Self {
            store,
            push_lock: Mutex::new(()),
            next_seq: AtomicU64::new(next_seq),
            len: AtomicUsize::new(len),
        })
    }

    /// Append an entry; the row is durably committed before this returns.
    pub async fn push(&self, action: MessageAction, payload: Value) -> Result<(), StoreError> {
        let _guard = self.push_lock.lock().await;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.store.fifo_append(seq, action.as_str(), &payload).await?;
        self.len.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Peek the head entry without removing it.
    pub async fn front(&self) -> Result<Option<FifoEntry>, StoreError> {
        self.store.fifo_front().await
    }

    /// Durably remove the head entry.
    pub async fn pop(&self) -> Result<(), StoreError> {
        self.store.fifo_pop().await?;
        self.len.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    /// Number of queued entries (cached, cheap).
    pub fn size(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
