//! Connector state entity

use chrono::{DateTime, Utc};
use rust_ocpp::v1_6::types::ChargePointStatus;
use serde::{Deserialize, Serialize};

/// Connector id denoting the whole charge point.
pub const CONNECTOR_ID_CHARGE_POINT: u32 = 0;

/// Transaction id of a transaction whose StartTransaction is queued in the
/// FIFO and has not yet been confirmed by the central system.
pub const PROVISIONAL_TRANSACTION_ID: i32 = -1;

/// Durable per-connector record.
///
/// One record exists per physical connector plus one for connector 0
/// (the whole charge point). `transaction_id` semantics: `0` = no
/// transaction, [`PROVISIONAL_TRANSACTION_ID`] = start queued offline,
/// positive = confirmed by the central system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorState {
    /// Connector id (0 = whole charge point)
    pub id: u32,
    /// Current OCPP status, owned by the status layer
    pub status: ChargePointStatus,
    /// Active transaction id (0 = none, -1 = provisional)
    pub transaction_id: i32,
    /// When the active transaction started
    pub transaction_start: Option<DateTime<Utc>>,
    /// Id tag that started the active transaction
    pub transaction_id_tag: Option<String>,
    /// Pending reservation id, meaningful only while `status == Reserved`
    pub reservation_id: Option<i32>,
}

impl ConnectorState {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            status: ChargePointStatus::Available,
            transaction_id: 0,
            transaction_start: None,
            transaction_id_tag: None,
            reservation_id: None,
        }
    }

    /// A transaction (provisional or confirmed) is in progress.
    pub fn has_transaction(&self) -> bool {
        self.transaction_id != 0
    }

    /// The in-progress transaction is still awaiting its central-system id.
    pub fn is_provisional(&self) -> bool {
        self.transaction_id == PROVISIONAL_TRANSACTION_ID
    }

    /// Record the start of a transaction.
    pub fn begin_transaction(&mut self, transaction_id: i32, id_tag: impl Into<String>) {
        self.transaction_id = transaction_id;
        self.transaction_start = Some(Utc::now());
        self.transaction_id_tag = Some(id_tag.into());
    }

    /// Clear all transaction fields.
    pub fn end_transaction(&mut self) {
        self.transaction_id = 0;
        self.transaction_start = None;
        self.transaction_id_tag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connector_is_idle() {
        let state = ConnectorState::new(1);
        assert_eq!(state.id, 1);
        assert_eq!(state.status, ChargePointStatus::Available);
        assert!(!state.has_transaction());
        assert!(!state.is_provisional());
        assert!(state.transaction_start.is_none());
        assert!(state.transaction_id_tag.is_none());
        assert!(state.reservation_id.is_none());
    }

    #[test]
    fn begin_transaction_sets_fields() {
        let mut state = ConnectorState::new(1);
        state.begin_transaction(42, "TAG01");
        assert!(state.has_transaction());
        assert!(!state.is_provisional());
        assert_eq!(state.transaction_id, 42);
        assert_eq!(state.transaction_id_tag.as_deref(), Some("TAG01"));
        assert!(state.transaction_start.is_some());
    }

    #[test]
    fn provisional_transaction() {
        let mut state = ConnectorState::new(2);
        state.begin_transaction(PROVISIONAL_TRANSACTION_ID, "TAG02");
        assert!(state.has_transaction());
        assert!(state.is_provisional());
    }

    #[test]
    fn end_transaction_resets_fields() {
        let mut state = ConnectorState::new(1);
        state.begin_transaction(42, "TAG01");
        state.end_transaction();
        assert!(!state.has_transaction());
        assert!(state.transaction_start.is_none());
        assert!(state.transaction_id_tag.is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let mut state = ConnectorState::new(1);
        state.status = ChargePointStatus::Reserved;
        state.reservation_id = Some(7);
        state.begin_transaction(PROVISIONAL_TRANSACTION_ID, "TAG03");

        let json = serde_json::to_string(&state).unwrap();
        let back: ConnectorState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 1);
        assert_eq!(back.status, ChargePointStatus::Reserved);
        assert_eq!(back.transaction_id, PROVISIONAL_TRANSACTION_ID);
        assert_eq!(back.reservation_id, Some(7));
        assert_eq!(back.transaction_id_tag.as_deref(), Some("TAG03"));
    }
}
