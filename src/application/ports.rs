//! Collaborator ports
//!
//! The transaction core coordinates with the rest of the charge point
//! through these capability traits. Each collaborator is responsible for
//! its own internal synchronization; the core holds them as
//! `Arc<dyn …>` and never assumes anything about their threading beyond
//! `Send + Sync`.

use std::sync::Arc;

use async_trait::async_trait;
use rust_ocpp::v1_6::types::{
    AuthorizationStatus, ChargingProfile, IdTagInfo, MeterValue, RegistrationStatus,
};
use serde_json::Value;

use crate::domain::fifo::TransactionFifo;
use crate::support::TransportError;

// ── Transport ──────────────────────────────────────────────────

/// Low-level OCPP call transport (WebSocket / OCPP-J, out of scope here).
///
/// `call` performs one request/response round-trip and is bounded by the
/// transport's own timeout; `Err` covers not-connected, timeout and
/// protocol-level failures alike.
#[async_trait]
pub trait CallTransport: Send + Sync {
    async fn call(&self, action: &str, payload: Value) -> Result<Value, TransportError>;

    fn is_connected(&self) -> bool;
}

// ── Charge point events ────────────────────────────────────────

/// Callbacks into the cabinet / UI layer.
#[async_trait]
pub trait ChargePointEventsHandler: Send + Sync {
    /// Current energy register value in Wh, used for meterStart/meterStop.
    async fn tx_start_stop_meter_value(&self, connector_id: u32) -> i32;

    /// The central system asks to start a transaction; `true` accepts.
    /// The physical start (cable, contactor) is driven by the handler
    /// afterwards, not by the transaction core.
    async fn remote_start_transaction_requested(&self, connector_id: u32, id_tag: &str) -> bool;

    /// The central system asks to stop the given connector's transaction.
    async fn remote_stop_transaction_requested(&self, connector_id: u32) -> bool;

    /// A provisional transaction was rejected by the central system
    /// after the fact; charging must be wound down.
    async fn transaction_de_authorized(&self, connector_id: u32);
}

// ── Reservations ───────────────────────────────────────────────

#[async_trait]
pub trait ReservationManager: Send + Sync {
    /// Whether a transaction with `id_tag` may run on `connector_id`,
    /// taking pending reservations into account.
    async fn is_transaction_allowed(&self, connector_id: u32, id_tag: &str)
        -> AuthorizationStatus;

    async fn clear_reservation(&self, connector_id: u32);
}

// ── Authorization cache ────────────────────────────────────────

#[async_trait]
pub trait AuthorizationCache: Send + Sync {
    /// Merge fresh idTagInfo received from the central system.
    async fn update(&self, id_tag: &str, info: &IdTagInfo);
}

// ── Smart charging ─────────────────────────────────────────────

#[async_trait]
pub trait SmartChargingManager: Send + Sync {
    /// Install a TxProfile for an upcoming remote-start transaction;
    /// `false` rejects the profile (and thereby the remote start).
    async fn install_tx_profile(&self, connector_id: u32, profile: &ChargingProfile) -> bool;

    /// Bind profiles installed before the transaction id was known.
    async fn assign_pending_tx_profiles(&self, connector_id: u32, transaction_id: i32);

    /// Drop all transaction-scoped profiles of a connector.
    async fn clear_tx_profiles(&self, connector_id: u32);
}

// ── Meter values ───────────────────────────────────────────────

#[async_trait]
pub trait MeterValuesManager: Send + Sync {
    /// Hand over the FIFO so sampled MeterValues survive outages too.
    fn set_transaction_fifo(&self, fifo: Arc<TransactionFifo>);

    async fn start_sampled_meter_values(&self, connector_id: u32);

    async fn stop_sampled_meter_values(&self, connector_id: u32);

    /// Final pre-stop samples, shipped as StopTransaction.transactionData.
    async fn tx_stop_meter_values(&self, connector_id: u32) -> Vec<MeterValue>;
}

// ── Status ─────────────────────────────────────────────────────

pub trait StatusManager: Send + Sync {
    /// Registration verdict from the last BootNotification exchange.
    fn registration_status(&self) -> RegistrationStatus;
}
