//! Transaction manager
//!
//! Orchestrates local and remote transaction start/stop: consults the
//! reservation layer, talks to the central system through the message
//! sender (with FIFO capture on failure), mutates and persists connector
//! state, and notifies the smart-charging and metering collaborators.
//!
//! A send that cannot be delivered never fails the local operation: the
//! request is queued durably and the session continues under the
//! provisional transaction id until the drainer reconciles it.

use std::sync::Arc;

use chrono::Utc;
use rust_ocpp::v1_6::messages::remote_start_transaction::{
    RemoteStartTransactionRequest, RemoteStartTransactionResponse,
};
use rust_ocpp::v1_6::messages::remote_stop_transaction::{
    RemoteStopTransactionRequest, RemoteStopTransactionResponse,
};
use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest, StopTransactionResponse,
};
use rust_ocpp::v1_6::types::{
    AuthorizationStatus, ChargePointStatus, Reason, RemoteStartStopStatus,
};
use tracing::{info, warn};

use crate::application::messaging::{CallOutcome, MessageSender};
use crate::application::ports::{
    AuthorizationCache, ChargePointEventsHandler, MeterValuesManager, ReservationManager,
    SmartChargingManager, StatusManager,
};
use crate::config::TransactionsConfig;
use crate::domain::connector::{
    Connectors, CONNECTOR_ID_CHARGE_POINT, PROVISIONAL_TRANSACTION_ID,
};
use crate::domain::fifo::{MessageAction, TransactionFifo};
use crate::support::StoreError;

use super::drainer::FifoDrainer;

/// Per-charge-point transaction orchestrator.
pub struct TransactionManager {
    config: TransactionsConfig,
    connectors: Arc<Connectors>,
    sender: Arc<MessageSender>,
    fifo: Arc<TransactionFifo>,
    events: Arc<dyn ChargePointEventsHandler>,
    reservations: Arc<dyn ReservationManager>,
    auth_cache: Arc<dyn AuthorizationCache>,
    smart_charging: Arc<dyn SmartChargingManager>,
    meter_values: Arc<dyn MeterValuesManager>,
    drainer: FifoDrainer,
}

impl TransactionManager {
    /// Wire the manager and spawn the FIFO drainer.
    ///
    /// Hands the FIFO to the meter-values collaborator so its sampled
    /// values share the same durable queue.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: TransactionsConfig,
        connectors: Arc<Connectors>,
        sender: Arc<MessageSender>,
        fifo: Arc<TransactionFifo>,
        events: Arc<dyn ChargePointEventsHandler>,
        reservations: Arc<dyn ReservationManager>,
        auth_cache: Arc<dyn AuthorizationCache>,
        smart_charging: Arc<dyn SmartChargingManager>,
        meter_values: Arc<dyn MeterValuesManager>,
        status: Arc<dyn StatusManager>,
    ) -> Self {
        meter_values.set_transaction_fifo(fifo.clone());

        let drainer = FifoDrainer::spawn(
            config.clone(),
            connectors.clone(),
            fifo.clone(),
            sender.clone(),
            status,
            auth_cache.clone(),
            events.clone(),
        );

        Self {
            config,
            connectors,
            sender,
            fifo,
            events,
            reservations,
            auth_cache,
            smart_charging,
            meter_values,
            drainer,
        }
    }

    /// Connection-liveness signal from the transport layer.
    ///
    /// On reconnect, queued transaction messages resume draining.
    pub fn update_connection_status(&self, is_connected: bool) {
        if is_connected && !self.fifo.is_empty() {
            info!(
                queued = self.fifo.size(),
                "Restart transaction FIFO processing"
            );
            self.drainer.kick();
        }
    }

    /// Wake the drainer after an external producer (the meter-values
    /// sampler) appended to the FIFO.
    pub fn kick_fifo(&self) {
        self.drainer.kick();
    }

    /// Stop the drainer: the retry timer is cancelled and an in-flight
    /// drain pass runs to completion.
    pub async fn shutdown(&self) {
        self.drainer.shutdown().await;
    }

    // ── Local start ────────────────────────────────────────────

    /// Start a transaction on a connector after a local trigger
    /// (card swipe, cable plug-in).
    ///
    /// Returns the authorization verdict; anything but `Accepted` means
    /// no transaction was started. Only persistence failures are `Err`.
    pub async fn start_transaction(
        &self,
        connector_id: u32,
        id_tag: &str,
    ) -> Result<AuthorizationStatus, StoreError> {
        // Transactions never run on the charge point connector itself
        if connector_id == CONNECTOR_ID_CHARGE_POINT {
            return Ok(AuthorizationStatus::Invalid);
        }
        let Some(connector) = self.connectors.get(connector_id) else {
            return Ok(AuthorizationStatus::Invalid);
        };

        let allowed = self
            .reservations
            .is_transaction_allowed(connector_id, id_tag)
            .await;
        if allowed != AuthorizationStatus::Accepted {
            return Ok(allowed);
        }

        let mut request = StartTransactionRequest {
            connector_id,
            id_tag: id_tag.to_string(),
            meter_start: self.events.tx_start_stop_meter_value(connector_id).await,
            reservation_id: None,
            timestamp: Utc::now(),
        };

        // A reservation on this connector (or, if enabled, on the whole
        // charge point) is consumed by the transaction
        let own_reservation = {
            let state = connector.lock().await;
            if state.status == ChargePointStatus::Reserved {
                state.reservation_id
            } else {
                None
            }
        };
        if let Some(reservation_id) = own_reservation {
            request.reservation_id = Some(reservation_id);
            self.reservations.clear_reservation(connector_id).await;
        } else if self.config.reserve_connector_zero_supported {
            let charge_point_reservation = {
                let state = self.connectors.charge_point().lock().await;
                if state.status == ChargePointStatus::Reserved {
                    state.reservation_id
                } else {
                    None
                }
            };
            if let Some(reservation_id) = charge_point_reservation {
                if self
                    .reservations
                    .is_transaction_allowed(CONNECTOR_ID_CHARGE_POINT, id_tag)
                    .await
                    == AuthorizationStatus::Accepted
                {
                    request.reservation_id = Some(reservation_id);
                    self.reservations.clear_reservation(connector_id).await;
                }
            }
        }

        info!(connector_id, id_tag, "Start transaction requested");

        let outcome: CallOutcome<StartTransactionResponse> = self
            .sender
            .call_or_enqueue(MessageAction::StartTransaction, &request, &self.fifo)
            .await?;

        let (status, transaction_id) = match outcome {
            CallOutcome::Ok(response) => {
                let status = response.id_tag_info.status.clone();
                if status != AuthorizationStatus::ConcurrentTx {
                    self.auth_cache.update(id_tag, &response.id_tag_info).await;
                }
                (status, response.transaction_id)
            }
            // Queued for later delivery; charge meanwhile under the
            // provisional id and reconcile when the drain succeeds
            CallOutcome::Failed => (AuthorizationStatus::Accepted, PROVISIONAL_TRANSACTION_ID),
        };

        if status == AuthorizationStatus::Accepted {
            info!(connector_id, transaction_id, "Start transaction accepted");

            {
                let mut state = connector.lock().await;
                state.begin_transaction(transaction_id, id_tag);
                self.connectors.save(&state).await?;
            }

            self.smart_charging
                .assign_pending_tx_profiles(connector_id, transaction_id)
                .await;
            self.meter_values
                .start_sampled_meter_values(connector_id)
                .await;
        } else {
            warn!(connector_id, status = ?status, "Start transaction refused");

            // Close the transaction id the central system may have
            // allocated alongside the refusal; ids are unique, so central
            // systems that did not allocate one tolerate this stop
            let stop_request = StopTransactionRequest {
                transaction_id,
                id_tag: None,
                meter_stop: request.meter_start,
                timestamp: request.timestamp,
                reason: Some(Reason::DeAuthorized),
                transaction_data: None,
            };
            let _: CallOutcome<StopTransactionResponse> = self
                .sender
                .call_or_enqueue(MessageAction::StopTransaction, &stop_request, &self.fifo)
                .await?;
        }

        Ok(status)
    }

    // ── Local stop ─────────────────────────────────────────────

    /// Stop the connector's transaction.
    ///
    /// Connector state is reset before the notification is delivered:
    /// the physical session has ended either way, and the central-system
    /// side is settled durably through the FIFO. Returns `false` when no
    /// transaction is in progress.
    pub async fn stop_transaction(
        &self,
        connector_id: u32,
        id_tag: &str,
        reason: Reason,
    ) -> Result<bool, StoreError> {
        let Some(connector) = self.connectors.get(connector_id) else {
            return Ok(false);
        };

        let transaction_id = connector.lock().await.transaction_id;
        if transaction_id == 0 {
            return Ok(false);
        }

        self.meter_values
            .stop_sampled_meter_values(connector_id)
            .await;

        let transaction_data = self.meter_values.tx_stop_meter_values(connector_id).await;
        let request = StopTransactionRequest {
            transaction_id,
            id_tag: (!id_tag.is_empty()).then(|| id_tag.to_string()),
            meter_stop: self.events.tx_start_stop_meter_value(connector_id).await,
            timestamp: Utc::now(),
            reason: Some(reason.clone()),
            transaction_data: (!transaction_data.is_empty()).then_some(transaction_data),
        };

        {
            let mut state = connector.lock().await;
            state.end_transaction();
            self.connectors.save(&state).await?;
        }

        info!(connector_id, transaction_id, reason = ?reason, "Stop transaction");

        let outcome: CallOutcome<StopTransactionResponse> = self
            .sender
            .call_or_enqueue(MessageAction::StopTransaction, &request, &self.fifo)
            .await?;

        if let CallOutcome::Ok(response) = outcome {
            if let Some(id_tag_info) = response.id_tag_info {
                self.auth_cache.update(id_tag, &id_tag_info).await;
            }
        }

        self.smart_charging.clear_tx_profiles(connector_id).await;

        Ok(true)
    }

    // ── Remote start ───────────────────────────────────────────

    /// Handle a RemoteStartTransaction request from the central system.
    ///
    /// Accepting here only authorizes the start; the actual
    /// StartTransaction is triggered by the events handler once the
    /// physical preconditions (cable, contactor) are met.
    pub async fn remote_start_transaction(
        &self,
        request: &RemoteStartTransactionRequest,
    ) -> RemoteStartTransactionResponse {
        info!(
            connector_id = ?request.connector_id,
            id_tag = request.id_tag.as_str(),
            "Remote start transaction requested"
        );

        let mut authorized = false;
        if let Some(connector_id) = request.connector_id {
            if connector_id != CONNECTOR_ID_CHARGE_POINT {
                if let Some(connector) = self.connectors.get(connector_id) {
                    let (status, transaction_id) = {
                        let state = connector.lock().await;
                        (state.status.clone(), state.transaction_id)
                    };
                    if status != ChargePointStatus::Unavailable
                        && transaction_id == 0
                        && self
                            .reservations
                            .is_transaction_allowed(connector_id, &request.id_tag)
                            .await
                            == AuthorizationStatus::Accepted
                    {
                        authorized = self
                            .events
                            .remote_start_transaction_requested(connector_id, &request.id_tag)
                            .await;
                        if authorized {
                            if let Some(profile) = &request.charging_profile {
                                authorized = self
                                    .smart_charging
                                    .install_tx_profile(connector_id, profile)
                                    .await;
                            }
                        }
                    }
                }
            }
        }

        let status = if authorized {
            RemoteStartStopStatus::Accepted
        } else {
            RemoteStartStopStatus::Rejected
        };
        info!(connector_id = ?request.connector_id, status = ?status, "Remote start transaction");

        RemoteStartTransactionResponse { status }
    }

    // ── Remote stop ────────────────────────────────────────────

    /// Handle a RemoteStopTransaction request from the central system.
    ///
    /// The actual stop is triggered by the events handler afterwards.
    pub async fn remote_stop_transaction(
        &self,
        request: &RemoteStopTransactionRequest,
    ) -> RemoteStopTransactionResponse {
        info!(
            transaction_id = request.transaction_id,
            "Remote stop transaction requested"
        );

        let mut authorized = false;
        for connector in self.connectors.physical() {
            let matches = {
                let state = connector.lock().await;
                state.has_transaction() && state.transaction_id == request.transaction_id
            };
            if matches {
                authorized = self
                    .events
                    .remote_stop_transaction_requested(connector.id)
                    .await;
                break;
            }
        }

        let status = if authorized {
            RemoteStartStopStatus::Accepted
        } else {
            RemoteStartStopStatus::Rejected
        };
        info!(transaction_id = request.transaction_id, status = ?status, "Remote stop transaction");

        RemoteStopTransactionResponse { status }
    }
}
