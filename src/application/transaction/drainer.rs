//! FIFO drain engine
//!
//! A single consumer task replays queued transaction messages once the
//! link is up and the charge point is accepted by the central system.
//! Wake-ups arrive through a kick channel (connection-up, external
//! producers, retry timer), so at most one drain pass runs at a time and
//! the timer callback only schedules work.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use rust_ocpp::v1_6::types::{AuthorizationStatus, RegistrationStatus};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::messaging::{CallOutcome, MessageSender};
use crate::application::ports::{AuthorizationCache, ChargePointEventsHandler, StatusManager};
use crate::config::TransactionsConfig;
use crate::domain::connector::Connectors;
use crate::domain::fifo::{MessageAction, TransactionFifo};

/// Poll interval while connected but not yet accepted by the central system.
const REGISTRATION_POLL_INTERVAL: Duration = Duration::from_millis(250);

enum DrainSignal {
    Kick,
    Shutdown,
}

/// Background drain task handle.
pub struct FifoDrainer {
    inner: Arc<DrainerInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct DrainerInner {
    config: TransactionsConfig,
    connectors: Arc<Connectors>,
    fifo: Arc<TransactionFifo>,
    sender: Arc<MessageSender>,
    status: Arc<dyn StatusManager>,
    auth_cache: Arc<dyn AuthorizationCache>,
    events: Arc<dyn ChargePointEventsHandler>,
    retry_count: AtomicU32,
    timer_armed: AtomicBool,
    timer_task: Mutex<Option<JoinHandle<()>>>,
    kick_tx: mpsc::UnboundedSender<DrainSignal>,
}

impl FifoDrainer {
    /// Spawn the drain task. Must run inside a tokio runtime.
    pub fn spawn(
        config: TransactionsConfig,
        connectors: Arc<Connectors>,
        fifo: Arc<TransactionFifo>,
        sender: Arc<MessageSender>,
        status: Arc<dyn StatusManager>,
        auth_cache: Arc<dyn AuthorizationCache>,
        events: Arc<dyn ChargePointEventsHandler>,
    ) -> Self {
        let (kick_tx, kick_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(DrainerInner {
            config,
            connectors,
            fifo,
            sender,
            status,
            auth_cache,
            events,
            retry_count: AtomicU32::new(0),
            timer_armed: AtomicBool::new(false),
            timer_task: Mutex::new(None),
            kick_tx,
        });
        let task = tokio::spawn(Self::run(inner.clone(), kick_rx));
        Self {
            inner,
            task: Mutex::new(Some(task)),
        }
    }

    /// Request a drain pass. Cheap, callable from any context; a no-op
    /// when the gates (connected + accepted) are closed.
    pub fn kick(&self) {
        let _ = self.inner.kick_tx.send(DrainSignal::Kick);
    }

    /// Stop the drain task, letting an in-flight pass complete.
    pub async fn shutdown(&self) {
        let task = self
            .task
            .lock()
            .expect("drainer task slot poisoned")
            .take();
        if let Some(task) = task {
            let _ = self.inner.kick_tx.send(DrainSignal::Shutdown);
            let _ = task.await;
        }
        let timer = self
            .inner
            .timer_task
            .lock()
            .expect("retry timer slot poisoned")
            .take();
        if let Some(timer) = timer {
            timer.abort();
        }
    }

    async fn run(inner: Arc<DrainerInner>, mut signals: mpsc::UnboundedReceiver<DrainSignal>) {
        while let Some(signal) = signals.recv().await {
            match signal {
                DrainSignal::Kick => inner.process_fifo().await,
                DrainSignal::Shutdown => break,
            }
        }
    }
}

impl DrainerInner {
    async fn process_fifo(self: &Arc<Self>) {
        if !self.sender.is_connected() {
            return;
        }
        if self.status.registration_status() != RegistrationStatus::Accepted {
            // Hold all traffic until the central system accepts us
            self.arm_timer(REGISTRATION_POLL_INTERVAL);
            return;
        }

        loop {
            let entry = match self.fifo.front().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Cannot read FIFO head");
                    break;
                }
            };

            let Some(action) = MessageAction::from_str(&entry.action) else {
                // A row this build does not understand would block the
                // queue forever; drop it without consuming retry credit
                warn!(action = entry.action.as_str(), "Unknown action in FIFO, dropping");
                if !self.pop_head().await {
                    break;
                }
                self.retry_count.store(0, Ordering::SeqCst);
                continue;
            };

            debug!(
                action = %action,
                retries = self.retry_count.load(Ordering::SeqCst),
                max_attempts = self.config.message_attempts,
                "Processing queued request"
            );

            if self.dispatch(action, &entry.payload).await {
                debug!(action = %action, "Queued request delivered");
                if !self.pop_head().await {
                    break;
                }
                self.retry_count.store(0, Ordering::SeqCst);
            } else {
                let retries = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
                if retries > self.config.message_attempts {
                    warn!(action = %action, retries, "Delivery attempts exhausted, dropping request");
                    if !self.pop_head().await {
                        break;
                    }
                    self.retry_count.store(0, Ordering::SeqCst);
                } else if self.sender.is_connected() {
                    debug!(
                        action = %action,
                        retry_in_secs = self.config.message_retry_interval_secs,
                        "Queued request failed, retry scheduled"
                    );
                    self.arm_timer(self.config.message_retry_interval());
                }
            }

            if self.fifo.is_empty() || self.timer_armed() || !self.sender.is_connected() {
                break;
            }
        }
    }

    async fn dispatch(self: &Arc<Self>, action: MessageAction, payload: &Value) -> bool {
        match action {
            MessageAction::StartTransaction => {
                match self.sender.call_raw(action.as_str(), payload.clone()).await {
                    CallOutcome::Ok(value) => {
                        match serde_json::from_value::<StartTransactionResponse>(value) {
                            Ok(response) => {
                                self.reconcile_start(payload, &response).await;
                                true
                            }
                            Err(e) => {
                                error!(error = %e, "Undecodable StartTransaction response");
                                false
                            }
                        }
                    }
                    CallOutcome::Failed => false,
                }
            }
            MessageAction::StopTransaction | MessageAction::MeterValues => matches!(
                self.sender.call_raw(action.as_str(), payload.clone()).await,
                CallOutcome::Ok(_)
            ),
        }
    }

    /// Settle a drained StartTransaction against its response: refresh
    /// the authorization cache, then either promote the provisional id
    /// to the confirmed one or report the de-authorization.
    async fn reconcile_start(&self, payload: &Value, response: &StartTransactionResponse) {
        let request: StartTransactionRequest = match serde_json::from_value(payload.clone()) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Queued StartTransaction payload does not parse");
                return;
            }
        };

        if response.id_tag_info.status != AuthorizationStatus::ConcurrentTx {
            self.auth_cache
                .update(&request.id_tag, &response.id_tag_info)
                .await;
        }

        let Some(connector) = self.connectors.get(request.connector_id) else {
            return;
        };

        if response.id_tag_info.status == AuthorizationStatus::Accepted {
            let mut state = connector.lock().await;
            if state.is_provisional()
                && state.transaction_id_tag.as_deref() == Some(request.id_tag.as_str())
            {
                state.transaction_id = response.transaction_id;
                match self.connectors.save(&state).await {
                    Ok(()) => info!(
                        connector_id = state.id,
                        transaction_id = response.transaction_id,
                        "Provisional transaction confirmed"
                    ),
                    Err(e) => error!(
                        connector_id = state.id,
                        error = %e,
                        "Cannot persist confirmed transaction id"
                    ),
                }
            }
        } else {
            let de_authorized = {
                let state = connector.lock().await;
                state.is_provisional()
                    && state.transaction_id_tag.as_deref() == Some(request.id_tag.as_str())
            };
            if de_authorized {
                warn!(
                    connector_id = request.connector_id,
                    status = ?response.id_tag_info.status,
                    "Queued transaction rejected by central system"
                );
                self.events
                    .transaction_de_authorized(request.connector_id)
                    .await;
            }
        }
    }

    async fn pop_head(&self) -> bool {
        match self.fifo.pop().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Cannot remove FIFO head");
                false
            }
        }
    }

    fn arm_timer(self: &Arc<Self>, delay: Duration) {
        self.timer_armed.store(true, Ordering::SeqCst);
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.timer_armed.store(false, Ordering::SeqCst);
            let _ = inner.kick_tx.send(DrainSignal::Kick);
        });
        let mut slot = self.timer_task.lock().expect("retry timer slot poisoned");
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(handle);
    }

    fn timer_armed(&self) -> bool {
        self.timer_armed.load(Ordering::SeqCst)
    }
}
