//! Shared fakes for transaction-core tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_ocpp::v1_6::types::{
    AuthorizationStatus, ChargingProfile, IdTagInfo, MeterValue, RegistrationStatus,
};
use serde_json::{json, Value};

use crate::application::messaging::MessageSender;
use crate::application::ports::{
    AuthorizationCache, CallTransport, ChargePointEventsHandler, MeterValuesManager,
    ReservationManager, SmartChargingManager, StatusManager,
};
use crate::config::TransactionsConfig;
use crate::domain::connector::Connectors;
use crate::domain::fifo::TransactionFifo;
use crate::infrastructure::storage::InMemoryStore;
use crate::support::TransportError;

use super::manager::TransactionManager;

/// Poll until `condition` holds; panics after a generous timeout.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// JSON StartTransaction response as the central system sends it.
pub fn start_response(status: &str, transaction_id: i32) -> Value {
    json!({
        "transactionId": transaction_id,
        "idTagInfo": { "status": status }
    })
}

// ── Transport ──────────────────────────────────────────────────

enum ScriptedCall {
    Respond(Value),
    Fail,
}

/// Scriptable transport: responses/failures are consumed in order; an
/// unscripted call answers `{}`. Disconnected calls fail without
/// consuming the script.
pub struct FakeTransport {
    connected: AtomicBool,
    script: Mutex<VecDeque<ScriptedCall>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn respond(&self, value: Value) {
        self.script.lock().unwrap().push_back(ScriptedCall::Respond(value));
    }

    pub fn fail_next(&self) {
        self.script.lock().unwrap().push_back(ScriptedCall::Fail);
    }

    pub fn sent(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_actions(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(a, _)| a.clone()).collect()
    }
}

#[async_trait]
impl CallTransport for FakeTransport {
    async fn call(&self, action: &str, payload: Value) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push((action.to_string(), payload));
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedCall::Respond(value)) => Ok(value),
            Some(ScriptedCall::Fail) => Err(TransportError::Timeout),
            None => Ok(json!({})),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// ── Collaborators ──────────────────────────────────────────────

pub struct FakeEvents {
    meter_value: AtomicI32,
    accept_remote_start: AtomicBool,
    accept_remote_stop: AtomicBool,
    remote_start_requests: Mutex<Vec<(u32, String)>>,
    remote_stop_requests: Mutex<Vec<u32>>,
    de_authorized: Mutex<Vec<u32>>,
}

impl FakeEvents {
    pub fn new() -> Self {
        Self {
            meter_value: AtomicI32::new(100),
            accept_remote_start: AtomicBool::new(true),
            accept_remote_stop: AtomicBool::new(true),
            remote_start_requests: Mutex::new(Vec::new()),
            remote_stop_requests: Mutex::new(Vec::new()),
            de_authorized: Mutex::new(Vec::new()),
        }
    }

    pub fn set_meter_value(&self, value: i32) {
        self.meter_value.store(value, Ordering::SeqCst);
    }

    pub fn set_accept_remote_start(&self, accept: bool) {
        self.accept_remote_start.store(accept, Ordering::SeqCst);
    }

    pub fn set_accept_remote_stop(&self, accept: bool) {
        self.accept_remote_stop.store(accept, Ordering::SeqCst);
    }

    pub fn remote_start_requests(&self) -> Vec<(u32, String)> {
        self.remote_start_requests.lock().unwrap().clone()
    }

    pub fn remote_stop_requests(&self) -> Vec<u32> {
        self.remote_stop_requests.lock().unwrap().clone()
    }

    pub fn de_authorized(&self) -> Vec<u32> {
        self.de_authorized.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChargePointEventsHandler for FakeEvents {
    async fn tx_start_stop_meter_value(&self, _connector_id: u32) -> i32 {
        self.meter_value.load(Ordering::SeqCst)
    }

    async fn remote_start_transaction_requested(&self, connector_id: u32, id_tag: &str) -> bool {
        self.remote_start_requests
            .lock()
            .unwrap()
            .push((connector_id, id_tag.to_string()));
        self.accept_remote_start.load(Ordering::SeqCst)
    }

    async fn remote_stop_transaction_requested(&self, connector_id: u32) -> bool {
        self.remote_stop_requests.lock().unwrap().push(connector_id);
        self.accept_remote_stop.load(Ordering::SeqCst)
    }

    async fn transaction_de_authorized(&self, connector_id: u32) {
        self.de_authorized.lock().unwrap().push(connector_id);
    }
}

pub struct FakeReservations {
    verdict: Mutex<AuthorizationStatus>,
    cleared: Mutex<Vec<u32>>,
}

impl FakeReservations {
    pub fn new() -> Self {
        Self {
            verdict: Mutex::new(AuthorizationStatus::Accepted),
            cleared: Mutex::new(Vec::new()),
        }
    }

    pub fn set_verdict(&self, verdict: AuthorizationStatus) {
        *self.verdict.lock().unwrap() = verdict;
    }

    pub fn cleared(&self) -> Vec<u32> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReservationManager for FakeReservations {
    async fn is_transaction_allowed(
        &self,
        _connector_id: u32,
        _id_tag: &str,
    ) -> AuthorizationStatus {
        self.verdict.lock().unwrap().clone()
    }

    async fn clear_reservation(&self, connector_id: u32) {
        self.cleared.lock().unwrap().push(connector_id);
    }
}

pub struct FakeAuthCache {
    updates: Mutex<Vec<(String, AuthorizationStatus)>>,
}

impl FakeAuthCache {
    pub fn new() -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn updated_tags(&self) -> Vec<String> {
        self.updates.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl AuthorizationCache for FakeAuthCache {
    async fn update(&self, id_tag: &str, info: &IdTagInfo) {
        self.updates
            .lock()
            .unwrap()
            .push((id_tag.to_string(), info.status.clone()));
    }
}

pub struct FakeSmartCharging {
    install_ok: AtomicBool,
    installed: Mutex<Vec<u32>>,
    assigned: Mutex<Vec<(u32, i32)>>,
    cleared: Mutex<Vec<u32>>,
}

impl FakeSmartCharging {
    pub fn new() -> Self {
        Self {
            install_ok: AtomicBool::new(true),
            installed: Mutex::new(Vec::new()),
            assigned: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
        }
    }

    pub fn set_install_ok(&self, ok: bool) {
        self.install_ok.store(ok, Ordering::SeqCst);
    }

    pub fn installed(&self) -> Vec<u32> {
        self.installed.lock().unwrap().clone()
    }

    pub fn assigned(&self) -> Vec<(u32, i32)> {
        self.assigned.lock().unwrap().clone()
    }

    pub fn cleared(&self) -> Vec<u32> {
        self.cleared.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmartChargingManager for FakeSmartCharging {
    async fn install_tx_profile(&self, connector_id: u32, _profile: &ChargingProfile) -> bool {
        self.installed.lock().unwrap().push(connector_id);
        self.install_ok.load(Ordering::SeqCst)
    }

    async fn assign_pending_tx_profiles(&self, connector_id: u32, transaction_id: i32) {
        self.assigned.lock().unwrap().push((connector_id, transaction_id));
    }

    async fn clear_tx_profiles(&self, connector_id: u32) {
        self.cleared.lock().unwrap().push(connector_id);
    }
}

pub struct FakeMeterValues {
    fifo: Mutex<Option<Arc<TransactionFifo>>>,
    started: Mutex<Vec<u32>>,
    stopped: Mutex<Vec<u32>>,
    stop_samples: Mutex<Vec<MeterValue>>,
}

impl FakeMeterValues {
    pub fn new() -> Self {
        Self {
            fifo: Mutex::new(None),
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            stop_samples: Mutex::new(Vec::new()),
        }
    }

    pub fn fifo_attached(&self) -> bool {
        self.fifo.lock().unwrap().is_some()
    }

    pub fn started(&self) -> Vec<u32> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<u32> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn set_stop_samples(&self, samples: Vec<MeterValue>) {
        *self.stop_samples.lock().unwrap() = samples;
    }
}

#[async_trait]
impl MeterValuesManager for FakeMeterValues {
    fn set_transaction_fifo(&self, fifo: Arc<TransactionFifo>) {
        *self.fifo.lock().unwrap() = Some(fifo);
    }

    async fn start_sampled_meter_values(&self, connector_id: u32) {
        self.started.lock().unwrap().push(connector_id);
    }

    async fn stop_sampled_meter_values(&self, connector_id: u32) {
        self.stopped.lock().unwrap().push(connector_id);
    }

    async fn tx_stop_meter_values(&self, _connector_id: u32) -> Vec<MeterValue> {
        self.stop_samples.lock().unwrap().clone()
    }
}

pub struct FakeStatus {
    registration: Mutex<RegistrationStatus>,
}

impl FakeStatus {
    pub fn new() -> Self {
        Self {
            registration: Mutex::new(RegistrationStatus::Accepted),
        }
    }

    pub fn set_registration(&self, status: RegistrationStatus) {
        *self.registration.lock().unwrap() = status;
    }
}

impl StatusManager for FakeStatus {
    fn registration_status(&self) -> RegistrationStatus {
        self.registration.lock().unwrap().clone()
    }
}

// ── Harness ────────────────────────────────────────────────────

/// Fully wired manager over fakes.
pub struct Harness {
    pub manager: TransactionManager,
    pub store: Arc<InMemoryStore>,
    pub fifo: Arc<TransactionFifo>,
    pub connectors: Arc<Connectors>,
    pub transport: Arc<FakeTransport>,
    pub events: Arc<FakeEvents>,
    pub reservations: Arc<FakeReservations>,
    pub auth_cache: Arc<FakeAuthCache>,
    pub smart_charging: Arc<FakeSmartCharging>,
    pub meter_values: Arc<FakeMeterValues>,
    pub status: Arc<FakeStatus>,
}

impl Harness {
    pub async fn start(connector_count: u32) -> Self {
        Self::start_with_config(connector_count, TransactionsConfig::default()).await
    }

    pub async fn start_with_config(connector_count: u32, config: TransactionsConfig) -> Self {
        Self::start_with_store(connector_count, config, Arc::new(InMemoryStore::new())).await
    }

    pub async fn start_with_store(
        connector_count: u32,
        config: TransactionsConfig,
        store: Arc<InMemoryStore>,
    ) -> Self {
        let connectors = Arc::new(
            Connectors::restore(store.clone(), connector_count)
                .await
                .unwrap(),
        );
        let fifo = Arc::new(TransactionFifo::open(store.clone()).await.unwrap());
        let transport = Arc::new(FakeTransport::new());
        let sender = Arc::new(MessageSender::new(transport.clone()));
        let events = Arc::new(FakeEvents::new());
        let reservations = Arc::new(FakeReservations::new());
        let auth_cache = Arc::new(FakeAuthCache::new());
        let smart_charging = Arc::new(FakeSmartCharging::new());
        let meter_values = Arc::new(FakeMeterValues::new());
        let status = Arc::new(FakeStatus::new());

        let manager = TransactionManager::new(
            config,
            connectors.clone(),
            sender,
            fifo.clone(),
            events.clone(),
            reservations.clone(),
            auth_cache.clone(),
            smart_charging.clone(),
            meter_values.clone(),
            status.clone(),
        );

        Self {
            manager,
            store,
            fifo,
            connectors,
            transport,
            events,
            reservations,
            auth_cache,
            smart_charging,
            meter_values,
            status,
        }
    }
}
