//! Test rig: fake transport and collaborators wired around the
//! transaction manager, driving it exactly like the surrounding charge
//! point firmware would.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_ocpp::v1_6::types::{
    AuthorizationStatus, ChargingProfile, IdTagInfo, MeterValue, RegistrationStatus,
};
use serde_json::{json, Value};

use texnouz_chargepoint::application::ports::{
    AuthorizationCache, CallTransport, ChargePointEventsHandler, MeterValuesManager,
    ReservationManager, SmartChargingManager, StatusManager,
};
use texnouz_chargepoint::support::TransportError;
use texnouz_chargepoint::{
    Connectors, InMemoryStore, MessageSender, TransactionFifo, TransactionManager,
    TransactionsConfig,
};

pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

pub fn start_response(status: &str, transaction_id: i32) -> Value {
    json!({
        "transactionId": transaction_id,
        "idTagInfo": { "status": status }
    })
}

// ── Fake transport ─────────────────────────────────────────────

enum Scripted {
    Respond(Value),
    Fail,
}

pub struct CentralSystemStub {
    connected: AtomicBool,
    script: Mutex<VecDeque<Scripted>>,
    pub log: Mutex<Vec<(String, Value)>>,
}

impl CentralSystemStub {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn respond(&self, value: Value) {
        self.script.lock().unwrap().push_back(Scripted::Respond(value));
    }

    pub fn fail_next(&self) {
        self.script.lock().unwrap().push_back(Scripted::Fail);
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.log.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(a, _)| a.clone()).collect()
    }
}

#[async_trait]
impl CallTransport for CentralSystemStub {
    async fn call(&self, action: &str, payload: Value) -> Result<Value, TransportError> {
        self.log.lock().unwrap().push((action.to_string(), payload));
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Respond(value)) => Ok(value),
            Some(Scripted::Fail) => Err(TransportError::Timeout),
            None => Ok(json!({})),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// ── Fake collaborators ─────────────────────────────────────────

#[derive(Default)]
pub struct Cabinet {
    pub reject_remote_start: AtomicBool,
    pub remote_starts: Mutex<Vec<(u32, String)>>,
    pub remote_stops: Mutex<Vec<u32>>,
    pub de_authorized: Mutex<Vec<u32>>,
}

#[async_trait]
impl ChargePointEventsHandler for Cabinet {
    async fn tx_start_stop_meter_value(&self, _connector_id: u32) -> i32 {
        1500
    }

    async fn remote_start_transaction_requested(&self, connector_id: u32, id_tag: &str) -> bool {
        self.remote_starts
            .lock()
            .unwrap()
            .push((connector_id, id_tag.to_string()));
        !self.reject_remote_start.load(Ordering::SeqCst)
    }

    async fn remote_stop_transaction_requested(&self, connector_id: u32) -> bool {
        self.remote_stops.lock().unwrap().push(connector_id);
        true
    }

    async fn transaction_de_authorized(&self, connector_id: u32) {
        self.de_authorized.lock().unwrap().push(connector_id);
    }
}

pub struct Reservations {
    pub verdict: Mutex<AuthorizationStatus>,
    pub cleared: Mutex<Vec<u32>>,
}

impl Default for Reservations {
    fn default() -> Self {
        Self {
            verdict: Mutex::new(AuthorizationStatus::Accepted),
            cleared: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ReservationManager for Reservations {
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

#[derive(Default)]
pub struct AuthCache {
    pub updates: Mutex<Vec<(String, AuthorizationStatus)>>,
}

#[async_trait]
impl AuthorizationCache for AuthCache {
    async fn update(&self, id_tag: &str, info: &IdTagInfo) {
        self.updates
            .lock()
            .unwrap()
            .push((id_tag.to_string(), info.status.clone()));
    }
}

#[derive(Default)]
pub struct SmartCharging {
    pub assigned: Mutex<Vec<(u32, i32)>>,
    pub cleared: Mutex<Vec<u32>>,
}

#[async_trait]
impl SmartChargingManager for SmartCharging {
    async fn install_tx_profile(&self, _connector_id: u32, _profile: &ChargingProfile) -> bool {
        true
    }

    async fn assign_pending_tx_profiles(&self, connector_id: u32, transaction_id: i32) {
        self.assigned.lock().unwrap().push((connector_id, transaction_id));
    }

    async fn clear_tx_profiles(&self, connector_id: u32) {
        self.cleared.lock().unwrap().push(connector_id);
    }
}

#[derive(Default)]
pub struct Metering {
    pub fifo: Mutex<Option<Arc<TransactionFifo>>>,
    pub sampling: Mutex<Vec<u32>>,
    pub stop_samples: Mutex<Vec<MeterValue>>,
}

#[async_trait]
impl MeterValuesManager for Metering {
    fn set_transaction_fifo(&self, fifo: Arc<TransactionFifo>) {
        *self.fifo.lock().unwrap() = Some(fifo);
    }

    async fn start_sampled_meter_values(&self, connector_id: u32) {
        self.sampling.lock().unwrap().push(connector_id);
    }

    async fn stop_sampled_meter_values(&self, connector_id: u32) {
        self.sampling.lock().unwrap().retain(|&id| id != connector_id);
    }

    async fn tx_stop_meter_values(&self, _connector_id: u32) -> Vec<MeterValue> {
        self.stop_samples.lock().unwrap().clone()
    }
}

pub struct Registration {
    pub status: Mutex<RegistrationStatus>,
}

impl Default for Registration {
    fn default() -> Self {
        Self {
            status: Mutex::new(RegistrationStatus::Accepted),
        }
    }
}

impl StatusManager for Registration {
    fn registration_status(&self) -> RegistrationStatus {
        self.status.lock().unwrap().clone()
    }
}

// ── Rig ────────────────────────────────────────────────────────

pub struct Rig {
    pub manager: TransactionManager,
    pub store: Arc<InMemoryStore>,
    pub fifo: Arc<TransactionFifo>,
    pub connectors: Arc<Connectors>,
    pub central: Arc<CentralSystemStub>,
    pub cabinet: Arc<Cabinet>,
    pub reservations: Arc<Reservations>,
    pub auth_cache: Arc<AuthCache>,
    pub smart_charging: Arc<SmartCharging>,
    pub metering: Arc<Metering>,
    pub registration: Arc<Registration>,
}

impl Rig {
    pub async fn start(connector_count: u32) -> Self {
        Self::with_store(connector_count, TransactionsConfig::default(), Arc::new(InMemoryStore::new())).await
    }

    pub async fn with_config(connector_count: u32, config: TransactionsConfig) -> Self {
        Self::with_store(connector_count, config, Arc::new(InMemoryStore::new())).await
    }

    /// Build a rig over an existing store, as after a process restart.
    pub async fn with_store(
        connector_count: u32,
        config: TransactionsConfig,
        store: Arc<InMemoryStore>,
    ) -> Self {
        let connectors = Arc::new(
            Connectors::restore(store.clone(), connector_count)
                .await
                .expect("restore connectors"),
        );
        let fifo = Arc::new(TransactionFifo::open(store.clone()).await.expect("open fifo"));
        let central = Arc::new(CentralSystemStub::new());
        let cabinet = Arc::new(Cabinet::default());
        let reservations = Arc::new(Reservations::default());
        let auth_cache = Arc::new(AuthCache::default());
        let smart_charging = Arc::new(SmartCharging::default());
        let metering = Arc::new(Metering::default());
        let registration = Arc::new(Registration::default());

        let manager = TransactionManager::new(
            config,
            connectors.clone(),
            Arc::new(MessageSender::new(central.clone())),
            fifo.clone(),
            cabinet.clone(),
            reservations.clone(),
            auth_cache.clone(),
            smart_charging.clone(),
            metering.clone(),
            registration.clone(),
        );

        Self {
            manager,
            store,
            fifo,
            connectors,
            central,
            cabinet,
            reservations,
            auth_cache,
            smart_charging,
            metering,
            registration,
        }
    }
}
