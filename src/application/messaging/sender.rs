//! Typed OCPP message sender
//!
//! Wraps the raw [`CallTransport`] with request serialization, response
//! parsing and — for transaction-critical calls — the FIFO fallback: a
//! call that cannot be delivered is appended to the durable FIFO before
//! the caller sees the failure, so exactly one of {delivered, queued}
//! holds when `call_or_enqueue` returns.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::application::ports::CallTransport;
use crate::domain::fifo::{MessageAction, TransactionFifo};
use crate::support::StoreError;

/// Outcome of one OCPP call.
///
/// `Failed` covers transport errors, timeouts and undecodable responses;
/// the distinction never matters to callers because either way there is
/// no usable response.
#[derive(Debug)]
pub enum CallOutcome<R> {
    Ok(R),
    Failed,
}

/// Typed sender over the call transport.
pub struct MessageSender {
    transport: Arc<dyn CallTransport>,
}

impl MessageSender {
    pub fn new(transport: Arc<dyn CallTransport>) -> Self {
        Self { transport }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Fire one typed request and parse the response.
    pub async fn call<Req, Resp>(&self, action: MessageAction, request: &Req) -> CallOutcome<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = match serde_json::to_value(request) {
            Ok(payload) => payload,
            Err(e) => {
                error!(action = %action, error = %e, "Cannot serialize request");
                return CallOutcome::Failed;
            }
        };
        match self.call_raw(action.as_str(), payload).await {
            CallOutcome::Ok(value) => Self::parse_response(action.as_str(), value),
            CallOutcome::Failed => CallOutcome::Failed,
        }
    }

    /// Fire one typed request; on send failure the serialized request is
    /// durably appended to `fifo` before this returns.
    ///
    /// Only FIFO persistence failures surface as `Err` — losing the
    /// queued copy would silently drop a transaction-critical message.
    pub async fn call_or_enqueue<Req, Resp>(
        &self,
        action: MessageAction,
        request: &Req,
        fifo: &TransactionFifo,
    ) -> Result<CallOutcome<Resp>, StoreError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(request)?;
        match self.transport.call(action.as_str(), payload.clone()).await {
            Ok(value) => match serde_json::from_value(value) {
                Ok(response) => Ok(CallOutcome::Ok(response)),
                Err(e) => {
                    warn!(action = %action, error = %e, "Undecodable response, queueing for retry");
                    fifo.push(action, payload).await?;
                    Ok(CallOutcome::Failed)
                }
            },
            Err(e) => {
                warn!(action = %action, error = %e, "Send failed, queueing for retry");
                fifo.push(action, payload).await?;
                Ok(CallOutcome::Failed)
            }
        }
    }

    /// Replay an already-serialized payload (FIFO drain path).
    pub async fn call_raw(&self, action: &str, payload: Value) -> CallOutcome<Value> {
        match self.transport.call(action, payload).await {
            Ok(value) => CallOutcome::Ok(value),
            Err(e) => {
                warn!(action, error = %e, "Call failed");
                CallOutcome::Failed
            }
        }
    }

    fn parse_response<Resp: DeserializeOwned>(action: &str, value: Value) -> CallOutcome<Resp> {
        match serde_json::from_value(value) {
            Ok(response) => CallOutcome::Ok(response),
            Err(e) => {
                error!(action, error = %e, "Undecodable response");
                CallOutcome::Failed
            }
        }
    }
}
