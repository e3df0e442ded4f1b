//! Per-source capabilities plugged into the shared lifecycle

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::logging::InvocationLogger;

/// Outcome of the pre-dispatch admission step
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Dispatch to the controller now
    Admit,
    /// Do not dispatch; respond 200 with `body` as the pending response body
    Defer { body: Value },
}

/// What distinguishes one invocation source from another.
///
/// [`Handler`](crate::Handler) drives these hooks in a fixed order:
/// `validate_event` -> `extract_payload` -> `pre_dispatch` -> controller ->
/// `post_dispatch`.
#[async_trait]
pub trait InvocationSource: Send + Sync {
    /// The raw event as JSON, for logging
    fn event_json(&self) -> Value;

    /// Shape check for the raw event. Accept-all by default.
    fn validate_event(&self, _logger: &InvocationLogger) -> bool {
        true
    }

    /// Unwrap the business payload from the raw event
    fn extract_payload(&self, logger: &InvocationLogger) -> Result<Value>;

    /// Admission control before the controller runs
    async fn pre_dispatch(&self, _payload: &Value, _logger: &InvocationLogger) -> Result<Admission> {
        Ok(Admission::Admit)
    }

    /// Cleanup after a successful dispatch (or a deferral)
    async fn post_dispatch(&self, _logger: &InvocationLogger) -> Result<()> {
        Ok(())
    }
}

/// Direct invocation: the event is the payload
#[derive(Debug, Clone)]
pub struct DirectSource {
    event: Value,
}

impl DirectSource {
    pub fn new(event: Value) -> Self {
        Self { event }
    }
}

#[async_trait]
impl InvocationSource for DirectSource {
    fn event_json(&self) -> Value {
        self.event.clone()
    }

    fn extract_payload(&self, _logger: &InvocationLogger) -> Result<Value> {
        Ok(self.event.clone())
    }
}
