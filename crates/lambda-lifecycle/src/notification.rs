//! SNS-delivered invocations

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::HandlerConfig;
use crate::context::InvocationContext;
use crate::envelope::is_truthy;
use crate::error::{HandlerError, Result};
use crate::handler::Handler;
use crate::logging::InvocationLogger;
use crate::source::InvocationSource;

/// Handler for an SNS notification event
pub type NotificationHandler = Handler<NotificationSource>;

/// Pub/sub-delivered invocation source.
///
/// Only the first record of the event is processed.
#[derive(Debug, Clone)]
pub struct NotificationSource {
    event: Value,
}

impl NotificationSource {
    pub fn new(event: Value) -> Self {
        Self { event }
    }

    /// `Records[0].Sns` of the event, if present
    fn notification(&self) -> Option<&Value> {
        self.event
            .get("Records")
            .and_then(Value::as_array)
            .and_then(|records| records.first())
            .and_then(|record| record.get("Sns"))
            .filter(|sns| is_truthy(sns))
    }

    /// Id of the first notification, used for log correlation
    pub fn message_id(&self) -> Option<&str> {
        self.notification()
            .and_then(|sns| sns.get("MessageId"))
            .and_then(Value::as_str)
    }
}

#[async_trait]
impl InvocationSource for NotificationSource {
    fn event_json(&self) -> Value {
        self.event.clone()
    }

    /// A non-empty `Records` array whose first entry carries an `Sns` object
    fn validate_event(&self, logger: &InvocationLogger) -> bool {
        logger.debug("Trace", "NotificationSource::validate_event()");
        self.notification().is_some()
    }

    /// `Records[0].Sns.Message` parsed as JSON. Parse failures are not recovered.
    fn extract_payload(&self, _logger: &InvocationLogger) -> Result<Value> {
        let message = self
            .notification()
            .and_then(|sns| sns.get("Message"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                HandlerError::InvalidPayload("notification has no Message".to_string())
            })?;
        Ok(serde_json::from_str(message)?)
    }
}

impl Handler<NotificationSource> {
    /// Handler for an SNS event
    pub fn new(event: Value, context: InvocationContext, config: Arc<HandlerConfig>) -> Self {
        let mut handler = Self::with_source(NotificationSource::new(event), context, config);
        if handler.validate_event() {
            if let Some(message_id) = handler.source.message_id().map(str::to_string) {
                handler.logger.add_metadata("messageId", message_id);
            }
            handler.logger.debug("Trace", "NotificationHandler::new()");
        }
        handler
    }
}
