//! SQS-delivered invocations with delayed admission
//!
//! A message may ask not to be processed before `requestedDelay` seconds have
//! passed since it was sent. Until then the handler puts the payload back on
//! the same queue with the remaining delay and acknowledges the original, so
//! the message keeps hopping until it becomes eligible.

use std::sync::Arc;

use async_trait::async_trait;
use aws_lambda_events::event::sqs::SqsMessage;
use serde_json::{Value, json};

use crate::clock::{Clock, SystemClock};
use crate::config::HandlerConfig;
use crate::context::InvocationContext;
use crate::envelope::is_truthy;
use crate::error::{HandlerError, Result};
use crate::handler::Handler;
use crate::logging::InvocationLogger;
use crate::source::{Admission, InvocationSource};
use crate::transport::{AcknowledgeRequest, EnqueueRequest, QueueTransport, REQUESTED_DELAY_ATTRIBUTE};

/// Record attribute holding the send time in Unix milliseconds
pub const SENT_TIMESTAMP_ATTRIBUTE: &str = "SentTimestamp";

/// Handler for one SQS record
pub type QueueHandler = Handler<QueueSource>;

/// Minimum wait, in seconds, before a queued message may be processed
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct RequestedDelay(f64);

impl RequestedDelay {
    /// Negative, NaN and infinite inputs collapse to no delay
    pub fn from_seconds(seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            Self(seconds)
        } else {
            Self(0.0)
        }
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }

    pub fn as_millis(&self) -> f64 {
        self.0 * 1000.0
    }

    pub fn is_requested(&self) -> bool {
        self.0 > 0.0
    }

    /// The message attribute wins; the payload's `requestedDelay` field is the fallback
    pub fn resolve(record: &SqsMessage, payload: &Value) -> Self {
        let from_attribute = record
            .message_attributes
            .get(REQUESTED_DELAY_ATTRIBUTE)
            .and_then(|attr| attr.string_value.as_deref())
            .map(parse_seconds)
            .unwrap_or(0.0);

        let seconds = if from_attribute != 0.0 && !from_attribute.is_nan() {
            from_attribute
        } else {
            match payload.get(REQUESTED_DELAY_ATTRIBUTE) {
                Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                Some(Value::String(s)) => parse_seconds(s),
                _ => 0.0,
            }
        };

        Self::from_seconds(seconds)
    }
}

fn parse_seconds(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }
    raw.parse::<f64>().unwrap_or(f64::NAN)
}

/// Payload carried by a queue record.
///
/// The body is JSON-parsed; a body that forwarded an SNS notification has its
/// `Message` unwrapped and parsed the same way. Anything unparsable is `{}`.
pub fn payload_from_record(record: &SqsMessage) -> Value {
    let payload = parse_object_or_empty(record.body.as_deref().unwrap_or_default());
    let forwarded = match payload.get("Message") {
        Some(Value::String(message)) if !message.is_empty() => {
            Some(parse_object_or_empty(message))
        }
        Some(message) if is_truthy(message) => Some(json!({})),
        _ => None,
    };
    forwarded.unwrap_or(payload)
}

fn parse_object_or_empty(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| json!({}))
}

/// Queue-delivered invocation source
pub struct QueueSource {
    record: SqsMessage,
    queue_name: String,
    queue_url: String,
    payload: Value,
    requested_delay: RequestedDelay,
    transport: Arc<dyn QueueTransport>,
    clock: Arc<dyn Clock>,
}

impl QueueSource {
    pub fn new(
        record: SqsMessage,
        queue_name: impl Into<String>,
        config: &HandlerConfig,
        transport: Arc<dyn QueueTransport>,
    ) -> Self {
        let queue_name = queue_name.into();
        let queue_url = format!("{}{}", config.queue_base_url, queue_name);
        let payload = payload_from_record(&record);
        let requested_delay = RequestedDelay::resolve(&record, &payload);

        Self {
            record,
            queue_name,
            queue_url,
            payload,
            requested_delay,
            transport,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn record(&self) -> &SqsMessage {
        &self.record
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn requested_delay(&self) -> RequestedDelay {
        self.requested_delay
    }

    /// Decide whether the record is old enough to be processed.
    ///
    /// When it is not, the payload is re-enqueued on the same queue with the
    /// remaining delay (rounded up to whole seconds) and the deferral body is
    /// returned.
    pub async fn check_execution_start_threshold(
        &self,
        payload: &Value,
        logger: &InvocationLogger,
    ) -> Result<Admission> {
        logger.debug("Trace", "QueueSource::check_execution_start_threshold()");

        let sent_at = self
            .record
            .attributes
            .get(SENT_TIMESTAMP_ATTRIBUTE)
            .and_then(|s| s.trim().parse::<i64>().ok());
        let Some(sent_at) = sent_at else {
            logger.warn("Check Delay", "record has no usable SentTimestamp; admitting");
            return Ok(Admission::Admit);
        };

        let time_delayed = self.clock.now_millis().saturating_sub(sent_at);
        let requested = self.requested_delay.as_millis();
        logger.info(
            "Check Delay",
            format!("timeDelayed - {}; requestedDelay - {}", time_delayed, requested),
        );

        if (time_delayed as f64) >= requested {
            return Ok(Admission::Admit);
        }

        let remaining = ((requested - time_delayed as f64) / 1000.0).ceil() as u64;
        let message = format!("{} seconds remaining before processing", remaining);
        logger.info("Requested Delay Not Met", &message);

        self.transport
            .enqueue(
                EnqueueRequest {
                    payload: payload.clone(),
                    requested_delay: remaining,
                    queue_url: self.queue_url.clone(),
                },
                logger,
            )
            .await?;

        // The body is stored pre-serialized, so the envelope carries it as a JSON string
        Ok(Admission::Defer {
            body: Value::String(json!({ "message": message }).to_string()),
        })
    }
}

#[async_trait]
impl InvocationSource for QueueSource {
    fn event_json(&self) -> Value {
        serde_json::to_value(&self.record).unwrap_or(Value::Null)
    }

    /// The record must carry delivery attributes and a non-zero requested delay
    fn validate_event(&self, logger: &InvocationLogger) -> bool {
        logger.debug("Trace", "QueueSource::validate_event()");
        !self.record.attributes.is_empty() && self.requested_delay.is_requested()
    }

    fn extract_payload(&self, _logger: &InvocationLogger) -> Result<Value> {
        Ok(self.payload.clone())
    }

    async fn pre_dispatch(&self, payload: &Value, logger: &InvocationLogger) -> Result<Admission> {
        self.check_execution_start_threshold(payload, logger).await
    }

    /// Remove the source message once it has been handled
    async fn post_dispatch(&self, logger: &InvocationLogger) -> Result<()> {
        let receipt_handle = self.record.receipt_handle.clone().ok_or_else(|| {
            HandlerError::InvalidPayload("queue record has no receipt handle".to_string())
        })?;

        self.transport
            .acknowledge(
                AcknowledgeRequest {
                    queue_url: self.queue_url.clone(),
                    receipt_handle,
                },
                logger,
            )
            .await?;
        Ok(())
    }
}

impl Handler<QueueSource> {
    /// Handler for one record of an SQS event delivered from `queue_name`
    pub fn new(
        record: SqsMessage,
        context: InvocationContext,
        queue_name: impl Into<String>,
        config: Arc<HandlerConfig>,
        transport: Arc<dyn QueueTransport>,
    ) -> Self {
        let source = QueueSource::new(record, queue_name, &config, transport);
        let message_id = source.record.message_id.clone();

        let mut handler = Self::with_source(source, context, config);
        if let Some(message_id) = message_id {
            handler.logger.add_metadata("messageId", message_id);
        }
        handler.logger.debug("Trace", "QueueHandler::new()");
        handler
    }

    /// Use `clock` instead of the system clock for admission checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.source.clock = clock;
        self
    }

    pub fn queue_url(&self) -> &str {
        self.source.queue_url()
    }

    pub fn requested_delay(&self) -> RequestedDelay {
        self.source.requested_delay()
    }

    /// Run the admission check against the current payload
    pub async fn check_execution_start_threshold(&self) -> Result<Admission> {
        self.source
            .check_execution_start_threshold(self.payload(), &self.logger)
            .await
    }
}
