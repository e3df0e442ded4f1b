//! Structured, per-invocation logging on top of `tracing`

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{Level, Span, debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

use crate::context::InvocationContext;

/// Install the JSON subscriber used in Lambda.
///
/// `RUST_LOG` wins over `level` when set. Safe to call more than once.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false) // No target for CloudWatch
        .without_time() // CloudWatch adds timestamps
        .json()
        .try_init();
}

/// Logger handed to the lifecycle stages and to controllers.
///
/// Every event is emitted inside the invocation span and carries the
/// correlation metadata collected so far.
#[derive(Debug, Clone)]
pub struct InvocationLogger {
    span: Span,
    metadata: Map<String, Value>,
}

impl InvocationLogger {
    /// Open the invocation span for `context`
    pub fn new(context: &InvocationContext, alias: &str) -> Self {
        let span = tracing::info_span!(
            "invocation",
            lambda_name = %context.function_name,
            lambda_alias = %alias,
            lambda_version = %context.function_version,
            invoke_id = %context.request_id,
            message_id = tracing::field::Empty,
        );

        let mut metadata = Map::new();
        metadata.insert("LambdaName".into(), context.function_name.clone().into());
        metadata.insert("LambdaAlias".into(), alias.into());
        metadata.insert("LambdaVersion".into(), context.function_version.clone().into());
        metadata.insert("InvokeId".into(), context.request_id.clone().into());

        Self { span, metadata }
    }

    /// Attach correlation metadata to all subsequent events
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if key == "messageId" {
            if let Some(id) = value.as_str() {
                self.span.record("message_id", id);
            }
        }
        self.metadata.insert(key, value);
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn trace(&self, label: &str, payload: impl Serialize) {
        self.log(Level::TRACE, label, payload);
    }

    pub fn debug(&self, label: &str, payload: impl Serialize) {
        self.log(Level::DEBUG, label, payload);
    }

    pub fn info(&self, label: &str, payload: impl Serialize) {
        self.log(Level::INFO, label, payload);
    }

    pub fn warn(&self, label: &str, payload: impl Serialize) {
        self.log(Level::WARN, label, payload);
    }

    pub fn error(&self, label: &str, payload: impl Serialize) {
        self.log(Level::ERROR, label, payload);
    }

    fn log(&self, level: Level, label: &str, payload: impl Serialize) {
        let payload = serde_json::to_string(&payload)
            .unwrap_or_else(|e| format!("\"<unserializable payload: {}>\"", e));
        let metadata = Value::Object(self.metadata.clone());

        match level {
            Level::TRACE => trace!(parent: &self.span, %metadata, %payload, "{}", label),
            Level::DEBUG => debug!(parent: &self.span, %metadata, %payload, "{}", label),
            Level::INFO => info!(parent: &self.span, %metadata, %payload, "{}", label),
            Level::WARN => warn!(parent: &self.span, %metadata, %payload, "{}", label),
            _ => error!(parent: &self.span, %metadata, %payload, "{}", label),
        }
    }
}
