//! The shared handler lifecycle
//!
//! One [`Handler`] is built per invocation. It validates the raw event,
//! extracts the payload, runs source-specific admission, dispatches to the
//! controller and shapes the [`ResponseEnvelope`]. [`Handler::handle_it`] is
//! the only recovery boundary: whatever happens, it returns one envelope.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::config::HandlerConfig;
use crate::context::InvocationContext;
use crate::controller::{Controller, ControllerInput};
use crate::envelope::{INVALID_EVENT_MESSAGE, ResponseEnvelope, STATUS_ERROR, STATUS_OK, is_truthy};
use crate::error::{HandlerError, Result};
use crate::logging::InvocationLogger;
use crate::source::{Admission, DirectSource, InvocationSource};

/// Handler for direct invocations
pub type DirectHandler = Handler<DirectSource>;

/// Lifecycle state for one invocation from source `S`
pub struct Handler<S> {
    pub(crate) source: S,
    context: InvocationContext,
    config: Arc<HandlerConfig>,
    alias: String,
    pub(crate) logger: InvocationLogger,
    payload: Value,
    response: ResponseEnvelope,
    pending_body: Value,
}

impl<S: InvocationSource> Handler<S> {
    /// Build the lifecycle around an invocation source
    pub fn with_source(source: S, context: InvocationContext, config: Arc<HandlerConfig>) -> Self {
        let alias = context.alias();
        let logger = InvocationLogger::new(&context, &alias);
        let response = ResponseEnvelope::with_cors(&config.cors);

        logger.trace("Trace", "Handler::with_source()");
        logger.info("EVENT", source.event_json());

        Self {
            source,
            context,
            config,
            alias,
            logger,
            payload: json!({}),
            response,
            pending_body: Value::String(String::new()),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Replace the application settings seen by this handler and its controller.
    ///
    /// The shared configuration is copied on write; other handlers keep theirs.
    pub fn update_app_config(&mut self, settings: Map<String, Value>) {
        self.logger.debug("Trace", "Handler::update_app_config()");
        Arc::make_mut(&mut self.config).update(settings);
    }

    pub fn logger(&self) -> &InvocationLogger {
        &self.logger
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The envelope as it currently stands
    pub fn response(&self) -> &ResponseEnvelope {
        &self.response
    }

    /// Whether the raw event has the shape this source expects
    pub fn validate_event(&self) -> bool {
        self.source.validate_event(&self.logger)
    }

    /// Replace the payload with the one extracted from the raw event
    pub fn set_payload_from_event(&mut self) -> Result<()> {
        self.payload = self.source.extract_payload(&self.logger)?;
        Ok(())
    }

    /// Dispatch the payload to `controller`.
    ///
    /// Returns `None` without dispatching when a response body is already
    /// pending. The source's post-dispatch step runs only after a successful
    /// dispatch (or a skipped one); controller failures propagate untouched.
    pub async fn start_controller(&mut self, controller: &dyn Controller) -> Result<Option<Value>> {
        self.logger.trace("Trace", "Handler::start_controller()");
        let data = if is_truthy(&self.pending_body) {
            None
        } else {
            let input = ControllerInput {
                payload: self.payload.clone(),
                logger: self.logger.clone(),
                config: Arc::clone(&self.config),
            };
            Some(controller.execute(input).await?)
        };
        self.source.post_dispatch(&self.logger).await?;
        Ok(data)
    }

    /// Replace the envelope. Anything but a JSON object resets it to the default.
    pub fn set_lambda_response(&mut self, value: Value) {
        self.response = match value {
            Value::Object(object) => ResponseEnvelope::from_object(&object, &self.config.cors),
            _ => ResponseEnvelope::with_cors(&self.config.cors),
        };
    }

    /// Serialize the pending body into the envelope and return it.
    ///
    /// A truthy `data` replaces the pending body first. Strings are
    /// serialized like any other value, so they end up quoted.
    pub fn send_response(&mut self, data: Option<Value>) -> ResponseEnvelope {
        if let Some(data) = data.filter(is_truthy) {
            self.pending_body = data;
        }
        self.response.body = self.pending_body.to_string();
        self.logger.info("Lambda Response", &self.response);
        self.response.clone()
    }

    /// Turn `error` into a 500 envelope
    pub fn handle_error(&mut self, error: HandlerError) -> ResponseEnvelope {
        let error = error.to_error_value();
        self.logger.error("Lambda Error", &error);
        self.response.set_json_content_type();
        self.response.status_code = STATUS_ERROR;
        self.response.body = json!({ "error": error }).to_string();
        self.response.clone()
    }

    /// Run the whole lifecycle and return exactly one envelope
    pub async fn handle_it(&mut self, controller: &dyn Controller) -> ResponseEnvelope {
        self.logger.trace("Trace", "Handler::handle_it()");
        if !self.validate_event() {
            self.logger.info("Event Validation Failed", INVALID_EVENT_MESSAGE);
            self.response.reject_invalid_event();
            return self.response.clone();
        }

        match self.run(controller).await {
            Ok(envelope) => envelope,
            Err(error) => self.handle_error(error),
        }
    }

    async fn run(&mut self, controller: &dyn Controller) -> Result<ResponseEnvelope> {
        self.set_payload_from_event()?;

        let data = match self.source.pre_dispatch(&self.payload, &self.logger).await? {
            Admission::Admit => self.start_controller(controller).await?,
            Admission::Defer { body } => {
                self.response.set_json_content_type();
                self.response.status_code = STATUS_OK;
                self.pending_body = body;
                self.source.post_dispatch(&self.logger).await?;
                None
            }
        };

        Ok(self.send_response(data))
    }
}

impl Handler<DirectSource> {
    /// Handler for a directly invoked function; the event is the payload
    pub fn new(event: Value, context: InvocationContext, config: Arc<HandlerConfig>) -> Self {
        Self::with_source(DirectSource::new(event), context, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    fn context() -> InvocationContext {
        InvocationContext::new(
            "orders",
            "12",
            "arn:aws:lambda:us-east-1:123456789012:function:orders:prod",
            "req-1",
        )
    }

    fn settings(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn handler(event: Value) -> DirectHandler {
        DirectHandler::new(event, context(), Arc::new(HandlerConfig::default()))
    }

    /// Counts calls and echoes the payload back
    #[derive(Default)]
    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Controller for Echo {
        async fn execute(&self, input: ControllerInput) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "echo": input.payload }))
        }
    }

    struct Rejecting;

    #[async_trait]
    impl Controller for Rejecting {
        async fn execute(&self, _input: ControllerInput) -> Result<Value> {
            Err(HandlerError::Rejected(json!({ "code": 17 })))
        }
    }

    /// Source that rejects every event
    struct NeverValid;

    #[async_trait]
    impl InvocationSource for NeverValid {
        fn event_json(&self) -> Value {
            Value::Null
        }

        fn validate_event(&self, _logger: &InvocationLogger) -> bool {
            false
        }

        fn extract_payload(&self, _logger: &InvocationLogger) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_construction_defaults() {
        let handler = handler(json!({}));
        assert_eq!(handler.alias(), "prod");
        assert_eq!(handler.payload(), &json!({}));
        assert_eq!(handler.response(), &ResponseEnvelope::default());
        assert_eq!(handler.logger().metadata()["InvokeId"], "req-1");
    }

    #[test]
    fn test_construction_with_empty_context() {
        let handler = DirectHandler::new(
            json!({}),
            InvocationContext::default(),
            Arc::new(HandlerConfig::default()),
        );
        assert_eq!(handler.alias(), "NONE");
    }

    #[tokio::test]
    async fn test_success_serializes_controller_result() {
        let controller = Echo::default();
        let mut handler = handler(json!({ "id": 9 }));

        let envelope = handler.handle_it(&controller).await;

        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.body, r#"{"echo":{"id":9}}"#);
        assert_eq!(handler.payload(), &json!({ "id": 9 }));
        assert_eq!(controller.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_event_short_circuits() {
        let controller = Echo::default();
        let mut handler = Handler::with_source(
            NeverValid,
            context(),
            Arc::new(HandlerConfig::default()),
        );

        let envelope = handler.handle_it(&controller).await;

        assert_eq!(envelope.status_code, 422);
        assert_eq!(
            envelope.body,
            r#"{"message":"Invalid event schema. Unable to process event."}"#
        );
        assert_eq!(envelope.headers["Content-Type"], "application/json");
        assert_eq!(controller.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_controller_error_becomes_500() {
        let mut handler = handler(json!({}));
        let controller = |_input: ControllerInput| async move {
            Err::<Value, HandlerError>(HandlerError::message("boom"))
        };

        let envelope = handler.handle_it(&controller).await;
        let body = envelope.body_json().unwrap();

        assert_eq!(envelope.status_code, 500);
        assert_eq!(body["error"]["message"], "boom");
        assert!(body["error"]["stack"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_rejected_value_serialized_as_is() {
        let mut handler = handler(json!({}));
        let envelope = handler.handle_it(&Rejecting).await;

        assert_eq!(envelope.status_code, 500);
        assert_eq!(envelope.body, r#"{"error":{"code":17}}"#);
    }

    #[tokio::test]
    async fn test_falsy_result_keeps_empty_body() {
        let mut handler = handler(json!({}));
        let controller = |_input: ControllerInput| async move { Ok::<Value, HandlerError>(Value::Null) };

        let envelope = handler.handle_it(&controller).await;

        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.body, r#""""#);
    }

    #[tokio::test]
    async fn test_string_result_is_double_serialized() {
        let mut handler = handler(json!({}));
        let controller =
            |_input: ControllerInput| async move { Ok::<Value, HandlerError>(json!("done")) };

        let envelope = handler.handle_it(&controller).await;
        assert_eq!(envelope.body, r#""done""#);
    }

    #[tokio::test]
    async fn test_start_controller_skips_when_body_pending() {
        let controller = Echo::default();
        let mut handler = handler(json!({}));
        handler.send_response(Some(json!({ "already": true })));

        let data = handler.start_controller(&controller).await.unwrap();

        assert!(data.is_none());
        assert_eq!(controller.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_send_response_last_write_wins() {
        let mut handler = handler(json!({}));
        handler.send_response(Some(json!({ "first": 1 })));
        let envelope = handler.send_response(Some(json!({ "second": 2 })));

        assert_eq!(envelope.body, r#"{"second":2}"#);
        // no data: the pending body is serialized again
        assert_eq!(handler.send_response(None).body, r#"{"second":2}"#);
    }

    #[test]
    fn test_set_lambda_response() {
        let mut handler = handler(json!({}));

        handler.set_lambda_response(json!({ "statusCode": 202, "headers": {}, "body": "x" }));
        assert_eq!(handler.response().status_code, 202);
        assert!(handler.response().headers.is_empty());

        handler.set_lambda_response(json!([1, 2, 3]));
        assert_eq!(handler.response(), &ResponseEnvelope::default());

        handler.set_lambda_response(json!({ "statusCode": 201 }));
        handler.set_lambda_response(json!("not an object"));
        assert_eq!(handler.response(), &ResponseEnvelope::default());

        handler.set_lambda_response(Value::Null);
        assert_eq!(handler.response(), &ResponseEnvelope::default());
    }

    #[test]
    fn test_set_lambda_response_coerces_loose_object() {
        let mut handler = handler(json!({}));

        handler.set_lambda_response(json!({
            "statusCode": 204,
            "headers": { "X-Attempt": 2 },
            "body": { "queued": true }
        }));

        let response = handler.response();
        assert_eq!(response.status_code, 204);
        assert_eq!(response.headers["X-Attempt"], "2");
        assert_eq!(response.body, r#"{"queued":true}"#);
    }

    #[tokio::test]
    async fn test_controller_reads_settings() {
        let config = HandlerConfig::new().with_settings(settings(json!({
            "table": "orders",
            "limits": { "batch": 10, "retries": 3 }
        })));
        let mut handler = DirectHandler::new(json!({ "limits": { "batch": 50 } }), context(), Arc::new(config));
        let controller = |input: ControllerInput| async move {
            let merged = input.config.get_with_overrides(&input.payload);
            Ok::<Value, HandlerError>(json!({
                "table": input.config.get("table").cloned(),
                "limits": merged["limits"].clone()
            }))
        };

        let envelope = handler.handle_it(&controller).await;

        assert_eq!(
            envelope.body_json().unwrap(),
            json!({ "table": "orders", "limits": { "batch": 50, "retries": 3 } })
        );
    }

    #[tokio::test]
    async fn test_update_app_config_is_scoped_to_handler() {
        let shared = Arc::new(HandlerConfig::new().with_settings(settings(json!({ "mode": "live" }))));
        let mut handler = DirectHandler::new(json!({}), context(), Arc::clone(&shared));
        handler.update_app_config(settings(json!({ "mode": "dry-run" })));
        let controller = |input: ControllerInput| async move {
            Ok::<Value, HandlerError>(input.config.get("mode").cloned().unwrap_or(Value::Null))
        };

        let envelope = handler.handle_it(&controller).await;

        assert_eq!(envelope.body, r#""dry-run""#);
        assert_eq!(handler.config().get("mode"), Some(&json!("dry-run")));
        assert_eq!(shared.get("mode"), Some(&json!("live")));
    }

    #[test]
    fn test_handle_error_overwrites_previous_body() {
        let mut handler = handler(json!({}));
        handler.send_response(Some(json!({ "partial": true })));

        let envelope = handler.handle_error(HandlerError::InvalidPayload("bad".to_string()));

        assert_eq!(envelope.status_code, 500);
        let body = envelope.body_json().unwrap();
        assert_eq!(body["error"]["message"], "Invalid payload: bad");
        assert!(body.get("partial").is_none());
    }
}
