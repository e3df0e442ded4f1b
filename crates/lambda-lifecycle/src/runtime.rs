//! Entry-point glue between `lambda_runtime` events and the handlers
//!
//! A [`LifecycleRuntime`] holds what outlives a single invocation (config,
//! controller, transport, clock) and builds a fresh handler per event.

use std::sync::Arc;

use aws_lambda_events::event::sqs::SqsEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::HandlerConfig;
use crate::context::InvocationContext;
use crate::controller::Controller;
use crate::envelope::{ResponseEnvelope, STATUS_OK};
use crate::error::{HandlerError, Result};
use crate::handler::DirectHandler;
use crate::notification::NotificationHandler;
use crate::queue::QueueHandler;
use crate::transport::{InMemoryQueueTransport, QueueTransport};

/// Partial batch response for SQS event source mappings.
///
/// Only the listed messages are made visible again by SQS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBatchResponse {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

/// One failed message of an SQS batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

/// Shared collaborators for every invocation of the function
pub struct LifecycleRuntime {
    config: Arc<HandlerConfig>,
    controller: Arc<dyn Controller>,
    transport: Arc<dyn QueueTransport>,
    clock: Arc<dyn Clock>,
    queue_name: String,
}

impl LifecycleRuntime {
    pub fn builder() -> LifecycleRuntimeBuilder {
        LifecycleRuntimeBuilder::new()
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Run a directly invoked event through the lifecycle
    pub async fn handle_direct(&self, event: Value, context: InvocationContext) -> ResponseEnvelope {
        let mut handler = DirectHandler::new(event, context, Arc::clone(&self.config));
        handler.handle_it(self.controller.as_ref()).await
    }

    /// Run an SNS event through the lifecycle
    pub async fn handle_notification(
        &self,
        event: Value,
        context: InvocationContext,
    ) -> ResponseEnvelope {
        let mut handler = NotificationHandler::new(event, context, Arc::clone(&self.config));
        handler.handle_it(self.controller.as_ref()).await
    }

    /// Run every record of an SQS event through its own handler, one after another.
    ///
    /// Records whose envelope is not a 200 are reported as batch item failures.
    pub async fn handle_queue_batch(
        &self,
        event: SqsEvent,
        context: InvocationContext,
    ) -> QueueBatchResponse {
        let mut response = QueueBatchResponse::default();
        let total = event.records.len();

        for record in event.records {
            let item_identifier = record.message_id.clone().unwrap_or_default();
            let mut handler = QueueHandler::new(
                record,
                context.clone(),
                self.queue_name.clone(),
                Arc::clone(&self.config),
                Arc::clone(&self.transport),
            )
            .with_clock(Arc::clone(&self.clock));

            let envelope = handler.handle_it(self.controller.as_ref()).await;
            if envelope.status_code != STATUS_OK {
                warn!(
                    "Record {} finished with status {}",
                    item_identifier, envelope.status_code
                );
                response
                    .batch_item_failures
                    .push(BatchItemFailure { item_identifier });
            }
        }

        info!(
            "Processed {} queue records, {} failed",
            total,
            response.batch_item_failures.len()
        );
        response
    }
}

/// Builder for [`LifecycleRuntime`]
pub struct LifecycleRuntimeBuilder {
    config: Option<HandlerConfig>,
    controller: Option<Arc<dyn Controller>>,
    transport: Option<Arc<dyn QueueTransport>>,
    clock: Arc<dyn Clock>,
    queue_name: String,
}

impl Default for LifecycleRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            controller: None,
            transport: None,
            clock: Arc::new(SystemClock),
            queue_name: String::new(),
        }
    }

    /// Configuration shared by every handler (defaults to [`HandlerConfig::default`])
    pub fn config(mut self, config: HandlerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Business logic invoked with each payload (required)
    pub fn controller(mut self, controller: impl Controller + 'static) -> Self {
        self.controller = Some(Arc::new(controller));
        self
    }

    /// Transport used for re-enqueue and acknowledgment
    pub fn transport(mut self, transport: impl QueueTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Name of the queue this function reads from
    pub fn queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    pub fn build(self) -> Result<LifecycleRuntime> {
        let controller = self
            .controller
            .ok_or_else(|| HandlerError::Config("a controller is required".to_string()))?;

        let config = self.config.unwrap_or_default();
        crate::cors::validate_config(&config.cors)?;

        let transport = self.transport.unwrap_or_else(|| {
            warn!("No queue transport configured; using the in-memory transport");
            Arc::new(InMemoryQueueTransport::new())
        });

        Ok(LifecycleRuntime {
            config: Arc::new(config),
            controller,
            transport,
            clock: self.clock,
            queue_name: self.queue_name,
        })
    }
}
