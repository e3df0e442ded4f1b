//! Uniform request/response lifecycle for AWS Lambda functions
//!
//! A function can be invoked directly, by an SNS notification or by an SQS
//! delivery. This crate gives all three the same lifecycle and the same
//! response shape, so business logic (a [`Controller`]) only ever sees a
//! payload and a logger.
//!
//! ## Architecture
//!
//! - **[`Handler`]**: validate -> extract payload -> admission -> dispatch ->
//!   shape the [`ResponseEnvelope`]. Exactly one envelope per invocation.
//! - **[`InvocationSource`]**: what differs per source, plugged into the handler:
//!   [`DirectSource`], [`NotificationSource`], [`QueueSource`].
//! - **Delayed admission**: queue messages carrying a `requestedDelay` are
//!   re-enqueued with the remaining delay until they become eligible.
//! - **[`QueueTransport`]**: re-enqueue and acknowledgment, in memory or on SQS.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lambda_lifecycle::{
//!     ControllerInput, HandlerConfig, HandlerError, InvocationContext, LifecycleRuntime,
//! };
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), HandlerError> {
//!     let runtime = LifecycleRuntime::builder()
//!         .config(HandlerConfig::from_env()?)
//!         .controller(|input: ControllerInput| async move {
//!             Ok::<Value, HandlerError>(json!({ "received": input.payload }))
//!         })
//!         .build()?;
//!
//!     let envelope = runtime
//!         .handle_direct(json!({ "id": 1 }), InvocationContext::default())
//!         .await;
//!     assert_eq!(envelope.status_code, 200);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod controller;
pub mod cors;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod logging;
pub mod notification;
pub mod prelude;
pub mod queue;
pub mod runtime;
pub mod source;
pub mod transport;

// Re-exports for convenience
/// Handler configuration threaded into every invocation
pub use config::HandlerConfig;
/// Per-invocation platform metadata
pub use context::InvocationContext;
/// Business-logic seam and its input
pub use controller::{Controller, ControllerInput};
/// Lifecycle error types and result alias
pub use error::{HandlerError, Result, TransportError};
/// The uniform response shape
pub use envelope::ResponseEnvelope;
/// The shared lifecycle and the direct-invocation handler
pub use handler::{DirectHandler, Handler};
/// Structured per-invocation logger
pub use logging::InvocationLogger;
/// SNS-delivered invocations
pub use notification::{NotificationHandler, NotificationSource};
/// SQS-delivered invocations with delayed admission
pub use queue::{QueueHandler, QueueSource, RequestedDelay};
/// Entry-point glue for `lambda_runtime`
pub use runtime::{BatchItemFailure, LifecycleRuntime, LifecycleRuntimeBuilder, QueueBatchResponse};
/// Source capabilities and admission outcome
pub use source::{Admission, DirectSource, InvocationSource};
/// Queue transport abstraction
pub use transport::{InMemoryQueueTransport, QueueTransport};

#[cfg(feature = "sqs")]
pub use transport::SqsQueueTransport;
