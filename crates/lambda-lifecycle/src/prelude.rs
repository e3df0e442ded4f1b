//! # Lambda Lifecycle Prelude
//!
//! Convenient re-exports of the types most handlers and entry points use.
//!
//! ```rust
//! use lambda_lifecycle::prelude::*;
//! ```

pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::config::HandlerConfig;
pub use crate::context::InvocationContext;
pub use crate::controller::{Controller, ControllerInput};
pub use crate::envelope::ResponseEnvelope;
pub use crate::error::{HandlerError, Result, TransportError};
pub use crate::handler::{DirectHandler, Handler};
pub use crate::logging::{InvocationLogger, init_tracing};
pub use crate::notification::NotificationHandler;
pub use crate::queue::{QueueHandler, RequestedDelay};
pub use crate::runtime::{BatchItemFailure, LifecycleRuntime, QueueBatchResponse};
pub use crate::source::Admission;
pub use crate::transport::{InMemoryQueueTransport, QueueTransport};

#[cfg(feature = "sqs")]
pub use crate::transport::SqsQueueTransport;

// Lambda runtime types commonly used by entry points
pub use aws_lambda_events::event::sqs::{SqsEvent, SqsMessage};
pub use lambda_runtime::{Error as LambdaRuntimeError, LambdaEvent};
