//! Queue transport abstraction
//!
//! The lifecycle only needs two operations from a queue: put a payload back
//! with a requested delay, and permanently remove a processed message.
//! Backends:
//! - InMemory: testing and local runs
//! - SQS: AWS deployments (feature `sqs`)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;
use crate::logging::InvocationLogger;

pub mod in_memory;

#[cfg(feature = "sqs")]
pub mod sqs;

pub use in_memory::InMemoryQueueTransport;

#[cfg(feature = "sqs")]
pub use sqs::SqsQueueTransport;

/// Message attribute carrying the requested delay in seconds
pub const REQUESTED_DELAY_ATTRIBUTE: &str = "requestedDelay";

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Put `payload` back on `queue_url`, to be admitted after `requested_delay` seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub payload: Value,
    pub requested_delay: u64,
    pub queue_url: String,
}

/// Remove the message identified by `receipt_handle` from `queue_url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgeRequest {
    pub queue_url: String,
    pub receipt_handle: String,
}

/// Queue operations used by [`QueueHandler`](crate::QueueHandler).
///
/// Implementations are shared by concurrently running invocations and must be
/// safe for concurrent use. Failures are surfaced unmodified.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Re-enqueue a payload with a new requested delay
    async fn enqueue(
        &self,
        request: EnqueueRequest,
        logger: &InvocationLogger,
    ) -> TransportResult<()>;

    /// Permanently remove a processed message
    async fn acknowledge(
        &self,
        request: AcknowledgeRequest,
        logger: &InvocationLogger,
    ) -> TransportResult<()>;
}
