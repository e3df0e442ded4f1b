//! In-Memory Queue Transport
//!
//! Records every enqueue and acknowledgment instead of talking to a queue.
//! Suitable for:
//! - Unit and integration testing of controllers and handlers
//! - Local runs without AWS credentials

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::TransportError;
use crate::logging::InvocationLogger;

use super::{AcknowledgeRequest, EnqueueRequest, QueueTransport, TransportResult};

/// In-memory queue transport. Clones share the same recorded state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueTransport {
    /// Every enqueue request, in call order
    enqueued: Arc<RwLock<Vec<EnqueueRequest>>>,
    /// Every acknowledgment request, in call order
    acknowledged: Arc<RwLock<Vec<AcknowledgeRequest>>>,
    fail_enqueue: Arc<AtomicBool>,
    fail_acknowledge: Arc<AtomicBool>,
}

impl InMemoryQueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent enqueue calls fail
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent acknowledge calls fail
    pub fn fail_acknowledge(&self, fail: bool) {
        self.fail_acknowledge.store(fail, Ordering::SeqCst);
    }

    pub async fn enqueued(&self) -> Vec<EnqueueRequest> {
        self.enqueued.read().await.clone()
    }

    pub async fn acknowledged(&self) -> Vec<AcknowledgeRequest> {
        self.acknowledged.read().await.clone()
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueueTransport {
    async fn enqueue(
        &self,
        request: EnqueueRequest,
        logger: &InvocationLogger,
    ) -> TransportResult<()> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(format!(
                "enqueue to {} refused",
                request.queue_url
            )));
        }
        logger.debug("Enqueue", &request);
        debug!("In-memory enqueue to {}", request.queue_url);
        self.enqueued.write().await.push(request);
        Ok(())
    }

    async fn acknowledge(
        &self,
        request: AcknowledgeRequest,
        logger: &InvocationLogger,
    ) -> TransportResult<()> {
        if self.fail_acknowledge.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(format!(
                "acknowledge on {} refused",
                request.queue_url
            )));
        }
        logger.debug("Acknowledge", &request);
        debug!("In-memory acknowledge on {}", request.queue_url);
        self.acknowledged.write().await.push(request);
        Ok(())
    }
}
