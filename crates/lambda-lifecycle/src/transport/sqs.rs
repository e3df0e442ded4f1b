//! AWS SQS Queue Transport
//!
//! Re-enqueues deferred payloads with `SendMessage` and acknowledges processed
//! messages with `DeleteMessage`.
//!
//! SQS caps native message delay at 15 minutes. Longer requested delays are
//! carried in the `requestedDelay` attribute and re-checked on every
//! delivery, so each hop waits at most [`MAX_DELAY_SECONDS`].

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::MessageAttributeValue;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::logging::InvocationLogger;

use super::{
    AcknowledgeRequest, EnqueueRequest, QueueTransport, REQUESTED_DELAY_ATTRIBUTE,
    TransportResult,
};

/// Largest `DelaySeconds` SQS accepts
pub const MAX_DELAY_SECONDS: u64 = 900;

/// SQS-backed queue transport
#[derive(Debug, Clone)]
pub struct SqsQueueTransport {
    client: Client,
}

impl SqsQueueTransport {
    /// Create a transport from the default AWS configuration chain
    pub async fn new() -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        info!("SQS queue transport initialized");
        Self::with_client(Client::new(&aws_config))
    }

    /// Create a transport around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Native delay for one hop of a requested delay
pub fn native_delay_seconds(requested_delay: u64) -> i32 {
    requested_delay.min(MAX_DELAY_SECONDS) as i32
}

#[async_trait]
impl QueueTransport for SqsQueueTransport {
    async fn enqueue(
        &self,
        request: EnqueueRequest,
        logger: &InvocationLogger,
    ) -> TransportResult<()> {
        let body = serde_json::to_string(&request.payload)?;
        let delay_attribute = MessageAttributeValue::builder()
            .data_type("Number")
            .string_value(request.requested_delay.to_string())
            .build()
            .map_err(|e| TransportError::Sqs(e.to_string()))?;

        logger.debug("SQS SendMessage", &request);

        let output = self
            .client
            .send_message()
            .queue_url(&request.queue_url)
            .message_body(body)
            .delay_seconds(native_delay_seconds(request.requested_delay))
            .message_attributes(REQUESTED_DELAY_ATTRIBUTE, delay_attribute)
            .send()
            .await
            .map_err(|e| TransportError::Sqs(e.to_string()))?;

        debug!(
            "Re-enqueued message {:?} on {}",
            output.message_id(),
            request.queue_url
        );
        Ok(())
    }

    async fn acknowledge(
        &self,
        request: AcknowledgeRequest,
        logger: &InvocationLogger,
    ) -> TransportResult<()> {
        logger.debug("SQS DeleteMessage", &request);

        self.client
            .delete_message()
            .queue_url(&request.queue_url)
            .receipt_handle(&request.receipt_handle)
            .send()
            .await
            .map_err(|e| TransportError::Sqs(e.to_string()))?;

        debug!("Deleted message from {}", request.queue_url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_delay_capped() {
        assert_eq!(native_delay_seconds(0), 0);
        assert_eq!(native_delay_seconds(30), 30);
        assert_eq!(native_delay_seconds(900), 900);
        assert_eq!(native_delay_seconds(3600), 900);
    }
}
