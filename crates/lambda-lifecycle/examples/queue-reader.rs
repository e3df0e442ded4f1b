//! Queue reader Lambda
//!
//! Reads SQS batches, honours each message's `requestedDelay` and echoes the
//! payload back through the lifecycle.
//!
//! Environment:
//! - `SQS_BASE_URL`: queue URL prefix, e.g. `https://sqs.us-east-1.amazonaws.com/123456789012/`
//! - `QUEUE_NAME`: name of the queue this function is mapped to
//! - `LOG_LEVEL`: tracing filter (default `trace`)
//!
//! Usage:
//! ```bash
//! cargo lambda build --package lambda-lifecycle --bin queue-reader
//! cargo lambda deploy --package lambda-lifecycle --bin queue-reader
//! ```

use std::sync::Arc;

use lambda_lifecycle::prelude::*;
use lambda_runtime::service_fn;
use serde_json::{Value, json};

#[tokio::main]
async fn main() -> std::result::Result<(), LambdaRuntimeError> {
    let config = HandlerConfig::from_env()?;
    init_tracing(&config.log_level);

    let queue_name = std::env::var("QUEUE_NAME").unwrap_or_else(|_| "default".to_string());

    let runtime = LifecycleRuntime::builder()
        .config(config)
        .queue_name(queue_name)
        .transport(SqsQueueTransport::new().await)
        .controller(|input: ControllerInput| async move {
            input.logger.info("Echo", &input.payload);
            Ok::<Value, HandlerError>(json!({ "received": input.payload }))
        })
        .build()?;
    let runtime = Arc::new(runtime);

    tracing::info!("Queue reader ready for {}", runtime.queue_name());

    lambda_runtime::run(service_fn(move |event: LambdaEvent<SqsEvent>| {
        let runtime = Arc::clone(&runtime);
        async move {
            let context = InvocationContext::from(&event.context);
            Ok::<QueueBatchResponse, LambdaRuntimeError>(
                runtime.handle_queue_batch(event.payload, context).await,
            )
        }
    }))
    .await
}
