//! The business-logic seam invoked by the lifecycle

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::HandlerConfig;
use crate::error::Result;
use crate::logging::InvocationLogger;

/// What a controller receives for one invocation
#[derive(Debug, Clone)]
pub struct ControllerInput {
    /// Payload extracted from the raw event
    pub payload: Value,
    /// Logger carrying the invocation's correlation metadata
    pub logger: InvocationLogger,
    /// Configuration of the dispatching handler, including app settings
    pub config: Arc<HandlerConfig>,
}

/// Caller-supplied business logic.
///
/// The returned value becomes the response body; an error becomes a 500.
///
/// Async closures taking a [`ControllerInput`] implement this trait, so a
/// controller can be as small as:
///
/// ```rust
/// use lambda_lifecycle::{ControllerInput, HandlerError};
/// use serde_json::Value;
///
/// let controller = |input: ControllerInput| async move {
///     let region = input.config.get("region").cloned().unwrap_or(Value::Null);
///     Ok::<Value, HandlerError>(serde_json::json!({ "region": region, "payload": input.payload }))
/// };
/// # let _ = controller;
/// ```
#[async_trait]
pub trait Controller: Send + Sync {
    async fn execute(&self, input: ControllerInput) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> Controller for F
where
    F: Fn(ControllerInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn execute(&self, input: ControllerInput) -> Result<Value> {
        (self)(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InvocationContext;
    use crate::error::HandlerError;
    use serde_json::json;

    struct Doubler;

    #[async_trait]
    impl Controller for Doubler {
        async fn execute(&self, input: ControllerInput) -> Result<Value> {
            let n = input
                .payload
                .get("n")
                .and_then(Value::as_i64)
                .ok_or_else(|| HandlerError::message("n is required"))?;
            Ok(json!({ "n": n * 2 }))
        }
    }

    fn input(payload: Value) -> ControllerInput {
        ControllerInput {
            payload,
            logger: InvocationLogger::new(&InvocationContext::default(), "NONE"),
            config: Arc::new(HandlerConfig::default()),
        }
    }

    #[tokio::test]
    async fn test_struct_controller() {
        let result = Doubler.execute(input(json!({ "n": 21 }))).await.unwrap();
        assert_eq!(result, json!({ "n": 42 }));

        let err = Doubler.execute(input(json!({}))).await.unwrap_err();
        assert_eq!(err.to_string(), "n is required");
    }

    #[tokio::test]
    async fn test_closure_controller() {
        let controller =
            |input: ControllerInput| async move { Ok::<Value, HandlerError>(input.payload) };
        let result = controller.execute(input(json!([1, 2]))).await.unwrap();
        assert_eq!(result, json!([1, 2]));
    }
}
