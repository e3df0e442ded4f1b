//! Error handling for the handler lifecycle

use serde_json::{Value, json};
use thiserror::Error;

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, HandlerError>;

/// Errors raised between payload extraction and response shaping.
///
/// Every variant is caught at [`Handler::handle_it`](crate::Handler::handle_it)
/// and rendered as a 500 envelope.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// A native error raised by the controller
    #[error("{0}")]
    Controller(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A non-error value the controller rejected with; serialized verbatim
    #[error("controller rejected with {0}")]
    Rejected(Value),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The event did not contain a payload in the expected place
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Queue transport error during re-enqueue or acknowledgment
    #[error("Queue transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors surfaced by a [`QueueTransport`](crate::transport::QueueTransport)
#[derive(Error, Debug)]
pub enum TransportError {
    /// AWS SQS error
    #[error("SQS error: {0}")]
    Sqs(String),

    /// Payload could not be encoded as a message body
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport refused the operation
    #[error("Transport rejected operation: {0}")]
    Rejected(String),
}

impl HandlerError {
    /// Wrap any native error raised by a controller
    pub fn controller<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HandlerError::Controller(Box::new(err))
    }

    /// Build a controller error from a plain message
    pub fn message(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        HandlerError::Controller(msg.into())
    }

    /// Render the error the way it is placed under the `error` key of a 500 body.
    ///
    /// Native errors flatten to `{message, stack}`, where `stack` is the error
    /// followed by its source chain. Rejected values pass through untouched.
    pub fn to_error_value(&self) -> Value {
        match self {
            HandlerError::Rejected(value) => value.clone(),
            other => json!({
                "message": other.to_string(),
                "stack": render_stack(other),
            }),
        }
    }
}

fn render_stack(err: &(dyn std::error::Error + 'static)) -> String {
    let mut stack = format!("{}: {}", error_kind(err), err);
    // a controller error displays as its inner error, so the chain starts below it
    let mut source = match err.downcast_ref::<HandlerError>() {
        Some(HandlerError::Controller(inner)) => inner.source(),
        _ => err.source(),
    };
    while let Some(cause) = source {
        stack.push_str(&format!("\n    caused by: {}", cause));
        source = cause.source();
    }
    stack
}

fn error_kind(err: &(dyn std::error::Error + 'static)) -> &'static str {
    match err.downcast_ref::<HandlerError>() {
        Some(HandlerError::Controller(_)) => "ControllerError",
        Some(HandlerError::Json(_)) => "JsonError",
        Some(HandlerError::InvalidPayload(_)) => "InvalidPayloadError",
        Some(HandlerError::Transport(_)) => "TransportError",
        Some(HandlerError::Config(_)) => "ConfigError",
        _ => "Error",
    }
}
