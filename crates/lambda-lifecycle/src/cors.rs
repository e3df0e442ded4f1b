//! CORS (Cross-Origin Resource Sharing) headers for lifecycle responses
//!
//! Envelopes are returned to API Gateway / Lambda URLs as plain JSON, so the
//! CORS entries are written straight into the envelope's header map. Every
//! envelope allows any origin; only the allowed request headers are
//! configurable.

use std::collections::HashSet;

use tracing::debug;

use crate::envelope::ResponseEnvelope;
use crate::error::{HandlerError, Result};

/// Header carrying the allowed origin
pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
/// Header carrying the allowed request headers
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
/// Value written to [`ALLOW_ORIGIN`] on every envelope
pub const ANY_ORIGIN: &str = "*";

/// CORS configuration for handler responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Allowed request headers. `"*"` allows all headers.
    pub allowed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_headers: vec!["*".to_string()],
        }
    }
}

impl CorsConfig {
    /// Create a CORS config that allows all headers
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Create a CORS config for specific request headers
    pub fn for_headers(headers: Vec<String>) -> Self {
        Self {
            allowed_headers: headers,
        }
    }

    /// Create a CORS config from `LAMBDA_CORS_HEADERS` (comma separated)
    pub fn from_env() -> Self {
        let allowed_headers = std::env::var("LAMBDA_CORS_HEADERS")
            .map(|s| split_list(&s))
            .ok()
            .filter(|headers| !headers.is_empty())
            .unwrap_or_else(|| vec!["*".to_string()]);

        Self { allowed_headers }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Write the CORS entries for `config` into the envelope headers
pub fn inject_cors_headers(envelope: &mut ResponseEnvelope, config: &CorsConfig) {
    let allowed_headers = if config.allowed_headers.iter().any(|h| h == "*") {
        "*".to_string()
    } else {
        config.allowed_headers.join(", ")
    };
    debug!("Injecting CORS headers, allowed headers: {}", allowed_headers);

    envelope
        .headers
        .insert(ALLOW_ORIGIN.to_string(), ANY_ORIGIN.to_string());
    envelope
        .headers
        .insert(ALLOW_HEADERS.to_string(), allowed_headers);
}

/// Validate CORS configuration
pub fn validate_config(config: &CorsConfig) -> Result<()> {
    if config.allowed_headers.is_empty() {
        return Err(HandlerError::Config(
            "CORS requires at least one allowed header".to_string(),
        ));
    }

    let headers_set: HashSet<_> = config
        .allowed_headers
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    if headers_set.len() != config.allowed_headers.len() {
        return Err(HandlerError::Config(
            "Duplicate headers in allowed_headers".to_string(),
        ));
    }

    Ok(())
}
