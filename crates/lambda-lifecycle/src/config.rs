//! Process-wide handler configuration
//!
//! Built once at process start (usually with [`HandlerConfig::from_env`]) and
//! shared with every handler through an `Arc`.

use serde_json::{Map, Value};

use crate::cors::CorsConfig;
use crate::error::{HandlerError, Result};

/// Default tracing filter when `LOG_LEVEL` is unset
pub const DEFAULT_LOG_LEVEL: &str = "trace";

/// Configuration read by the lifecycle
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerConfig {
    /// Prefix prepended to a queue name to form its URL
    pub queue_base_url: String,
    /// Tracing filter directive
    pub log_level: String,
    /// CORS entries written into every envelope
    pub cors: CorsConfig,
    /// Application settings available to controllers
    settings: Map<String, Value>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            queue_base_url: String::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            cors: CorsConfig::default(),
            settings: Map::new(),
        }
    }
}

impl HandlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    ///
    /// - `SQS_BASE_URL`: queue URL prefix
    /// - `LOG_LEVEL`: tracing filter (default `trace`)
    /// - `LAMBDA_CORS_HEADERS`: comma separated allowed request headers
    /// - `APP_CONFIG`: JSON object of application settings
    pub fn from_env() -> Result<Self> {
        let settings = match std::env::var("APP_CONFIG") {
            Ok(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => map,
                _ => {
                    return Err(HandlerError::Config(
                        "APP_CONFIG must be a JSON object".to_string(),
                    ));
                }
            },
            Err(_) => Map::new(),
        };

        Ok(Self {
            queue_base_url: std::env::var("SQS_BASE_URL").unwrap_or_default(),
            log_level: std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
            cors: CorsConfig::from_env(),
            settings,
        })
    }

    /// Set the queue URL prefix
    pub fn with_queue_base_url(mut self, url: impl Into<String>) -> Self {
        self.queue_base_url = url.into();
        self
    }

    /// Set the tracing filter directive
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the CORS entries
    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    /// Set the application settings
    pub fn with_settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = settings;
        self
    }

    /// Application settings
    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Look up a single application setting
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Application settings with `overrides` deep-merged on top.
    ///
    /// Non-object overrides are ignored and the plain settings are returned.
    pub fn get_with_overrides(&self, overrides: &Value) -> Value {
        let mut merged = Value::Object(self.settings.clone());
        if overrides.is_object() {
            merge(&mut merged, overrides);
        }
        merged
    }

    /// Replace the application settings
    pub fn update(&mut self, settings: Map<String, Value>) {
        self.settings = settings;
    }
}

fn merge(target: &mut Value, overrides: &Value) {
    match (target, overrides) {
        (Value::Object(target), Value::Object(overrides)) => {
            for (key, value) in overrides {
                merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, value) => *target = value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn settings(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_overrides_deep_merge() {
        let config = HandlerConfig::new().with_settings(settings(json!({
            "db": { "host": "localhost", "port": 5432 },
            "feature": false
        })));

        let merged = config.get_with_overrides(&json!({
            "db": { "host": "replica" },
            "tenant": "acme"
        }));

        assert_eq!(
            merged,
            json!({
                "db": { "host": "replica", "port": 5432 },
                "feature": false,
                "tenant": "acme"
            })
        );
        // the stored settings are untouched
        assert_eq!(config.get("db").unwrap()["host"], "localhost");
    }

    #[test]
    fn test_non_object_overrides_ignored() {
        let config = HandlerConfig::new().with_settings(settings(json!({ "a": 1 })));
        assert_eq!(config.get_with_overrides(&json!([1, 2])), json!({ "a": 1 }));
    }

    #[test]
    fn test_update_replaces_settings() {
        let mut config = HandlerConfig::new().with_settings(settings(json!({ "a": 1 })));
        config.update(settings(json!({ "b": 2 })));
        assert!(config.get("a").is_none());
        assert_eq!(config.get("b"), Some(&json!(2)));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        unsafe {
            std::env::set_var("SQS_BASE_URL", "https://sqs.us-east-1.amazonaws.com/123/");
            std::env::set_var("LOG_LEVEL", "info");
            std::env::set_var("APP_CONFIG", r#"{"region":"us-east-1"}"#);
            std::env::remove_var("LAMBDA_CORS_HEADERS");
        }

        let config = HandlerConfig::from_env().unwrap();
        assert_eq!(config.queue_base_url, "https://sqs.us-east-1.amazonaws.com/123/");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.get("region"), Some(&json!("us-east-1")));
        assert_eq!(config.cors, CorsConfig::default());

        unsafe {
            std::env::set_var("APP_CONFIG", "[1]");
        }
        assert!(matches!(
            HandlerConfig::from_env(),
            Err(HandlerError::Config(_))
        ));

        unsafe {
            std::env::remove_var("SQS_BASE_URL");
            std::env::remove_var("LOG_LEVEL");
            std::env::remove_var("APP_CONFIG");
        }
        let config = HandlerConfig::from_env().unwrap();
        assert_eq!(config.queue_base_url, "");
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }
}
