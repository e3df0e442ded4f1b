//! The uniform response shape returned by every lifecycle outcome

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::cors::{CorsConfig, inject_cors_headers};

/// `Content-Type` header name as the platform expects it
pub const CONTENT_TYPE: &str = "Content-Type";
/// JSON media type
pub const APPLICATION_JSON: &str = "application/json";

/// Body message for events rejected by validation
pub const INVALID_EVENT_MESSAGE: &str = "Invalid event schema. Unable to process event.";

/// Successful (or deferred) invocation
pub const STATUS_OK: u16 = 200;
/// Event failed validation
pub const STATUS_UNPROCESSABLE: u16 = 422;
/// Payload, controller or transport failure
pub const STATUS_ERROR: u16 = 500;

/// `{statusCode, headers, body}` as serialized back to the invoking platform.
///
/// `body` is always JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseEnvelope {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Default for ResponseEnvelope {
    fn default() -> Self {
        Self::with_cors(&CorsConfig::default())
    }
}

impl ResponseEnvelope {
    /// 200 envelope with JSON content type, the given CORS entries and an empty body
    pub fn with_cors(cors: &CorsConfig) -> Self {
        let mut envelope = Self {
            status_code: STATUS_OK,
            headers: BTreeMap::new(),
            body: String::new(),
        };
        inject_cors_headers(&mut envelope, cors);
        envelope.set_json_content_type();
        envelope
    }

    pub fn set_json_content_type(&mut self) {
        self.headers
            .insert(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string());
    }

    /// Turn this envelope into the 422 validation rejection
    pub fn reject_invalid_event(&mut self) {
        self.set_json_content_type();
        self.status_code = STATUS_UNPROCESSABLE;
        self.body = json!({ "message": INVALID_EVENT_MESSAGE }).to_string();
    }

    /// Envelope built from a loosely shaped object.
    ///
    /// Fields present in `object` replace the defaults: `statusCode` from a
    /// number or numeric string, `headers` with non-string values stringified
    /// (nulls dropped), `body` verbatim when a string and as JSON text otherwise.
    /// Fields that are absent or cannot be coerced keep their defaults.
    pub fn from_object(object: &Map<String, Value>, cors: &CorsConfig) -> Self {
        let mut envelope = Self::with_cors(cors);

        if let Some(status) = object.get("statusCode").and_then(coerce_status) {
            envelope.status_code = status;
        }

        if let Some(Value::Object(headers)) = object.get("headers") {
            envelope.headers = headers
                .iter()
                .filter_map(|(name, value)| match value {
                    Value::Null => None,
                    Value::String(s) => Some((name.clone(), s.clone())),
                    other => Some((name.clone(), other.to_string())),
                })
                .collect();
        }

        match object.get("body") {
            Some(Value::String(body)) => envelope.body = body.clone(),
            Some(other) => envelope.body = other.to_string(),
            None => {}
        }

        envelope
    }

    /// Parse the body back into JSON
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

fn coerce_status(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// JavaScript-style truthiness: `null`, `false`, `0` and `""` are falsy
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_envelope() {
        let envelope = ResponseEnvelope::default();
        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.body, "");
        assert_eq!(envelope.headers["Content-Type"], "application/json");
        assert_eq!(envelope.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(envelope.headers["Access-Control-Allow-Headers"], "*");
    }

    #[test]
    fn test_wire_shape() {
        let mut envelope = ResponseEnvelope::default();
        envelope.reject_invalid_event();

        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["statusCode"], 422);
        assert_eq!(
            wire["body"],
            r#"{"message":"Invalid event schema. Unable to process event."}"#
        );
    }

    #[test]
    fn test_partial_object_keeps_defaults() {
        let envelope: ResponseEnvelope =
            serde_json::from_value(json!({ "statusCode": 201 })).unwrap();
        assert_eq!(envelope.status_code, 201);
        assert_eq!(envelope.headers["Content-Type"], "application/json");
    }

    #[test]
    fn test_from_object_coerces_loose_fields() {
        let object = json!({
            "statusCode": "201",
            "headers": { "X-Retry": 3, "X-Cache": true, "X-Dropped": null, "X-Name": "a" },
            "body": { "id": 7 }
        });
        let Value::Object(object) = object else { unreachable!() };

        let envelope = ResponseEnvelope::from_object(&object, &CorsConfig::default());

        assert_eq!(envelope.status_code, 201);
        assert_eq!(envelope.headers["X-Retry"], "3");
        assert_eq!(envelope.headers["X-Cache"], "true");
        assert_eq!(envelope.headers["X-Name"], "a");
        assert!(!envelope.headers.contains_key("X-Dropped"));
        assert_eq!(envelope.body, r#"{"id":7}"#);
    }

    #[test]
    fn test_from_object_keeps_defaults_for_unusable_fields() {
        let object = json!({ "statusCode": "abc", "headers": [1], "extra": 1 });
        let Value::Object(object) = object else { unreachable!() };

        let envelope = ResponseEnvelope::from_object(&object, &CorsConfig::default());

        assert_eq!(envelope, ResponseEnvelope::default());
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!(0.5)));
    }
}
