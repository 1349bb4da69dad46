//! Request and response message types.
//!
//! Both types are immutable once constructed: the builders fill in the
//! generated correlation id and RFC 3339 timestamp, and nothing mutates a
//! message afterwards.
//!
//! # Example
//!
//! ```
//! use janus_protocol::protocol::{Request, Response};
//! use serde_json::json;
//!
//! let request = Request::new("get_weather")
//!     .arg("city", json!("Oslo"))
//!     .timeout(5.0);
//!
//! let response = Response::success(&request.id, Some(json!({"temp": -3})));
//! assert_eq!(response.request_id, request.id);
//! assert!(response.success);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ProtocolError;

/// A Janus request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique per request.
    pub id: String,
    /// Request name, looked up against the manifest.
    pub request: String,
    /// Argument map (string key to arbitrary JSON value).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
    /// Per-request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// Creation time, RFC 3339.
    pub timestamp: String,
    /// Reply-target reference. Owned by the transport, opaque to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl Request {
    /// Create a request with a generated id and current timestamp.
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request: request.into(),
            args: None,
            timeout: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            reply_to: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
        self
    }

    /// Replace the whole argument map.
    pub fn args(mut self, args: Map<String, Value>) -> Self {
        self.args = Some(args);
        self
    }

    /// Set the timeout in seconds.
    pub fn timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    /// Set the reply target.
    pub fn reply_to(mut self, target: impl Into<String>) -> Self {
        self.reply_to = Some(target.into());
        self
    }
}

/// A Janus response, correlated to a request by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id of the request this answers.
    pub request_id: String,
    /// This response's own id.
    pub id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Result value on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
    /// Creation time, RFC 3339.
    pub timestamp: String,
}

impl Response {
    /// Create a successful response.
    pub fn success(request_id: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            request_id: request_id.into(),
            id: Uuid::new_v4().to_string(),
            success: true,
            result,
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create a failed response carrying a protocol error.
    pub fn failure(request_id: impl Into<String>, error: ProtocolError) -> Self {
        Self {
            request_id: request_id.into(),
            id: Uuid::new_v4().to_string(),
            success: false,
            result: None,
            error: Some(error),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A decoded wire message, either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A request.
    Request(Request),
    /// A response.
    Response(Response),
}

impl Message {
    /// Wire-level type tag: `"request"` or `"response"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Request(_) => "request",
            Message::Response(_) => "response",
        }
    }

    /// The correlation id carried by this message.
    ///
    /// For requests this is `id`; for responses, `request_id`.
    pub fn correlation_id(&self) -> &str {
        match self {
            Message::Request(r) => &r.id,
            Message::Response(r) => &r.request_id,
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = Request::new("echo_data")
            .arg("text", json!("hi"))
            .timeout(2.0)
            .reply_to("/tmp/janus-reply.sock");

        assert_eq!(request.request, "echo_data");
        assert_eq!(request.args.as_ref().unwrap()["text"], json!("hi"));
        assert_eq!(request.timeout, Some(2.0));
        assert_eq!(request.reply_to.as_deref(), Some("/tmp/janus-reply.sock"));
        assert!(!request.id.is_empty());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = Request::new("x");
        let b = Request::new("x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_request_timestamp_is_rfc3339() {
        let request = Request::new("x");
        assert!(chrono::DateTime::parse_from_rfc3339(&request.timestamp).is_ok());
    }

    #[test]
    fn test_request_json_omits_absent_fields() {
        let request = Request::new("bare");
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("args").is_none());
        assert!(json.get("timeout").is_none());
        assert!(json.get("reply_to").is_none());
    }

    #[test]
    fn test_response_success() {
        let response = Response::success("req-1", Some(json!(42)));
        assert!(response.success);
        assert_eq!(response.request_id, "req-1");
        assert_eq!(response.result, Some(json!(42)));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_response_failure() {
        let err = ProtocolError::internal_error("boom");
        let response = Response::failure("req-2", err.clone());
        assert!(!response.success);
        assert_eq!(response.error, Some(err));
        assert!(response.result.is_none());
    }

    #[test]
    fn test_message_kind_and_correlation_id() {
        let request = Request::new("ping_host");
        let id = request.id.clone();
        let message = Message::from(request);
        assert_eq!(message.kind(), "request");
        assert_eq!(message.correlation_id(), id);

        let message = Message::from(Response::success("abc", None));
        assert_eq!(message.kind(), "response");
        assert_eq!(message.correlation_id(), "abc");
    }

    #[test]
    fn test_request_serde_round_trip() {
        let request = Request::new("round").arg("n", json!(1.5)).timeout(0.5);
        let json = serde_json::to_string(&request).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
