//! Error types for the Janus protocol engine.
//!
//! Two layers, deliberately separate:
//!
//! - [`JanusError`] - the crate-level error returned by every fallible
//!   operation. Callers match on it like any `thiserror` enum.
//! - [`ProtocolError`] - the uniform wire-level error value `{code, message,
//!   data}` that travels inside a [`Response`](crate::protocol::Response).
//!   The message is fixed per code; anything condition-specific lives in
//!   `data`. Every independent Janus implementation must produce the same
//!   code for the same condition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Stable numeric error codes shared by all Janus implementations.
///
/// The standard range follows JSON-RPC 2.0; the `-32000`-family covers
/// protocol-specific failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed JSON received.
    ParseError,
    /// Message was structurally not a valid request.
    InvalidRequest,
    /// Request name is not defined.
    MethodNotFound,
    /// Argument failed validation.
    InvalidParams,
    /// Unexpected internal failure.
    InternalError,
    /// A tracked request did not receive its response in time.
    RequestTimeout,
    /// Socket-level failure reported by the transport.
    SocketError,
    /// Frame could not be encoded or decoded.
    FramingError,
    /// Response tracking failure (duplicate id, capacity, cancellation).
    TrackingError,
    /// Manifest failed structural or runtime validation.
    ManifestError,
    /// Request violated a security constraint.
    SecurityViolation,
}

impl ErrorCode {
    /// The numeric code as it appears on the wire.
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::RequestTimeout => -32001,
            ErrorCode::SocketError => -32002,
            ErrorCode::FramingError => -32003,
            ErrorCode::TrackingError => -32004,
            ErrorCode::ManifestError => -32005,
            ErrorCode::SecurityViolation => -32006,
        }
    }

    /// The fixed message for this code.
    ///
    /// Implementations must never vary this text by triggering condition;
    /// condition details go in [`ErrorData`].
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::RequestTimeout => "Request timeout",
            ErrorCode::SocketError => "Socket error",
            ErrorCode::FramingError => "Message framing error",
            ErrorCode::TrackingError => "Response tracking error",
            ErrorCode::ManifestError => "Manifest validation error",
            ErrorCode::SecurityViolation => "Security violation",
        }
    }
}

/// Structured context attached to a [`ProtocolError`].
///
/// All fields are optional; absent fields are omitted from the wire JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Human-readable detail for the specific condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Name or path of the field that triggered the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The offending value, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Constraint parameters (e.g. `{"minimum": 10}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<BTreeMap<String, Value>>,
    /// Free-form context entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, Value>>,
}

impl ErrorData {
    fn is_empty(&self) -> bool {
        self.details.is_none()
            && self.field.is_none()
            && self.value.is_none()
            && self.constraints.is_none()
            && self.context.is_none()
    }
}

/// The uniform error value carried inside a failed response.
///
/// A caller cannot tell a framing failure from a correlation failure by
/// shape; only the code differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Stable numeric code (see [`ErrorCode`]).
    pub code: i32,
    /// Fixed message for the code.
    pub message: String,
    /// Optional structured context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ErrorData>,
}

impl ProtocolError {
    /// Create an error for the given code with no data.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: None,
        }
    }

    /// Attach structured data, dropping it if entirely empty.
    pub fn with_data(mut self, data: ErrorData) -> Self {
        self.data = if data.is_empty() { None } else { Some(data) };
        self
    }

    /// Attach a detail string.
    pub fn with_details(self, details: impl Into<String>) -> Self {
        let mut data = self.data.clone().unwrap_or_default();
        data.details = Some(details.into());
        self.with_data(data)
    }

    /// Parse failure (malformed JSON).
    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError).with_details(details)
    }

    /// Unknown request name.
    pub fn method_not_found(request: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound).with_data(ErrorData {
            details: Some(format!("Unknown request: {request}")),
            ..Default::default()
        })
    }

    /// Invalid parameters, carrying the offending field and value.
    pub fn invalid_params(field: impl Into<String>, value: Value) -> Self {
        Self::new(ErrorCode::InvalidParams).with_data(ErrorData {
            field: Some(field.into()),
            value: Some(value),
            ..Default::default()
        })
    }

    /// Internal error wrapping an underlying cause.
    pub fn internal_error(cause: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError).with_details(cause)
    }

    /// A handler exceeded its time budget.
    pub fn handler_timeout(handler: &str, timeout_secs: f64) -> Self {
        let mut context = BTreeMap::new();
        context.insert("handler".to_string(), Value::from(handler));
        context.insert("timeout_seconds".to_string(), Value::from(timeout_secs));
        Self::new(ErrorCode::RequestTimeout).with_data(ErrorData {
            details: Some(format!(
                "Handler '{handler}' timed out after {timeout_secs}s"
            )),
            context: Some(context),
            ..Default::default()
        })
    }

    /// Security constraint violation.
    pub fn security_violation(details: impl Into<String>) -> Self {
        Self::new(ErrorCode::SecurityViolation).with_details(details)
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.data.as_ref().and_then(|d| d.details.as_deref()) {
            Some(details) => write!(f, "{} ({}): {}", self.message, self.code, details),
            None => write!(f, "{} ({})", self.message, self.code),
        }
    }
}

/// Main error type for all engine operations.
#[derive(Debug, Error)]
pub enum JanusError {
    /// I/O error while reading manifest files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Frame could not be encoded or decoded.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Response tracker rejected the operation.
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// Manifest failed to parse or validate.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Protocol-level failure delivered through a response or a tracking
    /// rejection (timeout, cancellation, remote error).
    #[error("{0}")]
    Protocol(ProtocolError),
}

impl JanusError {
    /// Map this error onto its stable wire-level code.
    pub fn code(&self) -> i32 {
        match self {
            JanusError::Io(_) => ErrorCode::SocketError.code(),
            JanusError::Json(_) | JanusError::Yaml(_) => ErrorCode::ParseError.code(),
            JanusError::Framing(_) => ErrorCode::FramingError.code(),
            JanusError::Tracking(_) => ErrorCode::TrackingError.code(),
            JanusError::Manifest(_) => ErrorCode::ManifestError.code(),
            JanusError::Protocol(e) => e.code,
        }
    }

    /// Convert to the uniform wire shape.
    pub fn to_protocol_error(&self) -> ProtocolError {
        match self {
            JanusError::Protocol(e) => e.clone(),
            JanusError::Io(e) => {
                ProtocolError::new(ErrorCode::SocketError).with_details(e.to_string())
            }
            JanusError::Json(_) | JanusError::Yaml(_) => {
                ProtocolError::parse_error(self.to_string())
            }
            JanusError::Framing(cause) => {
                ProtocolError::new(ErrorCode::FramingError).with_details(cause.clone())
            }
            JanusError::Tracking(cause) => {
                ProtocolError::new(ErrorCode::TrackingError).with_details(cause.clone())
            }
            JanusError::Manifest(cause) => {
                ProtocolError::new(ErrorCode::ManifestError).with_details(cause.clone())
            }
        }
    }
}

/// Result type alias using JanusError.
pub type Result<T> = std::result::Result<T, JanusError>;
