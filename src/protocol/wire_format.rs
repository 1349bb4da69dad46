//! Wire format encoding and decoding.
//!
//! Every frame is a 4-byte big-endian length prefix followed by that many
//! payload bytes:
//!
//! ```text
//! ┌───────────┬─────────────────┐
//! │ Length    │ Payload         │
//! │ 4 bytes   │ N bytes         │
//! │ uint32 BE │ JSON            │
//! └───────────┴─────────────────┘
//! ```
//!
//! The payload comes in two modes:
//!
//! - [`WireMode::Enveloped`] - a JSON envelope
//!   `{"type":"request"|"response","payload":"<base64(JSON)>"}`. The type
//!   tag survives the wire, so a peer never has to guess the message kind.
//! - [`WireMode::Direct`] - the raw JSON of the request or response.
//!   Smaller; the kind is inferred from the fields.
//!
//! Decoding never conflates *incomplete* input (wait for more bytes) with
//! *corrupt* input (drop the datagram): the former is
//! [`DecodeResult::Incomplete`], the latter is an error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{Message, Request, Response};
use crate::error::{JanusError, Result};

/// Length prefix size in bytes (fixed, exactly 4).
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum encoded message size (10 MiB).
///
/// The engine's own ceiling; a datagram transport typically enforces a much
/// smaller one on top of this.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Payload layout inside the length-prefixed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMode {
    /// JSON envelope with base64-wrapped inner message.
    Enveloped,
    /// Raw JSON of the message, no wrapper.
    Direct,
}

/// Codec configuration.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum encoded payload size in bytes.
    pub max_message_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Wire-level envelope. Exists only at the frame boundary.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    payload: String,
}

/// Why a decode could not finish yet. Both cases mean "wait for more
/// bytes"; neither means the input is corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incomplete {
    /// Fewer than [`LENGTH_PREFIX_SIZE`] bytes available.
    Prefix {
        /// Bytes available so far.
        available: usize,
    },
    /// Prefix read, but the declared payload has not fully arrived.
    Payload {
        /// Payload length the prefix declared.
        declared: usize,
        /// Payload bytes available so far.
        available: usize,
    },
}

/// Outcome of a single [`decode`] call.
#[derive(Debug)]
pub enum DecodeResult<'a> {
    /// One complete message, plus the bytes after its frame.
    Complete {
        /// Decoded message.
        message: Message,
        /// Unconsumed bytes following the frame.
        remainder: &'a [u8],
    },
    /// Not enough bytes yet; nothing was consumed.
    Incomplete(Incomplete),
}

/// Largest payload the codec will emit: the configured maximum, bounded
/// by what the 4-byte prefix can express.
fn effective_max(config: &CodecConfig) -> usize {
    config.max_message_size.min(u32::MAX as usize)
}

/// Encode a message into a length-prefixed frame.
///
/// Fails with a framing error, emitting nothing, if the encoded payload
/// exceeds `config.max_message_size`.
pub fn encode(message: &Message, mode: WireMode, config: &CodecConfig) -> Result<Vec<u8>> {
    let payload = encode_payload(message, mode)?;

    let max = effective_max(config);
    if payload.len() > max {
        return Err(JanusError::Framing(format!(
            "encoded message is {} bytes, exceeds maximum {max}",
            payload.len()
        )));
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Byte length [`encode`] would produce for this message.
pub fn calculate_framed_size(
    message: &Message,
    mode: WireMode,
    config: &CodecConfig,
) -> Result<usize> {
    let payload = encode_payload(message, mode)?;
    let max = effective_max(config);
    if payload.len() > max {
        return Err(JanusError::Framing(format!(
            "encoded message is {} bytes, exceeds maximum {max}",
            payload.len()
        )));
    }
    Ok(LENGTH_PREFIX_SIZE + payload.len())
}

/// Decode one message from the front of `buf`.
///
/// Returns [`DecodeResult::Incomplete`] when more bytes are needed; any
/// malformed frame (zero or oversized declared length, bad envelope, bad
/// base64, structural violations) is a framing error carrying the cause.
pub fn decode<'a>(buf: &'a [u8], mode: WireMode, config: &CodecConfig) -> Result<DecodeResult<'a>> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return Ok(DecodeResult::Incomplete(Incomplete::Prefix {
            available: buf.len(),
        }));
    }

    let declared = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if declared == 0 {
        return Err(JanusError::Framing(
            "declared payload length is zero".to_string(),
        ));
    }
    if declared > config.max_message_size {
        return Err(JanusError::Framing(format!(
            "declared payload length {} exceeds maximum {}",
            declared, config.max_message_size
        )));
    }

    let available = buf.len() - LENGTH_PREFIX_SIZE;
    if available < declared {
        return Ok(DecodeResult::Incomplete(Incomplete::Payload {
            declared,
            available,
        }));
    }

    let payload = &buf[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + declared];
    let message = decode_payload(payload, mode)?;

    Ok(DecodeResult::Complete {
        message,
        remainder: &buf[LENGTH_PREFIX_SIZE + declared..],
    })
}

/// Decode every complete message at the front of `buf`.
///
/// Stops at the first incomplete condition and returns the leftover bytes,
/// which a stream-oriented caller keeps for the next read.
pub fn extract_messages(
    buf: &[u8],
    mode: WireMode,
    config: &CodecConfig,
) -> Result<(Vec<Message>, Vec<u8>)> {
    let mut messages = Vec::new();
    let mut rest = buf;

    loop {
        match decode(rest, mode, config)? {
            DecodeResult::Complete { message, remainder } => {
                messages.push(message);
                rest = remainder;
            }
            DecodeResult::Incomplete(_) => break,
        }
    }

    Ok((messages, rest.to_vec()))
}

fn encode_payload(message: &Message, mode: WireMode) -> Result<Vec<u8>> {
    let inner = match message {
        Message::Request(r) => serde_json::to_vec(r)?,
        Message::Response(r) => serde_json::to_vec(r)?,
    };

    match mode {
        WireMode::Direct => Ok(inner),
        WireMode::Enveloped => {
            let envelope = Envelope {
                kind: message.kind().to_string(),
                payload: BASE64.encode(&inner),
            };
            Ok(serde_json::to_vec(&envelope)?)
        }
    }
}

fn decode_payload(payload: &[u8], mode: WireMode) -> Result<Message> {
    match mode {
        WireMode::Enveloped => {
            let envelope: Envelope = serde_json::from_slice(payload)
                .map_err(|e| JanusError::Framing(format!("invalid envelope: {e}")))?;

            if envelope.kind != "request" && envelope.kind != "response" {
                return Err(JanusError::Framing(format!(
                    "envelope type must be 'request' or 'response', got '{}'",
                    envelope.kind
                )));
            }

            let inner = BASE64
                .decode(&envelope.payload)
                .map_err(|e| JanusError::Framing(format!("invalid base64 payload: {e}")))?;
            let value: Value = serde_json::from_slice(&inner)
                .map_err(|e| JanusError::Framing(format!("invalid inner JSON: {e}")))?;

            match envelope.kind.as_str() {
                "request" => decode_request(value),
                _ => decode_response(value),
            }
        }
        WireMode::Direct => {
            let value: Value = serde_json::from_slice(payload)
                .map_err(|e| JanusError::Framing(format!("invalid JSON payload: {e}")))?;

            // No envelope tag in direct mode; `success` is mandatory on
            // responses and absent from requests.
            let object = value
                .as_object()
                .ok_or_else(|| JanusError::Framing("payload is not a JSON object".to_string()))?;
            if object.contains_key("success") {
                decode_response(value)
            } else if object.contains_key("request") {
                decode_request(value)
            } else {
                Err(JanusError::Framing(
                    "cannot determine message kind from payload fields".to_string(),
                ))
            }
        }
    }
}

fn decode_request(value: Value) -> Result<Message> {
    require_string(&value, "id", "request")?;
    require_string(&value, "request", "request")?;
    require_string(&value, "timestamp", "request")?;

    if let Some(args) = value.get("args") {
        if !args.is_object() {
            return Err(JanusError::Framing(
                "request field 'args' must be an object".to_string(),
            ));
        }
    }
    if let Some(timeout) = value.get("timeout") {
        if !timeout.is_number() {
            return Err(JanusError::Framing(
                "request field 'timeout' must be a number".to_string(),
            ));
        }
    }

    let request: Request = serde_json::from_value(value)
        .map_err(|e| JanusError::Framing(format!("malformed request: {e}")))?;
    Ok(Message::Request(request))
}

fn decode_response(value: Value) -> Result<Message> {
    require_string(&value, "request_id", "response")?;
    require_string(&value, "id", "response")?;
    require_string(&value, "timestamp", "response")?;

    match value.get("success") {
        Some(v) if v.is_boolean() => {}
        _ => {
            return Err(JanusError::Framing(
                "response field 'success' must be a boolean".to_string(),
            ))
        }
    }
    if let Some(error) = value.get("error") {
        if !error.is_object() {
            return Err(JanusError::Framing(
                "response field 'error' must be an object".to_string(),
            ));
        }
    }

    let response: Response = serde_json::from_value(value)
        .map_err(|e| JanusError::Framing(format!("malformed response: {e}")))?;
    Ok(Message::Response(response))
}

fn require_string(value: &Value, field: &str, kind: &str) -> Result<()> {
    match value.get(field) {
        Some(v) if v.is_string() => Ok(()),
        _ => Err(JanusError::Framing(format!(
            "{kind} field '{field}' must be a string"
        ))),
    }
}
