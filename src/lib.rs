//! # Janus Protocol Engine
//!
//! Transport-agnostic protocol engine for cross-language IPC: message
//! framing, request/response correlation, and manifest-driven API
//! validation. Any peer that frames, correlates and validates the same
//! way interoperates, whatever language it is written in.
//!
//! ## Architecture
//!
//! ```text
//!                    +---------------------+
//!    bytes in  --->  |  protocol           |  ---> Message values
//!                    |  (frame + codec)    |
//!                    +---------------------+
//!                               |
//!                               v
//!                    +---------------------+
//!    track/await --> |  correlator         |  ---> resolved results,
//!                    |  (pending table)    |       timeouts, cancels
//!                    +---------------------+
//!                               |
//!                               v
//!                    +---------------------+
//!    manifests  ---> |  manifest           |  ---> accepted/rejected,
//!                    |  (parse + validate) |       violation reports
//!                    +---------------------+
//! ```
//!
//! - [`protocol`] - 4-byte big-endian length-prefixed frames around JSON
//!   payloads, enveloped (base64-wrapped, type-tagged) or direct.
//!   [`protocol::MessageBuffer`] accumulates partial reads.
//! - [`correlator`] - [`correlator::ResponseTracker`] matches responses to
//!   pending requests by id, with timeouts, cancellation, bilateral
//!   tracking and a periodic sweep.
//! - [`manifest`] - parse and structurally validate JSON/YAML API
//!   manifests, merge multiple files, and validate runtime values against
//!   their definitions.
//! - [`error`] - stable numeric error codes with fixed messages, shared
//!   across all implementations of the protocol.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use janus_protocol::correlator::{ResponseTracker, TrackerConfig};
//! use janus_protocol::protocol::{encode, CodecConfig, Message, Request, WireMode};
//! use serde_json::json;
//!
//! # async fn example() -> janus_protocol::Result<()> {
//! let config = CodecConfig::default();
//! let tracker = ResponseTracker::new(TrackerConfig::default());
//!
//! let request = Request::new("get_user").arg("id", json!("u-42"));
//! let pending = tracker.track(&request.id, Duration::from_secs(5)).await?;
//!
//! let frame = encode(&Message::Request(request), WireMode::Enveloped, &config)?;
//! // write `frame` to the transport, feed received bytes to a
//! // MessageBuffer, pass responses to tracker.handle_response(..)
//! let result = pending.wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod correlator;
pub mod error;
pub mod manifest;
pub mod protocol;

pub use error::{ErrorCode, ErrorData, JanusError, ProtocolError, Result};
