//! Protocol module - message types, wire format, and buffering.
//!
//! This module implements the byte-frame boundary of the engine:
//! - Request/Response types with builder-style constructors
//! - Length-prefixed frame encoding/decoding (enveloped or direct)
//! - Message buffer for accumulating partial reads

mod frame_buffer;
mod message;
mod wire_format;

pub use frame_buffer::MessageBuffer;
pub use message::{Message, Request, Response};
pub use wire_format::{
    calculate_framed_size, decode, encode, extract_messages, CodecConfig, DecodeResult,
    Incomplete, WireMode, DEFAULT_MAX_MESSAGE_SIZE, LENGTH_PREFIX_SIZE,
};
