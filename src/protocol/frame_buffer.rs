//! Message buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` so retained partial frames survive across socket
//! reads without re-allocating. A stream-oriented caller pushes whatever it
//! read and gets back every message that became complete.
//!
//! # Example
//!
//! ```
//! use janus_protocol::protocol::{encode, CodecConfig, Message, MessageBuffer, Request, WireMode};
//!
//! let config = CodecConfig::default();
//! let frame = encode(
//!     &Message::Request(Request::new("get_info")),
//!     WireMode::Enveloped,
//!     &config,
//! )
//! .unwrap();
//!
//! let mut buffer = MessageBuffer::new(WireMode::Enveloped, config);
//! assert!(buffer.push(&frame[..3]).unwrap().is_empty()); // partial prefix
//! let messages = buffer.push(&frame[3..]).unwrap();
//! assert_eq!(messages.len(), 1);
//! ```

use bytes::BytesMut;

use super::wire_format::{decode, CodecConfig, DecodeResult, WireMode};
use crate::error::Result;
use super::message::Message;

/// Initial buffer capacity (one typical datagram).
const INITIAL_CAPACITY: usize = 64 * 1024;

/// Buffer for accumulating incoming bytes and extracting complete messages.
pub struct MessageBuffer {
    /// Accumulated bytes from reads.
    buffer: BytesMut,
    /// Payload mode for every frame on this stream.
    mode: WireMode,
    /// Codec limits.
    config: CodecConfig,
}

impl MessageBuffer {
    /// Create a buffer for the given mode and limits.
    pub fn new(mode: WireMode, config: CodecConfig) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            mode,
            config,
        }
    }

    /// Push data and extract all messages that became complete.
    ///
    /// Partial frames stay buffered for the next push. A framing error
    /// leaves the buffer untouched; callers that cannot resynchronize the
    /// stream should [`clear`](Self::clear) it.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Message>> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        loop {
            let consumed = match decode(&self.buffer, self.mode, &self.config)? {
                DecodeResult::Complete { message, remainder } => {
                    let consumed = self.buffer.len() - remainder.len();
                    messages.push(message);
                    consumed
                }
                DecodeResult::Incomplete(_) => break,
            };
            let _ = self.buffer.split_to(consumed);
        }

        Ok(messages)
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode, Request, Response};
    use serde_json::json;

    fn frame(message: &Message) -> Vec<u8> {
        encode(message, WireMode::Enveloped, &CodecConfig::default()).unwrap()
    }

    fn new_buffer() -> MessageBuffer {
        MessageBuffer::new(WireMode::Enveloped, CodecConfig::default())
    }

    #[test]
    fn test_single_complete_message() {
        let mut buffer = new_buffer();
        let message = Message::Request(Request::new("echo_data").arg("text", json!("hi")));

        let messages = buffer.push(&frame(&message)).unwrap();

        assert_eq!(messages, vec![message]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_messages_in_one_push() {
        let mut buffer = new_buffer();
        let first = Message::Request(Request::new("first"));
        let second = Message::Response(Response::success("a", None));
        let third = Message::Request(Request::new("third"));

        let mut combined = frame(&first);
        combined.extend(frame(&second));
        combined.extend(frame(&third));

        let messages = buffer.push(&combined).unwrap();

        assert_eq!(messages, vec![first, second, third]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_across_pushes() {
        let mut buffer = new_buffer();
        let message = Message::Request(Request::new("fragmented"));
        let bytes = frame(&message);
        let mid = bytes.len() / 2;

        assert!(buffer.push(&bytes[..mid]).unwrap().is_empty());
        assert_eq!(buffer.len(), mid);

        let messages = buffer.push(&bytes[mid..]).unwrap();
        assert_eq!(messages, vec![message]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = new_buffer();
        let message = Message::Response(Response::success("r", Some(json!("ok"))));
        let bytes = frame(&message);

        let mut all = Vec::new();
        for byte in &bytes {
            all.extend(buffer.push(std::slice::from_ref(byte)).unwrap());
        }

        assert_eq!(all, vec![message]);
    }

    #[test]
    fn test_complete_plus_partial_retained() {
        let mut buffer = new_buffer();
        let first = Message::Request(Request::new("one"));
        let second = Message::Request(Request::new("two"));
        let second_bytes = frame(&second);

        let mut data = frame(&first);
        data.extend_from_slice(&second_bytes[..5]);

        let messages = buffer.push(&data).unwrap();
        assert_eq!(messages, vec![first]);
        assert_eq!(buffer.len(), 5);

        let messages = buffer.push(&second_bytes[5..]).unwrap();
        assert_eq!(messages, vec![second]);
    }

    #[test]
    fn test_oversized_frame_is_error() {
        let mut buffer = MessageBuffer::new(
            WireMode::Enveloped,
            CodecConfig {
                max_message_size: 16,
            },
        );
        // Prefix claims 1000 payload bytes, over the 16-byte maximum.
        let result = buffer.push(&1000u32.to_be_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_clear_discards_partial_frame() {
        let mut buffer = new_buffer();
        let bytes = frame(&Message::Request(Request::new("partial")));
        buffer.push(&bytes[..bytes.len() - 2]).unwrap();
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());
    }
}
