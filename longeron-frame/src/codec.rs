//! Length-prefix message codec.
//!
//! Wire format: back-to-back messages, each `[len: i32 LE][payload: len
//! bytes]`. A zero length is legal and carries an empty message.

use bytes::{BufMut, Bytes, BytesMut};

use longeron_core::buffer::StreamBuffer;
use longeron_core::error::NetError;

/// Length prefix size in bytes.
pub const HEADER_LEN: usize = 4;

/// Default cap on a single payload. Configurations may tighten this.
pub const DEFAULT_MAX_PAYLOAD: usize = i32::MAX as usize;

/// Stateless extractor of length-prefixed messages.
///
/// The decoder holds no partial-frame state between calls: the size check
/// covers header and payload together, and both are consumed in one pass
/// once a whole message is buffered.
#[derive(Debug)]
pub struct FrameDecoder {
    max_payload: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    /// Create a decoder with a tightened payload cap.
    #[must_use]
    pub const fn with_limit(max_payload: usize) -> Self {
        Self { max_payload }
    }

    /// Decode one message out of `buffer`.
    ///
    /// Returns:
    /// - `Ok(Some(payload))` - a whole message was buffered and consumed
    /// - `Ok(None)` - need more data; nothing was consumed
    /// - `Err` - the length prefix is negative or over the cap; the
    ///   connection is beyond recovery and must close
    pub fn decode(&self, buffer: &mut StreamBuffer) -> Result<Option<Bytes>, NetError> {
        if buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        let peeked = buffer.read(&mut header, HEADER_LEN);
        debug_assert!(peeked);

        let length = i32::from_le_bytes(header);
        if length < 0 || length as usize > self.max_payload {
            return Err(NetError::invalid_frame(i64::from(length)));
        }

        let length = length as usize;
        if buffer.len() < HEADER_LEN + length {
            return Ok(None);
        }

        buffer.consume(HEADER_LEN);
        let mut payload = vec![0u8; length];
        let consumed = buffer.read_and_consume(&mut payload, length);
        debug_assert!(consumed);

        Ok(Some(Bytes::from(payload)))
    }
}

/// Frame `payload` into a ready-to-send wire message.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
    out.put_i32_le(payload.len() as i32);
    out.extend_from_slice(payload);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &FrameDecoder, buffer: &mut StreamBuffer) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Some(message) = decoder.decode(buffer).unwrap() {
            out.push(message);
        }
        out
    }

    #[test]
    fn whole_message_decodes() {
        let decoder = FrameDecoder::new();
        let mut buffer = StreamBuffer::new();
        buffer.write(&encode_frame(b"Hello"));

        let messages = drain(&decoder, &mut buffer);
        assert_eq!(messages, vec![Bytes::from_static(b"Hello")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn any_partition_yields_the_same_messages() {
        let decoder = FrameDecoder::new();
        let mut wire = Vec::new();
        wire.extend_from_slice(&encode_frame(b"AB"));
        wire.extend_from_slice(&encode_frame(b""));
        wire.extend_from_slice(&encode_frame(b"CDE"));
        wire.extend_from_slice(&encode_frame(&[0xFF; 300]));

        // Split the concatenation at every chunk size from 1 byte up to
        // the whole thing and check the decoded stream is identical.
        for chunk in 1..=wire.len() {
            let mut buffer = StreamBuffer::with_capacity(8);
            let mut messages = Vec::new();
            for piece in wire.chunks(chunk) {
                buffer.write(piece);
                messages.extend(drain(&decoder, &mut buffer));
            }
            assert_eq!(messages.len(), 4, "chunk size {chunk}");
            assert_eq!(messages[0].as_ref(), b"AB");
            assert_eq!(messages[1].as_ref(), b"");
            assert_eq!(messages[2].as_ref(), b"CDE");
            assert_eq!(messages[3].as_ref(), &[0xFF; 300]);
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn split_header_waits_for_the_rest() {
        let decoder = FrameDecoder::new();
        let mut buffer = StreamBuffer::new();

        buffer.write(&[0x05, 0x00]);
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.write(&[0x00, 0x00]);
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.write(b"Hello");
        let message = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(message.as_ref(), b"Hello");
    }

    #[test]
    fn empty_payload_is_a_message() {
        let decoder = FrameDecoder::new();
        let mut buffer = StreamBuffer::new();
        buffer.write(&[0x00, 0x00, 0x00, 0x00]);

        let message = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(message.is_empty());
    }

    #[test]
    fn negative_length_is_fatal() {
        let decoder = FrameDecoder::new();
        let mut buffer = StreamBuffer::new();
        buffer.write(&(-1i32).to_le_bytes());

        let err = decoder.decode(&mut buffer).unwrap_err();
        assert!(matches!(err, NetError::InvalidFrame { length: -1 }));
    }

    #[test]
    fn oversized_length_is_fatal() {
        let decoder = FrameDecoder::with_limit(16);
        let mut buffer = StreamBuffer::new();
        buffer.write(&17i32.to_le_bytes());

        let err = decoder.decode(&mut buffer).unwrap_err();
        assert!(matches!(err, NetError::InvalidFrame { length: 17 }));
    }
}
