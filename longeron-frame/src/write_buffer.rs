//! Builder for a single outbound message.
//!
//! A [`WriteBuffer`] reserves four bytes for the little-endian length
//! prefix, accumulates payload after it, and stamps the prefix on
//! [`commit`](WriteBuffer::commit). Small messages never touch the heap:
//! storage starts inline and spills once, permanently, when it overflows.

use bytes::Bytes;
use smallvec::SmallVec;

/// Reserved prefix size in bytes.
pub const PREFIX_LEN: usize = 4;

/// Inline storage: the prefix plus a dozen payload bytes, enough for the
/// small control messages that dominate most wire traffic.
const INLINE_CAPACITY: usize = 16;

/// Length-prefixed message builder.
#[derive(Debug, Clone)]
pub struct WriteBuffer {
    data: SmallVec<[u8; INLINE_CAPACITY]>,
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBuffer {
    /// Create a builder with the prefix bytes reserved; the write offset
    /// starts right after them.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: SmallVec::from_slice(&[0u8; PREFIX_LEN]),
        }
    }

    /// Create a builder pre-sized for `payload_capacity` payload bytes.
    #[must_use]
    pub fn with_capacity(payload_capacity: usize) -> Self {
        let mut data = SmallVec::with_capacity(PREFIX_LEN + payload_capacity);
        data.extend_from_slice(&[0u8; PREFIX_LEN]);
        Self { data }
    }

    /// Append payload bytes after the current offset.
    pub fn put(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Stamp the payload length into the reserved prefix.
    pub fn commit(&mut self) {
        let length = (self.data.len() - PREFIX_LEN) as i32;
        self.data[..PREFIX_LEN].copy_from_slice(&length.to_le_bytes());
    }

    /// Total framed length, prefix included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no payload has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == PREFIX_LEN
    }

    /// The full framed region, prefix included.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the builder into wire bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_stamps_the_payload_length() {
        let mut buffer = WriteBuffer::new();
        buffer.put(b"Hello");
        buffer.commit();

        let bytes = buffer.into_bytes();
        assert_eq!(bytes.len(), 9);
        assert_eq!(&bytes[..4], &5i32.to_le_bytes());
        assert_eq!(&bytes[4..], b"Hello");
    }

    #[test]
    fn empty_payload_commits_to_zero() {
        let mut buffer = WriteBuffer::new();
        buffer.commit();

        assert!(buffer.is_empty());
        assert_eq!(buffer.as_bytes(), &[0, 0, 0, 0]);
    }

    #[test]
    fn multiple_puts_accumulate() {
        let mut buffer = WriteBuffer::new();
        buffer.put(b"ab");
        buffer.put(b"cd");
        buffer.put(b"ef");
        buffer.commit();

        let bytes = buffer.into_bytes();
        assert_eq!(&bytes[..4], &6i32.to_le_bytes());
        assert_eq!(&bytes[4..], b"abcdef");
    }

    #[test]
    fn growth_past_inline_storage_keeps_contents() {
        let mut buffer = WriteBuffer::new();
        let payload = vec![0x5A; 4096];
        buffer.put(&payload);
        buffer.commit();

        assert_eq!(buffer.len(), PREFIX_LEN + 4096);
        let bytes = buffer.into_bytes();
        assert_eq!(&bytes[..4], &4096i32.to_le_bytes());
        assert!(bytes[4..].iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn recommit_after_more_payload_restamps() {
        let mut buffer = WriteBuffer::new();
        buffer.put(b"ab");
        buffer.commit();
        buffer.put(b"cd");
        buffer.commit();

        assert_eq!(&buffer.as_bytes()[..4], &4i32.to_le_bytes());
    }
}
