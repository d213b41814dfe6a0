//! Growable scratch buffer used to stage one record before a single `write`.
//!
//! Multi-byte integers are written host-endian on purpose: the data file and
//! log file formats this engine speaks are a compatibility property of the
//! on-disk layout, not a protocol meant to travel between machines.

/// A growable byte buffer for framing a single outbound record.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    buf: Vec<u8>,
}

impl ByteBuffer {
    /// Create an empty buffer with `capacity` bytes pre-reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes currently staged.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer currently holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append a host-endian `u16`.
    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    /// Append a host-endian `i16`.
    pub fn put_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    /// Append a host-endian `u32`.
    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    /// Append a host-endian `u64`.
    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    /// Append a run of raw bytes as-is.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Drop all staged bytes. Retains the allocated capacity.
    ///
    /// Must be called at log rotation so no partially-staged record survives
    /// the rotation boundary.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Return the accumulated bytes for a single outbound write, resetting
    /// the buffer for reuse. After this call `len()` is 0 and capacity is
    /// retained.
    pub fn detach(&mut self) -> Vec<u8> {
        let replacement = Vec::with_capacity(self.buf.capacity());
        std::mem::replace(&mut self.buf, replacement)
    }
}
