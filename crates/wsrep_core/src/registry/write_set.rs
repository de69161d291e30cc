//! Opaque write-set buffer.

use bytes::{BufMut, BytesMut};

/// Ordered bytes accumulated by one transaction for replication.
///
/// The registry never interprets the contents. Its only byte-level
/// operation is seeding a new connection transaction with the
/// connection's default-database query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    buf: BytesMut,
}

impl WriteSet {
    /// Creates an empty write-set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes at the end.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Inserts bytes in front of the current contents.
    pub fn prepend(&mut self, data: &[u8]) {
        if self.buf.is_empty() {
            self.buf.put_slice(data);
            return;
        }
        let mut buf = BytesMut::with_capacity(data.len() + self.buf.len());
        buf.put_slice(data);
        buf.put_slice(&self.buf);
        self.buf = buf;
    }

    /// Returns the accumulated bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of accumulated bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards the contents and frees the buffer.
    pub fn clear(&mut self) {
        self.buf = BytesMut::new();
    }
}
