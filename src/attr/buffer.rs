//! Fixed-capacity storage for a fetched attribute value.

use thiserror::Error;

/// Larger than any value DMF writes.
pub const ATTR_BUFFER_CAPACITY: usize = 5000;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("attribute value of {length} bytes exceeds buffer capacity of {capacity}")]
pub struct BufferOverflow {
    pub length: usize,
    pub capacity: usize,
}

/// Bounded byte buffer with explicit length tracking.
///
/// The backing storage is allocated once and reused for every file a context
/// classifies.
pub struct AttrBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl AttrBuffer {
    pub fn new() -> Self {
        Self { data: vec![0u8; ATTR_BUFFER_CAPACITY].into_boxed_slice(), len: 0 }
    }

    /// The valid bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Hand the full capacity to a producer, then record how many bytes it
    /// wrote. The buffer is left empty if the producer fails or reports more
    /// bytes than fit.
    pub fn fill_with<E>(
        &mut self,
        produce: impl FnOnce(&mut [u8]) -> Result<usize, E>,
    ) -> Result<Result<usize, BufferOverflow>, E> {
        self.len = 0;
        let written = produce(&mut self.data)?;
        if written > self.data.len() {
            return Ok(Err(BufferOverflow { length: written, capacity: self.data.len() }));
        }
        self.len = written;
        Ok(Ok(written))
    }
}

impl Default for AttrBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AttrBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttrBuffer").field("len", &self.len).finish()
    }
}
