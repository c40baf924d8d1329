//! Chunk accumulation for a single recording.

use bytes::{Bytes, BytesMut};

/// Ordered chunks delivered while a recording is active.
#[derive(Debug, Default)]
pub struct RecordingBuffer {
    chunks: Vec<Bytes>,
}

impl RecordingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything from the previous recording.
    pub fn reset(&mut self) {
        self.chunks.clear();
    }

    /// Appends a chunk. Empty chunks are skipped.
    pub fn push(&mut self, chunk: Bytes) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    /// Number of chunks buffered.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes buffered.
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Concatenates the chunks in arrival order without clearing them.
    pub fn concat(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.byte_len());
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out.freeze()
    }
}
