//! Turning buffered chunks into a single playable take.

use bytes::Bytes;

use crate::MediaSource;

/// The container a capture stream's chunks form when concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeFormat {
    mime: String,
}

impl TakeFormat {
    pub fn new(mime: impl Into<String>) -> Self {
        Self { mime: mime.into() }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }
}

/// The finished output of one recording.
#[derive(Debug, Clone)]
pub struct RecordedTake {
    data: Bytes,
    mime: String,
}

impl RecordedTake {
    /// Wraps the concatenated chunk bytes of a recording.
    pub fn assemble(format: &TakeFormat, payload: Bytes) -> Self {
        Self {
            data: payload,
            mime: format.mime.clone(),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn into_source(self, name: impl Into<String>) -> MediaSource {
        MediaSource::new(name, self.mime, self.data)
    }
}
