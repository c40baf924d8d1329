use bytes::Bytes;

/// A playable blob held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    name: String,
    mime: String,
    data: Bytes,
}

impl MediaSource {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}
