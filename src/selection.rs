//! The locally chosen audio file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::{MediaSource, UploadFile};

/// An audio file picked by the user, held in memory for preview and upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedAudio {
    name: String,
    mime: String,
    data: Bytes,
}

impl SelectedAudio {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    /// Reads a file from disk. The format is not checked; playback reveals
    /// whether it is usable.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| format!("Failed to read audio file {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Audio path {:?} has no file name", path))?;
        Ok(Self::new(name, mime_for(path), data))
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

    pub fn to_source(&self) -> MediaSource {
        MediaSource::new(self.name.clone(), self.mime.clone(), self.data.clone())
    }

    pub fn to_upload(&self) -> UploadFile {
        UploadFile {
            name: self.name.clone(),
            mime: self.mime.clone(),
            data: self.data.clone(),
        }
    }
}

fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg" | "oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("m4a" | "aac") => "audio/mp4",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}
