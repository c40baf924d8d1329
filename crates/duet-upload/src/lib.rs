//! Upload backend library for duet.
//!
//! This crate provides a trait-based abstraction for sending a selected audio
//! file somewhere, with an implementation for plain HTTP multipart endpoints.

mod http;

use async_trait::async_trait;
pub use bytes::Bytes;
pub use http::{HttpUploader, HttpUploaderConfig};
pub use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur during an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("server returned {status}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid file: {0}")]
    InvalidFile(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Result type for upload operations.
pub type Result<T> = std::result::Result<T, UploadError>;

/// A file ready to be sent.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name reported to the server
    pub name: String,
    /// Mime type of the payload
    pub mime: String,
    /// Raw file contents. Cloning is O(1).
    pub data: Bytes,
}

/// Trait for upload backends.
///
/// Implement this trait to send audio somewhere other than a multipart HTTP
/// endpoint. Implementations make exactly one attempt per call.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Send the file once.
    async fn upload(&self, file: UploadFile) -> Result<()>;

    /// Returns the name of this uploader for logging/debugging.
    fn name(&self) -> &str;
}
