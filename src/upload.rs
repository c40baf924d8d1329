//! Upload status shown next to the upload button.

use std::fmt;

use crate::UploadError;

/// Outcome of the most recent upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// No endpoint configured, nothing was sent
    NotConfigured,
    InProgress,
    Succeeded,
    /// The server answered with a non-success status
    Rejected(String),
    /// The request never completed
    TransportError(String),
}

impl UploadStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UploadStatus::NotConfigured
                | UploadStatus::Rejected(_)
                | UploadStatus::TransportError(_)
        )
    }
}

impl From<duet_upload::Result<()>> for UploadStatus {
    fn from(result: duet_upload::Result<()>) -> Self {
        match result {
            Ok(()) => UploadStatus::Succeeded,
            Err(UploadError::Status { status, .. }) => UploadStatus::Rejected(status.to_string()),
            Err(e) => UploadStatus::TransportError(e.to_string()),
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::NotConfigured => write!(f, "No upload endpoint configured"),
            UploadStatus::InProgress => write!(f, "Uploading..."),
            UploadStatus::Succeeded => write!(f, "Upload successful!"),
            UploadStatus::Rejected(status) => write!(f, "Upload failed: {}", status),
            UploadStatus::TransportError(e) => write!(f, "Error uploading file: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(UploadStatus::from(Ok(())).to_string(), "Upload successful!");

        let rejected = UploadStatus::from(Err(UploadError::Status {
            status: duet_upload::StatusCode::NOT_FOUND,
            body: String::new(),
        }));
        assert_eq!(rejected.to_string(), "Upload failed: 404 Not Found");
        assert!(rejected.is_failure());

        let invalid = UploadStatus::from(Err(UploadError::InvalidFile("bad mime".to_string())));
        assert_eq!(invalid.to_string(), "Error uploading file: invalid file: bad mime");
        assert!(!UploadStatus::InProgress.is_failure());
    }
}
