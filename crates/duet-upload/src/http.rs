//! Multipart HTTP upload backend.

use async_trait::async_trait;
use tracing::debug;

use crate::{Result, UploadError, UploadFile, Uploader};

const DEFAULT_FIELD: &str = "audio";

/// Configuration for the HTTP upload client.
#[derive(Debug, Clone)]
pub struct HttpUploaderConfig {
    /// Endpoint the form is posted to
    pub url: String,

    /// Form field carrying the file (defaults to "audio")
    pub field: Option<String>,

    /// Sent verbatim as the `Authorization` header when set
    pub authorization: Option<String>,
}

impl HttpUploaderConfig {
    /// Create a new config posting to the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            field: None,
            authorization: None,
        }
    }

    /// Set the form field name.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Set the authorization header value.
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Get the field name, using default if not set.
    pub fn field(&self) -> &str {
        self.field.as_deref().unwrap_or(DEFAULT_FIELD)
    }
}

/// Posts files as a single-part multipart form.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    config: HttpUploaderConfig,
}

impl HttpUploader {
    /// Create a new uploader with the given configuration.
    pub fn new(config: HttpUploaderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create an uploader from just a URL with default settings.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(HttpUploaderConfig::new(url))
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, file: UploadFile) -> Result<()> {
        debug!(
            url = %self.config.url,
            field = self.config.field(),
            file_name = %file.name,
            bytes = file.data.len(),
            "Sending upload request"
        );

        let part = reqwest::multipart::Part::stream(reqwest::Body::from(file.data))
            .file_name(file.name)
            .mime_str(&file.mime)
            .map_err(|e| UploadError::InvalidFile(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(self.config.field().to_string(), part);

        let mut request = self.client.post(&self.config.url).multipart(form);
        if let Some(authorization) = &self.config.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status { status, body });
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
