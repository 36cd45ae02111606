//! The remote conversion service.
//!
//! [`ConversionService`] is the seam between the session and the network.
//! [`HttpConversionService`] is the production implementation: one
//! multipart `POST` per upload, no retries, bounded by the configured
//! timeouts. Tests drive the session through their own implementations.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::input::PDF_MEDIA_TYPE;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info};

/// A fully read response from the conversion service.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if present and valid ASCII.
    pub content_type: Option<String>,
    /// `Content-Disposition` header, if present and valid ASCII.
    pub content_disposition: Option<String>,
    /// Entire response body.
    pub body: Bytes,
}

impl ServiceResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as text for diagnostics, `"Unknown error"` when blank.
    pub fn error_detail(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        if text.is_empty() {
            "Unknown error".to_string()
        } else {
            text.to_string()
        }
    }
}

/// Sends a PDF for conversion and returns the raw response.
///
/// Implementations return `Err` only for transport-level failures
/// (connect, timeout, body read). Any HTTP status, success or not, is an
/// `Ok(ServiceResponse)`; classifying it is the session's job.
#[async_trait]
pub trait ConversionService: Send + Sync {
    async fn convert(&self, file_name: &str, data: Bytes) -> Result<ServiceResponse, SessionError>;
}

/// [`ConversionService`] over HTTP using reqwest.
#[derive(Debug, Clone)]
pub struct HttpConversionService {
    client: reqwest::Client,
    endpoint: String,
    field_name: String,
    timeout_secs: u64,
}

impl HttpConversionService {
    /// Build a client from the session configuration.
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SessionError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            field_name: config.field_name.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ConversionService for HttpConversionService {
    async fn convert(&self, file_name: &str, data: Bytes) -> Result<ServiceResponse, SessionError> {
        info!("Uploading {} ({} bytes) to {}", file_name, data.len(), self.endpoint);

        let part = Part::bytes(data.to_vec())
            .file_name(file_name.to_string())
            .mime_str(PDF_MEDIA_TYPE)
            .map_err(|e| SessionError::TransportFailure(e.to_string()))?;
        let form = Form::new().part(self.field_name.clone(), part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SessionError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status().as_u16();
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                // Raw UTF-8 in a quoted fallback must not hide `filename*`.
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        };
        let content_type = header(CONTENT_TYPE);
        let content_disposition = header(CONTENT_DISPOSITION);

        let body = response
            .bytes()
            .await
            .map_err(|e| SessionError::from_reqwest(e, self.timeout_secs))?;

        debug!(
            "Service answered {} with {} bytes (content-type {:?})",
            status,
            body.len(),
            content_type
        );

        Ok(ServiceResponse {
            status,
            content_type,
            content_disposition,
            body,
        })
    }
}
