//! Configuration for a conversion session.
//!
//! Every knob the session and its HTTP client need lives in
//! [`SessionConfig`], built via [`SessionConfigBuilder`]. Callers set only
//! what differs from the defaults, which point at the local conversion
//! service the browser popup talks to.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};

/// Default conversion endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8090/create";

/// Media type of a Word document, used as the advisory content-type check.
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Configuration for a [`crate::session::ConversionSession`].
///
/// # Example
/// ```rust
/// use pdf2docx::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .endpoint("http://127.0.0.1:9000/convert")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.field_name, "file");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// URL the PDF is `POST`ed to. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Multipart form field carrying the file. Default: `"file"`.
    pub field_name: String,

    /// Whole-request timeout in seconds, covering upload and body read. Default: 120.
    ///
    /// Conversion happens synchronously on the server, so large documents
    /// need a generous budget. Expiry surfaces as a transport failure.
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Content type a successful response is expected to carry. Default: [`DOCX_MEDIA_TYPE`].
    ///
    /// Only advisory: a mismatch is logged and mentioned in the status
    /// message, the result is still offered.
    pub expected_content_type: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            field_name: "file".to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            expected_content_type: DOCX_MEDIA_TYPE.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.config.field_name = name.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn expected_content_type(mut self, media_type: impl Into<String>) -> Self {
        self.config.expected_content_type = media_type.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, SessionError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.endpoint).map_err(|e| {
            SessionError::InvalidConfig(format!("endpoint '{}' is not a URL: {e}", c.endpoint))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SessionError::InvalidConfig(format!(
                "endpoint must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.field_name.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "form field name must not be empty".into(),
            ));
        }
        if c.request_timeout_secs == 0 || c.connect_timeout_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
