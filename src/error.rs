//! Error types for the pdf2docx library.
//!
//! A single [`SessionError`] enum covers every way a conversion attempt can
//! go wrong. The first four variants map onto the user-facing failure
//! classes of the session:
//!
//! * [`SessionError::InvalidInput`] — the selected file is not a PDF.
//! * [`SessionError::UploadRejected`] — the conversion service answered with
//!   a non-success HTTP status.
//! * [`SessionError::TransportFailure`] — the request never produced a usable
//!   response (connect error, timeout, body read failure).
//! * [`SessionError::PreconditionViolation`] — an action was invoked in a
//!   state that does not support it.
//!
//! None of these are fatal to the session: [`crate::session::ConversionSession`]
//! turns each one into a status message and a safe state transition before
//! handing the error back to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf2docx library.
#[derive(Debug, Error)]
pub enum SessionError {
    // ── Session errors ───────────────────────────────────────────────────
    /// The candidate is neither declared as `application/pdf` nor named `*.pdf`.
    #[error("PDF required: '{name}' is not a PDF file")]
    InvalidInput { name: String },

    /// The conversion service responded with a non-success status.
    #[error("HTTP {status}: {detail}")]
    UploadRejected { status: u16, detail: String },

    /// Network or I/O failure before or while reading the response.
    #[error("{0}")]
    TransportFailure(String),

    /// The requested action needs state the session does not currently have.
    #[error("{0}")]
    PreconditionViolation(String),

    // ── Storage errors ───────────────────────────────────────────────────
    /// Creating, revoking, or saving a result artifact failed.
    #[error("Failed to store result at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a candidate file from disk failed.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Build a transport error from a reqwest failure, naming timeouts explicitly.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            SessionError::TransportFailure(format!(
                "Request timed out after {timeout_secs}s"
            ))
        } else if err.is_connect() {
            SessionError::TransportFailure(format!("Could not connect to service: {err}"))
        } else {
            SessionError::TransportFailure(err.to_string())
        }
    }
}
