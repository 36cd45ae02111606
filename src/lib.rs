//! # pdf2docx
//!
//! Client for a local PDF→DOCX conversion service.
//!
//! A [`ConversionSession`] holds one PDF selection and at most one converted
//! document at a time. It uploads the PDF as a multipart form, keeps the
//! returned DOCX in memory behind a temporary reference that other programs
//! can open, and writes it to disk on request.
//!
//! ## Lifecycle
//!
//! ```text
//! select_file ──▶ upload ──▶ open_result / save_result ──▶ discard_result
//!   (Ready)     (Uploading)        (ResultAvailable)           (Ready)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2docx::{ConversionSession, FileCandidate, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = ConversionSession::new(SessionConfig::default())?;
//!     session.select_file(FileCandidate::from_path("invoice.pdf").await?)?;
//!     let name = session.upload().await?.name().to_string();
//!     let path = session.save_result(".").await?;
//!     eprintln!("{name} saved to {}", path.display());
//!     session.discard_result();
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2docx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod filename;
pub mod input;
pub mod object_url;
pub mod observer;
pub mod service;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SessionConfig, SessionConfigBuilder, DEFAULT_ENDPOINT, DOCX_MEDIA_TYPE};
pub use error::SessionError;
pub use filename::{derived_docx_name, resolve_filename};
pub use input::{FileCandidate, SelectedInput};
pub use object_url::{ObjectUrl, ObjectUrlStore, TempFileStore};
pub use observer::{NoopObserver, SessionObserver, SharedObserver};
pub use service::{ConversionService, HttpConversionService, ServiceResponse};
pub use session::{ConversionResult, ConversionSession, SessionState, SessionStatus, Severity};
