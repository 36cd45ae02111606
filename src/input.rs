//! Input selection: file candidates and the PDF acceptance policy.
//!
//! A candidate is accepted when *either* its declared media type or its
//! file name says PDF. File sources fill in the media type inconsistently.

use crate::error::SessionError;
use bytes::Bytes;
use std::path::Path;
use tracing::debug;

/// Media type of a PDF document.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A file offered by a file source (picker, drag-and-drop, CLI argument).
#[derive(Debug, Clone)]
pub struct FileCandidate {
    /// File name as shown to the user, without directories.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Declared media type, if the source supplied one.
    pub media_type: Option<String>,
    /// File contents.
    pub data: Bytes,
}

impl FileCandidate {
    /// Create a candidate from in-memory bytes. `size` is taken from `data`.
    pub fn new(name: impl Into<String>, media_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            media_type: media_type.map(str::to_string),
            data,
        }
    }

    /// Load a candidate from disk.
    ///
    /// The declared media type is `application/pdf` when the file starts
    /// with the `%PDF` magic bytes and absent otherwise, so a mislabelled
    /// file can still pass on its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| SessionError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let media_type = data.starts_with(b"%PDF").then_some(PDF_MEDIA_TYPE);
        debug!(
            "Loaded candidate {} ({} bytes, media type {:?})",
            name,
            data.len(),
            media_type
        );

        Ok(Self::new(name, media_type, data))
    }

    /// Whether this candidate is acceptable as a PDF.
    pub fn is_pdf(&self) -> bool {
        is_pdf(&self.name, self.media_type.as_deref())
    }
}

/// The PDF acceptance policy: exact media type, or a `.pdf` suffix in any case.
pub fn is_pdf(name: &str, media_type: Option<&str>) -> bool {
    media_type == Some(PDF_MEDIA_TYPE) || has_pdf_suffix(name)
}

fn has_pdf_suffix(name: &str) -> bool {
    let n = name.len();
    n >= 4
        && name.is_char_boundary(n - 4)
        && name[n - 4..].eq_ignore_ascii_case(".pdf")
}

/// A validated PDF held by the session.
#[derive(Debug, Clone)]
pub struct SelectedInput {
    pub name: String,
    pub size: u64,
    pub data: Bytes,
}

impl SelectedInput {
    /// Validate a candidate, returning [`SessionError::InvalidInput`] if it is not a PDF.
    pub fn try_from_candidate(candidate: FileCandidate) -> Result<Self, SessionError> {
        if !candidate.is_pdf() {
            return Err(SessionError::InvalidInput {
                name: candidate.name,
            });
        }
        Ok(Self {
            name: candidate.name,
            size: candidate.size,
            data: candidate.data,
        })
    }

    /// Size rounded up to whole kilobytes, for display.
    pub fn size_kb(&self) -> u64 {
        self.size.div_ceil(1024)
    }
}
