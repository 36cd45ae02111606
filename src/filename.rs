//! Display-name resolution for converted documents.
//!
//! The service may suggest a filename through `Content-Disposition`. Two
//! parameter forms are understood, in priority order:
//!
//! 1. `filename*=UTF-8''<percent-encoded>` (RFC 6266 / RFC 5987), the only
//!    form that can carry non-ASCII names reliably;
//! 2. `filename="<name>"` or `filename=<name>`.
//!
//! When neither is present the caller falls back to [`derived_docx_name`].

use once_cell::sync::Lazy;
use regex::Regex;

static EXTENDED_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:^|;)\s*filename\*\s*=\s*"?UTF-8'[^']*'([^;"\s]+)"#).expect("valid regex")
});

// `filename\s*=` cannot match `filename*=`, so the two patterns never overlap.
static BASIC_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*(?:"([^"]*)"|([^;]*))"#).expect("valid regex")
});

/// Extract a filename from a `Content-Disposition` header value.
///
/// Returns `None` when the header is absent, carries no filename parameter,
/// or the parameter is empty. An extended parameter whose percent-decoding
/// is not valid UTF-8 is skipped in favour of the basic one.
///
/// ```rust
/// use pdf2docx::filename::resolve_filename;
///
/// assert_eq!(
///     resolve_filename(Some("attachment; filename*=UTF-8''%E2%82%ACrates.docx")).as_deref(),
///     Some("€rates.docx")
/// );
/// assert_eq!(resolve_filename(None), None);
/// ```
pub fn resolve_filename(header: Option<&str>) -> Option<String> {
    let header = header?;

    if let Some(encoded) = EXTENDED_FILENAME
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
    {
        if let Ok(decoded) = urlencoding::decode(encoded) {
            if !decoded.is_empty() {
                return Some(decoded.into_owned());
            }
        }
    }

    let caps = BASIC_FILENAME.captures(header)?;
    let name = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim())?;

    (!name.is_empty()).then(|| name.to_string())
}

/// Derive a `.docx` name from the uploaded file's name.
///
/// A trailing `.pdf` (any case) is replaced; other names just gain the suffix.
pub fn derived_docx_name(original: &str) -> String {
    let n = original.len();
    let stem = if n >= 4
        && original.is_char_boundary(n - 4)
        && original[n - 4..].eq_ignore_ascii_case(".pdf")
    {
        &original[..n - 4]
    } else {
        original
    };
    format!("{stem}.docx")
}

/// Reduce a suggested name to a single safe path component.
///
/// Server-supplied names are untrusted: directory parts are dropped and
/// names that would address the parent or current directory are replaced.
pub fn safe_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches('.');
    if last.is_empty() {
        "document.docx".to_string()
    } else {
        last.replace(['\0', ':'], "_")
    }
}
