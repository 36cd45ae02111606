//! Temporary references to in-memory result data.
//!
//! A converted document lives in memory, but opening it in another program
//! needs an address. [`ObjectUrlStore::create`] mints an [`ObjectUrl`] for a
//! byte buffer and [`ObjectUrlStore::revoke`] releases it. Every created URL
//! must be revoked exactly once; the session enforces release-before-replace
//! so at most one URL is live at a time.
//!
//! [`TempFileStore`] backs each URL with a file in a private [`TempDir`].
//! Revoking deletes the file; dropping the store removes the directory and
//! anything a caller forgot to revoke.

use crate::error::SessionError;
use crate::filename::safe_file_name;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use tracing::{debug, warn};

/// A live temporary reference to result data.
///
/// Not `Clone`: the session holds the only copy and hands out borrows.
#[derive(Debug, PartialEq, Eq)]
pub struct ObjectUrl {
    id: u64,
    href: String,
}

impl ObjectUrl {
    pub fn new(id: u64, href: impl Into<String>) -> Self {
        Self {
            id,
            href: href.into(),
        }
    }

    /// Store-assigned identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The address other programs can open.
    pub fn href(&self) -> &str {
        &self.href
    }
}

/// Registry of temporary references.
///
/// Implementations must be `Send + Sync` so a session can be moved into a
/// spawned task.
pub trait ObjectUrlStore: Send + Sync {
    /// Make `data` addressable. `name` is a hint for the artifact's name.
    ///
    /// May block on I/O. The session calls it through
    /// `tokio::task::spawn_blocking`.
    fn create(&self, data: &Bytes, name: &str) -> Result<ObjectUrl, SessionError>;

    /// Release a reference. Revoking an unknown URL is a no-op.
    ///
    /// Called synchronously, including from `Drop`, so it should stay cheap.
    fn revoke(&self, url: &ObjectUrl);
}

/// [`ObjectUrlStore`] backed by files in a private temporary directory.
pub struct TempFileStore {
    dir: TempDir,
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, PathBuf>>,
}

impl TempFileStore {
    /// Create a store with a fresh temporary directory.
    pub fn new() -> Result<Self, SessionError> {
        let dir = TempDir::with_prefix("pdf2docx-").map_err(|source| SessionError::Storage {
            path: std::env::temp_dir(),
            source,
        })?;
        debug!("Object URL store at {}", dir.path().display());
        Ok(Self {
            dir,
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        })
    }

    /// Number of references created and not yet revoked.
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Path backing a live reference, if any.
    pub fn path_of(&self, url: &ObjectUrl) -> Option<PathBuf> {
        self.live.lock().ok()?.get(&url.id).cloned()
    }
}

impl ObjectUrlStore for TempFileStore {
    fn create(&self, data: &Bytes, name: &str) -> Result<ObjectUrl, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // One sub-directory per URL keeps the artifact's own name intact.
        let slot = self.dir.path().join(id.to_string());
        let path = slot.join(safe_file_name(name));

        std::fs::create_dir_all(&slot)
            .and_then(|_| std::fs::write(&path, data))
            .map_err(|source| SessionError::Storage {
                path: path.clone(),
                source,
            })?;

        let href = reqwest::Url::from_file_path(&path)
            .map(String::from)
            .unwrap_or_else(|_| format!("file://{}", path.display()));

        if let Ok(mut live) = self.live.lock() {
            live.insert(id, slot);
        }
        debug!("Created object URL #{id}: {href}");
        Ok(ObjectUrl::new(id, href))
    }

    fn revoke(&self, url: &ObjectUrl) {
        let slot = self.live.lock().ok().and_then(|mut m| m.remove(&url.id));
        match slot {
            Some(slot) => {
                if let Err(e) = std::fs::remove_dir_all(&slot) {
                    warn!("Failed to remove {}: {}", slot.display(), e);
                }
                debug!("Revoked object URL #{}", url.id);
            }
            None => debug!("Object URL #{} already revoked", url.id),
        }
    }
}
