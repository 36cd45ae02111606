//! Observer trait for session events.
//!
//! A presentation layer attaches an [`Arc<dyn SessionObserver>`] via
//! [`crate::session::ConversionSession::with_observer`] to repaint itself
//! when the session changes: show the status line, disable the upload
//! trigger while a request is in flight, reveal or hide the result actions.
//!
//! # Example
//!
//! ```rust
//! use pdf2docx::{SessionObserver, SessionStatus};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct StatusLog {
//!     lines: Mutex<Vec<String>>,
//! }
//!
//! impl SessionObserver for StatusLog {
//!     fn on_status(&self, status: &SessionStatus) {
//!         self.lines.lock().unwrap().push(status.message.clone());
//!     }
//! }
//! ```

use crate::session::{SessionState, SessionStatus};
use std::sync::Arc;

/// Called by the session whenever its state or status changes.
///
/// All methods have no-op defaults so implementors only override what they
/// render.
pub trait SessionObserver: Send + Sync {
    /// Called after every state transition (`from != to`).
    fn on_state_change(&self, from: SessionState, to: SessionState) {
        let _ = (from, to);
    }

    /// Called whenever the status line is replaced.
    fn on_status(&self, status: &SessionStatus) {
        let _ = status;
    }
}

/// Observer that ignores every event. The default when none is attached.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias for the type stored in the session.
pub type SharedObserver = Arc<dyn SessionObserver>;
