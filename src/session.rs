//! The conversion session: one PDF in, at most one DOCX out.
//!
//! ## States
//!
//! ```text
//!            select(pdf)            upload()              2xx
//!   Idle ─────────────────▶ Ready ───────────▶ Uploading ─────▶ ResultAvailable
//!    ▲  ◀── select(other) ── │ ▲ ◀── error / non-2xx ──┘              │
//!    │                       │ └──────────── discard_result() ────────┘
//!    └──────────── reset() / select(other) from any state ────────────┘
//! ```
//!
//! `upload()` is also accepted from `ResultAvailable`; the held result is
//! released before the new request's outcome is stored.
//!
//! Every operation records a [`SessionStatus`] for display and reports to
//! the attached [`SessionObserver`]. Failures are returned as
//! [`SessionError`] as well, but they never leave the session in
//! [`SessionState::Uploading`].
//!
//! ## Result lifetime
//!
//! A [`ConversionResult`] owns an [`ObjectUrl`] minted by the session's
//! [`ObjectUrlStore`]. The session revokes it before any replacement is
//! created, on discard, on a new selection, on reset and on drop, so the
//! number of revocations always catches up with the number of creations.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::filename::{derived_docx_name, resolve_filename, safe_file_name};
use crate::input::{FileCandidate, SelectedInput};
use crate::object_url::{ObjectUrl, ObjectUrlStore, TempFileStore};
use crate::observer::{NoopObserver, SharedObserver};
use crate::service::{ConversionService, HttpConversionService, ServiceResponse};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const NO_RESULT: &str = "No converted document yet";

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No valid input selected.
    Idle,
    /// A PDF is selected and can be uploaded.
    Ready,
    /// The request is in flight; uploading again is not possible.
    Uploading,
    /// A converted document is waiting to be opened, saved or discarded.
    ResultAvailable,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Ready => "ready",
            SessionState::Uploading => "uploading",
            SessionState::ResultAvailable => "result available",
        };
        f.write_str(s)
    }
}

/// How a status message should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Neutral,
    Success,
    Error,
}

/// The user-visible status line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStatus {
    pub message: String,
    pub severity: Severity,
}

impl SessionStatus {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// A converted document held by the session.
#[derive(Debug)]
pub struct ConversionResult {
    url: ObjectUrl,
    data: Bytes,
    name: String,
    content_type: Option<String>,
    content_type_matches: bool,
}

impl ConversionResult {
    /// Temporary reference to the document.
    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }

    /// Document bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Display name, from `Content-Disposition` or derived from the input name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// `Content-Type` the service sent, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Whether the content type matched the configured expectation.
    pub fn content_type_matches(&self) -> bool {
        self.content_type_matches
    }
}

/// State machine around a single conversion attempt at a time.
pub struct ConversionSession {
    config: SessionConfig,
    service: Arc<dyn ConversionService>,
    store: Arc<dyn ObjectUrlStore>,
    observer: SharedObserver,
    state: SessionState,
    status: SessionStatus,
    selected: Option<SelectedInput>,
    result: Option<ConversionResult>,
}

impl fmt::Debug for ConversionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionSession")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("status", &self.status)
            .field("selected", &self.selected.as_ref().map(|s| &s.name))
            .field("result", &self.result.as_ref().map(|r| &r.name))
            .finish()
    }
}

impl ConversionSession {
    /// Session talking to the configured HTTP endpoint, with results in a temp directory.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let service = HttpConversionService::new(&config)?;
        let store = TempFileStore::new()?;
        Ok(Self::with_parts(config, Arc::new(service), Arc::new(store)))
    }

    /// Session over caller-supplied collaborators.
    pub fn with_parts(
        config: SessionConfig,
        service: Arc<dyn ConversionService>,
        store: Arc<dyn ObjectUrlStore>,
    ) -> Self {
        Self {
            config,
            service,
            store,
            observer: Arc::new(NoopObserver),
            state: SessionState::Idle,
            status: SessionStatus::default(),
            selected: None,
            result: None,
        }
    }

    /// Attach an observer for state and status events.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn selected(&self) -> Option<&SelectedInput> {
        self.selected.as_ref()
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        self.result.as_ref()
    }

    /// Whether an upload trigger should be enabled right now.
    ///
    /// True once a PDF is selected and no request is in flight, including
    /// while a previous result is still held.
    pub fn can_upload(&self) -> bool {
        self.selected.is_some()
            && matches!(self.state, SessionState::Ready | SessionState::ResultAvailable)
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Offer a file. Any previous result is released first.
    ///
    /// Returns [`SessionError::InvalidInput`] for non-PDF candidates, leaving
    /// the session `Idle` with no selection.
    pub fn select_file(&mut self, candidate: FileCandidate) -> Result<(), SessionError> {
        self.release_result();

        match SelectedInput::try_from_candidate(candidate) {
            Ok(input) => {
                let message = format!("File ready: {} ({} KB)", input.name, input.size_kb());
                info!("Selected {} ({} bytes)", input.name, input.size);
                self.selected = Some(input);
                self.set_state(SessionState::Ready);
                self.set_status(message, Severity::Neutral);
                Ok(())
            }
            Err(e) => {
                debug!("Rejected candidate: {}", e);
                self.selected = None;
                self.set_state(SessionState::Idle);
                self.set_status(e.to_string(), Severity::Error);
                Err(e)
            }
        }
    }

    /// Upload the selected PDF and take ownership of the converted document.
    ///
    /// Valid in [`SessionState::Ready`] and [`SessionState::ResultAvailable`];
    /// otherwise this is a no-op that returns
    /// [`SessionError::PreconditionViolation`]. A result from an earlier
    /// upload is released before the new one is created. Exactly one request
    /// is issued per call.
    pub async fn upload(&mut self) -> Result<&ConversionResult, SessionError> {
        if self.state == SessionState::Uploading {
            return Err(self.precondition("An upload is already in progress"));
        }
        let (name, data) = match &self.selected {
            Some(input) => (input.name.clone(), input.data.clone()),
            None => return Err(self.precondition("Select a PDF file first")),
        };

        self.set_state(SessionState::Uploading);
        self.set_status(format!("Uploading {name}…"), Severity::Neutral);

        let service = Arc::clone(&self.service);
        let outcome = service.convert(&name, data).await;

        // A stale result must not outlive the attempt, whatever its outcome.
        self.release_result();

        match outcome {
            Ok(response) if response.is_success() => self.accept(response, &name).await,
            Ok(response) => Err(self.fail_upload(SessionError::UploadRejected {
                status: response.status,
                detail: response.error_detail(),
            })),
            Err(e) => Err(self.fail_upload(e)),
        }
    }

    /// The temporary reference to the converted document, for display elsewhere.
    pub fn open_result(&mut self) -> Result<&ObjectUrl, SessionError> {
        let name = match &self.result {
            Some(r) => r.name.clone(),
            None => return Err(self.precondition(NO_RESULT)),
        };
        self.set_status(format!("Opening {name}"), Severity::Neutral);
        self.result
            .as_ref()
            .map(|r| &r.url)
            .ok_or_else(|| SessionError::PreconditionViolation(NO_RESULT.into()))
    }

    /// Write the converted document into `dir` under its display name.
    ///
    /// The write goes through a temporary file and a rename so a failed save
    /// never leaves a truncated document behind. Returns the final path.
    pub async fn save_result(&mut self, dir: impl AsRef<Path>) -> Result<PathBuf, SessionError> {
        let (name, data) = match &self.result {
            Some(r) => (r.name.clone(), r.data.clone()),
            None => return Err(self.precondition(NO_RESULT)),
        };
        let path = dir.as_ref().join(safe_file_name(&name));

        match write_atomic(&path, &data).await {
            Ok(()) => {
                info!("Saved {} bytes to {}", data.len(), path.display());
                self.set_status(format!("Saved {}", path.display()), Severity::Success);
                Ok(path)
            }
            Err(e) => {
                warn!("Save failed: {}", e);
                self.set_status(format!("Save failed: {e}"), Severity::Error);
                Err(e)
            }
        }
    }

    /// Release the converted document. A no-op when there is none.
    pub fn discard_result(&mut self) {
        if self.result.is_none() {
            debug!("discard_result with no result");
            return;
        }
        self.release_result();
        self.settle();
        self.set_status("Result discarded", Severity::Neutral);
    }

    /// Drop the selection and any result, returning to `Idle`.
    pub fn reset(&mut self) {
        self.release_result();
        self.selected = None;
        self.set_state(SessionState::Idle);
        self.set_status("", Severity::Neutral);
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn accept(
        &mut self,
        response: ServiceResponse,
        original_name: &str,
    ) -> Result<&ConversionResult, SessionError> {
        let name = resolve_filename(response.content_disposition.as_deref())
            .unwrap_or_else(|| derived_docx_name(original_name));

        let content_type_matches = response
            .content_type
            .as_deref()
            .is_some_and(|ct| media_type_matches(ct, &self.config.expected_content_type));
        if !content_type_matches {
            warn!(
                "Unexpected content type {:?} for {}; offering it anyway",
                response.content_type, name
            );
        }

        let store = Arc::clone(&self.store);
        let (body, file_name) = (response.body.clone(), name.clone());
        let created = tokio::task::spawn_blocking(move || store.create(&body, &file_name))
            .await
            .unwrap_or_else(|e| Err(SessionError::Internal(format!("Store task panicked: {e}"))));
        let url = match created {
            Ok(url) => url,
            Err(e) => return Err(self.fail_upload(e)),
        };

        let kb = (response.body.len() as u64).div_ceil(1024);
        let message = if content_type_matches {
            format!("Converted: {name} ({kb} KB)")
        } else {
            format!(
                "Converted: {name} ({kb} KB), but the service sent {}",
                response.content_type.as_deref().unwrap_or("no content type")
            )
        };
        info!("Conversion finished: {} ({} bytes)", name, response.body.len());

        let result = ConversionResult {
            url,
            data: response.body,
            name,
            content_type: response.content_type,
            content_type_matches,
        };
        self.set_state(SessionState::ResultAvailable);
        self.set_status(message, Severity::Success);
        Ok(&*self.result.insert(result))
    }

    fn fail_upload(&mut self, err: SessionError) -> SessionError {
        warn!("Upload failed: {}", err);
        self.release_result();
        self.settle();
        self.set_status(format!("Upload failed: {err}"), Severity::Error);
        err
    }

    fn precondition(&mut self, reason: &str) -> SessionError {
        debug!("Precondition violated in state {}: {}", self.state, reason);
        self.set_status(reason, Severity::Error);
        SessionError::PreconditionViolation(reason.to_string())
    }

    /// Return to `Ready` or `Idle` depending on whether an input remains.
    fn settle(&mut self) {
        let next = if self.selected.is_some() {
            SessionState::Ready
        } else {
            SessionState::Idle
        };
        self.set_state(next);
    }

    fn release_result(&mut self) {
        if let Some(result) = self.result.take() {
            self.store.revoke(&result.url);
        }
    }

    fn set_state(&mut self, to: SessionState) {
        let from = self.state;
        if from != to {
            debug!("Session {} → {}", from, to);
            self.state = to;
            self.observer.on_state_change(from, to);
        }
    }

    fn set_status(&mut self, message: impl Into<String>, severity: Severity) {
        self.status = SessionStatus::new(message, severity);
        self.observer.on_status(&self.status);
    }
}

impl Drop for ConversionSession {
    fn drop(&mut self) {
        self.release_result();
    }
}

/// Compare media types by essence (ignoring parameters), case-insensitively.
fn media_type_matches(actual: &str, expected: &str) -> bool {
    let essence = actual.split(';').next().unwrap_or(actual).trim();
    essence.eq_ignore_ascii_case(expected.trim())
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), SessionError> {
    let storage = |source| SessionError::Storage {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(storage)?;
    }
    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, data).await.map_err(storage)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(storage(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DOCX_MEDIA_TYPE;
    use crate::observer::SessionObserver;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ── Test doubles ─────────────────────────────────────────────────────

    #[derive(Default)]
    struct ScriptedService {
        replies: Mutex<VecDeque<Result<ServiceResponse, SessionError>>>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedService {
        fn reply(self: &Arc<Self>, r: Result<ServiceResponse, SessionError>) -> Arc<Self> {
            self.replies.lock().unwrap().push_back(r);
            Arc::clone(self)
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ConversionService for ScriptedService {
        async fn convert(&self, file_name: &str, data: Bytes) -> Result<ServiceResponse, SessionError> {
            self.calls
                .lock()
                .unwrap()
                .push((file_name.to_string(), data.len()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SessionError::TransportFailure("no scripted reply".into())))
        }
    }

    #[derive(Default)]
    struct CountingStore {
        created: AtomicUsize,
        revoked: AtomicUsize,
        peak_live: AtomicUsize,
        fail_next: Mutex<bool>,
        create_threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl CountingStore {
        fn live(&self) -> usize {
            self.created.load(Ordering::SeqCst) - self.revoked.load(Ordering::SeqCst)
        }
    }

    impl ObjectUrlStore for CountingStore {
        fn create(&self, _data: &Bytes, name: &str) -> Result<ObjectUrl, SessionError> {
            self.create_threads
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err(SessionError::Storage {
                    path: PathBuf::from(name),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            let id = self.created.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            self.peak_live.fetch_max(self.live(), Ordering::SeqCst);
            Ok(ObjectUrl::new(id, format!("mem://{id}/{name}")))
        }

        fn revoke(&self, _url: &ObjectUrl) {
            self.revoked.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Transitions(Mutex<Vec<(SessionState, SessionState)>>);

    impl SessionObserver for Transitions {
        fn on_state_change(&self, from: SessionState, to: SessionState) {
            self.0.lock().unwrap().push((from, to));
        }
    }

    fn ok_docx(disposition: Option<&str>) -> Result<ServiceResponse, SessionError> {
        Ok(ServiceResponse {
            status: 200,
            content_type: Some(DOCX_MEDIA_TYPE.to_string()),
            content_disposition: disposition.map(str::to_string),
            body: Bytes::from_static(b"PK\x03\x04converted"),
        })
    }

    fn status(code: u16, body: &'static str) -> Result<ServiceResponse, SessionError> {
        Ok(ServiceResponse {
            status: code,
            content_type: Some("text/plain".into()),
            content_disposition: None,
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    fn pdf(name: &str) -> FileCandidate {
        FileCandidate::new(name, Some("application/pdf"), b"%PDF-1.4 body".to_vec())
    }

    fn session() -> (ConversionSession, Arc<ScriptedService>, Arc<CountingStore>) {
        let service = Arc::new(ScriptedService::default());
        let store = Arc::new(CountingStore::default());
        let s = ConversionSession::with_parts(
            SessionConfig::default(),
            service.clone(),
            store.clone(),
        );
        (s, service, store)
    }

    // ── select_file ──────────────────────────────────────────────────────

    #[test]
    fn selecting_a_pdf_makes_session_ready() {
        let (mut s, _, _) = session();
        s.select_file(pdf("invoice.pdf")).unwrap();

        assert_eq!(s.state(), SessionState::Ready);
        assert!(s.can_upload());
        assert_eq!(s.status().severity, Severity::Neutral);
        assert!(s.status().message.contains("invoice.pdf"), "{:?}", s.status());
    }

    #[test]
    fn selecting_by_suffix_only_is_accepted() {
        let (mut s, _, _) = session();
        s.select_file(FileCandidate::new("Dropped.PDF", None, vec![1u8]))
            .unwrap();
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[test]
    fn selecting_a_non_pdf_goes_idle_with_error() {
        let (mut s, _, _) = session();
        s.select_file(pdf("a.pdf")).unwrap();

        let err = s
            .select_file(FileCandidate::new("notes.txt", Some("text/plain"), vec![1u8]))
            .unwrap_err();

        assert!(matches!(err, SessionError::InvalidInput { .. }));
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.selected().is_none());
        assert!(s.status().is_error());
        assert!(s.status().message.contains("PDF required"));
    }

    #[tokio::test]
    async fn new_selection_releases_existing_result() {
        let (mut s, service, store) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("a.pdf")).unwrap();
        s.upload().await.unwrap();
        assert_eq!(store.live(), 1);

        s.select_file(pdf("b.pdf")).unwrap();
        assert!(s.result().is_none());
        assert_eq!(store.live(), 0);
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn invalid_selection_releases_existing_result() {
        let (mut s, service, store) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("a.pdf")).unwrap();
        s.upload().await.unwrap();

        let _ = s.select_file(FileCandidate::new("x.png", Some("image/png"), vec![1u8]));
        assert!(s.result().is_none());
        assert_eq!(store.live(), 0);
        assert_eq!(s.state(), SessionState::Idle);
    }

    // ── upload ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn upload_without_selection_is_a_noop() {
        let (mut s, service, _) = session();
        let err = s.upload().await.unwrap_err();

        assert!(matches!(err, SessionError::PreconditionViolation(_)));
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.status().is_error());
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn upload_again_replaces_previous_result() {
        let (mut s, service, store) = session();
        service
            .reply(ok_docx(Some("attachment; filename=first.docx")))
            .reply(ok_docx(Some("attachment; filename=second.docx")));
        s.select_file(pdf("invoice.pdf")).unwrap();
        s.upload().await.unwrap();
        let first = s.result().unwrap().url().href().to_string();
        assert!(s.can_upload());

        let second = s.upload().await.unwrap();
        assert_eq!(second.name(), "second.docx");
        assert_ne!(second.url().href(), first);

        assert_eq!(s.state(), SessionState::ResultAvailable);
        assert_eq!(service.call_count(), 2);
        assert_eq!(store.created.load(Ordering::SeqCst), 2);
        assert_eq!(store.revoked.load(Ordering::SeqCst), 1);
        assert_eq!(store.peak_live.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_upload_again_releases_previous_result() {
        let (mut s, service, store) = session();
        service.reply(ok_docx(None)).reply(status(502, ""));
        s.select_file(pdf("invoice.pdf")).unwrap();
        s.upload().await.unwrap();

        let err = s.upload().await.unwrap_err();
        assert!(matches!(err, SessionError::UploadRejected { status: 502, .. }));
        assert!(s.result().is_none());
        assert_eq!(store.live(), 0);
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn successful_upload_derives_docx_name() {
        let (mut s, service, _) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("invoice.pdf")).unwrap();

        let result = s.upload().await.unwrap();
        assert_eq!(result.name(), "invoice.docx");
        assert_eq!(result.data().as_ref(), b"PK\x03\x04converted");
        assert!(result.content_type_matches());

        assert_eq!(s.state(), SessionState::ResultAvailable);
        assert_eq!(s.status().severity, Severity::Success);
        assert!(s.can_upload());
    }

    #[tokio::test]
    async fn result_is_stored_off_the_runtime_thread() {
        let (mut s, service, store) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("invoice.pdf")).unwrap();
        s.upload().await.unwrap();

        let threads = store.create_threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn upload_sends_one_request_with_original_name() {
        let (mut s, service, _) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("scan 01.pdf")).unwrap();
        s.upload().await.unwrap();

        let calls = service.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("scan 01.pdf".to_string(), 13)]);
    }

    #[tokio::test]
    async fn content_disposition_name_wins() {
        let (mut s, service, _) = session();
        service.reply(ok_docx(Some("attachment; filename*=UTF-8''%E2%82%ACrates.docx")));
        s.select_file(pdf("rates.pdf")).unwrap();

        assert_eq!(s.upload().await.unwrap().name(), "€rates.docx");
    }

    #[tokio::test]
    async fn rejected_upload_returns_to_ready() {
        let (mut s, service, store) = session();
        service.reply(status(500, "bad pdf"));
        s.select_file(pdf("invoice.pdf")).unwrap();

        let err = s.upload().await.unwrap_err();

        assert!(matches!(err, SessionError::UploadRejected { status: 500, .. }));
        assert_eq!(s.state(), SessionState::Ready);
        assert!(s.result().is_none());
        assert!(s.status().is_error());
        assert!(s.status().message.contains("500"));
        assert!(s.status().message.contains("bad pdf"));
        assert_eq!(store.created.load(Ordering::SeqCst), 0);
        assert!(s.can_upload());
    }

    #[tokio::test]
    async fn rejected_upload_with_empty_body_says_unknown_error() {
        let (mut s, service, _) = session();
        service.reply(status(503, ""));
        s.select_file(pdf("invoice.pdf")).unwrap();

        let err = s.upload().await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503: Unknown error");
    }

    #[tokio::test]
    async fn transport_failure_returns_to_ready() {
        let (mut s, service, _) = session();
        service.reply(Err(SessionError::TransportFailure(
            "Request timed out after 120s".into(),
        )));
        s.select_file(pdf("invoice.pdf")).unwrap();

        let err = s.upload().await.unwrap_err();

        assert!(matches!(err, SessionError::TransportFailure(_)));
        assert_eq!(s.state(), SessionState::Ready);
        assert!(s.status().message.contains("timed out"));
    }

    #[tokio::test]
    async fn retry_after_failure_succeeds() {
        let (mut s, service, _) = session();
        service
            .reply(status(500, "busy"))
            .reply(ok_docx(Some(r#"attachment; filename="final.docx""#)));
        s.select_file(pdf("invoice.pdf")).unwrap();

        assert!(s.upload().await.is_err());
        assert_eq!(s.upload().await.unwrap().name(), "final.docx");
        assert_eq!(service.call_count(), 2);
    }

    #[tokio::test]
    async fn unexpected_content_type_is_advisory() {
        let (mut s, service, _) = session();
        service.reply(Ok(ServiceResponse {
            status: 200,
            content_type: Some("application/octet-stream".into()),
            content_disposition: None,
            body: Bytes::from_static(b"bytes"),
        }));
        s.select_file(pdf("invoice.pdf")).unwrap();

        let result = s.upload().await.unwrap();
        assert!(!result.content_type_matches());
        assert_eq!(result.content_type(), Some("application/octet-stream"));
        assert_eq!(s.status().severity, Severity::Success);
        assert!(s.status().message.contains("application/octet-stream"));
    }

    #[tokio::test]
    async fn content_type_parameters_are_ignored() {
        let (mut s, service, _) = session();
        service.reply(Ok(ServiceResponse {
            status: 200,
            content_type: Some(format!("{DOCX_MEDIA_TYPE}; charset=binary")),
            content_disposition: None,
            body: Bytes::from_static(b"bytes"),
        }));
        s.select_file(pdf("invoice.pdf")).unwrap();
        assert!(s.upload().await.unwrap().content_type_matches());
    }

    #[tokio::test]
    async fn store_failure_is_handled_like_transport_failure() {
        let (mut s, service, store) = session();
        service.reply(ok_docx(None));
        *store.fail_next.lock().unwrap() = true;
        s.select_file(pdf("invoice.pdf")).unwrap();

        let err = s.upload().await.unwrap_err();
        assert!(matches!(err, SessionError::Storage { .. }));
        assert_eq!(s.state(), SessionState::Ready);
        assert!(s.result().is_none());
    }

    #[tokio::test]
    async fn observer_sees_upload_transitions() {
        let (s, service, _) = session();
        let transitions = Arc::new(Transitions::default());
        let mut s = s.with_observer(transitions.clone());
        service.reply(ok_docx(None));

        s.select_file(pdf("invoice.pdf")).unwrap();
        s.upload().await.unwrap();

        assert_eq!(
            *transitions.0.lock().unwrap(),
            vec![
                (SessionState::Idle, SessionState::Ready),
                (SessionState::Ready, SessionState::Uploading),
                (SessionState::Uploading, SessionState::ResultAvailable),
            ]
        );
    }

    // ── open / save / discard ────────────────────────────────────────────

    #[test]
    fn open_and_discard_without_result() {
        let (mut s, _, _) = session();
        assert!(matches!(
            s.open_result(),
            Err(SessionError::PreconditionViolation(_))
        ));

        s.select_file(pdf("a.pdf")).unwrap();
        let before = s.status().clone();
        s.discard_result();
        assert_eq!(s.state(), SessionState::Ready);
        assert_eq!(s.status(), &before);
    }

    #[test]
    fn discard_on_idle_is_a_noop() {
        let (mut s, _, store) = session();
        s.discard_result();
        s.discard_result();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(store.revoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn open_exposes_url_without_changing_state() {
        let (mut s, service, _) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("invoice.pdf")).unwrap();
        s.upload().await.unwrap();

        let href = s.open_result().unwrap().href().to_string();
        assert_eq!(href, "mem://1/invoice.docx");
        assert_eq!(s.state(), SessionState::ResultAvailable);
    }

    #[tokio::test]
    async fn save_writes_document_under_display_name() {
        let (mut s, service, _) = session();
        service.reply(ok_docx(Some(r#"attachment; filename="Report Final.docx""#)));
        s.select_file(pdf("invoice.pdf")).unwrap();
        s.upload().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let path = s.save_result(&out).await.unwrap();

        assert_eq!(path, out.join("Report Final.docx"));
        assert_eq!(std::fs::read(&path).unwrap(), b"PK\x03\x04converted");
        assert!(!out.join("Report Final.docx.tmp").exists());
        assert_eq!(s.state(), SessionState::ResultAvailable);
        assert_eq!(s.status().severity, Severity::Success);
    }

    #[tokio::test]
    async fn save_without_result_fails() {
        let (mut s, _, _) = session();
        let dir = tempfile::tempdir().unwrap();
        let err = s.save_result(dir.path()).await.unwrap_err();
        assert!(matches!(err, SessionError::PreconditionViolation(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_temp_file() {
        let (mut s, service, _) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("invoice.pdf")).unwrap();
        s.upload().await.unwrap();

        // A non-empty directory at the target path makes the rename fail.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("invoice.docx");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let err = s.save_result(dir.path()).await.unwrap_err();
        assert!(matches!(err, SessionError::Storage { .. }));
        assert!(s.status().is_error());
        assert!(!dir.path().join("invoice.docx.tmp").exists());
        assert_eq!(s.state(), SessionState::ResultAvailable);
    }

    #[tokio::test]
    async fn discard_releases_and_returns_to_ready() {
        let (mut s, service, store) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("invoice.pdf")).unwrap();
        s.upload().await.unwrap();

        s.discard_result();

        assert!(s.result().is_none());
        assert_eq!(s.state(), SessionState::Ready);
        assert_eq!(store.live(), 0);
        assert_eq!(s.status().message, "Result discarded");
        assert!(s.can_upload());
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let (mut s, service, store) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("invoice.pdf")).unwrap();
        s.upload().await.unwrap();

        s.reset();

        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.selected().is_none());
        assert!(s.result().is_none());
        assert_eq!(s.status(), &SessionStatus::default());
        assert_eq!(store.live(), 0);
    }

    // ── Handle accounting ────────────────────────────────────────────────

    #[tokio::test]
    async fn no_handle_outlives_the_session() {
        let (mut s, service, store) = session();
        for _ in 0..3 {
            service.reply(ok_docx(None));
        }
        service.reply(status(500, "nope"));

        s.select_file(pdf("a.pdf")).unwrap();
        s.upload().await.unwrap();
        s.discard_result();
        s.upload().await.unwrap();
        s.select_file(pdf("b.pdf")).unwrap();
        s.upload().await.unwrap();
        assert!(store.live() <= 1);
        s.discard_result();
        let _ = s.upload().await;
        s.select_file(pdf("c.pdf")).unwrap();
        drop(s);

        assert_eq!(store.created.load(Ordering::SeqCst), 3);
        assert_eq!(store.live(), 0);
    }

    #[tokio::test]
    async fn drop_releases_live_result() {
        let (mut s, service, store) = session();
        service.reply(ok_docx(None));
        s.select_file(pdf("a.pdf")).unwrap();
        s.upload().await.unwrap();
        assert_eq!(store.live(), 1);

        drop(s);
        assert_eq!(store.live(), 0);
    }

    #[test]
    fn media_type_comparison() {
        assert!(media_type_matches("Application/PDF", "application/pdf"));
        assert!(media_type_matches("text/plain; charset=utf-8", "text/plain"));
        assert!(!media_type_matches("text/html", "text/plain"));
    }
}
