// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document curation session.
//
// A session owns the editable projection of exactly one document:
//
//   Idle → Loading → Ready ⇄ Exporting → Closed
//                  ↘ Failed (re-open allowed)
//
// Page edits are applied locally before the server answers.  A failed edit
// is not rolled back field by field; the session re-fetches the document and
// replaces its state wholesale.  Server pushes do the same through the
// reconciler, but only while `Ready`.  `Exporting` keeps pushes from racing
// the irreversible export.
//
// The state lives behind a `std::sync::Mutex` shared with the reconciler
// task.  The lock is only ever held for synchronous sections and never
// across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use paperpilot_core::error::{PaperPilotError, Result};
use paperpilot_core::human_errors::humanize_error;
use paperpilot_core::page_rules;
use paperpilot_core::types::{Document, DocumentId, Page, PageEdit};

use crate::api::DocumentApi;
use crate::events::EventTransport;
use crate::prompt::{EXPORT_QUESTION, OperatorPrompt};
use crate::reconciler::{PushStats, Reconciler};

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Constructed, not opened yet.
    Idle,
    /// Initial fetch in flight.
    Loading,
    /// Editable; pushes are applied.
    Ready,
    /// Export in flight; pushes are dropped and edits rejected.
    Exporting,
    /// Initial fetch failed.  `open` may be called again.
    Failed,
    /// Terminal.  The session must be discarded.
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Exporting => "exporting",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared between a session and its reconciler.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) document_id: Option<DocumentId>,
    pub(crate) document: Option<Document>,
    /// Uncommitted filename typed by the operator.
    pub(crate) draft_name: Option<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            document_id: None,
            document: None,
            draft_name: None,
        }
    }

    /// Id of the open document if the session is `Ready`.
    fn require_ready(&self, operation: &'static str) -> Result<DocumentId> {
        match (self.phase, self.document_id) {
            (SessionPhase::Ready, Some(id)) => Ok(id),
            (SessionPhase::Closed, _) => Err(PaperPilotError::SessionClosed),
            (phase, _) => Err(PaperPilotError::InvalidPhase {
                operation,
                phase: phase.as_str(),
            }),
        }
    }

    /// Whether an authoritative fetch of `id` may replace local state.
    fn accepts_fetch(&self, id: &DocumentId) -> bool {
        matches!(self.phase, SessionPhase::Ready | SessionPhase::Exporting)
            && self.document_id.as_ref() == Some(id)
    }
}

/// Lock the shared state.  A poisoned lock still holds consistent data
/// because every critical section is a plain field assignment.
pub(crate) fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of a page edit whose preconditions held.
#[derive(Debug)]
pub enum MutationOutcome {
    /// The server accepted the edit; the optimistic state stands.
    Confirmed,
    /// The server rejected the edit; local state was replaced by a fresh
    /// authoritative fetch.
    Reverted { cause: PaperPilotError },
    /// The server rejected the edit and the re-fetch failed too.  Local state
    /// still shows the optimistic edit; call `refresh` to reconcile.
    Unreconciled {
        cause: PaperPilotError,
        refresh_error: PaperPilotError,
    },
}

impl MutationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// Result of an export request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The operator did not confirm; nothing was sent.
    Declined,
    /// The document left the active set and the session is closed.
    Exported(DocumentId),
}

/// Live editing session for one document.
pub struct DocumentSession {
    state: Arc<Mutex<SessionState>>,
    api: Arc<dyn DocumentApi>,
    events: Arc<dyn EventTransport>,
    prompt: Arc<dyn OperatorPrompt>,
    reconciler: Mutex<Option<Reconciler>>,
    stats: Arc<watch::Sender<PushStats>>,
}

impl DocumentSession {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        events: Arc<dyn EventTransport>,
        prompt: Arc<dyn OperatorPrompt>,
    ) -> Self {
        let (stats, _) = watch::channel(PushStats::default());
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            api,
            events,
            prompt,
            reconciler: Mutex::new(None),
            stats: Arc::new(stats),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    fn reconciler_slot(&self) -> MutexGuard<'_, Option<Reconciler>> {
        self.reconciler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Accessors -------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        self.lock().document_id
    }

    /// Snapshot of the current (possibly optimistic) document.
    pub fn document(&self) -> Option<Document> {
        self.lock().document.clone()
    }

    pub fn page(&self, page_number: usize) -> Option<Page> {
        self.lock()
            .document
            .as_ref()
            .and_then(|doc| doc.page(page_number).cloned())
    }

    /// The uncommitted filename, if the operator has typed one.
    pub fn draft_name(&self) -> Option<String> {
        self.lock().draft_name.clone()
    }

    /// Counters of pushes handled by the reconciler.
    pub fn push_stats(&self) -> watch::Receiver<PushStats> {
        self.stats.subscribe()
    }

    // -- Lifecycle -------------------------------------------------------------

    /// Fetch `id` and start receiving pushes for it.
    ///
    /// On failure the session moves to `Failed` and the error is returned;
    /// the caller may call `open` again.
    #[instrument(skip(self, id), fields(doc_id = %id))]
    pub async fn open(&self, id: DocumentId) -> Result<()> {
        {
            let mut state = self.lock();
            match state.phase {
                SessionPhase::Idle | SessionPhase::Failed => {}
                SessionPhase::Closed => return Err(PaperPilotError::SessionClosed),
                phase => {
                    return Err(PaperPilotError::InvalidPhase {
                        operation: "open",
                        phase: phase.as_str(),
                    });
                }
            }
            state.phase = SessionPhase::Loading;
            state.document_id = Some(id);
            state.document = None;
            state.draft_name = None;
        }
        debug!("loading document");

        let doc = match self.api.get_document(&id).await {
            Ok(doc) => doc,
            Err(e) => {
                let mut state = self.lock();
                if state.phase == SessionPhase::Loading {
                    state.phase = SessionPhase::Failed;
                }
                warn!(error = %e, "initial load failed");
                return Err(e);
            }
        };

        {
            let mut state = self.lock();
            if state.phase != SessionPhase::Loading {
                return Err(PaperPilotError::SessionClosed);
            }
            state.document = Some(doc);
            state.phase = SessionPhase::Ready;
        }

        let subscription = self.events.subscribe(id);
        let reconciler = Reconciler::spawn(
            Arc::clone(&self.state),
            id,
            subscription,
            Arc::clone(&self.stats),
        );
        self.reconciler_slot().replace(reconciler);

        // `close` may have run between the phase change and storing the
        // reconciler; it would not have seen it.
        if self.phase() == SessionPhase::Closed {
            if let Some(reconciler) = self.reconciler_slot().take() {
                reconciler.stop();
            }
            return Err(PaperPilotError::SessionClosed);
        }

        info!("session ready");
        Ok(())
    }

    /// Release the event-stream subscription and end the session.
    /// Callable from any phase; idempotent.
    pub fn close(&self) {
        let previous = {
            let mut state = self.lock();
            let previous = state.phase;
            state.phase = SessionPhase::Closed;
            state.draft_name = None;
            previous
        };
        if let Some(reconciler) = self.reconciler_slot().take() {
            reconciler.stop();
        }
        if previous != SessionPhase::Closed {
            info!(doc_id = ?self.document_id(), "session closed");
        }
    }

    /// Re-fetch the document and replace local state wholesale.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let id = {
            let state = self.lock();
            match (state.phase, state.document_id) {
                (SessionPhase::Ready | SessionPhase::Exporting, Some(id)) => id,
                (SessionPhase::Closed, _) => return Err(PaperPilotError::SessionClosed),
                (phase, _) => {
                    return Err(PaperPilotError::InvalidPhase {
                        operation: "refresh",
                        phase: phase.as_str(),
                    });
                }
            }
        };

        let doc = self.api.get_document(&id).await?;

        let mut state = self.lock();
        if state.accepts_fetch(&doc.id) {
            state.document = Some(doc);
            debug!(doc_id = %id, "replaced local state with authoritative copy");
        } else if state.phase == SessionPhase::Closed {
            return Err(PaperPilotError::SessionClosed);
        }
        Ok(())
    }

    // -- Page edits ------------------------------------------------------------

    /// Apply `edit` to one page immediately, then confirm it with the server.
    ///
    /// Precondition violations (empty edit, unknown page, session not
    /// `Ready`) return an error without touching state or the network.
    /// Earlier unconfirmed edits to the same page do not block this one.
    #[instrument(skip(self))]
    pub async fn update_page(&self, page_number: usize, edit: PageEdit) -> Result<MutationOutcome> {
        if edit.is_empty() {
            return Err(PaperPilotError::EmptyPageEdit);
        }

        let id = {
            let mut state = self.lock();
            let id = state.require_ready("edit a page")?;
            let doc = state.document.as_mut().ok_or(PaperPilotError::SessionClosed)?;
            let len = doc.pages.len();
            let page = doc
                .pages
                .get(page_number)
                .ok_or(PaperPilotError::PageOutOfRange {
                    page: page_number,
                    len,
                })?;
            let updated = edit.apply(page);
            doc.pages[page_number] = updated;
            id
        };
        debug!("optimistic page edit applied");

        let cause = match self.api.update_page(&id, page_number, &edit).await {
            Ok(()) => return Ok(MutationOutcome::Confirmed),
            Err(cause) => cause,
        };

        warn!(error = %cause, "page update failed, reloading document");
        match self.refresh().await {
            Ok(()) => Ok(MutationOutcome::Reverted { cause }),
            Err(refresh_error) => {
                warn!(error = %refresh_error, "reload after failed page update also failed");
                Ok(MutationOutcome::Unreconciled {
                    cause,
                    refresh_error,
                })
            }
        }
    }

    /// Advance the status of a page: valid → delete → split → valid.
    pub async fn toggle_status(&self, page_number: usize) -> Result<MutationOutcome> {
        let edit = self.edit_for(page_number, page_rules::toggle_edit)?;
        self.update_page(page_number, edit).await
    }

    /// Rotate a page a quarter turn clockwise.
    pub async fn rotate_page(&self, page_number: usize) -> Result<MutationOutcome> {
        let edit = self.edit_for(page_number, page_rules::rotate_edit)?;
        self.update_page(page_number, edit).await
    }

    fn edit_for(&self, page_number: usize, rule: fn(&Page) -> PageEdit) -> Result<PageEdit> {
        let state = self.lock();
        state.require_ready("edit a page")?;
        let doc = state.document.as_ref().ok_or(PaperPilotError::SessionClosed)?;
        doc.page(page_number)
            .map(rule)
            .ok_or(PaperPilotError::PageOutOfRange {
                page: page_number,
                len: doc.pages.len(),
            })
    }

    // -- Rename ----------------------------------------------------------------

    /// Record the filename field's current text without committing it.
    pub fn set_draft_name(&self, name: impl Into<String>) -> Result<()> {
        let mut state = self.lock();
        state.require_ready("rename")?;
        state.draft_name = Some(name.into());
        Ok(())
    }

    /// Commit a new filename (the field lost focus or was saved).
    ///
    /// On failure the operator is alerted and the name stays pending, so the
    /// next commit or export retries it.
    #[instrument(skip(self, name))]
    pub async fn rename_document(&self, name: impl Into<String>) -> Result<()> {
        self.set_draft_name(name)?;
        match self.flush_draft().await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(error = %e, "rename failed");
                self.prompt.alert(&humanize_error(&e));
                Err(e)
            }
        }
    }

    /// Send the pending filename, if any.  Returns whether a request was made.
    async fn flush_draft(&self) -> Result<bool> {
        let (id, name) = {
            let state = self.lock();
            let Some(name) = state.draft_name.clone() else {
                return Ok(false);
            };
            let id = state.document_id.ok_or(PaperPilotError::SessionClosed)?;
            (id, name)
        };

        let doc = self.api.update_metadata(&id, &name).await?;

        let mut state = self.lock();
        if state.draft_name.as_deref() == Some(name.as_str()) {
            state.draft_name = None;
        }
        // Only the name is taken from the response; its pages may predate
        // page edits that are still in flight.
        if state.accepts_fetch(&doc.id) {
            if let Some(local) = state.document.as_mut() {
                local.user_filename = doc.user_filename;
            }
        }
        debug!(doc_id = %id, "filename committed");
        Ok(true)
    }

    // -- Export ----------------------------------------------------------------

    /// Confirm with the operator, flush the pending filename, and export.
    ///
    /// While this runs the session is `Exporting` and pushes are dropped.
    /// If the flush or the export fails the session returns to `Ready` with
    /// all local edits intact, the operator is alerted, and the error is
    /// returned.  On success the session is closed.
    #[instrument(skip(self))]
    pub async fn export(&self) -> Result<ExportOutcome> {
        self.lock().require_ready("export")?;

        if !self.prompt.confirm(EXPORT_QUESTION).await {
            info!("export declined");
            return Ok(ExportOutcome::Declined);
        }

        let id = {
            let mut state = self.lock();
            let id = state.require_ready("export")?;
            state.phase = SessionPhase::Exporting;
            id
        };
        info!(doc_id = %id, "exporting, pushes suspended");

        if let Err(e) = self.flush_draft().await {
            return Err(self.abort_export("flush filename", e));
        }
        if let Err(e) = self.api.export_document(&id).await {
            return Err(self.abort_export("export", e));
        }

        self.close();
        info!(doc_id = %id, "document exported");
        Ok(ExportOutcome::Exported(id))
    }

    fn abort_export(&self, stage: &'static str, err: PaperPilotError) -> PaperPilotError {
        {
            let mut state = self.lock();
            if state.phase == SessionPhase::Exporting {
                state.phase = SessionPhase::Ready;
            }
        }
        error!(stage, error = %err, "export failed, local edits kept");
        self.prompt.alert(&humanize_error(&err));
        err
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        self.close();
    }
}
