// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document list controller.
//
// Polls the active document set and hands a selected id to a fresh
// `DocumentSession`.  The controller owns two long-lived resources, the poll
// task and the selected session's subscription, and releases both on `stop`,
// on reselection, and on drop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use paperpilot_core::ClientConfig;
use paperpilot_core::error::{PaperPilotError, Result};
use paperpilot_core::human_errors::humanize_error;
use paperpilot_core::types::{Document, DocumentId};

use crate::api::DocumentApi;
use crate::events::EventTransport;
use crate::prompt::{DELETE_QUESTION, OperatorPrompt};
use crate::session::{DocumentSession, ExportOutcome};

/// List view state plus the currently selected session.
pub struct DocumentListController {
    api: Arc<dyn DocumentApi>,
    events: Arc<dyn EventTransport>,
    prompt: Arc<dyn OperatorPrompt>,
    config: ClientConfig,
    documents: Arc<watch::Sender<Vec<Document>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
    active: Mutex<Option<Arc<DocumentSession>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DocumentListController {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        events: Arc<dyn EventTransport>,
        prompt: Arc<dyn OperatorPrompt>,
        config: ClientConfig,
    ) -> Self {
        let (documents, _) = watch::channel(Vec::new());
        Self {
            api,
            events,
            prompt,
            config,
            documents: Arc::new(documents),
            poller: Mutex::new(None),
            active: Mutex::new(None),
        }
    }

    /// Latest known list.
    pub fn documents(&self) -> Vec<Document> {
        self.documents.borrow().clone()
    }

    /// Receiver notified whenever the list changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Document>> {
        self.documents.subscribe()
    }

    /// The selected session, if any.
    pub fn active_session(&self) -> Option<Arc<DocumentSession>> {
        lock(&self.active).clone()
    }

    // -- Polling ---------------------------------------------------------------

    /// Fetch the list once.  On failure the previous list is kept.
    pub async fn refresh(&self) -> Result<()> {
        fetch_into(self.api.as_ref(), &self.documents).await
    }

    /// Start polling every `poll_interval`.  The first fetch happens
    /// immediately.  Calling `start` while polling is a no-op.
    pub fn start(&self) {
        let mut poller = lock(&self.poller);
        if poller.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("list poller already running");
            return;
        }
        let api = Arc::clone(&self.api);
        let documents = Arc::clone(&self.documents);
        let interval = self.config.poll_interval();
        *poller = Some(tokio::spawn(poll(api, documents, interval)));
        info!(interval_secs = interval.as_secs(), "list polling started");
    }

    /// Stop polling.  Idempotent.
    pub fn stop(&self) {
        if let Some(task) = lock(&self.poller).take() {
            task.abort();
            info!("list polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.poller).is_some()
    }

    // -- Selection -------------------------------------------------------------

    /// Close the current session, then open a new one for `id`.
    ///
    /// If the new session fails to open, no session is selected and the
    /// error is returned; selecting again retries.
    #[instrument(skip(self, id), fields(doc_id = %id))]
    pub async fn select(&self, id: DocumentId) -> Result<Arc<DocumentSession>> {
        self.close_active();

        let session = Arc::new(DocumentSession::new(
            Arc::clone(&self.api),
            Arc::clone(&self.events),
            Arc::clone(&self.prompt),
        ));
        session.open(id).await?;

        let previous = lock(&self.active).replace(Arc::clone(&session));
        if let Some(previous) = previous {
            // A concurrent select won the race; keep the newest.
            previous.close();
        }
        Ok(session)
    }

    /// Close and forget the selected session.
    pub fn close_active(&self) {
        if let Some(session) = lock(&self.active).take() {
            session.close();
        }
    }

    /// Export the selected document.  On success it leaves the list and the
    /// selection is cleared.
    pub async fn export_selected(&self) -> Result<ExportOutcome> {
        let session = self.active_session().ok_or(PaperPilotError::SessionClosed)?;
        let outcome = session.export().await?;
        if let ExportOutcome::Exported(id) = outcome {
            self.forget(&id);
        }
        Ok(outcome)
    }

    /// Delete a document after confirmation.  Returns `false` if the operator
    /// declined.  On failure the operator is alerted and the document stays
    /// listed.
    #[instrument(skip(self, id), fields(doc_id = %id))]
    pub async fn delete(&self, id: DocumentId) -> Result<bool> {
        if !self.prompt.confirm(DELETE_QUESTION).await {
            debug!("delete declined");
            return Ok(false);
        }
        if let Err(e) = self.api.delete_document(&id).await {
            error!(error = %e, "delete failed");
            self.prompt.alert(&humanize_error(&e));
            return Err(e);
        }
        self.forget(&id);
        info!("document deleted");
        Ok(true)
    }

    /// Drop `id` from the list and close its session if selected.
    fn forget(&self, id: &DocumentId) {
        self.documents.send_if_modified(|docs| {
            let before = docs.len();
            docs.retain(|d| d.id != *id);
            docs.len() != before
        });

        let mut active = lock(&self.active);
        if active.as_ref().is_some_and(|s| s.document_id() == Some(*id)) {
            if let Some(session) = active.take() {
                session.close();
            }
        }
    }

    // -- Split sheet -----------------------------------------------------------

    pub async fn split_sheet(&self) -> Result<Vec<u8>> {
        self.api.split_sheet().await
    }

    /// URL of the split-sheet PDF for opening outside the client.
    pub fn split_sheet_url(&self) -> String {
        self.config.split_sheet_url()
    }
}

impl Drop for DocumentListController {
    fn drop(&mut self) {
        self.stop();
        self.close_active();
    }
}

async fn fetch_into(api: &dyn DocumentApi, documents: &watch::Sender<Vec<Document>>) -> Result<()> {
    let fetched = api.list_documents().await?;
    let changed = documents.send_if_modified(|docs| {
        if *docs == fetched {
            return false;
        }
        *docs = fetched;
        true
    });
    if changed {
        debug!(count = documents.borrow().len(), "document list changed");
    }
    Ok(())
}

async fn poll(api: Arc<dyn DocumentApi>, documents: Arc<watch::Sender<Vec<Document>>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = fetch_into(api.as_ref(), &documents).await {
            warn!(error = %e, "document list poll failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionPhase;
    use crate::testing::{Call, ChannelTransport, MockApi, Op, RecordingPrompt, sample_document};

    struct Harness {
        list: DocumentListController,
        api: Arc<MockApi>,
        events: Arc<ChannelTransport>,
        prompt: Arc<RecordingPrompt>,
        docs: Vec<Document>,
    }

    fn harness(count: usize) -> Harness {
        let docs: Vec<Document> = (1..=count).map(sample_document).collect();
        let api = Arc::new(MockApi::with_documents(docs.clone()));
        let events = Arc::new(ChannelTransport::default());
        let prompt = Arc::new(RecordingPrompt::answering(true));
        let list = DocumentListController::new(
            api.clone(),
            events.clone(),
            prompt.clone(),
            ClientConfig::default(),
        );
        Harness {
            list,
            api,
            events,
            prompt,
            docs,
        }
    }

    #[tokio::test]
    async fn refresh_failure_keeps_previous_list() {
        let h = harness(2);
        h.list.refresh().await.expect("refresh");
        assert_eq!(h.list.documents(), h.docs);

        h.api.fail(Op::List);
        assert!(h.list.refresh().await.is_err());
        assert_eq!(h.list.documents(), h.docs);
    }

    #[tokio::test]
    async fn poller_fetches_immediately_and_stops() {
        let h = harness(1);
        let mut rx = h.list.subscribe();

        h.list.start();
        h.list.start();
        rx.changed().await.expect("list published");
        assert_eq!(*rx.borrow(), h.docs);
        assert!(h.list.is_polling());

        h.list.stop();
        h.list.stop();
        assert!(!h.list.is_polling());
    }

    #[tokio::test]
    async fn select_closes_previous_session_first() {
        let h = harness(2);
        let first = h.list.select(h.docs[0].id).await.expect("select first");
        let second = h.list.select(h.docs[1].id).await.expect("select second");

        assert_eq!(first.phase(), SessionPhase::Closed);
        assert_eq!(second.phase(), SessionPhase::Ready);
        h.events.closed(0).await;
        assert_eq!(h.events.subscribed_ids(), vec![h.docs[0].id, h.docs[1].id]);
        assert_eq!(
            h.list.active_session().and_then(|s| s.document_id()),
            Some(h.docs[1].id)
        );
    }

    #[tokio::test]
    async fn failed_select_leaves_nothing_selected() {
        let h = harness(1);
        h.api.fail(Op::Get);
        assert!(h.list.select(h.docs[0].id).await.is_err());
        assert!(h.list.active_session().is_none());
    }

    #[tokio::test]
    async fn export_removes_document_from_list() {
        let h = harness(2);
        h.list.refresh().await.expect("refresh");
        h.list.select(h.docs[0].id).await.expect("select");

        let outcome = h.list.export_selected().await.expect("export");
        assert_eq!(outcome, ExportOutcome::Exported(h.docs[0].id));
        assert_eq!(h.list.documents(), vec![h.docs[1].clone()]);
        assert!(h.list.active_session().is_none());
    }

    #[tokio::test]
    async fn failed_export_keeps_document_selectable() {
        let h = harness(1);
        h.list.refresh().await.expect("refresh");
        h.list.select(h.docs[0].id).await.expect("select");
        h.api.fail(Op::Export);

        assert!(h.list.export_selected().await.is_err());
        assert_eq!(h.list.documents(), h.docs);
        let session = h.list.active_session().expect("still selected");
        assert_eq!(session.phase(), SessionPhase::Ready);
    }

    #[tokio::test]
    async fn export_without_selection_is_an_error() {
        let h = harness(1);
        assert!(matches!(
            h.list.export_selected().await,
            Err(PaperPilotError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn delete_closes_selected_session() {
        let h = harness(2);
        h.list.refresh().await.expect("refresh");
        let session = h.list.select(h.docs[1].id).await.expect("select");

        assert!(h.list.delete(h.docs[1].id).await.expect("delete"));
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert_eq!(h.list.documents(), vec![h.docs[0].clone()]);
        assert_eq!(h.prompt.questions(), vec![DELETE_QUESTION.to_string()]);
    }

    #[tokio::test]
    async fn declined_delete_sends_nothing() {
        let h = harness(1);
        h.prompt.set_answer(false);
        assert!(!h.list.delete(h.docs[0].id).await.expect("delete"));
        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_alerts_and_keeps_document() {
        let h = harness(1);
        h.list.refresh().await.expect("refresh");
        h.api.fail(Op::Delete);

        assert!(h.list.delete(h.docs[0].id).await.is_err());
        assert_eq!(h.list.documents(), h.docs);
        assert_eq!(h.prompt.alerts().len(), 1);
        assert!(h.api.server_document(&h.docs[0].id).is_some());
    }

    #[tokio::test]
    async fn split_sheet_download_and_url() {
        let h = harness(0);
        let pdf = h.list.split_sheet().await.expect("split sheet");
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(h.api.calls(), vec![Call::SplitSheet]);
        assert_eq!(
            h.list.split_sheet_url(),
            "http://localhost:8000/api/tools/split-sheet"
        );
    }
}
