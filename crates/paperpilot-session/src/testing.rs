// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory collaborators for session and list controller tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use tokio::sync::{Notify, mpsc};

use paperpilot_core::error::{PaperPilotError, Result};
use paperpilot_core::human_errors::HumanError;
use paperpilot_core::types::{Document, DocumentId, DocumentStatus, Page, PageEdit, PageStatus};

use crate::api::DocumentApi;
use crate::events::{EventSubscription, EventTransport, StreamSignal};
use crate::prompt::OperatorPrompt;
use crate::reconciler::DOC_UPDATE;

/// A ready document with `pages` valid, unrotated pages.
pub(crate) fn sample_document(pages: usize) -> Document {
    let id = DocumentId::new();
    Document {
        id,
        original_filename: format!("scan_{pages:04}.pdf"),
        user_filename: None,
        status: DocumentStatus::Ready,
        pages: (0..pages)
            .map(|n| Page {
                page_number: n,
                image_path: format!("{id}/page_{n}.png"),
                status: PageStatus::Valid,
                rotation: 0,
                original_width: 2480,
                original_height: 3508,
            })
            .collect(),
        created_at: DateTime::from_timestamp(1_760_000_000, 0).expect("valid timestamp"),
    }
}

/// Wire payload of a `doc_update` push carrying `doc`.
pub(crate) fn doc_update(doc: &Document) -> String {
    serde_json::json!({ "type": DOC_UPDATE, "data": doc }).to_string()
}

// -- DocumentApi ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    List,
    Get,
    UpdatePage,
    UpdateMetadata,
    Export,
    Delete,
    SplitSheet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List,
    Get(DocumentId),
    UpdatePage(DocumentId, usize, PageEdit),
    UpdateMetadata(DocumentId, String),
    Export(DocumentId),
    Delete(DocumentId),
    SplitSheet,
}

/// Holds one request until the test releases it.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Wait until the stalled request has reached the server.
    pub(crate) async fn entered(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release(&self) {
        self.release.notify_one();
    }

    async fn hold(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[derive(Default)]
struct ServerState {
    docs: Vec<Document>,
    calls: Vec<Call>,
    failing: HashSet<Op>,
    stalled: Vec<(Op, Gate)>,
}

/// Scripted server holding documents in memory.
#[derive(Default)]
pub(crate) struct MockApi {
    inner: Mutex<ServerState>,
}

impl MockApi {
    pub(crate) fn with_document(doc: Document) -> Self {
        Self::with_documents(vec![doc])
    }

    pub(crate) fn with_documents(docs: Vec<Document>) -> Self {
        Self {
            inner: Mutex::new(ServerState {
                docs,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.inner.lock().expect("mock state")
    }

    pub(crate) fn server_document(&self, id: &DocumentId) -> Option<Document> {
        self.state().docs.iter().find(|d| d.id == *id).cloned()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Make every later `op` fail with a 500.
    pub(crate) fn fail(&self, op: Op) {
        self.state().failing.insert(op);
    }

    pub(crate) fn succeed(&self, op: Op) {
        self.state().failing.remove(&op);
    }

    /// Stall the next page update until the returned gate is released.
    pub(crate) fn stall_page_updates(&self) -> Gate {
        self.stall(Op::UpdatePage)
    }

    /// Stall the next export until the returned gate is released.
    pub(crate) fn stall_exports(&self) -> Gate {
        self.stall(Op::Export)
    }

    fn stall(&self, op: Op) -> Gate {
        let gate = Gate::default();
        self.state().stalled.push((op, gate.clone()));
        gate
    }

    /// Record the call, wait on a gate if one is set, then apply the
    /// injected failure if any.
    async fn enter(&self, op: Op, call: Call) -> Result<()> {
        let gate = {
            let mut state = self.state();
            state.calls.push(call);
            let index = state.stalled.iter().position(|(o, _)| *o == op);
            index.map(|i| state.stalled.remove(i).1)
        };
        if let Some(gate) = gate {
            gate.hold().await;
        }
        if self.state().failing.contains(&op) {
            return Err(PaperPilotError::Status {
                status: 500,
                body: "injected".into(),
            });
        }
        Ok(())
    }

    fn with_doc<T>(&self, id: &DocumentId, f: impl FnOnce(&mut Document) -> T) -> Result<T> {
        let mut state = self.state();
        let doc = state
            .docs
            .iter_mut()
            .find(|d| d.id == *id)
            .ok_or(PaperPilotError::NotFound)?;
        Ok(f(doc))
    }

    fn remove(&self, id: &DocumentId) -> Result<()> {
        let mut state = self.state();
        let before = state.docs.len();
        state.docs.retain(|d| d.id != *id);
        if state.docs.len() == before {
            return Err(PaperPilotError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentApi for MockApi {
    async fn list_documents(&self) -> Result<Vec<Document>> {
        self.enter(Op::List, Call::List).await?;
        Ok(self.state().docs.clone())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Document> {
        self.enter(Op::Get, Call::Get(*id)).await?;
        self.with_doc(id, |doc| doc.clone())
    }

    async fn update_page(&self, id: &DocumentId, page_number: usize, edit: &PageEdit) -> Result<()> {
        self.enter(Op::UpdatePage, Call::UpdatePage(*id, page_number, *edit))
            .await?;
        self.with_doc(id, |doc| -> Result<()> {
            let len = doc.pages.len();
            let page = doc
                .pages
                .get_mut(page_number)
                .ok_or(PaperPilotError::PageOutOfRange { page: page_number, len })?;
            *page = edit.apply(page);
            Ok(())
        })?
    }

    async fn update_metadata(&self, id: &DocumentId, user_filename: &str) -> Result<Document> {
        self.enter(
            Op::UpdateMetadata,
            Call::UpdateMetadata(*id, user_filename.to_string()),
        )
        .await?;
        self.with_doc(id, |doc| {
            doc.user_filename = Some(user_filename.to_string());
            doc.clone()
        })
    }

    async fn export_document(&self, id: &DocumentId) -> Result<()> {
        self.enter(Op::Export, Call::Export(*id)).await?;
        self.remove(id)
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<()> {
        self.enter(Op::Delete, Call::Delete(*id)).await?;
        self.remove(id)
    }

    async fn split_sheet(&self) -> Result<Vec<u8>> {
        self.enter(Op::SplitSheet, Call::SplitSheet).await?;
        Ok(b"%PDF-1.4 split sheet".to_vec())
    }
}

// -- EventTransport ------------------------------------------------------------

/// Transport whose subscriptions are fed by the test.
#[derive(Default)]
pub(crate) struct ChannelTransport {
    subscribers: Mutex<Vec<(DocumentId, mpsc::Sender<StreamSignal>)>>,
}

impl ChannelTransport {
    fn senders(&self) -> Vec<mpsc::Sender<StreamSignal>> {
        self.subscribers
            .lock()
            .expect("subscribers")
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect()
    }

    pub(crate) fn subscribed_ids(&self) -> Vec<DocumentId> {
        self.subscribers
            .lock()
            .expect("subscribers")
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    async fn broadcast(&self, signal: StreamSignal) {
        for tx in self.senders() {
            // Closed subscriptions simply miss the message.
            let _ = tx.send(signal.clone()).await;
        }
    }

    /// Deliver a raw payload to every live subscription.
    pub(crate) async fn push(&self, payload: String) {
        self.broadcast(StreamSignal::Message(payload)).await;
    }

    pub(crate) async fn reconnect(&self) {
        self.broadcast(StreamSignal::Reconnected).await;
    }

    /// Wait until subscription number `index` has been released.
    pub(crate) async fn closed(&self, index: usize) {
        let tx = self.senders().into_iter().nth(index).expect("subscription");
        tx.closed().await;
    }

    /// Wait until every subscription has been released.
    pub(crate) async fn all_closed(&self) {
        for tx in self.senders() {
            tx.closed().await;
        }
    }
}

impl EventTransport for ChannelTransport {
    fn subscribe(&self, document_id: DocumentId) -> EventSubscription {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers
            .lock()
            .expect("subscribers")
            .push((document_id, tx));
        EventSubscription::new(rx, None)
    }
}

// -- OperatorPrompt ------------------------------------------------------------

/// Prompt that answers every question the same way and records everything.
pub(crate) struct RecordingPrompt {
    answer: AtomicBool,
    questions: Mutex<Vec<String>>,
    alerts: Mutex<Vec<HumanError>>,
}

impl RecordingPrompt {
    pub(crate) fn answering(answer: bool) -> Self {
        Self {
            answer: AtomicBool::new(answer),
            questions: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_answer(&self, answer: bool) {
        self.answer.store(answer, Ordering::SeqCst);
    }

    pub(crate) fn questions(&self) -> Vec<String> {
        self.questions.lock().expect("questions").clone()
    }

    pub(crate) fn alerts(&self) -> Vec<HumanError> {
        self.alerts.lock().expect("alerts").clone()
    }
}

#[async_trait]
impl OperatorPrompt for RecordingPrompt {
    async fn confirm(&self, question: &str) -> bool {
        self.questions
            .lock()
            .expect("questions")
            .push(question.to_string());
        self.answer.load(Ordering::SeqCst)
    }

    fn alert(&self, error: &HumanError) {
        self.alerts.lock().expect("alerts").push(error.clone());
    }
}
