// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Push reconciliation.
//
// Every `doc_update` message carries a complete document snapshot.  A
// snapshot replaces the session's document wholesale, but only when it names
// the open document and the session is `Ready`.  Everything else is dropped:
// pushes are never queued, because by the time the session could apply them
// they describe superseded state.

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use paperpilot_core::error::{PaperPilotError, Result};
use paperpilot_core::types::{Document, DocumentId};

use crate::events::{EventSubscription, StreamSignal};
use crate::session::{SessionPhase, SessionState, lock_state};

/// Envelope type of a document snapshot push.
pub const DOC_UPDATE: &str = "doc_update";

/// Wire envelope `{type, data}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A parsed push message.
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    DocUpdate(Document),
    /// Any other envelope type.
    Other(String),
}

/// What happened to one push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Snapshot replaced the session's document.
    Applied,
    /// Snapshot names a different document.
    OtherDocument(DocumentId),
    /// Session was not `Ready`.
    NotReady(SessionPhase),
    UnknownType(String),
    /// Payload could not be parsed.
    Malformed(String),
}

/// Running totals of handled pushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStats {
    pub applied: u64,
    pub ignored: u64,
    pub malformed: u64,
    pub reconnects: u64,
}

impl PushStats {
    /// Messages handled, whatever the outcome.
    pub fn messages(&self) -> u64 {
        self.applied + self.ignored + self.malformed
    }

    fn record(&mut self, outcome: &Reconciliation) {
        match outcome {
            Reconciliation::Applied => self.applied += 1,
            Reconciliation::Malformed(_) => self.malformed += 1,
            _ => self.ignored += 1,
        }
    }
}

/// Parse one raw payload.
pub fn parse_push(payload: &str) -> Result<Push> {
    let envelope: Envelope = serde_json::from_str(payload)
        .map_err(|e| PaperPilotError::MalformedEvent(format!("envelope: {e}")))?;
    if envelope.kind != DOC_UPDATE {
        return Ok(Push::Other(envelope.kind));
    }
    serde_json::from_value(envelope.data)
        .map(Push::DocUpdate)
        .map_err(|e| PaperPilotError::MalformedEvent(format!("{DOC_UPDATE} data: {e}")))
}

/// Decide whether `snapshot` may replace the state of a session that has
/// `open_id` open and is in `phase`.
pub fn admit(snapshot: &Document, open_id: Option<DocumentId>, phase: SessionPhase) -> Reconciliation {
    if open_id != Some(snapshot.id) {
        return Reconciliation::OtherDocument(snapshot.id);
    }
    if phase != SessionPhase::Ready {
        return Reconciliation::NotReady(phase);
    }
    Reconciliation::Applied
}

/// Apply one raw payload to the shared session state.
///
/// The phase check and the replacement happen under a single lock, so a
/// concurrent transition to `Exporting` can never let a snapshot through.
pub(crate) fn reconcile(state: &Mutex<SessionState>, payload: &str) -> Reconciliation {
    let snapshot = match parse_push(payload) {
        Ok(Push::DocUpdate(doc)) => doc,
        Ok(Push::Other(kind)) => return Reconciliation::UnknownType(kind),
        Err(e) => return Reconciliation::Malformed(e.to_string()),
    };

    let mut state = lock_state(state);
    let outcome = admit(&snapshot, state.document_id, state.phase);
    if outcome == Reconciliation::Applied {
        state.document = Some(snapshot);
    }
    outcome
}

/// Background task that feeds one subscription into one session.
pub(crate) struct Reconciler {
    task: JoinHandle<()>,
}

impl Reconciler {
    pub(crate) fn spawn(
        state: Arc<Mutex<SessionState>>,
        document_id: DocumentId,
        subscription: EventSubscription,
        stats: Arc<watch::Sender<PushStats>>,
    ) -> Self {
        let task = tokio::spawn(run(state, document_id, subscription, stats));
        Self { task }
    }

    /// Stop the task and, with it, the subscription it owns.
    pub(crate) fn stop(self) {
        self.task.abort();
    }
}

async fn run(
    state: Arc<Mutex<SessionState>>,
    document_id: DocumentId,
    mut subscription: EventSubscription,
    stats: Arc<watch::Sender<PushStats>>,
) {
    debug!(doc_id = %document_id, "reconciler attached");

    while let Some(signal) = subscription.next().await {
        match signal {
            StreamSignal::Message(payload) => {
                let outcome = reconcile(&state, &payload);
                match &outcome {
                    Reconciliation::Applied => debug!(doc_id = %document_id, "applied pushed snapshot"),
                    Reconciliation::Malformed(reason) => {
                        warn!(doc_id = %document_id, %reason, "dropping malformed push")
                    }
                    ignored => debug!(doc_id = %document_id, ?ignored, "ignoring push"),
                }
                stats.send_modify(|s| s.record(&outcome));
            }
            StreamSignal::Reconnected => {
                // The transport re-subscribes with the same document id, so
                // interest is already re-attached; snapshots missed while
                // disconnected arrive with the next server change.
                info!(doc_id = %document_id, "event stream re-attached");
                stats.send_modify(|s| s.reconnects += 1);
            }
        }
    }

    debug!(doc_id = %document_id, "event stream ended");
}
