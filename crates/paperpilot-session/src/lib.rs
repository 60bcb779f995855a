// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PaperPilot Session: the live, editable projection of one scanned document.
// Operator edits are applied optimistically, server snapshots pushed over the
// event stream replace local state wholesale, and export is sequenced against
// both.  The REST client and the document list controller live here too
// because they are the session's only collaborators.

pub mod api;
pub mod backoff;
pub mod events;
pub mod list;
pub mod prompt;
pub mod reconciler;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{DocumentApi, HttpDocumentApi};
pub use events::{EventSubscription, EventTransport, SseTransport, StreamSignal};
pub use list::DocumentListController;
pub use prompt::{DELETE_QUESTION, EXPORT_QUESTION, OperatorPrompt};
pub use reconciler::{PushStats, Reconciliation};
pub use session::{DocumentSession, ExportOutcome, MutationOutcome, SessionPhase};
