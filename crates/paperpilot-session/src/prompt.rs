// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator interaction capability.
//
// Sessions never talk to a terminal or window directly.  Whatever front-end
// drives them injects an `OperatorPrompt`, which keeps export and delete
// logic testable without a UI.

use async_trait::async_trait;
use paperpilot_core::human_errors::HumanError;

/// Question asked before an export.
pub const EXPORT_QUESTION: &str =
    "Confirm export? This will process the file and remove it from the list.";

/// Question asked before a delete.
pub const DELETE_QUESTION: &str =
    "Delete this document? Its pages will be discarded and it will be removed from the list.";

/// Confirmation and notification surface for operator-triggered actions.
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    /// Ask a yes/no question.  `false` cancels the action.
    async fn confirm(&self, question: &str) -> bool;

    /// Tell the operator that an action they asked for failed.
    fn alert(&self, error: &HumanError);
}
