// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing error messages.
//
// Failures the operator deliberately triggered (rename, export, delete) are
// shown to them.  Each technical error is mapped to a short sentence plus a
// suggestion of what to do next.

use crate::error::PaperPilotError;
use crate::types::ErrorClass;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip, server hiccup; trying again may work.
    Transient,
    /// The operator must do something different first.
    ActionRequired,
    /// Trying again will not help.
    Permanent,
}

impl From<ErrorClass> for Severity {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::Transient => Self::Transient,
            ErrorClass::UserAction => Self::ActionRequired,
            ErrorClass::Permanent => Self::Permanent,
        }
    }
}

/// A readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    /// Whether repeating the same action may succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Convert a `PaperPilotError` into a `HumanError`.
pub fn humanize_error(err: &PaperPilotError) -> HumanError {
    let severity = Severity::from(err.class());
    let retriable = severity == Severity::Transient;

    let (message, suggestion) = match err {
        PaperPilotError::Http(detail) => (
            "The PaperPilot server could not be reached.".to_string(),
            format!("Check that the server is running, then try again. ({detail})"),
        ),
        PaperPilotError::Status { status, body } if *status >= 500 => (
            "The server failed to complete the action.".to_string(),
            if body.is_empty() {
                format!("Try again in a moment. (HTTP {status})")
            } else {
                format!("Try again in a moment. (HTTP {status}: {body})")
            },
        ),
        PaperPilotError::Status { status, body } => (
            "The server rejected the request.".to_string(),
            format!("Reload the document and check your changes. (HTTP {status}: {body})"),
        ),
        PaperPilotError::NotFound => (
            "This document no longer exists.".to_string(),
            "It may have been exported or deleted elsewhere. Go back to the list.".to_string(),
        ),
        PaperPilotError::MalformedEvent(detail) => (
            "The server sent an update that could not be read.".to_string(),
            format!("Reload the document. ({detail})"),
        ),
        PaperPilotError::PageOutOfRange { page, len } => (
            format!("Page {} does not exist.", page + 1),
            format!("This document has {len} pages."),
        ),
        PaperPilotError::EmptyPageEdit => (
            "Nothing to change on this page.".to_string(),
            "Choose a new status or rotation.".to_string(),
        ),
        PaperPilotError::InvalidPhase { operation, phase } => (
            format!("Cannot {operation} right now."),
            format!("The document is {phase}. Wait for it to finish."),
        ),
        PaperPilotError::SessionClosed => (
            "This document is no longer open.".to_string(),
            "Select it again from the list.".to_string(),
        ),
        PaperPilotError::Config(detail) => (
            "The client configuration is invalid.".to_string(),
            format!("Fix the setting and restart. ({detail})"),
        ),
        PaperPilotError::Io(io_err) => (
            "A local file could not be read or written.".to_string(),
            format!("Check the path and permissions. ({io_err})"),
        ),
        PaperPilotError::Serialization(detail) => (
            "The server's response could not be read.".to_string(),
            format!("The client and server versions may not match. ({detail})"),
        ),
    };

    HumanError {
        message,
        suggestion,
        retriable,
        severity,
    }
}
