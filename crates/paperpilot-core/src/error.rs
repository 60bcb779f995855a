// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for PaperPilot.

use thiserror::Error;

use crate::types::ErrorClass;

/// Top-level error type for all PaperPilot operations.
#[derive(Debug, Error)]
pub enum PaperPilotError {
    // -- Server boundary --
    #[error("request failed: {0}")]
    Http(String),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("document or page not found")]
    NotFound,

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    // -- Session preconditions --
    #[error("page {page} out of range (document has {len} pages)")]
    PageOutOfRange { page: usize, len: usize },

    #[error("page edit must change status or rotation")]
    EmptyPageEdit,

    #[error("cannot {operation} while session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("session is closed")]
    SessionClosed,

    // -- Configuration / local --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PaperPilotError {
    /// Classify for logging and operator messaging.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Http(_) => ErrorClass::Transient,
            Self::Status { status, .. } if *status >= 500 || *status == 429 => {
                ErrorClass::Transient
            }
            Self::Status { .. } => ErrorClass::Permanent,
            Self::NotFound => ErrorClass::Permanent,
            Self::MalformedEvent(_) => ErrorClass::Permanent,
            Self::PageOutOfRange { .. } | Self::EmptyPageEdit | Self::InvalidPhase { .. } => {
                ErrorClass::UserAction
            }
            Self::SessionClosed => ErrorClass::Permanent,
            Self::Config(_) => ErrorClass::UserAction,
            Self::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    ErrorClass::UserAction
                }
                _ => ErrorClass::Transient,
            },
            Self::Serialization(_) => ErrorClass::Permanent,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PaperPilotError>;
