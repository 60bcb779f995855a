// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PaperPilot Core: document model, page transition rules, and error
// definitions shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod page_rules;
pub mod types;

pub use config::ClientConfig;
pub use error::PaperPilotError;
pub use types::*;
