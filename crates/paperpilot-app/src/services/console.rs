// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Terminal implementation of the operator prompt.
//
// Questions go to stdout and answers are read from stdin; alerts go to
// stderr.  The stdin line reader is shared with the review loop so that a
// confirmation asked in the middle of a command reads the next line the
// operator types.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use paperpilot_core::human_errors::{HumanError, Severity};
use paperpilot_session::OperatorPrompt;

/// Shared reader of operator input lines.
pub type InputLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub fn stdin_lines() -> InputLines {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

/// Read one line of operator input.  `None` at end of input.
pub async fn read_line(input: &InputLines) -> std::io::Result<Option<String>> {
    input.lock().await.next_line().await
}

/// Print `text` without a newline and flush it.
pub fn print_inline(text: &str) {
    let mut stdout = std::io::stdout();
    // A closed stdout only loses the prompt text.
    let _ = write!(stdout, "{text}");
    let _ = stdout.flush();
}

pub struct ConsolePrompt {
    input: InputLines,
}

impl ConsolePrompt {
    pub fn new(input: InputLines) -> Self {
        Self { input }
    }
}

#[async_trait]
impl OperatorPrompt for ConsolePrompt {
    async fn confirm(&self, question: &str) -> bool {
        print_inline(&format!("{question} [y/N] "));
        match read_line(&self.input).await {
            Ok(Some(answer)) => is_yes(&answer),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "could not read confirmation");
                false
            }
        }
    }

    fn alert(&self, error: &HumanError) {
        eprintln!("{}", format_alert(error));
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Label and message, then the suggestion, then a retry hint when
/// repeating the same action may succeed.
pub fn format_alert(error: &HumanError) -> String {
    let label = match error.severity {
        Severity::Transient => "problem",
        Severity::ActionRequired => "action needed",
        Severity::Permanent => "error",
    };
    let mut alert = format!("{label}: {}\n  {}", error.message, error.suggestion);
    if error.retriable {
        alert.push_str("\n  (safe to retry)");
    }
    alert
}
