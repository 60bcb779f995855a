// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text rendering of documents for the terminal.

use std::fmt::Write;

use paperpilot_core::ClientConfig;
use paperpilot_core::types::{Document, PageStatus};

/// One line per document, newest first as served.
pub fn document_table(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "No documents waiting for review.\n".to_string();
    }
    let mut out = String::new();
    for doc in docs {
        let _ = writeln!(
            out,
            "{}  {:<10}  {:>3} pages  {}  {}",
            doc.id,
            doc.status.as_str(),
            doc.page_count(),
            doc.created_at.format("%Y-%m-%d %H:%M"),
            doc.display_name(),
        );
    }
    out
}

/// Header plus one line per page.  Pages are numbered from 1.
pub fn document_detail(doc: &Document, draft_name: Option<&str>, config: &ClientConfig) -> String {
    let (valid, delete, split) = doc.status_counts();
    let mut out = String::new();
    let _ = writeln!(out, "{}  ({})", doc.display_name(), doc.original_filename);
    if let Some(draft) = draft_name {
        let _ = writeln!(out, "  unsaved name: {draft}");
    }
    let _ = writeln!(
        out,
        "  {} pages: {valid} valid, {delete} delete, {split} split",
        doc.page_count()
    );
    for page in &doc.pages {
        let marker = match page.status {
            PageStatus::Valid => " ",
            PageStatus::Delete => "x",
            PageStatus::Split => "|",
        };
        let _ = writeln!(
            out,
            "  [{marker}] {:>3}  {:<6} {:>3}°  {}",
            page.page_number + 1,
            page.status.as_str(),
            page.rotation,
            config.image_url(page),
        );
    }
    out
}
