// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for event-stream decoding and push reconciliation in
// the paperpilot-session crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use paperpilot_core::types::{Document, DocumentId, DocumentStatus, Page, PageStatus};
use paperpilot_session::events::SseDecoder;
use paperpilot_session::reconciler::{DOC_UPDATE, Push, Reconciliation, admit, parse_push};
use paperpilot_session::session::SessionPhase;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A document the size of a typical multi-page scan.
fn build_document(pages: usize) -> Document {
    let id = DocumentId::new();
    Document {
        id,
        original_filename: "scan_20260301_0915.pdf".into(),
        user_filename: Some("Utility bill March".into()),
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
        created_at: chrono::Utc::now(),
    }
}

fn doc_update_payload(doc: &Document) -> String {
    serde_json::json!({ "type": DOC_UPDATE, "data": doc }).to_string()
}

/// Frame `payload` as one SSE event.
fn sse_frame(payload: &str) -> Vec<u8> {
    format!("data: {payload}\n\n").into_bytes()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Decode one 40-page snapshot delivered in a single chunk, then the same
/// bytes split into 512-byte network reads.
fn bench_sse_decode(c: &mut Criterion) {
    let frame = sse_frame(&doc_update_payload(&build_document(40)));

    c.bench_function("sse_decode (40 pages, one chunk)", |b| {
        b.iter(|| {
            let mut decoder = SseDecoder::default();
            let events = decoder.push(black_box(&frame));
            assert_eq!(events.len(), 1);
        });
    });

    c.bench_function("sse_decode (40 pages, 512 B chunks)", |b| {
        b.iter(|| {
            let mut decoder = SseDecoder::default();
            let mut count = 0;
            for chunk in frame.chunks(512) {
                count += decoder.push(black_box(chunk)).len();
            }
            assert_eq!(count, 1);
        });
    });
}

/// Parse and admit a snapshot for the open document.
fn bench_reconcile(c: &mut Criterion) {
    let doc = build_document(40);
    let payload = doc_update_payload(&doc);

    c.bench_function("parse_push + admit (40 pages)", |b| {
        b.iter(|| {
            let Ok(Push::DocUpdate(snapshot)) = parse_push(black_box(&payload)) else {
                panic!("snapshot did not parse");
            };
            let outcome = admit(&snapshot, Some(doc.id), SessionPhase::Ready);
            assert_eq!(outcome, Reconciliation::Applied);
            black_box(snapshot);
        });
    });

    let other = doc_update_payload(&build_document(40));
    c.bench_function("parse_push + admit (other document)", |b| {
        b.iter(|| {
            let Ok(Push::DocUpdate(snapshot)) =
                parse_push(black_box(&other))
            else {
                panic!("snapshot did not parse");
            };
            let outcome = admit(&snapshot, Some(doc.id), SessionPhase::Ready);
            assert!(matches!(outcome, Reconciliation::OtherDocument(_)));
        });
    });
}

criterion_group!(benches, bench_sse_decode, bench_reconcile);
criterion_main!(benches);
