// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Event-stream transport.
//
// The server pushes full document snapshots as Server-Sent Events on
// `/api/events`.  The transport owns the connection: it decodes SSE framing,
// forwards each `data:` payload untouched, and reconnects with backoff when
// the connection drops.  Interpreting payloads is the reconciler's job.

use reqwest::{Client, StatusCode, header};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use paperpilot_core::ClientConfig;
use paperpilot_core::error::{PaperPilotError, Result};
use paperpilot_core::types::DocumentId;

use crate::backoff::{BackoffConfig, reconnect_delay};

/// Buffered signals per subscription before the transport waits for the
/// reconciler to catch up.
const SIGNAL_BUFFER: usize = 64;

/// One item delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// Raw payload of one event.
    Message(String),
    /// The connection dropped and has been re-established.  Messages sent
    /// while disconnected are lost.
    Reconnected,
}

/// A live subscription.  Dropping it releases the connection.
pub struct EventSubscription {
    receiver: mpsc::Receiver<StreamSignal>,
    task: Option<JoinHandle<()>>,
}

impl EventSubscription {
    /// Wrap a signal channel; `task` is the transport task feeding it, if
    /// any, and is aborted on close.
    pub fn new(receiver: mpsc::Receiver<StreamSignal>, task: Option<JoinHandle<()>>) -> Self {
        Self { receiver, task }
    }

    /// Next signal, or `None` once the transport has stopped.
    pub async fn next(&mut self) -> Option<StreamSignal> {
        self.receiver.recv().await
    }

    /// Stop the transport.  Idempotent.
    pub fn close(&mut self) {
        self.receiver.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Source of per-document push subscriptions.
pub trait EventTransport: Send + Sync {
    /// Open a subscription scoped to `document_id`.  Must be called from
    /// within a Tokio runtime.
    fn subscribe(&self, document_id: DocumentId) -> EventSubscription;
}

/// `EventTransport` over HTTP Server-Sent Events.
#[derive(Clone)]
pub struct SseTransport {
    http: Client,
    config: ClientConfig,
}

impl SseTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        // No overall timeout: the response body is open for the lifetime of
        // the subscription.
        let http = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| PaperPilotError::Http(format!("build event client: {e}")))?;
        Ok(Self { http, config })
    }
}

impl EventTransport for SseTransport {
    fn subscribe(&self, document_id: DocumentId) -> EventSubscription {
        let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
        let url = self.config.events_url(&document_id);
        let backoff = BackoffConfig::from(&self.config);
        let task = tokio::spawn(run_stream(self.http.clone(), url, tx, backoff));
        EventSubscription::new(rx, Some(task))
    }
}

/// How a connected stream ended.
enum StreamEnd {
    /// The subscriber went away; stop for good.
    Unsubscribed,
    /// The connection failed; reconnect.
    Dropped(PaperPilotError),
}

/// Connect, pump, and reconnect until the subscriber goes away.
#[instrument(skip(http, tx, backoff))]
async fn run_stream(
    http: Client,
    url: String,
    tx: mpsc::Sender<StreamSignal>,
    backoff: BackoffConfig,
) {
    let mut attempt: u32 = 0;
    let mut connected_before = false;

    loop {
        let err = match connect(&http, &url).await {
            Ok(response) => {
                if connected_before {
                    info!("event stream reconnected");
                    if tx.send(StreamSignal::Reconnected).await.is_err() {
                        return;
                    }
                } else {
                    info!("event stream connected");
                }
                connected_before = true;
                attempt = 0;

                match pump(response, &tx).await {
                    StreamEnd::Unsubscribed => return,
                    StreamEnd::Dropped(err) => err,
                }
            }
            Err(err) => err,
        };

        warn!(error = %err, attempt, "event stream disconnected");
        let delay = reconnect_delay(&err, attempt, &backoff);
        attempt = attempt.saturating_add(1);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tx.closed() => return,
        }
    }
}

async fn connect(http: &Client, url: &str) -> Result<reqwest::Response> {
    let response = http
        .get(url)
        .header(header::ACCEPT, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| PaperPilotError::Http(format!("connect event stream: {e}")))?;

    match response.status() {
        StatusCode::NOT_FOUND => Err(PaperPilotError::NotFound),
        status if !status.is_success() => Err(PaperPilotError::Status {
            status: status.as_u16(),
            body: String::new(),
        }),
        _ => Ok(response),
    }
}

/// Forward decoded events until the body ends or the subscriber leaves.
async fn pump(mut response: reqwest::Response, tx: &mpsc::Sender<StreamSignal>) -> StreamEnd {
    let mut decoder = SseDecoder::default();
    loop {
        let chunk = tokio::select! {
            chunk = response.chunk() => chunk,
            _ = tx.closed() => return StreamEnd::Unsubscribed,
        };
        match chunk {
            Ok(Some(bytes)) => {
                for payload in decoder.push(&bytes) {
                    if tx.send(StreamSignal::Message(payload)).await.is_err() {
                        return StreamEnd::Unsubscribed;
                    }
                }
            }
            Ok(None) => {
                return StreamEnd::Dropped(PaperPilotError::Http("event stream closed by server".into()));
            }
            Err(e) => {
                return StreamEnd::Dropped(PaperPilotError::Http(format!("read event stream: {e}")));
            }
        }
    }
}

/// Longest line the decoder buffers before giving up on it.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Incremental decoder for `text/event-stream` bodies.
///
/// Yields the data of each complete event.  Multiple `data:` lines in one
/// event are joined with `\n`; comments and other fields (`event:`, `id:`,
/// `retry:`) are skipped.  Lines may be split across chunks.  An event with
/// a line longer than the cap is dropped whole.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
    max_line: usize,
    /// Skipping the rest of an event that had an oversized line.
    discarding: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            data_lines: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    /// Feed one chunk; returns the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.buffer.len() > self.max_line {
            warn!(
                buffered = self.buffer.len(),
                max = self.max_line,
                "event-stream line too long, dropping event"
            );
            self.buffer.clear();
            self.data_lines.clear();
            self.discarding = true;
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if self.discarding {
            self.discarding = !line.is_empty();
            return None;
        }
        if line.is_empty() {
            if self.data_lines.is_empty() {
                return None;
            }
            let event = self.data_lines.join("\n");
            self.data_lines.clear();
            return Some(event);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data_lines.push(value.to_string());
        } else {
            debug!(field, "ignoring event-stream field");
        }
        None
    }
}
