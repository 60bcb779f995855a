// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client configuration, resolved once at startup and passed down.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PaperPilotError, Result};
use crate::types::{DocumentId, Page};

/// Environment variable that overrides `server_url`.
pub const SERVER_URL_ENV: &str = "PAPERPILOT_SERVER_URL";

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the PaperPilot server, without trailing slash.
    pub server_url: String,
    /// How often the document list is re-fetched.
    pub poll_interval_secs: u64,
    /// Timeout for a single REST request.
    pub request_timeout_secs: u64,
    /// First reconnect delay of the event stream.
    pub reconnect_base_delay_ms: u64,
    /// Upper bound for the event stream reconnect delay.
    pub reconnect_max_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".into(),
            poll_interval_secs: 5,
            request_timeout_secs: 30,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Load settings from a JSON file if it exists, then apply the
    /// environment override.  A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let data = std::fs::read_to_string(path)?;
                let config: Self = serde_json::from_str(&data)?;
                info!(path = %path.display(), "loaded client configuration");
                config
            }
            Some(path) => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            config.server_url = url;
        }

        config.validated()
    }

    /// Replace the server URL (e.g. from a command-line flag).
    pub fn with_server_url(mut self, url: impl Into<String>) -> Result<Self> {
        self.server_url = url.into();
        self.validated()
    }

    /// Normalise and check the settings.
    pub fn validated(mut self) -> Result<Self> {
        let trimmed = self.server_url.trim().trim_end_matches('/').to_string();
        let host = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .ok_or_else(|| {
                PaperPilotError::Config(format!(
                    "server_url must start with http:// or https://, got '{}'",
                    self.server_url
                ))
            })?;
        if host.is_empty() || host.starts_with('/') {
            return Err(PaperPilotError::Config(format!(
                "server_url '{}' has no host",
                self.server_url
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(PaperPilotError::Config("poll_interval_secs must be positive".into()));
        }
        // reqwest treats a zero timeout as an immediate deadline.
        if self.request_timeout_secs == 0 {
            return Err(PaperPilotError::Config("request_timeout_secs must be positive".into()));
        }
        if self.reconnect_base_delay_ms > self.reconnect_max_delay_ms {
            return Err(PaperPilotError::Config(
                "reconnect_base_delay_ms exceeds reconnect_max_delay_ms".into(),
            ));
        }
        self.server_url = trimmed;
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    /// Absolute URL for an API path such as `/api/docs`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    pub fn document_url(&self, id: &DocumentId) -> String {
        self.endpoint(&format!("/api/docs/{id}"))
    }

    /// Event stream URL scoped to one document.
    pub fn events_url(&self, id: &DocumentId) -> String {
        self.endpoint(&format!("/api/events?doc_id={id}"))
    }

    pub fn split_sheet_url(&self) -> String {
        self.endpoint("/api/tools/split-sheet")
    }

    /// URL of the rendered image of `page`.
    pub fn image_url(&self, page: &Page) -> String {
        self.endpoint(&format!("/static/{}", page.image_path.trim_start_matches('/')))
    }
}
