// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for scanned documents under review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a document, assigned by the ingestion server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Ingestion state of a document. Only the server changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Pages are still being rendered and analysed.
    Processing,
    /// Ready for review.
    Ready,
    /// Ingestion failed.
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

/// Operator verdict for a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// Kept in the export.
    Valid,
    /// Dropped from the export (blank or unwanted page).
    Delete,
    /// Separator sheet: the export starts a new output file here.
    Split,
}

impl PageStatus {
    /// Wire keyword, also used as the `status` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Delete => "delete",
            Self::Split => "split",
        }
    }
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rendered page of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 0-based ordinal; always equal to the page's index in `Document::pages`.
    pub page_number: usize,
    /// Path of the rendered image relative to the server's static mount.
    pub image_path: String,
    pub status: PageStatus,
    /// Clockwise rotation in degrees, one of 0, 90, 180, 270.
    #[serde(default)]
    pub rotation: u16,
    #[serde(default)]
    pub original_width: u32,
    #[serde(default)]
    pub original_height: u32,
}

/// A scanned multi-page document as served by the ingestion server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub original_filename: String,
    /// Operator-assigned name; `None` until the first rename.
    #[serde(default)]
    pub user_filename: Option<String>,
    pub status: DocumentStatus,
    /// Canonical page order. Empty in list summaries that omit page detail.
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(with = "epoch_seconds")]
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Name shown to the operator: the user filename when set, else the
    /// filename the scan arrived with.
    pub fn display_name(&self) -> &str {
        match self.user_filename.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.original_filename,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page_number: usize) -> Option<&Page> {
        self.pages.get(page_number)
    }

    /// Count pages per status as `(valid, delete, split)`.
    pub fn status_counts(&self) -> (usize, usize, usize) {
        self.pages
            .iter()
            .fold((0, 0, 0), |(v, d, s), page| match page.status {
                PageStatus::Valid => (v + 1, d, s),
                PageStatus::Delete => (v, d + 1, s),
                PageStatus::Split => (v, d, s + 1),
            })
    }
}

/// A single page mutation. Absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<u16>,
}

impl PageEdit {
    pub fn status(status: PageStatus) -> Self {
        Self {
            status: Some(status),
            rotation: None,
        }
    }

    pub fn rotation(rotation: u16) -> Self {
        Self {
            status: None,
            rotation: Some(rotation),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.rotation.is_none()
    }

    /// Return a new page with the present fields replaced.
    pub fn apply(&self, page: &Page) -> Page {
        Page {
            status: self.status.unwrap_or(page.status),
            rotation: self.rotation.unwrap_or(page.rotation),
            ..page.clone()
        }
    }
}

/// Classification of errors for logging and operator messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip, timeout, server hiccup; retrying may succeed.
    Transient,
    /// The operator must change something first (pick another page, etc.).
    UserAction,
    /// Retrying will not help.
    Permanent,
}

/// The server stores `created_at` as fractional UNIX seconds.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        let secs = value.timestamp() as f64 + f64::from(value.timestamp_subsec_micros()) / 1e6;
        serializer.serialize_f64(secs)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(D::Error::custom("created_at is not a finite number"));
        }
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos)
            .ok_or_else(|| D::Error::custom(format!("created_at {secs} out of range")))
    }
}
