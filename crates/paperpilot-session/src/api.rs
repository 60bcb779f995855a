// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// REST boundary to the PaperPilot server.
//
// `DocumentApi` is the seam the session and list controller talk through;
// `HttpDocumentApi` is the production implementation over `reqwest`:
//   - GET    /api/docs                         list documents
//   - GET    /api/docs/{id}                    get document
//   - POST   /api/docs/{id}/pages/{n}/update   update page (query params)
//   - PUT    /api/docs/{id}                    update metadata (query param)
//   - POST   /api/docs/{id}/export             export
//   - DELETE /api/docs/{id}                    delete
//   - GET    /api/tools/split-sheet            split-sheet PDF

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use paperpilot_core::ClientConfig;
use paperpilot_core::error::{PaperPilotError, Result};
use paperpilot_core::types::{Document, DocumentId, PageEdit};

/// Longest slice of an error body kept in `PaperPilotError::Status`.
const MAX_ERROR_BODY: usize = 200;

/// Server operations consumed by sessions and the list controller.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// All documents in the active set, newest first.  Page detail may be
    /// omitted.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// One document including its pages.
    async fn get_document(&self, id: &DocumentId) -> Result<Document>;

    /// Change status and/or rotation of one page.  `edit` must not be empty.
    async fn update_page(&self, id: &DocumentId, page_number: usize, edit: &PageEdit) -> Result<()>;

    /// Set the operator-assigned filename.  Returns the updated document.
    async fn update_metadata(&self, id: &DocumentId, user_filename: &str) -> Result<Document>;

    /// Finalise the document.  On success the server removes it from the
    /// active set.
    async fn export_document(&self, id: &DocumentId) -> Result<()>;

    async fn delete_document(&self, id: &DocumentId) -> Result<()>;

    /// The printable split-sheet PDF.
    async fn split_sheet(&self) -> Result<Vec<u8>>;
}

/// `DocumentApi` over HTTP.
#[derive(Clone)]
pub struct HttpDocumentApi {
    http: Client,
    config: ClientConfig,
}

impl HttpDocumentApi {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PaperPilotError::Http(format!("build client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Send a request and turn non-success statuses into errors.
    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| PaperPilotError::Http(format!("{what}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(what, "server returned 404");
            return Err(PaperPilotError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(what, status = status.as_u16(), "request rejected");
            return Err(PaperPilotError::Status {
                status: status.as_u16(),
                body: error_detail(&body),
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T> {
        let response = self.send(what, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PaperPilotError::Http(format!("{what}: read body: {e}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl DocumentApi for HttpDocumentApi {
    #[instrument(skip(self))]
    async fn list_documents(&self) -> Result<Vec<Document>> {
        let request = self.http.get(self.config.endpoint("/api/docs"));
        let docs: Vec<Document> = self.send_json("list documents", request).await?;
        debug!(count = docs.len(), "listed documents");
        Ok(docs)
    }

    #[instrument(skip(self, id), fields(doc_id = %id))]
    async fn get_document(&self, id: &DocumentId) -> Result<Document> {
        let request = self.http.get(self.config.document_url(id));
        let doc: Document = self.send_json("get document", request).await?;
        debug!(pages = doc.pages.len(), "fetched document");
        Ok(doc)
    }

    #[instrument(skip(self, id, edit), fields(doc_id = %id, ?edit))]
    async fn update_page(&self, id: &DocumentId, page_number: usize, edit: &PageEdit) -> Result<()> {
        if edit.is_empty() {
            return Err(PaperPilotError::EmptyPageEdit);
        }
        let url = self
            .config
            .endpoint(&format!("/api/docs/{id}/pages/{page_number}/update"));
        let request = self.http.post(url).query(&page_edit_query(edit));
        self.send("update page", request).await?;
        debug!(?edit, "page update confirmed");
        Ok(())
    }

    #[instrument(skip(self, id), fields(doc_id = %id))]
    async fn update_metadata(&self, id: &DocumentId, user_filename: &str) -> Result<Document> {
        let request = self
            .http
            .put(self.config.document_url(id))
            .query(&[("user_filename", user_filename)]);
        let doc: Document = self.send_json("update metadata", request).await?;
        info!(user_filename, "document renamed");
        Ok(doc)
    }

    #[instrument(skip(self, id), fields(doc_id = %id))]
    async fn export_document(&self, id: &DocumentId) -> Result<()> {
        let url = self.config.endpoint(&format!("/api/docs/{id}/export"));
        self.send("export document", self.http.post(url)).await?;
        info!("document exported");
        Ok(())
    }

    #[instrument(skip(self, id), fields(doc_id = %id))]
    async fn delete_document(&self, id: &DocumentId) -> Result<()> {
        let request = self.http.delete(self.config.document_url(id));
        self.send("delete document", request).await?;
        info!("document deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn split_sheet(&self) -> Result<Vec<u8>> {
        let request = self.http.get(self.config.split_sheet_url());
        let response = self.send("split sheet", request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PaperPilotError::Http(format!("split sheet: read body: {e}")))?;
        debug!(len = bytes.len(), "downloaded split sheet");
        Ok(bytes.to_vec())
    }
}

/// Query parameters for a page update; absent fields are omitted.
fn page_edit_query(edit: &PageEdit) -> Vec<(&'static str, String)> {
    let mut query = Vec::with_capacity(2);
    if let Some(status) = edit.status {
        query.push(("status", status.as_str().to_string()));
    }
    if let Some(rotation) = edit.rotation {
        query.push(("rotation", rotation.to_string()));
    }
    query
}

/// Extract a short error description from a response body.
///
/// The server reports failures as `{"detail": "..."}`; anything else is
/// passed through, truncated.
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").map(|d| match d {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
        .unwrap_or_else(|| body.trim().to_string());
    detail.chars().take(MAX_ERROR_BODY).collect()
}
