//! Document Status Reconciler
//!
//! Keeps the knowledge-base status view in step with the ingestion pipeline.
//!
//! # Design Philosophy
//!
//! The list is accumulated page by page with an offset/limit cursor. Local
//! actions are reflected before the gateway confirms them only when they are
//! harmless to get wrong:
//!
//! - **Retry** flips the record to `processing` immediately (tagged
//!   [`SyncState::Pending`]) and falls back to a targeted refresh on failure.
//! - **Delete** removes the record only after the gateway confirms.
//!
//! A reset bumps the list generation, so pages requested before it are
//! dropped when they arrive.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{ApiError, ApiErrorKind};
use crate::gateway::{Gateway, UploadRequest};
use crate::generation::{Generation, Ticket};
use crate::messages::{DocumentId, NotifyLevel, SurfaceMessage, SurfaceSender, SyncState};
use crate::session::{Identity, SessionAccess};

/// Shortest poll period; `tokio::time::interval` rejects zero
const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Ingestion lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Stored, waiting for a worker
    Uploaded,
    /// Being chunked and embedded
    Processing,
    /// Chunked, not yet searchable
    Processed,
    /// Searchable
    Indexed,
    /// Ingestion failed
    Error,
}

impl DocumentStatus {
    /// Whether the pipeline is done with the document (successfully or not)
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Indexed | Self::Error)
    }
}

/// Per-document ingestion status as reported by the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatusRecord {
    /// Document id
    pub document_id: DocumentId,
    /// Pipeline state
    pub status: DocumentStatus,
    /// Original file name
    #[serde(default, alias = "filename")]
    pub file_name: Option<String>,
    /// Number of chunks produced
    #[serde(default)]
    pub chunk_count: Option<u32>,
    /// Failure reason when `status` is `error`
    #[serde(default)]
    pub error_message: Option<String>,
    /// Last change, as reported
    #[serde(default, alias = "updated_at")]
    pub last_updated: String,
}

/// A record plus whether the gateway has confirmed its current value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracked<T> {
    /// The record
    pub record: T,
    /// Local sync state
    pub sync: SyncState,
}

impl<T> Tracked<T> {
    /// Value straight from the gateway
    pub fn confirmed(record: T) -> Self {
        Self {
            record,
            sync: SyncState::Confirmed,
        }
    }

    /// Value changed locally ahead of confirmation
    pub fn pending(record: T) -> Self {
        Self {
            record,
            sync: SyncState::Pending,
        }
    }

    /// Whether the value awaits confirmation
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.sync == SyncState::Pending
    }
}

#[derive(Debug, Default)]
struct ListState {
    records: Vec<Tracked<DocumentStatusRecord>>,
    /// Offset of the next page
    offset: usize,
    has_more: bool,
    /// Generation of the list fetch in flight
    loading: Option<Ticket>,
}

impl ListState {
    fn position(&self, document_id: &DocumentId) -> Option<usize> {
        self.records
            .iter()
            .position(|t| &t.record.document_id == document_id)
    }
}

/// Clears the loading marker on drop unless a newer fetch took it over
struct Loading<'a> {
    state: &'a Mutex<ListState>,
    ticket: Ticket,
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.loading == Some(self.ticket) {
            state.loading = None;
        }
    }
}

/// Document status reconciler
pub struct DocumentStatusReconciler<G: Gateway> {
    gateway: Arc<G>,
    session: Arc<dyn SessionAccess>,
    out: SurfaceSender,
    page_size: usize,
    state: Mutex<ListState>,
    generation: Generation,
}

impl<G: Gateway> DocumentStatusReconciler<G> {
    /// Create an empty reconciler
    pub fn new(
        gateway: Arc<G>,
        session: Arc<dyn SessionAccess>,
        out: SurfaceSender,
        page_size: usize,
    ) -> Self {
        Self {
            gateway,
            session,
            out,
            page_size: page_size.max(1),
            state: Mutex::new(ListState::default()),
            generation: Generation::new(),
        }
    }

    /// Snapshot of the accumulated records
    pub fn records(&self) -> Vec<Tracked<DocumentStatusRecord>> {
        self.state.lock().records.clone()
    }

    /// Single record by id
    pub fn record(&self, document_id: &DocumentId) -> Option<Tracked<DocumentStatusRecord>> {
        let state = self.state.lock();
        state.position(document_id).map(|i| state.records[i].clone())
    }

    /// Whether another page may exist
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    /// Whether a list fetch is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.lock().loading.is_some()
    }

    /// Identity that may see company documents
    fn complete_identity(&self) -> Option<Identity> {
        self.session.identity().filter(Identity::is_complete)
    }

    /// Fetch the first page (`reset`) or the next one
    pub async fn fetch_documents(&self, reset: bool) {
        let Some(identity) = self.complete_identity() else {
            tracing::debug!("Identity incomplete; clearing document list");
            self.generation.advance();
            *self.state.lock() = ListState::default();
            self.publish().await;
            return;
        };

        let (ticket, offset) = {
            let mut state = self.state.lock();
            if !reset && state.loading.is_some() {
                tracing::debug!("Document page fetch already in flight");
                return;
            }
            let ticket = if reset {
                self.generation.advance()
            } else {
                self.generation.current()
            };
            state.loading = Some(ticket);
            (ticket, if reset { 0 } else { state.offset })
        };
        let _loading = Loading {
            state: &self.state,
            ticket,
        };

        tracing::debug!(offset, limit = self.page_size, reset, "Fetching document statuses");
        let result = self
            .gateway
            .list_document_status(identity.token(), self.page_size, offset)
            .await;

        if !self.generation.is_current(ticket) {
            tracing::debug!(generation = ticket.value(), "Discarding superseded document page");
            return;
        }

        match result {
            Ok(page) => {
                let count = page.len();
                {
                    let mut state = self.state.lock();
                    if reset {
                        state.records = page.into_iter().map(Tracked::confirmed).collect();
                        state.offset = self.page_size;
                    } else {
                        for record in page {
                            // Uploads shift server offsets; never show a record twice
                            match state.position(&record.document_id) {
                                Some(i) => state.records[i] = Tracked::confirmed(record),
                                None => state.records.push(Tracked::confirmed(record)),
                            }
                        }
                        state.offset += self.page_size;
                    }
                    state.has_more = count >= self.page_size;
                }
                self.publish().await;
            }
            Err(err) => {
                tracing::warn!(status = err.status, detail = %err.detail, "Failed to load documents");
                self.report(err, "Could not load documents").await;
            }
        }
    }

    /// Fetch the next page unless one is in flight or the last page was short
    pub async fn fetch_more(&self) {
        {
            let state = self.state.lock();
            if state.loading.is_some() || !state.has_more {
                return;
            }
        }
        self.fetch_documents(false).await;
    }

    /// Re-run ingestion for a document
    pub async fn retry_document(&self, document_id: &DocumentId) {
        let Some(identity) = self.complete_identity() else {
            return;
        };

        let found = {
            let mut state = self.state.lock();
            match state.position(document_id) {
                Some(i) => {
                    let entry = &mut state.records[i];
                    entry.record.status = DocumentStatus::Processing;
                    entry.record.error_message = None;
                    entry.sync = SyncState::Pending;
                    true
                }
                None => false,
            }
        };
        if found {
            self.publish().await;
        }

        match self.gateway.retry_document(identity.token(), document_id).await {
            Ok(()) => {
                tracing::info!(document_id = %document_id, "Document retry accepted");
                {
                    let mut state = self.state.lock();
                    if let Some(i) = state.position(document_id) {
                        state.records[i].sync = SyncState::Confirmed;
                    }
                }
                self.publish().await;
            }
            Err(err) => {
                tracing::warn!(document_id = %document_id, status = err.status, "Document retry failed");
                self.report(err, "Could not retry document").await;
                self.refresh_document(document_id).await;
            }
        }
    }

    /// Delete a document; the record is removed once the gateway confirms
    pub async fn delete_document(&self, document_id: &DocumentId) -> bool {
        let Some(identity) = self.complete_identity() else {
            return false;
        };

        if let Err(err) = self.gateway.delete_document(identity.token(), document_id).await {
            tracing::warn!(document_id = %document_id, status = err.status, "Document delete failed");
            self.report(err, "Could not delete document").await;
            return false;
        }

        tracing::info!(document_id = %document_id, "Document deleted");
        {
            let mut state = self.state.lock();
            if let Some(i) = state.position(document_id) {
                state.records.remove(i);
                state.offset = state.offset.saturating_sub(1);
            }
        }
        self.publish().await;
        true
    }

    /// Re-fetch one record and replace it in place; failures are only logged
    pub async fn refresh_document(&self, document_id: &DocumentId) {
        let Some(identity) = self.complete_identity() else {
            return;
        };

        match self.gateway.document_status(identity.token(), document_id).await {
            Ok(record) => {
                let replaced = {
                    let mut state = self.state.lock();
                    match state.position(document_id) {
                        Some(i) => {
                            state.records[i] = Tracked::confirmed(record);
                            true
                        }
                        None => false,
                    }
                };
                if replaced {
                    self.publish().await;
                }
            }
            Err(err) => {
                tracing::debug!(document_id = %document_id, error = %err, "Status refresh failed");
            }
        }
    }

    /// Refresh every record the pipeline is still working on
    pub async fn refresh_pending(&self) -> usize {
        let pending: Vec<DocumentId> = self
            .state
            .lock()
            .records
            .iter()
            .filter(|t| !t.record.status.is_terminal())
            .map(|t| t.record.document_id.clone())
            .collect();

        for document_id in &pending {
            self.refresh_document(document_id).await;
        }
        pending.len()
    }

    /// Upload a file for ingestion
    pub async fn upload_document(&self, upload: &UploadRequest) -> Option<DocumentId> {
        let Some(identity) = self.session.identity() else {
            self.out
                .notify(NotifyLevel::Error, "You need to be signed in to upload documents.")
                .await;
            return None;
        };
        if !identity.is_complete() {
            self.out
                .notify(
                    NotifyLevel::Warning,
                    "Your workspace is still being set up. Please try again in a moment.",
                )
                .await;
            return None;
        }

        tracing::info!(file_name = %upload.file_name, bytes = upload.bytes.len(), "Uploading document");
        match self.gateway.ingest(identity.token(), upload).await {
            Ok(response) => {
                let document_id = DocumentId(response.document_id);
                let record = DocumentStatusRecord {
                    document_id: document_id.clone(),
                    status: response.status,
                    file_name: Some(upload.file_name.clone()),
                    chunk_count: None,
                    error_message: None,
                    last_updated: chrono::Utc::now().to_rfc3339(),
                };
                {
                    let mut state = self.state.lock();
                    if let Some(i) = state.position(&document_id) {
                        state.records.remove(i);
                    }
                    state.records.insert(0, Tracked::pending(record));
                }
                self.publish().await;
                self.out
                    .notify(
                        NotifyLevel::Success,
                        &format!("{} uploaded. Processing has started.", upload.file_name),
                    )
                    .await;
                Some(document_id)
            }
            Err(err) if err.kind() == ApiErrorKind::Conflict => {
                tracing::info!(file_name = %upload.file_name, "Duplicate document rejected");
                self.out
                    .notify(
                        NotifyLevel::Warning,
                        &format!("{} has already been uploaded.", upload.file_name),
                    )
                    .await;
                None
            }
            Err(err) => {
                tracing::warn!(file_name = %upload.file_name, status = err.status, "Upload failed");
                self.report(err, "Upload failed").await;
                None
            }
        }
    }

    async fn report(&self, err: ApiError, context: &str) {
        if err.is_auth() {
            self.session.expire().await;
        } else {
            self.out
                .notify(
                    NotifyLevel::Error,
                    &format!("{context}: {}", err.user_message()),
                )
                .await;
        }
    }

    async fn publish(&self) {
        let (records, has_more) = {
            let state = self.state.lock();
            (state.records.clone(), state.has_more)
        };
        self.out
            .send(SurfaceMessage::Documents { records, has_more })
            .await;
    }
}

impl<G: Gateway + 'static> DocumentStatusReconciler<G> {
    /// Poll non-terminal records in the background until the reconciler is dropped
    pub fn spawn_poller(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let reconciler: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period.max(MIN_POLL_PERIOD));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(reconciler) = reconciler.upgrade() else {
                    break;
                };
                let refreshed = reconciler.refresh_pending().await;
                if refreshed > 0 {
                    tracing::debug!(refreshed, "Polled pending documents");
                }
            }
        })
    }
}
