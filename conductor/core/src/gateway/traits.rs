//! Gateway Trait
//!
//! The abstraction the session, chat and document controllers use to reach
//! the API gateway. Tests substitute in-memory implementations.
//!
//! Every method takes the bearer token to send. `None` means no
//! `Authorization` header (auth bypass mode).

use async_trait::async_trait;

use super::types::{EnsureCompanyResponse, IngestResponse, QueryRequest, QueryResponse, UploadRequest};
use crate::chat::{ChatMessage, ChatSummary};
use crate::documents::DocumentStatusRecord;
use crate::error::ApiError;
use crate::messages::{ChatId, DocumentId};

/// Gateway endpoint paths
pub mod paths {
    use urlencoding::encode;

    use crate::messages::{ChatId, DocumentId};

    /// Query dispatch
    pub const QUERY: &str = "/api/v1/query";
    /// Chat summaries
    pub const CHATS: &str = "/api/v1/chats";
    /// Document upload
    pub const INGEST: &str = "/api/v1/ingest";
    /// Paginated status list
    pub const INGEST_STATUS: &str = "/api/v1/ingest/status";
    /// Company association for the signed-in user
    pub const ENSURE_COMPANY: &str = "/api/v1/companies/ensure";

    /// Single chat
    pub fn chat(id: &ChatId) -> String {
        format!("{CHATS}/{}", encode(&id.0))
    }

    /// Messages of a chat
    pub fn chat_messages(id: &ChatId) -> String {
        format!("{CHATS}/{}/messages", encode(&id.0))
    }

    /// Status of a single document
    pub fn document_status(id: &DocumentId) -> String {
        format!("{INGEST_STATUS}/{}", encode(&id.0))
    }

    /// Re-run ingestion for a document
    pub fn document_retry(id: &DocumentId) -> String {
        format!("{INGEST}/{}/retry", encode(&id.0))
    }

    /// Delete a document
    pub fn document(id: &DocumentId) -> String {
        format!("{INGEST}/{}", encode(&id.0))
    }
}

/// API gateway client
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Dispatch a query; returns the answer, its sources and the chat id
    async fn query(
        &self,
        token: Option<&str>,
        request: &QueryRequest,
    ) -> Result<QueryResponse, ApiError>;

    /// List conversation summaries
    async fn list_chats(&self, token: Option<&str>) -> Result<Vec<ChatSummary>, ApiError>;

    /// Fetch the full message history of a conversation
    async fn chat_messages(
        &self,
        token: Option<&str>,
        chat_id: &ChatId,
    ) -> Result<Vec<ChatMessage>, ApiError>;

    /// Delete a conversation
    async fn delete_chat(&self, token: Option<&str>, chat_id: &ChatId) -> Result<(), ApiError>;

    /// Upload a document for ingestion
    async fn ingest(
        &self,
        token: Option<&str>,
        upload: &UploadRequest,
    ) -> Result<IngestResponse, ApiError>;

    /// One page of ingestion status records
    async fn list_document_status(
        &self,
        token: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DocumentStatusRecord>, ApiError>;

    /// Status of a single document
    async fn document_status(
        &self,
        token: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<DocumentStatusRecord, ApiError>;

    /// Re-run ingestion for a document
    async fn retry_document(
        &self,
        token: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<(), ApiError>;

    /// Delete a document and its chunks
    async fn delete_document(
        &self,
        token: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<(), ApiError>;

    /// Associate (or create) a company for the signed-in user
    async fn ensure_company(&self, token: Option<&str>) -> Result<EnsureCompanyResponse, ApiError>;
}
