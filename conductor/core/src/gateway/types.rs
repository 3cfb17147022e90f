//! Gateway wire types
//!
//! Request and response bodies that are specific to the gateway. Entities the
//! controllers keep in state (messages, summaries, status records) live with
//! their controllers.

use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, ChatSummary, RetrievedDoc};
use crate::documents::{DocumentStatus, DocumentStatusRecord};
use crate::messages::ChatId;

/// `POST /api/v1/query` body
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryRequest {
    /// The user's question
    pub query: String,
    /// Conversation to append to (`None` starts a new one)
    pub chat_id: Option<ChatId>,
}

impl QueryRequest {
    /// Create a query request
    pub fn new(query: impl Into<String>, chat_id: Option<ChatId>) -> Self {
        Self {
            query: query.into(),
            chat_id,
        }
    }
}

/// `POST /api/v1/query` response
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct QueryResponse {
    /// Assistant answer
    pub answer: String,
    /// Conversation the exchange was stored under
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    /// Documents used to ground the answer
    #[serde(default)]
    pub retrieved_documents: Vec<RetrievedDoc>,
}

/// `POST /api/v1/ingest` response
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct IngestResponse {
    /// New document id
    pub document_id: String,
    /// Background task id
    #[serde(default)]
    pub task_id: Option<String>,
    /// Initial status
    pub status: DocumentStatus,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /api/v1/companies/ensure` response
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct EnsureCompanyResponse {
    /// Company now associated with the user
    #[serde(default)]
    pub company_id: Option<String>,
    /// Whether the company was created by this call
    #[serde(default)]
    pub created: bool,
}

/// File to upload into the knowledge base
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Original file name
    pub file_name: String,
    /// MIME type (e.g. `application/pdf`)
    pub content_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

// List endpoints have answered both bare arrays and wrapped objects over time.

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ChatListBody {
    Bare(Vec<ChatSummary>),
    Wrapped { chats: Vec<ChatSummary> },
}

impl ChatListBody {
    pub(crate) fn into_vec(self) -> Vec<ChatSummary> {
        match self {
            Self::Bare(v) | Self::Wrapped { chats: v } => v,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum MessageListBody {
    Bare(Vec<ChatMessage>),
    Wrapped { messages: Vec<ChatMessage> },
}

impl MessageListBody {
    pub(crate) fn into_vec(self) -> Vec<ChatMessage> {
        match self {
            Self::Bare(v) | Self::Wrapped { messages: v } => v,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum StatusListBody {
    Bare(Vec<DocumentStatusRecord>),
    Wrapped {
        #[serde(alias = "items")]
        documents: Vec<DocumentStatusRecord>,
    },
}

impl StatusListBody {
    pub(crate) fn into_vec(self) -> Vec<DocumentStatusRecord> {
        match self {
            Self::Bare(v) | Self::Wrapped { documents: v } => v,
        }
    }
}
