//! Chat Session
//!
//! Conversation state for the chat view: the ordered transcript of the
//! current conversation, the sources panel and the history sidebar.
//!
//! # Design Philosophy
//!
//! The transcript is owned by one [`ChatController`]. Every change is pushed
//! to the surface as a full snapshot, so a surface never has to merge partial
//! updates. Local replies (greetings, "what can you do") never touch the
//! network.

mod classifier;
mod controller;
mod history;
mod sources;

pub use classifier::{classify, is_greeting, is_meta_query, LocalReply};
pub use controller::{ChatController, SendOutcome};
pub use history::ChatHistory;
pub use sources::SharedSources;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::messages::{ChatId, MessageId, MessageRole, SyncState};

/// Id of the seeded welcome message
pub const WELCOME_MESSAGE_ID: &str = "welcome";

/// Text of the seeded welcome message
pub const WELCOME_TEXT: &str =
    "Hi! Ask me anything about the documents in your knowledge base and I'll answer with sources.";

/// A document used to ground an answer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDoc {
    /// Chunk or retrieval id
    pub id: String,
    /// Source document
    #[serde(default)]
    pub document_id: Option<String>,
    /// Source file name
    #[serde(default)]
    pub file_name: Option<String>,
    /// Relevance score
    #[serde(default)]
    pub score: Option<f64>,
    /// Short excerpt of the matched content
    #[serde(default)]
    pub content_preview: Option<String>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// One entry in a conversation transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server id, or a synthetic `local_` id for messages created here
    #[serde(default)]
    pub id: MessageId,
    /// Author
    pub role: MessageRole,
    /// Text
    pub content: String,
    /// Sources attached to an assistant answer
    #[serde(default, alias = "retrieved_documents")]
    pub sources: Vec<RetrievedDoc>,
    /// RFC 3339 timestamp as received
    #[serde(default)]
    pub created_at: String,
    /// Synthetic error reply
    #[serde(default)]
    pub is_error: bool,
    /// Local sync state
    #[serde(default)]
    pub sync: SyncState,
}

impl ChatMessage {
    fn local(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            sources: Vec::new(),
            created_at: Utc::now().to_rfc3339(),
            is_error: false,
            sync: SyncState::Confirmed,
        }
    }

    /// Optimistic user message, pending until the gateway answers
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sync: SyncState::Pending,
            ..Self::local(MessageRole::User, content)
        }
    }

    /// Assistant reply
    pub fn assistant(content: impl Into<String>, sources: Vec<RetrievedDoc>) -> Self {
        Self {
            sources,
            ..Self::local(MessageRole::Assistant, content)
        }
    }

    /// Error-flagged assistant reply
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::local(MessageRole::Assistant, content)
        }
    }

    /// The seeded welcome message
    pub fn welcome() -> Self {
        Self {
            id: MessageId(WELCOME_MESSAGE_ID.to_string()),
            ..Self::local(MessageRole::Assistant, WELCOME_TEXT)
        }
    }

    /// Whether this is the seeded welcome message
    #[must_use]
    pub fn is_welcome(&self) -> bool {
        self.id.0 == WELCOME_MESSAGE_ID
    }

    /// Parsed timestamp (`None` when missing or unparsable)
    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.created_at).ok()
    }
}

/// Sort messages oldest first
///
/// Unparsable timestamps sort before every parsable one. The sort is stable,
/// so equal keys keep their server order.
pub fn sort_chronologically(messages: &mut [ChatMessage]) {
    messages.sort_by_key(ChatMessage::timestamp);
}

/// Entry in the history sidebar
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Conversation id
    pub id: ChatId,
    /// Title (usually the first question)
    #[serde(default)]
    pub title: Option<String>,
    /// Last activity
    #[serde(default)]
    pub updated_at: String,
}
