//! Surface Messages
//!
//! Messages sent from the core to UI surfaces. These represent every way the
//! client core can ask a connected UI (web, terminal, desktop) to change what
//! it shows.
//!
//! # Design Philosophy
//!
//! Surfaces are pure renderers. They never decide what a failed request means
//! or where to navigate after a sign-out; the core tells them. This keeps the
//! session, chat and document logic testable without any UI attached.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::chat::{ChatMessage, ChatSummary, RetrievedDoc};
use crate::documents::{DocumentStatusRecord, Tracked};
use crate::session::SessionState;

/// Messages from the core to a UI surface
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SurfaceMessage {
    // ============================================
    // Conversation Messages
    // ============================================
    /// The current transcript changed (full snapshot, already ordered)
    Transcript {
        /// Conversation the transcript belongs to (`None` = unsaved)
        chat_id: Option<ChatId>,
        /// Ordered messages
        messages: Vec<ChatMessage>,
    },

    /// The sources panel changed
    Sources {
        /// Documents to display
        documents: Vec<RetrievedDoc>,
    },

    /// The history sidebar changed
    History {
        /// Conversation summaries, most recent first
        chats: Vec<ChatSummary>,
    },

    /// A send is in progress (or finished)
    Busy {
        /// Whether a query is outstanding
        busy: bool,
    },

    // ============================================
    // Knowledge Base Messages
    // ============================================
    /// The document status list changed
    Documents {
        /// Accumulated records in display order, with their sync state
        records: Vec<Tracked<DocumentStatusRecord>>,
        /// Whether another page may exist
        has_more: bool,
    },

    // ============================================
    // Session Messages
    // ============================================
    /// The auth session changed
    Session {
        /// The new session state
        state: SessionState,
    },

    // ============================================
    // Navigation
    // ============================================
    /// Navigate to a route (pushes history)
    Navigate {
        /// Destination
        route: Route,
    },

    /// Replace the current location without a navigation or reload
    ReplaceRoute {
        /// Destination
        route: Route,
    },

    // ============================================
    // System Messages
    // ============================================
    /// Dismissible notification
    Notify {
        /// Notification level
        level: NotifyLevel,
        /// Title (optional)
        title: Option<String>,
        /// Message content
        message: String,
    },
}

/// Sending half of the core -> surface channel
///
/// Shared by every controller. A closed channel (surface gone) is logged and
/// otherwise ignored.
#[derive(Clone, Debug)]
pub struct SurfaceSender {
    tx: mpsc::Sender<SurfaceMessage>,
}

impl SurfaceSender {
    /// Wrap a channel sender
    pub fn new(tx: mpsc::Sender<SurfaceMessage>) -> Self {
        Self { tx }
    }

    /// Create a sender plus the receiver a surface reads from
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SurfaceMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Send a message to the UI surface
    pub async fn send(&self, msg: SurfaceMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }

    /// Send notification
    pub async fn notify(&self, level: NotifyLevel, message: &str) {
        self.send(SurfaceMessage::Notify {
            level,
            title: None,
            message: message.to_string(),
        })
        .await;
    }

    /// Send notification with a title
    pub async fn notify_titled(&self, level: NotifyLevel, title: &str, message: &str) {
        self.send(SurfaceMessage::Notify {
            level,
            title: Some(title.to_string()),
            message: message.to_string(),
        })
        .await;
    }

    /// Push a route
    pub async fn navigate(&self, route: Route) {
        self.send(SurfaceMessage::Navigate { route }).await;
    }
}

/// Routes a surface can display
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Sign-in form
    SignIn,
    /// Empty chat, no conversation id yet
    NewChat,
    /// An existing conversation
    Chat(ChatId),
    /// Knowledge-base status view
    Documents,
}

impl Route {
    /// Path a web surface would show for this route
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::SignIn => "/login".to_string(),
            Self::NewChat => "/chat".to_string(),
            Self::Chat(id) => format!("/chat/{}", id.0),
            Self::Documents => "/documents".to_string(),
        }
    }

    /// Whether the route requires an authenticated identity
    #[must_use]
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::SignIn)
    }
}

/// Chat message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a synthetic client-side id
    pub fn new() -> Self {
        Self(format!("local_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-assigned conversation identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Server-assigned document identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Assistant reply (backend or canned)
    Assistant,
}

/// Whether a locally held record has been confirmed by the gateway
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Changed locally, server has not confirmed yet
    Pending,
    /// Matches the last server response
    #[default]
    Confirmed,
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Success
    Success,
}
