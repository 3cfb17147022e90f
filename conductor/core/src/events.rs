//! Surface Events
//!
//! Events sent from UI surfaces to the core. These represent every user
//! action a surface can report.
//!
//! # Design Philosophy
//!
//! Surfaces don't interpret what actions mean; they report what happened.
//! The [`Conductor`](crate::conductor::Conductor) decides how to respond and
//! answers with [`SurfaceMessage`](crate::messages::SurfaceMessage)s.

use serde::{Deserialize, Serialize};

use crate::gateway::UploadRequest;
use crate::messages::{ChatId, DocumentId, Route};

/// Events from a UI surface to the core
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SurfaceEvent {
    // ============================================
    // Session Events
    // ============================================
    /// Sign-in form submitted
    SignIn {
        /// Email address
        email: String,
        /// Password
        password: String,
    },

    /// Sign-up form submitted
    SignUp {
        /// Email address
        email: String,
        /// Password
        password: String,
        /// Display name (optional)
        name: Option<String>,
    },

    /// User asked to sign out
    SignOut,

    /// Surface moved to a route (initial load, back/forward, link)
    Navigated {
        /// Where the surface is now
        route: Route,
    },

    // ============================================
    // Chat Events
    // ============================================
    /// User submitted a message
    SendMessage {
        /// Message text
        content: String,
    },

    /// User opened a conversation from the history sidebar
    OpenConversation {
        /// Conversation to show
        chat_id: ChatId,
    },

    /// User started a new conversation
    NewConversation,

    /// History sidebar wants a fresh list
    RefreshHistory,

    /// User deleted a conversation
    DeleteConversation {
        /// Conversation to delete
        chat_id: ChatId,
    },

    // ============================================
    // Knowledge Base Events
    // ============================================
    /// Status view opened or refresh requested
    RefreshDocuments,

    /// Status view scrolled to the end
    FetchMoreDocuments,

    /// User asked to re-run ingestion
    RetryDocument {
        /// Document to retry
        document_id: DocumentId,
    },

    /// User deleted a document
    DeleteDocument {
        /// Document to delete
        document_id: DocumentId,
    },

    /// User uploaded a file
    UploadDocument(UploadRequest),
}

impl SurfaceEvent {
    /// Short name for logging (never includes credentials or content)
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignIn { .. } => "sign_in",
            Self::SignUp { .. } => "sign_up",
            Self::SignOut => "sign_out",
            Self::Navigated { .. } => "navigated",
            Self::SendMessage { .. } => "send_message",
            Self::OpenConversation { .. } => "open_conversation",
            Self::NewConversation => "new_conversation",
            Self::RefreshHistory => "refresh_history",
            Self::DeleteConversation { .. } => "delete_conversation",
            Self::RefreshDocuments => "refresh_documents",
            Self::FetchMoreDocuments => "fetch_more_documents",
            Self::RetryDocument { .. } => "retry_document",
            Self::DeleteDocument { .. } => "delete_document",
            Self::UploadDocument(_) => "upload_document",
        }
    }
}
