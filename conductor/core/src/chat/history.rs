//! History sidebar

use std::sync::Arc;

use chrono::DateTime;
use parking_lot::Mutex;

use super::controller::ChatController;
use super::ChatSummary;
use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::generation::Generation;
use crate::messages::{ChatId, NotifyLevel, Route, SurfaceMessage, SurfaceSender};
use crate::session::SessionAccess;

/// Conversation list for the sidebar
pub struct ChatHistory<G: Gateway> {
    gateway: Arc<G>,
    session: Arc<dyn SessionAccess>,
    out: SurfaceSender,
    controller: Arc<ChatController<G>>,
    chats: Mutex<Vec<ChatSummary>>,
    generation: Generation,
}

impl<G: Gateway> ChatHistory<G> {
    /// Create an empty history bound to the controller it redirects
    pub fn new(
        gateway: Arc<G>,
        session: Arc<dyn SessionAccess>,
        out: SurfaceSender,
        controller: Arc<ChatController<G>>,
    ) -> Self {
        Self {
            gateway,
            session,
            out,
            controller,
            chats: Mutex::new(Vec::new()),
            generation: Generation::new(),
        }
    }

    /// Snapshot of the list
    pub fn chats(&self) -> Vec<ChatSummary> {
        self.chats.lock().clone()
    }

    /// Reload the list, most recent first
    pub async fn refresh(&self) {
        let ticket = self.generation.advance();
        let Some(identity) = self.session.identity() else {
            self.chats.lock().clear();
            self.publish().await;
            return;
        };

        let result = self.gateway.list_chats(identity.token()).await;
        if !self.generation.is_current(ticket) {
            return;
        }

        match result {
            Ok(mut chats) => {
                // Stable: unparsable timestamps keep server order at the end
                chats.sort_by_key(|chat| {
                    std::cmp::Reverse(DateTime::parse_from_rfc3339(&chat.updated_at).ok())
                });
                tracing::debug!(count = chats.len(), "History refreshed");
                *self.chats.lock() = chats;
                self.publish().await;
            }
            Err(err) => self.report(err, "Could not load conversation history").await,
        }
    }

    /// Delete a conversation
    ///
    /// The list changes only after the gateway confirms. Deleting the open
    /// conversation resets the chat view.
    pub async fn delete(&self, chat_id: &ChatId) -> bool {
        let Some(identity) = self.session.identity() else {
            return false;
        };

        if let Err(err) = self.gateway.delete_chat(identity.token(), chat_id).await {
            tracing::warn!(chat_id = %chat_id, status = err.status, "Delete conversation failed");
            self.report(err, "Could not delete conversation").await;
            return false;
        }

        tracing::info!(chat_id = %chat_id, "Conversation deleted");
        self.chats.lock().retain(|chat| &chat.id != chat_id);
        self.publish().await;

        if self.controller.chat_id().as_ref() == Some(chat_id) {
            self.controller.new_conversation().await;
            self.out.navigate(Route::NewChat).await;
        }
        true
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
        let chats = self.chats();
        self.out.send(SurfaceMessage::History { chats }).await;
    }
}
