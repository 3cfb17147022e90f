//! Chat controller
//!
//! Owns the transcript of the current conversation and dispatches queries.
//! One send at a time; responses that arrive after the conversation changed
//! are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::classifier::{classify, LocalReply};
use super::sources::SharedSources;
use super::{sort_chronologically, ChatMessage};
use crate::error::{ApiError, ApiErrorKind};
use crate::gateway::{Gateway, QueryRequest, QueryResponse};
use crate::generation::{Generation, InFlight, Ticket};
use crate::messages::{ChatId, MessageId, NotifyLevel, Route, SurfaceMessage, SurfaceSender, SyncState};
use crate::session::SessionAccess;
use crate::validation::{InputValidator, ValidationResult};

/// Result of [`ChatController::send_message`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Invalid input or another send in flight; nothing changed
    Rejected,
    /// Answered locally without a gateway call
    Local(LocalReply),
    /// Gateway answered
    Answered {
        /// Conversation id adopted by this send, if it started a conversation
        adopted: Option<ChatId>,
    },
    /// Gateway call failed; an error reply was appended
    Failed,
    /// No identity; the session was expired
    Unauthenticated,
    /// The conversation changed while waiting; the response was dropped
    Superseded,
}

#[derive(Debug)]
struct ChatState {
    chat_id: Option<ChatId>,
    messages: Vec<ChatMessage>,
    /// Messages for `chat_id` are already in memory
    loaded: bool,
    /// History fetch for `chat_id` outstanding
    loading: bool,
}

impl ChatState {
    fn fresh() -> Self {
        Self {
            chat_id: None,
            messages: vec![ChatMessage::welcome()],
            loaded: false,
            loading: false,
        }
    }

    fn confirm(&mut self, id: &MessageId) {
        if let Some(message) = self.messages.iter_mut().find(|m| &m.id == id) {
            message.sync = SyncState::Confirmed;
        }
    }

    fn discard(&mut self, id: &MessageId) {
        self.messages.retain(|m| &m.id != id);
    }
}

/// Chat session controller
pub struct ChatController<G: Gateway> {
    gateway: Arc<G>,
    session: Arc<dyn SessionAccess>,
    out: SurfaceSender,
    validator: InputValidator,
    sources: SharedSources,
    state: Mutex<ChatState>,
    sending: AtomicBool,
    generation: Generation,
}

impl<G: Gateway> ChatController<G> {
    /// Create a controller showing a new conversation
    pub fn new(
        gateway: Arc<G>,
        session: Arc<dyn SessionAccess>,
        out: SurfaceSender,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            gateway,
            session,
            out,
            validator: InputValidator::new(max_message_bytes),
            sources: SharedSources::new(),
            state: Mutex::new(ChatState::fresh()),
            sending: AtomicBool::new(false),
            generation: Generation::new(),
        }
    }

    /// Current conversation id (`None` = new, unsaved)
    pub fn chat_id(&self) -> Option<ChatId> {
        self.state.lock().chat_id.clone()
    }

    /// Snapshot of the transcript
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages.clone()
    }

    /// The sources panel
    pub fn sources(&self) -> &SharedSources {
        &self.sources
    }

    /// Whether a query is outstanding
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Send a user message
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if let ValidationResult::Invalid(reason) = self.validator.validate_message(text) {
            tracing::debug!(reason = %reason, "Rejected chat input");
            self.out.notify(NotifyLevel::Warning, &reason).await;
            return SendOutcome::Rejected;
        }

        if self.state.lock().loading {
            tracing::debug!("Send rejected; conversation still loading");
            self.out
                .notify(
                    NotifyLevel::Warning,
                    "Please wait for the conversation to finish loading.",
                )
                .await;
            return SendOutcome::Rejected;
        }

        let Some(_in_flight) = InFlight::acquire(&self.sending) else {
            tracing::warn!("Send rejected; a query is already in flight");
            self.out
                .notify(
                    NotifyLevel::Warning,
                    "Please wait for the current answer before sending another message.",
                )
                .await;
            return SendOutcome::Rejected;
        };

        self.out.send(SurfaceMessage::Busy { busy: true }).await;
        let outcome = self.dispatch(text.trim()).await;
        self.out.send(SurfaceMessage::Busy { busy: false }).await;
        outcome
    }

    async fn dispatch(&self, text: &str) -> SendOutcome {
        let ticket = self.generation.current();
        let user_message = ChatMessage::user(text);
        let user_message_id = user_message.id.clone();

        let chat_id = {
            let mut state = self.state.lock();
            if state.messages.len() == 1 && state.messages[0].is_welcome() {
                state.messages.clear();
            }
            state.messages.push(user_message);
            state.chat_id.clone()
        };
        self.publish_transcript().await;

        if let Some(reply) = classify(text) {
            tracing::debug!(kind = ?reply, "Answering locally");
            {
                let mut state = self.state.lock();
                state.confirm(&user_message_id);
                state.messages.push(ChatMessage::assistant(reply.text(), Vec::new()));
            }
            self.publish_transcript().await;
            return SendOutcome::Local(reply);
        }

        let Some(identity) = self.session.identity() else {
            tracing::warn!("Query attempted without a signed-in user");
            self.out
                .notify(NotifyLevel::Error, "You need to be signed in to ask questions.")
                .await;
            self.session.expire().await;
            return SendOutcome::Unauthenticated;
        };

        tracing::info!(chat_id = ?chat_id, "Dispatching query");
        let request = QueryRequest::new(text, chat_id);
        match self.gateway.query(identity.token(), &request).await {
            Ok(response) => self.apply_answer(ticket, &user_message_id, response).await,
            Err(err) => self.apply_failure(ticket, &user_message_id, err).await,
        }
    }

    async fn apply_answer(
        &self,
        ticket: Ticket,
        user_message_id: &MessageId,
        response: QueryResponse,
    ) -> SendOutcome {
        if !self.generation.is_current(ticket) {
            tracing::info!(generation = ticket.value(), "Conversation changed while waiting; dropping answer");
            self.state.lock().discard(user_message_id);
            return SendOutcome::Superseded;
        }

        let QueryResponse {
            answer,
            chat_id: returned,
            retrieved_documents,
        } = response;

        let adopted = {
            let mut state = self.state.lock();
            state.confirm(user_message_id);
            state
                .messages
                .push(ChatMessage::assistant(answer, retrieved_documents.clone()));

            match (state.chat_id.clone(), returned) {
                (None, Some(returned)) => {
                    state.chat_id = Some(returned.clone());
                    state.loaded = true;
                    Some(returned)
                }
                (Some(current), Some(returned)) if current != returned => {
                    tracing::warn!(
                        chat_id = %current,
                        returned = %returned,
                        "Gateway answered under a different conversation id; keeping the current one"
                    );
                    None
                }
                _ => None,
            }
        };

        if !retrieved_documents.is_empty() {
            self.sources.set(retrieved_documents.clone());
            self.out
                .send(SurfaceMessage::Sources {
                    documents: retrieved_documents,
                })
                .await;
        }
        self.publish_transcript().await;

        if let Some(ref chat_id) = adopted {
            tracing::info!(chat_id = %chat_id, "Conversation started");
            self.out
                .send(SurfaceMessage::ReplaceRoute {
                    route: Route::Chat(chat_id.clone()),
                })
                .await;
        }
        SendOutcome::Answered { adopted }
    }

    async fn apply_failure(
        &self,
        ticket: Ticket,
        user_message_id: &MessageId,
        err: ApiError,
    ) -> SendOutcome {
        if !self.generation.is_current(ticket) {
            tracing::info!(status = err.status, "Conversation changed while waiting; dropping error");
            self.state.lock().discard(user_message_id);
            return SendOutcome::Superseded;
        }

        tracing::warn!(status = err.status, detail = %err.detail, "Query failed");
        let reason = err.user_message();
        {
            let mut state = self.state.lock();
            // The user message stays; it was never stored server-side
            state.confirm(user_message_id);
            state.messages.push(ChatMessage::error(reason.clone()));
        }
        self.publish_transcript().await;

        if err.is_auth() {
            self.session.expire().await;
        } else {
            self.out.notify(NotifyLevel::Error, &reason).await;
        }
        SendOutcome::Failed
    }

    /// Show an existing conversation, replacing whatever is displayed
    pub async fn open_conversation(&self, chat_id: ChatId) {
        {
            let state = self.state.lock();
            if state.loaded && state.chat_id.as_ref() == Some(&chat_id) {
                tracing::debug!(chat_id = %chat_id, "Conversation already loaded");
                return;
            }
        }

        let ticket = self.generation.advance();
        let identity = self.session.identity();
        {
            let mut state = self.state.lock();
            state.chat_id = Some(chat_id.clone());
            state.messages.clear();
            state.loaded = false;
            state.loading = identity.is_some();
        }
        self.publish_transcript().await;

        let Some(identity) = identity else {
            tracing::debug!(chat_id = %chat_id, "No identity; not loading conversation");
            return;
        };

        let result = self.gateway.chat_messages(identity.token(), &chat_id).await;
        {
            let mut state = self.state.lock();
            if !self.generation.is_current(ticket) {
                tracing::debug!(chat_id = %chat_id, generation = ticket.value(), "Discarding superseded history");
                return;
            }
            state.loading = false;
        }

        match result {
            Ok(mut messages) => {
                sort_chronologically(&mut messages);
                let latest_sources = messages
                    .iter()
                    .rev()
                    .find(|m| !m.sources.is_empty())
                    .map(|m| m.sources.clone());
                tracing::debug!(chat_id = %chat_id, count = messages.len(), "Conversation loaded");
                {
                    let mut state = self.state.lock();
                    state.messages = messages;
                    state.loaded = true;
                }
                self.publish_transcript().await;

                if let Some(documents) = latest_sources {
                    self.sources.set(documents.clone());
                    self.out.send(SurfaceMessage::Sources { documents }).await;
                }
            }
            Err(err) => match err.kind() {
                ApiErrorKind::NotFound => {
                    tracing::info!(chat_id = %chat_id, "Conversation not found; starting a new one");
                    self.new_conversation().await;
                    self.out.navigate(Route::NewChat).await;
                }
                ApiErrorKind::Unauthorized => self.session.expire().await,
                _ => {
                    tracing::warn!(chat_id = %chat_id, error = %err, "Failed to load conversation");
                    self.out
                        .notify(
                            NotifyLevel::Error,
                            &format!("Could not load conversation: {}", err.user_message()),
                        )
                        .await;
                }
            },
        }
    }

    /// Explicit reset to a new, unsaved conversation
    pub async fn new_conversation(&self) {
        self.generation.advance();
        *self.state.lock() = ChatState::fresh();
        self.sources.clear();
        self.publish_transcript().await;
        self.out
            .send(SurfaceMessage::Sources {
                documents: Vec::new(),
            })
            .await;
    }

    async fn publish_transcript(&self) {
        let (chat_id, messages) = {
            let state = self.state.lock();
            (state.chat_id.clone(), state.messages.clone())
        };
        self.out
            .send(SurfaceMessage::Transcript { chat_id, messages })
            .await;
    }
}
