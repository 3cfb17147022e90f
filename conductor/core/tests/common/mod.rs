//! Shared test doubles for the integration tests
//!
//! `MockGateway` keeps a small in-memory "server" (chats, messages, status
//! records) and counts every call. `Gate`s let a test hold a call open to
//! observe intermediate state.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch, Notify};

use ragdesk_core::auth::{
    AppMetadata, AuthEvent, AuthEventKind, AuthProvider, AuthSession, AuthUser, Credentials,
    SignUpOutcome, SignUpParams, UserMetadata,
};
use ragdesk_core::chat::{ChatMessage, ChatSummary, RetrievedDoc};
use ragdesk_core::documents::{DocumentStatus, DocumentStatusRecord};
use ragdesk_core::gateway::{
    EnsureCompanyResponse, Gateway, IngestResponse, QueryRequest, QueryResponse, UploadRequest,
};
use ragdesk_core::messages::{ChatId, DocumentId, MessageRole, SurfaceMessage, SurfaceSender};
use ragdesk_core::session::{Identity, SessionAccess, SessionState};
use ragdesk_core::{ApiError, AuthError};

/// How long a test waits for a background effect before failing
pub const WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// Gate
// =============================================================================

/// Holds a mocked call open until released
#[derive(Default)]
pub struct Gate {
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Block the next calls until `release`
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Stop blocking new calls (already blocked calls stay blocked)
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Let one blocked call continue and stop blocking new ones
    pub fn release(&self) {
        self.disarm();
        self.release.notify_one();
    }

    /// Wait until a call is blocked at the gate
    pub async fn entered(&self) {
        tokio::time::timeout(WAIT, self.entered.notified())
            .await
            .expect("call never reached the gate");
    }

    async fn pass(&self) {
        if self.armed.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn auth_user(user_id: &str, company_id: Option<&str>) -> AuthUser {
    AuthUser {
        id: user_id.to_string(),
        email: Some(format!("{user_id}@example.com")),
        app_metadata: AppMetadata {
            company_id: company_id.map(str::to_string),
            roles: Vec::new(),
        },
        user_metadata: UserMetadata {
            name: Some("Test User".to_string()),
            full_name: None,
        },
    }
}

pub fn auth_session(user_id: &str, company_id: Option<&str>) -> AuthSession {
    AuthSession {
        access_token: format!("token-{user_id}"),
        refresh_token: Some(format!("refresh-{user_id}")),
        expires_at: None,
        user: auth_user(user_id, company_id),
    }
}

pub fn identity(company_id: Option<&str>) -> Identity {
    Identity {
        user_id: "u1".to_string(),
        company_id: company_id.map(str::to_string),
        access_token: Some("token-u1".to_string()),
        bypass: false,
    }
}

pub fn doc(id: &str) -> RetrievedDoc {
    RetrievedDoc {
        id: id.to_string(),
        document_id: Some(format!("doc-{id}")),
        file_name: Some(format!("{id}.pdf")),
        score: Some(0.9),
        content_preview: Some("...".to_string()),
        metadata: None,
    }
}

pub fn wire_message(created_at: &str, role: MessageRole, content: &str) -> ChatMessage {
    let mut message = ChatMessage::assistant(content, Vec::new());
    message.role = role;
    message.created_at = created_at.to_string();
    message
}

pub fn record(id: &str, status: DocumentStatus) -> DocumentStatusRecord {
    DocumentStatusRecord {
        document_id: DocumentId::from(id),
        status,
        file_name: Some(format!("{id}.pdf")),
        chunk_count: None,
        error_message: (status == DocumentStatus::Error).then(|| "parse failure".to_string()),
        last_updated: "2024-05-01T10:00:00Z".to_string(),
    }
}

pub fn answer(text: &str, chat_id: Option<&str>, sources: Vec<RetrievedDoc>) -> QueryResponse {
    QueryResponse {
        answer: text.to_string(),
        chat_id: chat_id.map(ChatId::from),
        retrieved_documents: sources,
    }
}

// =============================================================================
// Surface channel
// =============================================================================

pub fn surface() -> (SurfaceSender, mpsc::Receiver<SurfaceMessage>) {
    SurfaceSender::channel(1024)
}

/// Everything sent so far
pub fn drain(rx: &mut mpsc::Receiver<SurfaceMessage>) -> Vec<SurfaceMessage> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

/// Wait for a watched session state to satisfy `predicate`
pub async fn wait_for_state(
    rx: &mut watch::Receiver<SessionState>,
    predicate: impl Fn(&SessionState) -> bool,
) -> SessionState {
    tokio::time::timeout(WAIT, async {
        loop {
            let state = rx.borrow_and_update().clone();
            if predicate(&state) {
                return state;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    })
    .await
    .expect("session state never reached the expected value")
}

/// Let spawned tasks run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Poll until `done` holds
pub async fn wait_until(done: impl Fn() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

// =============================================================================
// MockGateway
// =============================================================================

#[derive(Default)]
pub struct MockGateway {
    pub query_calls: AtomicUsize,
    pub list_chats_calls: AtomicUsize,
    pub chat_messages_calls: AtomicUsize,
    pub delete_chat_calls: AtomicUsize,
    pub ingest_calls: AtomicUsize,
    pub list_status_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub retry_calls: AtomicUsize,
    pub delete_document_calls: AtomicUsize,
    pub ensure_calls: AtomicUsize,

    pub query_gate: Gate,
    pub chat_messages_gate: Gate,
    pub list_status_gate: Gate,
    pub retry_gate: Gate,
    pub ensure_gate: Gate,

    /// Queued query results; an empty queue answers "ok" without a chat id
    pub queries: Mutex<VecDeque<Result<QueryResponse, ApiError>>>,
    pub query_requests: Mutex<Vec<QueryRequest>>,
    pub tokens: Mutex<Vec<Option<String>>>,

    pub chats: Mutex<Vec<ChatSummary>>,
    pub messages: Mutex<HashMap<String, Result<Vec<ChatMessage>, ApiError>>>,
    pub delete_chat_error: Mutex<Option<ApiError>>,

    /// Server-side status list
    pub documents: Mutex<Vec<DocumentStatusRecord>>,
    pub list_status_error: Mutex<Option<ApiError>>,
    pub retry_error: Mutex<Option<ApiError>>,
    pub delete_document_error: Mutex<Option<ApiError>>,
    pub ingest_result: Mutex<Option<Result<IngestResponse, ApiError>>>,

    pub ensure_error: Mutex<Option<ApiError>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_query(&self, result: Result<QueryResponse, ApiError>) {
        self.queries.lock().push_back(result);
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn record_token(&self, token: Option<&str>) {
        self.tokens.lock().push(token.map(str::to_string));
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn query(
        &self,
        token: Option<&str>,
        request: &QueryRequest,
    ) -> Result<QueryResponse, ApiError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        self.query_requests.lock().push(request.clone());
        self.query_gate.pass().await;
        let next = self.queries.lock().pop_front();
        next.unwrap_or_else(|| Ok(answer("ok", None, Vec::new())))
    }

    async fn list_chats(&self, token: Option<&str>) -> Result<Vec<ChatSummary>, ApiError> {
        self.list_chats_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        Ok(self.chats.lock().clone())
    }

    async fn chat_messages(
        &self,
        token: Option<&str>,
        chat_id: &ChatId,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        self.chat_messages_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        self.chat_messages_gate.pass().await;
        self.messages
            .lock()
            .get(&chat_id.0)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::new(404, "Chat not found")))
    }

    async fn delete_chat(&self, token: Option<&str>, chat_id: &ChatId) -> Result<(), ApiError> {
        self.delete_chat_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        if let Some(err) = self.delete_chat_error.lock().clone() {
            return Err(err);
        }
        self.chats.lock().retain(|c| &c.id != chat_id);
        Ok(())
    }

    async fn ingest(
        &self,
        token: Option<&str>,
        upload: &UploadRequest,
    ) -> Result<IngestResponse, ApiError> {
        self.ingest_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        if let Some(result) = self.ingest_result.lock().clone() {
            return result;
        }
        Ok(IngestResponse {
            document_id: format!("doc-{}", upload.file_name),
            task_id: Some("task-1".to_string()),
            status: DocumentStatus::Uploaded,
            message: None,
        })
    }

    async fn list_document_status(
        &self,
        token: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DocumentStatusRecord>, ApiError> {
        self.list_status_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        self.list_status_gate.pass().await;
        if let Some(err) = self.list_status_error.lock().clone() {
            return Err(err);
        }
        Ok(self
            .documents
            .lock()
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn document_status(
        &self,
        token: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<DocumentStatusRecord, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        self.documents
            .lock()
            .iter()
            .find(|r| &r.document_id == document_id)
            .cloned()
            .ok_or_else(|| ApiError::new(404, "Document not found"))
    }

    async fn retry_document(
        &self,
        token: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<(), ApiError> {
        self.retry_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        self.retry_gate.pass().await;
        if let Some(err) = self.retry_error.lock().clone() {
            return Err(err);
        }
        if let Some(r) = self
            .documents
            .lock()
            .iter_mut()
            .find(|r| &r.document_id == document_id)
        {
            r.status = DocumentStatus::Processing;
            r.error_message = None;
        }
        Ok(())
    }

    async fn delete_document(
        &self,
        token: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<(), ApiError> {
        self.delete_document_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        if let Some(err) = self.delete_document_error.lock().clone() {
            return Err(err);
        }
        self.documents
            .lock()
            .retain(|r| &r.document_id != document_id);
        Ok(())
    }

    async fn ensure_company(&self, token: Option<&str>) -> Result<EnsureCompanyResponse, ApiError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(token);
        self.ensure_gate.pass().await;
        if let Some(err) = self.ensure_error.lock().clone() {
            return Err(err);
        }
        Ok(EnsureCompanyResponse {
            company_id: Some("company-1".to_string()),
            created: true,
        })
    }
}

// =============================================================================
// MockAuth
// =============================================================================

pub struct MockAuth {
    events: broadcast::Sender<AuthEvent>,
    pub session: Mutex<Option<AuthSession>>,
    /// Session handed out by the next refresh (defaults to the current one)
    pub refreshed: Mutex<Option<AuthSession>>,
    pub sign_out_error: Mutex<Option<AuthError>>,
    pub sign_up_outcome: Mutex<Option<SignUpOutcome>>,
    pub get_session_gate: Gate,
    pub get_session_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl MockAuth {
    pub fn new(initial: Option<AuthSession>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            events,
            session: Mutex::new(initial),
            refreshed: Mutex::new(None),
            sign_out_error: Mutex::new(None),
            sign_up_outcome: Mutex::new(None),
            get_session_gate: Gate::default(),
            get_session_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        })
    }

    /// Broadcast an event as the provider would
    pub fn emit(&self, kind: AuthEventKind, session: Option<AuthSession>) {
        let _ = self.events.send(AuthEvent::new(kind, session));
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn get_session(&self) -> Result<Option<AuthSession>, AuthError> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        self.get_session_gate.pass().await;
        Ok(self.session.lock().clone())
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthSession, AuthError> {
        if credentials.password != "correct-horse" {
            return Err(AuthError::Provider {
                status: 400,
                message: "Invalid login credentials".to_string(),
            });
        }
        let session = auth_session("u1", Some("company-1"));
        *self.session.lock() = Some(session.clone());
        self.emit(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, params: &SignUpParams) -> Result<SignUpOutcome, AuthError> {
        Ok(self
            .sign_up_outcome
            .lock()
            .clone()
            .unwrap_or_else(|| SignUpOutcome::ConfirmationRequired {
                user_id: "u-new".to_string(),
                email: Some(params.credentials.email.clone()),
            }))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *self.session.lock() = None;
        self.emit(AuthEventKind::SignedOut, None);
        match self.sign_out_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn refresh_session(&self) -> Result<AuthSession, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .refreshed
            .lock()
            .take()
            .or_else(|| self.session.lock().clone())
            .ok_or(AuthError::NoSession)?;
        *self.session.lock() = Some(next.clone());
        self.emit(AuthEventKind::TokenRefreshed, Some(next.clone()));
        Ok(next)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// StubSession
// =============================================================================

/// Session capability with a fixed identity; `expire` clears it
pub struct StubSession {
    pub identity: Mutex<Option<Identity>>,
    pub expired: AtomicUsize,
}

impl StubSession {
    pub fn signed_in(company_id: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            identity: Mutex::new(Some(identity(company_id))),
            expired: AtomicUsize::new(0),
        })
    }

    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self {
            identity: Mutex::new(None),
            expired: AtomicUsize::new(0),
        })
    }

    pub fn expired_count(&self) -> usize {
        self.expired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionAccess for StubSession {
    fn identity(&self) -> Option<Identity> {
        self.identity.lock().clone()
    }

    async fn expire(&self) {
        self.expired.fetch_add(1, Ordering::SeqCst);
        *self.identity.lock() = None;
    }
}
