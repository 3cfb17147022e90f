//! Conductor - The Client Core
//!
//! The Conductor owns the session manager, the chat controller, the history
//! sidebar and the document status reconciler, and routes surface events to
//! them.
//!
//! # Design Philosophy
//!
//! The Conductor is UI-agnostic. It doesn't know or care whether it's talking
//! to a web view, a terminal or a test harness. It communicates through:
//! - `SurfaceEvent`: events received FROM the UI surface
//! - `SurfaceMessage`: commands sent TO the UI surface
//!
//! `handle_event` takes `&self`, so a surface may drive several events
//! concurrently (typing a question while the document list loads). Gateway
//! failures never surface as `Err`; they become notifications.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::{AuthProvider, Credentials, GoTrueAuth, SignUpOutcome, SignUpParams};
use crate::chat::{ChatController, ChatHistory, SendOutcome};
use crate::config::ClientConfig;
use crate::documents::DocumentStatusReconciler;
use crate::events::SurfaceEvent;
use crate::gateway::{Gateway, HttpGateway};
use crate::messages::{NotifyLevel, Route, SurfaceMessage, SurfaceSender};
use crate::session::{SessionAccess, SessionManager};

/// The Conductor - headless client core
pub struct Conductor<G: Gateway, A: AuthProvider> {
    /// Configuration
    config: ClientConfig,
    /// Auth session tracking
    session: Arc<SessionManager<A, G>>,
    /// Current conversation
    chat: Arc<ChatController<G>>,
    /// History sidebar
    history: ChatHistory<G>,
    /// Knowledge-base status list
    documents: Arc<DocumentStatusReconciler<G>>,
    /// Channel to the UI surface
    out: SurfaceSender,
    /// Background status poller
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl<G: Gateway + 'static, A: AuthProvider + 'static> Conductor<G, A> {
    /// Create a new Conductor
    ///
    /// The gateway and auth provider are shared so an embedding surface can
    /// keep its own handle (e.g. to restore a persisted session).
    pub fn new(
        gateway: Arc<G>,
        auth: Arc<A>,
        config: ClientConfig,
        tx: mpsc::Sender<SurfaceMessage>,
    ) -> Self {
        let out = SurfaceSender::new(tx);

        let session = Arc::new(SessionManager::new(
            auth,
            Arc::clone(&gateway),
            out.clone(),
            config.auth_bypass,
        ));
        let access: Arc<dyn SessionAccess> = session.clone();

        let chat = Arc::new(ChatController::new(
            Arc::clone(&gateway),
            Arc::clone(&access),
            out.clone(),
            config.max_message_bytes,
        ));
        let history = ChatHistory::new(
            Arc::clone(&gateway),
            Arc::clone(&access),
            out.clone(),
            Arc::clone(&chat),
        );
        let documents = Arc::new(DocumentStatusReconciler::new(
            gateway,
            access,
            out.clone(),
            config.page_size,
        ));

        Self {
            config,
            session,
            chat,
            history,
            documents,
            out,
            poller: Mutex::new(None),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get session manager
    pub fn session(&self) -> &Arc<SessionManager<A, G>> {
        &self.session
    }

    /// Get chat controller
    pub fn chat(&self) -> &Arc<ChatController<G>> {
        &self.chat
    }

    /// Get history sidebar
    pub fn history(&self) -> &ChatHistory<G> {
        &self.history
    }

    /// Get document reconciler
    pub fn documents(&self) -> &Arc<DocumentStatusReconciler<G>> {
        &self.documents
    }

    /// Resolve the session, load history and start status polling
    pub async fn start(&self) -> anyhow::Result<()> {
        tracing::info!(
            gateway = %self.config.gateway_url,
            bypass = self.config.auth_bypass,
            "Starting client core"
        );
        self.session.init().await;

        if self.session.identity().is_some() {
            self.history.refresh().await;
        }

        let poller = self.documents.spawn_poller(self.config.poll_interval());
        if let Some(previous) = self.poller.lock().replace(poller) {
            previous.abort();
        }
        Ok(())
    }

    /// Handle an event from a UI surface
    pub async fn handle_event(&self, event: SurfaceEvent) -> anyhow::Result<()> {
        tracing::debug!(event = event.name(), "Surface event");

        match event {
            SurfaceEvent::SignIn { email, password } => {
                let credentials = Credentials::new(email, password);
                match self.session.sign_in_with_password(&credentials).await {
                    Ok(()) => {
                        self.out.navigate(Route::NewChat).await;
                    }
                    Err(e) => {
                        tracing::info!(error = %e, "Sign-in rejected");
                        self.out.notify(NotifyLevel::Error, &e.to_string()).await;
                    }
                }
            }

            SurfaceEvent::SignUp {
                email,
                password,
                name,
            } => {
                let params = SignUpParams {
                    credentials: Credentials::new(email, password),
                    name,
                };
                match self.session.sign_up(&params).await {
                    Ok(SignUpOutcome::SignedIn(_)) => {
                        self.out.navigate(Route::NewChat).await;
                    }
                    Ok(SignUpOutcome::ConfirmationRequired { email, .. }) => {
                        let target = email.unwrap_or_else(|| "your inbox".to_string());
                        self.out
                            .notify_titled(
                                NotifyLevel::Info,
                                "Confirm your email",
                                &format!("We sent a confirmation link to {target}."),
                            )
                            .await;
                    }
                    Err(e) => {
                        tracing::info!(error = %e, "Sign-up rejected");
                        self.out.notify(NotifyLevel::Error, &e.to_string()).await;
                    }
                }
            }

            SurfaceEvent::SignOut => {
                self.session.sign_out().await;
                self.chat.new_conversation().await;
                self.documents.fetch_documents(true).await;
            }

            SurfaceEvent::Navigated { route } => {
                self.handle_navigation(route).await;
            }

            SurfaceEvent::SendMessage { content } => {
                if let SendOutcome::Answered {
                    adopted: Some(chat_id),
                } = self.chat.send_message(&content).await
                {
                    tracing::debug!(chat_id = %chat_id, "New conversation; refreshing history");
                    self.history.refresh().await;
                }
            }

            SurfaceEvent::OpenConversation { chat_id } => {
                self.chat.open_conversation(chat_id).await;
            }

            SurfaceEvent::NewConversation => {
                self.chat.new_conversation().await;
                self.out.navigate(Route::NewChat).await;
            }

            SurfaceEvent::RefreshHistory => {
                self.history.refresh().await;
            }

            SurfaceEvent::DeleteConversation { chat_id } => {
                self.history.delete(&chat_id).await;
            }

            SurfaceEvent::RefreshDocuments => {
                self.documents.fetch_documents(true).await;
            }

            SurfaceEvent::FetchMoreDocuments => {
                self.documents.fetch_more().await;
            }

            SurfaceEvent::RetryDocument { document_id } => {
                self.documents.retry_document(&document_id).await;
            }

            SurfaceEvent::DeleteDocument { document_id } => {
                self.documents.delete_document(&document_id).await;
            }

            SurfaceEvent::UploadDocument(upload) => {
                self.documents.upload_document(&upload).await;
            }
        }

        Ok(())
    }

    async fn handle_navigation(&self, route: Route) {
        let resolved = self.session.state().is_resolved();
        if route.is_protected() && resolved && self.session.identity().is_none() {
            tracing::debug!(path = %route.path(), "Protected route without a session");
            self.out.navigate(Route::SignIn).await;
            return;
        }

        match route {
            Route::Chat(chat_id) => self.chat.open_conversation(chat_id).await,
            Route::NewChat => {
                if self.chat.chat_id().is_some() {
                    self.chat.new_conversation().await;
                }
            }
            Route::Documents => self.documents.fetch_documents(true).await,
            Route::SignIn => {}
        }
    }

    /// Stop background work
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        tracing::info!("Shutting down client core");
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }
        self.session.dispose();
        Ok(())
    }
}

impl Conductor<HttpGateway, GoTrueAuth> {
    /// Create a Conductor talking HTTP to the configured gateway and auth provider
    pub fn from_config(
        config: ClientConfig,
        tx: mpsc::Sender<SurfaceMessage>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let gateway = HttpGateway::from_config(&config)?;
        let auth = GoTrueAuth::from_config(&config)?;
        Ok(Self::new(Arc::new(gateway), Arc::new(auth), config, tx))
    }
}
