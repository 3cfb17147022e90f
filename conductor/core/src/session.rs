//! Session Manager
//!
//! Tracks the authentication session issued by the external auth provider and
//! derives the user identity the rest of the core works with.
//!
//! # Lifecycle
//!
//! ```text
//! Unknown -> Loading -> Authenticated
//!                    -> PendingCompany -> (ensure company + refresh) -> Authenticated
//!                    -> Unauthenticated
//! ```
//!
//! `init()` subscribes to the provider's event stream *before* asking for the
//! initial session. Events that arrive while that check is outstanding sit in
//! the broadcast buffer and are applied afterwards, so the initial state is
//! always published first.
//!
//! # Ensure Company
//!
//! A signed-in user without a company id is associated with one by the
//! gateway. Every session update for such a user issues the call unless one
//! is already in flight for that user id, so a failed attempt is retried on
//! the next token refresh. On success the provider session is
//! refreshed so the new claims flow back in as a `TokenRefreshed` event.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::{
    AuthEvent, AuthEventKind, AuthProvider, AuthSession, AuthUser, Credentials, SignUpOutcome,
    SignUpParams,
};
use crate::error::AuthError;
use crate::gateway::Gateway;
use crate::messages::{NotifyLevel, Route, SurfaceMessage, SurfaceSender};

/// User id reported for the implicit identity in bypass mode
pub const BYPASS_USER_ID: &str = "bypass-user";

/// User identity derived from an auth session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Provider user id
    pub user_id: String,
    /// Primary email
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Company, absent until the ensure-company step completes
    pub company_id: Option<String>,
    /// Application roles
    pub roles: Vec<String>,
}

impl UserIdentity {
    /// Derive from the provider's user record
    pub fn from_auth_user(user: &AuthUser) -> Self {
        let name = user
            .user_metadata
            .name
            .clone()
            .or_else(|| user.user_metadata.full_name.clone());
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            name,
            company_id: user.app_metadata.company_id.clone(),
            roles: user.app_metadata.roles.clone(),
        }
    }

    /// The implicit identity used when auth is bypassed
    pub fn bypass() -> Self {
        Self {
            user_id: BYPASS_USER_ID.to_string(),
            email: None,
            name: Some("Local User".to_string()),
            company_id: None,
            roles: Vec::new(),
        }
    }

    /// Whether the user holds the admin role
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role == "admin")
    }
}

/// Observable session state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Nothing checked yet
    #[default]
    Unknown,
    /// Initial session check outstanding
    Loading,
    /// Signed in with a company
    Authenticated(UserIdentity),
    /// Signed in, company association not yet complete
    PendingCompany(UserIdentity),
    /// No session
    Unauthenticated,
}

impl SessionState {
    /// The signed-in user, if any
    pub fn user(&self) -> Option<&UserIdentity> {
        match self {
            Self::Authenticated(user) | Self::PendingCompany(user) => Some(user),
            _ => None,
        }
    }

    /// Whether the initial check has finished
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown | Self::Loading)
    }
}

/// What a controller needs to make an authenticated gateway call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Provider user id
    pub user_id: String,
    /// Company id, when associated
    pub company_id: Option<String>,
    /// Bearer token (`None` in bypass mode)
    pub access_token: Option<String>,
    /// Whether auth is bypassed
    pub bypass: bool,
}

impl Identity {
    /// The implicit bypass identity
    pub fn bypass() -> Self {
        Self {
            user_id: BYPASS_USER_ID.to_string(),
            company_id: None,
            access_token: None,
            bypass: true,
        }
    }

    /// Token to send, if any
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Whether the identity can see company-scoped data
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.bypass || self.company_id.is_some()
    }
}

/// Session capability handed to controllers
///
/// Decouples the chat and document controllers from the concrete auth
/// provider and gateway types.
#[async_trait]
pub trait SessionAccess: Send + Sync {
    /// Current identity (`None` when signed out)
    fn identity(&self) -> Option<Identity>;

    /// Force a sign-out after the gateway rejected the token
    async fn expire(&self);
}

/// Session manager
pub struct SessionManager<A: AuthProvider, G: Gateway> {
    auth: Arc<A>,
    gateway: Arc<G>,
    out: SurfaceSender,
    bypass: bool,
    state: watch::Sender<SessionState>,
    current: Mutex<Option<AuthSession>>,
    /// User ids with an ensure-company call in flight
    ensuring: Mutex<HashSet<String>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl<A, G> SessionManager<A, G>
where
    A: AuthProvider + 'static,
    G: Gateway + 'static,
{
    /// Create a manager; call [`init`](Self::init) to start tracking
    pub fn new(auth: Arc<A>, gateway: Arc<G>, out: SurfaceSender, bypass: bool) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            auth,
            gateway,
            out,
            bypass,
            state,
            current: Mutex::new(None),
            ensuring: Mutex::new(HashSet::new()),
            event_task: Mutex::new(None),
        }
    }

    /// Resolve the initial session and start following provider events
    pub async fn init(self: &Arc<Self>) {
        if self.bypass {
            tracing::info!("Auth bypass enabled; using implicit identity");
            self.publish(SessionState::Authenticated(UserIdentity::bypass()))
                .await;
            return;
        }

        self.publish(SessionState::Loading).await;

        // Subscribe first so nothing emitted during the initial check is lost
        let mut events = self.auth.subscribe();

        let initial = match self.auth.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Initial session check failed");
                None
            }
        };
        self.apply_session(initial).await;

        let manager = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => Some(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth events lagged; re-reading session");
                        None
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                match event {
                    Some(event) => manager.handle_auth_event(event).await,
                    None => {
                        let session = manager.auth.get_session().await.ok().flatten();
                        manager.apply_session(session).await;
                    }
                }
            }
            tracing::debug!("Auth event loop stopped");
        });

        if let Some(previous) = self.event_task.lock().replace(handle) {
            previous.abort();
        }
    }

    async fn handle_auth_event(self: &Arc<Self>, event: AuthEvent) {
        tracing::debug!(kind = ?event.kind, has_session = event.session.is_some(), "Auth event");
        match event.kind {
            AuthEventKind::SignedOut => self.apply_session(None).await,
            _ => self.apply_session(event.session).await,
        }
    }

    /// Store a session and publish the derived state
    async fn apply_session(self: &Arc<Self>, session: Option<AuthSession>) {
        let Some(session) = session else {
            *self.current.lock() = None;
            self.publish(SessionState::Unauthenticated).await;
            return;
        };

        let user = UserIdentity::from_auth_user(&session.user);
        let token = session.access_token.clone();
        *self.current.lock() = Some(session);

        if user.company_id.is_some() {
            self.publish(SessionState::Authenticated(user)).await;
            return;
        }

        let user_id = user.user_id.clone();
        self.publish(SessionState::PendingCompany(user)).await;
        self.spawn_ensure_company(user_id, token);
    }

    fn spawn_ensure_company(self: &Arc<Self>, user_id: String, token: String) {
        if !self.ensuring.lock().insert(user_id.clone()) {
            tracing::debug!(user_id = %user_id, "Ensure-company already in flight");
            return;
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.ensure_company(&user_id, &token).await;
            manager.ensuring.lock().remove(&user_id);
        });
    }

    async fn ensure_company(&self, user_id: &str, token: &str) {
        tracing::info!(user_id = %user_id, "Ensuring company association");
        match self.gateway.ensure_company(Some(token)).await {
            Ok(response) => {
                tracing::info!(
                    user_id = %user_id,
                    company_id = ?response.company_id,
                    created = response.created,
                    "Company association ensured"
                );
                if let Err(e) = self.auth.refresh_session().await {
                    tracing::warn!(error = %e, "Session refresh after company setup failed");
                }
            }
            Err(err) if err.is_auth() => {
                tracing::error!(user_id = %user_id, status = err.status, "Authentication error during company setup");
                self.out
                    .notify(
                        NotifyLevel::Error,
                        "Authentication error during company setup. Please sign in again.",
                    )
                    .await;
                self.sign_out().await;
            }
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "Company setup failed");
                self.out
                    .notify(
                        NotifyLevel::Warning,
                        &format!("Could not set up your company: {}", err.user_message()),
                    )
                    .await;
            }
        }
    }

    /// Password sign-in
    ///
    /// Local state is updated by the `SignedIn` event, not here.
    pub async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<(), AuthError> {
        self.auth
            .sign_in_with_password(credentials)
            .await
            .map(|session| {
                tracing::debug!(user_id = %session.user.id, "Password sign-in accepted");
            })
    }

    /// Create an account
    pub async fn sign_up(&self, params: &SignUpParams) -> Result<SignUpOutcome, AuthError> {
        let outcome = self.auth.sign_up(params).await?;
        if let SignUpOutcome::ConfirmationRequired { ref user_id, .. } = outcome {
            tracing::info!(user_id = %user_id, "Sign-up requires email confirmation");
        }
        Ok(outcome)
    }

    /// Sign out
    ///
    /// Local state is cleared before the provider is asked to invalidate the
    /// session and is not restored if that request fails.
    pub async fn sign_out(&self) {
        if self.bypass {
            tracing::debug!("Sign-out ignored in auth bypass mode");
            return;
        }

        *self.current.lock() = None;
        self.publish(SessionState::Unauthenticated).await;

        if let Err(e) = self.auth.sign_out().await {
            tracing::warn!(error = %e, "Remote sign-out failed");
            self.out
                .notify(NotifyLevel::Error, &format!("Sign-out failed: {e}"))
                .await;
        }
        self.out.navigate(Route::SignIn).await;
    }

    /// Subscribe to session state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Stop following provider events
    pub fn dispose(&self) {
        if let Some(handle) = self.event_task.lock().take() {
            handle.abort();
        }
    }

    /// Replace the state, notifying the surface on change
    async fn publish(&self, next: SessionState) {
        let previous = self.state.send_replace(next.clone());
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "Session state changed");
            self.out.send(SurfaceMessage::Session { state: next }).await;
        }
    }
}

#[async_trait]
impl<A, G> SessionAccess for SessionManager<A, G>
where
    A: AuthProvider + 'static,
    G: Gateway + 'static,
{
    fn identity(&self) -> Option<Identity> {
        if self.bypass {
            return Some(Identity::bypass());
        }
        let current = self.current.lock();
        let session = current.as_ref()?;
        Some(Identity {
            user_id: session.user.id.clone(),
            company_id: session.user.app_metadata.company_id.clone(),
            access_token: Some(session.access_token.clone()),
            bypass: false,
        })
    }

    async fn expire(&self) {
        tracing::warn!("Gateway rejected the session token");
        self.out
            .notify(
                NotifyLevel::Warning,
                "Your session has expired. Please sign in again.",
            )
            .await;
        self.sign_out().await;
    }
}

impl<A: AuthProvider, G: Gateway> Drop for SessionManager<A, G> {
    fn drop(&mut self) {
        if let Some(handle) = self.event_task.get_mut().take() {
            handle.abort();
        }
    }
}
