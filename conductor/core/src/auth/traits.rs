//! Auth Provider Trait
//!
//! The external auth provider owns credentials, tokens and their storage.
//! The core only asks it to sign in, sign up, sign out and refresh, and
//! listens to the session-changed notifications it broadcasts.
//!
//! # Event Contract
//!
//! Implementations broadcast an [`AuthEvent`] after every successful state
//! change: `SignedIn` after password sign-in (or a sign-up that returns a
//! session), `TokenRefreshed` after a refresh and `SignedOut` after sign-out.
//! Sign-out clears the local session and broadcasts even when the remote
//! invalidation fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::AuthError;

/// Session object issued by the auth provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Bearer token for the gateway
    pub access_token: String,
    /// Token used to obtain a new access token
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as a Unix timestamp (seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// The signed-in user
    pub user: AuthUser,
}

impl AuthSession {
    /// Whether the access token expires within `margin_secs`
    #[must_use]
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now + margin_secs)
    }
}

/// User as reported by the auth provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Provider user id
    pub id: String,
    /// Primary email
    #[serde(default)]
    pub email: Option<String>,
    /// Claims managed by the backend (company, roles)
    #[serde(default)]
    pub app_metadata: AppMetadata,
    /// Claims managed by the user (display name)
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Backend-managed claims
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Company the user belongs to
    #[serde(default)]
    pub company_id: Option<String>,
    /// Application roles
    #[serde(default)]
    pub roles: Vec<String>,
}

/// User-managed claims
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Display name as written by some sign-up forms
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Kind of session-changed notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEventKind {
    /// Session restored at startup
    InitialSession,
    /// User signed in
    SignedIn,
    /// User signed out (or the session was revoked)
    SignedOut,
    /// Access token refreshed; claims may have changed
    TokenRefreshed,
    /// User record changed
    UserUpdated,
}

/// Session-changed notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthEvent {
    /// What happened
    pub kind: AuthEventKind,
    /// Session after the change
    pub session: Option<AuthSession>,
}

impl AuthEvent {
    /// Create an event
    pub fn new(kind: AuthEventKind, session: Option<AuthSession>) -> Self {
        Self { kind, session }
    }
}

/// Email + password credentials
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    /// Email address
    pub email: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Sign-up parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignUpParams {
    /// Email and password for the new account
    pub credentials: Credentials,
    /// Display name stored as user metadata
    pub name: Option<String>,
}

/// Result of a sign-up the caller must branch on
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Account created and signed in immediately
    SignedIn(AuthSession),
    /// Account created; the user must confirm their email first
    ConfirmationRequired {
        /// New user id
        user_id: String,
        /// Address the confirmation was sent to
        email: Option<String>,
    },
}

/// External auth provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session, refreshing it first if it is about to expire
    async fn get_session(&self) -> Result<Option<AuthSession>, AuthError>;

    /// Password sign-in
    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthSession, AuthError>;

    /// Create an account
    async fn sign_up(&self, params: &SignUpParams) -> Result<SignUpOutcome, AuthError>;

    /// Invalidate the session remotely and clear it locally
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Obtain a fresh access token (and updated claims)
    async fn refresh_session(&self) -> Result<AuthSession, AuthError>;

    /// Subscribe to session-changed notifications
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
