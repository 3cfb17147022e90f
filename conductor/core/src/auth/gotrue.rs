//! GoTrue Auth Provider
//!
//! [`AuthProvider`] over a GoTrue-compatible REST API:
//!
//! - `POST /auth/v1/token?grant_type=password` - password sign-in
//! - `POST /auth/v1/token?grant_type=refresh_token` - refresh
//! - `POST /auth/v1/signup` - account creation
//! - `POST /auth/v1/logout` - remote invalidation
//!
//! The session is held in memory only; persisting it is the embedding
//! surface's concern.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::broadcast;

use super::traits::{
    AuthEvent, AuthEventKind, AuthProvider, AuthSession, AuthUser, Credentials, SignUpOutcome,
    SignUpParams,
};
use crate::config::ClientConfig;
use crate::error::AuthError;

/// Refresh when the token expires within this many seconds
const REFRESH_MARGIN_SECS: i64 = 30;

/// Capacity of the event broadcast channel
const EVENT_CAPACITY: usize = 32;

/// GoTrue REST client
pub struct GoTrueAuth {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> AuthSession {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(TokenResponse),
    User(AuthUser),
}

impl GoTrueAuth {
    /// Create a client for the given base URL and public API key
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, http_client: reqwest::Client) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http_client,
            session: RwLock::new(None),
            events,
        }
    }

    /// Create from client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(
            config.auth_url.clone(),
            config.auth_api_key.clone(),
            builder.build()?,
        ))
    }

    /// Seed a previously persisted session (no event is broadcast)
    pub fn restore(&self, session: AuthSession) {
        *self.session.write() = Some(session);
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url.trim_end_matches('/'), path)
    }

    fn emit(&self, kind: AuthEventKind, session: Option<AuthSession>) {
        // No subscribers is fine
        let _ = self.events.send(AuthEvent::new(kind, session));
    }

    async fn post_json(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, AuthError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .header("apikey", &self.api_key)
            .json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if (200..300).contains(&status) {
            Ok(bytes.to_vec())
        } else {
            Err(AuthError::Provider {
                status,
                message: provider_message(&bytes),
            })
        }
    }

    async fn request_token(
        &self,
        grant_type: &str,
        body: &serde_json::Value,
    ) -> Result<AuthSession, AuthError> {
        let bytes = self
            .post_json(&format!("/token?grant_type={grant_type}"), None, body)
            .await?;
        let token: TokenResponse = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        Ok(token.into_session(now_secs()))
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn get_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let current = self.session.read().clone();
        match current {
            Some(session)
                if session.refresh_token.is_some()
                    && session.expires_within(now_secs(), REFRESH_MARGIN_SECS) =>
            {
                tracing::debug!(user_id = %session.user.id, "Session near expiry, refreshing");
                self.refresh_session().await.map(Some)
            }
            other => Ok(other),
        }
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthSession, AuthError> {
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
        });
        let session = self.request_token("password", &body).await?;

        *self.session.write() = Some(session.clone());
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.emit(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, params: &SignUpParams) -> Result<SignUpOutcome, AuthError> {
        let mut body = serde_json::json!({
            "email": params.credentials.email,
            "password": params.credentials.password,
        });
        if let Some(ref name) = params.name {
            body["data"] = serde_json::json!({ "name": name, "full_name": name });
        }

        let bytes = self.post_json("/signup", None, &body).await?;
        let parsed: SignUpBody = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        match parsed {
            SignUpBody::Session(token) => {
                let session = token.into_session(now_secs());
                *self.session.write() = Some(session.clone());
                self.emit(AuthEventKind::SignedIn, Some(session.clone()));
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpBody::User(user) => Ok(SignUpOutcome::ConfirmationRequired {
                user_id: user.id,
                email: user.email,
            }),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.session.write().take();
        let result = match previous {
            Some(ref session) => self
                .post_json("/logout", Some(&session.access_token), &serde_json::json!({}))
                .await
                .map(|_| ()),
            None => Ok(()),
        };

        if let Err(ref e) = result {
            tracing::warn!(error = %e, "Remote sign-out failed; local session cleared anyway");
        }
        self.emit(AuthEventKind::SignedOut, None);
        result
    }

    async fn refresh_session(&self) -> Result<AuthSession, AuthError> {
        let refresh_token = self
            .session
            .read()
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or(AuthError::NoSession)?;

        let body = serde_json::json!({ "refresh_token": refresh_token });
        let session = self.request_token("refresh_token", &body).await?;

        *self.session.write() = Some(session.clone());
        self.emit(AuthEventKind::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Extract the most specific message from a provider error body
fn provider_message(body: &[u8]) -> String {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            let raw = String::from_utf8_lossy(body).trim().to_string();
            return if raw.is_empty() {
                "Authentication failed".to_string()
            } else {
                raw
            };
        }
    };

    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .unwrap_or("Authentication failed")
        .to_string()
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message_precedence() {
        let body = br#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(provider_message(body), "Invalid login credentials");
        assert_eq!(provider_message(br#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(provider_message(b""), "Authentication failed");
        assert_eq!(provider_message(b"gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_token_response_expiry_from_expires_in() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"user":{"id":"u1"}}"#,
        )
        .unwrap();
        let session = token.into_session(1_000);
        assert_eq!(session.expires_at, Some(4_600));
        assert_eq!(session.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn test_signup_body_variants() {
        let pending: SignUpBody =
            serde_json::from_str(r#"{"id":"u2","email":"new@example.com","confirmation_sent_at":"t"}"#)
                .unwrap();
        assert!(matches!(pending, SignUpBody::User(ref u) if u.id == "u2"));

        let signed_in: SignUpBody =
            serde_json::from_str(r#"{"access_token":"a","user":{"id":"u3"}}"#).unwrap();
        assert!(matches!(signed_in, SignUpBody::Session(_)));
    }

    #[test]
    fn test_url() {
        let auth = GoTrueAuth::new("https://auth.example.com/", "anon", reqwest::Client::new());
        assert_eq!(auth.url("/signup"), "https://auth.example.com/auth/v1/signup");
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let auth = GoTrueAuth::new("http://127.0.0.1:9", "anon", reqwest::Client::new());
        assert_eq!(auth.refresh_session().await, Err(AuthError::NoSession));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_still_emits() {
        let auth = GoTrueAuth::new("http://127.0.0.1:9", "anon", reqwest::Client::new());
        let mut rx = auth.subscribe();
        assert!(auth.sign_out().await.is_ok());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedOut);
        assert!(event.session.is_none());
    }
}
