//! Error Types
//!
//! Typed errors for the two external collaborators (API gateway and auth
//! provider) plus the classification used to decide how a failure is shown.
//!
//! Transport failures carry status `0` so every gateway failure can be
//! reasoned about as "an HTTP status plus a detail message".

use serde::Deserialize;
use thiserror::Error;

/// Status used for failures that never produced an HTTP response
pub const TRANSPORT_STATUS: u16 = 0;

/// Error returned by the API gateway
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("gateway request failed: status={status}: {detail}")]
pub struct ApiError {
    /// HTTP status code (0 = transport failure)
    pub status: u16,
    /// Detail message extracted from the error envelope
    pub detail: String,
}

/// How a gateway failure should be treated by callers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// No HTTP response at all
    Transport,
    /// 401 or 403
    Unauthorized,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// 429
    RateLimited,
    /// 5xx
    Server,
    /// Any other 4xx (or unexpected status)
    Client,
}

impl ApiError {
    /// Create an error with an explicit status
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Create a transport failure (status 0)
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(TRANSPORT_STATUS, detail)
    }

    /// Build an error from a non-success response body
    ///
    /// Understands the `{detail: string | [{msg, ..}]}` envelope; anything else
    /// falls back to the raw body (or the status reason when the body is empty).
    pub fn from_response_body(status: u16, body: &[u8]) -> Self {
        let detail = match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope.detail.into_message(),
            Err(_) => {
                let raw = String::from_utf8_lossy(body).trim().to_string();
                if raw.is_empty() {
                    default_reason(status).to_string()
                } else {
                    raw
                }
            }
        };
        Self::new(status, detail)
    }

    /// Classify the error
    #[must_use]
    pub fn kind(&self) -> ApiErrorKind {
        match self.status {
            TRANSPORT_STATUS => ApiErrorKind::Transport,
            401 | 403 => ApiErrorKind::Unauthorized,
            404 => ApiErrorKind::NotFound,
            409 => ApiErrorKind::Conflict,
            429 => ApiErrorKind::RateLimited,
            500..=599 => ApiErrorKind::Server,
            _ => ApiErrorKind::Client,
        }
    }

    /// Whether the error means the session is no longer valid
    #[must_use]
    pub fn is_auth(&self) -> bool {
        self.kind() == ApiErrorKind::Unauthorized
    }

    /// Human-readable reason suitable for a notification or inline message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind() {
            ApiErrorKind::Transport => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            ApiErrorKind::Unauthorized => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ApiErrorKind::NotFound => "The requested item could not be found.".to_string(),
            ApiErrorKind::Conflict => format!("Conflict: {}", self.detail),
            ApiErrorKind::RateLimited => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            ApiErrorKind::Server => {
                "The server encountered an error. Please try again later.".to_string()
            }
            ApiErrorKind::Client => self.detail.clone(),
        }
    }
}

fn default_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Request failed")
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    detail: ErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Items(Vec<ErrorItem>),
}

#[derive(Deserialize)]
struct ErrorItem {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    loc: Vec<serde_json::Value>,
}

impl ErrorDetail {
    fn into_message(self) -> String {
        match self {
            Self::Message(message) => message,
            Self::Items(items) => items
                .into_iter()
                .filter_map(|item| {
                    let msg = item.msg?;
                    let field = item
                        .loc
                        .last()
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_string);
                    Some(match field {
                        Some(field) => format!("{field}: {msg}"),
                        None => msg,
                    })
                })
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Error returned by the external auth provider
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Provider rejected the request
    #[error("{message}")]
    Provider {
        /// HTTP status from the provider
        status: u16,
        /// Provider-specific message
        message: String,
    },
    /// Provider could not be reached
    #[error("auth provider unavailable: {0}")]
    Transport(String),
    /// Operation needs a session and there is none
    #[error("no active session")]
    NoSession,
    /// Provider answered with something unexpected
    #[error("auth provider response invalid: {0}")]
    InvalidResponse(String),
}
