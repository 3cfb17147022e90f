//! External Auth Provider Integration
//!
//! [`AuthProvider`] abstracts the hosted auth service (password sign-in,
//! sign-up, sign-out, refresh, session-changed notifications).
//! [`GoTrueAuth`] implements it against a GoTrue-compatible REST API.

mod gotrue;
mod traits;

pub use gotrue::GoTrueAuth;
pub use traits::{
    AppMetadata, AuthEvent, AuthEventKind, AuthProvider, AuthSession, AuthUser, Credentials,
    SignUpOutcome, SignUpParams, UserMetadata,
};
