//! ragdesk Core - Headless Client Core for a Knowledge-Base Chat
//!
//! This crate provides the client-side logic of the ragdesk chat and
//! knowledge-base views, independent of any UI framework. It can drive a web
//! view, a terminal UI or run headless for testing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surfaces                              │
//! │     ┌─────────┐      ┌──────────┐      ┌──────────────────────┐   │
//! │     │   Web   │      │ Terminal │      │  Headless / Tests    │   │
//! │     └────┬────┘      └────┬─────┘      └──────────┬───────────┘   │
//! │          └────────────────┴───────────────────────┘               │
//! │                SurfaceEvent (up) / SurfaceMessage (down)          │
//! └───────────────────────────────┼───────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼───────────────────────────────────┐
//! │                         RAGDESK CORE                              │
//! │  ┌────────────────────────────┴────────────────────────────────┐  │
//! │  │                         Conductor                            │  │
//! │  │  ┌──────────┐  ┌──────────────┐  ┌────────────────────────┐ │  │
//! │  │  │ Session  │  │     Chat     │  │   Document Status      │ │  │
//! │  │  │ Manager  │  │  Controller  │  │     Reconciler         │ │  │
//! │  │  └────┬─────┘  └──────┬───────┘  └───────────┬────────────┘ │  │
//! │  └───────┼───────────────┼──────────────────────┼──────────────┘  │
//! └──────────┼───────────────┼──────────────────────┼─────────────────┘
//!            │               └──────────┬───────────┘
//!     ┌──────┴───────┐           ┌──────┴───────┐
//!     │ AuthProvider │           │   Gateway    │
//!     │  (GoTrue)    │           │ (HTTP/JSON)  │
//!     └──────────────┘           └──────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: routes surface events to the controllers
//! - [`SessionManager`]: auth session, derived identity, ensure-company
//! - [`ChatController`]: transcript, query dispatch, sources panel
//! - [`DocumentStatusReconciler`]: paginated ingestion status list
//! - [`SurfaceEvent`] / [`SurfaceMessage`]: the surface protocol
//!
//! # Quick Start
//!
//! ```ignore
//! use ragdesk_core::{config::load_config, config::ConfigOverrides, Conductor, SurfaceEvent};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     ragdesk_core::telemetry::init()?;
//!     let (config, _source) = load_config(&ConfigOverrides::default())?;
//!
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let conductor = Conductor::from_config(config, tx)?;
//!     conductor.start().await?;
//!
//!     conductor
//!         .handle_event(SurfaceEvent::SendMessage { content: "hello".into() })
//!         .await?;
//!
//!     while let Ok(msg) = rx.try_recv() {
//!         // Render message
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod chat;
pub mod conductor;
pub mod config;
pub mod documents;
pub mod error;
pub mod events;
pub mod gateway;
pub mod generation;
pub mod messages;
pub mod retry;
pub mod session;
pub mod telemetry;
pub mod validation;

// Re-exports for convenience
pub use auth::{AuthProvider, GoTrueAuth};
pub use chat::{ChatController, ChatHistory, ChatMessage, RetrievedDoc, SendOutcome};
pub use conductor::Conductor;
pub use config::{ClientConfig, ConfigOverrides};
pub use documents::{DocumentStatus, DocumentStatusReconciler, DocumentStatusRecord, Tracked};
pub use error::{ApiError, ApiErrorKind, AuthError};
pub use events::SurfaceEvent;
pub use gateway::{Gateway, HttpGateway};
pub use messages::{ChatId, DocumentId, NotifyLevel, Route, SurfaceMessage, SurfaceSender, SyncState};
pub use session::{Identity, SessionAccess, SessionManager, SessionState, UserIdentity};
