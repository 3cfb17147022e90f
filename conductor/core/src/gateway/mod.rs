//! API Gateway Integration
//!
//! All business logic (query answering, chat persistence, document ingestion)
//! lives behind the remote API gateway. This module provides the [`Gateway`]
//! trait the controllers depend on and [`HttpGateway`], its reqwest
//! implementation.
//!
//! # Usage
//!
//! ```ignore
//! use ragdesk_core::gateway::{Gateway, HttpGateway, QueryRequest};
//!
//! let gateway = HttpGateway::from_config(&config)?;
//! let reply = gateway.query(Some(token), &QueryRequest::new("What is our refund policy?", None)).await?;
//! ```

mod http;
mod traits;
mod types;

pub use http::HttpGateway;
pub use traits::{paths, Gateway};
pub use types::{EnsureCompanyResponse, IngestResponse, QueryRequest, QueryResponse, UploadRequest};
