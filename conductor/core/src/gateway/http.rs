//! HTTP Gateway Implementation
//!
//! reqwest client for the API gateway. JSON in and out, bearer-token auth,
//! multipart for uploads.
//!
//! Non-success responses are decoded through the `{detail: ..}` envelope into
//! [`ApiError`]; transport failures become status `0`. Idempotent GETs are
//! retried according to the configured [`RetryPolicy`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::traits::{paths, Gateway};
use super::types::{
    ChatListBody, EnsureCompanyResponse, IngestResponse, MessageListBody, QueryRequest,
    QueryResponse, StatusListBody, UploadRequest,
};
use crate::chat::{ChatMessage, ChatSummary};
use crate::config::ClientConfig;
use crate::documents::DocumentStatusRecord;
use crate::error::ApiError;
use crate::messages::{ChatId, DocumentId};
use crate::retry::RetryPolicy;

/// Gateway client over HTTP
#[derive(Clone)]
pub struct HttpGateway {
    /// Base URL (scheme + host + optional prefix)
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
    /// Retry policy for reads
    retry: RetryPolicy,
}

impl HttpGateway {
    /// Create a gateway client
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self {
            base_url: base_url.into(),
            http_client,
            retry,
        }
    }

    /// Create from client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(
            config.gateway_url.clone(),
            builder.build()?,
            config.retry.clone(),
        ))
    }

    /// Full URL for a path
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(request: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and return the body of a 2xx response
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(format!("failed to read response body: {e}")))?;

        if (200..300).contains(&status) {
            Ok(body.to_vec())
        } else {
            Err(ApiError::from_response_body(status, &body))
        }
    }

    /// GET with retry on transient failures
    async fn get(
        &self,
        path: &str,
        token: Option<&str>,
        query: &[(&str, String)],
    ) -> Result<Vec<u8>, ApiError> {
        let mut attempt = 0;
        loop {
            let request = Self::authorize(self.http_client.get(self.url(path)).query(query), token);
            match self.execute(request).await {
                Ok(body) => return Ok(body),
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    let delay = self.retry.backoff_for_attempt(attempt);
                    tracing::warn!(
                        path = path,
                        attempt = attempt + 1,
                        status = err.status,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying gateway read"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T, ApiError> {
        serde_json::from_slice(body).map_err(|e| {
            tracing::error!(path = path, error = %e, "Gateway returned an unreadable body");
            ApiError::new(502, format!("invalid response from {path}: {e}"))
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn query(
        &self,
        token: Option<&str>,
        request: &QueryRequest,
    ) -> Result<QueryResponse, ApiError> {
        let builder = self.http_client.post(self.url(paths::QUERY)).json(request);
        let body = self.execute(Self::authorize(builder, token)).await?;
        Self::decode(paths::QUERY, &body)
    }

    async fn list_chats(&self, token: Option<&str>) -> Result<Vec<ChatSummary>, ApiError> {
        let body = self.get(paths::CHATS, token, &[]).await?;
        Self::decode::<ChatListBody>(paths::CHATS, &body).map(ChatListBody::into_vec)
    }

    async fn chat_messages(
        &self,
        token: Option<&str>,
        chat_id: &ChatId,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let path = paths::chat_messages(chat_id);
        let body = self.get(&path, token, &[]).await?;
        Self::decode::<MessageListBody>(&path, &body).map(MessageListBody::into_vec)
    }

    async fn delete_chat(&self, token: Option<&str>, chat_id: &ChatId) -> Result<(), ApiError> {
        let builder = self.http_client.delete(self.url(&paths::chat(chat_id)));
        self.execute(Self::authorize(builder, token)).await?;
        Ok(())
    }

    async fn ingest(
        &self,
        token: Option<&str>,
        upload: &UploadRequest,
    ) -> Result<IngestResponse, ApiError> {
        let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| ApiError::new(400, format!("invalid content type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let builder = self.http_client.post(self.url(paths::INGEST)).multipart(form);
        let body = self.execute(Self::authorize(builder, token)).await?;
        Self::decode(paths::INGEST, &body)
    }

    async fn list_document_status(
        &self,
        token: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DocumentStatusRecord>, ApiError> {
        let query = [("limit", limit.to_string()), ("offset", offset.to_string())];
        let body = self.get(paths::INGEST_STATUS, token, &query).await?;
        Self::decode::<StatusListBody>(paths::INGEST_STATUS, &body).map(StatusListBody::into_vec)
    }

    async fn document_status(
        &self,
        token: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<DocumentStatusRecord, ApiError> {
        let path = paths::document_status(document_id);
        let body = self.get(&path, token, &[]).await?;
        Self::decode(&path, &body)
    }

    async fn retry_document(
        &self,
        token: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<(), ApiError> {
        let builder = self.http_client.post(self.url(&paths::document_retry(document_id)));
        self.execute(Self::authorize(builder, token)).await?;
        Ok(())
    }

    async fn delete_document(
        &self,
        token: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<(), ApiError> {
        let builder = self.http_client.delete(self.url(&paths::document(document_id)));
        self.execute(Self::authorize(builder, token)).await?;
        Ok(())
    }

    async fn ensure_company(&self, token: Option<&str>) -> Result<EnsureCompanyResponse, ApiError> {
        let builder = self.http_client.post(self.url(paths::ENSURE_COMPANY));
        let body = self.execute(Self::authorize(builder, token)).await?;
        if body.is_empty() {
            return Ok(EnsureCompanyResponse::default());
        }
        Self::decode(paths::ENSURE_COMPANY, &body)
    }
}
