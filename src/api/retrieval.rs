//! Retriever client.
//!
//! The retriever owns the user-story index; this side only sends a query
//! and receives scored text chunks.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use super::http::send_with_retry;
use super::types::{ApiError, RetrievalRequest, RetrievalResponse, ScoredNode};
use crate::config::Settings;
use crate::error::PipelineError;

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredNode>, PipelineError>;
}

/// Retriever reachable over HTTP: `POST {url}` with `{"query", "top_k"}`.
pub struct HttpRetriever {
    client: Client,
    url: String,
    top_k: usize,
    max_retries: usize,
    timeout_secs: u64,
}

impl HttpRetriever {
    pub fn new(url: &str, settings: &Settings) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Retrieval(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            top_k: settings.retriever_top_k,
            max_retries: settings.max_retries,
            timeout_secs: settings.timeout_secs,
        })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredNode>, PipelineError> {
        let request_id = Uuid::new_v4().to_string();
        let body = RetrievalRequest {
            query,
            top_k: self.top_k,
        };

        debug!("=== Retrieval Request ===");
        debug!("URL: {}", self.url);

        let response = send_with_retry(self.max_retries, || {
            self.client
                .post(&self.url)
                .header("Content-Type", "application/json")
                .header("x-request-id", &request_id)
                .json(&body)
        })
        .await
        .map_err(|e| {
            if e.is_timeout() {
                PipelineError::Timeout(self.timeout_secs)
            } else {
                PipelineError::Retrieval(format!("Failed to send request to {}: {}", self.url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let api_error =
                ApiError::from_http_response(status.as_u16(), error_text, Some(request_id));
            error!("Retrieval request failed: {}", api_error.message);
            return Err(PipelineError::Retrieval(api_error.message));
        }

        let parsed: RetrievalResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Failed to parse retrieval response: {}", e)))?;

        let nodes = parsed.into_nodes();
        debug!("Retrieved {} nodes", nodes.len());
        Ok(nodes)
    }
}
