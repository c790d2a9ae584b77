use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use super::http::send_with_retry;
use super::types::{ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat};
use super::LanguageModel;
use crate::config::Settings;
use crate::error::PipelineError;

/// Default CLI version (from Cargo.toml)
const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the User-Agent string
fn build_user_agent() -> String {
    std::env::var("ARCHGEN_USER_AGENT")
        .unwrap_or_else(|_| format!("archgen/{}", DEFAULT_VERSION))
}

/// Join `endpoint` onto `base_url`, keeping any path prefix of the base.
pub(super) fn build_url(base_url: &str, endpoint: &str) -> Result<Url, PipelineError> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base).map_err(|e| PipelineError::Llm {
        message: format!("Invalid base URL {}: {}", base_url, e),
        retryable: false,
    })?;
    base.join(endpoint).map_err(|e| PipelineError::Llm {
        message: format!("Failed to build URL for endpoint {}: {}", endpoint, e),
        retryable: false,
    })
}

/// OpenAI-compatible chat completion client.
pub struct ChatClient {
    client: Client,
    url: Url,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
    timeout_secs: u64,
    max_retries: usize,
    user_agent: String,
    session_id: String,
}

impl ChatClient {
    pub fn new(settings: &Settings) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Llm {
                message: format!("Failed to build HTTP client: {}", e),
                retryable: false,
            })?;

        Ok(Self {
            client,
            url: build_url(&settings.base_url, "chat/completions")?,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            timeout_secs: settings.timeout_secs,
            max_retries: settings.max_retries,
            user_agent: build_user_agent(),
            session_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        response_format: Option<ResponseFormat>,
    ) -> Result<String, PipelineError> {
        let request_id = Uuid::new_v4().to_string();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            response_format,
        };

        debug!("=== Chat Request ===");
        debug!("URL: {}", self.url);
        debug!("Model: {} (request {})", self.model, request_id);

        let response = send_with_retry(self.max_retries, || {
            let mut request = self
                .client
                .post(self.url.clone())
                .header("Content-Type", "application/json")
                .header("User-Agent", &self.user_agent)
                .header("x-request-id", &request_id)
                .header("x-request-session-id", &self.session_id);

            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            request.json(&body)
        })
        .await
        .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!("=== Chat Response ===");
        debug!("Status: {}", status);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let api_error =
                ApiError::from_http_response(status.as_u16(), error_text, Some(request_id));
            if api_error.is_fatal() {
                error!("❌ {}", api_error.message);
            } else {
                error!("Chat request failed: {}", api_error.message);
            }
            return Err(api_error.into_llm_error());
        }

        let response_text = response.text().await.map_err(|e| self.transport_error(e))?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&response_text).map_err(|e| PipelineError::Llm {
                message: format!("Failed to parse chat response: {}", e),
                retryable: false,
            })?;

        if let Some(reason) = parsed.choices.first().and_then(|c| c.finish_reason.as_deref()) {
            debug!("Finish reason: {}", reason);
        }

        parsed.into_text().ok_or_else(|| PipelineError::Llm {
            message: "Chat response contained no message content".to_string(),
            retryable: true,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            PipelineError::Timeout(self.timeout_secs)
        } else {
            PipelineError::Llm {
                retryable: err.is_connect() || err.is_body(),
                message: format!("Failed to send request to {}: {}", self.url, err),
            }
        }
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        self.chat(&[ChatMessage::user(prompt)], None).await
    }

    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, PipelineError> {
        self.chat(&[ChatMessage::system(system), ChatMessage::user(prompt)], None)
            .await
    }

    async fn complete_json(
        &self,
        prompt: &str,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<String, PipelineError> {
        self.chat(
            &[ChatMessage::user(prompt)],
            Some(ResponseFormat::json_schema(schema_name, schema)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user_agent() {
        let ua = build_user_agent();
        assert!(ua.starts_with("archgen/") || std::env::var("ARCHGEN_USER_AGENT").is_ok());
    }

    #[test]
    fn test_build_url_keeps_path_prefix() {
        let url = build_url("https://api.openai.com/v1", "chat/completions").unwrap();
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");

        let url = build_url("http://localhost:11434/v1/", "chat/completions").unwrap();
        assert_eq!(url.as_str(), "http://localhost:11434/v1/chat/completions");

        assert!(build_url("not a url", "chat/completions").is_err());
    }

    #[test]
    fn test_client_from_settings() {
        let settings = Settings {
            model: "gpt-4o-mini".to_string(),
            ..Default::default()
        };
        let client = ChatClient::new(&settings).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.url.as_str(), "https://api.openai.com/v1/chat/completions");
    }
}
