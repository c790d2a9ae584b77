//! Request and response types for the model and retriever endpoints.
//!
//! The chat types follow the OpenAI-compatible `chat/completions` wire
//! format, which most hosted and local model servers accept.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ============================================================================
// Chat Completion Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// `response_format` for schema-constrained completions.
#[derive(Debug, Clone, Serialize)]
pub(super) struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Debug, Clone, Serialize)]
pub(super) struct JsonSchemaFormat {
    pub name: String,
    pub schema: serde_json::Value,
    pub strict: bool,
}

impl ResponseFormat {
    pub fn json_schema(name: &str, schema: serde_json::Value) -> Self {
        Self {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: name.to_string(),
                schema,
                strict: false,
            },
        }
    }
}

/// Chat completion request body
#[derive(Debug, Serialize)]
pub(super) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatChoiceMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice.
    pub fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
    }
}

// ============================================================================
// Retriever Types
// ============================================================================

/// One retrieved chunk with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNode {
    pub text: String,
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub(super) struct RetrievalRequest<'a> {
    pub query: &'a str,
    pub top_k: usize,
}

/// Retriever servers answer either `{"nodes": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RetrievalResponse {
    Wrapped { nodes: Vec<ScoredNode> },
    Bare(Vec<ScoredNode>),
}

impl RetrievalResponse {
    pub fn into_nodes(self) -> Vec<ScoredNode> {
        match self {
            RetrievalResponse::Wrapped { nodes } => nodes,
            RetrievalResponse::Bare(nodes) => nodes,
        }
    }
}

// ============================================================================
// API Status Codes
// ============================================================================

/// Coarse status derived from the HTTP status of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    /// Success
    Ok,
    /// Request was cancelled (client closed connection) - retryable
    Cancelled,
    /// Unknown error
    Unknown,
    /// Service unavailable - retryable
    Unavailable,
    /// Endpoint or model not found
    NotFound,
    /// Invalid request arguments
    InvalidArgument,
    /// Rate limit exceeded - retryable
    ResourceExhausted,
    /// Missing or rejected API key - FATAL
    Unauthenticated,
    /// Key lacks access to the model - FATAL
    PermissionDenied,
    /// Request timeout - retryable
    DeadlineExceeded,
    /// Prompt too large for the model
    TooLarge,
}

impl ApiStatus {
    /// Convert from HTTP status code to internal API status
    pub fn from_http_status(http_status: u16) -> Self {
        match http_status {
            200..=299 => ApiStatus::Ok,
            400 => ApiStatus::InvalidArgument,
            401 => ApiStatus::Unauthenticated,
            403 => ApiStatus::PermissionDenied,
            404 => ApiStatus::NotFound,
            408 | 504 => ApiStatus::DeadlineExceeded,
            413 => ApiStatus::TooLarge,
            429 => ApiStatus::ResourceExhausted,
            499 => ApiStatus::Cancelled,
            500..=599 => ApiStatus::Unavailable,
            _ => ApiStatus::Unknown,
        }
    }

    /// Check if this error is fatal (requires user action, cannot continue)
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiStatus::Unauthenticated | ApiStatus::PermissionDenied)
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiStatus::Cancelled
                | ApiStatus::Unavailable
                | ApiStatus::ResourceExhausted
                | ApiStatus::DeadlineExceeded
        )
    }

    /// Get the error message for this status
    pub fn error_message(&self) -> &'static str {
        match self {
            ApiStatus::Ok => "Success",
            ApiStatus::Cancelled => "Request was cancelled",
            ApiStatus::Unknown => "Unknown error occurred",
            ApiStatus::Unavailable => "Service temporarily unavailable",
            ApiStatus::NotFound => "Endpoint or model not found",
            ApiStatus::InvalidArgument => "Invalid request",
            ApiStatus::ResourceExhausted => "Rate limit exceeded. Please wait and try again",
            ApiStatus::Unauthenticated => {
                "Authentication failed. Set ARCHGEN_API_KEY or OPENAI_API_KEY"
            }
            ApiStatus::PermissionDenied => "The API key does not have access to this model",
            ApiStatus::DeadlineExceeded => "Request timed out",
            ApiStatus::TooLarge => "Request body too large",
        }
    }
}

impl std::fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error_message())
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// API error with status code and details.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: ApiStatus,
    pub http_status: u16,
    pub message: String,
    /// Request ID (for debugging)
    pub request_id: Option<String>,
}

impl ApiError {
    /// Create from HTTP status code and response body
    pub fn from_http_response(http_status: u16, body: String, request_id: Option<String>) -> Self {
        let status = ApiStatus::from_http_status(http_status);

        let message = match status {
            ApiStatus::Unauthenticated | ApiStatus::PermissionDenied => {
                format!("{} (HTTP {})", status.error_message(), http_status)
            }
            ApiStatus::ResourceExhausted => {
                format!(
                    "Rate limit exceeded (HTTP {}). Please wait and try again.",
                    http_status
                )
            }
            _ => {
                if body.trim().is_empty() {
                    format!(
                        "API error (HTTP {}): {}",
                        http_status,
                        status.error_message()
                    )
                } else {
                    format!("API error (HTTP {}): {}", http_status, body.trim())
                }
            }
        };

        Self {
            status,
            http_status,
            message,
            request_id,
        }
    }

    /// Check if this error is fatal (requires user action)
    pub fn is_fatal(&self) -> bool {
        self.status.is_fatal()
    }

    pub fn into_llm_error(self) -> PipelineError {
        PipelineError::Llm {
            retryable: self.status.is_retryable(),
            message: self.message,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiStatus::from_http_status(401), ApiStatus::Unauthenticated);
        assert_eq!(ApiStatus::from_http_status(429), ApiStatus::ResourceExhausted);
        assert_eq!(ApiStatus::from_http_status(502), ApiStatus::Unavailable);
        assert_eq!(ApiStatus::from_http_status(504), ApiStatus::DeadlineExceeded);
        assert!(ApiStatus::Unauthenticated.is_fatal());
        assert!(ApiStatus::Unavailable.is_retryable());
        assert!(!ApiStatus::InvalidArgument.is_retryable());
    }

    #[test]
    fn test_api_error_to_pipeline_error() {
        let err = ApiError::from_http_response(503, "overloaded".to_string(), None);
        assert_eq!(err.message, "API error (HTTP 503): overloaded");
        assert!(err.into_llm_error().is_retryable());

        let err = ApiError::from_http_response(401, String::new(), None);
        assert!(err.is_fatal());
        assert!(!err.into_llm_error().is_retryable());
    }

    #[test]
    fn test_chat_response_text() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"id": "x", "choices": [{"message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("hi"));

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(empty.into_text().is_none());
    }

    #[test]
    fn test_retrieval_response_shapes() {
        let wrapped: RetrievalResponse =
            serde_json::from_str(r#"{"nodes": [{"text": "US 1", "score": 0.9}]}"#).unwrap();
        assert_eq!(wrapped.into_nodes()[0].text, "US 1");

        let bare: RetrievalResponse = serde_json::from_str(r#"[{"text": "US 2"}]"#).unwrap();
        assert_eq!(bare.into_nodes()[0].score, 0.0);
    }
}
