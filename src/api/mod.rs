//! Model and retriever clients.
//!
//! Pipeline stages depend only on the [`LanguageModel`] and [`Retriever`]
//! traits; the HTTP implementations live in `client` and `retrieval`.

mod client;
mod http;
mod retrieval;
mod types;

pub use client::ChatClient;
pub use http::MAX_RETRIES;
pub use retrieval::{HttpRetriever, Retriever};
pub use types::{ApiError, ApiStatus, ChatMessage, ScoredNode};

use async_trait::async_trait;
use schemars::JsonSchema;
use tracing::debug;

use crate::error::PipelineError;

/// Text-in, text-out model capability.
///
/// Completions may be malformed JSON even when JSON was requested; callers
/// run them through [`crate::parse`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, PipelineError>;

    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, PipelineError> {
        self.complete(&format!("{}\n\n{}", system, prompt)).await
    }

    /// Completion constrained by a JSON schema, when the backend supports it.
    async fn complete_json(
        &self,
        prompt: &str,
        _schema_name: &str,
        _schema: serde_json::Value,
    ) -> Result<String, PipelineError> {
        self.complete(prompt).await
    }
}

/// Schema-constrained completion for `T`.
///
/// Returns the raw reply; the calling stage parses it into its artifact so
/// the raw text stays available for audit when parsing fails.
pub async fn complete_structured<T>(
    model: &dyn LanguageModel,
    prompt: &str,
    schema_name: &str,
) -> Result<String, PipelineError>
where
    T: JsonSchema,
{
    let schema = serde_json::to_value(schemars::schema_for!(T)).map_err(|e| PipelineError::Llm {
        message: format!("Failed to render schema {}: {}", schema_name, e),
        retryable: false,
    })?;

    let raw = model.complete_json(prompt, schema_name, schema).await?;
    debug!("Structured completion ({}): {} chars", schema_name, raw.len());
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl LanguageModel for Canned {
        async fn complete(&self, _prompt: &str) -> Result<String, PipelineError> {
            Ok(self.0.to_string())
        }
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Answer {
        value: u32,
    }

    #[tokio::test]
    async fn test_complete_structured_sends_schema() {
        struct SchemaEcho;

        #[async_trait]
        impl LanguageModel for SchemaEcho {
            async fn complete(&self, _prompt: &str) -> Result<String, PipelineError> {
                Ok(String::new())
            }

            async fn complete_json(
                &self,
                _prompt: &str,
                schema_name: &str,
                schema: serde_json::Value,
            ) -> Result<String, PipelineError> {
                Ok(format!("{} {}", schema_name, schema["properties"]["value"]["type"]))
            }
        }

        let raw = complete_structured::<Answer>(&SchemaEcho, "q", "answer").await.unwrap();
        assert_eq!(raw, r#"answer "integer""#);
    }

    #[tokio::test]
    async fn test_complete_structured_falls_back_to_plain_completion() {
        let raw = complete_structured::<Answer>(&Canned("{\"value\": 7}"), "q", "answer")
            .await
            .unwrap();
        assert_eq!(raw, r#"{"value": 7}"#);
    }

    #[tokio::test]
    async fn test_default_system_prompt_is_prepended() {
        struct Echo;

        #[async_trait]
        impl LanguageModel for Echo {
            async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
                Ok(prompt.to_string())
            }
        }

        let out = Echo.complete_with_system("sys", "user").await.unwrap();
        assert_eq!(out, "sys\n\nuser");
    }
}
