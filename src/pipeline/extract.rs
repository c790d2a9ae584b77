//! Microservice extraction stage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::prompts::{fill, EXTRACT_MICROSERVICES};
use crate::api::LanguageModel;
use crate::error::PipelineError;
use crate::parse::{extract_span, recover_value};

/// A microservice proposed before patterns and endpoints are assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MicroserviceCandidate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub user_stories: Vec<String>,
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn candidate_from(value: &Value) -> Option<MicroserviceCandidate> {
    match value {
        Value::String(name) if !name.trim().is_empty() => Some(MicroserviceCandidate {
            name: name.trim().to_string(),
            ..Default::default()
        }),
        Value::Object(obj) => {
            let name = obj.get("name").and_then(text_of).filter(|n| !n.is_empty())?;
            let description = obj.get("description").and_then(text_of).unwrap_or_default();
            let user_stories = match obj.get("user_stories") {
                Some(Value::Array(items)) => items.iter().filter_map(text_of).collect(),
                Some(other) => text_of(other).into_iter().collect(),
                None => Vec::new(),
            };
            Some(MicroserviceCandidate {
                name,
                description,
                user_stories,
            })
        }
        _ => None,
    }
}

fn bracketed_list(raw: &str) -> Option<Vec<Value>> {
    match recover_value(&extract_span(raw, '[', ']')?).ok()? {
        Value::Array(items) if !items.is_empty() => Some(items),
        _ => None,
    }
}

/// Parse the extraction reply.
///
/// Accepts a list of objects, a list of bare names, or either wrapped in
/// `{"microservices": [...]}`. Unusable entries are dropped.
pub fn parse_candidates(raw: &str) -> Result<Vec<MicroserviceCandidate>, PipelineError> {
    let shape_error = || PipelineError::SchemaValidation {
        message: "expected a list of microservices".to_string(),
        raw: raw.to_string(),
    };

    let items = match recover_value(raw)? {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("microservices") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(shape_error()),
            // The first-to-last brace span cuts a prose-wrapped list down to
            // its objects; retry on the bracket span before giving up.
            None => match bracketed_list(raw) {
                Some(items) => items,
                None if obj.contains_key("name") => vec![Value::Object(obj)],
                None => return Err(shape_error()),
            },
        },
        _ => return Err(shape_error()),
    };

    let candidates: Vec<_> = items.iter().filter_map(candidate_from).collect();
    if candidates.len() < items.len() {
        debug!("Dropped {} unusable candidate entries", items.len() - candidates.len());
    }
    Ok(candidates)
}

/// Ask the model for the microservice list.
///
/// Returns the candidates together with the raw reply, which later prompts
/// quote verbatim.
pub async fn extract_microservices(
    model: &dyn LanguageModel,
    specs: &str,
    user_stories: &str,
) -> Result<(Vec<MicroserviceCandidate>, String), PipelineError> {
    let prompt = fill(
        EXTRACT_MICROSERVICES,
        &[("specs", specs), ("user_stories", user_stories)],
    );
    let raw = model.complete(&prompt).await?;
    let candidates = parse_candidates(&raw)?;
    info!("🔎 Extracted {} microservice candidates", candidates.len());
    Ok((candidates, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn test_parse_object_list() {
        let raw = r#"[
            {"name": "auth", "description": "logins", "user_stories": ["1", 2]},
            {"name": "orders", "description": "orders", "user_stories": "3"}
        ]"#;
        let candidates = parse_candidates(raw).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].user_stories, vec!["1", "2"]);
        assert_eq!(candidates[1].user_stories, vec!["3"]);
    }

    #[test]
    fn test_parse_bare_names_and_wrapper() {
        let candidates = parse_candidates(r#"{"microservices": ["auth", " ", "orders"]}"#).unwrap();
        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["auth", "orders"]);
    }

    #[test]
    fn test_parse_single_quoted_reply() {
        let raw = "The microservice list is:\n[{'name': 'auth', 'description': \"user's login\", 'user_stories': ['1']}]";
        let candidates = parse_candidates(raw).unwrap();
        assert_eq!(candidates[0].name, "auth");
        assert_eq!(candidates[0].description, "user's login");
    }

    #[test]
    fn test_parse_wrong_shape() {
        let err = parse_candidates(r#"{"services": []}"#).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaValidation { .. }));
        assert!(matches!(
            parse_candidates("no json here").unwrap_err(),
            PipelineError::MalformedLlmOutput { .. }
        ));
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl LanguageModel for Fixed {
        async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
            assert!(prompt.contains("SPECS-TEXT"));
            assert!(prompt.contains("1) As a user"));
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_extract_microservices_fills_prompt() {
        let model = Fixed(r#"[{"name": "auth", "description": "d", "user_stories": ["1"]}]"#);
        let (candidates, raw) = extract_microservices(&model, "SPECS-TEXT", "1) As a user")
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(raw.contains("auth"));
    }
}
