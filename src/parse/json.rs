//! JSON recovery for model responses.
//!
//! Strategy order:
//! 1) the full trimmed text as strict JSON;
//! 2) the body of a ```json fenced block, then of any fenced block;
//! 3) the span between the first `{` and the last `}` (or `[` / `]`);
//! 4) each of the above candidates again after quote normalization.
//!
//! The heuristic normalizer only runs once every strict attempt failed.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::quoting;
use crate::error::PipelineError;

/// Recover a JSON value from raw model text.
pub fn recover_value(raw: &str) -> Result<Value, PipelineError> {
    let candidates = candidates(raw);

    let mut last_error = String::from("empty response");
    for candidate in &candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    for candidate in &candidates {
        let normalized = quoting::normalize(candidate);
        if let Ok(value) = serde_json::from_str::<Value>(&normalized) {
            debug!("Recovered JSON after quote normalization");
            return Ok(value);
        }
        let normalized = quoting::single_to_double(candidate);
        if let Ok(value) = serde_json::from_str::<Value>(&normalized) {
            debug!("Recovered JSON after basic quote normalization");
            return Ok(value);
        }
    }

    Err(PipelineError::MalformedLlmOutput {
        message: last_error,
        raw: raw.to_string(),
    })
}

/// Recover and deserialize into `T`.
///
/// Text that cannot be turned into JSON at all yields `MalformedLlmOutput`;
/// JSON of the wrong shape yields `SchemaValidation`. Both keep the raw text.
pub fn parse_as<T: DeserializeOwned>(raw: &str) -> Result<T, PipelineError> {
    let value = recover_value(raw)?;
    serde_json::from_value(value).map_err(|e| PipelineError::SchemaValidation {
        message: e.to_string(),
        raw: raw.to_string(),
    })
}

fn candidates(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let mut out = vec![trimmed.to_string()];

    if let Some(block) = extract_fenced_block(trimmed, Some("json")) {
        out.push(block);
    }
    if let Some(block) = extract_fenced_block(trimmed, None) {
        out.push(block);
    }
    if let Some(span) = extract_span(trimmed, '{', '}') {
        out.push(span);
    }
    if let Some(span) = extract_span(trimmed, '[', ']') {
        out.push(span);
    }

    out.dedup();
    out
}

/// Text between the first `open` and the last `close`, inclusive.
pub fn extract_span(text: &str, open: char, close: char) -> Option<String> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].to_string())
}

fn extract_fenced_block(content: &str, language: Option<&str>) -> Option<String> {
    let fence = "```";
    let mut search = content;

    loop {
        let start = search.find(fence)?;
        let after_start = &search[start + fence.len()..];

        let line_end = after_start.find('\n')?;
        let tag = after_start[..line_end].trim();
        let rest = &after_start[line_end + 1..];

        if let Some(expected) = language {
            if !tag.eq_ignore_ascii_case(expected) {
                search = after_start;
                continue;
            }
        }

        let end = rest.find(fence)?;
        return Some(rest[..end].trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Plan {
        version: String,
    }

    #[test]
    fn test_strict_json() {
        let value = recover_value(r#" {"version": "1"} "#).unwrap();
        assert_eq!(value["version"], "1");
    }

    #[test]
    fn test_fenced_json() {
        let raw = "Here you go:\n```json\n{\"version\": \"2\"}\n```\nDone.";
        let plan: Plan = parse_as(raw).unwrap();
        assert_eq!(plan.version, "2");
    }

    #[test]
    fn test_brace_span() {
        let raw = "The plan is {\"version\": \"3\"} as requested";
        let plan: Plan = parse_as(raw).unwrap();
        assert_eq!(plan.version, "3");
    }

    #[test]
    fn test_python_list_literal() {
        let value = recover_value("['Auth Service', 'Catalog Service']").unwrap();
        assert_eq!(value[1], "Catalog Service");
    }

    #[test]
    fn test_python_dict_with_content() {
        let raw = r#"{'path': 'A.java', 'content': 'String s = "x";'}"#;
        let value = recover_value(raw).unwrap();
        assert_eq!(value["content"], "String s = \"x\";");
    }

    #[test]
    fn test_malformed_keeps_raw() {
        let err = recover_value("no json here").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedLlmOutput { .. }));
        assert_eq!(err.raw_output(), Some("no json here"));
    }

    #[test]
    fn test_wrong_shape_is_schema_error() {
        let err = parse_as::<Plan>(r#"{"other": 1}"#).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaValidation { .. }));
        assert_eq!(err.raw_output(), Some(r#"{"other": 1}"#));
    }
}
