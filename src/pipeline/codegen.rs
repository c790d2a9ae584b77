//! Fan-out code generation: one file-section document per microservice.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::prompts::{fill, GENERATE_MICROSERVICE_CODE};
use crate::api::LanguageModel;
use crate::domain::Microservice;
use crate::error::PipelineError;

/// Generated document for one microservice.
///
/// A failed generation keeps its slot with empty `text` and the error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodeDocument {
    pub microservice: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CodeDocument {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn failed(microservice: &str, error: String) -> Self {
        Self {
            microservice: microservice.to_string(),
            text: String::new(),
            error: Some(error),
        }
    }
}

pub fn code_prompt(microservice: &Microservice) -> String {
    let rendered = serde_json::to_string_pretty(microservice)
        .unwrap_or_else(|_| microservice.name.clone());
    fill(GENERATE_MICROSERVICE_CODE, &[("microservice", &rendered)])
}

async fn generate_one(model: &dyn LanguageModel, microservice: &Microservice) -> Result<String, PipelineError> {
    debug!("Generating code for {}", microservice.name);
    model.complete(&code_prompt(microservice)).await
}

/// Generate code for every microservice with at most `workers` requests in
/// flight.
///
/// Always returns exactly `microservices.len()` documents, in input order,
/// whatever order the requests complete in.
pub async fn generate_all(
    model: &dyn LanguageModel,
    microservices: &[Microservice],
    workers: usize,
) -> Vec<CodeDocument> {
    let expected = microservices.len();
    info!("⚙️  Generating code for {} microservices ({} workers)", expected, workers.max(1));

    let results: Vec<(usize, Result<String, PipelineError>)> = stream::iter(microservices.iter().enumerate())
        .map(|(index, ms)| async move { (index, generate_one(model, ms).await) })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut slots: Vec<Option<CodeDocument>> = (0..expected).map(|_| None).collect();
    for (index, result) in results {
        let name = &microservices[index].name;
        let doc = match result {
            Ok(text) => CodeDocument {
                microservice: name.clone(),
                text,
                error: None,
            },
            Err(e) => {
                warn!("Code generation failed for {}: {}", name, e);
                CodeDocument::failed(name, e.to_string())
            }
        };
        slots[index] = Some(doc);
    }

    let docs: Vec<CodeDocument> = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                CodeDocument::failed(&microservices[index].name, "no result".to_string())
            })
        })
        .collect();

    let empty = docs.iter().filter(|d| d.is_empty()).count();
    if empty > 0 {
        warn!("{} of {} code documents are empty", empty, expected);
    }
    docs
}
