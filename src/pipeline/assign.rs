//! Architecture assignment stage.

use tracing::{info, warn};

use super::artifact::PipelineArtifact;
use super::prompts::{fill, ASSIGN_ARCHITECTURE};
use crate::api::{complete_structured, LanguageModel};
use crate::domain::{user_story_ids, ArchitectureDocument, Violation};
use crate::error::PipelineError;

/// Everything the assignment prompt is built from.
#[derive(Debug, Clone, Default)]
pub struct AssignInput<'a> {
    pub microservice_list: &'a str,
    pub specs: &'a str,
    pub user_stories: &'a str,
    pub context: &'a str,
}

impl AssignInput<'_> {
    pub fn prompt(&self) -> String {
        fill(
            ASSIGN_ARCHITECTURE,
            &[
                ("context", self.context),
                ("microservice_list", self.microservice_list),
                ("specs", self.specs),
                ("user_stories", self.user_stories),
            ],
        )
    }
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub document: ArchitectureDocument,
    pub raw: String,
    /// Data-quality findings. They never fail the stage.
    pub violations: Vec<Violation>,
}

/// Validate a parsed document, including user-story coverage.
pub fn review(document: &ArchitectureDocument, user_stories: &str) -> Vec<Violation> {
    let mut violations = document.validate();
    violations.extend(
        document
            .uncovered_user_stories(&user_story_ids(user_stories))
            .into_iter()
            .map(|id| Violation::UncoveredUserStory { id }),
    );
    violations
}

/// Ask the model for the Architecture Document.
///
/// Only JSON that cannot be deserialized at all fails the stage.
pub async fn assign_architecture(
    model: &dyn LanguageModel,
    input: &AssignInput<'_>,
) -> Result<Assignment, PipelineError> {
    let raw =
        complete_structured::<ArchitectureDocument>(model, &input.prompt(), "architecture_document")
            .await?;
    let document = PipelineArtifact::architecture(&raw)?.into_architecture()?;

    let violations = review(&document, input.user_stories);
    for violation in &violations {
        warn!("Architecture: {}", violation);
    }

    info!(
        "🏗️  Assigned {} microservices, {} pattern groups, {} datastores",
        document.microservices.len(),
        document.patterns.len(),
        document.datastore.len()
    );

    Ok(Assignment {
        document,
        raw,
        violations,
    })
}
