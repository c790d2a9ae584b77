//! Typed values passed between pipeline stages.
//!
//! Each stage parses the model reply it receives into the variant it
//! expects as soon as it arrives, so an unparsed reply never travels
//! further than one stage boundary. Code documents cross their boundary as
//! [`super::CodeDocument`] and are parsed by the materializer.

use crate::domain::{ArchitectureDocument, ProjectTree};
use crate::error::PipelineError;
use crate::parse::{parse_as, recover_value};
use crate::workspace::UpdatePlan;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineArtifact {
    ParsedArchitecture(ArchitectureDocument),
    ParsedTree(ProjectTree),
    UpdatePlan(UpdatePlan),
}

impl PipelineArtifact {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineArtifact::ParsedArchitecture(_) => "architecture",
            PipelineArtifact::ParsedTree(_) => "project_tree",
            PipelineArtifact::UpdatePlan(_) => "update_plan",
        }
    }

    pub fn architecture(raw: &str) -> Result<Self, PipelineError> {
        parse_as::<ArchitectureDocument>(raw).map(PipelineArtifact::ParsedArchitecture)
    }

    pub fn tree(raw: &str) -> Result<Self, PipelineError> {
        parse_as::<ProjectTree>(raw).map(PipelineArtifact::ParsedTree)
    }

    /// Model replies are recovered leniently before the structural check.
    pub fn update_plan(raw: &str) -> Result<Self, PipelineError> {
        let value = recover_value(raw)?;
        UpdatePlan::from_value(value).map(PipelineArtifact::UpdatePlan)
    }

    pub fn into_architecture(self) -> Result<ArchitectureDocument, PipelineError> {
        match self {
            PipelineArtifact::ParsedArchitecture(document) => Ok(document),
            other => Err(other.mismatch("architecture")),
        }
    }

    pub fn into_tree(self) -> Result<ProjectTree, PipelineError> {
        match self {
            PipelineArtifact::ParsedTree(tree) => Ok(tree),
            other => Err(other.mismatch("project_tree")),
        }
    }

    pub fn into_update_plan(self) -> Result<UpdatePlan, PipelineError> {
        match self {
            PipelineArtifact::UpdatePlan(plan) => Ok(plan),
            other => Err(other.mismatch("update_plan")),
        }
    }

    fn mismatch(&self, expected: &str) -> PipelineError {
        PipelineError::SchemaValidation {
            message: format!("expected {} artifact, got {}", expected, self.kind()),
            raw: String::new(),
        }
    }
}
