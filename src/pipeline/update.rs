//! Cross-cutting update stages.
//!
//! Each stage snapshots the working project, asks the model for one Update
//! Plan and applies it. Stages run strictly in [`UpdateStage::ALL`] order so
//! every snapshot includes the previous stage's changes.

use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

use super::artifact::PipelineArtifact;
use super::audit::AuditLog;
use super::prompts::{
    fill, UPDATE_COMPOSE, UPDATE_DATASTORE, UPDATE_FRONTEND, UPDATE_PATTERNS, UPDATE_PLAN_SCHEMA,
};
use crate::api::LanguageModel;
use crate::domain::ArchitectureDocument;
use crate::error::PipelineError;
use crate::workspace::{apply, snapshot, ApplySummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStage {
    Patterns,
    Datastore,
    Frontend,
    Compose,
}

impl UpdateStage {
    pub const ALL: [UpdateStage; 4] = [
        UpdateStage::Patterns,
        UpdateStage::Datastore,
        UpdateStage::Frontend,
        UpdateStage::Compose,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UpdateStage::Patterns => "patterns",
            UpdateStage::Datastore => "datastore",
            UpdateStage::Frontend => "frontend",
            UpdateStage::Compose => "compose",
        }
    }

    pub fn prompt(&self, project_documents: &str, architecture: &ArchitectureDocument) -> String {
        let mut slots = vec![
            ("project_documents", project_documents.to_string()),
            ("update_plan_schema", UPDATE_PLAN_SCHEMA.to_string()),
        ];
        let template = match self {
            UpdateStage::Patterns => {
                slots.push(("patterns", to_pretty(&architecture.patterns)));
                UPDATE_PATTERNS
            }
            UpdateStage::Datastore => {
                slots.push(("datastore_spec", to_pretty(&architecture.datastore)));
                UPDATE_DATASTORE
            }
            UpdateStage::Frontend => UPDATE_FRONTEND,
            UpdateStage::Compose => UPDATE_COMPOSE,
        };

        let slots: Vec<(&str, &str)> = slots.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fill(template, &slots)
    }
}

impl std::fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn to_pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: UpdateStage,
    pub summary: ApplySummary,
}

/// Run one stage against `root`.
///
/// A reply that is not a plan is fatal to the stage; the reply and the
/// error are kept in `{stage}.plan.error.txt`. Failing actions are not.
pub async fn run_stage(
    model: &dyn LanguageModel,
    stage: UpdateStage,
    architecture: &ArchitectureDocument,
    root: &Path,
    per_doc_limit: usize,
    audit: &AuditLog,
) -> Result<StageOutcome, PipelineError> {
    let documents = snapshot(root, per_doc_limit);
    info!("🛠️  Stage {}: {} project documents in context", stage, documents.documents.len());

    let prompt = stage.prompt(&documents.render(), architecture);
    let raw = match model.complete(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            error!("❌ Stage {} failed: {}", stage, e);
            audit.stage_failed(stage.name(), "", &e);
            return Err(e);
        }
    };
    audit.stage_plan(stage.name(), &raw);

    let plan = match PipelineArtifact::update_plan(&raw).and_then(PipelineArtifact::into_update_plan) {
        Ok(plan) => plan,
        Err(e) => {
            error!("❌ Stage {} returned an unusable plan: {}", stage, e);
            audit.stage_failed(stage.name(), &raw, &e);
            return Err(e);
        }
    };

    let summary = apply(&plan, root);
    audit.stage_applied(stage.name(), &raw, &summary);

    if summary.is_clean() {
        info!("✅ Stage {}: {} actions applied", stage, summary.applied.len());
    } else {
        warn!(
            "Stage {}: {} actions applied, {} failed",
            stage,
            summary.applied.len(),
            summary.errors.len()
        );
    }

    Ok(StageOutcome { stage, summary })
}

/// Run every stage in order, appending each outcome to `outcomes`.
///
/// Stops at the first fatal stage error; outcomes of completed stages stay
/// in `outcomes`.
pub async fn run_update_stages(
    model: &dyn LanguageModel,
    architecture: &ArchitectureDocument,
    root: &Path,
    per_doc_limit: usize,
    audit: &AuditLog,
    outcomes: &mut Vec<StageOutcome>,
) -> Result<(), PipelineError> {
    for stage in UpdateStage::ALL {
        let outcome = run_stage(model, stage, architecture, root, per_doc_limit, audit).await?;
        outcomes.push(outcome);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers each stage prompt with a canned plan and records prompts.
    struct StageScript {
        datastore_reply: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    impl StageScript {
        fn new(datastore_reply: &'static str) -> Self {
            Self {
                datastore_reply,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for StageScript {
        async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = if prompt.contains("cross-cutting PATTERNS") {
                r#"{"version":"1","actions":[{"op":"write","path":"gateway/Gateway.java","content":"class Gateway {}"}]}"#
            } else if prompt.contains("wire DATASTORES") {
                self.datastore_reply
            } else if prompt.contains("SMALL TEST FRONTEND") {
                r#"{"version":"1","actions":[{"op":"write","path":"frontend/package.json","content":"{\"name\":\"ui\"}"},{"op":"delete","path":"../outside"}]}"#
            } else {
                r#"{"version":"1","actions":[{"op":"write","path":"docker-compose.yml","content":"services: {}"}]}"#
            };
            Ok(reply.to_string())
        }
    }

    const DATASTORE_OK: &str =
        r#"{"version":"1","actions":[{"op":"write","path":"db/schema.sql","content":"create table t();"}]}"#;

    #[tokio::test]
    async fn test_stages_run_in_order_and_see_previous_changes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        let audit = AuditLog::new(temp.path());
        let model = StageScript::new(DATASTORE_OK);
        let mut outcomes = Vec::new();

        run_update_stages(&model, &ArchitectureDocument::default(), &root, 18_000, &audit, &mut outcomes)
            .await
            .unwrap();

        let stages: Vec<_> = outcomes.iter().map(|o| o.stage).collect();
        assert_eq!(stages, UpdateStage::ALL.to_vec());

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[1].contains("file_path: gateway/Gateway.java"));
        assert!(prompts[2].contains("file_path: db/schema.sql"));
        assert!(prompts[3].contains("file_path: frontend/package.json"));
        assert!(prompts[3].contains("file_path: gateway/Gateway.java"));

        // The traversal attempt is a per-action error, not a stage failure.
        assert_eq!(outcomes[2].summary.applied.len(), 1);
        assert_eq!(outcomes[2].summary.errors[0].kind, "path_traversal");

        assert!(root.join("docker-compose.yml").is_file());
        for stage in UpdateStage::ALL {
            assert!(temp.path().join(format!("{}.plan.json", stage)).is_file());
            assert!(temp.path().join(format!("{}.apply-summary.json", stage)).is_file());
            assert!(temp.path().join(format!("{}.txt", stage)).is_file());
        }
    }

    #[tokio::test]
    async fn test_unusable_plan_stops_later_stages() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("project");
        let audit = AuditLog::new(temp.path());
        let model = StageScript::new("I could not produce a plan.");
        let mut outcomes = Vec::new();

        let err = run_update_stages(&model, &ArchitectureDocument::default(), &root, 18_000, &audit, &mut outcomes)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::MalformedLlmOutput { .. }));
        assert_eq!(outcomes.len(), 1);
        assert_eq!(model.prompts().len(), 2);

        let failure = std::fs::read_to_string(temp.path().join("datastore.plan.error.txt")).unwrap();
        assert!(failure.starts_with("Failed to apply plan:\n"));
        assert!(failure.ends_with("PLAN:\nI could not produce a plan."));
        assert!(temp.path().join("datastore.plan.json").is_file());
        assert!(!temp.path().join("datastore.apply-summary.json").exists());
        assert!(!temp.path().join("frontend.plan.json").exists());
    }

    #[test]
    fn test_stage_prompts_carry_architecture_parts() {
        let architecture: ArchitectureDocument = serde_json::from_str(
            r#"{"patterns": [{"group_name": "g", "implementation_pattern": "saga"}],
                "datastore": [{"datastore_name": "orders-db"}]}"#,
        )
        .unwrap();

        let patterns = UpdateStage::Patterns.prompt("DOCS", &architecture);
        assert!(patterns.contains("\"implementation_pattern\": \"saga\""));
        assert!(patterns.contains("DOCS"));

        let datastore = UpdateStage::Datastore.prompt("DOCS", &architecture);
        assert!(datastore.contains("orders-db"));

        for stage in UpdateStage::ALL {
            let prompt = stage.prompt("DOCS", &architecture);
            assert!(prompt.contains("\"op\":\"write\""), "{} lacks plan format", stage);
            assert!(!prompt.contains("{{"), "{} has unfilled slots", stage);
        }
    }
}
