//! Staged generation pipeline.
//!
//! extract → retrieve context → assign architecture → generate code
//! (fan-out) → materialize → patterns → datastore → frontend → compose.
//!
//! Stage inputs are passed explicitly; the only shared mutable state is the
//! working project directory, which is written by one stage at a time.

pub mod artifact;
pub mod assign;
pub mod audit;
pub mod codegen;
pub mod context;
pub mod extract;
pub mod prompts;
pub mod update;

pub use artifact::PipelineArtifact;
pub use assign::{assign_architecture, AssignInput, Assignment};
pub use audit::AuditLog;
pub use codegen::{generate_all, CodeDocument};
pub use context::{context_query, retrieve_context};
pub use extract::{extract_microservices, MicroserviceCandidate};
pub use update::{run_stage, run_update_stages, StageOutcome, UpdateStage};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

use crate::api::{LanguageModel, Retriever};
use crate::domain::Violation;
use crate::error::PipelineError;
use crate::parse::compiled;
use crate::workspace::{materialize, reset_dir};

const SYSTEM_DESCRIPTION_MARKER: &str = "# SYSTEM DESCRIPTION:";
const USER_STORIES_MARKER: &str = "# USER STORIES:";

fn section_heading() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?m)^# [A-Z ]+:")
}

/// Text following `marker` up to the next `# UPPER CASE:` heading.
fn section_after(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = section_heading()
        .and_then(|re| re.find(rest))
        .map(|m| m.start())
        .unwrap_or(rest.len());
    let section = rest[..end].trim();
    (!section.is_empty()).then(|| section.to_string())
}

/// Split a combined input file into system description and user stories.
pub fn split_input(text: &str) -> Result<RunInput, PipelineError> {
    let specs = section_after(text, SYSTEM_DESCRIPTION_MARKER)
        .ok_or_else(|| PipelineError::Parse(format!("missing '{}' section", SYSTEM_DESCRIPTION_MARKER)))?;
    let user_stories = section_after(text, USER_STORIES_MARKER)
        .ok_or_else(|| PipelineError::Parse(format!("missing '{}' section", USER_STORIES_MARKER)))?;
    Ok(RunInput {
        specs,
        user_stories,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunInput {
    pub specs: String,
    pub user_stories: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: UpdateStage,
    pub applied: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl From<&StageOutcome> for StageReport {
    fn from(outcome: &StageOutcome) -> Self {
        Self {
            stage: outcome.stage,
            applied: outcome.summary.applied.len(),
            skipped: outcome.summary.skipped_count(),
            errors: outcome.summary.errors.len(),
        }
    }
}

/// Summary of one `generate` run, written as `run-report.json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub project_root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub microservices: usize,
    pub generated_documents: usize,
    pub empty_documents: usize,
    pub written_files: usize,
    pub stages: Vec<StageReport>,
    pub violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Pipeline {
    model: Arc<dyn LanguageModel>,
    retriever: Option<Arc<dyn Retriever>>,
    workers: usize,
    per_doc_limit: usize,
}

impl Pipeline {
    pub fn new(model: Arc<dyn LanguageModel>, workers: usize, per_doc_limit: usize) -> Self {
        Self {
            model,
            retriever: None,
            workers: workers.max(1),
            per_doc_limit,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Working project directory for `output_dir`.
    pub fn project_root(output_dir: &Path) -> PathBuf {
        output_dir.join("project")
    }

    /// Run every stage. The project is rebuilt under `<output_dir>/project`
    /// and audit artifacts land in `output_dir`.
    ///
    /// `run-report.json` is written on success and on failure.
    pub async fn run(&self, input: &RunInput, output_dir: &Path) -> Result<RunReport, PipelineError> {
        let audit = AuditLog::new(output_dir);
        let mut report = RunReport {
            project_root: Self::project_root(output_dir),
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let result = self.execute(input, &audit, &mut report).await;
        if let Err(e) = &result {
            error!("❌ Generation failed: {}", e);
            report.error = Some(e.to_string());
        }
        report.finished_at = Some(Utc::now());
        audit.write_json("run-report.json", &report);

        result.map(|_| report)
    }

    async fn execute(
        &self,
        input: &RunInput,
        audit: &AuditLog,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let model = self.model.as_ref();
        let root = report.project_root.clone();
        reset_dir(&root)?;

        let (candidates, microservice_list) =
            extract_microservices(model, &input.specs, &input.user_stories).await?;
        audit.write("microservices.json", &microservice_list);
        if candidates.is_empty() {
            warn!("No microservice candidates extracted; assignment runs without a list");
        }

        let context = match &self.retriever {
            Some(retriever) => {
                let query = context_query(&microservice_list, &input.user_stories, &input.specs);
                match retrieve_context(model, retriever.as_ref(), &query).await {
                    Ok(context) => context,
                    Err(e) => {
                        warn!("Context retrieval failed, continuing without context: {}", e);
                        String::new()
                    }
                }
            }
            None => String::new(),
        };
        if !context.is_empty() {
            audit.write("context.txt", &context);
        }

        let assignment = match assign_architecture(
            model,
            &AssignInput {
                microservice_list: &microservice_list,
                specs: &input.specs,
                user_stories: &input.user_stories,
                context: &context,
            },
        )
        .await
        {
            Ok(assignment) => assignment,
            Err(e) => {
                if let Some(raw) = e.raw_output() {
                    audit.write("architecture.error.txt", &format!("{}\n\nRAW:\n{}", e, raw));
                }
                return Err(e);
            }
        };
        audit.write_json("architecture.json", &assignment.document);
        report.violations = assignment.violations.clone();

        let architecture = assignment.document;
        report.microservices = architecture.microservices.len();

        let documents = generate_all(model, &architecture.microservices, self.workers).await;
        for doc in &documents {
            audit.code_document(&doc.microservice, &doc.text);
        }
        report.generated_documents = documents.len();
        report.empty_documents = documents.iter().filter(|d| d.is_empty()).count();

        for doc in &documents {
            if doc.is_empty() {
                warn!("Skipping empty code document for {}", doc.microservice);
                continue;
            }
            let written = materialize(&doc.text, &root).map_err(|e| {
                error!("❌ Failed to materialize {}: {}", doc.microservice, e);
                e
            })?;
            report.written_files += written.len();
        }
        info!("📁 Materialized {} files into {}", report.written_files, root.display());

        let mut outcomes = Vec::new();
        let result = run_update_stages(
            model,
            &architecture,
            &root,
            self.per_doc_limit,
            audit,
            &mut outcomes,
        )
        .await;
        report.stages = outcomes.iter().map(StageReport::from).collect();
        result?;

        info!("🎉 Generation complete: {}", root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ScoredNode;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const INPUT: &str = "# SYSTEM DESCRIPTION:\nA small shop.\n\n# USER STORIES:\n1) As a user I log in\n2) As a buyer I order\n";

    /// Answers each prompt by recognising the stage it belongs to.
    struct ScriptedModel {
        fail_code_for: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(fail_code_for: Option<&'static str>) -> Self {
            Self {
                fail_code_for,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if prompt.contains("The microservice list is:") {
                return Ok("[{'name': 'auth', 'description': 'logins', 'user_stories': ['1']}, \
                           {'name': 'orders', 'description': 'orders', 'user_stories': ['2']}]"
                    .to_string());
            }
            if prompt.contains("Please provide an answer based solely on the provided sources") {
                return Ok("Use a saga for orders (Source 1).".to_string());
            }
            if prompt.contains("The output json is:") {
                assert!(prompt.contains("Use a saga for orders"));
                return Ok(r#"```json
{"microservices": [
   {"name": "auth", "user_stories": ["1"]},
   {"name": "orders", "user_stories": ["2"]}],
 "patterns": [{"group_name": "checkout", "implementation_pattern": "saga", "involved_microservices": ["orders"]}],
 "datastore": [{"datastore_name": "db", "associated_microservices": ["auth", "orders"]}]}
```"#
                    .to_string());
            }
            if prompt.contains("You are a code generator") {
                if let Some(name) = self.fail_code_for {
                    if prompt.contains(&format!("\"name\": \"{}\"", name)) {
                        return Err(PipelineError::Timeout(5));
                    }
                }
                let name = if prompt.contains("\"name\": \"auth\"") { "auth" } else { "orders" };
                return Ok(format!(
                    "{name}-service/pom.xml\n----------------------------------------\n```xml\n<project/>\n```\n\
                     {name}-service/src/main/java/App.java\n----------------------------------------\n```java\nclass App {{}}\n```\n"
                ));
            }
            if prompt.contains("cross-cutting PATTERNS") {
                return Ok(r#"{"version":"1","actions":[{"op":"write","path":"gateway/README.md","content":"gateway"}]}"#.to_string());
            }
            if prompt.contains("wire DATASTORES") {
                return Ok(r#"{"version":"1","actions":[{"op":"write","path":"db/init.sql","content":"select 1;"}]}"#.to_string());
            }
            if prompt.contains("SMALL TEST FRONTEND") {
                return Ok(r#"{"version":"1","actions":[{"op":"mkdir","path":"frontend"}]}"#.to_string());
            }
            Ok(r#"{"version":"1","actions":[{"op":"write","path":"docker-compose.yml","content":"services: {}"}]}"#.to_string())
        }
    }

    struct OneSource;

    #[async_trait]
    impl Retriever for OneSource {
        async fn retrieve(&self, _query: &str) -> Result<Vec<ScoredNode>, PipelineError> {
            Ok(vec![ScoredNode {
                text: "2) As a buyer I order".to_string(),
                score: 0.9,
            }])
        }
    }

    #[test]
    fn test_split_input() {
        let input = split_input(INPUT).unwrap();
        assert_eq!(input.specs, "A small shop.");
        assert_eq!(input.user_stories, "1) As a user I log in\n2) As a buyer I order");

        let err = split_input("# USER STORIES:\n1) x").unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));

        assert!(std::ptr::eq(section_heading().unwrap(), section_heading().unwrap()));
        assert_eq!(split_input(INPUT).unwrap(), input);
    }

    #[tokio::test]
    async fn test_full_run_with_retriever() {
        let temp = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::new(None));
        let pipeline = Pipeline::new(model.clone(), 8, 18_000).with_retriever(Arc::new(OneSource));

        let report = pipeline
            .run(&split_input(INPUT).unwrap(), temp.path())
            .await
            .unwrap();

        let root = temp.path().join("project");
        assert_eq!(report.microservices, 2);
        assert_eq!(report.generated_documents, 2);
        assert_eq!(report.empty_documents, 0);
        assert_eq!(report.written_files, 4);
        assert!(report.violations.is_empty());
        assert_eq!(report.stages.len(), 4);
        assert!(report.stages.iter().all(|s| s.errors == 0));

        for path in [
            "auth-service/pom.xml",
            "orders-service/src/main/java/App.java",
            "gateway/README.md",
            "db/init.sql",
            "docker-compose.yml",
        ] {
            assert!(root.join(path).is_file(), "missing {}", path);
        }
        assert!(root.join("frontend").is_dir());
        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(temp.path().join("run-report.json")).unwrap(),
        )
        .unwrap();
        assert!(saved["started_at"].is_string());
        assert!(saved["finished_at"].is_string());
        assert!(temp.path().join("architecture.json").is_file());
        assert!(temp.path().join("codegen/auth.txt").is_file());
        // extract + context + assign + 2 code + 4 stages
        assert_eq!(model.calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_code_failure_degrades_and_run_completes() {
        let temp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(Arc::new(ScriptedModel::new(Some("orders"))), 8, 18_000);

        let report = pipeline
            .run(&split_input(INPUT).unwrap(), temp.path())
            .await
            .unwrap();

        assert_eq!(report.generated_documents, 2);
        assert_eq!(report.empty_documents, 1);
        assert_eq!(report.written_files, 2);
        let root = temp.path().join("project");
        assert!(root.join("auth-service/pom.xml").is_file());
        assert!(!root.join("orders-service").exists());
        assert!(root.join("docker-compose.yml").is_file());
    }
}
