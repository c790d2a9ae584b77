//! Pattern application over an existing Spring Boot project.
//!
//! The input project is unpacked into `<output>__work`, copied to the
//! output directory, and each discovered service gets a model-planned set of
//! Java files written under its `src/main/java`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::discovery::{detect_package, find_services, infer_service_name, ServiceDir};
use super::readme::{match_readme_to_folders, parse_patterns_from_readme};
use super::roles::RolesConfig;
use crate::api::LanguageModel;
use crate::error::PipelineError;
use crate::parse::parse_as;
use crate::pipeline::prompts::fill;
use crate::workspace::{copy_tree, pack_dir, reset_dir, resolve_within, unpack_zip, Payload};

pub const DEFAULT_OUTPUT_FILENAME: &str = "augmented_project.zip";
pub const DEFAULT_README_PATH: &str = "README.md";

const SYSTEM_PROMPT: &str = "You are an expert Java/Spring DDD architect. Write minimal, correct Java code that compiles with Spring Boot.\n\
Package: {{package}}\n\
Service: {{service_name}}\n\
Patterns: {{patterns}}\n\
Use only Spring Boot and the JDK; leave TODO comments where an external integration would go.";

const PLAN_PROMPT: &str = "Given the service context below, propose the Java files to generate, \
with paths relative to src/main/java and a one-line purpose for each.\n\n\
Context:\n\
- Package: {{package}}\n\
- Service Name: {{service_name}}\n\
- Patterns: {{patterns}}\n\
- README:\n---\n{{readme}}\n---\n\n\
Return JSON: {\"files\": [{\"path\": \"path/ToFile.java\", \"purpose\": \"...\"}]}";

const FILE_PROMPT: &str = "Generate the full Java source code for this file.\n\n\
Constraints:\n\
- Package root: {{package}}\n\
- Patterns: {{patterns}}\n\
- Purpose: {{purpose}}\n\
Return ONLY the Java code (no markdown).\n\n\
File path: {{path}}";

// ============================================================================
// Input
// ============================================================================

/// Where the project to augment comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Payload(Payload),
    Zip(PathBuf),
    Dir(PathBuf),
}

impl InputSource {
    /// Pick the input by priority: stdin payload, payload file, zip, directory.
    pub fn select(
        payload_stdin: bool,
        payload_json: Option<&Path>,
        input_zip: Option<&Path>,
        input_dir: Option<&Path>,
        read_stdin: impl FnOnce() -> io::Result<String>,
    ) -> Result<Self, PipelineError> {
        if payload_stdin {
            return Payload::from_json(&read_stdin()?).map(InputSource::Payload);
        }
        if let Some(path) = payload_json {
            return Payload::from_json(&fs::read_to_string(path)?).map(InputSource::Payload);
        }
        if let Some(path) = input_zip {
            return Ok(InputSource::Zip(path.to_path_buf()));
        }
        if let Some(path) = input_dir {
            return Ok(InputSource::Dir(path.to_path_buf()));
        }
        Err(PipelineError::Payload(
            "provide one of --payload-stdin, --payload-json, --input-zip or --input-dir".to_string(),
        ))
    }
}

/// `<output_dir>__work`
pub fn work_dir_for(output_dir: &Path) -> PathBuf {
    let normalized: PathBuf = output_dir.components().collect();
    let mut name = normalized.into_os_string();
    name.push("__work");
    PathBuf::from(name)
}

/// Recreate `work` holding the input project.
pub fn prepare_work_dir(source: &InputSource, work: &Path) -> Result<(), PipelineError> {
    reset_dir(work)?;
    match source {
        InputSource::Payload(payload) => {
            unpack_zip(&payload.zip_bytes()?, work)?;
        }
        InputSource::Zip(path) => {
            unpack_zip(&fs::read(path)?, work)?;
        }
        InputSource::Dir(path) => copy_tree(path, work)?,
    }
    debug!("Prepared working copy at {}", work.display());
    Ok(())
}

// ============================================================================
// Assignment
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PatternOptions {
    pub readme_path: String,
    pub infer_from_readme: bool,
    pub roles: RolesConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceAssignment {
    pub service: ServiceDir,
    pub patterns: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Assignments {
    pub readme: String,
    pub services: Vec<ServiceAssignment>,
}

/// Decide the patterns for every service under `root`.
///
/// README hints win when README inference is on and the service matched a
/// README label; otherwise the roles config applies.
pub fn assign_patterns(root: &Path, options: &PatternOptions) -> Result<Assignments, PipelineError> {
    let readme_path = root.join(&options.readme_path);
    let readme = if readme_path.is_file() {
        fs::read_to_string(&readme_path)?
    } else {
        String::new()
    };

    let services = find_services(root)?;
    let folders: Vec<String> = services.iter().map(|s| s.name.clone()).collect();

    let readme_assignments = if options.infer_from_readme {
        let parsed = parse_patterns_from_readme(&readme);
        debug!("README patterns: {:?}", parsed);
        match_readme_to_folders(&parsed, &folders)
    } else {
        Default::default()
    };

    let services = services
        .into_iter()
        .map(|service| {
            let patterns = readme_assignments
                .get(&service.name)
                .and_then(|flags| serde_json::to_value(flags).ok())
                .unwrap_or_else(|| Value::Object(options.roles.for_service(&service.name)));
            ServiceAssignment { service, patterns }
        })
        .collect();

    Ok(Assignments { readme, services })
}

// ============================================================================
// Generation
// ============================================================================

/// Everything the prompts for one service are built from.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub package: String,
    pub service_name: String,
    pub patterns: Value,
    pub readme: String,
}

impl ServiceRequest {
    fn patterns_json(&self) -> String {
        self.patterns.to_string()
    }

    pub fn system_prompt(&self) -> String {
        fill(
            SYSTEM_PROMPT,
            &[
                ("package", &self.package),
                ("service_name", &self.service_name),
                ("patterns", &self.patterns_json()),
            ],
        )
    }

    pub fn plan_prompt(&self) -> String {
        fill(
            PLAN_PROMPT,
            &[
                ("package", &self.package),
                ("service_name", &self.service_name),
                ("patterns", &self.patterns_json()),
                ("readme", &self.readme),
            ],
        )
    }

    pub fn file_prompt(&self, file: &PlannedFile) -> String {
        fill(
            FILE_PROMPT,
            &[
                ("package", &self.package),
                ("patterns", &self.patterns_json()),
                ("purpose", &file.purpose),
                ("path", &file.path),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlannedFile {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Default, Deserialize)]
struct FilePlan {
    #[serde(default)]
    files: Vec<PlannedFile>,
}

/// Files from a plan reply `{"files": [{"path", "purpose"}]}`; entries
/// without a path are dropped.
pub fn parse_file_plan(raw: &str) -> Result<Vec<PlannedFile>, PipelineError> {
    let plan = parse_as::<FilePlan>(raw)?;
    Ok(plan
        .files
        .into_iter()
        .filter(|f| !f.path.trim().is_empty())
        .collect())
}

/// Prefix `code` with a package declaration when it has none.
pub fn with_package(code: &str, package: &str) -> String {
    if package.is_empty() || code.trim_start().starts_with("package ") {
        code.to_string()
    } else {
        format!("package {};\n\n{}", package, code)
    }
}

/// Plan and generate the files for one service; returns the written paths
/// relative to the service's `src/main/java`.
pub async fn process_service(
    model: &dyn LanguageModel,
    request: &ServiceRequest,
    service_dir: &Path,
) -> Result<Vec<String>, PipelineError> {
    let system = request.system_prompt();
    let reply = model.complete_with_system(&system, &request.plan_prompt()).await?;
    let files = parse_file_plan(&reply)?;
    info!("📝 {}: {} files planned", request.service_name, files.len());

    let java_root = service_dir.join("src/main/java");
    fs::create_dir_all(&java_root)?;

    let mut written = Vec::new();
    for file in &files {
        let target = match resolve_within(&java_root, &file.path) {
            Ok(target) => target,
            Err(e) => {
                warn!("Skipping planned file {}: {}", file.path, e);
                continue;
            }
        };

        let code = model
            .complete_with_system(&system, &request.file_prompt(file))
            .await?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, with_package(code.trim(), &request.package))?;
        debug!("Generated {}", file.path);
        written.push(file.path.trim().to_string());
    }
    Ok(written)
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceOutcome {
    pub service: String,
    pub patterns: Value,
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Copy the working project to `output_dir` and augment every service.
///
/// A failing service is reported in its outcome; the others still run.
pub async fn apply_patterns(
    model: &dyn LanguageModel,
    work: &Path,
    output_dir: &Path,
    options: &PatternOptions,
) -> Result<Vec<ServiceOutcome>, PipelineError> {
    let assignments = assign_patterns(work, options)?;

    reset_dir(output_dir)?;
    copy_tree(work, output_dir)?;

    let mut outcomes = Vec::new();
    for assignment in assignments.services {
        let service_dir = output_dir.join(&assignment.service.name);
        let request = ServiceRequest {
            package: detect_package(&service_dir).unwrap_or_default(),
            service_name: infer_service_name(&assignment.service.name),
            patterns: assignment.patterns.clone(),
            readme: assignments.readme.clone(),
        };
        info!("🧩 Processing {} with {}", assignment.service.name, request.patterns);

        let (files, error) = match process_service(model, &request, &service_dir).await {
            Ok(files) => (files, None),
            Err(e) => {
                warn!("Service {} failed: {}", assignment.service.name, e);
                (Vec::new(), Some(e.to_string()))
            }
        };
        outcomes.push(ServiceOutcome {
            service: assignment.service.name,
            patterns: assignment.patterns,
            files,
            error,
        });
    }
    Ok(outcomes)
}

/// Zip `output_dir`, writing it to `zip_output` and/or wrapping it in a
/// payload named `payload_filename`.
pub fn emit_outputs(
    output_dir: &Path,
    zip_output: Option<&Path>,
    payload_filename: Option<&str>,
) -> Result<Option<Payload>, PipelineError> {
    if zip_output.is_none() && payload_filename.is_none() {
        return Ok(None);
    }

    let bytes = pack_dir(output_dir)?;
    if let Some(path) = zip_output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;
        info!("📦 Wrote {}", path.display());
    }
    Ok(payload_filename.map(|name| Payload::from_zip(name, &bytes)))
}
