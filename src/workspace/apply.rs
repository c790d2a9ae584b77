//! Update-Plan applier.
//!
//! Every action is attempted exactly once, in declared order. A failing
//! action is recorded in [`ApplySummary::errors`] and the next one runs;
//! partial application is the normal outcome.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use super::paths::resolve_within;
use super::plan::{Action, Encoding, IfExists, UpdatePlan};
use crate::error::PipelineError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub index: usize,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionError {
    pub index: usize,
    pub action: Value,
    pub error: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub applied: Vec<ActionResult>,
    pub errors: Vec<ActionError>,
}

impl ApplySummary {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn skipped_count(&self) -> usize {
        self.applied.iter().filter(|r| r.skipped).count()
    }
}

/// Parse a plan from JSON text and apply it.
///
/// Fails only when the text is not JSON or the plan has no `actions` array.
pub fn apply_json(raw: &str, root: &Path) -> Result<ApplySummary, PipelineError> {
    let plan = UpdatePlan::parse(raw)?;
    Ok(apply(&plan, root))
}

/// Apply `plan` against `root`, creating the root when absent.
pub fn apply(plan: &UpdatePlan, root: &Path) -> ApplySummary {
    let mut summary = ApplySummary::default();

    if let Err(e) = fs::create_dir_all(root) {
        warn!("Failed to create project root {}: {}", root.display(), e);
    }

    for (index, raw) in plan.actions.iter().enumerate() {
        let outcome = Action::from_value(raw).and_then(|action| apply_action(index, &action, root));
        match outcome {
            Ok(result) => {
                debug!(
                    "Applied action {} ({}){}{}",
                    index,
                    result.op,
                    if result.skipped { " [skipped]" } else { "" },
                    if result.missing { " [missing]" } else { "" }
                );
                summary.applied.push(result);
            }
            Err(e) => {
                warn!("Action {} failed: {}", index, e);
                summary.errors.push(ActionError {
                    index,
                    action: raw.clone(),
                    error: e.to_string(),
                    kind: e.kind().to_string(),
                });
            }
        }
    }

    summary
}

fn decode_content(content: &str, encoding: Encoding) -> Result<Vec<u8>, PipelineError> {
    match encoding {
        Encoding::Utf8 => Ok(content.as_bytes().to_vec()),
        Encoding::Base64 => STANDARD
            .decode(content.trim())
            .map_err(|e| PipelineError::InvalidAction(format!("invalid base64 content: {}", e))),
    }
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn apply_action(index: usize, action: &Action, root: &Path) -> Result<ActionResult, PipelineError> {
    let mut result = ActionResult {
        index,
        op: action.op().to_string(),
        ..Default::default()
    };

    match action {
        Action::Mkdir { path } => {
            let target = resolve_within(root, path)?;
            fs::create_dir_all(&target)?;
            result.path = Some(path.clone());
        }
        Action::Write {
            path,
            content,
            encoding,
            if_exists,
        } => {
            let target = resolve_within(root, path)?;
            result.path = Some(path.clone());
            if exists(&target) {
                match if_exists {
                    IfExists::Skip => {
                        result.skipped = true;
                        return Ok(result);
                    }
                    IfExists::Error => return Err(PipelineError::FileExists(path.clone())),
                    IfExists::Overwrite => {}
                }
            }
            let bytes = decode_content(content, *encoding)?;
            ensure_parent(&target)?;
            fs::write(&target, bytes)?;
        }
        Action::Append {
            path,
            content,
            encoding,
        } => {
            let target = resolve_within(root, path)?;
            let bytes = decode_content(content, *encoding)?;
            ensure_parent(&target)?;
            let mut file = OpenOptions::new().create(true).append(true).open(&target)?;
            file.write_all(&bytes)?;
            result.path = Some(path.clone());
        }
        Action::Move {
            from,
            to,
            if_exists,
        } => {
            let source = resolve_within(root, from)?;
            let target = resolve_within(root, to)?;
            result.from = Some(from.clone());
            result.to = Some(to.clone());

            if !exists(&source) {
                return Err(PipelineError::SourceNotFound(from.clone()));
            }
            if exists(&target) {
                match if_exists {
                    IfExists::Skip => {
                        result.skipped = true;
                        return Ok(result);
                    }
                    IfExists::Error => return Err(PipelineError::TargetExists(to.clone())),
                    IfExists::Overwrite => {
                        if target.is_dir() {
                            fs::remove_dir_all(&target)?;
                        } else {
                            fs::remove_file(&target)?;
                        }
                    }
                }
            }
            ensure_parent(&target)?;
            fs::rename(&source, &target)?;
        }
        Action::Delete { path, recursive } => {
            let target = resolve_within(root, path)?;
            result.path = Some(path.clone());
            if !exists(&target) {
                result.missing = true;
                return Ok(result);
            }
            if target.is_dir() {
                if *recursive {
                    fs::remove_dir_all(&target)?;
                } else {
                    fs::remove_dir(&target)
                        .map_err(|_| PipelineError::DirectoryNotEmpty(path.clone()))?;
                }
            } else {
                fs::remove_file(&target)?;
            }
        }
    }

    Ok(result)
}
