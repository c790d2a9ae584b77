//! Audit artifacts written next to the working project.
//!
//! Nothing downstream reads these files; a failed write is logged and the
//! run continues.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::workspace::ApplySummary;

#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `content` to `name` under the audit directory.
    pub fn write(&self, name: &str, content: &str) -> Option<PathBuf> {
        let path = self.dir.join(name);
        let result = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| std::fs::write(&path, content));

        match result {
            Ok(()) => {
                debug!("Wrote audit artifact {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Failed to write audit artifact {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Option<PathBuf> {
        match serde_json::to_string_pretty(value) {
            Ok(json) => self.write(name, &json),
            Err(e) => {
                warn!("Failed to serialize audit artifact {}: {}", name, e);
                None
            }
        }
    }

    /// `{stage}.plan.json`: the raw model reply, as received.
    pub fn stage_plan(&self, stage: &str, raw: &str) {
        self.write(&format!("{}.plan.json", stage), raw);
    }

    /// `{stage}.apply-summary.json` and the `{stage}.txt` mirror of the reply.
    pub fn stage_applied(&self, stage: &str, raw: &str, summary: &ApplySummary) {
        self.write_json(&format!("{}.apply-summary.json", stage), summary);
        self.write(&format!("{}.txt", stage), raw);
    }

    pub fn stage_failed(&self, stage: &str, raw: &str, error: &dyn std::fmt::Display) {
        self.write(
            &format!("{}.plan.error.txt", stage),
            &format!("Failed to apply plan:\n{}\n\nPLAN:\n{}", error, raw),
        );
    }

    /// `codegen/<microservice>.txt`
    pub fn code_document(&self, microservice: &str, text: &str) {
        let name: String = microservice
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let name = if name.is_empty() { "unnamed".to_string() } else { name };
        self.write(&format!("codegen/{}.txt", name), text);
    }
}
