//! Textual snapshot of a working project directory.
//!
//! Used as prompt context by the cross-cutting update stages. Only files
//! with allow-listed extensions are read and each one is truncated to a
//! fixed character budget.
//!
//! Uses `ignore::WalkBuilder` so that `.gitignore` rules inside the
//! generated project are honoured.

use ignore::WalkBuilder;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use super::paths::relative_posix;

/// Default per-document character budget.
pub const PER_DOC_LIMIT: usize = 18_000;

/// Maximum file size to read (1MB).
pub const MAX_READABLE_FILE_SIZE: u64 = 1024 * 1024;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "py", "ts", "tsx", "js", "json", "yml", "yaml", "toml", "md", "txt", "go", "java", "cs", "rs",
    "php", "html", "css", "scss", "sql", "proto", "graphql", "dockerfile", "sh", "env", "ini",
    "cfg", "conf",
];

/// Extension-less names that still carry text worth showing.
const ALLOWED_FILE_NAMES: &[&str] = &["Dockerfile", ".env"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDocument {
    pub path: String,
    pub content: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectSnapshot {
    pub documents: Vec<SnapshotDocument>,
}

impl ProjectSnapshot {
    /// Documents joined by blank lines, each preceded by its path.
    pub fn render(&self) -> String {
        self.documents
            .iter()
            .map(|d| format!("file_path: {}\n{}", d.path, d.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.path.clone()).collect()
    }
}

fn is_allowed(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if ALLOWED_FILE_NAMES.contains(&name) {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn truncate_chars(content: String, limit: usize) -> (String, bool) {
    match content.char_indices().nth(limit) {
        Some((byte_idx, _)) => (content[..byte_idx].to_string(), true),
        None => (content, false),
    }
}

/// Walk `root` in file-name order and collect allow-listed text files.
pub fn snapshot(root: &Path, per_doc_limit: usize) -> ProjectSnapshot {
    let mut documents = Vec::new();

    debug!("Snapshotting project: {}", root.display());

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(true)
        .hidden(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error walking directory: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !is_allowed(path) {
            continue;
        }
        if path.components().any(|c| c.as_os_str() == ".git") {
            continue;
        }

        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size > MAX_READABLE_FILE_SIZE {
            debug!("Skipping large file ({} bytes): {}", size, path.display());
            continue;
        }

        let content = match fs::read(path).map(String::from_utf8) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                debug!("Skipping binary file: {}", path.display());
                continue;
            }
            Err(e) => {
                warn!("Failed to read file {}: {}", path.display(), e);
                continue;
            }
        };

        let Some(rel) = relative_posix(path, root) else {
            warn!("Failed to get relative path for {}", path.display());
            continue;
        };

        let (content, truncated) = truncate_chars(content, per_doc_limit);
        documents.push(SnapshotDocument {
            path: rel,
            content,
            truncated,
        });
    }

    debug!("Snapshot contains {} documents", documents.len());

    ProjectSnapshot { documents }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_filters_and_orders() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("svc/src")).unwrap();
        fs::write(temp.path().join("svc/src/App.java"), "class App {}").unwrap();
        fs::write(temp.path().join("svc/pom.xml"), "<project/>").unwrap();
        fs::write(temp.path().join("README.md"), "# readme").unwrap();
        fs::write(temp.path().join("logo.png"), [0u8, 159, 146, 150]).unwrap();
        fs::write(temp.path().join(".env"), "A=1").unwrap();

        let snap = snapshot(temp.path(), PER_DOC_LIMIT);

        assert_eq!(snap.paths(), vec![".env", "README.md", "svc/src/App.java"]);
        assert!(snap.render().contains("file_path: svc/src/App.java\nclass App {}"));
    }

    #[test]
    fn test_truncation_is_char_based() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "ééééé").unwrap();

        let snap = snapshot(temp.path(), 3);

        assert_eq!(snap.documents[0].content, "ééé");
        assert!(snap.documents[0].truncated);
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        let snap = snapshot(temp.path(), PER_DOC_LIMIT);
        assert!(snap.is_empty());
        assert_eq!(snap.render(), "");
    }
}
