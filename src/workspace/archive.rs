//! ZIP packaging of projects and the base64 payload wire format.
//!
//! Two packers share one writer: [`pack_dir`] walks a directory on disk,
//! [`pack_tree`] walks an in-memory [`ProjectTree`]. Both emit explicit
//! directory entries and POSIX member names.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::paths::{normalize_rel_path, relative_posix, resolve_within};
use crate::domain::{File, Folder, ProjectTree};
use crate::error::PipelineError;

pub const DEFAULT_PAYLOAD_FILENAME: &str = "microservices_project.zip";

/// One archive member, in write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntry {
    Dir(String),
    File { path: String, content: Vec<u8> },
}

impl ArchiveEntry {
    pub fn name(&self) -> String {
        match self {
            ArchiveEntry::Dir(path) => format!("{}/", path),
            ArchiveEntry::File { path, .. } => path.clone(),
        }
    }
}

#[derive(Default)]
struct EntryList {
    entries: Vec<ArchiveEntry>,
    dirs: HashSet<String>,
    files: HashMap<String, usize>,
}

impl EntryList {
    fn add_dir(&mut self, path: &str) {
        let mut prefix = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if self.dirs.insert(prefix.clone()) {
                self.entries.push(ArchiveEntry::Dir(prefix.clone()));
            }
        }
    }

    /// Later files with the same path replace earlier content in place.
    fn add_file(&mut self, path: String, content: Vec<u8>) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_dir(parent);
        }
        if let Some(&idx) = self.files.get(&path) {
            debug!("Duplicate archive path, last content wins: {}", path);
            self.entries[idx] = ArchiveEntry::File { path, content };
            return;
        }
        self.files.insert(path.clone(), self.entries.len());
        self.entries.push(ArchiveEntry::File { path, content });
    }
}

fn join_tree_path(base: &str, name: &str) -> Option<String> {
    let joined = if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    };
    let path = match normalize_rel_path(&joined) {
        Ok(p) => p,
        Err(_) => {
            warn!("Dropping tree entry with unusable path: '{}'", joined);
            return None;
        }
    };
    if path.split('/').any(|part| part == "..") {
        warn!("Dropping tree entry escaping the project: '{}'", path);
        return None;
    }
    Some(path)
}

fn collect_file(list: &mut EntryList, base: &str, file: &File) {
    let Some(name) = file.name() else {
        debug!("Dropping unnamed file under '{}'", base);
        return;
    };
    if let Some(path) = join_tree_path(base, name) {
        list.add_file(path, file.content.as_bytes().to_vec());
    }
}

fn collect_folder(list: &mut EntryList, base: &str, folder: &Folder) {
    let Some(name) = folder.name() else {
        debug!("Dropping unnamed folder under '{}'", base);
        return;
    };
    let Some(path) = join_tree_path(base, name) else {
        return;
    };

    list.add_dir(&path);
    for file in folder.files.iter().flatten() {
        collect_file(list, &path, file);
    }
    for sub in folder.folders.iter().flatten() {
        collect_folder(list, &path, sub);
    }
}

/// Flatten a model-produced tree into archive entries.
///
/// Top-level files come first, then folders depth-first. Null and unnamed
/// entries are dropped; duplicate file paths keep their first position
/// with the last content.
pub fn tree_entries(tree: &ProjectTree) -> Vec<ArchiveEntry> {
    let mut list = EntryList::default();
    for file in tree.files.iter().flatten() {
        collect_file(&mut list, "", file);
    }
    for folder in tree.folders.iter().flatten() {
        collect_folder(&mut list, "", folder);
    }
    list.entries
}

/// Collect the entries of a directory on disk, sorted by file name.
pub fn dir_entries(root: &Path) -> Result<Vec<ArchiveEntry>, PipelineError> {
    let mut list = EntryList::default();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PipelineError::Io(e.into()))?;
        let Some(rel) = relative_posix(entry.path(), root) else {
            continue;
        };
        if entry.file_type().is_dir() {
            list.add_dir(&rel);
        } else if entry.file_type().is_file() {
            list.add_file(rel, fs::read(entry.path())?);
        } else {
            debug!("Skipping non-regular file: {}", entry.path().display());
        }
    }

    Ok(list.entries)
}

/// Serialize entries into a deflate-compressed ZIP.
pub fn write_zip(entries: &[ArchiveEntry]) -> Result<Vec<u8>, PipelineError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = || FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        match entry {
            ArchiveEntry::Dir(path) => zip.add_directory(path.as_str(), options())?,
            ArchiveEntry::File { path, content } => {
                zip.start_file(path.as_str(), options())?;
                zip.write_all(content)?;
            }
        }
    }

    Ok(zip.finish()?.into_inner())
}

pub fn pack_tree(tree: &ProjectTree) -> Result<Vec<u8>, PipelineError> {
    write_zip(&tree_entries(tree))
}

pub fn pack_dir(root: &Path) -> Result<Vec<u8>, PipelineError> {
    write_zip(&dir_entries(root)?)
}

/// Member names of a ZIP, in archive order.
pub fn list_entries(bytes: &[u8]) -> Result<Vec<String>, PipelineError> {
    let archive = ZipArchive::new(Cursor::new(bytes))?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Extract `bytes` into `dst`, rejecting members that would land outside it.
///
/// Returns the extracted file paths.
pub fn unpack_zip(bytes: &[u8], dst: &Path) -> Result<Vec<String>, PipelineError> {
    fs::create_dir_all(dst)?;
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        let Some(enclosed) = member.enclosed_name() else {
            return Err(PipelineError::PathTraversal(member.name().to_string()));
        };
        let rel = enclosed.to_string_lossy().replace('\\', "/");
        let rel = rel.trim_end_matches('/');
        if rel.is_empty() {
            continue;
        }

        let target = resolve_within(dst, rel)?;
        if member.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        std::io::copy(&mut member, &mut out)?;
        extracted.push(rel.to_string());
    }

    debug!("Extracted {} files into {}", extracted.len(), dst.display());
    Ok(extracted)
}

/// Recursively copy `src` into `dst`.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| PipelineError::Io(e.into()))?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove `path` if present and recreate it empty.
pub fn reset_dir(path: &Path) -> Result<(), PipelineError> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// `{filename, zip_base64}` project payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default = "default_payload_filename")]
    pub filename: String,
    #[serde(default)]
    pub zip_base64: String,
}

fn default_payload_filename() -> String {
    DEFAULT_PAYLOAD_FILENAME.to_string()
}

impl Payload {
    pub fn from_zip(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            zip_base64: STANDARD.encode(bytes),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, PipelineError> {
        let payload: Payload = serde_json::from_str(raw)
            .map_err(|e| PipelineError::Payload(format!("not a payload object: {}", e)))?;
        if payload.zip_base64.trim().is_empty() {
            return Err(PipelineError::Payload(
                "Payload is missing 'zip_base64'".to_string(),
            ));
        }
        Ok(payload)
    }

    pub fn zip_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        STANDARD
            .decode(self.zip_base64.trim())
            .map_err(|e| PipelineError::Payload(format!("invalid base64: {}", e)))
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "filename": self.filename, "zip_base64": self.zip_base64 }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn tree(value: serde_json::Value) -> ProjectTree {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_tree_entries_order_and_dirs() {
        let tree = tree(json!({
            "files": [
                {"name": "README.md", "content": "# r"},
                {"name": "docker/compose.yml", "content": "services:"},
                null,
                {"content": "nameless"}
            ],
            "folders": [
                {
                    "name": "order-service",
                    "files": [{"name": "pom.xml", "content": "<p/>"}],
                    "folders": [
                        {"name": "src", "files": [{"name": "App.java", "content": "class App {}"}]},
                        {"files": [{"name": "lost.txt", "content": ""}]},
                        null
                    ]
                }
            ]
        }));

        let names: Vec<String> = tree_entries(&tree).iter().map(ArchiveEntry::name).collect();
        assert_eq!(
            names,
            vec![
                "README.md",
                "docker/",
                "docker/compose.yml",
                "order-service/",
                "order-service/pom.xml",
                "order-service/src/",
                "order-service/src/App.java",
            ]
        );
    }

    #[test]
    fn test_tree_duplicates_and_escapes() {
        let tree = tree(json!({
            "files": [
                {"name": "a.txt", "content": "first"},
                {"name": "/a.txt", "content": "second"},
                {"name": "../evil.txt", "content": "x"}
            ]
        }));

        let entries = tree_entries(&tree);
        assert_eq!(
            entries,
            vec![ArchiveEntry::File {
                path: "a.txt".to_string(),
                content: b"second".to_vec()
            }]
        );
        assert!(pack_tree(&tree).is_ok());
    }

    #[test]
    fn test_pack_unpack_repack() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("svc/src")).unwrap();
        fs::create_dir_all(src.path().join("empty")).unwrap();
        fs::write(src.path().join("svc/src/App.java"), "class App {}").unwrap();
        fs::write(src.path().join("bin.dat"), [0u8, 255, 7]).unwrap();

        let first = pack_dir(src.path()).unwrap();

        let dst = TempDir::new().unwrap();
        unpack_zip(&first, dst.path()).unwrap();
        let second = pack_dir(dst.path()).unwrap();

        assert_eq!(list_entries(&first).unwrap(), list_entries(&second).unwrap());
        assert_eq!(
            dir_entries(src.path()).unwrap(),
            dir_entries(dst.path()).unwrap()
        );
        assert!(dst.path().join("empty").is_dir());
    }

    #[test]
    fn test_unpack_rejects_zip_slip() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("../escape.txt", FileOptions::<()>::default())
            .unwrap();
        zip.write_all(b"x").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let temp = TempDir::new().unwrap();
        let dst = temp.path().join("dst");
        let err = unpack_zip(&bytes, &dst).unwrap_err();

        assert!(matches!(err, PipelineError::PathTraversal(_)));
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn test_payload() {
        let payload = Payload::from_zip("p.zip", b"PK");
        let parsed = Payload::from_json(&payload.to_json()).unwrap();
        assert_eq!(parsed.filename, "p.zip");
        assert_eq!(parsed.zip_bytes().unwrap(), b"PK");

        let err = Payload::from_json(r#"{"filename": "x.zip"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid payload: Payload is missing 'zip_base64'");
    }

    #[test]
    fn test_copy_and_reset() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/c.txt"), "c").unwrap();

        let dst = TempDir::new().unwrap();
        let out = dst.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.txt"), "old").unwrap();

        reset_dir(&out).unwrap();
        copy_tree(src.path(), &out).unwrap();

        assert!(!out.join("stale.txt").exists());
        assert_eq!(fs::read_to_string(out.join("a/b/c.txt")).unwrap(), "c");
    }
}
