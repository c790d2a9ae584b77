//! Path normalization and root containment.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::PipelineError;

/// Normalize a header or tree path into a root-relative POSIX path.
///
/// Strips surrounding whitespace and leading `./` or `/`, converts `\` to
/// `/` and collapses duplicate slashes. Empty and directory-only paths
/// (trailing `/`) are rejected.
pub fn normalize_rel_path(raw: &str) -> Result<String, PipelineError> {
    let mut path = raw.trim().replace('\\', "/");

    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest.to_string();
        } else {
            break;
        }
    }

    let mut collapsed = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(c);
    }

    if collapsed.is_empty() || collapsed.ends_with('/') {
        return Err(PipelineError::InvalidPath(format!(
            "Invalid file path: '{}'",
            collapsed
        )));
    }

    Ok(collapsed)
}

/// Resolve `rel` against `root` and verify the result stays inside it.
///
/// The root is canonicalized; the relative part is applied lexically and
/// then the deepest existing ancestor is canonicalized so that symlinks
/// pointing outside the root are caught. Absolute paths and any `..` that
/// climbs above the root are rejected with `PathTraversal`.
pub fn resolve_within(root: &Path, rel: &str) -> Result<PathBuf, PipelineError> {
    let root = root.canonicalize()?;
    let rel_posix = rel.trim().replace('\\', "/");
    let mut resolved = root.clone();

    for component in Path::new(&rel_posix).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(PipelineError::PathTraversal(rel.to_string()));
            }
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
                if !resolved.starts_with(&root) {
                    return Err(PipelineError::PathTraversal(rel.to_string()));
                }
            }
            Component::Normal(part) => resolved.push(part),
        }
    }

    let resolved = canonicalize_existing_prefix(&resolved)?;
    if !resolved.starts_with(&root) {
        return Err(PipelineError::PathTraversal(rel.to_string()));
    }
    if resolved == root {
        return Err(PipelineError::InvalidPath(format!(
            "'{}' resolves to the project root",
            rel
        )));
    }

    Ok(resolved)
}

fn canonicalize_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();

    while std::fs::symlink_metadata(&existing).is_err() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }

    let mut canonical = existing.canonicalize()?;
    for part in rest.into_iter().rev() {
        canonical.push(part);
    }
    Ok(canonical)
}

/// Root-relative POSIX form of `path`, if it lies under `root`.
pub fn relative_posix(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}
