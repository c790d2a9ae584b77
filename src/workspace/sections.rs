//! File-section micro-format.
//!
//! A generated project travels as one flat document made of repeated blocks:
//!
//! ~~~text
//! order-service/pom.xml
//! ----------------------------------------
//! ```xml
//! <project>...</project>
//! ```
//! ~~~
//!
//! A decorative title followed by a dash rule may precede the sections; it
//! is recognised by lookahead (its dash rule is followed by another header
//! and dash rule, not by a fence).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use super::paths::{normalize_rel_path, resolve_within};
use crate::error::PipelineError;

const DASH_RULE: &str = "----------------------------------------";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSection {
    pub path: String,
    pub content: String,
}

impl FileSection {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

fn is_dash_rule(line: &str) -> bool {
    let t = line.trim();
    t.len() >= 3 && t.chars().all(|c| c == '-')
}

fn is_fence_open(line: &str) -> bool {
    match line.trim().strip_prefix("```") {
        Some(lang) => lang
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '+' || c == '-'),
        None => false,
    }
}

fn is_fence_close(line: &str) -> bool {
    line.trim() == "```"
}

fn is_header_candidate(line: &str) -> bool {
    !line.trim().is_empty() && !is_fence_open(line) && !is_dash_rule(line)
}

fn next_nonblank(lines: &[&str], start: usize) -> usize {
    let mut j = start;
    while j < lines.len() && lines[j].trim().is_empty() {
        j += 1;
    }
    j
}

/// Parse a flat document into its file sections.
///
/// Fails with `Parse` when a fence is unterminated, when a dash rule is
/// followed by neither a fence nor another header, or when no section is
/// found at all.
pub fn parse_sections(text: &str) -> Result<Vec<FileSection>, PipelineError> {
    let lines: Vec<&str> = text.lines().collect();
    let n = lines.len();
    let mut sections = Vec::new();
    let mut i = 0;

    while i < n {
        let header = lines[i];
        if !is_header_candidate(header) {
            i += 1;
            continue;
        }

        let j = next_nonblank(&lines, i + 1);
        if j >= n || !is_dash_rule(lines[j]) {
            i += 1;
            continue;
        }

        i = j + 1;
        let k = next_nonblank(&lines, i);

        if k < n && is_fence_open(lines[k]) {
            let path = normalize_rel_path(header).map_err(|_| {
                PipelineError::Parse(format!("Invalid file path header: '{}'", header.trim()))
            })?;

            i = k + 1;
            let mut content_lines = Vec::new();
            while i < n && !is_fence_close(lines[i]) {
                content_lines.push(lines[i]);
                i += 1;
            }
            if i >= n {
                return Err(PipelineError::Parse(format!(
                    "Unterminated code fence for '{}' before end of input",
                    path
                )));
            }
            i += 1;

            let mut content = content_lines.join("\n");
            if !content_lines.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            sections.push(FileSection { path, content });
            continue;
        }

        // Decorative title: the next header carries its own dash rule.
        if k < n && is_header_candidate(lines[k]) {
            let j2 = next_nonblank(&lines, k + 1);
            if j2 < n && is_dash_rule(lines[j2]) {
                debug!("Skipping decorative title: {}", header.trim());
                i = k;
                continue;
            }
        }

        return Err(PipelineError::Parse(format!(
            "Expected code fence after dashes for '{}' near line {}",
            header.trim(),
            i + 1
        )));
    }

    if sections.is_empty() {
        return Err(PipelineError::Parse(
            "No file sections found. Ensure the document follows the required format.".to_string(),
        ));
    }

    Ok(sections)
}

fn fence_language(path: &str) -> &str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("yml") | Some("yaml") => "yaml",
        Some("md") => "markdown",
        Some(ext) if ext.chars().all(|c| c.is_ascii_alphanumeric()) => ext,
        _ => "",
    }
}

/// Render sections back into the flat document format.
pub fn render_sections(sections: &[FileSection]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str(&section.path);
        out.push('\n');
        out.push_str(DASH_RULE);
        out.push_str("\n```");
        out.push_str(fence_language(&section.path));
        out.push('\n');
        out.push_str(&section.content);
        if !section.content.is_empty() && !section.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n");
    }
    out
}

/// Parse `doc` and write every section under `root`.
///
/// All paths are checked for containment before anything is written.
/// Existing files are overwritten (last writer wins). Returns the written
/// root-relative paths in document order.
pub fn materialize(doc: &str, root: &Path) -> Result<Vec<String>, PipelineError> {
    let sections = parse_sections(doc)?;
    write_sections(&sections, root)
}

pub fn write_sections(sections: &[FileSection], root: &Path) -> Result<Vec<String>, PipelineError> {
    fs::create_dir_all(root)?;

    let targets = sections
        .iter()
        .map(|s| resolve_within(root, &s.path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut written = Vec::with_capacity(sections.len());
    for (section, target) in sections.iter().zip(targets) {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("Writing {}", target.display());
        fs::write(&target, &section.content)?;
        written.push(section.path.clone());
    }

    Ok(written)
}

#[derive(Default)]
struct TreeNode(BTreeMap<String, TreeNode>);

/// Box-drawing listing of relative paths, rooted at `label`.
pub fn render_tree(label: &str, paths: &[String]) -> String {
    let mut root = TreeNode::default();
    for path in paths {
        let mut node = &mut root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            node = node.0.entry(part.to_string()).or_default();
        }
    }

    let mut out = format!("{}\n", label);
    render_node(&root, "", &mut out);
    out
}

fn render_node(node: &TreeNode, prefix: &str, out: &mut String) {
    let count = node.0.len();
    for (idx, (name, child)) in node.0.iter().enumerate() {
        let is_last = idx + 1 == count;
        out.push_str(prefix);
        out.push_str(if is_last { "└── " } else { "├── " });
        out.push_str(name);
        out.push('\n');
        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        render_node(child, &child_prefix, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_simple_sections() {
        let doc = "a.txt\n---\n```\nhello\n```\nsrc/Main.java\n-----\n```java\nclass Main {}\n\n```\n";
        let sections = parse_sections(doc).unwrap();
        assert_eq!(
            sections,
            vec![
                FileSection::new("a.txt", "hello\n"),
                FileSection::new("src/Main.java", "class Main {}\n"),
            ]
        );
    }

    #[test]
    fn test_decorative_title_is_skipped() {
        let doc = "User_Service_full_structure.txt\n\
                   ------------------------------------------------------------\n\
                   user-service/pom.xml\n\
                   ----------------------------------------\n\
                   ```xml\n<project/>\n```\n";
        let sections = parse_sections(doc).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].path, "user-service/pom.xml");
        assert_eq!(sections[0].content, "<project/>\n");
    }

    #[test]
    fn test_blank_lines_between_markers() {
        let doc = "./svc//App.java\n\n----\n\n```java\nx\n```";
        let sections = parse_sections(doc).unwrap();
        assert_eq!(sections[0].path, "svc/App.java");
    }

    #[test]
    fn test_unterminated_fence() {
        let err = parse_sections("a.txt\n---\n```\nhello\n").unwrap_err();
        assert!(err.to_string().contains("Unterminated code fence for 'a.txt'"));
    }

    #[test]
    fn test_no_sections() {
        let err = parse_sections("just some prose\nwithout sections\n").unwrap_err();
        assert!(err.to_string().contains("No file sections found"));
        assert!(parse_sections("").is_err());
    }

    #[test]
    fn test_dashes_without_fence() {
        let err = parse_sections("a.txt\n---\nnot a fence\n").unwrap_err();
        assert!(err.to_string().contains("Expected code fence after dashes"));
    }

    #[test]
    fn test_directory_only_header_is_rejected() {
        let err = parse_sections("src/\n---\n```\nx\n```\n").unwrap_err();
        assert!(err.to_string().contains("Invalid file path header"));
    }

    #[test]
    fn test_materialize_round_trip() {
        let temp = TempDir::new().unwrap();
        let expected = vec![
            FileSection::new("README.md", "# Shop\n"),
            FileSection::new("order-service/src/main/java/App.java", "class App {\n}\n"),
            FileSection::new("order-service/pom.xml", "<project/>\n"),
            FileSection::new("docker/.env", ""),
        ];

        let doc = render_sections(&expected);
        let written = materialize(&doc, temp.path()).unwrap();

        assert_eq!(written.len(), expected.len());
        for section in &expected {
            let on_disk = fs::read_to_string(temp.path().join(&section.path)).unwrap();
            assert_eq!(on_disk, section.content, "{}", section.path);
        }
    }

    #[test]
    fn test_materialize_overwrites() {
        let temp = TempDir::new().unwrap();
        materialize("a.txt\n---\n```\nold\n```\n", temp.path()).unwrap();
        materialize("a.txt\n---\n```\nnew\n```\n", temp.path()).unwrap();
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "new\n");
    }

    #[test]
    fn test_materialize_rejects_escape_before_writing() {
        let temp = TempDir::new().unwrap();
        let doc = "ok.txt\n---\n```\nx\n```\n../escape.txt\n---\n```\ny\n```\n";
        let err = materialize(doc, temp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::PathTraversal(_)));
        assert!(!temp.path().join("ok.txt").exists());
    }

    #[test]
    fn test_render_tree() {
        let paths = vec![
            "svc/src/App.java".to_string(),
            "svc/pom.xml".to_string(),
            "README.md".to_string(),
        ];
        let tree = render_tree("out", &paths);
        let expected = "out\n\
                        ├── README.md\n\
                        └── svc\n\
                        \u{20}   ├── pom.xml\n\
                        \u{20}   └── src\n\
                        \u{20}       └── App.java\n";
        assert_eq!(tree, expected);
    }
}
