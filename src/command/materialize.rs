use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::cli::read_input;
use crate::workspace::{normalize_rel_path, parse_sections, render_tree, write_sections};

pub async fn run_materialize(input: &str, root: &Path, dry_run: bool) -> Result<()> {
    let doc = read_input(input)?;
    let sections = parse_sections(&doc).context("Failed to parse file sections")?;
    let label = root.display().to_string();

    if dry_run {
        let paths = sections
            .iter()
            .map(|s| normalize_rel_path(&s.path))
            .collect::<Result<Vec<_>, _>>()
            .context("Document contains an unsafe path")?;
        println!("{}", render_tree(&label, &paths));
        return Ok(());
    }

    let written = write_sections(&sections, root)
        .with_context(|| format!("Failed to materialize into {}", root.display()))?;
    info!("📁 Wrote {} file(s)", written.len());
    println!("{}", render_tree(&label, &written));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOC: &str = "svc/app.py\n---\n```python\nprint('hi')\n```\n";

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("doc.md");
        std::fs::write(&input, DOC).unwrap();
        let root = temp.path().join("project");

        run_materialize(input.to_str().unwrap(), &root, true).await.unwrap();
        assert!(!root.exists());

        run_materialize(input.to_str().unwrap(), &root, false).await.unwrap();
        assert!(root.join("svc/app.py").is_file());
    }
}
