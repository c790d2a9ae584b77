use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::cli::read_input;
use crate::workspace::apply_json;

pub async fn run_apply_plan(plan: &str, root: &Path) -> Result<()> {
    let raw = read_input(plan)?;
    let summary = apply_json(&raw, root).context("Failed to apply plan")?;

    info!(
        "🛠️ Applied {} action(s) to {}",
        summary.applied.len(),
        root.display()
    );
    if !summary.is_clean() {
        warn!("{} action(s) failed", summary.errors.len());
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_apply_plan_from_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("project");
        let plan = temp.path().join("plan.json");
        std::fs::write(
            &plan,
            r#"{"actions": [{"op": "write", "path": "svc/README.md", "content": "hi"}]}"#,
        )
        .unwrap();

        run_apply_plan(plan.to_str().unwrap(), &root).await.unwrap();
        assert_eq!(std::fs::read_to_string(root.join("svc/README.md")).unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_invalid_plan_fails() {
        let temp = TempDir::new().unwrap();
        let plan = temp.path().join("plan.json");
        std::fs::write(&plan, r#"{"steps": []}"#).unwrap();
        assert!(run_apply_plan(plan.to_str().unwrap(), temp.path()).await.is_err());
    }
}
