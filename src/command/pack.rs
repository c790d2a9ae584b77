use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::cli::write_output;
use crate::pipeline::PipelineArtifact;
use crate::workspace::{list_entries, pack_dir, pack_tree, Payload};

pub struct PackOptions {
    pub root: Option<PathBuf>,
    pub tree: Option<PathBuf>,
    pub zip_output: Option<PathBuf>,
    pub emit_zip_base64_stdout: bool,
    pub filename: String,
}

fn build_zip(options: &PackOptions) -> Result<Vec<u8>> {
    if let Some(root) = &options.root {
        if !root.is_dir() {
            anyhow::bail!("Project directory does not exist: {}", root.display());
        }
        return pack_dir(root).with_context(|| format!("Failed to zip {}", root.display()));
    }
    let Some(path) = &options.tree else {
        anyhow::bail!("Provide --root or --tree");
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tree file: {}", path.display()))?;
    let tree = PipelineArtifact::tree(&raw)
        .and_then(PipelineArtifact::into_tree)
        .with_context(|| format!("Invalid project tree: {}", path.display()))?;
    Ok(pack_tree(&tree)?)
}

pub async fn run_pack(options: PackOptions) -> Result<()> {
    let bytes = build_zip(&options)?;

    if let Some(path) = &options.zip_output {
        write_output(path, &bytes)?;
        info!("📦 Wrote {} ({} bytes)", path.display(), bytes.len());
    }

    if options.emit_zip_base64_stdout {
        println!("{}", Payload::from_zip(options.filename.as_str(), &bytes).to_json());
    } else if options.zip_output.is_none() {
        for entry in list_entries(&bytes)? {
            println!("{}", entry);
        }
    }

    Ok(())
}
