use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::api::{ChatClient, HttpRetriever};
use crate::cli::write_output;
use crate::config::{Overrides, Settings};
use crate::pipeline::{split_input, Pipeline, RunInput};
use crate::workspace::{pack_dir, Payload, DEFAULT_PAYLOAD_FILENAME};

pub struct GenerateOptions {
    pub specs: Option<PathBuf>,
    pub user_stories: Option<PathBuf>,
    pub input_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub zip_output: Option<PathBuf>,
    pub emit_zip_base64_stdout: bool,
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}: {}", what, path.display()))
}

fn load_input(options: &GenerateOptions) -> Result<RunInput> {
    if let Some(path) = &options.input_file {
        let text = read_file(path, "input file")?;
        return split_input(&text).with_context(|| format!("Invalid input file: {}", path.display()));
    }
    match (&options.specs, &options.user_stories) {
        (Some(specs), Some(user_stories)) => Ok(RunInput {
            specs: read_file(specs, "system description")?,
            user_stories: read_file(user_stories, "user stories")?,
        }),
        _ => anyhow::bail!("Provide --input-file or both --specs and --user-stories"),
    }
}

pub async fn run_generate(
    options: GenerateOptions,
    config: Option<&Path>,
    overrides: &Overrides,
) -> Result<()> {
    let settings = Settings::load(config, overrides)?;
    let input = load_input(&options)?;
    if input.specs.trim().is_empty() {
        anyhow::bail!("System description is empty");
    }

    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!("Failed to create output directory: {}", options.output_dir.display())
    })?;

    let client = ChatClient::new(&settings).context("Failed to create model client")?;
    info!("🏗️ Generating with model {}", client.model());

    let mut pipeline = Pipeline::new(Arc::new(client), settings.workers, settings.per_doc_limit);
    if let Some(url) = &settings.retriever_url {
        let retriever = HttpRetriever::new(url, &settings).context("Failed to create retriever")?;
        pipeline = pipeline.with_retriever(Arc::new(retriever));
    }

    let report = pipeline
        .run(&input, &options.output_dir)
        .await
        .context("Generation failed")?;

    if options.zip_output.is_some() || options.emit_zip_base64_stdout {
        let bytes = pack_dir(&report.project_root)?;
        if let Some(path) = &options.zip_output {
            write_output(path, &bytes)?;
            info!("📦 Wrote {}", path.display());
        }
        if options.emit_zip_base64_stdout {
            println!("{}", Payload::from_zip(DEFAULT_PAYLOAD_FILENAME, &bytes).to_json());
            return Ok(());
        }
    }

    println!("✅ Project generated at {}", report.project_root.display());
    println!("   Microservices: {}", report.microservices);
    println!(
        "   Code documents: {} ({} empty)",
        report.generated_documents, report.empty_documents
    );
    println!("   Files written: {}", report.written_files);
    for stage in &report.stages {
        println!(
            "   {}: {} applied, {} skipped, {} errors",
            stage.stage, stage.applied, stage.skipped, stage.errors
        );
    }
    if !report.violations.is_empty() {
        println!("⚠️  {} architecture issue(s), see run-report.json", report.violations.len());
    }

    Ok(())
}
