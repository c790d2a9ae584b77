use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::ChatClient;
use crate::cli::write_output;
use crate::config::{Overrides, Settings};
use crate::patterns::{
    apply_patterns, assign_patterns, emit_outputs, prepare_work_dir, work_dir_for, InputSource,
    PatternOptions, RolesConfig,
};

pub struct PatternsOptions {
    pub payload_stdin: bool,
    pub payload_json: Option<PathBuf>,
    pub input_zip: Option<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub zip_output: Option<PathBuf>,
    pub emit_zip_base64_stdout: bool,
    pub emit_zip_base64_file: Option<PathBuf>,
    pub output_filename: String,
    pub roles_config: Option<PathBuf>,
    pub readme_path: String,
    pub infer_patterns_from_readme: bool,
    pub dry_run: bool,
}

fn read_stdin() -> std::io::Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

pub async fn run_patterns(
    options: PatternsOptions,
    config: Option<&Path>,
    overrides: &Overrides,
) -> Result<()> {
    let source = InputSource::select(
        options.payload_stdin,
        options.payload_json.as_deref(),
        options.input_zip.as_deref(),
        options.input_dir.as_deref(),
        read_stdin,
    )
    .context("Failed to read input project")?;

    let work = work_dir_for(&options.output_dir);
    prepare_work_dir(&source, &work)
        .with_context(|| format!("Failed to prepare working copy at {}", work.display()))?;

    let pattern_options = PatternOptions {
        readme_path: options.readme_path.clone(),
        infer_from_readme: options.infer_patterns_from_readme,
        roles: RolesConfig::load(options.roles_config.as_deref())?,
    };

    if options.dry_run {
        let assignments = assign_patterns(&work, &pattern_options)?;
        let names: Vec<&str> = assignments
            .services
            .iter()
            .map(|a| a.service.name.as_str())
            .collect();
        println!("Services: {:?}", names);
        for assignment in &assignments.services {
            println!(" - {}: {}", assignment.service.name, assignment.patterns);
        }
        return Ok(());
    }

    let settings = Settings::load(config, overrides)?;
    let client = ChatClient::new(&settings).context("Failed to create model client")?;
    info!("🧩 Applying patterns with model {}", client.model());

    let outcomes = apply_patterns(&client, &work, &options.output_dir, &pattern_options)
        .await
        .context("Pattern application failed")?;

    let wants_payload = options.emit_zip_base64_stdout || options.emit_zip_base64_file.is_some();
    let payload = emit_outputs(
        &options.output_dir,
        options.zip_output.as_deref(),
        wants_payload.then_some(options.output_filename.as_str()),
    )?;

    if let Some(payload) = payload {
        let json = payload.to_json();
        if let Some(path) = &options.emit_zip_base64_file {
            write_output(path, json.as_bytes())?;
            info!("📝 Wrote payload to {}", path.display());
        }
        if options.emit_zip_base64_stdout {
            println!("{}", json);
            return Ok(());
        }
    }

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    println!(
        "✅ Augmented {} service(s) into {}",
        outcomes.len() - failed,
        options.output_dir.display()
    );
    for outcome in &outcomes {
        match &outcome.error {
            Some(e) => println!("   {}: failed ({})", outcome.service, e),
            None => println!("   {}: {} file(s)", outcome.service, outcome.files.len()),
        }
    }

    Ok(())
}
