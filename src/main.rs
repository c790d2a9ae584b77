use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod cli;
mod command;
mod config;
mod domain;
mod error;
mod parse;
mod patterns;
mod pipeline;
mod workspace;

use cli::{Cli, Commands};
use command::{GenerateOptions, PackOptions, PatternsOptions};
use config::Overrides;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli).await;
    if let Err(e) = &result {
        error!("❌ {:#}", e);
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();

    match cli.command {
        Some(Commands::Generate {
            specs,
            user_stories,
            input_file,
            output_dir,
            zip_output,
            emit_zip_base64_stdout,
            workers,
            timeout_secs,
            retriever_url,
        }) => {
            let overrides = Overrides {
                model: cli.model,
                workers,
                timeout_secs,
                retriever_url,
            };
            command::run_generate(
                GenerateOptions {
                    specs,
                    user_stories,
                    input_file,
                    output_dir,
                    zip_output,
                    emit_zip_base64_stdout,
                },
                config,
                &overrides,
            )
            .await?;
        }
        Some(Commands::ApplyPlan { plan, root }) => {
            command::run_apply_plan(&plan, &root).await?;
        }
        Some(Commands::Materialize {
            input,
            root,
            dry_run,
        }) => {
            command::run_materialize(&input, &root, dry_run).await?;
        }
        Some(Commands::Pack {
            root,
            tree,
            zip_output,
            emit_zip_base64_stdout,
            filename,
        }) => {
            command::run_pack(PackOptions {
                root,
                tree,
                zip_output,
                emit_zip_base64_stdout,
                filename,
            })
            .await?;
        }
        Some(Commands::Patterns {
            payload_stdin,
            payload_json,
            input_zip,
            input_dir,
            output_dir,
            zip_output,
            emit_zip_base64_stdout,
            emit_zip_base64_file,
            output_filename,
            roles_config,
            readme_path,
            infer_patterns_from_readme,
            dry_run,
        }) => {
            let overrides = Overrides {
                model: cli.model,
                ..Default::default()
            };
            command::run_patterns(
                PatternsOptions {
                    payload_stdin,
                    payload_json,
                    input_zip,
                    input_dir,
                    output_dir,
                    zip_output,
                    emit_zip_base64_stdout,
                    emit_zip_base64_file,
                    output_filename,
                    roles_config,
                    readme_path,
                    infer_patterns_from_readme,
                    dry_run,
                },
                config,
                &overrides,
            )
            .await?;
        }
        None => {
            // No command specified, show help
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Use 'archgen generate --input-file <file> --output-dir <dir>' to start.");
        }
    }

    Ok(())
}
