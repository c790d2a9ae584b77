use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// archgen - microservice architecture generator
#[derive(Parser)]
#[command(name = "archgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to ~/.archgen/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Select model to use
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a microservice project from a system description and user stories
    Generate {
        /// System description file
        #[arg(long, required_unless_present = "input_file", requires = "user_stories")]
        specs: Option<PathBuf>,

        /// User stories file
        #[arg(long, requires = "specs")]
        user_stories: Option<PathBuf>,

        /// Single file with `# SYSTEM DESCRIPTION:` and `# USER STORIES:` sections
        #[arg(long, conflicts_with_all = ["specs", "user_stories"])]
        input_file: Option<PathBuf>,

        /// Directory for the project and audit artifacts
        #[arg(long)]
        output_dir: PathBuf,

        /// Also zip the generated project here
        #[arg(long)]
        zip_output: Option<PathBuf>,

        /// Print {"filename","zip_base64"} JSON to stdout
        #[arg(long)]
        emit_zip_base64_stdout: bool,

        /// Concurrent code generation requests
        #[arg(long)]
        workers: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Retriever endpoint for user-story context
        #[arg(long)]
        retriever_url: Option<String>,
    },
    /// Apply an update plan to a project directory
    ApplyPlan {
        /// Plan JSON file, or `-` for stdin
        #[arg(long)]
        plan: String,

        /// Project root
        #[arg(long)]
        root: PathBuf,
    },
    /// Write a file-section document to disk
    Materialize {
        /// Document file, or `-` for stdin
        #[arg(long)]
        input: String,

        /// Project root
        #[arg(long)]
        root: PathBuf,

        /// Only print the files that would be written
        #[arg(long)]
        dry_run: bool,
    },
    /// Zip a project directory or a JSON project tree
    Pack {
        /// Project directory
        #[arg(long, required_unless_present = "tree", conflicts_with = "tree")]
        root: Option<PathBuf>,

        /// JSON file holding a {folders, files} project tree
        #[arg(long)]
        tree: Option<PathBuf>,

        /// Write the zip here
        #[arg(long)]
        zip_output: Option<PathBuf>,

        /// Print {"filename","zip_base64"} JSON to stdout
        #[arg(long)]
        emit_zip_base64_stdout: bool,

        /// Filename used inside the JSON payload
        #[arg(long, default_value = crate::workspace::DEFAULT_PAYLOAD_FILENAME)]
        filename: String,
    },
    /// Add pattern code to the services of an existing project
    Patterns {
        /// Read {"filename","zip_base64"} JSON from stdin
        #[arg(long)]
        payload_stdin: bool,

        /// Path to JSON with {filename, zip_base64}
        #[arg(long)]
        payload_json: Option<PathBuf>,

        /// Project zip
        #[arg(long, conflicts_with = "input_dir")]
        input_zip: Option<PathBuf>,

        /// Project directory
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Where to write the augmented project
        #[arg(long)]
        output_dir: PathBuf,

        /// Optional: zip the augmented project here
        #[arg(long)]
        zip_output: Option<PathBuf>,

        /// Emit {"filename","zip_base64"} JSON to stdout
        #[arg(long)]
        emit_zip_base64_stdout: bool,

        /// Write the same JSON to this file
        #[arg(long)]
        emit_zip_base64_file: Option<PathBuf>,

        /// Filename used inside the JSON payload
        #[arg(long, default_value = crate::patterns::DEFAULT_OUTPUT_FILENAME)]
        output_filename: String,

        /// JSON config with defaults/services (fallback)
        #[arg(long)]
        roles_config: Option<PathBuf>,

        /// README path inside the project root
        #[arg(long, default_value = crate::patterns::DEFAULT_README_PATH)]
        readme_path: String,

        /// Derive patterns from README instead of the roles config
        #[arg(long)]
        infer_patterns_from_readme: bool,

        /// Print the per-service pattern assignment and exit
        #[arg(long)]
        dry_run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_accepts_either_input_form() {
        let cli = Cli::try_parse_from([
            "archgen", "generate", "--input-file", "in.txt", "--output-dir", "out",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Generate { input_file: Some(_), .. })));

        let cli = Cli::try_parse_from([
            "archgen", "-v", "generate", "--specs", "s.md", "--user-stories", "us.md", "--output-dir", "out",
        ])
        .unwrap();
        assert!(cli.verbose);

        assert!(Cli::try_parse_from(["archgen", "generate", "--output-dir", "out"]).is_err());
        assert!(Cli::try_parse_from(["archgen", "generate", "--specs", "s.md", "--output-dir", "out"]).is_err());
    }

    #[test]
    fn test_pack_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["archgen", "pack"]).is_err());
        assert!(Cli::try_parse_from(["archgen", "pack", "--root", "a", "--tree", "t.json"]).is_err());

        let cli = Cli::try_parse_from(["archgen", "pack", "--tree", "t.json"]).unwrap();
        match cli.command {
            Some(Commands::Pack { filename, .. }) => assert_eq!(filename, "microservices_project.zip"),
            _ => panic!("expected pack"),
        }
    }

    #[test]
    fn test_patterns_defaults() {
        assert!(Cli::try_parse_from([
            "archgen", "patterns", "--input-dir", "a", "--input-zip", "b.zip", "--output-dir", "out",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "archgen", "patterns", "--input-dir", "proj", "--output-dir", "out", "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Patterns {
                output_filename,
                readme_path,
                dry_run,
                ..
            }) => {
                assert_eq!(output_filename, "augmented_project.zip");
                assert_eq!(readme_path, "README.md");
                assert!(dry_run);
            }
            _ => panic!("expected patterns"),
        }
    }
}
