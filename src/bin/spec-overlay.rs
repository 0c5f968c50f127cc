//! Spec Overlay CLI
//!
//! Command-line driver for the overlay resolution pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use spec_overlay::{run, PipelineOptions};

#[derive(Parser)]
#[command(name = "spec-overlay")]
#[command(about = "Resolve overlays against a tree of specification documents")]
#[command(version)]
#[command(group(ArgGroup::new("spec_input").required(true)))]
struct Cli {
    /// Directory of base specification documents
    #[arg(long, group = "spec_input")]
    spec_path: Option<PathBuf>,

    /// Single base specification document
    #[arg(long, group = "spec_input")]
    spec_file: Option<PathBuf>,

    /// Directory of overlay documents
    #[arg(long, conflicts_with = "overlay_file")]
    overlay_path: Option<PathBuf>,

    /// Single overlay document
    #[arg(long)]
    overlay_file: Option<PathBuf>,

    /// Output directory (mirrors input relative paths)
    #[arg(long, short)]
    out: PathBuf,

    /// Target environment for x-environments pruning
    #[arg(long)]
    env: Option<String>,

    /// KEY=VALUE file enabling ${VAR} substitution (process env wins)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Dereference external $refs into self-contained documents
    #[arg(long)]
    bundle: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(spec_path) = cli.spec_path.or(cli.spec_file) else {
        eprintln!("Error: --spec-path or --spec-file is required");
        return ExitCode::from(2);
    };

    let options = PipelineOptions {
        spec_path,
        overlay_path: cli.overlay_path.or(cli.overlay_file),
        out_dir: cli.out.clone(),
        env: cli.env,
        env_file: cli.env_file,
        bundle: cli.bundle,
    };

    match run(&options) {
        Ok(report) => {
            for warning in &report.warnings {
                eprintln!("warning: {}", warning);
            }
            println!(
                "wrote {} document(s) to {}",
                report.written.len(),
                cli.out.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
