//! modman CLI - generate mod manifests from build inputs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod add_references;
mod generate;

#[derive(Parser)]
#[command(name = "modman")]
#[command(version)]
#[command(about = "Generate and validate mod manifests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate manifest.json for a project
    Generate {
        /// Build inputs (JSON)
        #[arg(long)]
        request: PathBuf,

        /// Configuration file (defaults to modman.toml in the project directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Resolve dependency declarations into build references
    AddReferences {
        /// Dependency declarations (JSON)
        #[arg(long)]
        request: PathBuf,

        /// Installed mods directory (overrides the request)
        #[arg(long)]
        mods: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Log to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { request, config } => {
            generate::run(generate::GenerateOptions { request, config })?;
        }

        Commands::AddReferences { request, mods } => {
            add_references::run(add_references::AddReferencesOptions { request, mods })?;
        }
    }

    Ok(())
}
