//! Implementation of the `modman generate` command.

use anyhow::{bail, Context, Result};
use modman_core::{BuildConfig, GenerateRequest, ManifestGenerator, Severity};
use std::path::PathBuf;

/// Options for generating a manifest.
#[derive(Debug)]
pub struct GenerateOptions {
    /// Path to the JSON build inputs.
    pub request: PathBuf,
    /// Explicit configuration file.
    pub config: Option<PathBuf>,
}

/// Load the configuration named on the command line, or the one next to the
/// project.
fn load_config(options: &GenerateOptions, request: &GenerateRequest) -> Result<BuildConfig> {
    match &options.config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            BuildConfig::from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => BuildConfig::discover(&request.project_dir).with_context(|| {
            format!(
                "Failed to load config from {}",
                request.project_dir.display()
            )
        }),
    }
}

/// Generate the manifest and fail if any error was reported.
pub fn run(options: GenerateOptions) -> Result<()> {
    let request = GenerateRequest::from_path(&options.request)
        .with_context(|| format!("Failed to read request {}", options.request.display()))?;
    let config = load_config(&options, &request)?;

    let report = ManifestGenerator::new(config).run(&request);

    let errors = report
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = report
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();

    if report.written {
        println!(
            "Wrote {} ({warnings} warning(s), {errors} error(s))",
            report.output_path.display()
        );
    }
    for pack in &report.content_packs {
        match &pack.version {
            Some(version) => println!("Content pack {}: {version}", pack.path.display()),
            None => tracing::debug!(pack = %pack.path.display(), "content pack skipped"),
        }
    }

    if !report.succeeded() {
        bail!("manifest generation reported {errors} error(s)");
    }

    Ok(())
}
