//! Implementation of the `modman add-references` command.

use anyhow::{bail, Context, Result};
use modman_core::{resolve_dependency_references, Diagnostics, ReferenceRequest};
use std::path::PathBuf;

/// Options for resolving references.
#[derive(Debug)]
pub struct AddReferencesOptions {
    /// Path to the JSON dependency declarations.
    pub request: PathBuf,
    /// Installed mods directory, overriding the request.
    pub mods: Option<PathBuf>,
}

/// Resolve references and print them to stdout as JSON.
pub fn run(options: AddReferencesOptions) -> Result<()> {
    let request = ReferenceRequest::from_path(&options.request)
        .with_context(|| format!("Failed to read request {}", options.request.display()))?;

    let mods = options.mods.or(request.mods_path);
    let mut diagnostics = Diagnostics::new().with_default_file(request.project_path);
    let resolved =
        resolve_dependency_references(&request.dependencies, mods.as_deref(), &mut diagnostics);
    tracing::debug!(
        declared = request.dependencies.len(),
        resolved = resolved.len(),
        "resolved dependency references"
    );

    let json = serde_json::to_string_pretty(&resolved).context("Failed to serialize references")?;
    println!("{json}");

    if diagnostics.has_errors() {
        bail!(
            "reference resolution reported {} error(s)",
            diagnostics.count(modman_core::Severity::Error)
        );
    }

    Ok(())
}
