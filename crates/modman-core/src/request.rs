//! Build inputs, as handed over by the build system in JSON form.

use crate::content_packs::ContentPack;
use crate::reconcile::DependencyDeclaration;
use crate::references::BuildReference;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when reading a request.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read request file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse request: {0}")]
    Parse(#[from] serde_json::Error),
}

fn default_manifest_name() -> String {
    crate::manifest::MANIFEST_FILE.to_string()
}

/// Inputs for generating one manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    /// Directory of the project being built.
    pub project_dir: PathBuf,

    /// The project file, used to attribute diagnostics.
    #[serde(default)]
    pub project_path: Option<PathBuf>,

    /// Name of the compiled assembly, without extension.
    pub assembly_name: String,

    /// Output manifest, relative to `project_dir`.
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Manifest to start from: `new` (or absent) for an empty one, otherwise
    /// a path relative to `project_dir`.
    #[serde(default)]
    pub base_manifest: Option<String>,

    /// Build configuration, e.g. `Debug` or `Release`.
    #[serde(default)]
    pub configuration: Option<String>,

    /// Package version.
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub authors: Option<String>,

    /// Deprecated in favor of `authors`.
    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub unique_id: Option<String>,

    /// Explicit minimum core runtime version, or `auto`.
    #[serde(default)]
    pub minimum_api_version: Option<String>,

    /// Explicit minimum platform version, or `auto`.
    #[serde(default)]
    pub minimum_game_version: Option<String>,

    /// Update keys; each entry may hold several comma-separated keys.
    #[serde(default)]
    pub update_keys: Option<Vec<String>>,

    /// Installed packages directory, overriding the configured one.
    #[serde(default)]
    pub mods_path: Option<PathBuf>,

    #[serde(default)]
    pub references: Vec<BuildReference>,

    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,

    /// Content packs bundled with the project.
    #[serde(default)]
    pub content_packs: Vec<ContentPack>,
}

impl GenerateRequest {
    /// Load a request from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Path the manifest is written to.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.project_dir.join(&self.manifest_name)
    }
}

/// Inputs for resolving dependency declarations into build references.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceRequest {
    #[serde(default)]
    pub project_path: Option<PathBuf>,

    #[serde(default)]
    pub mods_path: Option<PathBuf>,

    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
}

impl ReferenceRequest {
    /// Load a request from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
