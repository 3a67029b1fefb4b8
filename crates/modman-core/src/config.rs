//! Builder configuration (`modman.toml`) parsing and validation.
//!
//! Every key is optional:
//!
//! ```toml
//! always_set_entry_dll = false
//! warnings_as_errors = false
//! append_configuration = false
//! manifest_schema = "true"            # or "false", or a schema URL
//!
//! [dependencies]
//! version_behavior = "Warning"
//! always_include_required = true
//!
//! [references]
//! version_behavior = "UpdateNoPrerelease"
//!
//! [minimum_api_version]
//! behavior = "Update"
//!
//! [minimum_game_version]
//! behavior = "Update"
//!
//! [content_packs]
//! version_behavior = "Set"             # Ignore, Set, Update, or Read
//!
//! [runtime]
//! core = ["StardewModdingAPI"]
//! platform = ["Stardew Valley"]
//! core_assemblies_dir = "/games/stardew/smapi-internal"
//!
//! [paths]
//! game = "/games/stardew"
//! ```

use crate::behavior::VersionBehavior;
use crate::content_packs::ContentPackBehavior;
use crate::reconcile::ReconcileOptions;
use crate::references::{assemblies_in, ReferenceClassifier};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// The configuration filename.
pub const CONFIG_FILE: &str = "modman.toml";

/// Schema written to `$schema` when `manifest_schema` is `true`.
pub const DEFAULT_SCHEMA_URL: &str = "https://smapi.io/schemas/manifest.json";

/// Assemblies shipped with the platform.
pub const DEFAULT_PLATFORM_ASSEMBLIES: &[&str] = &[
    "BmFont",
    "FAudio-CS",
    "GalaxyCSharp",
    "GalaxyCSharpGlue",
    "Lidgren.Network",
    "MonoGame.Framework",
    "SkiaSharp",
    "Stardew Valley",
    "StardewValley.GameData",
    "Steamworks.NET",
    "TextCopy",
    "xTile",
];

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// The complete builder configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Overwrite `EntryDll` even when the manifest already has one.
    #[serde(default)]
    pub always_set_entry_dll: bool,

    /// Treat every warning as an error.
    #[serde(default)]
    pub warnings_as_errors: bool,

    /// Append non-release build configurations to the prerelease tag.
    #[serde(default)]
    pub append_configuration: bool,

    /// `"true"`, `"false"`, or a schema URL.
    #[serde(default)]
    pub manifest_schema: Option<String>,

    #[serde(default)]
    pub dependencies: DependencySettings,

    #[serde(default)]
    pub references: ReferenceSettings,

    #[serde(default)]
    pub minimum_api_version: MinimumVersionSettings,

    #[serde(default)]
    pub minimum_game_version: MinimumVersionSettings,

    #[serde(default)]
    pub content_packs: ContentPackSettings,

    #[serde(default)]
    pub runtime: RuntimeSettings,

    #[serde(default)]
    pub paths: PathSettings,
}

/// `[dependencies]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DependencySettings {
    pub version_behavior: VersionBehavior,
    pub always_include_required: bool,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            version_behavior: VersionBehavior::Warning,
            always_include_required: true,
        }
    }
}

/// `[references]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReferenceSettings {
    pub version_behavior: VersionBehavior,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            version_behavior: VersionBehavior::UpdateNoPrerelease,
        }
    }
}

/// `[minimum_api_version]` and `[minimum_game_version]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinimumVersionSettings {
    pub behavior: VersionBehavior,
}

impl Default for MinimumVersionSettings {
    fn default() -> Self {
        Self {
            behavior: VersionBehavior::Update,
        }
    }
}

/// `[content_packs]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentPackSettings {
    pub version_behavior: ContentPackBehavior,
}

impl Default for ContentPackSettings {
    fn default() -> Self {
        Self {
            version_behavior: ContentPackBehavior::Set,
        }
    }
}

/// `[runtime]`: which references are the core runtime and the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    /// Reference names that carry the core runtime version.
    pub core: Vec<String>,

    /// Reference names that carry the platform version.
    pub platform: Vec<String>,

    /// Other assemblies shipped with the core runtime.
    pub core_assemblies: Vec<String>,

    /// Directory whose `.dll`/`.exe` files ship with the core runtime.
    pub core_assemblies_dir: Option<PathBuf>,

    /// Other assemblies shipped with the platform.
    pub platform_assemblies: Vec<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            core: vec!["StardewModdingAPI".to_string()],
            platform: vec!["Stardew Valley".to_string()],
            core_assemblies: Vec::new(),
            core_assemblies_dir: None,
            platform_assemblies: DEFAULT_PLATFORM_ASSEMBLIES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

/// `[paths]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    /// Installed packages. Defaults to `<game>/Mods`.
    pub mods: Option<PathBuf>,

    /// Platform installation directory.
    pub game: Option<PathBuf>,
}

impl BuildConfig {
    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load `modman.toml` from `dir`, or the defaults if there is none.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if path.is_file() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid, names an unknown version
    /// behavior, or has an invalid value.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.schema_url()?;

        if self.runtime.core.iter().all(|name| name.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "runtime.core",
                reason: "at least one name is required".to_string(),
            });
        }
        if self.runtime.platform.iter().all(|name| name.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "runtime.platform",
                reason: "at least one name is required".to_string(),
            });
        }
        Ok(())
    }

    /// The `$schema` value to write, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if `manifest_schema` is neither a boolean nor a URL.
    pub fn schema_url(&self) -> Result<Option<String>, ConfigError> {
        let Some(raw) = self
            .manifest_schema
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Ok(None);
        };

        if raw.eq_ignore_ascii_case("true") {
            return Ok(Some(DEFAULT_SCHEMA_URL.to_string()));
        }
        if raw.eq_ignore_ascii_case("false") {
            return Ok(None);
        }

        Url::parse(raw)
            .map(|url| Some(url.to_string()))
            .map_err(|e| ConfigError::InvalidValue {
                key: "manifest_schema",
                reason: format!("'{raw}' must be a boolean or a valid URL ({e})"),
            })
    }

    /// The installed packages directory.
    #[must_use]
    pub fn mods_dir(&self) -> Option<PathBuf> {
        self.paths
            .mods
            .clone()
            .or_else(|| self.paths.game.as_ref().map(|game| game.join("Mods")))
    }

    #[must_use]
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            dependency_behavior: self.dependencies.version_behavior,
            reference_behavior: self.references.version_behavior,
            always_include_required: self.dependencies.always_include_required,
        }
    }

    /// A classifier for the configured runtime, including the assemblies
    /// found in `core_assemblies_dir`.
    #[must_use]
    pub fn reference_classifier(&self) -> ReferenceClassifier {
        let runtime = &self.runtime;
        let from_dir = runtime
            .core_assemblies_dir
            .as_deref()
            .map(assemblies_in)
            .unwrap_or_default();

        ReferenceClassifier::new(runtime.core.iter().cloned(), runtime.platform.iter().cloned())
            .with_core_assemblies(runtime.core_assemblies.iter().cloned().chain(from_dir))
            .with_platform_assemblies(runtime.platform_assemblies.iter().cloned())
    }
}
