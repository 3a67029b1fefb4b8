//! Manifest generation for game mods.
//!
//! This crate provides:
//! - A semantic version type with a fourth `revision` component
//! - Parsing and writing of `manifest.json` package descriptors
//! - Discovery of installed packages under a directory tree
//! - Classification of build references into runtime, platform, and packages
//! - Dependency reconciliation under per-dependency version behaviors
//! - Version sync for bundled content packs
//! - The full manifest generation run, configured by `modman.toml`

mod behavior;
mod config;
mod content_packs;
mod dependency_refs;
mod diagnostics;
mod discovery;
mod generate;
mod manifest;
mod reconcile;
mod references;
mod request;
mod update_keys;
mod version;

pub use behavior::{first_behavior, BehaviorOverrides, UnknownBehavior, VersionBehavior};
pub use config::{
    BuildConfig, ConfigError, ContentPackSettings, DependencySettings, MinimumVersionSettings,
    PathSettings, ReferenceSettings, RuntimeSettings, CONFIG_FILE, DEFAULT_PLATFORM_ASSEMBLIES,
    DEFAULT_SCHEMA_URL,
};
pub use content_packs::{
    sync_content_packs, ContentPack, ContentPackBehavior, UpdatedContentPack,
};
pub use dependency_refs::{resolve_dependency_references, ResolvedReference};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use discovery::{DiscoveredPackage, InstalledPackages, PackageWalker};
pub use generate::{GenerateReport, ManifestGenerator};
pub use manifest::{
    is_valid_unique_id, ContentPackFor, DependencyRecord, ManifestError, ModManifest,
    MANIFEST_FILE,
};
pub use reconcile::{
    reconcile, DependencyDeclaration, DependencyMerge, ReconcileOptions, ReconciledDependencies,
};
pub use references::{
    assemblies_in, AssemblyIdentity, BuildReference, ClassifiedReferences, ManifestReference,
    PackageReference, ReferenceClassifier,
};
pub use request::{GenerateRequest, InputError, ReferenceRequest};
pub use update_keys::{merge_update_keys, validate_update_keys, UpdateKey, UpdateProvider};
pub use version::{SemanticVersion, VersionError, VersionFormat};
