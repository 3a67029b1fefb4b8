//! Classification of build references.
//!
//! Every reference the project compiles against is one of:
//! - the core runtime (its version becomes the minimum API version),
//! - the platform (its version becomes the minimum game version),
//! - another package, recognized by a `manifest.json` next to the referenced
//!   file whose entry file is that file,
//! - or something else, which is ignored.

use crate::behavior::{first_behavior, VersionBehavior};
use crate::diagnostics::Diagnostics;
use crate::manifest::{ModManifest, MANIFEST_FILE};
use crate::version::SemanticVersion;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// A reference handed over by the build system.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildReference {
    /// Path of the referenced file.
    pub path: PathBuf,

    /// Assembly identity, e.g. `Name, Version=1.2.3.4, Culture=neutral`.
    #[serde(default)]
    pub identity: Option<String>,

    /// Product version embedded in the referenced file, if the build system
    /// could read one.
    #[serde(default)]
    pub product_version: Option<String>,

    /// Whether the file is copied into the build output. Only an explicit
    /// `false` counts as not bundled.
    #[serde(default)]
    pub private: Option<bool>,

    /// Project that produced the file, for project references.
    #[serde(default)]
    pub source_project: Option<PathBuf>,

    /// Per-reference version behavior.
    #[serde(default)]
    pub version_behavior: Option<VersionBehavior>,

    /// Deprecated key for the per-reference version behavior.
    #[serde(default)]
    pub legacy_version_behavior: Option<VersionBehavior>,

    /// Leave this reference out of dependency handling entirely.
    #[serde(default)]
    pub exclude: bool,
}

impl BuildReference {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    fn is_bundled(&self) -> bool {
        self.private != Some(false)
    }

    /// The effective behavior override, newest metadata key first.
    #[must_use]
    pub fn behavior_override(&self) -> Option<VersionBehavior> {
        first_behavior([self.version_behavior, self.legacy_version_behavior])
    }

    fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

/// A parsed assembly identity string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyIdentity {
    pub name: String,
    pub version: Option<String>,
}

impl AssemblyIdentity {
    /// Parse `Name[, Key=Value]*`. Returns `None` if there is no name.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split(',');
        let name = parts.next()?.trim();
        if name.is_empty() || name.contains('=') {
            return None;
        }

        let version = parts
            .filter_map(|part| part.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("Version"))
            .map(|(_, value)| value.trim().to_string());

        Some(Self {
            name: name.to_string(),
            version,
        })
    }
}

/// A package referenced by the build.
#[derive(Debug, Clone)]
pub struct PackageReference {
    /// The referenced file.
    pub path: PathBuf,

    /// Manifest of the referenced package.
    pub manifest: ModManifest,

    /// Parsed version of the referenced package.
    pub version: SemanticVersion,

    /// Per-reference version behavior override.
    pub behavior: Option<VersionBehavior>,
}

impl PackageReference {
    #[must_use]
    pub fn unique_id(&self) -> &str {
        self.manifest.unique_id().unwrap_or_default()
    }
}

/// Result of classifying one reference.
#[derive(Debug, Clone)]
pub enum ManifestReference {
    CoreRuntime(SemanticVersion),
    Platform(SemanticVersion),
    Package(PackageReference),
}

/// Result of classifying every reference of a build.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedReferences {
    pub core_runtime_version: Option<SemanticVersion>,
    pub platform_version: Option<SemanticVersion>,
    /// Package references by unique ID.
    pub packages: BTreeMap<String, PackageReference>,
}

impl ClassifiedReferences {
    pub fn package_references(&self) -> impl Iterator<Item = &PackageReference> {
        self.packages.values()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuntimeSlot {
    Core,
    Platform,
}

impl RuntimeSlot {
    fn label(self) -> &'static str {
        match self {
            Self::Core => "the core runtime",
            Self::Platform => "the platform",
        }
    }
}

/// Sorts build references into runtime, platform, and package references.
#[derive(Debug, Clone, Default)]
pub struct ReferenceClassifier {
    /// Names whose version fills the core runtime slot.
    core_runtime: HashSet<String>,
    /// Names whose version fills the platform slot.
    platform: HashSet<String>,
    /// Every assembly shipped by the core runtime.
    core_provided: HashSet<String>,
    /// Every assembly shipped by the platform.
    platform_provided: HashSet<String>,
}

impl ReferenceClassifier {
    pub fn new<C, P>(core_runtime: C, platform: P) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let core_runtime: HashSet<String> = core_runtime.into_iter().map(Into::into).collect();
        let platform: HashSet<String> = platform.into_iter().map(Into::into).collect();
        Self {
            core_provided: core_runtime.clone(),
            platform_provided: platform.clone(),
            core_runtime,
            platform,
        }
    }

    /// Add assemblies shipped with the core runtime.
    #[must_use]
    pub fn with_core_assemblies<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.core_provided.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add assemblies shipped with the platform.
    #[must_use]
    pub fn with_platform_assemblies<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.platform_provided.extend(names.into_iter().map(Into::into));
        self
    }

    fn slot_for(&self, name: &str) -> Option<RuntimeSlot> {
        if self.core_runtime.contains(name) {
            Some(RuntimeSlot::Core)
        } else if self.platform.contains(name) {
            Some(RuntimeSlot::Platform)
        } else {
            None
        }
    }

    fn provider_of(&self, name: &str) -> Option<RuntimeSlot> {
        if self.core_provided.contains(name) {
            Some(RuntimeSlot::Core)
        } else if self.platform_provided.contains(name) {
            Some(RuntimeSlot::Platform)
        } else {
            None
        }
    }

    /// Classify every reference.
    ///
    /// A second reference to the core runtime or platform is reported and
    /// ignored. For packages, a later reference to the same ID replaces an
    /// earlier one.
    pub fn classify(
        &self,
        references: &[BuildReference],
        diagnostics: &mut Diagnostics,
    ) -> ClassifiedReferences {
        let mut classified = ClassifiedReferences::default();

        for reference in references {
            let slot = reference
                .identity
                .as_deref()
                .filter(|_| !reference.exclude)
                .and_then(AssemblyIdentity::parse)
                .and_then(|identity| self.slot_for(&identity.name));
            let duplicate = match slot {
                Some(RuntimeSlot::Core) => classified.core_runtime_version.is_some(),
                Some(RuntimeSlot::Platform) => classified.platform_version.is_some(),
                None => false,
            };
            if let (Some(slot), true) = (slot, duplicate) {
                diagnostics.warning(format!(
                    "Project has more than one reference to {}.",
                    slot.label()
                ));
                continue;
            }

            match self.classify_reference(reference, diagnostics) {
                Some(ManifestReference::CoreRuntime(version)) => {
                    classified.core_runtime_version = Some(version);
                }
                Some(ManifestReference::Platform(version)) => {
                    classified.platform_version = Some(version);
                }
                Some(ManifestReference::Package(package)) => {
                    classified
                        .packages
                        .insert(package.unique_id().to_string(), package);
                }
                None => {}
            }
        }

        classified
    }

    /// Classify a single reference.
    ///
    /// Returns `None` for references that are excluded, unrecognized, or
    /// whose version cannot be determined.
    pub fn classify_reference(
        &self,
        reference: &BuildReference,
        diagnostics: &mut Diagnostics,
    ) -> Option<ManifestReference> {
        if reference.exclude {
            diagnostics.debug(format!(
                "Skipping reference '{}' with dependency exclusion flag.",
                reference.path.display()
            ));
            return None;
        }

        let identity = reference
            .identity
            .as_deref()
            .and_then(AssemblyIdentity::parse);

        if let Some(identity) = &identity {
            if let Some(provider) = self.provider_of(&identity.name) {
                if reference.is_bundled() {
                    diagnostics.warning(format!(
                        "Reference to '{}', which is provided by {}, does not have <Private> set to \"false\" and may be included in the build output.",
                        identity.name,
                        provider.label()
                    ));
                }
            }

            if let Some(slot) = self.slot_for(&identity.name) {
                let version = read_runtime_version(reference, identity, diagnostics)?;
                return Some(match slot {
                    RuntimeSlot::Core => ManifestReference::CoreRuntime(version),
                    RuntimeSlot::Platform => ManifestReference::Platform(version),
                });
            }
        }

        self.classify_package(reference, diagnostics)
            .map(ManifestReference::Package)
    }

    fn classify_package(
        &self,
        reference: &BuildReference,
        diagnostics: &mut Diagnostics,
    ) -> Option<PackageReference> {
        let manifest_path = sibling_manifest(reference)?;
        let manifest = match ModManifest::from_path(&manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                diagnostics.error(format!(
                    "Unable to read manifest '{}' for reference '{}': {e}",
                    manifest_path.display(),
                    reference.path.display()
                ));
                return None;
            }
        };

        let file_name = reference.file_name()?;
        let entry_matches = manifest
            .entry_dll
            .as_deref()
            .is_some_and(|entry| entry.eq_ignore_ascii_case(file_name));
        if !entry_matches {
            return None;
        }

        let unique_id = manifest.unique_id()?.to_string();
        let version = manifest.parsed_version()?;
        let behavior = reference.behavior_override();

        diagnostics.info(format!(
            "Found reference to mod '{unique_id}' with version {version} (version behavior: {}).",
            behavior.map_or_else(|| "default".to_string(), |b| b.to_string())
        ));

        if reference.is_bundled() {
            diagnostics.warning(format!(
                "Reference to mod '{unique_id}' does not have <Private> set to \"false\" and will be included in the build output."
            ));
        }

        Some(PackageReference {
            path: reference.path.clone(),
            manifest,
            version,
            behavior,
        })
    }
}

/// Read the version of a core runtime or platform reference.
///
/// The embedded product version keeps prerelease tags, so it is preferred;
/// the numeric identity version is the fallback.
fn read_runtime_version(
    reference: &BuildReference,
    identity: &AssemblyIdentity,
    diagnostics: &mut Diagnostics,
) -> Option<SemanticVersion> {
    let embedded = match reference.product_version.as_deref() {
        Some(raw) => SemanticVersion::parse(raw).map_err(|e| e.to_string()),
        None => Err("no product version available".to_string()),
    };

    let version = match embedded {
        Ok(version) => version,
        Err(reason) => {
            diagnostics.warning(format!(
                "Unable to parse '{}' version normally. Using fall back method. Error: {reason}",
                identity.name
            ));
            let fallback = identity
                .version
                .as_deref()
                .map(SemanticVersion::from_assembly_version);
            match fallback {
                Some(Ok(version)) => version,
                Some(Err(e)) => {
                    diagnostics.error(format!(
                        "Unable to determine the version of '{}': {e}",
                        identity.name
                    ));
                    return None;
                }
                None => {
                    diagnostics.error(format!(
                        "Unable to determine the version of '{}': the reference has no version.",
                        identity.name
                    ));
                    return None;
                }
            }
        }
    };

    if version.prerelease().is_some() {
        diagnostics.warning(format!(
            "The referenced version of '{}' ('{version}') is not a standard release.",
            identity.name
        ));
    }

    Some(version)
}

/// Find the manifest for a reference: next to the referenced file, or next
/// to the project that produced it.
fn sibling_manifest(reference: &BuildReference) -> Option<PathBuf> {
    let beside_file = reference
        .path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(MANIFEST_FILE));
    if let Some(path) = beside_file.filter(|path| path.is_file()) {
        return Some(path);
    }

    reference
        .source_project
        .as_deref()
        .filter(|project| project.is_file())
        .and_then(Path::parent)
        .map(|dir| dir.join(MANIFEST_FILE))
        .filter(|path| path.is_file())
}

/// Names of the `.dll` and `.exe` files directly inside `dir`.
///
/// Used to list the assemblies a runtime ships with. A missing directory
/// yields no names.
pub fn assemblies_in(dir: impl AsRef<Path>) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir.as_ref()) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "dll" || ext == "exe")
        })
        .filter_map(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .filter(|stem| !stem.trim().is_empty())
                .map(str::to_string)
        })
        .collect();
    names.sort();
    names
}
