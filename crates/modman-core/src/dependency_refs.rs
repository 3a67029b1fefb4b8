//! Turning dependency declarations into build references.
//!
//! A declaration with `reference = true` asks for the installed package's
//! entry file to be referenced by the build. The installed packages are walked
//! until every wanted ID has been seen, then the walk stops.

use crate::behavior::VersionBehavior;
use crate::diagnostics::{Diagnostics, Severity};
use crate::discovery::{DiscoveredPackage, PackageWalker};
use crate::reconcile::DependencyDeclaration;
use crate::references::BuildReference;
use crate::version::SemanticVersion;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A build reference to an installed package's entry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    /// Unique ID of the referenced package.
    pub unique_id: String,

    /// Name of the reference.
    pub assembly: String,

    /// Full path to the entry file.
    pub hint_path: PathBuf,

    /// Always `false`: installed packages are never bundled.
    pub private: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_behavior: Option<VersionBehavior>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub defining_project: Option<PathBuf>,
}

impl ResolvedReference {
    /// The reference as the build will hand it back for classification.
    #[must_use]
    pub fn to_build_reference(&self) -> BuildReference {
        BuildReference {
            private: Some(self.private),
            version_behavior: self.version_behavior,
            ..BuildReference::new(&self.hint_path)
        }
    }
}

/// Resolve every declaration that wants a reference against the packages
/// installed under `mods_path`.
///
/// Problems with individual declarations are reported as errors and the
/// declaration is skipped. Returns the references that could be resolved.
pub fn resolve_dependency_references(
    declarations: &[DependencyDeclaration],
    mods_path: Option<&Path>,
    diagnostics: &mut Diagnostics,
) -> Vec<ResolvedReference> {
    let mut wanted: HashMap<&str, &DependencyDeclaration> = HashMap::new();
    for declaration in declarations.iter().filter(|d| d.reference) {
        let unique_id = declaration.unique_id.trim();
        if unique_id.is_empty() {
            continue;
        }
        if declaration.required == Some(false) {
            diagnostics.push_for(
                Severity::Error,
                format!("Dependency '{unique_id}' wants a reference, but is set to not required."),
                declaration.defining_project.as_deref(),
            );
        }
        wanted.insert(unique_id, declaration);
    }

    if wanted.is_empty() {
        diagnostics.debug("No dependency declarations want references.");
        return Vec::new();
    }

    let Some(mods_path) = mods_path.filter(|path| path.is_dir()) else {
        diagnostics.error("The provided mods directory is empty or missing.");
        return Vec::new();
    };

    let mut resolved = Vec::new();
    for package in PackageWalker::new(mods_path) {
        if let Some(declaration) = wanted.remove(package.unique_id()) {
            if let Some(reference) = resolve_one(&package, declaration, diagnostics) {
                resolved.push(reference);
            }
            if wanted.is_empty() {
                break;
            }
        }
    }

    let mut missing: Vec<(&str, &DependencyDeclaration)> = wanted.into_iter().collect();
    missing.sort_by_key(|(unique_id, _)| *unique_id);
    for (unique_id, declaration) in missing {
        diagnostics.push_for(
            Severity::Error,
            format!("Could not find mod '{unique_id}' to reference."),
            declaration.defining_project.as_deref(),
        );
    }

    resolved
}

fn resolve_one(
    package: &DiscoveredPackage,
    declaration: &DependencyDeclaration,
    diagnostics: &mut Diagnostics,
) -> Option<ResolvedReference> {
    let unique_id = package.unique_id();
    let origin = declaration.defining_project.as_deref();
    let mut fail = |message: String| {
        diagnostics.push_for(Severity::Error, message, origin);
        None
    };

    let Some(entry_dll) = package.manifest.entry_dll.as_deref().filter(|e| !e.is_empty()) else {
        return fail(format!(
            "The mod '{unique_id}' does not have an EntryDll and therefore cannot be used as a reference."
        ));
    };

    let hint_path = package.path.join(entry_dll);
    if !hint_path.is_file() {
        return fail(format!(
            "Cannot find EntryDll '{entry_dll}' for mod '{unique_id}'."
        ));
    }

    if let Some(raw) = declaration.declared_version() {
        match SemanticVersion::parse(raw) {
            Err(_) => {
                return fail(format!(
                    "Could not parse required version '{raw}' for mod '{unique_id}'."
                ));
            }
            Ok(required) if required.is_newer_than(&package.version, false) => {
                return fail(format!(
                    "Mod '{unique_id}' is version '{}', which does not meet required version '{required}'.",
                    package.version
                ));
            }
            Ok(_) => {}
        }
    }

    diagnostics.push_for(
        Severity::Info,
        format!(
            "Found mod '{unique_id}' with version '{}' at '{}'.",
            package.version,
            hint_path.display()
        ),
        origin,
    );

    let assembly = declaration
        .assembly
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .or_else(|| {
            Path::new(entry_dll)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| entry_dll.to_string());

    Some(ResolvedReference {
        unique_id: unique_id.to_string(),
        assembly,
        hint_path,
        private: false,
        version_behavior: declaration.version_behavior,
        defining_project: declaration.defining_project.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MANIFEST_FILE;
    use std::fs;
    use tempfile::TempDir;

    fn install(root: &Path, dir: &str, id: &str, version: &str, entry: Option<&str>) -> PathBuf {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        let entry_field = entry
            .map(|e| format!(r#", "EntryDll": "{e}""#))
            .unwrap_or_default();
        fs::write(
            path.join(MANIFEST_FILE),
            format!(r#"{{ "UniqueID": "{id}", "Version": "{version}"{entry_field} }}"#),
        )
        .unwrap();
        if let Some(entry) = entry {
            fs::write(path.join(entry), "").unwrap();
        }
        path
    }

    fn wants(id: &str) -> DependencyDeclaration {
        DependencyDeclaration {
            reference: true,
            ..DependencyDeclaration::new(id)
        }
    }

    #[test]
    fn resolves_installed_entry_files() {
        let tmp = TempDir::new().unwrap();
        let dir = install(tmp.path(), "SpaceCore", "spacechase0.SpaceCore", "1.27.0", Some("SpaceCore.dll"));
        install(tmp.path(), "Other", "x.other", "1.0.0", Some("Other.dll"));

        let declaration = DependencyDeclaration {
            version: Some("1.25".to_string()),
            version_behavior: Some(VersionBehavior::Ignore),
            ..wants("spacechase0.SpaceCore")
        };
        let mut diagnostics = Diagnostics::new();
        let resolved = resolve_dependency_references(
            &[declaration, DependencyDeclaration::new("x.other")],
            Some(tmp.path()),
            &mut diagnostics,
        );

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].assembly, "SpaceCore");
        assert_eq!(resolved[0].hint_path, dir.join("SpaceCore.dll"));
        assert!(!resolved[0].private);
        assert_eq!(resolved[0].version_behavior, Some(VersionBehavior::Ignore));
        assert!(!diagnostics.has_errors());

        let build = resolved[0].to_build_reference();
        assert_eq!(build.private, Some(false));
        assert_eq!(build.path, dir.join("SpaceCore.dll"));
    }

    #[test]
    fn assembly_name_override() {
        let tmp = TempDir::new().unwrap();
        install(tmp.path(), "Lib", "x.lib", "1.0.0", Some("Lib.Core.dll"));

        let declaration = DependencyDeclaration {
            assembly: Some("Lib.Api".to_string()),
            ..wants("x.lib")
        };
        let mut diagnostics = Diagnostics::new();
        let resolved =
            resolve_dependency_references(&[declaration], Some(tmp.path()), &mut diagnostics);
        assert_eq!(resolved[0].assembly, "Lib.Api");
    }

    #[test]
    fn reports_unusable_packages() {
        let tmp = TempDir::new().unwrap();
        install(tmp.path(), "a", "x.noentry", "1.0.0", None);
        let missing_file = install(tmp.path(), "b", "x.nofile", "1.0.0", Some("NoFile.dll"));
        fs::remove_file(missing_file.join("NoFile.dll")).unwrap();
        install(tmp.path(), "c", "x.old", "1.0.0", Some("Old.dll"));
        install(tmp.path(), "d", "x.badver", "1.0.0", Some("BadVer.dll"));

        let declarations = [
            wants("x.noentry"),
            wants("x.nofile"),
            DependencyDeclaration {
                version: Some("1.1".to_string()),
                ..wants("x.old")
            },
            DependencyDeclaration {
                version: Some("one".to_string()),
                ..wants("x.badver")
            },
            wants("x.absent"),
        ];
        let mut diagnostics = Diagnostics::new();
        let resolved =
            resolve_dependency_references(&declarations, Some(tmp.path()), &mut diagnostics);

        assert!(resolved.is_empty());
        assert_eq!(diagnostics.count(Severity::Error), 5);
        assert!(diagnostics
            .iter()
            .any(|d| d.message == "Could not find mod 'x.absent' to reference."));
    }

    #[test]
    fn reference_to_optional_dependency_is_an_error() {
        let tmp = TempDir::new().unwrap();
        install(tmp.path(), "a", "x.a", "1.0.0", Some("A.dll"));

        let declaration = DependencyDeclaration {
            required: Some(false),
            defining_project: Some(PathBuf::from("/work/Mod.csproj")),
            ..wants("x.a")
        };
        let mut diagnostics = Diagnostics::new();
        let resolved =
            resolve_dependency_references(&[declaration], Some(tmp.path()), &mut diagnostics);

        assert_eq!(resolved.len(), 1);
        let error = diagnostics
            .iter()
            .find(|d| d.severity == Severity::Error)
            .unwrap();
        assert_eq!(error.file.as_deref(), Some(Path::new("/work/Mod.csproj")));
    }

    #[test]
    fn missing_mods_directory() {
        let tmp = TempDir::new().unwrap();
        let mut diagnostics = Diagnostics::new();
        let resolved = resolve_dependency_references(
            &[wants("x.a")],
            Some(&tmp.path().join("missing")),
            &mut diagnostics,
        );
        assert!(resolved.is_empty());
        assert!(diagnostics.has_errors());

        let mut diagnostics = Diagnostics::new();
        resolve_dependency_references(&[DependencyDeclaration::new("x.a")], None, &mut diagnostics);
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.count(Severity::Debug), 1);
    }
}
