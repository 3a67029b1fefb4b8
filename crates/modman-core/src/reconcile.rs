//! Dependency reconciliation.
//!
//! A manifest's dependency list is rebuilt from three sources, in order:
//!
//! 1. the records already in the manifest,
//! 2. explicit dependency declarations from the project,
//! 3. hard references to other packages found by
//!    [`ReferenceClassifier`](crate::references::ReferenceClassifier).
//!
//! The merged list is then checked against the packages installed locally,
//! and each record's minimum version is reported on or rewritten according
//! to its [`VersionBehavior`].

use crate::behavior::{BehaviorOverrides, VersionBehavior};
use crate::diagnostics::{Diagnostics, Severity};
use crate::discovery::InstalledPackages;
use crate::manifest::DependencyRecord;
use crate::references::PackageReference;
use crate::version::SemanticVersion;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A dependency declared by the project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependencyDeclaration {
    /// Unique ID of the package depended on.
    pub unique_id: String,

    /// Minimum version to write into the manifest.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub required: Option<bool>,

    /// Also add a build reference to the package's entry file.
    #[serde(default)]
    pub reference: bool,

    /// Behavior used when validating this dependency.
    #[serde(default)]
    pub version_behavior: Option<VersionBehavior>,

    /// Name of the build reference, when it differs from the entry file's.
    #[serde(default)]
    pub assembly: Option<String>,

    /// Project the declaration came from, used to attribute diagnostics.
    #[serde(default)]
    pub defining_project: Option<PathBuf>,
}

impl DependencyDeclaration {
    #[must_use]
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            ..Self::default()
        }
    }

    /// The declared version, if one was given.
    #[must_use]
    pub fn declared_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Global settings for a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Behavior for dependencies without an override.
    pub dependency_behavior: VersionBehavior,

    /// Behavior for hard references without an override.
    pub reference_behavior: VersionBehavior,

    /// Write `IsRequired: true` explicitly instead of leaving it to the
    /// loader's default.
    pub always_include_required: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dependency_behavior: VersionBehavior::Warning,
            reference_behavior: VersionBehavior::UpdateNoPrerelease,
            always_include_required: true,
        }
    }
}

/// An in-progress merge of dependency records.
#[derive(Debug)]
pub struct DependencyMerge {
    options: ReconcileOptions,
    records: BTreeMap<String, DependencyRecord>,
    overrides: BehaviorOverrides,
}

impl DependencyMerge {
    /// Start from the records already in a manifest. Records without an ID
    /// are dropped.
    pub fn new<I>(existing: I, options: ReconcileOptions) -> Self
    where
        I: IntoIterator<Item = DependencyRecord>,
    {
        let records = existing
            .into_iter()
            .filter(|record| !record.unique_id.is_empty())
            .map(|record| (record.unique_id.clone(), record))
            .collect();

        Self {
            options,
            records,
            overrides: BehaviorOverrides::new(),
        }
    }

    /// Apply explicit dependency declarations.
    pub fn apply_declarations(
        &mut self,
        declarations: &[DependencyDeclaration],
        diagnostics: &mut Diagnostics,
    ) {
        for declaration in declarations {
            let unique_id = declaration.unique_id.trim();
            if unique_id.is_empty() {
                continue;
            }
            let origin = declaration.defining_project.as_deref();

            let version = match declaration.declared_version() {
                Some(raw) => match SemanticVersion::parse(raw) {
                    Ok(_) => Some(raw),
                    Err(e) => {
                        diagnostics.push_for(
                            Severity::Error,
                            format!(
                                "Dependency '{unique_id}' has invalid version that cannot be parsed '{raw}': {e}"
                            ),
                            origin,
                        );
                        None
                    }
                },
                None => None,
            };

            if let Some(behavior) = declaration.version_behavior {
                self.overrides.record(unique_id, behavior);
            }

            let always = self.options.always_include_required;
            let record = self
                .records
                .entry(unique_id.to_string())
                .or_insert_with(|| DependencyRecord::new(unique_id));

            if let Some(version) = version {
                record.minimum_version = Some(version.to_string());
            }

            // A dependency that injects a reference cannot be optional.
            let required = if declaration.reference {
                Some(true)
            } else {
                declaration.required
            };
            if required.is_some() {
                record.is_required = required;
            }

            record.is_required = normalize_required(record.is_required, always);
        }
    }

    /// Apply hard references to other packages.
    pub fn apply_references<'a, I>(&mut self, references: I, diagnostics: &mut Diagnostics)
    where
        I: IntoIterator<Item = &'a PackageReference>,
    {
        let always = self.options.always_include_required;

        for package in references {
            let unique_id = package.unique_id();
            if unique_id.is_empty() {
                continue;
            }

            let behavior = package.behavior.unwrap_or(self.options.reference_behavior);
            self.overrides.record(unique_id, behavior);

            let Some(record) = self.records.get_mut(unique_id) else {
                let mut record = DependencyRecord::new(unique_id);
                record.is_required = always.then_some(true);
                record.minimum_version = behavior
                    .write_format()
                    .map(|format| package.version.format(format));
                self.records.insert(unique_id.to_string(), record);
                continue;
            };

            match record.is_required {
                None if always => {
                    diagnostics.info(format!(
                        "Dependency '{unique_id}' did not have IsRequired set. Changing to true."
                    ));
                    record.is_required = Some(true);
                }
                Some(false) => {
                    diagnostics.warning(format!(
                        "Dependency '{unique_id}' was set as not required, despite having a hard reference. Changing to required."
                    ));
                    record.is_required = always.then_some(true);
                }
                _ => {}
            }
        }
    }

    /// Finish the merge. Records are ordered by unique ID.
    #[must_use]
    pub fn finish(self) -> ReconciledDependencies {
        ReconciledDependencies {
            records: self.records.into_values().collect(),
            overrides: self.overrides,
            default_behavior: self.options.dependency_behavior,
        }
    }
}

/// `IsRequired` defaults to true, so only write it when asked to.
fn normalize_required(value: Option<bool>, always_include_required: bool) -> Option<bool> {
    match value {
        Some(true) if !always_include_required => None,
        None if always_include_required => Some(true),
        other => other,
    }
}

/// The merged dependency list, ready for validation.
#[derive(Debug, Clone)]
pub struct ReconciledDependencies {
    records: Vec<DependencyRecord>,
    overrides: BehaviorOverrides,
    default_behavior: VersionBehavior,
}

impl ReconciledDependencies {
    #[must_use]
    pub fn records(&self) -> &[DependencyRecord] {
        &self.records
    }

    /// The behavior that applies to a dependency.
    #[must_use]
    pub fn behavior_for(&self, unique_id: &str) -> VersionBehavior {
        self.overrides.resolve(unique_id, self.default_behavior)
    }

    /// Check every record against the installed packages.
    ///
    /// Reporting behaviors only emit diagnostics. Writing behaviors rewrite
    /// `MinimumVersion` when it is unset or outdated, or always for `Set*`.
    pub fn validate(&mut self, installed: &InstalledPackages, diagnostics: &mut Diagnostics) {
        for index in 0..self.records.len() {
            let unique_id = self.records[index].unique_id.clone();
            let behavior = self.behavior_for(&unique_id);
            let record = &mut self.records[index];

            let Some(package) = installed.get(&unique_id) else {
                diagnostics.info(format!(
                    "Dependency '{unique_id}' is not present within the game's mod directory."
                ));
                continue;
            };

            if behavior == VersionBehavior::Ignore {
                continue;
            }

            let declared = record
                .minimum_version
                .as_deref()
                .filter(|v| !v.trim().is_empty());
            let mut unparseable = false;
            let current = match declared.map(SemanticVersion::parse) {
                Some(Ok(version)) => Some(version),
                Some(Err(e)) => {
                    diagnostics.error(format!(
                        "MinimumVersion for dependency '{unique_id}' cannot be parsed: {e}"
                    ));
                    unparseable = true;
                    None
                }
                None => None,
            };

            let outdated = match &current {
                None => true,
                Some(version) => {
                    behavior.always_sets()
                        || version.is_older_than(
                            &package.version,
                            behavior == VersionBehavior::Update,
                        )
                }
            };
            if !outdated {
                continue;
            }

            if let Some(format) = behavior.write_format() {
                record.minimum_version = Some(package.version.format(format));
                continue;
            }

            if unparseable {
                continue;
            }

            let severity = Severity::for_policy(behavior == VersionBehavior::Error);
            let message = match declared {
                None => format!(
                    "MinimumVersion for dependency '{unique_id}' is not set. The installed version is '{}'.",
                    package.version
                ),
                Some(declared) => format!(
                    "MinimumVersion for dependency '{unique_id}' is set to '{declared}'. The installed version is '{}', which is newer.",
                    package.version
                ),
            };
            diagnostics.push(severity, message);
        }
    }

    /// The list to store in the manifest. An empty list is `None`.
    #[must_use]
    pub fn into_manifest_list(self) -> Option<Vec<DependencyRecord>> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records)
        }
    }
}

/// Run a whole reconciliation: merge, then validate when anything is left.
///
/// `installed` is only called when the merged list is non-empty, so callers
/// can defer discovery until it is needed.
pub fn reconcile<'a, R, F>(
    existing: Option<Vec<DependencyRecord>>,
    declarations: &[DependencyDeclaration],
    references: R,
    options: ReconcileOptions,
    installed: F,
    diagnostics: &mut Diagnostics,
) -> Option<Vec<DependencyRecord>>
where
    R: IntoIterator<Item = &'a PackageReference>,
    F: FnOnce() -> InstalledPackages,
{
    let mut merge = DependencyMerge::new(existing.unwrap_or_default(), options);
    merge.apply_declarations(declarations, diagnostics);
    merge.apply_references(references, diagnostics);

    let mut reconciled = merge.finish();
    if !reconciled.records().is_empty() {
        reconciled.validate(&installed(), diagnostics);
    }
    reconciled.into_manifest_list()
}
