//! One manifest generation run.
//!
//! [`ManifestGenerator::run`] never fails outright: every problem becomes a
//! diagnostic, and the run succeeded iff none of them is an error. Setup
//! problems (no usable version, no core runtime or platform reference, an
//! unreadable base manifest) stop the run before anything is written.

use crate::behavior::VersionBehavior;
use crate::config::BuildConfig;
use crate::content_packs::{sync_content_packs, UpdatedContentPack};
use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::discovery::InstalledPackages;
use crate::manifest::ModManifest;
use crate::reconcile::reconcile;
use crate::references::ClassifiedReferences;
use crate::request::GenerateRequest;
use crate::update_keys::{merge_update_keys, validate_update_keys};
use crate::version::{SemanticVersion, VersionFormat};
use std::path::PathBuf;

/// Outcome of a generation run.
#[derive(Debug)]
pub struct GenerateReport {
    /// The generated manifest, unless setup failed.
    pub manifest: Option<ModManifest>,

    /// Where the manifest is written.
    pub output_path: PathBuf,

    /// Whether the manifest was written.
    pub written: bool,

    /// Bundled content packs after their version sync. Empty unless the
    /// manifest was written.
    pub content_packs: Vec<UpdatedContentPack>,

    pub diagnostics: Vec<Diagnostic>,
}

impl GenerateReport {
    /// Whether the run finished without error diagnostics.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Which minimum version field is being filled in.
#[derive(Debug, Clone, Copy)]
enum Floor {
    Api,
    Game,
}

impl Floor {
    fn field(self) -> &'static str {
        match self {
            Self::Api => "MinimumApiVersion",
            Self::Game => "MinimumGameVersion",
        }
    }

    fn target(self) -> &'static str {
        match self {
            Self::Api => "core runtime",
            Self::Game => "platform",
        }
    }

    /// Precision used for an explicit `auto` value.
    fn auto_format(self) -> VersionFormat {
        match self {
            Self::Api => VersionFormat::Short,
            Self::Game => VersionFormat::Full,
        }
    }
}

/// Generates manifests with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct ManifestGenerator {
    config: BuildConfig,
}

impl ManifestGenerator {
    #[must_use]
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Generate the manifest for `request` and write it.
    pub fn run(&self, request: &GenerateRequest) -> GenerateReport {
        let mut diagnostics = Diagnostics::new()
            .with_warnings_as_errors(self.config.warnings_as_errors)
            .with_default_file(request.project_path.clone());
        let output_path = request.output_path();

        tracing::debug!(
            project = %request.project_dir.display(),
            assembly = %request.assembly_name,
            "generating manifest"
        );

        let manifest = self.generate(request, &mut diagnostics);
        let written = match &manifest {
            Some(manifest) => match manifest.write(&output_path) {
                Ok(()) => {
                    tracing::info!(path = %output_path.display(), "wrote manifest");
                    true
                }
                Err(e) => {
                    diagnostics.error(format!(
                        "Unable to write manifest to '{}': {e}",
                        output_path.display()
                    ));
                    false
                }
            },
            None => false,
        };

        let content_packs = match (&manifest, written) {
            (Some(ModManifest { version: Some(version), .. }), true) => sync_content_packs(
                &request.content_packs,
                &request.project_dir,
                version,
                self.config.content_packs.version_behavior,
                &mut diagnostics,
            ),
            _ => Vec::new(),
        };

        GenerateReport {
            manifest,
            output_path,
            written,
            content_packs,
            diagnostics: diagnostics.into_entries(),
        }
    }

    /// Build the manifest without writing it. Returns `None` when setup
    /// fails.
    pub fn generate(
        &self,
        request: &GenerateRequest,
        diagnostics: &mut Diagnostics,
    ) -> Option<ModManifest> {
        let version = self.package_version(request, diagnostics)?;

        let classified = self
            .config
            .reference_classifier()
            .classify(&request.references, diagnostics);
        let ClassifiedReferences {
            core_runtime_version: Some(core_version),
            platform_version: Some(platform_version),
            ..
        } = &classified
        else {
            diagnostics.error(
                "Packages must reference both the core runtime and the platform. Check the build references.",
            );
            return None;
        };
        diagnostics.debug(format!("Core runtime version: {core_version}"));
        diagnostics.debug(format!("Platform version: {platform_version}"));

        let mut manifest = self.load_base(request, diagnostics)?;

        manifest.version = Some(version.to_string());
        self.apply_identity(&mut manifest, request, diagnostics);

        apply_minimum_version(
            &mut manifest.minimum_api_version,
            request.minimum_api_version.as_deref(),
            Floor::Api,
            self.config.minimum_api_version.behavior,
            core_version,
            diagnostics,
        );
        apply_minimum_version(
            &mut manifest.minimum_game_version,
            request.minimum_game_version.as_deref(),
            Floor::Game,
            self.config.minimum_game_version.behavior,
            &platform_version.without_revision(),
            diagnostics,
        );

        let mods_dir = request.mods_path.clone().or_else(|| self.config.mods_dir());
        manifest.dependencies = reconcile(
            manifest.dependencies.take(),
            &request.dependencies,
            classified.package_references(),
            self.config.reconcile_options(),
            || match &mods_dir {
                Some(dir) => InstalledPackages::discover(dir),
                None => InstalledPackages::default(),
            },
            diagnostics,
        );

        manifest.update_keys = merge_update_keys(
            request.update_keys.as_deref(),
            manifest.update_keys.take(),
            diagnostics,
        );
        if let Some(keys) = &manifest.update_keys {
            validate_update_keys(keys, diagnostics);
        }

        match self.config.schema_url() {
            Ok(Some(url)) => manifest.schema = Some(url),
            Ok(None) => {}
            Err(e) => diagnostics.error(e.to_string()),
        }

        Some(manifest)
    }

    /// The requested version, with the build configuration appended when
    /// configured.
    fn package_version(
        &self,
        request: &GenerateRequest,
        diagnostics: &mut Diagnostics,
    ) -> Option<SemanticVersion> {
        let raw = request.version.trim();
        if raw.is_empty() {
            diagnostics.error("The package version cannot be empty or missing.");
            return None;
        }

        let mut version = match SemanticVersion::parse(raw) {
            Ok(version) => version,
            Err(e) => {
                diagnostics.error(format!("The package version has an invalid value: {e}"));
                return None;
            }
        };

        let configuration = request
            .configuration
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "Release");
        if let (true, Some(configuration)) = (self.config.append_configuration, configuration) {
            if let Err(e) = version.append_prerelease(configuration) {
                diagnostics.warning(format!(
                    "Unable to append build configuration '{configuration}' to the version: {e}"
                ));
            }
        }

        Some(version)
    }

    /// Start from an empty manifest, the output file, or a template.
    fn load_base(
        &self,
        request: &GenerateRequest,
        diagnostics: &mut Diagnostics,
    ) -> Option<ModManifest> {
        let Some(base) = request
            .base_manifest
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty() && !b.eq_ignore_ascii_case("new"))
        else {
            return Some(ModManifest::default());
        };

        let path = request.project_dir.join(base);
        let edits_output = base.eq_ignore_ascii_case(&request.manifest_name);

        if !path.is_file() {
            if edits_output {
                return Some(ModManifest::default());
            }
            diagnostics.error(format!(
                "Unable to locate the base manifest at '{}'.",
                path.display()
            ));
            return None;
        }

        match ModManifest::from_path(&path) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                diagnostics.error(format!(
                    "Unable to load the base manifest '{}': {e}",
                    path.display()
                ));
                None
            }
        }
    }

    /// Entry file, name, author, description, and unique ID.
    fn apply_identity(
        &self,
        manifest: &mut ModManifest,
        request: &GenerateRequest,
        diagnostics: &mut Diagnostics,
    ) {
        let assembly = request.assembly_name.as_str();

        if self.config.always_set_entry_dll || manifest.entry_dll.as_deref().map_or(true, str::is_empty) {
            manifest.entry_dll = Some(format!("{assembly}.dll"));
        }

        if manifest.content_pack_for.is_some() {
            diagnostics.error(
                "\"ContentPackFor\" should not have a value. Generated manifests are for code packages, not content packs.",
            );
        }

        if let Some(name) = non_empty(request.name.as_deref()) {
            manifest.name = Some(name.to_string());
        } else if manifest.name.as_deref().map_or(true, str::is_empty) {
            manifest.name = Some(assembly.to_string());
        }

        if let Some(authors) = non_empty(request.authors.as_deref()).filter(|a| *a != assembly) {
            manifest.author = Some(authors.to_string());
        } else if let Some(author) = non_empty(request.author.as_deref()) {
            diagnostics.warning("Using 'author' is deprecated. Please use 'authors' instead.");
            manifest.author = Some(author.to_string());
        } else if manifest.author.is_none() {
            diagnostics.warning("No authors are set and \"Author\" is not present in existing manifest.");
        }

        if let Some(description) = non_empty(request.description.as_deref()) {
            manifest.description = Some(description.to_string());
        } else if manifest.description.is_none() {
            diagnostics.warning(
                "No description is set and \"Description\" is not present in existing manifest.",
            );
        }

        if let Some(unique_id) = non_empty(request.unique_id.as_deref()) {
            manifest.unique_id = Some(unique_id.to_string());
        }
        if let Err(e) = manifest.validate_unique_id() {
            diagnostics.error(e.to_string());
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Fill in `MinimumApiVersion` or `MinimumGameVersion`.
///
/// Writing behaviors set the field to the version built against. Other
/// behaviors keep an explicit value (`auto` meaning the version built
/// against), and `Warning`/`Error` then check it with major.minor precision.
fn apply_minimum_version(
    field: &mut Option<String>,
    requested: Option<&str>,
    floor: Floor,
    behavior: VersionBehavior,
    built_against: &SemanticVersion,
    diagnostics: &mut Diagnostics,
) {
    if let Some(format) = behavior.write_format() {
        *field = Some(built_against.format(format));
        return;
    }

    if let Some(requested) = non_empty(requested) {
        *field = Some(
            if requested.eq_ignore_ascii_case("auto") || requested.eq_ignore_ascii_case("automatic") {
                built_against.format(floor.auto_format())
            } else {
                requested.to_string()
            },
        );
    }

    if !behavior.is_reporting() {
        return;
    }
    let severity = Severity::for_policy(behavior == VersionBehavior::Error);
    let name = floor.field();

    let Some(current) = field.as_deref().filter(|v| !v.is_empty()) else {
        diagnostics.push(
            severity,
            format!("No minimum version is requested and \"{name}\" is not present in existing manifest."),
        );
        return;
    };

    match SemanticVersion::parse(current) {
        Err(e) => diagnostics.error(format!("{name} '{current}' cannot be parsed: {e}")),
        Ok(minimum) if minimum.is_older_than(built_against, true) => diagnostics.push(
            severity,
            format!(
                "{name} is set to '{current}' but you're building against {} version '{built_against}', which is newer.",
                floor.target()
            ),
        ),
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MANIFEST_FILE;
    use crate::references::BuildReference;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn runtime_references() -> Vec<BuildReference> {
        vec![
            BuildReference {
                identity: Some("StardewModdingAPI, Version=4.1.0.0".to_string()),
                product_version: Some("4.1.2".to_string()),
                private: Some(false),
                ..BuildReference::new("/game/StardewModdingAPI.dll")
            },
            BuildReference {
                identity: Some("Stardew Valley, Version=1.6.9.24310".to_string()),
                product_version: Some("1.6.9.24310".to_string()),
                private: Some(false),
                ..BuildReference::new("/game/Stardew Valley.dll")
            },
        ]
    }

    fn request(project_dir: &Path) -> GenerateRequest {
        GenerateRequest {
            project_dir: project_dir.to_path_buf(),
            project_path: Some(project_dir.join("Mod.csproj")),
            assembly_name: "BetterCrafting".to_string(),
            manifest_name: MANIFEST_FILE.to_string(),
            base_manifest: None,
            configuration: Some("Debug".to_string()),
            version: "2.1.0".to_string(),
            name: Some("Better Crafting".to_string()),
            description: Some("Crafting, but better.".to_string()),
            authors: Some("someone".to_string()),
            author: None,
            unique_id: Some("someone.BetterCrafting".to_string()),
            minimum_api_version: None,
            minimum_game_version: None,
            update_keys: Some(vec!["Nexus:11115".to_string()]),
            mods_path: Some(project_dir.join("Mods")),
            references: runtime_references(),
            dependencies: Vec::new(),
            content_packs: Vec::new(),
        }
    }

    #[test]
    fn generates_new_manifest() {
        let tmp = TempDir::new().unwrap();
        let report = ManifestGenerator::default().run(&request(tmp.path()));

        assert!(report.succeeded(), "{:?}", report.diagnostics);
        assert!(report.written);

        let manifest = ModManifest::from_path(tmp.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.version.as_deref(), Some("2.1.0"));
        assert_eq!(manifest.entry_dll.as_deref(), Some("BetterCrafting.dll"));
        assert_eq!(manifest.minimum_api_version.as_deref(), Some("4.1"));
        assert_eq!(manifest.minimum_game_version.as_deref(), Some("1.6"));
        assert_eq!(manifest.update_keys.as_deref(), Some(&["Nexus:11115".to_string()][..]));
        assert_eq!(manifest.dependencies, None);
        assert_eq!(manifest.schema, None);
    }

    #[test]
    fn missing_runtime_reference_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut request = request(tmp.path());
        request.references.truncate(1);

        let report = ManifestGenerator::default().run(&request);
        assert!(!report.succeeded());
        assert!(!report.written);
        assert!(!tmp.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn invalid_version_is_fatal() {
        let tmp = TempDir::new().unwrap();
        for version in ["", "1.02.0", "one"] {
            let mut request = request(tmp.path());
            request.version = version.to_string();
            let report = ManifestGenerator::default().run(&request);
            assert!(report.manifest.is_none());
            assert!(!report.succeeded());
        }
    }

    #[test]
    fn appends_configuration() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig {
            append_configuration: true,
            ..BuildConfig::default()
        };
        let mut request = request(tmp.path());
        request.version = "2.1.0-beta".to_string();

        let report = ManifestGenerator::new(config.clone()).run(&request);
        let manifest = report.manifest.unwrap();
        assert_eq!(manifest.version.as_deref(), Some("2.1.0-beta.Debug"));

        request.configuration = Some("Release".to_string());
        let report = ManifestGenerator::new(config).run(&request);
        assert_eq!(report.manifest.unwrap().version.as_deref(), Some("2.1.0-beta"));
    }

    #[test]
    fn edits_existing_manifest_in_place() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(MANIFEST_FILE),
            r#"{
  "UniqueID": "someone.BetterCrafting",
  "EntryDll": "Custom.dll",
  "Author": "kept",
  "Custom": [1, 2],
  "Dependencies": [ { "UniqueID": "x.dep", "IsRequired": false } ]
}"#,
        )
        .unwrap();

        let mut request = request(tmp.path());
        request.base_manifest = Some(MANIFEST_FILE.to_string());
        request.authors = Some("BetterCrafting".to_string());
        request.unique_id = None;

        let report = ManifestGenerator::default().run(&request);
        assert!(report.succeeded(), "{:?}", report.diagnostics);

        let manifest = report.manifest.unwrap();
        assert_eq!(manifest.entry_dll.as_deref(), Some("Custom.dll"));
        // An author equal to the assembly name is a build-system default.
        assert_eq!(manifest.author.as_deref(), Some("kept"));
        assert_eq!(manifest.extra["Custom"], serde_json::json!([1, 2]));
        let deps = manifest.dependencies.unwrap();
        assert_eq!(deps[0].is_required, Some(false));
    }

    #[test]
    fn missing_template_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut request = request(tmp.path());
        request.base_manifest = Some("template.json".to_string());

        let report = ManifestGenerator::default().run(&request);
        assert!(report.manifest.is_none());
        assert!(!report.succeeded());
    }

    #[test]
    fn identity_problems_are_errors() {
        let tmp = TempDir::new().unwrap();
        let mut request = request(tmp.path());
        request.unique_id = Some("not valid!".to_string());

        let report = ManifestGenerator::default().run(&request);
        assert!(!report.succeeded());
        // Non-fatal errors still write the manifest.
        assert!(report.written);
    }

    #[test]
    fn warnings_as_errors_and_schema() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig {
            warnings_as_errors: true,
            manifest_schema: Some("true".to_string()),
            ..BuildConfig::default()
        };
        let mut request = request(tmp.path());
        request.description = None;

        let report = ManifestGenerator::new(config).run(&request);
        assert!(!report.succeeded());
        assert_eq!(
            report.manifest.unwrap().schema.as_deref(),
            Some(crate::config::DEFAULT_SCHEMA_URL)
        );
    }

    #[test]
    fn minimum_version_behaviors() {
        let built = SemanticVersion::parse("4.1.2").unwrap();

        let mut field = None;
        let mut diagnostics = Diagnostics::new();
        apply_minimum_version(&mut field, None, Floor::Api, VersionBehavior::UpdateFull, &built, &mut diagnostics);
        assert_eq!(field.as_deref(), Some("4.1.2"));

        let mut field = None;
        apply_minimum_version(&mut field, Some("auto"), Floor::Api, VersionBehavior::Ignore, &built, &mut diagnostics);
        assert_eq!(field.as_deref(), Some("4.1"));
        assert!(diagnostics.is_empty());

        let mut field = Some("4.0".to_string());
        apply_minimum_version(&mut field, None, Floor::Api, VersionBehavior::Error, &built, &mut diagnostics);
        assert_eq!(field.as_deref(), Some("4.0"));
        assert_eq!(diagnostics.count(Severity::Error), 1);

        let mut field = Some("4.1".to_string());
        apply_minimum_version(&mut field, None, Floor::Api, VersionBehavior::Warning, &built, &mut diagnostics);
        assert_eq!(diagnostics.count(Severity::Warning), 0);

        let mut field = None;
        apply_minimum_version(&mut field, None, Floor::Game, VersionBehavior::Warning, &built, &mut diagnostics);
        assert_eq!(diagnostics.count(Severity::Warning), 1);
    }

    #[test]
    fn syncs_bundled_content_packs() {
        let tmp = TempDir::new().unwrap();
        let pack_dir = tmp.path().join("[CP] BetterCrafting");
        fs::create_dir(&pack_dir).unwrap();
        fs::write(
            pack_dir.join(MANIFEST_FILE),
            r#"{ "UniqueID": "someone.BetterCrafting.CP", "Version": "1.0.0" }"#,
        )
        .unwrap();

        let config = BuildConfig {
            append_configuration: true,
            ..BuildConfig::default()
        };
        let mut request = request(tmp.path());
        request.content_packs = vec![
            crate::content_packs::ContentPack::new("[CP] BetterCrafting"),
            crate::content_packs::ContentPack::new("[CP] Missing"),
        ];

        let report = ManifestGenerator::new(config).run(&request);
        assert!(report.succeeded(), "{:?}", report.diagnostics);
        assert_eq!(
            report.content_packs[0].version.as_deref(),
            Some("2.1.0-Debug")
        );
        assert_eq!(report.content_packs[1].version, None);

        let pack = ModManifest::from_path(pack_dir.join(MANIFEST_FILE)).unwrap();
        assert_eq!(pack.version.as_deref(), Some("2.1.0-Debug"));
    }

    #[test]
    fn content_packs_are_left_alone_when_setup_fails() {
        let tmp = TempDir::new().unwrap();
        let mut request = request(tmp.path());
        request.version = String::new();
        request.content_packs = vec![crate::content_packs::ContentPack::new("cp")];

        let report = ManifestGenerator::default().run(&request);
        assert!(report.content_packs.is_empty());
    }

    #[test]
    fn platform_version_drops_revision() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::parse("[minimum_game_version]\nbehavior = \"SetFull\"").unwrap();
        let report = ManifestGenerator::new(config).run(&request(tmp.path()));
        assert_eq!(
            report.manifest.unwrap().minimum_game_version.as_deref(),
            Some("1.6.9")
        );
    }
}
