//! Version sync for content packs bundled with a code package.
//!
//! Each bundled pack lives in `<project_dir>/<folder>/manifest.json`. After
//! the main manifest is written, a pack's `Version` is either set to the
//! package version or read back for the build system.

use crate::behavior::UnknownBehavior;
use crate::diagnostics::Diagnostics;
use crate::manifest::{ModManifest, MANIFEST_FILE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What happens to a bundled content pack's version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContentPackBehavior {
    /// Leave the pack alone.
    Ignore,
    /// Write the package version into the pack's manifest.
    Set,
    /// Same as `Set`.
    Update,
    /// Report the pack's own version without touching it.
    Read,
}

impl ContentPackBehavior {
    pub const ALL: [Self; 4] = [Self::Ignore, Self::Set, Self::Update, Self::Read];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "Ignore",
            Self::Set => "Set",
            Self::Update => "Update",
            Self::Read => "Read",
        }
    }
}

impl fmt::Display for ContentPackBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentPackBehavior {
    type Err = UnknownBehavior;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownBehavior(s.to_string()))
    }
}

impl TryFrom<String> for ContentPackBehavior {
    type Error = UnknownBehavior;

    fn try_from(value: String) -> Result<Self, UnknownBehavior> {
        value.parse()
    }
}

impl From<ContentPackBehavior> for String {
    fn from(value: ContentPackBehavior) -> Self {
        value.as_str().to_string()
    }
}

/// A content pack bundled with the project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentPack {
    /// The pack as the build system names it, usually its source folder.
    pub path: PathBuf,

    /// Folder holding the pack's manifest, relative to the project
    /// directory. Defaults to the last component of `path`.
    #[serde(default)]
    pub folder_name: Option<String>,

    /// Behavior for this pack, overriding the configured default.
    /// Unrecognized values skip the pack.
    #[serde(default)]
    pub version_behavior: Option<String>,
}

impl ContentPack {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    fn folder(&self) -> Option<PathBuf> {
        match self.folder_name.as_deref().map(str::trim) {
            Some(folder) if !folder.is_empty() => Some(PathBuf::from(folder)),
            _ => self.path.file_name().map(PathBuf::from),
        }
    }
}

/// A content pack after the sync, as handed back to the build system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatedContentPack {
    pub path: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,

    /// The pack's version after the sync. `None` when the pack was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Sync the version of every bundled content pack.
///
/// Returns one entry per input pack, in order. Packs that are skipped keep
/// `version: None`.
pub fn sync_content_packs(
    packs: &[ContentPack],
    project_dir: &Path,
    version: &str,
    default_behavior: ContentPackBehavior,
    diagnostics: &mut Diagnostics,
) -> Vec<UpdatedContentPack> {
    packs
        .iter()
        .map(|pack| UpdatedContentPack {
            path: pack.path.clone(),
            folder_name: pack.folder_name.clone(),
            version: sync_one(pack, project_dir, version, default_behavior, diagnostics),
        })
        .collect()
}

fn sync_one(
    pack: &ContentPack,
    project_dir: &Path,
    version: &str,
    default_behavior: ContentPackBehavior,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    let name = pack.path.display();

    let behavior = match pack.version_behavior.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match raw.parse::<ContentPackBehavior>() {
            Ok(behavior) => behavior,
            Err(e) => {
                diagnostics.debug(format!("Skipping bundled content pack '{name}': {e}"));
                return None;
            }
        },
        _ => default_behavior,
    };
    if behavior == ContentPackBehavior::Ignore {
        return None;
    }

    let folder = pack.folder()?;
    let manifest_path = project_dir.join(folder).join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        diagnostics.warning(format!(
            "Unable to find manifest for bundled content pack '{name}'."
        ));
        return None;
    }

    let mut manifest = match ModManifest::from_path(&manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            diagnostics.error(format!(
                "Unable to load manifest for bundled content pack '{name}' from '{}': {e}",
                manifest_path.display()
            ));
            return None;
        }
    };

    if behavior == ContentPackBehavior::Read {
        diagnostics.debug(format!(
            "Read version '{}' for '{name}'.",
            manifest.version.as_deref().unwrap_or_default()
        ));
        return manifest.version;
    }

    if manifest.version.as_deref() != Some(version) {
        manifest.version = Some(version.to_string());
        if let Err(e) = manifest.write(&manifest_path) {
            diagnostics.error(format!(
                "Unable to write manifest for bundled content pack '{name}' to '{}': {e}",
                manifest_path.display()
            ));
            return None;
        }
        diagnostics.info(format!(
            "Setting version for '{name}' in '{}'.",
            manifest_path.display()
        ));
    }

    Some(version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use tempfile::TempDir;

    fn write_pack(root: &Path, folder: &str, manifest: &str) -> PathBuf {
        let dir = root.join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(MANIFEST_FILE);
        std::fs::write(&path, manifest).unwrap();
        path
    }

    #[test]
    fn parse_behaviors() {
        assert_eq!(
            "read".parse::<ContentPackBehavior>().unwrap(),
            ContentPackBehavior::Read
        );
        assert!("SetFull".parse::<ContentPackBehavior>().is_err());
    }

    #[test]
    fn set_rewrites_version_and_keeps_other_keys() {
        let tmp = TempDir::new().unwrap();
        let path = write_pack(
            tmp.path(),
            "[CP] Better Crafting",
            r#"{ "UniqueID": "a.cp", "Version": "1.0.0", "ContentPackFor": { "UniqueID": "Pathoschild.ContentPatcher" }, "Format": "2.0" }"#,
        );

        let mut diagnostics = Diagnostics::new();
        let updated = sync_content_packs(
            &[ContentPack::new("assets/[CP] Better Crafting")],
            tmp.path(),
            "2.1.0",
            ContentPackBehavior::Set,
            &mut diagnostics,
        );

        assert_eq!(updated[0].version.as_deref(), Some("2.1.0"));
        let manifest = ModManifest::from_path(&path).unwrap();
        assert_eq!(manifest.version.as_deref(), Some("2.1.0"));
        assert_eq!(manifest.extra["Format"], "2.0");
        assert_eq!(diagnostics.count(Severity::Info), 1);
    }

    #[test]
    fn current_version_is_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let original = r#"{"UniqueID":"a.cp","Version":"2.1.0"}"#;
        let path = write_pack(tmp.path(), "cp", original);

        let mut diagnostics = Diagnostics::new();
        let updated = sync_content_packs(
            &[ContentPack::new("cp")],
            tmp.path(),
            "2.1.0",
            ContentPackBehavior::Update,
            &mut diagnostics,
        );

        assert_eq!(updated[0].version.as_deref(), Some("2.1.0"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), original);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn read_reports_the_pack_version() {
        let tmp = TempDir::new().unwrap();
        write_pack(tmp.path(), "packs/extra", r#"{"UniqueID":"a.cp","Version":"0.4.0"}"#);

        let pack = ContentPack {
            folder_name: Some("packs/extra".to_string()),
            version_behavior: Some("Read".to_string()),
            ..ContentPack::new("Extra")
        };
        let mut diagnostics = Diagnostics::new();
        let updated = sync_content_packs(
            &[pack],
            tmp.path(),
            "2.1.0",
            ContentPackBehavior::Set,
            &mut diagnostics,
        );

        assert_eq!(updated[0].version.as_deref(), Some("0.4.0"));
        assert_eq!(updated[0].folder_name.as_deref(), Some("packs/extra"));
    }

    #[test]
    fn skipped_and_missing_packs() {
        let tmp = TempDir::new().unwrap();
        write_pack(tmp.path(), "broken", "{ not json");
        let packs = [
            ContentPack {
                version_behavior: Some("Ignore".to_string()),
                ..ContentPack::new("cp")
            },
            ContentPack {
                version_behavior: Some("Sometimes".to_string()),
                ..ContentPack::new("cp")
            },
            ContentPack::new("missing"),
            ContentPack::new("broken"),
        ];

        let mut diagnostics = Diagnostics::new();
        let updated = sync_content_packs(
            &packs,
            tmp.path(),
            "2.1.0",
            ContentPackBehavior::Set,
            &mut diagnostics,
        );

        assert_eq!(updated.len(), 4);
        assert!(updated.iter().all(|pack| pack.version.is_none()));
        assert_eq!(diagnostics.count(Severity::Warning), 1);
        assert_eq!(diagnostics.count(Severity::Error), 1);
    }
}
