//! Discovery of installed packages under a directory tree.
//!
//! ```text
//! Mods/
//! ├── .cache/               # skipped, never descended into
//! ├── SpaceCore/
//! │   ├── manifest.json     # yielded; SpaceCore/ is not searched further
//! │   └── assets/
//! └── Bundles/
//!     ├── Broken/
//!     │   ├── manifest.json # unreadable: ignored, Broken/ is still searched
//!     │   └── Inner/manifest.json
//!     └── ContentPatcher/manifest.json
//! ```
//!
//! [`PackageWalker`] is a lazy depth-first iterator: directories are only read
//! when the consumer asks for the next package, so stopping iteration (a
//! `break`, `take_while`, `find`) stops the walk. Failures in any one
//! directory are logged at trace level and skipped.

use crate::manifest::{ModManifest, MANIFEST_FILE};
use crate::version::SemanticVersion;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A package found on disk.
#[derive(Debug, Clone)]
pub struct DiscoveredPackage {
    /// Directory containing the manifest.
    pub path: PathBuf,

    /// The parsed manifest.
    pub manifest: ModManifest,

    /// The parsed package version.
    pub version: SemanticVersion,
}

impl DiscoveredPackage {
    /// The package's unique ID.
    #[must_use]
    pub fn unique_id(&self) -> &str {
        self.manifest.unique_id().unwrap_or_default()
    }

    /// Load the package in `dir`, if its manifest is readable and carries an
    /// ID and a valid version.
    fn load(dir: &Path) -> Option<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = match ModManifest::from_path(&manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::trace!(path = %manifest_path.display(), "skipping manifest: {e}");
                return None;
            }
        };

        manifest.unique_id()?;
        let version = manifest.parsed_version()?;

        Some(Self {
            path: dir.to_path_buf(),
            manifest,
            version,
        })
    }
}

/// Lazy depth-first walk over the package directories below a root.
///
/// The root itself is never treated as a package. Subdirectories are visited
/// in name order, following symlinks; a directory reached twice through links
/// is only walked once. A directory that yields a package is not descended
/// into; a directory whose manifest fails to load is searched like any other.
#[derive(Debug)]
pub struct PackageWalker {
    /// Directories still to visit, with whether to check them for a manifest.
    stack: Vec<(PathBuf, bool)>,

    /// Canonical paths of the directories already visited.
    visited: HashSet<PathBuf>,
}

impl PackageWalker {
    /// Start a walk below `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            stack: vec![(root.as_ref().to_path_buf(), false)],
            visited: HashSet::new(),
        }
    }

    /// Queue the visible subdirectories of `dir`, first name on top.
    fn push_children(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::trace!(path = %dir.display(), "cannot read directory: {e}");
                return;
            }
        };

        let mut children: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .map(|entry| entry.path())
            .collect();
        children.sort();

        self.stack
            .extend(children.into_iter().rev().map(|child| (child, true)));
    }
}

impl Iterator for PackageWalker {
    type Item = DiscoveredPackage;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((dir, check_manifest)) = self.stack.pop() {
            let canonical = std::fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !self.visited.insert(canonical) {
                continue;
            }
            if check_manifest && dir.join(MANIFEST_FILE).is_file() {
                if let Some(package) = DiscoveredPackage::load(&dir) {
                    return Some(package);
                }
            }
            self.push_children(&dir);
        }
        None
    }
}

/// Installed packages indexed by unique ID.
///
/// When two directories declare the same ID, the first one walked wins.
#[derive(Debug, Clone, Default)]
pub struct InstalledPackages {
    by_id: HashMap<String, DiscoveredPackage>,
}

impl InstalledPackages {
    /// Walk `root` and index every package found. A missing root yields an
    /// empty index.
    pub fn discover(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        if !root.is_dir() {
            tracing::debug!(path = %root.display(), "package directory does not exist");
            return Self::default();
        }
        PackageWalker::new(root).collect()
    }

    #[must_use]
    pub fn get(&self, unique_id: &str) -> Option<&DiscoveredPackage> {
        self.by_id.get(unique_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Add a package unless its ID is already indexed.
    pub fn insert(&mut self, package: DiscoveredPackage) {
        self.by_id
            .entry(package.unique_id().to_string())
            .or_insert(package);
    }
}

impl FromIterator<DiscoveredPackage> for InstalledPackages {
    fn from_iter<I: IntoIterator<Item = DiscoveredPackage>>(iter: I) -> Self {
        let mut index = Self::default();
        for package in iter {
            index.insert(package);
        }
        index
    }
}
