//! Mod manifest (`manifest.json`) parsing and serialization.
//!
//! Only the fields the builder reads or writes are typed. Everything else is
//! kept in an insertion-ordered passthrough map and written back after the
//! typed fields, so a read-modify-write cycle never drops keys.

use crate::version::SemanticVersion;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// The manifest filename.
pub const MANIFEST_FILE: &str = "manifest.json";

const MANIFEST_KEYS: &[&str] = &[
    "$schema",
    "$comment",
    "UniqueID",
    "Name",
    "Author",
    "Version",
    "Description",
    "MinimumApiVersion",
    "MinimumGameVersion",
    "EntryDll",
    "ContentPackFor",
    "Dependencies",
    "UpdateKeys",
];

const CONTENT_PACK_FOR_KEYS: &[&str] = &["UniqueID", "MinimumVersion"];

const DEPENDENCY_KEYS: &[&str] = &["UniqueID", "MinimumVersion", "IsRequired"];

/// Errors that can occur when working with manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to serialize manifest: {0}")]
    Serialize(serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error(
        "invalid unique ID '{0}': IDs must only contain A-Z, 0-9, '_', '.', and '-' characters and must not be empty"
    )]
    InvalidUniqueId(String),
}

/// A package descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModManifest {
    /// JSON schema reference.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(rename = "$comment", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Value>,

    /// Identity of the package.
    #[serde(rename = "UniqueID", default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "Author", default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Package version, as written.
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Oldest core runtime version the package works with.
    #[serde(
        rename = "MinimumApiVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_api_version: Option<String>,

    /// Oldest platform version the package works with.
    #[serde(
        rename = "MinimumGameVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_game_version: Option<String>,

    /// Entry file loaded for code packages.
    #[serde(rename = "EntryDll", default, skip_serializing_if = "Option::is_none")]
    pub entry_dll: Option<String>,

    /// Set only on content packs.
    #[serde(
        rename = "ContentPackFor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_pack_for: Option<ContentPackFor>,

    #[serde(
        rename = "Dependencies",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dependencies: Option<Vec<DependencyRecord>>,

    #[serde(rename = "UpdateKeys", default, skip_serializing_if = "Option::is_none")]
    pub update_keys: Option<Vec<String>>,

    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The package a content pack is written for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPackFor {
    #[serde(rename = "UniqueID", default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(
        rename = "MinimumVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_version: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a manifest's dependency list.
///
/// Identity is `unique_id`; a manifest never lists the same ID twice after a
/// merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    #[serde(rename = "UniqueID", default)]
    pub unique_id: String,

    #[serde(
        rename = "MinimumVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_version: Option<String>,

    /// `None` means the manifest leaves it at the loader's default.
    #[serde(rename = "IsRequired", default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DependencyRecord {
    #[must_use]
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            ..Self::default()
        }
    }
}

impl ModManifest {
    /// Load a manifest from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a manifest from a JSON string.
    ///
    /// Line and block comments outside of strings are accepted and dropped.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let content = strip_comments(content);
        let value: Value = serde_json::from_str(&content)?;
        Ok(serde_json::from_value(canonicalize_manifest(value))?)
    }

    /// Serialize the manifest as indented JSON, omitting absent fields.
    pub fn to_json_string(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(ManifestError::Serialize)
    }

    /// Write the manifest to a file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let content = self.to_json_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The unique ID, if present and non-empty.
    #[must_use]
    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref().filter(|id| !id.is_empty())
    }

    /// The parsed package version, if present and valid.
    #[must_use]
    pub fn parsed_version(&self) -> Option<SemanticVersion> {
        self.version
            .as_deref()
            .and_then(|v| SemanticVersion::parse(v).ok())
    }

    /// Validate the unique ID.
    pub fn validate_unique_id(&self) -> Result<(), ManifestError> {
        let id = self
            .unique_id
            .as_deref()
            .ok_or(ManifestError::MissingField("UniqueID"))?;
        if is_valid_unique_id(id) {
            Ok(())
        } else {
            Err(ManifestError::InvalidUniqueId(id.to_string()))
        }
    }
}

/// Whether a unique ID is non-empty and uses only `A-Z a-z 0-9 _ . -`.
#[must_use]
pub fn is_valid_unique_id(id: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(id))
}

/// Rename known keys to their canonical spelling, ignoring case.
///
/// The loader matches manifest keys case-insensitively, so `uniqueId` and
/// `UniqueID` are the same field. When both spellings appear, the later value
/// wins and keeps the position of the first.
fn canonicalize_manifest(value: Value) -> Value {
    let Value::Object(object) = value else {
        return value;
    };

    let mut object = canonicalize_keys(object, MANIFEST_KEYS);
    if let Some(Value::Object(content_pack_for)) = object.get_mut("ContentPackFor") {
        *content_pack_for =
            canonicalize_keys(std::mem::take(content_pack_for), CONTENT_PACK_FOR_KEYS);
    }
    if let Some(Value::Array(dependencies)) = object.get_mut("Dependencies") {
        for dependency in dependencies {
            if let Value::Object(record) = dependency {
                *record = canonicalize_keys(std::mem::take(record), DEPENDENCY_KEYS);
            }
        }
    }

    Value::Object(object)
}

fn canonicalize_keys(object: Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(key, value)| {
            let key = known
                .iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(&key))
                .map_or(key, |candidate| (*candidate).to_string());
            (key, value)
        })
        .collect()
}

/// Remove `//` and `/* */` comments that are not inside strings.
fn strip_comments(input: &str) -> Cow<'_, str> {
    if !input.contains("//") && !input.contains("/*") {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    previous = skipped;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    Cow::Owned(out)
}
