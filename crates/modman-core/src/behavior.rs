//! Per-dependency version policies.

use crate::version::VersionFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned for an unrecognized behavior name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown version behavior '{0}'")]
pub struct UnknownBehavior(pub String);

/// Controls whether a known version is written into the manifest, and with
/// what precision.
///
/// `Update*` variants raise an existing floor only when it is outdated.
/// `Set*` variants always overwrite it. `Warning` and `Error` only report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionBehavior {
    Ignore,
    Warning,
    Error,
    Update,
    UpdateNoPrerelease,
    UpdateFull,
    Set,
    SetNoPrerelease,
    SetFull,
}

impl VersionBehavior {
    pub const ALL: [Self; 9] = [
        Self::Ignore,
        Self::Warning,
        Self::Error,
        Self::Update,
        Self::UpdateNoPrerelease,
        Self::UpdateFull,
        Self::Set,
        Self::SetNoPrerelease,
        Self::SetFull,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "Ignore",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Update => "Update",
            Self::UpdateNoPrerelease => "UpdateNoPrerelease",
            Self::UpdateFull => "UpdateFull",
            Self::Set => "Set",
            Self::SetNoPrerelease => "SetNoPrerelease",
            Self::SetFull => "SetFull",
        }
    }

    /// The precision a version is written with, for behaviors that write.
    #[must_use]
    pub fn write_format(&self) -> Option<VersionFormat> {
        match self {
            Self::Update | Self::Set => Some(VersionFormat::Short),
            Self::UpdateNoPrerelease | Self::SetNoPrerelease => Some(VersionFormat::NoPrerelease),
            Self::UpdateFull | Self::SetFull => Some(VersionFormat::Full),
            Self::Ignore | Self::Warning | Self::Error => None,
        }
    }

    /// Whether this behavior overwrites a version even when it is current.
    #[must_use]
    pub fn always_sets(&self) -> bool {
        matches!(self, Self::Set | Self::SetNoPrerelease | Self::SetFull)
    }

    /// Whether this behavior only reports problems.
    #[must_use]
    pub fn is_reporting(&self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

impl fmt::Display for VersionBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionBehavior {
    type Err = UnknownBehavior;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownBehavior(s.to_string()))
    }
}

impl TryFrom<String> for VersionBehavior {
    type Error = UnknownBehavior;

    fn try_from(value: String) -> Result<Self, UnknownBehavior> {
        value.parse()
    }
}

impl From<VersionBehavior> for String {
    fn from(value: VersionBehavior) -> Self {
        value.as_str().to_string()
    }
}

/// Behaviors recorded for individual dependencies during a merge.
///
/// Lookups fall back to the default the caller passes in, so every
/// dependency resolves through the same chain: recorded override first,
/// then the global default.
#[derive(Debug, Clone, Default)]
pub struct BehaviorOverrides {
    by_id: HashMap<String, VersionBehavior>,
}

impl BehaviorOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the behavior for a dependency, replacing any earlier one.
    pub fn record(&mut self, unique_id: impl Into<String>, behavior: VersionBehavior) {
        self.by_id.insert(unique_id.into(), behavior);
    }

    /// The behavior recorded for a dependency, if any.
    #[must_use]
    pub fn get(&self, unique_id: &str) -> Option<VersionBehavior> {
        self.by_id.get(unique_id).copied()
    }

    /// The effective behavior for a dependency.
    #[must_use]
    pub fn resolve(&self, unique_id: &str, default: VersionBehavior) -> VersionBehavior {
        self.get(unique_id).unwrap_or(default)
    }
}

/// Pick the first behavior present in a prioritized chain.
///
/// Used where several metadata keys can carry the same setting, newest key
/// first.
#[must_use]
pub fn first_behavior<I>(candidates: I) -> Option<VersionBehavior>
where
    I: IntoIterator<Item = Option<VersionBehavior>>,
{
    candidates.into_iter().flatten().next()
}
