//! Semantic versions with an optional fourth `revision` component.
//!
//! The accepted grammar is:
//!
//! ```text
//! version   := ws* major '.' minor ('.' patch ('.' revision)?)? ('-' tag)? ('+' tag)? ws*
//! major, minor, patch, revision := digit+   (no leading zero unless the value is "0")
//! tag       := (letter | digit | '-' | '.')+
//! ```
//!
//! Parsing is a single left-to-right pass. Each optional component is present
//! only when its separator is, so a revision without a patch cannot be written.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prerelease identifier that sorts after every other identifier.
const UNOFFICIAL: &str = "unofficial";

/// Errors that can occur when parsing or building a version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("cannot parse '{input}' as a semantic version: {reason}")]
    InvalidFormat { input: String, reason: &'static str },

    #[error("invalid version tag '{0}': only letters, digits, '-' and '.' are allowed")]
    InvalidTag(String),
}

/// How much of a version to keep when rendering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionFormat {
    /// `major.minor`, unless a prerelease tag forces the full form.
    Short,
    /// `major.minor.patch[.revision]`.
    NoPrerelease,
    /// `major.minor.patch[.revision][-prerelease][+build]`.
    #[default]
    Full,
}

/// A parsed semantic version.
///
/// Equality and ordering ignore build metadata and compare prerelease tags
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    major: u32,
    minor: u32,
    patch: u32,
    revision: u32,
    prerelease: Option<String>,
    build: Option<String>,
}

impl SemanticVersion {
    /// Create a release version.
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            prerelease: None,
            build: None,
        }
    }

    /// Set the revision component.
    #[must_use]
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    /// Set the prerelease tag.
    pub fn with_prerelease(mut self, tag: impl Into<String>) -> Result<Self, VersionError> {
        self.prerelease = Some(validate_tag(tag.into())?);
        Ok(self)
    }

    /// Set the build metadata tag.
    pub fn with_build(mut self, tag: impl Into<String>) -> Result<Self, VersionError> {
        self.build = Some(validate_tag(tag.into())?);
        Ok(self)
    }

    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidFormat`] if the input does not match the
    /// grammar in the module documentation.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &'static str| VersionError::InvalidFormat {
            input: input.to_string(),
            reason,
        };

        if input.trim().is_empty() {
            return Err(invalid("input is empty"));
        }

        let mut reader = Reader::new(input);
        reader.skip_whitespace();

        let major = reader
            .number()
            .map_err(invalid)?
            .ok_or_else(|| invalid("missing major version"))?;
        if !reader.literal('.') {
            return Err(invalid("missing minor version"));
        }
        let minor = reader
            .number()
            .map_err(invalid)?
            .ok_or_else(|| invalid("missing minor version"))?;

        let mut patch = 0;
        let mut revision = 0;
        if reader.literal('.') {
            patch = reader
                .number()
                .map_err(invalid)?
                .ok_or_else(|| invalid("expected patch version after '.'"))?;

            if reader.literal('.') {
                revision = reader
                    .number()
                    .map_err(invalid)?
                    .ok_or_else(|| invalid("expected revision after '.'"))?;
            }
        }

        let prerelease = if reader.literal('-') {
            let tag = reader
                .tag()
                .ok_or_else(|| invalid("expected prerelease tag after '-'"))?;
            Some(tag.to_string())
        } else {
            None
        };

        let build = if reader.literal('+') {
            let tag = reader
                .tag()
                .ok_or_else(|| invalid("expected build tag after '+'"))?;
            Some(tag.to_string())
        } else {
            None
        };

        reader.skip_whitespace();
        if !reader.is_at_end() {
            return Err(invalid("unexpected trailing characters"));
        }

        Ok(Self {
            major,
            minor,
            patch,
            revision,
            prerelease,
            build,
        })
    }

    /// Parse a purely numeric assembly version (`a.b[.c[.d]]`).
    ///
    /// Assembly versions allow leading zeros and never carry tags.
    pub fn from_assembly_version(input: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat {
            input: input.to_string(),
            reason: "expected two to four numeric components",
        };

        let parts: Vec<&str> = input.trim().split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(invalid());
        }

        let mut numbers = [0u32; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]).with_revision(numbers[3]))
    }

    #[must_use]
    pub fn major(&self) -> u32 {
        self.major
    }

    #[must_use]
    pub fn minor(&self) -> u32 {
        self.minor
    }

    #[must_use]
    pub fn patch(&self) -> u32 {
        self.patch
    }

    #[must_use]
    pub fn revision(&self) -> u32 {
        self.revision
    }

    #[must_use]
    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    #[must_use]
    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    /// Append a suffix to the prerelease tag, or use it as the tag if there is
    /// none yet.
    ///
    /// This is the only mutation a version allows. It exists to mark builds
    /// from a non-release configuration, e.g. `1.0.0-beta` becomes
    /// `1.0.0-beta.Debug`.
    pub fn append_prerelease(&mut self, suffix: &str) -> Result<(), VersionError> {
        let suffix = validate_tag(suffix.to_string())?;
        self.prerelease = Some(match self.prerelease.take() {
            Some(existing) => format!("{existing}.{suffix}"),
            None => suffix,
        });
        Ok(())
    }

    /// Copy of this version with the revision dropped.
    #[must_use]
    pub fn without_revision(&self) -> Self {
        Self {
            revision: 0,
            ..self.clone()
        }
    }

    /// Compare two versions.
    ///
    /// With `only_major_minor`, only `major.minor` is compared, unless either
    /// side has a prerelease tag, in which case the full comparison runs. With
    /// `skip_prerelease`, versions whose numeric components are equal compare
    /// equal regardless of their tags.
    #[must_use]
    pub fn compare(&self, other: &Self, only_major_minor: bool, skip_prerelease: bool) -> Ordering {
        let only_major_minor =
            only_major_minor && self.prerelease.is_none() && other.prerelease.is_none();

        let ordering = self
            .major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor));
        if ordering.is_ne() || only_major_minor {
            return ordering;
        }

        let ordering = self
            .patch
            .cmp(&other.patch)
            .then(self.revision.cmp(&other.revision));
        if ordering.is_ne() || skip_prerelease {
            return ordering;
        }

        match (self.prerelease.as_deref(), other.prerelease.as_deref()) {
            (None, None) => Ordering::Equal,
            // A release is newer than any of its prereleases.
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(ours), Some(theirs)) => compare_prerelease(ours, theirs),
        }
    }

    /// Whether this version is older than `other`.
    #[must_use]
    pub fn is_older_than(&self, other: &Self, only_major_minor: bool) -> bool {
        self.compare(other, only_major_minor, false).is_lt()
    }

    /// Whether this version is newer than `other`.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self, only_major_minor: bool) -> bool {
        self.compare(other, only_major_minor, false).is_gt()
    }

    /// Whether this version is within the inclusive range `min..=max`.
    #[must_use]
    pub fn is_between(&self, min: &Self, max: &Self) -> bool {
        self >= min && self <= max
    }

    /// Render the version with the given precision.
    #[must_use]
    pub fn format(&self, format: VersionFormat) -> String {
        match format {
            VersionFormat::Short if self.prerelease.is_none() => {
                format!("{}.{}", self.major, self.minor)
            }
            VersionFormat::Short | VersionFormat::Full => self.to_string(),
            VersionFormat::NoPrerelease => self.numeric_string(),
        }
    }

    fn numeric_string(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision != 0 {
            out.push_str(&format!(".{}", self.revision));
        }
        out
    }
}

/// Compare two prerelease tags identifier by identifier.
fn compare_prerelease(ours: &str, theirs: &str) -> Ordering {
    let ours: Vec<&str> = ours.split(is_identifier_separator).collect();
    let theirs: Vec<&str> = theirs.split(is_identifier_separator).collect();

    // The number of identifiers decides before their contents do.
    ours.len().cmp(&theirs.len()).then_with(|| {
        ours.iter()
            .zip(&theirs)
            .map(|(a, b)| compare_identifier(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

fn compare_identifier(ours: &str, theirs: &str) -> Ordering {
    let ours = ours.to_lowercase();
    let theirs = theirs.to_lowercase();

    if ours == theirs {
        return Ordering::Equal;
    }
    if theirs == UNOFFICIAL {
        return Ordering::Less;
    }
    if ours == UNOFFICIAL {
        return Ordering::Greater;
    }

    match (ours.parse::<u64>(), theirs.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => ours.cmp(&theirs),
    }
}

fn is_identifier_separator(c: char) -> bool {
    c == '.' || c == '-'
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '.'
}

fn validate_tag(tag: String) -> Result<String, VersionError> {
    if tag.is_empty() || !tag.chars().all(is_tag_char) {
        return Err(VersionError::InvalidTag(tag));
    }
    Ok(tag)
}

/// Cursor over the version input.
struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.input.len()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn literal(&mut self, expected: char) -> bool {
        if self.rest().starts_with(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Read a numeric component. `Ok(None)` means no digits at this position.
    fn number(&mut self) -> Result<Option<u32>, &'static str> {
        let rest = self.rest();
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if len == 0 {
            return Ok(None);
        }

        let digits = &rest[..len];
        if len > 1 && digits.starts_with('0') {
            return Err("numeric components must not have leading zeros");
        }

        let value = digits
            .parse::<u32>()
            .map_err(|_| "numeric component is too large")?;
        self.pos += len;
        Ok(Some(value))
    }

    fn tag(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len: usize = rest
            .chars()
            .take_while(|c| is_tag_char(*c))
            .map(char::len_utf8)
            .sum();
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.numeric_string())?;
        if let Some(prerelease) = &self.prerelease {
            write!(f, "-{prerelease}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for SemanticVersion {}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other, false, false)
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    #[test]
    fn parse_major_minor() {
        let version = v("1.2");
        assert_eq!(version.major(), 1);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.patch(), 0);
        assert_eq!(version.revision(), 0);
        assert_eq!(version.prerelease(), None);
    }

    #[test]
    fn parse_all_components() {
        let version = v("  4.10.3.7-beta.2+linux.x64 ");
        assert_eq!(version.major(), 4);
        assert_eq!(version.minor(), 10);
        assert_eq!(version.patch(), 3);
        assert_eq!(version.revision(), 7);
        assert_eq!(version.prerelease(), Some("beta.2"));
        assert_eq!(version.build(), Some("linux.x64"));
    }

    #[test]
    fn parse_hyphenated_prerelease() {
        let version = v("1.0.0-rc-1");
        assert_eq!(version.prerelease(), Some("rc-1"));
    }

    #[test]
    fn reject_leading_zero() {
        assert!(SemanticVersion::parse("1.02.0").is_err());
        assert!(SemanticVersion::parse("01.2").is_err());
        assert!(SemanticVersion::parse("1.0.0").is_ok());
        assert!(SemanticVersion::parse("0.0.0.0").is_ok());
    }

    #[test]
    fn reject_malformed_input() {
        for input in [
            "", "   ", "1", "1.", ".1", "1.2.", "1.2.3.", "1.2-", "1.2+", "1.2.3 x", "1.2.3.4.5",
            "v1.2", "1.2-beta+", "1.2.3-be ta",
        ] {
            assert!(
                SemanticVersion::parse(input).is_err(),
                "expected '{input}' to be rejected"
            );
        }
    }

    #[test]
    fn reject_overflowing_component() {
        let err = SemanticVersion::parse("99999999999.0").unwrap_err();
        assert!(matches!(err, VersionError::InvalidFormat { .. }));
    }

    #[test]
    fn prerelease_is_older_than_release() {
        assert!(v("1.2.0-beta") < v("1.2.0"));
        assert!(v("1.2.0") > v("1.2.0-alpha.9"));
    }

    #[test]
    fn unofficial_beats_other_identifiers() {
        assert!(v("1.2.0-beta.unofficial") > v("1.2.0-beta.2"));
        assert!(v("1.2.0-beta.2") < v("1.2.0-beta.UNOFFICIAL"));
        assert!(v("1.2.0-unofficial") > v("1.2.0-zeta"));
    }

    #[test]
    fn prerelease_field_count_decides_first() {
        assert!(v("1.0.0-zeta") < v("1.0.0-alpha.1"));
        assert!(v("1.0.0-alpha.1.1") > v("1.0.0-beta.9"));
    }

    #[test]
    fn prerelease_numeric_and_text_identifiers() {
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.10"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert_eq!(v("1.0.0-BETA.1"), v("1.0.0-beta.1"));
        assert_eq!(
            v("1.0.0-beta.1").cmp(&v("1.0.0-beta-1")),
            Ordering::Equal
        );
    }

    #[test]
    fn only_major_minor_comparison() {
        assert_eq!(v("1.2.3").compare(&v("1.2.9"), true, false), Ordering::Equal);
        assert_ne!(
            v("1.2.3-rc").compare(&v("1.2.9-rc"), true, false),
            Ordering::Equal
        );
        assert_eq!(
            v("1.2.3").compare(&v("1.3.0"), true, false),
            Ordering::Less
        );
    }

    #[test]
    fn skip_prerelease_comparison() {
        assert_eq!(
            v("1.2.3-alpha").compare(&v("1.2.3"), false, true),
            Ordering::Equal
        );
        assert_eq!(
            v("1.2.3-alpha").compare(&v("1.2.4"), false, true),
            Ordering::Less
        );
    }

    #[test]
    fn build_metadata_is_ignored() {
        assert_eq!(v("1.2.3+abc"), v("1.2.3+def"));
        assert_eq!(v("1.2.3+abc").to_string(), "1.2.3+abc");
    }

    #[test]
    fn range_check() {
        assert!(v("1.5").is_between(&v("1.0"), &v("2.0")));
        assert!(v("2.0").is_between(&v("1.0"), &v("2.0")));
        assert!(!v("2.0.1-beta").is_between(&v("1.0"), &v("2.0")));
    }

    #[test]
    fn render_formats() {
        let version = v("1.4.2.3-beta+b5");
        assert_eq!(version.format(VersionFormat::Full), "1.4.2.3-beta+b5");
        assert_eq!(version.format(VersionFormat::NoPrerelease), "1.4.2.3");
        assert_eq!(version.format(VersionFormat::Short), "1.4.2.3-beta+b5");

        let release = v("1.4.2");
        assert_eq!(release.format(VersionFormat::Short), "1.4");
        assert_eq!(release.format(VersionFormat::NoPrerelease), "1.4.2");
        assert_eq!(v("1.4.2.0").to_string(), "1.4.2");
    }

    #[test]
    fn append_prerelease_suffix() {
        let mut version = v("1.0.0");
        version.append_prerelease("Debug").unwrap();
        assert_eq!(version.to_string(), "1.0.0-Debug");

        let mut version = v("1.0.0-beta");
        version.append_prerelease("Debug").unwrap();
        assert_eq!(version.to_string(), "1.0.0-beta.Debug");

        assert!(version.append_prerelease("with space").is_err());
        assert!(version.append_prerelease("").is_err());
    }

    #[test]
    fn assembly_versions() {
        let version = SemanticVersion::from_assembly_version("1.6.08.24119").unwrap();
        assert_eq!(version.to_string(), "1.6.8.24119");
        assert_eq!(version.without_revision().to_string(), "1.6.8");
        assert!(SemanticVersion::from_assembly_version("1").is_err());
        assert!(SemanticVersion::from_assembly_version("1.2-beta").is_err());
    }
}
