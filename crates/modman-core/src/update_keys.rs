//! Update keys: `Provider:ID[@subkey]` strings telling the loader where to
//! check for new releases.

use crate::diagnostics::Diagnostics;
use std::fmt;
use url::Url;

const UPDATE_KEY_HELP: &str =
    "See https://stardewvalleywiki.com/Modding:Modder_Guide/APIs/Update_checks for details.";

/// Known update-check providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateProvider {
    Chucklefish,
    CurseForge,
    ModDrop,
    Nexus,
    GitHub,
    UpdateManifest,
}

impl UpdateProvider {
    /// Look up a provider by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "chucklefish" => Some(Self::Chucklefish),
            "curseforge" => Some(Self::CurseForge),
            "moddrop" => Some(Self::ModDrop),
            "nexus" => Some(Self::Nexus),
            "github" => Some(Self::GitHub),
            "updatemanifest" => Some(Self::UpdateManifest),
            _ => None,
        }
    }

    fn uses_integer_ids(self) -> bool {
        matches!(
            self,
            Self::Chucklefish | Self::CurseForge | Self::ModDrop | Self::Nexus
        )
    }
}

/// A parsed update key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateKey {
    /// Provider name as written.
    pub provider: String,
    pub id: String,
    /// Subkey, including its leading `@`.
    pub subkey: Option<String>,
}

impl UpdateKey {
    /// Parse `Provider:ID[@subkey]`. Returns `None` if the provider or ID is
    /// missing.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let (provider, rest) = input.trim().split_once(':')?;
        let provider = provider.trim_end();
        let rest = rest.trim_start();

        let (id, subkey) = match rest.find('@') {
            Some(at) => (rest[..at].trim_end(), Some(rest[at..].to_string())),
            None => (rest, None),
        };

        if provider.is_empty() || id.is_empty() {
            return None;
        }

        Some(Self {
            provider: provider.to_string(),
            id: id.to_string(),
            subkey,
        })
    }

    /// The provider, if it is one this crate knows.
    #[must_use]
    pub fn known_provider(&self) -> Option<UpdateProvider> {
        UpdateProvider::from_name(&self.provider)
    }

    /// Problems with this key, as human-readable messages.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let key = self;
        let site = &self.provider;
        let mut problems = Vec::new();

        let Some(provider) = self.known_provider() else {
            if site.eq_ignore_ascii_case("nexusmods") {
                problems.push(format!(
                    "UpdateKey '{key}' has an unknown provider '{site}'. Did you mean 'Nexus'?"
                ));
            } else {
                problems.push(format!(
                    "UpdateKey '{key}' has an unknown provider '{site}'. The tool may be out of date, or you may have made a mistake."
                ));
            }
            return problems;
        };

        if provider == UpdateProvider::Chucklefish {
            problems.push(format!(
                "UpdateKey '{key}' is using deprecated provider '{site}'."
            ));
        }

        if provider.uses_integer_ids() && self.id.parse::<u32>().is_err() {
            problems.push(format!(
                "UpdateKey '{key}' has an invalid mod ID. Provider '{site}' uses integer IDs, but '{}' is not an integer.",
                self.id
            ));
        }

        match provider {
            UpdateProvider::GitHub => {
                if self.id.matches('/').count() != 1 {
                    problems.push(format!(
                        "UpdateKey '{key}' has an invalid GitHub repository key. Must be a username and project name, like: 'Pathoschild/SMAPI'."
                    ));
                }
                if self.subkey.is_some() {
                    problems.push(format!(
                        "UpdateKey '{key}' has an update subkey, but subkeys don't work for GitHub repositories due to how releases are fetched."
                    ));
                }
            }
            UpdateProvider::UpdateManifest => {
                if Url::parse(&self.id).is_err() {
                    problems.push(format!("UpdateKey '{key}' has an invalid URL."));
                }
            }
            _ => {}
        }

        problems
    }
}

impl fmt::Display for UpdateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)?;
        if let Some(subkey) = &self.subkey {
            f.write_str(subkey)?;
        }
        Ok(())
    }
}

/// Combine requested update keys with the manifest's existing ones.
///
/// Requested entries may hold several comma-separated keys. Requested keys
/// come first; duplicates are dropped. `requested` of `None` keeps the
/// existing keys untouched.
pub fn merge_update_keys(
    requested: Option<&[String]>,
    existing: Option<Vec<String>>,
    diagnostics: &mut Diagnostics,
) -> Option<Vec<String>> {
    let Some(requested) = requested else {
        match &existing {
            None => diagnostics.warning(
                "No update keys were requested and \"UpdateKeys\" is not present in existing manifest.",
            ),
            Some(keys) if keys.is_empty() => diagnostics.warning(
                "No update keys were requested and existing \"UpdateKeys\" in manifest is empty.",
            ),
            Some(_) => {}
        }
        return existing;
    };

    let mut keys: Vec<String> = Vec::new();
    let candidates = requested
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .chain(existing.unwrap_or_default());
    for key in candidates {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    if keys.is_empty() {
        diagnostics.warning("Update keys were requested but contained no values.");
        None
    } else {
        Some(keys)
    }
}

/// Report every malformed or suspicious update key as a warning.
pub fn validate_update_keys(keys: &[String], diagnostics: &mut Diagnostics) {
    for raw in keys {
        match UpdateKey::parse(raw) {
            Some(key) => {
                for problem in key.problems() {
                    diagnostics.warning(problem);
                }
            }
            None => diagnostics.warning(format!(
                "UpdateKey '{raw}' is not correctly formatted. {UPDATE_KEY_HELP}"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    fn problems(raw: &str) -> Vec<String> {
        UpdateKey::parse(raw).unwrap().problems()
    }

    #[test]
    fn parse_keys() {
        let key = UpdateKey::parse(" Nexus : 1234 @beta ").unwrap();
        assert_eq!(key.provider, "Nexus");
        assert_eq!(key.id, "1234");
        assert_eq!(key.subkey.as_deref(), Some("@beta"));
        assert_eq!(key.to_string(), "Nexus:1234@beta");

        assert!(UpdateKey::parse("Nexus").is_none());
        assert!(UpdateKey::parse("Nexus:").is_none());
        assert!(UpdateKey::parse(":1234").is_none());
        assert!(UpdateKey::parse("Nexus:@sub").is_none());
    }

    #[test]
    fn provider_checks() {
        assert!(problems("Nexus:11115").is_empty());
        assert!(problems("github:Pathoschild/SMAPI").is_empty());
        assert!(problems("UpdateManifest:https://example.org/mods.json").is_empty());

        assert_eq!(problems("CurseForge:abc").len(), 1);
        // Deprecated and non-numeric.
        assert_eq!(problems("Chucklefish:x").len(), 2);
        assert_eq!(problems("GitHub:SMAPI@beta").len(), 2);
        assert_eq!(problems("UpdateManifest:not a url").len(), 1);
        assert!(problems("NexusMods:1")[0].contains("Did you mean 'Nexus'?"));
        assert!(problems("Somewhere:1")[0].contains("unknown provider"));
    }

    #[test]
    fn merge_keeps_order_and_drops_duplicates() {
        let mut diagnostics = Diagnostics::new();
        let requested = vec!["Nexus:1, GitHub:a/b".to_string(), " ".to_string()];
        let merged = merge_update_keys(
            Some(requested.as_slice()),
            Some(vec!["GitHub:a/b".to_string(), "ModDrop:5".to_string()]),
            &mut diagnostics,
        );
        assert_eq!(
            merged.unwrap(),
            ["Nexus:1", "GitHub:a/b", "ModDrop:5"]
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn merge_warns_when_nothing_is_set() {
        let mut diagnostics = Diagnostics::new();
        assert_eq!(merge_update_keys(Some(&[String::new()][..]), None, &mut diagnostics), None);
        assert_eq!(merge_update_keys(None, None, &mut diagnostics), None);
        assert_eq!(
            merge_update_keys(None, Some(vec![]), &mut diagnostics),
            Some(vec![])
        );
        assert_eq!(diagnostics.count(Severity::Warning), 3);
    }

    #[test]
    fn validate_reports_malformed_keys() {
        let mut diagnostics = Diagnostics::new();
        validate_update_keys(
            &["Nexus:1".to_string(), "garbage".to_string()],
            &mut diagnostics,
        );
        assert_eq!(diagnostics.count(Severity::Warning), 1);
    }
}
