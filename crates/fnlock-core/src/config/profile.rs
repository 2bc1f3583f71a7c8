// Fnlock Profiles
// Per-profile mapping settings as stored in the config file

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::snapshot::{MappingSnapshot, SnapshotError};

/// Name of the profile that always exists
pub const DEFAULT_PROFILE: &str = "Default";

pub(crate) fn default_activation_key() -> String {
    "right alt".to_string()
}

pub(crate) fn default_key_map() -> IndexMap<String, String> {
    [("w", "up"), ("a", "left"), ("s", "down"), ("d", "right")]
        .into_iter()
        .map(|(source, destination)| (source.to_string(), destination.to_string()))
        .collect()
}

/// Mapping settings of one profile.
///
/// Key names are kept as written so the file round-trips; they are only
/// validated when a [`MappingSnapshot`] is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "default_activation_key")]
    pub activation_key: String,

    #[serde(default)]
    pub smart_typing: bool,

    #[serde(default = "default_key_map")]
    pub key_map: IndexMap<String, String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            activation_key: default_activation_key(),
            smart_typing: false,
            key_map: default_key_map(),
        }
    }
}

impl Profile {
    /// Validate the profile into a snapshot
    pub fn snapshot(&self) -> Result<MappingSnapshot, SnapshotError> {
        MappingSnapshot::parse(
            &self.activation_key,
            self.key_map
                .iter()
                .map(|(source, destination)| (source.as_str(), destination.as_str())),
            self.smart_typing,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Key;

    #[test]
    fn test_default_profile() {
        let profile = Profile::default();
        assert_eq!(profile.activation_key, "right alt");
        assert!(!profile.smart_typing);

        let snapshot = profile.snapshot().unwrap();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(
            snapshot.destination(Key::parse("d").unwrap()),
            Some(Key::parse("right").unwrap())
        );
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let profile: Profile = toml::from_str("smart_typing = true").unwrap();
        assert!(profile.smart_typing);
        assert_eq!(profile.activation_key, "right alt");
        assert_eq!(profile.key_map, default_key_map());
    }

    #[test]
    fn test_invalid_key_fails_snapshot() {
        let mut profile = Profile::default();
        profile.key_map.insert("q".to_string(), "warp".to_string());
        assert!(profile.snapshot().is_err());
    }
}
