// Fnlock Config Store
// TOML-backed settings with named profiles and lock-state persistence

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::profile::{default_activation_key, default_key_map, Profile, DEFAULT_PROFILE};
use crate::engine::{LockStateStore, StoreError};
use crate::snapshot::{MappingSnapshot, SnapshotError};

/// Errors that can occur when loading or changing configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Profile already exists: {0}")]
    ProfileExists(String),

    #[error("Profile '{0}' cannot be deleted")]
    ProtectedProfile(String),

    #[error("Profile '{profile}' is invalid: {source}")]
    Snapshot {
        profile: String,
        #[source]
        source: SnapshotError,
    },
}

fn default_profile_name() -> String {
    DEFAULT_PROFILE.to_string()
}

/// On-disk layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    active: bool,

    #[serde(default = "default_profile_name")]
    current_profile: String,

    #[serde(default)]
    profiles: IndexMap<String, Profile>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let mut profiles = IndexMap::new();
        profiles.insert(default_profile_name(), Profile::default());
        Self {
            active: false,
            current_profile: default_profile_name(),
            profiles,
        }
    }
}

impl ConfigFile {
    /// Restore the invariants a hand-edited file may break
    fn normalize(mut self) -> Self {
        if !self.profiles.contains_key(DEFAULT_PROFILE) {
            self.profiles
                .insert(default_profile_name(), Profile::default());
        }
        if !self.profiles.contains_key(&self.current_profile) {
            log::warn!(
                "Current profile '{}' does not exist, using '{}'",
                self.current_profile,
                DEFAULT_PROFILE
            );
            self.current_profile = default_profile_name();
        }
        self
    }

    fn current(&self) -> &Profile {
        // normalize() guarantees the entry
        &self.profiles[&self.current_profile]
    }

    fn current_mut(&mut self) -> &mut Profile {
        let name = self.current_profile.clone();
        self.profiles.entry(name).or_default()
    }
}

/// Flat layout used before profiles existed
#[derive(Debug, Deserialize)]
struct LegacyConfigFile {
    #[serde(default)]
    active: bool,

    #[serde(default = "default_activation_key")]
    activation_key: String,

    #[serde(default)]
    smart_typing: bool,

    #[serde(default = "default_key_map")]
    key_map: IndexMap<String, String>,
}

impl From<LegacyConfigFile> for ConfigFile {
    fn from(legacy: LegacyConfigFile) -> Self {
        let mut config = ConfigFile {
            active: legacy.active,
            ..ConfigFile::default()
        };
        config.profiles.insert(
            default_profile_name(),
            Profile {
                activation_key: legacy.activation_key,
                smart_typing: legacy.smart_typing,
                key_map: legacy.key_map,
            },
        );
        config
    }
}

fn parse_config(content: &str) -> Result<ConfigFile, ConfigError> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;

    let config = if table.contains_key("profiles") {
        toml::Value::Table(table)
            .try_into::<ConfigFile>()
            .map_err(|e| ConfigError::TomlParse(e.to_string()))?
    } else {
        log::info!("Migrating flat configuration into profile '{}'", DEFAULT_PROFILE);
        toml::Value::Table(table)
            .try_into::<LegacyConfigFile>()
            .map_err(|e| ConfigError::TomlParse(e.to_string()))?
            .into()
    };
    Ok(config.normalize())
}

/// Configuration shared by the binary and the engine.
///
/// Profile-scoped settings (activation key, smart typing, key map) apply to
/// the current profile. Every change is written back immediately when the
/// store is file-backed. Changes that would make the current profile
/// invalid are rejected and leave the store untouched.
#[derive(Debug)]
pub struct ConfigStore {
    source_path: Option<PathBuf>,
    data: RwLock<ConfigFile>,
}

impl ConfigStore {
    /// Get the default config path (~/.config/fnlock/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fnlock").join("config.toml"))
    }

    /// Store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            source_path: None,
            data: RwLock::new(ConfigFile::default()),
        }
    }

    /// In-memory store parsed from TOML
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            source_path: None,
            data: RwLock::new(parse_config(content)?),
        })
    }

    /// Load from `path`. A missing file yields defaults; it is created on
    /// the first change.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = Self::read(path)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(Self {
            source_path: Some(path.to_path_buf()),
            data: RwLock::new(data),
        })
    }

    /// Load from the default path, or in memory when no config directory exists
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(path),
            None => Ok(Self::in_memory()),
        }
    }

    fn read(path: &Path) -> Result<ConfigFile, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => parse_config(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-read the backing file
    pub fn reload(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.source_path {
            let data = Self::read(path)?;
            *self.data.write() = data;
        }
        Ok(())
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Serialize the whole configuration
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Self::serialize(&self.data.read())
    }

    fn serialize(data: &ConfigFile) -> Result<String, ConfigError> {
        toml::to_string_pretty(data).map_err(|e| ConfigError::TomlSerialize(e.to_string()))
    }

    fn write(&self, data: &ConfigFile) -> Result<(), ConfigError> {
        let Some(path) = &self.source_path else {
            return Ok(());
        };
        let content = Self::serialize(data)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply `change` to a copy of the data, persist it, then publish it
    fn update<R>(
        &self,
        change: impl FnOnce(&mut ConfigFile) -> Result<R, ConfigError>,
    ) -> Result<R, ConfigError> {
        let mut data = self.data.write();
        let mut updated = data.clone();
        let result = change(&mut updated)?;
        self.write(&updated)?;
        *data = updated;
        Ok(result)
    }

    /// Like `update`, but also require the current profile to stay valid
    fn update_profile(&self, change: impl FnOnce(&mut Profile)) -> Result<(), ConfigError> {
        self.update(|data| {
            change(data.current_mut());
            data.current()
                .snapshot()
                .map_err(|source| ConfigError::Snapshot {
                    profile: data.current_profile.clone(),
                    source,
                })?;
            Ok(())
        })
    }

    /// Write the current state to the backing file
    pub fn save(&self) -> Result<(), ConfigError> {
        self.write(&self.data.read())
    }

    /// Persisted lock state
    pub fn is_active(&self) -> bool {
        self.data.read().active
    }

    pub fn set_active(&self, active: bool) -> Result<(), ConfigError> {
        self.update(|data| {
            data.active = active;
            Ok(())
        })
    }

    /// Profile names in file order
    pub fn profile_names(&self) -> Vec<String> {
        self.data.read().profiles.keys().cloned().collect()
    }

    pub fn current_profile_name(&self) -> String {
        self.data.read().current_profile.clone()
    }

    /// Settings of the current profile
    pub fn current_profile(&self) -> Profile {
        self.data.read().current().clone()
    }

    /// Settings of a named profile
    pub fn profile(&self, name: &str) -> Option<Profile> {
        self.data.read().profiles.get(name).cloned()
    }

    /// Create a profile with the default settings
    pub fn create_profile(&self, name: &str) -> Result<(), ConfigError> {
        self.update(|data| {
            if data.profiles.contains_key(name) {
                return Err(ConfigError::ProfileExists(name.to_string()));
            }
            data.profiles.insert(name.to_string(), Profile::default());
            Ok(())
        })
    }

    /// Delete a profile. Deleting the current profile switches to the
    /// default one, which itself cannot be deleted.
    pub fn delete_profile(&self, name: &str) -> Result<(), ConfigError> {
        self.update(|data| {
            if name == DEFAULT_PROFILE {
                return Err(ConfigError::ProtectedProfile(name.to_string()));
            }
            if data.profiles.shift_remove(name).is_none() {
                return Err(ConfigError::UnknownProfile(name.to_string()));
            }
            if data.current_profile == name {
                data.current_profile = default_profile_name();
            }
            Ok(())
        })
    }

    /// Switch the current profile
    pub fn set_current_profile(&self, name: &str) -> Result<(), ConfigError> {
        self.update(|data| {
            if !data.profiles.contains_key(name) {
                return Err(ConfigError::UnknownProfile(name.to_string()));
            }
            data.current_profile = name.to_string();
            Ok(())
        })
    }

    pub fn set_activation_key(&self, key: &str) -> Result<(), ConfigError> {
        self.update_profile(|profile| profile.activation_key = key.to_string())
    }

    pub fn set_smart_typing(&self, enabled: bool) -> Result<(), ConfigError> {
        self.update_profile(|profile| profile.smart_typing = enabled)
    }

    /// Replace the key map of the current profile
    pub fn set_key_map<I, S, D>(&self, key_map: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (S, D)>,
        S: Into<String>,
        D: Into<String>,
    {
        let key_map: IndexMap<String, String> = key_map
            .into_iter()
            .map(|(source, destination)| (source.into(), destination.into()))
            .collect();
        self.update_profile(|profile| profile.key_map = key_map)
    }

    /// Mapping of the current profile
    pub fn snapshot(&self) -> Result<MappingSnapshot, ConfigError> {
        let data = self.data.read();
        data.current()
            .snapshot()
            .map_err(|source| ConfigError::Snapshot {
                profile: data.current_profile.clone(),
                source,
            })
    }
}

impl LockStateStore for ConfigStore {
    fn load_active(&self) -> bool {
        self.is_active()
    }

    fn store_active(&self, active: bool) -> Result<(), StoreError> {
        self.set_active(active).map_err(Into::into)
    }
}
