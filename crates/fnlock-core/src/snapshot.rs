// Fnlock Mapping Snapshot
// Immutable bundle of activation key, remap table and smart-typing flag

use indexmap::IndexMap;

use crate::engine::activation_aliases;
use crate::key::{Key, KeyError};

/// Errors raised while building a snapshot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("Invalid key '{name}': {source}")]
    Key {
        name: String,
        #[source]
        source: KeyError,
    },

    #[error("Source key '{0}' is mapped more than once")]
    DuplicateSource(Key),

    #[error("Source key '{0}' collides with the activation key")]
    ActivationConflict(Key),

    #[error("Modifier key '{0}' cannot be remapped")]
    ModifierSource(Key),
}

/// The mapping in effect at a given moment.
///
/// Snapshots are validated on construction and never mutated afterwards;
/// the engine swaps them wholesale on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSnapshot {
    activation_key: Key,
    table: IndexMap<Key, Key>,
    smart_typing: bool,
}

fn parse_key(name: &str) -> Result<Key, SnapshotError> {
    Key::parse(name).map_err(|source| SnapshotError::Key {
        name: name.to_string(),
        source,
    })
}

impl MappingSnapshot {
    /// Build a snapshot from typed keys
    pub fn new(
        activation_key: Key,
        table: impl IntoIterator<Item = (Key, Key)>,
        smart_typing: bool,
    ) -> Result<Self, SnapshotError> {
        let aliases = activation_aliases(activation_key);
        let mut validated = IndexMap::new();

        for (source, destination) in table {
            if aliases.iter().any(|alias| alias.same_physical_key(source)) {
                return Err(SnapshotError::ActivationConflict(source));
            }
            if source.is_modifier() {
                return Err(SnapshotError::ModifierSource(source));
            }
            if validated.insert(source, destination).is_some() {
                return Err(SnapshotError::DuplicateSource(source));
            }
        }

        Ok(Self {
            activation_key,
            table: validated,
            smart_typing,
        })
    }

    /// Build a snapshot from key names as stored in configuration
    pub fn parse<'a>(
        activation_key: &str,
        table: impl IntoIterator<Item = (&'a str, &'a str)>,
        smart_typing: bool,
    ) -> Result<Self, SnapshotError> {
        let activation_key = parse_key(activation_key)?;
        let table = table
            .into_iter()
            .map(|(source, destination)| -> Result<(Key, Key), SnapshotError> {
                Ok((parse_key(source)?, parse_key(destination)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(activation_key, table, smart_typing)
    }

    /// Key whose release toggles the lock
    pub fn activation_key(&self) -> Key {
        self.activation_key
    }

    /// Whether typing suspends remapping
    pub fn smart_typing(&self) -> bool {
        self.smart_typing
    }

    /// Remap destination for a source key
    pub fn destination(&self, source: Key) -> Option<Key> {
        self.table.get(&source).copied()
    }

    /// Check if a key is a remap source
    pub fn contains(&self, key: Key) -> bool {
        self.table.contains_key(&key)
    }

    /// Source/destination pairs in configured order
    pub fn table(&self) -> impl Iterator<Item = (Key, Key)> + '_ {
        self.table.iter().map(|(source, destination)| (*source, *destination))
    }

    /// Number of remap entries
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
