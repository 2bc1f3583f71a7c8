// Fnlock Key Classification
// Decides what an observed key-down means to the engine

use super::activation_aliases;
use crate::{Key, MappingSnapshot};

/// Role of a key-down under a given snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum KeyClass {
    /// Any alias of the activation key
    Activation,
    /// Shift, ctrl, alt and caps lock families, ignored entirely
    Modifier,
    /// Source key of the remap table
    Mapped,
    /// Ordinary typing
    Typing,
}

/// Classify `key` against `snapshot`
pub fn classify(snapshot: &MappingSnapshot, key: Key) -> KeyClass {
    if activation_aliases(snapshot.activation_key()).contains(&key) {
        KeyClass::Activation
    } else if key.is_modifier() {
        KeyClass::Modifier
    } else if snapshot.contains(key) {
        KeyClass::Mapped
    } else {
        KeyClass::Typing
    }
}
