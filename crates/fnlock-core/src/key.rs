// Fnlock Key Type
// Canonical key identifiers backed by Linux input-event-codes.h

use std::fmt;
use std::str::FromStr;

/// Errors produced while resolving a key name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Key name is empty")]
    Empty,

    #[error("Unknown key: {0}")]
    Unknown(String),
}

/// A validated key identifier.
///
/// Keys are identified by their canonical lowercase name (`"w"`, `"up"`,
/// `"right alt"`). Two platform aliases of the same physical key (`"right alt"`
/// and `"alt gr"`) are distinct keys that share one hardware code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    name: &'static str,
    code: u16,
}

/// Canonical names and their input-event codes.
///
/// When several names share a code, the first one listed is the name
/// reported for hardware events carrying that code.
const KEY_TABLE: &[(&str, u16)] = &[
    ("esc", 1),
    ("1", 2),
    ("2", 3),
    ("3", 4),
    ("4", 5),
    ("5", 6),
    ("6", 7),
    ("7", 8),
    ("8", 9),
    ("9", 10),
    ("0", 11),
    ("-", 12),
    ("=", 13),
    ("backspace", 14),
    ("tab", 15),
    ("q", 16),
    ("w", 17),
    ("e", 18),
    ("r", 19),
    ("t", 20),
    ("y", 21),
    ("u", 22),
    ("i", 23),
    ("o", 24),
    ("p", 25),
    ("[", 26),
    ("]", 27),
    ("enter", 28),
    ("ctrl", 29),
    ("a", 30),
    ("s", 31),
    ("d", 32),
    ("f", 33),
    ("g", 34),
    ("h", 35),
    ("j", 36),
    ("k", 37),
    ("l", 38),
    (";", 39),
    ("'", 40),
    ("`", 41),
    ("shift", 42),
    ("\\", 43),
    ("z", 44),
    ("x", 45),
    ("c", 46),
    ("v", 47),
    ("b", 48),
    ("n", 49),
    ("m", 50),
    (",", 51),
    (".", 52),
    ("/", 53),
    ("right shift", 54),
    ("num multiply", 55),
    ("alt", 56),
    ("space", 57),
    ("caps lock", 58),
    ("f1", 59),
    ("f2", 60),
    ("f3", 61),
    ("f4", 62),
    ("f5", 63),
    ("f6", 64),
    ("f7", 65),
    ("f8", 66),
    ("f9", 67),
    ("f10", 68),
    ("num lock", 69),
    ("scroll lock", 70),
    ("num 7", 71),
    ("num 8", 72),
    ("num 9", 73),
    ("num minus", 74),
    ("num 4", 75),
    ("num 5", 76),
    ("num 6", 77),
    ("num plus", 78),
    ("num 1", 79),
    ("num 2", 80),
    ("num 3", 81),
    ("num 0", 82),
    ("num decimal", 83),
    ("102nd", 86),
    ("f11", 87),
    ("f12", 88),
    ("num enter", 96),
    ("right ctrl", 97),
    ("num divide", 98),
    ("print screen", 99),
    ("right alt", 100),
    ("alt gr", 100),
    ("home", 102),
    ("up", 103),
    ("page up", 104),
    ("left", 105),
    ("right", 106),
    ("end", 107),
    ("down", 108),
    ("page down", 109),
    ("insert", 110),
    ("delete", 111),
    ("volume mute", 113),
    ("volume down", 114),
    ("volume up", 115),
    ("pause", 119),
    ("left windows", 125),
    ("right windows", 126),
    ("menu", 127),
    ("f13", 183),
    ("f14", 184),
    ("f15", 185),
    ("f16", 186),
    ("f17", 187),
    ("f18", 188),
    ("f19", 189),
    ("f20", 190),
    ("f21", 191),
    ("f22", 192),
    ("f23", 193),
    ("f24", 194),
    ("next track", 163),
    ("play/pause media", 164),
    ("previous track", 165),
    ("stop media", 166),
];

/// Alternate spellings accepted by [`Key::parse`], resolved to canonical names.
const SPELLINGS: &[(&str, &str)] = &[
    ("escape", "esc"),
    ("return", "enter"),
    ("spacebar", "space"),
    ("left ctrl", "ctrl"),
    ("left control", "ctrl"),
    ("control", "ctrl"),
    ("right control", "right ctrl"),
    ("left shift", "shift"),
    ("left alt", "alt"),
    ("altgr", "alt gr"),
    ("capslock", "caps lock"),
    ("pgup", "page up"),
    ("pageup", "page up"),
    ("pgdn", "page down"),
    ("pagedown", "page down"),
    ("del", "delete"),
    ("ins", "insert"),
    ("prtscr", "print screen"),
    ("print", "print screen"),
    ("win", "left windows"),
    ("super", "left windows"),
    ("left super", "left windows"),
    ("right super", "right windows"),
    ("arrow up", "up"),
    ("arrow down", "down"),
    ("arrow left", "left"),
    ("arrow right", "right"),
    ("minus", "-"),
    ("equal", "="),
    ("comma", ","),
    ("dot", "."),
    ("period", "."),
    ("slash", "/"),
    ("semicolon", ";"),
    ("apostrophe", "'"),
    ("grave", "`"),
    ("backslash", "\\"),
];

/// Keys in the shift/ctrl/alt/caps-lock family
const MODIFIERS: &[&str] = &[
    "shift",
    "right shift",
    "ctrl",
    "right ctrl",
    "alt",
    "right alt",
    "alt gr",
    "caps lock",
];

/// Lowercase, map `_`/`-` separators to spaces and collapse whitespace.
///
/// A lone `-` is kept since it names the minus key.
fn normalize(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed == "-" {
        return trimmed.to_string();
    }
    trimmed
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Key {
    /// Resolve a key name to its canonical key
    pub fn parse(name: &str) -> Result<Self, KeyError> {
        let normalized = normalize(name);
        if normalized.is_empty() {
            return Err(KeyError::Empty);
        }

        let canonical = SPELLINGS
            .iter()
            .find(|(spelling, _)| *spelling == normalized)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(normalized.as_str());

        KEY_TABLE
            .iter()
            .find(|(n, _)| *n == canonical)
            .map(|&(name, code)| Self { name, code })
            .ok_or_else(|| KeyError::Unknown(name.trim().to_string()))
    }

    /// Primary key for a hardware code
    pub fn from_code(code: u16) -> Option<Self> {
        KEY_TABLE
            .iter()
            .find(|(_, c)| *c == code)
            .map(|&(name, code)| Self { name, code })
    }

    /// Canonical name
    pub fn name(self) -> &'static str {
        self.name
    }

    /// Input-event code driving this key
    pub fn code(self) -> u16 {
        self.code
    }

    /// Whether this key belongs to the shift/ctrl/alt/caps-lock family
    pub fn is_modifier(self) -> bool {
        MODIFIERS.contains(&self.name)
    }

    /// Whether both keys are produced by the same physical key
    pub fn same_physical_key(self, other: Key) -> bool {
        self.code == other.code
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        assert_eq!(Key::parse("w").unwrap().code(), 17);
        assert_eq!(Key::parse("up").unwrap().code(), 103);
        assert_eq!(Key::parse("right alt").unwrap().name(), "right alt");
        assert_eq!(Key::parse("f5").unwrap().code(), 63);
    }

    #[test]
    fn test_parse_normalizes_spelling() {
        assert_eq!(Key::parse("W").unwrap(), Key::parse("w").unwrap());
        assert_eq!(Key::parse("RIGHT_ALT").unwrap().name(), "right alt");
        assert_eq!(Key::parse("  Page-Up ").unwrap().name(), "page up");
        assert_eq!(Key::parse("Escape").unwrap().name(), "esc");
        assert_eq!(Key::parse("left alt").unwrap().name(), "alt");
        assert_eq!(Key::parse("AltGr").unwrap().name(), "alt gr");
        assert_eq!(Key::parse("-").unwrap().code(), 12);
    }

    #[test]
    fn test_parse_rejects_empty_and_unknown() {
        assert_eq!(Key::parse(""), Err(KeyError::Empty));
        assert_eq!(Key::parse("   "), Err(KeyError::Empty));
        assert_eq!(
            Key::parse("hyper"),
            Err(KeyError::Unknown("hyper".to_string()))
        );
    }

    #[test]
    fn test_aliases_are_distinct_keys_on_one_code() {
        let right_alt = Key::parse("right alt").unwrap();
        let alt_gr = Key::parse("alt gr").unwrap();
        assert_ne!(right_alt, alt_gr);
        assert!(right_alt.same_physical_key(alt_gr));
        assert_eq!(Key::from_code(100), Some(right_alt));
    }

    #[test]
    fn test_modifier_family() {
        for name in ["shift", "ctrl", "alt", "right alt", "alt gr", "caps lock"] {
            assert!(Key::parse(name).unwrap().is_modifier(), "{name}");
        }
        assert!(!Key::parse("w").unwrap().is_modifier());
        assert!(!Key::parse("left windows").unwrap().is_modifier());
    }

    #[test]
    fn test_display_and_from_str() {
        let key: Key = "Page Down".parse().unwrap();
        assert_eq!(key.to_string(), "page down");
    }

    #[test]
    fn test_key_hash() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(Key::parse("a").unwrap(), "value");
        assert_eq!(map.get(&Key::parse("A").unwrap()), Some(&"value"));
    }
}
