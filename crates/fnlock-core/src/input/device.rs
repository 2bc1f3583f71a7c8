// Fnlock Input Layer - Device Detection
// Capability analysis used to pick the keyboards worth grabbing

use std::collections::HashSet;

/// Name of the uinput device fnlock writes to.
///
/// Devices carrying this name are never grabbed, so injected keys cannot
/// loop back into the hooks.
pub const VIRTUAL_DEVICE_NAME: &str = "fnlock (virtual) keyboard";

/// Device capabilities extracted from an evdev device
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    /// Whether the device supports EV_KEY events
    pub has_ev_key: bool,
    /// Supported key codes
    pub supported_keys: HashSet<u16>,
}

impl DeviceCapabilities {
    /// Create a new DeviceCapabilities struct
    pub fn new(has_ev_key: bool, supported_keys: impl IntoIterator<Item = u16>) -> Self {
        Self {
            has_ev_key,
            supported_keys: supported_keys.into_iter().collect(),
        }
    }

    /// Check if a specific key code is supported
    pub fn supports_key(&self, key_code: u16) -> bool {
        self.supported_keys.contains(&key_code)
    }
}

// Q, W, E, R, T, Y
const QWERTY_CODES: &[u16] = &[16, 17, 18, 19, 20, 21];

// SPACE, A, Z
const A_Z_SPACE_CODES: &[u16] = &[57, 30, 44];

/// Determine if a device is a typing keyboard.
///
/// Mice, power buttons and media remotes also report EV_KEY, so a keyboard
/// must additionally carry the QWERTY row plus A, Z and SPACE.
pub fn is_keyboard(capabilities: &DeviceCapabilities) -> bool {
    if !capabilities.has_ev_key {
        return false;
    }

    QWERTY_CODES
        .iter()
        .chain(A_Z_SPACE_CODES)
        .all(|code| capabilities.supports_key(*code))
}

/// Check if a device is fnlock's own output device
pub fn is_virtual_device(name: &str) -> bool {
    name.starts_with(VIRTUAL_DEVICE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyboard_caps() -> DeviceCapabilities {
        let mut keys = vec![1, 14, 15, 28, 29, 42, 56];
        keys.extend_from_slice(QWERTY_CODES);
        keys.extend_from_slice(A_Z_SPACE_CODES);
        DeviceCapabilities::new(true, keys)
    }

    #[test]
    fn test_full_keyboard_detected() {
        assert!(is_keyboard(&keyboard_caps()));
    }

    #[test]
    fn test_mouse_is_not_keyboard() {
        // BTN_LEFT, BTN_RIGHT, BTN_MIDDLE
        let caps = DeviceCapabilities::new(true, [272, 273, 274]);
        assert!(!is_keyboard(&caps));
    }

    #[test]
    fn test_missing_letter_row_is_not_keyboard() {
        let caps = DeviceCapabilities::new(true, A_Z_SPACE_CODES.iter().copied());
        assert!(!is_keyboard(&caps));
    }

    #[test]
    fn test_no_ev_key() {
        let caps = DeviceCapabilities::new(false, QWERTY_CODES.iter().copied());
        assert!(!is_keyboard(&caps));
    }

    #[test]
    fn test_virtual_device_name() {
        assert!(is_virtual_device(VIRTUAL_DEVICE_NAME));
        assert!(!is_virtual_device("AT Translated Set 2 keyboard"));
    }
}
