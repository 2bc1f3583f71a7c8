// Fnlock Input Layer - Device Filtering
// Decides which input devices the evdev driver grabs

/// Device selection rules.
///
/// With no explicit entries every physical keyboard is used. With entries,
/// only devices whose name or path appears in the list are used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    only: Vec<String>,
}

impl DeviceFilter {
    /// Autodetect keyboards
    pub fn autodetect() -> Self {
        Self::default()
    }

    /// Restrict to the named devices (names or `/dev/input/eventN` paths)
    pub fn only(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            only: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the filter autodetects
    pub fn is_autodetect(&self) -> bool {
        self.only.is_empty()
    }

    /// Check if a device should be grabbed.
    ///
    /// # Arguments
    /// * `name` - The device name from evdev
    /// * `path` - The device path (e.g., "/dev/input/event0")
    /// * `is_keyboard` - Result of [`super::is_keyboard`]
    /// * `is_virtual` - Result of [`super::is_virtual_device`]
    pub fn accepts(&self, name: &str, path: &str, is_keyboard: bool, is_virtual: bool) -> bool {
        if is_virtual {
            return false;
        }
        if self.is_autodetect() {
            return is_keyboard;
        }
        self.only.iter().any(|entry| entry == name || entry == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autodetect_keyboard() {
        let filter = DeviceFilter::autodetect();
        assert!(filter.accepts("Generic Keyboard", "/dev/input/event0", true, false));
        assert!(!filter.accepts("Generic Mouse", "/dev/input/event1", false, false));
    }

    #[test]
    fn test_explicit_match_by_name_or_path() {
        let filter = DeviceFilter::only(["Logitech Keyboard", "/dev/input/event7"]);
        assert!(filter.accepts("Logitech Keyboard", "/dev/input/event5", true, false));
        assert!(filter.accepts("Macro Pad", "/dev/input/event7", false, false));
        assert!(!filter.accepts("Other Device", "/dev/input/event1", true, false));
    }

    #[test]
    fn test_virtual_device_never_accepted() {
        let filter = DeviceFilter::only(["fnlock (virtual) keyboard"]);
        assert!(!filter.accepts("fnlock (virtual) keyboard", "/dev/input/event9", true, true));
        assert!(!DeviceFilter::autodetect().accepts(
            "fnlock (virtual) keyboard",
            "/dev/input/event9",
            true,
            true
        ));
    }
}
