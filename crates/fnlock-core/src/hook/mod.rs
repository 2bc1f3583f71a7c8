// Fnlock Hook Drivers
// Platform boundary for key interception and synthetic key injection

mod fake;
mod table;

#[cfg(feature = "evdev-driver")]
mod evdev_driver;

use std::fmt;
use std::sync::Arc;

use crate::{Key, KeyEvent};

pub use fake::FakeDriver;
pub use table::{Dispatch, HookTable};

#[cfg(feature = "evdev-driver")]
pub use evdev_driver::{list_devices, DeviceInfo, EvdevDriver};

/// Result type for hook driver operations
pub type HookResult<T> = Result<T, HookError>;

/// Callback invoked by a driver for each matching key event
pub type KeyCallback = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

/// Errors reported by hook drivers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    /// The key cannot be hooked (claimed elsewhere or not supported)
    #[error("Key '{key}' is unavailable: {reason}")]
    KeyUnavailable { key: Key, reason: String },

    /// The platform hook subsystem cannot be used at all
    #[error("Hook driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Failed to inject key: {0}")]
    Injection(String),
}

/// Identifies one installed hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookHandle(pub u64);

impl fmt::Display for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// Low-level key interception.
///
/// Drivers must not invoke callbacks while holding their own registration
/// state, so a callback may register or unregister hooks. Events injected
/// with [`HookDriver::send_key`] are never delivered to per-key hooks; global
/// monitors see them with `synthetic` set.
pub trait HookDriver: Send + Sync {
    /// Call `callback` on every key-down of `key`, optionally swallowing it
    fn register_key_down(
        &self,
        key: Key,
        suppress: bool,
        callback: KeyCallback,
    ) -> HookResult<HookHandle>;

    /// Call `callback` on every release of `key`
    fn register_key_up(&self, key: Key, callback: KeyCallback) -> HookResult<HookHandle>;

    /// Remove a hook. Unknown or already removed handles are ignored.
    fn unregister(&self, handle: HookHandle);

    /// Tap `key` as if the user pressed and released it
    fn send_key(&self, key: Key) -> HookResult<()>;

    /// Observe every key event regardless of suppression
    fn install_global_monitor(&self, callback: KeyCallback) -> HookResult<HookHandle>;

    /// Release platform resources. Drivers without threads need nothing.
    fn shutdown(&self) {}
}

/// Driver used when the platform hook subsystem could not be opened.
///
/// Every operation fails with [`HookError::DriverUnavailable`].
#[derive(Debug, Clone)]
pub struct UnavailableDriver {
    reason: String,
}

impl UnavailableDriver {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> HookError {
        HookError::DriverUnavailable(self.reason.clone())
    }
}

impl HookDriver for UnavailableDriver {
    fn register_key_down(&self, _: Key, _: bool, _: KeyCallback) -> HookResult<HookHandle> {
        Err(self.error())
    }

    fn register_key_up(&self, _: Key, _: KeyCallback) -> HookResult<HookHandle> {
        Err(self.error())
    }

    fn unregister(&self, _: HookHandle) {}

    fn send_key(&self, _: Key) -> HookResult<()> {
        Err(self.error())
    }

    fn install_global_monitor(&self, _: KeyCallback) -> HookResult<HookHandle> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_driver_rejects_everything() {
        let driver = UnavailableDriver::new("no input devices");
        let key = Key::parse("w").unwrap();
        let callback: KeyCallback = Arc::new(|_: &KeyEvent| {});

        let expected = HookError::DriverUnavailable("no input devices".to_string());
        assert_eq!(
            driver.register_key_down(key, true, callback.clone()),
            Err(expected.clone())
        );
        assert_eq!(driver.register_key_up(key, callback.clone()), Err(expected.clone()));
        assert_eq!(driver.install_global_monitor(callback), Err(expected.clone()));
        assert_eq!(driver.send_key(key), Err(expected));
        driver.unregister(HookHandle(1));
    }

    #[test]
    fn test_key_unavailable_message() {
        let err = HookError::KeyUnavailable {
            key: Key::parse("f13").unwrap(),
            reason: "claimed by another process".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Key 'f13' is unavailable: claimed by another process"
        );
    }
}
