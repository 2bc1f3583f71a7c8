// Fnlock Activation Controller
// Release hooks for the activation key and its platform aliases

use smallvec::{smallvec, SmallVec};

use crate::hook::{HookDriver, HookError, HookHandle, HookResult, KeyCallback};
use crate::Key;

/// Names the same physical key is reported under on different layouts
const ALIAS_GROUPS: &[&[&str]] = &[&["right alt", "alt gr"]];

/// Every name the activation key may be reported under, `key` first
pub fn activation_aliases(key: Key) -> SmallVec<[Key; 2]> {
    let mut aliases: SmallVec<[Key; 2]> = smallvec![key];
    for group in ALIAS_GROUPS {
        if !group.contains(&key.name()) {
            continue;
        }
        aliases.extend(
            group
                .iter()
                .filter(|name| **name != key.name())
                .filter_map(|name| Key::parse(name).ok()),
        );
    }
    aliases
}

/// Key-up hooks installed for the activation key
#[derive(Debug, Default)]
pub(crate) struct ActivationHooks {
    key: Option<Key>,
    handles: SmallVec<[HookHandle; 2]>,
}

impl ActivationHooks {
    /// Register `callback` on the release of every alias of `key`,
    /// replacing previously installed hooks.
    ///
    /// An alias that cannot be hooked is skipped. Fails only when the
    /// driver itself is unavailable.
    pub fn install(
        &mut self,
        driver: &dyn HookDriver,
        key: Key,
        callback: KeyCallback,
    ) -> HookResult<()> {
        self.uninstall(driver);

        for alias in activation_aliases(key) {
            match driver.register_key_up(alias, callback.clone()) {
                Ok(handle) => self.handles.push(handle),
                Err(HookError::KeyUnavailable { key, reason }) => {
                    log::warn!("Activation key '{}' not hooked: {}", key, reason);
                }
                Err(e) => {
                    self.uninstall(driver);
                    return Err(e);
                }
            }
        }

        self.key = Some(key);
        log::debug!("Activation key '{}' armed ({} hooks)", key, self.handles.len());
        Ok(())
    }

    /// Remove every activation hook
    pub fn uninstall(&mut self, driver: &dyn HookDriver) {
        for handle in self.handles.drain(..) {
            driver.unregister(handle);
        }
        self.key = None;
    }

    /// Key the hooks were installed for
    #[cfg(test)]
    pub fn key(&self) -> Option<Key> {
        self.key
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::FakeDriver;
    use crate::KeyEvent;
    use std::sync::Arc;

    fn key(name: &str) -> Key {
        Key::parse(name).unwrap()
    }

    fn noop() -> KeyCallback {
        Arc::new(|_: &KeyEvent| {})
    }

    #[test]
    fn test_right_alt_aliases() {
        let aliases = activation_aliases(key("right alt"));
        assert_eq!(aliases.as_slice(), &[key("right alt"), key("alt gr")]);

        let aliases = activation_aliases(key("alt gr"));
        assert_eq!(aliases.as_slice(), &[key("alt gr"), key("right alt")]);
    }

    #[test]
    fn test_plain_key_has_no_aliases() {
        assert_eq!(activation_aliases(key("f12")).as_slice(), &[key("f12")]);
    }

    #[test]
    fn test_install_registers_every_alias() {
        let driver = FakeDriver::new();
        let mut hooks = ActivationHooks::default();
        hooks.install(&driver, key("right alt"), noop()).unwrap();

        assert_eq!(driver.key_up_hooks(), vec![key("right alt"), key("alt gr")]);
        assert_eq!(hooks.key(), Some(key("right alt")));
        assert_eq!(hooks.len(), 2);
    }

    #[test]
    fn test_reinstall_replaces_previous_aliases() {
        let driver = FakeDriver::new();
        let mut hooks = ActivationHooks::default();
        hooks.install(&driver, key("right alt"), noop()).unwrap();
        hooks.install(&driver, key("f12"), noop()).unwrap();

        assert_eq!(driver.key_up_hooks(), vec![key("f12")]);
        hooks.uninstall(&driver);
        assert_eq!(driver.hook_count(), 0);
        assert_eq!(hooks.key(), None);
    }

    #[test]
    fn test_unavailable_alias_is_skipped() {
        let driver = FakeDriver::new();
        driver.mark_unavailable(key("alt gr"));
        let mut hooks = ActivationHooks::default();
        hooks.install(&driver, key("right alt"), noop()).unwrap();
        assert_eq!(driver.key_up_hooks(), vec![key("right alt")]);
    }
}
