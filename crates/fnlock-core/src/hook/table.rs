// Fnlock Hook Table
// Registration storage and per-event dispatch planning shared by drivers

use std::collections::HashSet;

use smallvec::SmallVec;

use super::{HookHandle, KeyCallback};
use crate::{Action, Key, KeyEvent};

struct Entry {
    handle: HookHandle,
    key: Key,
    suppress: bool,
    callback: KeyCallback,
}

/// Callbacks to run for one event, and whether the event is swallowed.
///
/// A dispatch is planned while the driver holds its table and run after the
/// table is released.
pub struct Dispatch {
    callbacks: SmallVec<[KeyCallback; 4]>,
    suppress: bool,
}

impl Dispatch {
    /// Whether the original event must not reach other consumers
    pub fn suppress(&self) -> bool {
        self.suppress
    }

    /// Number of callbacks that will observe the event
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Check if no callback observes the event
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Invoke every planned callback in order
    pub fn run(&self, event: &KeyEvent) {
        for callback in &self.callbacks {
            callback(event);
        }
    }
}

/// Installed hooks of one driver.
///
/// Per-key hooks match by physical key, so a hook on `"right alt"` also
/// observes events reported as `"alt gr"`.
#[derive(Default)]
pub struct HookTable {
    next_id: u64,
    key_down: Vec<Entry>,
    key_up: Vec<Entry>,
    monitors: Vec<(HookHandle, KeyCallback)>,
    /// Codes whose key-down was swallowed and whose release is still pending
    swallowed: HashSet<u16>,
}

impl HookTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&mut self) -> HookHandle {
        self.next_id += 1;
        HookHandle(self.next_id)
    }

    /// Add a key-down hook
    pub fn add_key_down(&mut self, key: Key, suppress: bool, callback: KeyCallback) -> HookHandle {
        let handle = self.next_handle();
        self.key_down.push(Entry {
            handle,
            key,
            suppress,
            callback,
        });
        handle
    }

    /// Add a key-up hook
    pub fn add_key_up(&mut self, key: Key, callback: KeyCallback) -> HookHandle {
        let handle = self.next_handle();
        self.key_up.push(Entry {
            handle,
            key,
            suppress: false,
            callback,
        });
        handle
    }

    /// Add a global monitor
    pub fn add_monitor(&mut self, callback: KeyCallback) -> HookHandle {
        let handle = self.next_handle();
        self.monitors.push((handle, callback));
        handle
    }

    /// Remove a hook, returning whether it was installed
    pub fn remove(&mut self, handle: HookHandle) -> bool {
        let before = self.len();
        self.key_down.retain(|e| e.handle != handle);
        self.key_up.retain(|e| e.handle != handle);
        self.monitors.retain(|(h, _)| *h != handle);
        self.len() != before
    }

    /// Drop every hook
    pub fn clear(&mut self) {
        self.key_down.clear();
        self.key_up.clear();
        self.monitors.clear();
        self.swallowed.clear();
    }

    /// Installed key-down hooks as `(key, suppress)` pairs
    pub fn key_down_hooks(&self) -> Vec<(Key, bool)> {
        self.key_down.iter().map(|e| (e.key, e.suppress)).collect()
    }

    /// Keys with an installed key-up hook
    pub fn key_up_hooks(&self) -> Vec<Key> {
        self.key_up.iter().map(|e| e.key).collect()
    }

    /// Number of global monitors
    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    /// Total number of installed hooks
    pub fn len(&self) -> usize {
        self.key_down.len() + self.key_up.len() + self.monitors.len()
    }

    /// Check if no hook is installed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plan delivery of one event.
    ///
    /// Monitors always come first. Synthetic events reach monitors only.
    /// Swallowing a press also swallows the matching release.
    pub fn dispatch(&mut self, event: &KeyEvent) -> Dispatch {
        let mut callbacks: SmallVec<[KeyCallback; 4]> =
            self.monitors.iter().map(|(_, cb)| cb.clone()).collect();

        if event.synthetic {
            return Dispatch {
                callbacks,
                suppress: false,
            };
        }

        let code = event.key.code();
        let suppress = match event.action {
            Action::Press | Action::Repeat => {
                let mut suppress = false;
                for entry in self
                    .key_down
                    .iter()
                    .filter(|e| e.key.same_physical_key(event.key))
                {
                    suppress |= entry.suppress;
                    callbacks.push(entry.callback.clone());
                }
                if suppress && event.action == Action::Press {
                    self.swallowed.insert(code);
                }
                suppress
            }
            Action::Release => {
                callbacks.extend(
                    self.key_up
                        .iter()
                        .filter(|e| e.key.same_physical_key(event.key))
                        .map(|e| e.callback.clone()),
                );
                self.swallowed.remove(&code)
            }
        };

        Dispatch {
            callbacks,
            suppress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn key(name: &str) -> Key {
        Key::parse(name).unwrap()
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> KeyCallback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |tag: &'static str| -> KeyCallback {
            let log = log_clone.clone();
            Arc::new(move |event: &KeyEvent| log.lock().push(format!("{tag}:{}", event.key)))
        };
        (log, make)
    }

    #[test]
    fn test_monitor_runs_before_key_hooks() {
        let (log, make) = recorder();
        let mut table = HookTable::new();
        table.add_key_down(key("w"), true, make("down"));
        table.add_monitor(make("monitor"));

        let event = KeyEvent::physical(key("w"), Action::Press, 1);
        let dispatch = table.dispatch(&event);
        dispatch.run(&event);

        assert!(dispatch.suppress());
        assert_eq!(*log.lock(), vec!["monitor:w", "down:w"]);
    }

    #[test]
    fn test_swallowed_press_swallows_release() {
        let (_, make) = recorder();
        let mut table = HookTable::new();
        let handle = table.add_key_down(key("w"), true, make("down"));

        let press = table.dispatch(&KeyEvent::physical(key("w"), Action::Press, 1));
        assert!(press.suppress());

        // Removing the hook while the key is held still swallows its release
        table.remove(handle);
        let release = table.dispatch(&KeyEvent::physical(key("w"), Action::Release, 2));
        assert!(release.suppress());

        let next = table.dispatch(&KeyEvent::physical(key("w"), Action::Release, 3));
        assert!(!next.suppress());
    }

    #[test]
    fn test_synthetic_events_skip_key_hooks() {
        let (log, make) = recorder();
        let mut table = HookTable::new();
        table.add_key_down(key("up"), true, make("down"));
        table.add_monitor(make("monitor"));

        let event = KeyEvent::synthetic(key("up"), Action::Press, 1);
        let dispatch = table.dispatch(&event);
        dispatch.run(&event);

        assert!(!dispatch.suppress());
        assert_eq!(*log.lock(), vec!["monitor:up"]);
    }

    #[test]
    fn test_aliases_match_by_physical_key() {
        let (log, make) = recorder();
        let mut table = HookTable::new();
        table.add_key_up(key("right alt"), make("right"));
        table.add_key_up(key("alt gr"), make("gr"));

        let event = KeyEvent::physical(key("alt gr"), Action::Release, 4);
        let dispatch = table.dispatch(&event);
        assert_eq!(dispatch.len(), 2);
        dispatch.run(&event);
        assert_eq!(*log.lock(), vec!["right:alt gr", "gr:alt gr"]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_, make) = recorder();
        let mut table = HookTable::new();
        let handle = table.add_monitor(make("monitor"));
        assert!(table.remove(handle));
        assert!(!table.remove(handle));
        assert!(table.is_empty());
    }
}
