// Fnlock In-Memory Hook Driver
// Scriptable driver used to exercise the engine without input devices

use std::collections::HashSet;

use parking_lot::Mutex;

use super::{HookDriver, HookError, HookHandle, HookResult, HookTable, KeyCallback};
use crate::{Action, Key, KeyEvent};

#[derive(Default)]
struct FakeState {
    hooks: HookTable,
    unavailable: HashSet<Key>,
    injected: Vec<Key>,
    /// Key-downs that reached the rest of the system
    delivered: Vec<Key>,
    serial: u64,
}

/// In-memory [`HookDriver`].
///
/// Input is scripted with [`FakeDriver::press`] and friends. Callbacks run on
/// the calling thread after the driver state is released, which mirrors a
/// platform delivering events on its own callback thread. Injected keys are
/// echoed to global monitors as synthetic events.
#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    /// Create a driver with no hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future registrations for `key` fail with `KeyUnavailable`
    pub fn mark_unavailable(&self, key: Key) {
        self.state.lock().unavailable.insert(key);
    }

    /// Simulate the user pressing `key`. Returns false if it was swallowed.
    pub fn press(&self, key: Key) -> bool {
        self.feed(key, Action::Press)
    }

    /// Simulate auto-repeat of a held key
    pub fn repeat(&self, key: Key) -> bool {
        self.feed(key, Action::Repeat)
    }

    /// Simulate the user releasing `key`
    pub fn release(&self, key: Key) -> bool {
        self.feed(key, Action::Release)
    }

    /// Press and release `key`
    pub fn tap(&self, key: Key) -> bool {
        let delivered = self.press(key);
        self.release(key);
        delivered
    }

    fn feed(&self, key: Key, action: Action) -> bool {
        let (event, dispatch) = {
            let mut state = self.state.lock();
            state.serial += 1;
            let event = KeyEvent::physical(key, action, state.serial);
            let dispatch = state.hooks.dispatch(&event);
            if !dispatch.suppress() && action.is_down() {
                state.delivered.push(key);
            }
            (event, dispatch)
        };
        dispatch.run(&event);
        !dispatch.suppress()
    }

    /// Keys injected through `send_key`, in order
    pub fn injected(&self) -> Vec<Key> {
        self.state.lock().injected.clone()
    }

    /// Key-downs seen by the rest of the system, literal and injected
    pub fn delivered(&self) -> Vec<Key> {
        self.state.lock().delivered.clone()
    }

    /// Forget recorded output
    pub fn clear_output(&self) {
        let mut state = self.state.lock();
        state.injected.clear();
        state.delivered.clear();
    }

    /// Installed key-down hooks as `(key, suppress)` pairs
    pub fn key_down_hooks(&self) -> Vec<(Key, bool)> {
        self.state.lock().hooks.key_down_hooks()
    }

    /// Keys with an installed key-up hook
    pub fn key_up_hooks(&self) -> Vec<Key> {
        self.state.lock().hooks.key_up_hooks()
    }

    /// Number of installed global monitors
    pub fn monitor_count(&self) -> usize {
        self.state.lock().hooks.monitor_count()
    }

    /// Total number of installed hooks
    pub fn hook_count(&self) -> usize {
        self.state.lock().hooks.len()
    }

    fn check_available(&self, state: &FakeState, key: Key) -> HookResult<()> {
        if state.unavailable.contains(&key) {
            return Err(HookError::KeyUnavailable {
                key,
                reason: "claimed by another process".to_string(),
            });
        }
        Ok(())
    }
}

impl HookDriver for FakeDriver {
    fn register_key_down(
        &self,
        key: Key,
        suppress: bool,
        callback: KeyCallback,
    ) -> HookResult<HookHandle> {
        let mut state = self.state.lock();
        self.check_available(&state, key)?;
        Ok(state.hooks.add_key_down(key, suppress, callback))
    }

    fn register_key_up(&self, key: Key, callback: KeyCallback) -> HookResult<HookHandle> {
        let mut state = self.state.lock();
        self.check_available(&state, key)?;
        Ok(state.hooks.add_key_up(key, callback))
    }

    fn unregister(&self, handle: HookHandle) {
        self.state.lock().hooks.remove(handle);
    }

    fn send_key(&self, key: Key) -> HookResult<()> {
        let mut echoes = Vec::with_capacity(2);
        {
            let mut state = self.state.lock();
            state.injected.push(key);
            state.delivered.push(key);
            for action in [Action::Press, Action::Release] {
                state.serial += 1;
                let event = KeyEvent::synthetic(key, action, state.serial);
                echoes.push((event, state.hooks.dispatch(&event)));
            }
        }
        for (event, dispatch) in &echoes {
            dispatch.run(event);
        }
        Ok(())
    }

    fn install_global_monitor(&self, callback: KeyCallback) -> HookResult<HookHandle> {
        Ok(self.state.lock().hooks.add_monitor(callback))
    }
}
