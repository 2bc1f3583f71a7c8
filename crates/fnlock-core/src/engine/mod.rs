// Fnlock Remap Engine
// Lock state machine driving hook installation, smart-typing pauses and notifications

mod activation;
mod classify;
mod idle;

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, ReentrantMutex};
use smallvec::SmallVec;

use crate::hook::{HookDriver, HookError, HookHandle, HookResult, KeyCallback};
use crate::notify::{Notifier, NullNotifier};
use crate::{Key, KeyEvent, MappingSnapshot};

use activation::ActivationHooks;

pub use activation::activation_aliases;
pub use classify::{classify, KeyClass};
pub use idle::{IdleClock, IdleMonitor};

/// Quiet period after which a smart-typing pause ends
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(1);

/// How often the idle monitor checks the clock
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lock state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EngineState {
    Inactive,
    /// Remap hooks installed
    Active,
    /// Lock on, remap hooks removed while the user types
    ActivePaused,
}

impl EngineState {
    /// Whether the lock is on, paused or not
    pub fn is_locked(self) -> bool {
        !matches!(self, EngineState::Inactive)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine has been stopped")]
    Stopped,

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Error type returned by [`LockStateStore`] implementations
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Persistence of the lock flag across runs
pub trait LockStateStore: Send + Sync {
    fn load_active(&self) -> bool;
    fn store_active(&self, active: bool) -> Result<(), StoreError>;
}

/// Engine construction options
#[derive(Clone)]
pub struct EngineOptions {
    pub notifier: Arc<dyn Notifier>,
    /// When set, the initial lock state is loaded from here and every
    /// toggle is written back
    pub store: Option<Arc<dyn LockStateStore>>,
    pub idle_threshold: Duration,
    pub poll_interval: Duration,
    /// Initial lock state when no store is configured
    pub start_active: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            notifier: Arc::new(NullNotifier),
            store: None,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            start_active: false,
        }
    }
}

impl EngineOptions {
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn LockStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_idle_threshold(mut self, threshold: Duration) -> Self {
        self.idle_threshold = threshold;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_start_active(mut self, active: bool) -> Self {
        self.start_active = active;
        self
    }
}

/// Outbound work produced by a transition, performed after the state lock
/// is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Toggled(bool),
    Paused(bool),
    Inject(Key),
    PersistActive(bool),
}

type Effects = SmallVec<[Effect; 4]>;

struct EngineInner {
    state: EngineState,
    snapshot: Arc<MappingSnapshot>,
    remap_hooks: Vec<HookHandle>,
    /// Bumped whenever the remap hooks are torn down
    generation: u64,
    activation: ActivationHooks,
    monitor: Option<HookHandle>,
    idle: IdleClock,
    last_activation_serial: Option<u64>,
    degraded: Option<String>,
    stopped: bool,
}

impl EngineInner {
    fn new(snapshot: MappingSnapshot, idle_threshold: Duration) -> Self {
        Self {
            state: EngineState::Inactive,
            snapshot: Arc::new(snapshot),
            remap_hooks: Vec::new(),
            generation: 0,
            activation: ActivationHooks::default(),
            monitor: None,
            idle: IdleClock::new(idle_threshold),
            last_activation_serial: None,
            degraded: None,
            stopped: false,
        }
    }
}

struct Shared {
    me: Weak<Shared>,
    inner: Mutex<EngineInner>,
    /// Held from the start of a transition until its effects are emitted.
    /// Re-entrant so a driver may call back into the engine synchronously
    /// while injecting.
    outbound: ReentrantMutex<()>,
    driver: Arc<dyn HookDriver>,
    notifier: Arc<dyn Notifier>,
    store: Option<Arc<dyn LockStateStore>>,
}

impl Shared {
    fn transition<R>(&self, f: impl FnOnce(&mut EngineInner, &mut Effects) -> R) -> R {
        let _outbound = self.outbound.lock();
        let mut effects = Effects::new();
        let result = {
            let mut inner = self.inner.lock();
            f(&mut *inner, &mut effects)
        };
        self.emit(effects);
        result
    }

    fn emit(&self, effects: Effects) {
        for effect in effects {
            match effect {
                Effect::Toggled(active) => self.notifier.on_toggle(active),
                Effect::Paused(paused) => self.notifier.on_pause(paused),
                Effect::Inject(key) => {
                    if let Err(e) = self.driver.send_key(key) {
                        log::warn!("{}", e);
                    }
                }
                Effect::PersistActive(active) => {
                    if let Some(store) = &self.store {
                        if let Err(e) = store.store_active(active) {
                            log::warn!("Failed to persist lock state: {}", e);
                        }
                    }
                }
            }
        }
    }

    fn remap_callback(&self, source: Key, destination: Key, generation: u64) -> KeyCallback {
        let me = self.me.clone();
        Arc::new(move |event: &KeyEvent| {
            if let Some(shared) = me.upgrade() {
                shared.on_remap(source, destination, generation, event);
            }
        })
    }

    fn activation_callback(&self) -> KeyCallback {
        let me = self.me.clone();
        Arc::new(move |event: &KeyEvent| {
            if let Some(shared) = me.upgrade() {
                shared.on_activation(event);
            }
        })
    }

    fn monitor_callback(&self) -> KeyCallback {
        let me = self.me.clone();
        Arc::new(move |event: &KeyEvent| {
            if let Some(shared) = me.upgrade() {
                shared.on_key(event);
            }
        })
    }

    fn on_remap(&self, source: Key, destination: Key, generation: u64, event: &KeyEvent) {
        self.transition(|inner, effects| {
            if inner.stopped {
                return;
            }
            if inner.state == EngineState::Active && inner.generation == generation {
                log::trace!("{} -> {}", event, destination);
                effects.push(Effect::Inject(destination));
            } else {
                // The hook was torn down while this event was in flight
                log::debug!("Stale remap of {}, passing it through", event);
                effects.push(Effect::Inject(source));
            }
        });
    }

    fn on_activation(&self, event: &KeyEvent) {
        self.transition(|inner, effects| {
            if inner.stopped || inner.last_activation_serial == Some(event.serial) {
                return;
            }
            inner.last_activation_serial = Some(event.serial);
            log::debug!("Activation key released ({})", event);
            self.toggle_locked(inner, effects);
        });
    }

    fn on_key(&self, event: &KeyEvent) {
        // Injected keys are the engine's own output, not typing
        if event.synthetic || !event.is_down() {
            return;
        }

        self.transition(|inner, effects| {
            if inner.stopped {
                return;
            }
            match classify(&inner.snapshot, event.key) {
                KeyClass::Activation | KeyClass::Modifier => {}
                KeyClass::Mapped => {
                    if inner.state == EngineState::ActivePaused {
                        inner.idle.touch();
                    }
                }
                KeyClass::Typing => {
                    inner.idle.touch();
                    if inner.state == EngineState::Active && inner.snapshot.smart_typing() {
                        self.uninstall_remap(inner);
                        inner.state = EngineState::ActivePaused;
                        log::debug!("Typing '{}', remapping paused", event.key);
                        effects.push(Effect::Paused(true));
                    }
                }
            }
        });
    }

    /// Returns false once the engine is stopped
    fn tick(&self, now: Instant) -> bool {
        self.transition(|inner, effects| {
            if inner.stopped {
                return false;
            }
            if inner.state == EngineState::ActivePaused && inner.idle.is_idle(now) {
                self.resume(inner, effects);
            }
            true
        })
    }

    fn install_remap(&self, inner: &mut EngineInner) -> HookResult<()> {
        self.uninstall_remap(inner);
        let generation = inner.generation;
        let snapshot = inner.snapshot.clone();

        for (source, destination) in snapshot.table() {
            let callback = self.remap_callback(source, destination, generation);
            match self.driver.register_key_down(source, true, callback) {
                Ok(handle) => inner.remap_hooks.push(handle),
                Err(e @ HookError::KeyUnavailable { .. }) => {
                    log::warn!("Skipping {} -> {}: {}", source, destination, e);
                }
                Err(e) => {
                    self.uninstall_remap(inner);
                    return Err(e);
                }
            }
        }

        log::debug!(
            "Installed {} of {} remap hooks",
            inner.remap_hooks.len(),
            snapshot.len()
        );
        Ok(())
    }

    fn uninstall_remap(&self, inner: &mut EngineInner) {
        inner.generation += 1;
        for handle in inner.remap_hooks.drain(..) {
            self.driver.unregister(handle);
        }
    }

    fn install_activation(&self, inner: &mut EngineInner) -> HookResult<()> {
        let key = inner.snapshot.activation_key();
        inner
            .activation
            .install(&*self.driver, key, self.activation_callback())
    }

    fn activate(&self, inner: &mut EngineInner, effects: &mut Effects) -> bool {
        if let Some(reason) = &inner.degraded {
            log::warn!("Cannot enable remapping: {}", reason);
            return false;
        }
        match self.install_remap(inner) {
            Ok(()) => {
                inner.state = EngineState::Active;
                effects.push(Effect::Toggled(true));
                true
            }
            Err(e) => {
                self.degrade(inner, effects, &e);
                false
            }
        }
    }

    fn resume(&self, inner: &mut EngineInner, effects: &mut Effects) {
        match self.install_remap(inner) {
            Ok(()) => {
                inner.state = EngineState::Active;
                log::debug!("Idle, remapping resumed");
                effects.push(Effect::Paused(false));
            }
            Err(e) => self.degrade(inner, effects, &e),
        }
    }

    fn toggle_locked(&self, inner: &mut EngineInner, effects: &mut Effects) {
        match inner.state {
            EngineState::Inactive => {
                if self.activate(inner, effects) {
                    effects.push(Effect::PersistActive(true));
                }
            }
            EngineState::Active => {
                self.uninstall_remap(inner);
                inner.state = EngineState::Inactive;
                effects.push(Effect::Toggled(false));
                effects.push(Effect::PersistActive(false));
            }
            EngineState::ActivePaused => {
                inner.state = EngineState::Inactive;
                effects.push(Effect::Toggled(false));
                effects.push(Effect::Paused(false));
                effects.push(Effect::PersistActive(false));
            }
        }
        log::debug!("Lock toggled, now {}", inner.state);
    }

    /// Drop every hook and fall back to `Inactive` after the driver failed
    fn degrade(&self, inner: &mut EngineInner, effects: &mut Effects, error: &HookError) {
        self.uninstall_remap(inner);
        inner.activation.uninstall(&*self.driver);
        if let Some(handle) = inner.monitor.take() {
            self.driver.unregister(handle);
        }

        match inner.state {
            EngineState::Inactive => {}
            EngineState::Active => effects.push(Effect::Toggled(false)),
            EngineState::ActivePaused => {
                effects.push(Effect::Toggled(false));
                effects.push(Effect::Paused(false));
            }
        }
        inner.state = EngineState::Inactive;

        if inner.degraded.is_none() {
            log::error!("Remapping disabled: {}", error);
            inner.degraded = Some(error.to_string());
        }
    }

    fn boot(&self, start_active: bool) {
        self.transition(|inner, effects| {
            match self.driver.install_global_monitor(self.monitor_callback()) {
                Ok(handle) => inner.monitor = Some(handle),
                Err(e) => {
                    self.degrade(inner, effects, &e);
                    return;
                }
            }
            if let Err(e) = self.install_activation(inner) {
                self.degrade(inner, effects, &e);
                return;
            }
            if start_active {
                self.activate(inner, effects);
            }
        });
    }

    fn reload(&self, snapshot: MappingSnapshot) -> Result<(), EngineError> {
        self.transition(|inner, effects| {
            if inner.stopped {
                return Err(EngineError::Stopped);
            }
            let snapshot = Arc::new(snapshot);
            if inner.degraded.is_some() {
                inner.snapshot = snapshot;
                return Ok(());
            }

            let activation_changed = inner.snapshot.activation_key() != snapshot.activation_key();
            let was_active = inner.state == EngineState::Active;
            if was_active {
                self.uninstall_remap(inner);
            }
            inner.snapshot = snapshot;

            if activation_changed {
                if let Err(e) = self.install_activation(inner) {
                    self.degrade(inner, effects, &e);
                    return Err(e.into());
                }
            }

            if was_active {
                if let Err(e) = self.install_remap(inner) {
                    self.degrade(inner, effects, &e);
                    return Err(e.into());
                }
            } else if inner.state == EngineState::ActivePaused && !inner.snapshot.smart_typing() {
                self.resume(inner, effects);
            }

            log::debug!(
                "Reloaded mapping: {} entries, activation '{}', smart typing {}",
                inner.snapshot.len(),
                inner.snapshot.activation_key(),
                inner.snapshot.smart_typing()
            );
            Ok(())
        })
    }

    /// Returns true for the call that actually stopped the engine
    fn shutdown(&self) -> bool {
        self.transition(|inner, _| {
            if inner.stopped {
                return false;
            }
            self.uninstall_remap(inner);
            inner.activation.uninstall(&*self.driver);
            if let Some(handle) = inner.monitor.take() {
                self.driver.unregister(handle);
            }
            inner.state = EngineState::Inactive;
            inner.stopped = true;
            true
        })
    }
}

/// The remap engine.
///
/// Owns the lock state, installs remap hooks while the lock is on, pauses
/// them while the user types (smart typing) and resumes after the idle
/// threshold. Hook callbacks and the idle monitor hold only weak references,
/// so they are inert once the engine is stopped or dropped.
pub struct RemapEngine {
    shared: Arc<Shared>,
    idle: Mutex<Option<IdleMonitor>>,
}

impl RemapEngine {
    /// Install the global monitor and activation hooks, then start the idle
    /// monitor.
    ///
    /// A driver that is unavailable leaves the engine degraded in
    /// `Inactive` rather than failing.
    pub fn start(
        driver: Arc<dyn HookDriver>,
        snapshot: MappingSnapshot,
        options: EngineOptions,
    ) -> Self {
        let start_active = match &options.store {
            Some(store) => store.load_active(),
            None => options.start_active,
        };

        let idle_threshold = options.idle_threshold;
        let shared = Arc::new_cyclic(|me| Shared {
            me: me.clone(),
            inner: Mutex::new(EngineInner::new(snapshot, idle_threshold)),
            outbound: ReentrantMutex::new(()),
            driver,
            notifier: options.notifier,
            store: options.store,
        });
        shared.boot(start_active);

        let weak = Arc::downgrade(&shared);
        let idle = IdleMonitor::spawn(options.poll_interval, move || {
            weak.upgrade()
                .is_some_and(|shared| shared.tick(Instant::now()))
        });
        let idle = match idle {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                log::error!("Failed to start idle monitor: {}", e);
                None
            }
        };

        log::info!("Remap engine started ({})", shared.inner.lock().state);
        Self {
            shared,
            idle: Mutex::new(idle),
        }
    }

    /// Flip the lock and return the resulting state
    pub fn toggle(&self) -> EngineState {
        self.shared.transition(|inner, effects| {
            if !inner.stopped {
                self.shared.toggle_locked(inner, effects);
            }
            inner.state
        })
    }

    /// Turn the lock on or off. Does nothing when already in that state.
    pub fn set_active(&self, active: bool) -> EngineState {
        self.shared.transition(|inner, effects| {
            if !inner.stopped && inner.state.is_locked() != active {
                self.shared.toggle_locked(inner, effects);
            }
            inner.state
        })
    }

    /// Replace the mapping.
    ///
    /// Events in flight see either the old or the new mapping, never a mix.
    /// The activation hooks are only replaced when the activation key
    /// changed.
    pub fn reload(&self, snapshot: MappingSnapshot) -> Result<(), EngineError> {
        self.shared.reload(snapshot)
    }

    /// End a smart-typing pause if the user has been idle at `now`.
    ///
    /// The idle monitor calls this periodically.
    pub fn resume_if_idle(&self, now: Instant) -> EngineState {
        self.shared.tick(now);
        self.state()
    }

    pub fn state(&self) -> EngineState {
        self.shared.inner.lock().state
    }

    /// Mapping currently in effect
    pub fn snapshot(&self) -> Arc<MappingSnapshot> {
        self.shared.inner.lock().snapshot.clone()
    }

    /// Whether the hook driver failed and remapping is unavailable
    pub fn is_degraded(&self) -> bool {
        self.shared.inner.lock().degraded.is_some()
    }

    /// Classify a key against the current mapping
    pub fn classify(&self, key: Key) -> KeyClass {
        classify(&self.shared.inner.lock().snapshot, key)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.inner.lock().stopped
    }

    /// Remove every hook and join the idle monitor.
    ///
    /// No notification is sent and no callback runs after this returns.
    /// Repeated calls do nothing.
    pub fn stop(&self) {
        if self.shared.shutdown() {
            log::info!("Remap engine stopped");
        }
        if let Some(mut monitor) = self.idle.lock().take() {
            monitor.stop();
        }
    }
}

impl Drop for RemapEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::FakeDriver;

    fn key(name: &str) -> Key {
        Key::parse(name).unwrap()
    }

    fn start(driver: &Arc<FakeDriver>, smart_typing: bool) -> RemapEngine {
        let snapshot = MappingSnapshot::parse("right alt", [("w", "up")], smart_typing).unwrap();
        RemapEngine::start(driver.clone(), snapshot, EngineOptions::default())
    }

    #[test]
    fn test_state_display() {
        assert_eq!(EngineState::ActivePaused.to_string(), "active_paused");
        assert_eq!(EngineState::Inactive.to_string(), "inactive");
    }

    #[test]
    fn test_start_installs_monitor_and_activation_hooks() {
        let driver = Arc::new(FakeDriver::new());
        let engine = start(&driver, false);

        assert_eq!(engine.state(), EngineState::Inactive);
        assert_eq!(driver.monitor_count(), 1);
        assert_eq!(driver.key_up_hooks(), vec![key("right alt"), key("alt gr")]);
        assert!(driver.key_down_hooks().is_empty());
        assert!(!engine.is_degraded());
    }

    #[test]
    fn test_set_active_is_noop_in_requested_state() {
        let driver = Arc::new(FakeDriver::new());
        let engine = start(&driver, false);

        assert_eq!(engine.set_active(false), EngineState::Inactive);
        assert_eq!(engine.set_active(true), EngineState::Active);
        assert_eq!(engine.set_active(true), EngineState::Active);
        assert_eq!(driver.key_down_hooks(), vec![(key("w"), true)]);
    }

    #[test]
    fn test_classify_follows_reload() {
        let driver = Arc::new(FakeDriver::new());
        let engine = start(&driver, false);
        assert_eq!(engine.classify(key("w")), KeyClass::Mapped);

        let snapshot = MappingSnapshot::parse("f12", [("a", "left")], false).unwrap();
        engine.reload(snapshot).unwrap();
        assert_eq!(engine.classify(key("w")), KeyClass::Typing);
        assert_eq!(engine.classify(key("f12")), KeyClass::Activation);
        assert_eq!(engine.classify(key("right alt")), KeyClass::Modifier);
    }

    #[test]
    fn test_stop_removes_every_hook() {
        let driver = Arc::new(FakeDriver::new());
        let engine = start(&driver, false);
        engine.toggle();

        engine.stop();
        assert_eq!(driver.hook_count(), 0);
        assert!(engine.is_stopped());
        assert_eq!(engine.state(), EngineState::Inactive);
        assert_eq!(engine.toggle(), EngineState::Inactive);
        assert!(matches!(
            engine.reload(engine.snapshot().as_ref().clone()),
            Err(EngineError::Stopped)
        ));
    }

    #[test]
    fn test_stale_remap_passes_source_through() {
        let driver = Arc::new(FakeDriver::new());
        let engine = start(&driver, false);
        engine.toggle();
        let generation = engine.shared.inner.lock().generation;

        engine.reload(engine.snapshot().as_ref().clone()).unwrap();
        let event = KeyEvent::physical(key("w"), crate::Action::Press, 1);
        engine
            .shared
            .on_remap(key("w"), key("up"), generation, &event);

        assert_eq!(driver.injected(), vec![key("w")]);
    }

    #[test]
    fn test_drop_stops_engine() {
        let driver = Arc::new(FakeDriver::new());
        {
            let engine = start(&driver, false);
            engine.toggle();
        }
        assert_eq!(driver.hook_count(), 0);
    }
}
