// Fnlock Core Library
// Remap engine, hook drivers and configuration for the FN Lock key remapper

pub mod config;
pub mod engine;
pub mod event;
pub mod hook;
pub mod input;
pub mod key;
pub mod notify;
pub mod snapshot;

pub use config::{ConfigError, ConfigStore, Profile, DEFAULT_PROFILE};
pub use engine::{
    activation_aliases, EngineError, EngineOptions, EngineState, KeyClass, LockStateStore,
    RemapEngine,
};
pub use event::{Action, KeyEvent};
pub use hook::{
    FakeDriver, HookDriver, HookError, HookHandle, HookResult, KeyCallback, UnavailableDriver,
};
pub use input::{DeviceFilter, VIRTUAL_DEVICE_NAME};
pub use key::{Key, KeyError};
pub use notify::{ChannelNotifier, EngineEvent, LogNotifier, Notifier, NullNotifier};
pub use snapshot::{MappingSnapshot, SnapshotError};

#[cfg(feature = "evdev-driver")]
pub use hook::{list_devices, DeviceInfo, EvdevDriver};
