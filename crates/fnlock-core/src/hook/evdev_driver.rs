// Fnlock evdev Hook Driver
// Grabs physical keyboards and re-emits unsuppressed keys through uinput
//
// Run tests with: cargo test -p fnlock-core --features evdev-driver

use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, Key as EvKey};
use parking_lot::Mutex;

use super::{HookDriver, HookError, HookHandle, HookResult, HookTable, KeyCallback};
use crate::input::{
    is_keyboard, is_virtual_device, DeviceCapabilities, DeviceFilter, VIRTUAL_DEVICE_NAME,
};
use crate::{Action, Key, KeyEvent};

/// Poll timeout of the reader thread, bounds how long shutdown waits
const POLL_TIMEOUT_MS: i32 = 100;

/// Device information for listing devices
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device index
    pub index: usize,
    /// Device name
    pub name: String,
    /// Device path (if available)
    pub path: Option<String>,
}

fn capabilities(device: &Device) -> DeviceCapabilities {
    let has_ev_key = device.supported_events().contains(EventType::KEY);
    let keys = device
        .supported_keys()
        .map(|keys| keys.iter().map(|key| key.code()).collect::<Vec<_>>())
        .unwrap_or_default();
    DeviceCapabilities::new(has_ev_key, keys)
}

/// List keyboards that autodetection would grab
pub fn list_devices() -> HookResult<Vec<DeviceInfo>> {
    let filter = DeviceFilter::autodetect();
    let devices: Vec<DeviceInfo> = evdev::enumerate()
        .filter(|(path, device)| accepts(&filter, path.to_str().unwrap_or_default(), device))
        .enumerate()
        .map(|(index, (path, device))| DeviceInfo {
            index,
            name: device.name().unwrap_or("Unknown").to_string(),
            path: path.to_str().map(|s| s.to_string()),
        })
        .collect();

    if devices.is_empty() {
        return Err(HookError::DriverUnavailable(
            "No keyboard devices found".to_string(),
        ));
    }
    Ok(devices)
}

fn accepts(filter: &DeviceFilter, path: &str, device: &Device) -> bool {
    let name = device.name().unwrap_or("Unknown");
    filter.accepts(
        name,
        path,
        is_keyboard(&capabilities(device)),
        is_virtual_device(name),
    )
}

fn find_keyboards(filter: &DeviceFilter) -> HookResult<Vec<Device>> {
    let keyboards: Vec<Device> = evdev::enumerate()
        .filter(|(path, device)| accepts(filter, path.to_str().unwrap_or_default(), device))
        .map(|(_, device)| device)
        .collect();

    if keyboards.is_empty() {
        return Err(HookError::DriverUnavailable(
            "No keyboard devices found".to_string(),
        ));
    }
    Ok(keyboards)
}

fn create_virtual_device() -> HookResult<VirtualDevice> {
    let unavailable = |e: std::io::Error| {
        HookError::DriverUnavailable(format!("Failed to create virtual device: {}", e))
    };

    let mut keys = AttributeSet::new();
    for code in 0..256u16 {
        keys.insert(EvKey::new(code));
    }

    VirtualDeviceBuilder::new()
        .map_err(unavailable)?
        .name(VIRTUAL_DEVICE_NAME)
        .with_keys(&keys)
        .map_err(unavailable)?
        .build()
        .map_err(unavailable)
}

struct Shared {
    hooks: Mutex<HookTable>,
    output: Mutex<VirtualDevice>,
    serial: AtomicU64,
    running: AtomicBool,
}

impl Shared {
    fn next_serial(&self) -> u64 {
        self.serial.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn emit(&self, code: u16, value: i32) -> std::io::Result<()> {
        let key_event = InputEvent::new(EventType::KEY, code, value);
        // SYN event is required for the kernel to process the key event
        let syn_event = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);
        self.output.lock().emit(&[key_event, syn_event])
    }

    fn forward(&self, code: u16, value: i32) {
        if let Err(e) = self.emit(code, value) {
            log::warn!("Failed to forward key code {}: {}", code, e);
        }
    }

    fn handle(&self, raw: &InputEvent) {
        if raw.event_type() != EventType::KEY {
            return;
        }
        let (Some(key), Some(action)) = (Key::from_code(raw.code()), Action::from_i32(raw.value()))
        else {
            self.forward(raw.code(), raw.value());
            return;
        };

        let event = KeyEvent::physical(key, action, self.next_serial());
        let dispatch = self.hooks.lock().dispatch(&event);
        dispatch.run(&event);

        if dispatch.suppress() {
            log::trace!("Swallowed {}", event);
        } else {
            self.forward(raw.code(), raw.value());
        }
    }
}

struct Reader {
    devices: Vec<Device>,
    poll_fds: Vec<libc::pollfd>,
}

impl Reader {
    fn new(devices: Vec<Device>) -> Self {
        let poll_fds = devices
            .iter()
            .map(|d| libc::pollfd {
                fd: d.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        Self { devices, poll_fds }
    }

    fn run(&mut self, shared: &Shared) {
        while shared.running.load(Ordering::SeqCst) {
            let poll_result = unsafe {
                libc::poll(
                    self.poll_fds.as_mut_ptr(),
                    self.poll_fds.len() as libc::nfds_t,
                    POLL_TIMEOUT_MS,
                )
            };

            if poll_result < 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                log::error!("Polling input devices failed: {}", err);
                break;
            }
            if poll_result == 0 {
                continue;
            }

            for (i, device) in self.devices.iter_mut().enumerate() {
                if self.poll_fds[i].revents & libc::POLLIN == 0 {
                    continue;
                }
                let name = device.name().unwrap_or("Unknown").to_string();
                match device.fetch_events() {
                    Ok(events) => {
                        let events: Vec<InputEvent> = events.collect();
                        for event in &events {
                            shared.handle(event);
                        }
                    }
                    Err(e) => log::debug!("Reading {} failed: {}", name, e),
                }
            }
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        // Runs on normal exit and on panic unwinding, a grabbed keyboard
        // left behind is unusable
        for device in &mut self.devices {
            let _ = device.ungrab();
        }
    }
}

/// Hook driver backed by evdev and uinput.
///
/// Matching keyboards are grabbed exclusively. A reader thread dispatches
/// each key event to the installed hooks and re-emits it on the virtual
/// device unless a hook suppressed it. The virtual device is never grabbed.
pub struct EvdevDriver {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl EvdevDriver {
    /// Grab the keyboards selected by `filter` and start reading
    pub fn open(filter: &DeviceFilter) -> HookResult<Self> {
        let mut devices = find_keyboards(filter)?;

        // A previous instance may have crashed with devices grabbed
        for device in &mut devices {
            let _ = device.ungrab();
        }
        for device in &mut devices {
            device.grab().map_err(|e| {
                HookError::DriverUnavailable(format!(
                    "Failed to grab {}: {}",
                    device.name().unwrap_or("Unknown"),
                    e
                ))
            })?;
        }
        for device in &devices {
            log::info!("Grabbed {}", device.name().unwrap_or("Unknown"));
        }

        let mut reader = Reader::new(devices);
        let output = match create_virtual_device() {
            Ok(output) => output,
            Err(e) => {
                drop(reader);
                return Err(e);
            }
        };

        let shared = Arc::new(Shared {
            hooks: Mutex::new(HookTable::new()),
            output: Mutex::new(output),
            serial: AtomicU64::new(0),
            running: AtomicBool::new(true),
        });

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("fnlock-evdev".to_string())
            .spawn(move || reader.run(&thread_shared))
            .map_err(|e| HookError::DriverUnavailable(e.to_string()))?;

        Ok(Self {
            shared,
            reader: Mutex::new(Some(handle)),
        })
    }
}

impl HookDriver for EvdevDriver {
    fn register_key_down(
        &self,
        key: Key,
        suppress: bool,
        callback: KeyCallback,
    ) -> HookResult<HookHandle> {
        if key.code() > 255 {
            return Err(HookError::KeyUnavailable {
                key,
                reason: "not supported by the virtual device".to_string(),
            });
        }
        Ok(self.shared.hooks.lock().add_key_down(key, suppress, callback))
    }

    fn register_key_up(&self, key: Key, callback: KeyCallback) -> HookResult<HookHandle> {
        Ok(self.shared.hooks.lock().add_key_up(key, callback))
    }

    fn unregister(&self, handle: HookHandle) {
        self.shared.hooks.lock().remove(handle);
    }

    fn send_key(&self, key: Key) -> HookResult<()> {
        for action in [Action::Press, Action::Release] {
            self.shared
                .emit(key.code(), action.to_i32())
                .map_err(|e| HookError::Injection(e.to_string()))?;

            let event = KeyEvent::synthetic(key, action, self.shared.next_serial());
            let dispatch = self.shared.hooks.lock().dispatch(&event);
            dispatch.run(&event);
        }
        Ok(())
    }

    fn install_global_monitor(&self, callback: KeyCallback) -> HookResult<HookHandle> {
        Ok(self.shared.hooks.lock().add_monitor(callback))
    }

    fn shutdown(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.hooks.lock().clear();

        let Some(handle) = self.reader.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("evdev reader thread panicked");
        }
    }
}

impl Drop for EvdevDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        match list_devices() {
            Ok(devices) => {
                for device in &devices {
                    assert!(!is_virtual_device(&device.name));
                }
            }
            Err(HookError::DriverUnavailable(_)) => {
                println!("Skipping test: no keyboard devices found");
            }
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }

    #[test]
    fn test_open_without_matching_keyboard_is_unavailable() {
        let filter = DeviceFilter::only(["fnlock test keyboard that does not exist"]);
        match EvdevDriver::open(&filter) {
            Err(HookError::DriverUnavailable(_)) => {}
            Err(e) => panic!("Unexpected error: {}", e),
            Ok(_) => panic!("Opened a keyboard that does not exist"),
        }
    }
}
