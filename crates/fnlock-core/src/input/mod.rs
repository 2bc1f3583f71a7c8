// Fnlock Input Layer
// Keyboard device detection and filtering

mod device;
mod filter;

pub use device::{is_keyboard, is_virtual_device, DeviceCapabilities, VIRTUAL_DEVICE_NAME};
pub use filter::DeviceFilter;
