// Fnlock Configuration
// Settings file, profiles and snapshot construction

mod profile;
mod store;

pub use profile::{Profile, DEFAULT_PROFILE};
pub use store::{ConfigError, ConfigStore};
