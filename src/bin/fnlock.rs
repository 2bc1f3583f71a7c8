// Fnlock CLI
// Grabs keyboards, runs the remap engine and reacts to control signals

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use fnlock_core::{
    list_devices, ConfigStore, DeviceFilter, EngineOptions, EvdevDriver, HookDriver,
    LogNotifier, RemapEngine, UnavailableDriver,
};

/// FN Lock key remapper
#[derive(Parser, Debug)]
#[command(name = "fnlock")]
#[command(version)]
#[command(about = "Toggle-able key remapping with smart typing pause", long_about = None)]
struct Args {
    /// TOML configuration file (default: ~/.config/fnlock/config.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Switch to this profile before starting
    #[arg(short, long, value_name = "NAME")]
    profile: Option<String>,

    /// Only grab these devices (name or path, can be used multiple times)
    #[arg(short, long, value_name = "DEVICE")]
    devices: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// List available keyboard devices
    #[arg(long)]
    list_devices: bool,

    /// List profiles and exit
    #[arg(long)]
    list_profiles: bool,
}

/// Main application state
struct Application {
    args: Args,
    config: Arc<ConfigStore>,
}

impl Application {
    fn new(args: Args) -> anyhow::Result<Self> {
        let config = match &args.config {
            Some(path) => ConfigStore::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ConfigStore::load_default().context("Failed to load configuration")?,
        };

        if let Some(profile) = &args.profile {
            config.set_current_profile(profile)?;
        }

        Ok(Self {
            args,
            config: Arc::new(config),
        })
    }

    /// Validate configuration
    fn validate(&self) -> anyhow::Result<()> {
        let snapshot = self.config.snapshot()?;
        println!(
            "Configuration is valid: profile '{}', activation key '{}', {} mapping(s)",
            self.config.current_profile_name(),
            snapshot.activation_key(),
            snapshot.len()
        );
        Ok(())
    }

    /// List available keyboard devices
    fn list_devices() -> anyhow::Result<()> {
        let devices = list_devices().context("Error finding keyboard devices")?;
        println!("Found {} keyboard device(s):", devices.len());
        for device in &devices {
            match &device.path {
                Some(path) => println!("  {}: {} ({})", device.index, device.name, path),
                None => println!("  {}: {}", device.index, device.name),
            }
        }
        Ok(())
    }

    fn list_profiles(&self) {
        let current = self.config.current_profile_name();
        for name in self.config.profile_names() {
            let marker = if name == current { "*" } else { " " };
            println!("{} {}", marker, name);
        }
    }

    fn device_filter(&self) -> DeviceFilter {
        if self.args.devices.is_empty() {
            DeviceFilter::autodetect()
        } else {
            DeviceFilter::only(self.args.devices.iter().cloned())
        }
    }

    /// Open the evdev driver, or a driver that keeps the engine degraded
    fn open_driver(&self) -> Arc<dyn HookDriver> {
        match EvdevDriver::open(&self.device_filter()) {
            Ok(driver) => Arc::new(driver),
            Err(e) => Arc::new(UnavailableDriver::new(e.to_string())),
        }
    }

    /// Run until SIGINT or SIGTERM
    fn run(&self) -> anyhow::Result<()> {
        use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGUSR1};
        use signal_hook::iterator::Signals;

        if let Some(path) = self.config.path() {
            log::info!("Config: {}", path.display());
        }
        log::info!("Profile: {}", self.config.current_profile_name());

        let snapshot = self.config.snapshot()?;
        let driver = self.open_driver();
        let engine = RemapEngine::start(
            driver.clone(),
            snapshot,
            EngineOptions::default()
                .with_notifier(Arc::new(LogNotifier))
                .with_store(self.config.clone()),
        );

        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1])?;
        for signal in signals.forever() {
            match signal {
                SIGHUP => self.reload(&engine),
                SIGUSR1 => {
                    engine.toggle();
                }
                _ => {
                    log::info!("Received signal, shutting down gracefully...");
                    break;
                }
            }
        }

        engine.stop();
        driver.shutdown();
        Ok(())
    }

    /// Re-read the config file and hand the current profile to the engine
    fn reload(&self, engine: &RemapEngine) {
        let result = self
            .config
            .reload()
            .and_then(|()| self.config.snapshot())
            .map_err(anyhow::Error::from)
            .and_then(|snapshot| engine.reload(snapshot).map_err(Into::into));

        match result {
            Ok(()) => log::info!(
                "Reloaded configuration (profile '{}')",
                self.config.current_profile_name()
            ),
            Err(e) => log::error!("Reload failed, keeping previous mapping: {:#}", e),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Handle list-devices flag (doesn't require config)
    if args.list_devices {
        return Application::list_devices();
    }

    let app = Application::new(args)?;

    if app.args.list_profiles {
        app.list_profiles();
        return Ok(());
    }

    if app.args.check_config {
        return app.validate();
    }

    app.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["fnlock", "--config", "/tmp/test.toml"]);

        assert_eq!(args.config, Some(PathBuf::from("/tmp/test.toml")));
        assert!(args.profile.is_none());
        assert!(args.devices.is_empty());
        assert!(!args.verbose);
        assert!(!args.check_config);
        assert!(!args.list_devices);
        assert!(!args.list_profiles);
    }

    #[test]
    fn test_args_with_options() {
        let args = Args::parse_from([
            "fnlock",
            "--profile",
            "Gaming",
            "--verbose",
            "--devices",
            "/dev/input/event0",
            "--devices",
            "AT Translated Set 2 keyboard",
        ]);

        assert_eq!(args.profile.as_deref(), Some("Gaming"));
        assert!(args.verbose);
        assert_eq!(
            args.devices,
            vec!["/dev/input/event0", "AT Translated Set 2 keyboard"]
        );
    }

    #[test]
    fn test_args_list_flags() {
        let args = Args::parse_from(["fnlock", "--list-devices"]);
        assert!(args.list_devices);

        let args = Args::parse_from(["fnlock", "--list-profiles"]);
        assert!(args.list_profiles);
    }

    #[test]
    fn test_check_config_does_not_create_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fnlock").join("config.toml");
        let args = Args::parse_from([
            "fnlock",
            "--config",
            path.to_str().unwrap(),
            "--check-config",
        ]);

        let app = Application::new(args).unwrap();
        assert!(app.validate().is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn test_profile_flag_switches_profile() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        ConfigStore::load(&path)
            .unwrap()
            .create_profile("Gaming")
            .unwrap();

        let args = Args::parse_from([
            "fnlock",
            "--config",
            path.to_str().unwrap(),
            "--profile",
            "Gaming",
        ]);
        let app = Application::new(args).unwrap();
        assert_eq!(app.config.current_profile_name(), "Gaming");
        assert!(app.validate().is_ok());
    }

    #[test]
    fn test_unknown_profile_is_rejected() {
        let args = Args::parse_from([
            "fnlock",
            "--config",
            "/nonexistent/fnlock/config.toml",
            "--profile",
            "Nope",
        ]);
        assert!(Application::new(args).is_err());
    }
}
