//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, Verbosity};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_INSTR";

/// Config file name inside the per-user config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file name looked up in the current directory
const LOCAL_CONFIG_FILE_NAME: &str = "serial-instruments.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_INSTR_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_INSTR_CONFIG` environment variable (explicit path)
    /// 2. `./serial-instruments.toml` (current directory)
    /// 3. `~/.config/serial-instruments/config.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\serial-instruments\config.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        let applied = apply_env_overrides(&mut config).and_then(|()| config.validate());
        if let Err(e) = applied {
            warn!(error = %e, "Ignoring environment overrides, using built-in defaults");
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. XDG config directory (Linux/macOS) or APPDATA (Windows)
    get_default_config_path().filter(|path| path.exists())
}

/// Get the platform-specific config directory.
fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join("serial-instruments").join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_var(key: &str) -> (String, Option<String>) {
    let name = format!("{ENV_PREFIX}_{key}");
    let value = std::env::var(&name).ok();
    (name, value)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str, what: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(name, format!("Invalid {what}: {value}")))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_INSTR_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_INSTR_SERIAL_BAUD_RATE=115200`
/// - `SERIAL_INSTR_DEVICE_VID=045E`
/// - `SERIAL_INSTR_LOGGING_VERBOSITY=2`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let (name, Some(val)) = env_var("SERIAL_BAUD_RATE") {
        config.serial.baud_rate = parse_env(&name, &val, "baud rate")?;
    }
    if let (name, Some(val)) = env_var("SERIAL_READ_TIMEOUT_MS") {
        config.serial.read_timeout_ms = parse_env(&name, &val, "timeout")?;
    }
    if let (name, Some(val)) = env_var("SERIAL_WRITE_TIMEOUT_MS") {
        config.serial.write_timeout_ms = parse_env(&name, &val, "timeout")?;
    }

    // Device overrides
    if let (_, Some(val)) = env_var("DEVICE_PORT") {
        config.device.port_name = Some(val);
    }
    if let (_, Some(val)) = env_var("DEVICE_VID") {
        config.device.vid = Some(val);
    }
    if let (_, Some(val)) = env_var("DEVICE_PID") {
        config.device.pid = Some(val);
    }

    // USB switch overrides
    if let (_, Some(val)) = env_var("USB_SWITCH_PORT") {
        config.usb_switch.port_name = Some(val);
    }
    if let (name, Some(val)) = env_var("USB_SWITCH_RESPONSE_TIMEOUT_MS") {
        config.usb_switch.response_timeout_ms = parse_env(&name, &val, "timeout")?;
    }

    // Logging overrides
    if let (_, Some(val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let (name, Some(val)) = env_var("LOGGING_VERBOSITY") {
        config.logging.verbosity = Verbosity::from_level(parse_env(&name, &val, "verbosity")?);
    }

    Ok(())
}
