/// Configuration loading, reloading and access helpers
use super::schemas::Config;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::RwLock;

/// Global configuration instance
///
/// Holds settings only. Cache state is never global; it is constructed by the
/// caller and injected into the services that use it.
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "marketfeed.toml";

/// Read and validate a configuration file
///
/// A missing file yields the built-in defaults.
pub fn read_config_file(path: &str) -> Result<Config, ConfigError> {
    let config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;

        toml::from_str::<Config>(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from the default path into the global CONFIG
pub fn load_config() -> Result<(), ConfigError> {
    load_config_from_path(CONFIG_FILE_PATH)
}

pub fn load_config_from_path(path: &str) -> Result<(), ConfigError> {
    let config = read_config_file(path)?;

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| ConfigError::AlreadyInitialized)?;

    logger::debug(LogTag::Config, &format!("Configuration loaded from '{}'", path));
    Ok(())
}

/// Atomically replace the global configuration with the file contents
///
/// Services built before the reload keep the settings they were built with.
pub fn reload_config_from_path(path: &str) -> Result<(), ConfigError> {
    let new_config = read_config_file(path)?;

    let lock = CONFIG.get().ok_or(ConfigError::NotInitialized)?;
    match lock.write() {
        Ok(mut config) => *config = new_config,
        Err(poisoned) => *poisoned.into_inner() = new_config,
    }
    Ok(())
}

/// Execute a function with read access to the configuration
///
/// Falls back to defaults when the configuration was never loaded.
///
/// ```
/// use marketfeed::config::with_config;
///
/// let stale_secs = with_config(|cfg| cfg.cache.stale_ttl_secs);
/// assert!(stale_secs > 0);
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    match CONFIG.get() {
        Some(lock) => match lock.read() {
            Ok(config) => f(&config),
            Err(poisoned) => f(&poisoned.into_inner()),
        },
        None => f(&Config::default()),
    }
}

pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}
