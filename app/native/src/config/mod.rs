//! Configuration module for Casement.
//!
//! This module provides configuration types and the process-wide loaded
//! configuration. The file is read once; the service itself receives the
//! configuration explicitly when it is built.

pub mod types;

use std::path::PathBuf;
use std::sync::OnceLock;

pub use types::{
    CasementConfig, ConfigError, GestureConfig, LoggingConfig, ModeConfig, RectConfig,
    ScreenConfig, SystemBarsConfig, config_paths, load_config as load_config_default,
    load_config_from_path,
};

/// Global configuration instance, loaded once at startup.
static CONFIG: OnceLock<CasementConfig> = OnceLock::new();

/// Path to the currently loaded configuration file.
static CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Custom config path override (set via CLI --config flag).
static CUSTOM_CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Sets a custom configuration file path to use instead of the default search paths.
///
/// This must be called before `init()` or `get_config()` to take effect.
///
/// Returns `true` if the path was set, `false` if a path was already set.
pub fn set_custom_config_path(path: PathBuf) -> bool { CUSTOM_CONFIG_PATH.set(path).is_ok() }

/// Loads the configuration from disk, falling back to defaults on failure.
fn load_or_default() -> CasementConfig {
    let result = CUSTOM_CONFIG_PATH
        .get()
        .map_or_else(load_config_default, |path| load_config_from_path(path));

    match result {
        Ok((config, path)) => {
            tracing::debug!(path = %path.display(), "loaded configuration");
            let _ = CONFIG_PATH.set(path);
            config
        }
        Err(ConfigError::NotFound) => {
            tracing::debug!("no configuration file found, using defaults");
            CasementConfig::default()
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to load configuration, using defaults");
            CasementConfig::default()
        }
    }
}

/// Initializes and returns the global configuration instance.
///
/// This function is idempotent - calling it multiple times will return
/// the same configuration instance.
pub fn init() -> &'static CasementConfig { CONFIG.get_or_init(load_or_default) }

/// Returns the global configuration instance, initializing it if necessary.
pub fn get_config() -> &'static CasementConfig { CONFIG.get_or_init(load_or_default) }

/// Returns the path to the loaded configuration file, if any.
pub fn get_config_path() -> Option<&'static PathBuf> { CONFIG_PATH.get() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_not_found_message() {
        let err = ConfigError::NotFound;
        assert!(err.to_string().contains("No configuration file found"));
    }

    #[test]
    fn test_default_capabilities_cover_system_windows() {
        let config = CasementConfig::default();
        assert!(config.capabilities.iter().any(|c| c == "system_window"));
        assert!(config.capabilities.iter().any(|c| c == "capture_screen"));
    }
}
