//! Configuration types for Casement.
//!
//! The configuration describes the physical screens the service enumerates at
//! startup together with the system UI (status bar, navigation bar, gesture
//! strips) it places on the default display.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.

use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rectangle in screen pixels, used for cutout bounding boxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RectConfig {
    /// Left edge in pixels.
    pub x: f64,
    /// Top edge in pixels.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

/// An additional display mode supported by a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModeConfig {
    /// Horizontal resolution in pixels.
    pub width: u32,
    /// Vertical resolution in pixels.
    pub height: u32,
    /// Refresh rate in Hz.
    pub refresh_rate: u32,
}

/// A physical screen connected at startup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ScreenConfig {
    /// Human readable screen name.
    pub name: String,

    /// Native horizontal resolution in pixels.
    pub width: u32,

    /// Native vertical resolution in pixels.
    pub height: u32,

    /// Native refresh rate in Hz.
    pub refresh_rate: u32,

    /// Virtual pixel ratio (logical density). Must be within `0.5..=4.0`.
    pub density: f64,

    /// Extra modes the panel supports besides its native one.
    pub modes: Vec<ModeConfig>,

    /// Cutout bounding rectangles in the panel's natural orientation.
    pub cutouts: Vec<RectConfig>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            name: "Built-in Panel".to_string(),
            width: 1080,
            height: 2340,
            refresh_rate: 60,
            density: 3.0,
            modes: vec![ModeConfig {
                width: 720,
                height: 1560,
                refresh_rate: 60,
            }],
            cutouts: vec![RectConfig {
                x: 490.0,
                y: 0.0,
                width: 100.0,
                height: 80.0,
            }],
        }
    }
}

/// System bar placement on the default display.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemBarsConfig {
    /// Whether the status and navigation bar windows are created at startup.
    pub enabled: bool,

    /// Height of the status bar in pixels.
    pub status_bar_height: f64,

    /// Height of the navigation bar in pixels.
    pub navigation_bar_height: f64,

    /// Status bar background colour (`#RRGGBB` or `#AARRGGBB`).
    pub status_bar_color: String,

    /// Navigation bar background colour (`#RRGGBB` or `#AARRGGBB`).
    pub navigation_bar_color: String,
}

impl Default for SystemBarsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            status_bar_height: 96.0,
            navigation_bar_height: 120.0,
            status_bar_color: "#66000000".to_string(),
            navigation_bar_color: "#66000000".to_string(),
        }
    }
}

/// Edge gesture strips on the default display.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct GestureConfig {
    /// Whether the gesture windows are created at startup.
    pub enabled: bool,

    /// Width of the left and right back-gesture strips in pixels.
    pub edge_width: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            edge_width: 48.0,
        }
    }
}

/// Logging defaults. `RUST_LOG` overrides the level when set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `casement_lib=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self { Self { level: "info".to_string() } }
}

/// Root configuration for Casement.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CasementConfig {
    /// JSON schema reference, ignored by the service.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Physical screens enumerated at startup. The first one is the default.
    pub screens: Vec<ScreenConfig>,

    /// System bar windows.
    pub system_bars: SystemBarsConfig,

    /// System gesture windows.
    pub gesture: GestureConfig,

    /// Whether rotation starts locked.
    pub rotation_locked: bool,

    /// Capabilities granted to client callers (`system_window`, `capture_screen`).
    pub capabilities: Vec<String>,

    /// Logging defaults.
    pub logging: LoggingConfig,
}

impl Default for CasementConfig {
    fn default() -> Self {
        Self {
            schema: None,
            screens: vec![ScreenConfig::default()],
            system_bars: SystemBarsConfig::default(),
            gesture: GestureConfig::default(),
            rotation_locked: false,
            capabilities: vec!["system_window".to_string(), "capture_screen".to_string()],
            logging: LoggingConfig::default(),
        }
    }
}

impl CasementConfig {
    /// Checks the values that serde cannot express as types.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screens.is_empty() {
            return Err(ConfigError::Invalid("at least one screen is required".to_string()));
        }

        for screen in &self.screens {
            if screen.width == 0 || screen.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "screen '{}' has a zero dimension",
                    screen.name
                )));
            }
            if !(0.5..=4.0).contains(&screen.density) {
                return Err(ConfigError::Invalid(format!(
                    "screen '{}' density {} is outside 0.5..=4.0",
                    screen.name, screen.density
                )));
            }
        }

        Ok(())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file was found in any of the expected locations.
    #[error(
        "No configuration file found. Expected at ~/.config/casement/config.json or ~/.casement.json"
    )]
    NotFound,
    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    /// The configuration file contains invalid JSON.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] serde_json::Error),
    /// The configuration parsed but holds an unusable value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration file names to search for (in priority order).
const CONFIG_FILE_NAMES: &[&str] = &["config.jsonc", "config.json"];

/// Home directory configuration file names.
const HOME_CONFIG_FILE_NAMES: &[&str] = &[".casement.jsonc", ".casement.json"];

/// Returns the possible configuration file paths in priority order.
///
/// The function checks the following locations (both `.jsonc` and `.json` variants):
/// 1. `$XDG_CONFIG_HOME/casement/` when the variable is set
/// 2. `~/.config/casement/`
/// 3. the platform configuration directory
/// 4. `~/.casement.jsonc` or `~/.casement.json`
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    fn push_dir(dir: PathBuf, paths: &mut Vec<PathBuf>) {
        for filename in CONFIG_FILE_NAMES {
            let path = dir.join(filename);
            // XDG_CONFIG_HOME might be ~/.config
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    let mut paths = Vec::new();

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        push_dir(PathBuf::from(xdg_config).join("casement"), &mut paths);
    }

    if let Some(home) = dirs::home_dir() {
        push_dir(home.join(".config").join("casement"), &mut paths);
    }

    if let Some(config_dir) = dirs::config_dir() {
        push_dir(config_dir.join("casement"), &mut paths);
    }

    if let Some(home) = dirs::home_dir() {
        for filename in HOME_CONFIG_FILE_NAMES {
            paths.push(home.join(filename));
        }
    }

    paths
}

/// Loads the configuration from a specific file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist,
/// `ConfigError::IoError` if it could not be read, `ConfigError::ParseError`
/// if it is not valid JSONC and `ConfigError::Invalid` if validation fails.
pub fn load_config_from_path(path: &Path) -> Result<(CasementConfig, PathBuf), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound);
    }

    let file = fs::File::open(path)?;
    let reader = json_comments::StripComments::new(file);
    let config: CasementConfig = serde_json::from_reader(reader)?;
    config.validate()?;

    Ok((config, path.to_path_buf()))
}

/// Loads the configuration from the first existing default location.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if no configuration file exists in any of
/// the expected locations, or any error from [`load_config_from_path`].
pub fn load_config() -> Result<(CasementConfig, PathBuf), ConfigError> {
    for path in config_paths() {
        if path.exists() {
            return load_config_from_path(&path);
        }
    }

    Err(ConfigError::NotFound)
}
