//! Error types for Casement.
//!
//! This module provides the error taxonomy shared by every window and display
//! operation. All variants carry a human-readable message and serialize with a
//! `kind` tag so the CLI can print structured failures.

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while operating on windows, screens and displays.
///
/// Validation happens before any state is touched, so an operation that fails
/// with one of these errors leaves the stores unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum WmError {
    /// A parameter was malformed, out of range or inconsistent with the topology.
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),
    /// The window does not exist or was destroyed.
    #[error("Invalid window: {0}")]
    InvalidWindow(String),
    /// The screen or display does not exist.
    #[error("Invalid screen: {0}")]
    InvalidScreen(String),
    /// The caller lacks the capability required by the operation.
    #[error("No permission: {0}")]
    NoPermission(String),
    /// The requested state already holds.
    #[error("Repeated operation: {0}")]
    RepeatOperation(String),
    /// The target is in a state that does not allow the operation.
    #[error("State abnormally: {0}")]
    StateAbnormally(String),
    /// The service or one of its collaborators failed.
    #[error("System abnormally: {0}")]
    SystemAbnormally(String),
    /// The device cannot perform the operation.
    #[error("Device not supported: {0}")]
    DeviceNotSupport(String),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
    /// IO error.
    #[error("IO error: {0}")]
    Io(String),
}

impl WmError {
    /// Returns the stable kind name used in serialized output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParam(_) => "InvalidParam",
            Self::InvalidWindow(_) => "InvalidWindow",
            Self::InvalidScreen(_) => "InvalidScreen",
            Self::NoPermission(_) => "NoPermission",
            Self::RepeatOperation(_) => "RepeatOperation",
            Self::StateAbnormally(_) => "StateAbnormally",
            Self::SystemAbnormally(_) => "SystemAbnormally",
            Self::DeviceNotSupport(_) => "DeviceNotSupport",
            Self::Config(_) => "Config",
            Self::Io(_) => "Io",
        }
    }
}

impl From<std::io::Error> for WmError {
    fn from(err: std::io::Error) -> Self { Self::Io(err.to_string()) }
}

impl From<serde_json::Error> for WmError {
    fn from(err: serde_json::Error) -> Self { Self::Config(err.to_string()) }
}

impl From<crate::config::ConfigError> for WmError {
    fn from(err: crate::config::ConfigError) -> Self { Self::Config(err.to_string()) }
}

/// Convenience alias used throughout the service.
pub type WmResult<T> = Result<T, WmError>;
