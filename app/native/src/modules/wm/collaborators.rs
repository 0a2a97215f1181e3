//! Narrow interfaces to the services the manager depends on.
//!
//! Content loading, capability checks and window capture belong to other
//! components of the compositor. The manager only sees these traits; the
//! in-process implementations below back the CLI and the tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

use super::state::{Window, WindowId};
use crate::error::{WmError, WmResult};

/// Capability names consulted before privileged operations.
pub mod capability {
    /// Create windows of any type other than `App`.
    pub const SYSTEM_WINDOW: &str = "system_window";

    /// Bind virtual screens to surfaces and capture window contents.
    pub const CAPTURE_SCREEN: &str = "capture_screen";
}

/// Loads UI content into a window before it is first shown.
pub trait ContentLoader: Send + Sync {
    /// Load `path` into the window, optionally restoring a saved state blob.
    ///
    /// # Errors
    ///
    /// Returns an error when the content cannot be loaded; the window is left unchanged.
    fn load_content(&self, window: &Window, path: &str, state: Option<&str>) -> WmResult<()>;
}

/// Answers whether the calling context holds a capability.
pub trait CapabilityChecker: Send + Sync {
    fn has_capability(&self, name: &str) -> bool;
}

/// Captures the rendered contents of a window.
pub trait SnapshotProducer: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the window cannot be captured.
    fn capture_window(&self, window: &Window) -> WmResult<PixelBuffer>;
}

/// Handle to captured pixels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PixelBuffer {
    pub window_id: WindowId,
    pub width: u32,
    pub height: u32,

    /// Tightly packed RGBA rows.
    #[serde(skip)]
    pub pixels: Vec<u8>,
}

// ============================================================================
// In-process implementations
// ============================================================================

/// A fixed capability set, optionally editable at runtime.
#[derive(Debug, Default)]
pub struct StaticCapabilities {
    granted: RwLock<HashSet<String>>,
}

impl StaticCapabilities {
    /// Grant the given capabilities.
    #[must_use]
    pub fn new<I, S>(granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>, {
        Self {
            granted: RwLock::new(granted.into_iter().map(Into::into).collect()),
        }
    }

    /// Grant every known capability.
    #[must_use]
    pub fn all() -> Self { Self::new([capability::SYSTEM_WINDOW, capability::CAPTURE_SCREEN]) }

    /// Grant nothing.
    #[must_use]
    pub fn none() -> Self { Self::default() }

    pub fn grant(&self, name: &str) { self.granted.write().insert(name.to_string()); }

    pub fn revoke(&self, name: &str) { self.granted.write().remove(name); }
}

impl CapabilityChecker for StaticCapabilities {
    fn has_capability(&self, name: &str) -> bool { self.granted.read().contains(name) }
}

/// Accepts every path; can be switched to fail for testing error paths.
#[derive(Debug, Default)]
pub struct NoopContentLoader {
    failing: AtomicBool,
}

impl NoopContentLoader {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Make every later load fail.
    pub fn set_failing(&self, failing: bool) { self.failing.store(failing, Ordering::SeqCst); }
}

impl ContentLoader for NoopContentLoader {
    fn load_content(&self, window: &Window, path: &str, _state: Option<&str>) -> WmResult<()> {
        if path.is_empty() {
            return Err(WmError::InvalidParam("content path is empty".to_string()));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(WmError::SystemAbnormally(format!(
                "failed to load '{path}' into window {}",
                window.id
            )));
        }
        tracing::trace!(window_id = window.id, path, "content loaded");
        Ok(())
    }
}

/// Produces a buffer filled with the window's background colour.
#[derive(Debug, Default)]
pub struct SolidColorSnapshot;

impl SnapshotProducer for SolidColorSnapshot {
    fn capture_window(&self, window: &Window) -> WmResult<PixelBuffer> {
        if !window.is_shown() || !window.frame.is_valid() {
            return Err(WmError::DeviceNotSupport(format!(
                "window {} has no visible surface",
                window.id
            )));
        }
        if window.properties.privacy_mode {
            return Err(WmError::DeviceNotSupport(format!(
                "window {} is in privacy mode",
                window.id
            )));
        }

        let rgba = parse_rgba(&window.properties.background_color);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (width, height) = (window.frame.width as u32, window.frame.height as u32);
        let len = (width as usize) * (height as usize);
        let pixels = rgba.iter().copied().cycle().take(len * 4).collect();
        Ok(PixelBuffer { window_id: window.id, width, height, pixels })
    }
}

/// Converts `#RRGGBB` or `#AARRGGBB` into RGBA bytes; malformed input is opaque white.
fn parse_rgba(color: &str) -> [u8; 4] {
    let hex = color.trim_start_matches('#');
    let byte = |idx: usize| u8::from_str_radix(hex.get(idx..idx + 2).unwrap_or("ff"), 16).unwrap_or(0xff);
    match hex.len() {
        6 => [byte(0), byte(2), byte(4), 0xff],
        8 => [byte(2), byte(4), byte(6), byte(0)],
        _ => [0xff; 4],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::wm::state::{Rect, WindowLifecycle, WindowType};

    fn shown_window() -> Window {
        let mut window = Window::new(3, "main", WindowType::App, 0);
        window.lifecycle = WindowLifecycle::Shown;
        window.frame = Rect::new(0.0, 0.0, 4.0, 2.0);
        window.properties.background_color = "#80102030".to_string();
        window
    }

    #[test]
    fn test_static_capabilities_grant_and_revoke() {
        let caps = StaticCapabilities::none();
        assert!(!caps.has_capability(capability::SYSTEM_WINDOW));
        caps.grant(capability::SYSTEM_WINDOW);
        assert!(caps.has_capability(capability::SYSTEM_WINDOW));
        caps.revoke(capability::SYSTEM_WINDOW);
        assert!(!caps.has_capability(capability::SYSTEM_WINDOW));
    }

    #[test]
    fn test_noop_loader_can_fail() {
        let loader = NoopContentLoader::new();
        let window = shown_window();
        assert!(loader.load_content(&window, "pages/index", None).is_ok());
        loader.set_failing(true);
        assert!(matches!(
            loader.load_content(&window, "pages/index", None),
            Err(WmError::SystemAbnormally(_))
        ));
    }

    #[test]
    fn test_snapshot_fills_background_color() {
        let buffer = SolidColorSnapshot.capture_window(&shown_window()).unwrap();
        assert_eq!((buffer.width, buffer.height), (4, 2));
        assert_eq!(buffer.pixels.len(), 32);
        assert_eq!(&buffer.pixels[..4], &[0x10, 0x20, 0x30, 0x80]);
    }

    #[test]
    fn test_snapshot_of_hidden_window_is_not_supported() {
        let mut window = shown_window();
        window.lifecycle = WindowLifecycle::Hidden;
        assert!(matches!(
            SolidColorSnapshot.capture_window(&window),
            Err(WmError::DeviceNotSupport(_))
        ));
    }
}
