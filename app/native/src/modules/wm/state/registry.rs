//! The window registry: identity, hierarchy, z-order and dialog death-links.
//!
//! Live windows sit in an observable vector. Destroyed ids are tombstoned so
//! every later lookup fails with `InvalidWindow` instead of finding a stale entry.

use std::collections::{HashMap, HashSet};

use eyeball_im::ObservableVector;
use serde::{Deserialize, Serialize};

use super::types::{
    ColorSpace, DisplayId, Orientation, Rect, StageId, Window, WindowId, WindowLifecycle, WindowMode,
    WindowProperties, WindowType,
};
use crate::error::{WmError, WmResult};

/// Identity of a remote peer whose death a dialog follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteToken(pub u64);

/// Invoked once when the bound remote peer dies.
pub type DeathCallback = Box<dyn FnOnce() + Send + Sync>;

struct DeathLink {
    token: RemoteToken,
    callback: DeathCallback,
}

/// Parameters for creating a window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSpec {
    pub name: String,
    pub window_type: WindowType,
    pub display_id: DisplayId,
    pub parent_id: Option<WindowId>,
    pub stage_id: Option<StageId>,
}

impl WindowSpec {
    /// A top-level window on a display.
    #[must_use]
    pub fn new(name: &str, window_type: WindowType, display_id: DisplayId) -> Self {
        Self {
            name: name.to_string(),
            window_type,
            display_id,
            parent_id: None,
            stage_id: None,
        }
    }
}

/// A single validated property mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "property", content = "value", rename_all = "kebab-case")]
pub enum PropertyChange {
    FullScreen(bool),
    LayoutFullScreen(bool),
    Focusable(bool),
    Touchable(bool),
    Brightness(f64),
    DimBehind(f64),
    KeepScreenOn(bool),
    PrivacyMode(bool),
    RoundCorner(bool),
    Transparent(bool),
    BackgroundColor(String),
    ColorSpace(ColorSpace),
}

impl PropertyChange {
    /// Check the value range before anything is mutated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for out-of-range numbers and malformed colours.
    pub fn validate(&self) -> WmResult<()> {
        match self {
            // -1.0 restores the system brightness.
            Self::Brightness(value)
                if !value.is_finite()
                    || ((*value + 1.0).abs() > f64::EPSILON && !(0.0..=1.0).contains(value)) =>
            {
                Err(WmError::InvalidParam(format!("brightness {value} is outside 0.0..=1.0")))
            }
            Self::DimBehind(value) if !value.is_finite() || !(0.0..=1.0).contains(value) => {
                Err(WmError::InvalidParam(format!("dim {value} is outside 0.0..=1.0")))
            }
            Self::BackgroundColor(color) if !is_hex_color(color) => {
                Err(WmError::InvalidParam(format!("'{color}' is not #RRGGBB or #AARRGGBB")))
            }
            _ => Ok(()),
        }
    }

    /// Whether the change can move the window's effective frame or avoid areas.
    #[must_use]
    pub const fn affects_layout(&self) -> bool {
        matches!(self, Self::FullScreen(_) | Self::LayoutFullScreen(_))
    }

    /// Whether the change can move the display's top window.
    #[must_use]
    pub const fn affects_focus(&self) -> bool { matches!(self, Self::Focusable(_)) }

    /// Apply the change; returns whether anything differed.
    fn apply(self, props: &mut WindowProperties) -> bool {
        fn set<T: PartialEq>(slot: &mut T, value: T) -> bool {
            if *slot == value {
                return false;
            }
            *slot = value;
            true
        }

        match self {
            Self::FullScreen(v) => set(&mut props.full_screen, v),
            Self::LayoutFullScreen(v) => set(&mut props.layout_full_screen, v),
            Self::Focusable(v) => set(&mut props.focusable, v),
            Self::Touchable(v) => set(&mut props.touchable, v),
            Self::Brightness(v) => set(&mut props.brightness, v),
            Self::DimBehind(v) => set(&mut props.dim_behind, v),
            Self::KeepScreenOn(v) => set(&mut props.keep_screen_on, v),
            Self::PrivacyMode(v) => set(&mut props.privacy_mode, v),
            Self::RoundCorner(v) => set(&mut props.round_corner, v),
            Self::Transparent(v) => set(&mut props.transparent, v),
            Self::BackgroundColor(v) => set(&mut props.background_color, v.to_ascii_uppercase()),
            Self::ColorSpace(v) => set(&mut props.color_space, v),
        }
    }
}

/// Accepts `#RRGGBB` and `#AARRGGBB`.
#[must_use]
pub fn is_hex_color(value: &str) -> bool {
    value.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
    })
}

/// Top-window transition on one display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FocusChange {
    pub lost: Option<WindowId>,
    pub gained: Option<WindowId>,
}

impl FocusChange {
    #[must_use]
    pub const fn is_empty(&self) -> bool { self.lost.is_none() && self.gained.is_none() }
}

/// The root container for window state.
pub struct WindowRegistry {
    /// All live windows.
    pub windows: ObservableVector<Window>,

    tombstones: HashSet<WindowId>,
    death_links: HashMap<WindowId, DeathLink>,
    next_window_id: WindowId,
    next_z_seq: u64,

    /// App windows hidden by the last app-wide toggle, with the mode to restore.
    toggled_app_windows: Vec<(WindowId, WindowMode)>,
}

impl Default for WindowRegistry {
    fn default() -> Self { Self::new() }
}

impl WindowRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: ObservableVector::new(),
            tombstones: HashSet::new(),
            death_links: HashMap::new(),
            next_window_id: 1,
            next_z_seq: 1,
            toggled_app_windows: Vec::new(),
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Get a live window by ID.
    #[must_use]
    pub fn get_window(&self, id: WindowId) -> Option<Window> {
        self.windows.iter().find(|w| w.id == id).cloned()
    }

    /// Get a live window by ID or fail with `InvalidWindow`.
    ///
    /// # Errors
    ///
    /// Returns [`WmError::InvalidWindow`] for unknown or destroyed windows.
    pub fn require(&self, id: WindowId) -> WmResult<Window> {
        self.get_window(id).ok_or_else(|| {
            if self.tombstones.contains(&id) {
                WmError::InvalidWindow(format!("window {id} was destroyed"))
            } else {
                WmError::InvalidWindow(format!("window {id}"))
            }
        })
    }

    /// Find a live window by its identity name.
    ///
    /// # Errors
    ///
    /// Returns [`WmError::InvalidWindow`] when no live window has that name.
    pub fn find(&self, name: &str) -> WmResult<Window> {
        self.windows
            .iter()
            .find(|w| w.name == name)
            .cloned()
            .ok_or_else(|| WmError::InvalidWindow(format!("no window named '{name}'")))
    }

    /// All live windows.
    #[must_use]
    pub fn all_windows(&self) -> Vec<Window> { self.windows.iter().cloned().collect() }

    /// Windows of a display from bottom to top.
    #[must_use]
    pub fn windows_on_display(&self, display_id: DisplayId) -> Vec<Window> {
        let mut windows: Vec<Window> =
            self.windows.iter().filter(|w| w.display_id == display_id).cloned().collect();
        windows.sort_by_key(|w| (w.window_type.layer(), w.z_seq, w.id));
        windows
    }

    /// Shown windows of a given type on a display.
    #[must_use]
    pub fn shown_of_type(&self, display_id: DisplayId, window_type: WindowType) -> Vec<Window> {
        self.windows
            .iter()
            .filter(|w| w.display_id == display_id && w.window_type == window_type && w.is_shown())
            .cloned()
            .collect()
    }

    /// The topmost shown focusable window of a display.
    #[must_use]
    pub fn top_window(&self, display_id: DisplayId) -> Option<Window> {
        self.windows_on_display(display_id)
            .into_iter()
            .rev()
            .find(|w| w.is_shown() && w.properties.focusable)
    }

    /// Live windows belonging to a stage.
    #[must_use]
    pub fn windows_of_stage(&self, stage_id: StageId) -> Vec<Window> {
        self.windows.iter().filter(|w| w.stage_id == Some(stage_id)).cloned().collect()
    }

    /// Number of live windows.
    #[must_use]
    pub fn len(&self) -> usize { self.windows.len() }

    /// True when no window is live.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    fn window_index(&self, id: WindowId) -> Option<usize> {
        self.windows.iter().position(|w| w.id == id)
    }

    /// Update a window in place.
    pub fn update_window<F>(&mut self, id: WindowId, f: F) -> bool
    where F: FnOnce(&mut Window) {
        if let Some(idx) = self.window_index(id) {
            let mut window = self.windows.remove(idx);
            f(&mut window);
            self.windows.insert(idx, window);
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Register a new window.
    ///
    /// # Errors
    ///
    /// - `InvalidParam` for an empty name or a name held by a live window
    /// - `InvalidWindow` when the parent does not exist
    pub fn create(&mut self, spec: WindowSpec) -> WmResult<Window> {
        if spec.name.trim().is_empty() {
            return Err(WmError::InvalidParam("window name is empty".to_string()));
        }
        if self.windows.iter().any(|w| w.name == spec.name) {
            return Err(WmError::InvalidParam(format!(
                "window name '{}' is already registered",
                spec.name
            )));
        }
        if let Some(parent) = spec.parent_id {
            self.require(parent)?;
        }

        let id = self.next_window_id;
        self.next_window_id += 1;

        let mut window = Window::new(id, &spec.name, spec.window_type, spec.display_id);
        window.parent_id = spec.parent_id;
        window.stage_id = spec.stage_id;

        tracing::debug!(window_id = id, name = %spec.name, window_type = spec.window_type.as_str(), "window created");
        self.windows.push_back(window.clone());
        Ok(window)
    }

    /// Show a window, raising it to the top of its layer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub fn show(&mut self, id: WindowId) -> WmResult<Window> {
        self.require(id)?;
        let z_seq = self.next_z_seq;
        self.next_z_seq += 1;
        self.update_window(id, |w| {
            w.lifecycle = WindowLifecycle::Shown;
            w.z_seq = z_seq;
        });
        self.require(id)
    }

    /// Hide a window; returns whether it was shown.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub fn hide(&mut self, id: WindowId) -> WmResult<bool> {
        let window = self.require(id)?;
        if !window.is_shown() {
            return Ok(false);
        }
        self.update_window(id, |w| w.lifecycle = WindowLifecycle::Hidden);
        Ok(true)
    }

    /// Remove a window, tombstone its id and cancel its death-link.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` when the window is unknown or already destroyed.
    pub fn destroy(&mut self, id: WindowId) -> WmResult<Window> {
        let idx = self.window_index(id).ok_or_else(|| {
            WmError::InvalidWindow(if self.tombstones.contains(&id) {
                format!("window {id} was already destroyed")
            } else {
                format!("window {id}")
            })
        })?;

        let mut window = self.windows.remove(idx);
        window.lifecycle = WindowLifecycle::Destroyed;
        window.is_focused = false;
        self.tombstones.insert(id);
        if self.death_links.remove(&id).is_some() {
            tracing::debug!(window_id = id, "dialog death-link cancelled");
        }

        tracing::debug!(window_id = id, name = %window.name, "window destroyed");
        Ok(window)
    }

    /// Live sub-windows of a window.
    #[must_use]
    pub fn children_of(&self, id: WindowId) -> Vec<WindowId> {
        self.windows.iter().filter(|w| w.parent_id == Some(id)).map(|w| w.id).collect()
    }

    // ========================================================================
    // Geometry and properties
    // ========================================================================

    /// Store the client-requested frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for an empty rect.
    pub fn set_requested_frame(&mut self, id: WindowId, frame: Rect) -> WmResult<()> {
        self.require(id)?;
        if !frame.is_valid() {
            return Err(WmError::InvalidParam(format!(
                "frame {}x{} at {},{} is empty or not finite",
                frame.width, frame.height, frame.x, frame.y
            )));
        }
        self.update_window(id, |w| w.requested_frame = Some(frame));
        Ok(())
    }

    /// Apply a property change; returns whether the value changed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for bad values.
    pub fn set_property(&mut self, id: WindowId, change: PropertyChange) -> WmResult<bool> {
        self.require(id)?;
        change.validate()?;
        let mut changed = false;
        self.update_window(id, |w| changed = change.apply(&mut w.properties));
        Ok(changed)
    }

    /// Change an app window's mode; returns whether it changed.
    ///
    /// Each split half holds one window per display; its previous holder goes
    /// back to full screen.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for anything
    /// but a main app window.
    pub fn set_mode(&mut self, id: WindowId, mode: WindowMode) -> WmResult<bool> {
        let window = self.require(id)?;
        if !window.is_main_app_window() {
            return Err(WmError::InvalidParam(format!(
                "window {id} is not a main app window and has no mode"
            )));
        }
        if window.mode == mode {
            return Ok(false);
        }
        if mode.is_split() {
            let holders: Vec<WindowId> = self
                .windows
                .iter()
                .filter(|w| w.display_id == window.display_id && w.id != id && w.mode == mode)
                .map(|w| w.id)
                .collect();
            for holder in holders {
                tracing::debug!(window_id = holder, "split half taken over, back to full screen");
                self.update_window(holder, |w| w.mode = WindowMode::FullScreen);
            }
        }
        self.update_window(id, |w| w.mode = mode);
        Ok(true)
    }

    /// Remember the app windows a toggle hid, replacing any earlier set.
    pub fn set_toggled_app_windows(&mut self, windows: Vec<(WindowId, WindowMode)>) {
        self.toggled_app_windows = windows;
    }

    /// Take the app windows hidden by the last toggle that are still alive.
    pub fn take_toggled_app_windows(&mut self) -> Vec<(WindowId, WindowMode)> {
        let mut toggled = std::mem::take(&mut self.toggled_app_windows);
        toggled.retain(|(id, _)| self.window_index(*id).is_some());
        toggled
    }

    /// Record loaded content.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub fn set_content(&mut self, id: WindowId, path: &str) -> WmResult<()> {
        self.require(id)?;
        self.update_window(id, |w| w.content = Some(path.to_string()));
        Ok(())
    }

    /// Move every window of `from` onto `to`; returns the moved ids.
    pub fn move_display(&mut self, from: DisplayId, to: DisplayId) -> Vec<WindowId> {
        let ids: Vec<WindowId> =
            self.windows.iter().filter(|w| w.display_id == from).map(|w| w.id).collect();
        for id in &ids {
            self.update_window(*id, |w| {
                w.display_id = to;
                w.is_focused = false;
            });
        }
        ids
    }

    /// Recompute the top window of a display and flip focus flags.
    pub fn refresh_focus(&mut self, display_id: DisplayId) -> FocusChange {
        let previous =
            self.windows.iter().find(|w| w.display_id == display_id && w.is_focused).map(|w| w.id);
        let next = self.top_window(display_id).map(|w| w.id);
        if previous == next {
            return FocusChange::default();
        }
        if let Some(id) = previous {
            self.update_window(id, |w| w.is_focused = false);
        }
        if let Some(id) = next {
            self.update_window(id, |w| w.is_focused = true);
        }
        FocusChange { lost: previous, gained: next }
    }

    /// Store an orientation requested while rotation is locked, replacing any earlier one.
    pub fn set_pending_orientation(&mut self, id: WindowId, orientation: Orientation) -> bool {
        self.update_window(id, |w| w.pending_orientation = Some(orientation))
    }

    /// Move every pending orientation into the applied preference.
    pub fn apply_pending_orientations(&mut self) -> Vec<WindowId> {
        let ids: Vec<WindowId> = self
            .windows
            .iter()
            .filter(|w| w.pending_orientation.is_some())
            .map(|w| w.id)
            .collect();
        for id in &ids {
            self.update_window(*id, |w| {
                if let Some(orientation) = w.pending_orientation.take() {
                    w.properties.preferred_orientation = orientation;
                }
            });
        }
        ids
    }

    // ========================================================================
    // Dialog death-links
    // ========================================================================

    /// Bind a dialog to a remote peer, replacing any previous link.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for non-dialogs.
    pub fn bind_dialog_target(
        &mut self,
        id: WindowId,
        token: RemoteToken,
        callback: DeathCallback,
    ) -> WmResult<()> {
        let window = self.require(id)?;
        if window.window_type != WindowType::Dialog {
            return Err(WmError::InvalidParam(format!(
                "window {id} is a {} window, not a dialog",
                window.window_type.as_str()
            )));
        }
        if let Some(previous) = self.death_links.insert(id, DeathLink { token, callback }) {
            tracing::debug!(window_id = id, previous = previous.token.0, "dialog death-link replaced");
        }
        Ok(())
    }

    /// Dialogs currently bound to a remote peer.
    #[must_use]
    pub fn dialogs_bound_to(&self, token: RemoteToken) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = self
            .death_links
            .iter()
            .filter(|(_, link)| link.token == token)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Tear down every link to a dead peer and hand back the callbacks.
    pub fn take_death_callbacks(&mut self, token: RemoteToken) -> Vec<(WindowId, DeathCallback)> {
        let ids = self.dialogs_bound_to(token);
        ids.into_iter()
            .filter_map(|id| self.death_links.remove(&id).map(|link| (id, link.callback)))
            .collect()
    }

    /// Whether a dialog holds a death-link.
    #[must_use]
    pub fn has_death_link(&self, id: WindowId) -> bool { self.death_links.contains_key(&id) }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn registry_with(windows: &[(&str, WindowType)]) -> WindowRegistry {
        let mut registry = WindowRegistry::new();
        for (name, window_type) in windows {
            registry.create(WindowSpec::new(name, *window_type, 0)).unwrap();
        }
        registry
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_create_assigns_increasing_ids() {
            let registry = registry_with(&[("a", WindowType::App), ("b", WindowType::App)]);
            assert_eq!(registry.find("a").unwrap().id, 1);
            assert_eq!(registry.find("b").unwrap().id, 2);
        }

        #[test]
        fn test_duplicate_live_name_is_rejected() {
            let mut registry = registry_with(&[("main", WindowType::App)]);
            let result = registry.create(WindowSpec::new("main", WindowType::App, 0));
            assert!(matches!(result, Err(WmError::InvalidParam(_))));
        }

        #[test]
        fn test_name_is_reusable_after_destroy() {
            let mut registry = registry_with(&[("main", WindowType::App)]);
            registry.destroy(1).unwrap();
            let window = registry.create(WindowSpec::new("main", WindowType::App, 0)).unwrap();
            assert_eq!(window.id, 2);
        }

        #[test]
        fn test_double_destroy_is_invalid_window() {
            let mut registry = registry_with(&[("main", WindowType::App)]);
            assert!(registry.destroy(1).is_ok());
            assert!(matches!(registry.destroy(1), Err(WmError::InvalidWindow(_))));
            assert!(matches!(registry.find("main"), Err(WmError::InvalidWindow(_))));
        }

        #[test]
        fn test_hide_on_hidden_window_is_noop() {
            let mut registry = registry_with(&[("main", WindowType::App)]);
            assert!(!registry.hide(1).unwrap());
            registry.show(1).unwrap();
            assert!(registry.hide(1).unwrap());
            assert!(!registry.hide(1).unwrap());
        }

        #[test]
        fn test_parent_must_exist() {
            let mut registry = WindowRegistry::new();
            let spec = WindowSpec {
                parent_id: Some(9),
                ..WindowSpec::new("child", WindowType::App, 0)
            };
            assert!(matches!(registry.create(spec), Err(WmError::InvalidWindow(_))));
        }
    }

    mod mode_tests {
        use super::*;

        #[test]
        fn test_split_half_has_one_holder_per_display() {
            let mut registry = registry_with(&[("a", WindowType::App), ("b", WindowType::App)]);
            assert!(registry.set_mode(1, WindowMode::SplitPrimary).unwrap());
            assert!(!registry.set_mode(1, WindowMode::SplitPrimary).unwrap());
            assert!(registry.set_mode(2, WindowMode::SplitPrimary).unwrap());
            assert_eq!(registry.require(1).unwrap().mode, WindowMode::FullScreen);
            assert_eq!(registry.require(2).unwrap().mode, WindowMode::SplitPrimary);
        }

        #[test]
        fn test_only_main_app_windows_have_modes() {
            let mut registry = registry_with(&[("main", WindowType::App), ("alert", WindowType::SystemAlert)]);
            let sub = registry
                .create(WindowSpec { parent_id: Some(1), ..WindowSpec::new("sub", WindowType::App, 0) })
                .unwrap();
            assert!(matches!(registry.set_mode(2, WindowMode::FullScreen), Err(WmError::InvalidParam(_))));
            assert!(matches!(registry.set_mode(sub.id, WindowMode::Floating), Err(WmError::InvalidParam(_))));
            assert!(matches!(registry.set_mode(9, WindowMode::Floating), Err(WmError::InvalidWindow(_))));
        }

        #[test]
        fn test_toggled_backup_drops_destroyed_windows() {
            let mut registry = registry_with(&[("a", WindowType::App), ("b", WindowType::App)]);
            registry.set_toggled_app_windows(vec![(1, WindowMode::Floating), (2, WindowMode::FullScreen)]);
            registry.destroy(1).unwrap();
            assert_eq!(registry.take_toggled_app_windows(), vec![(2, WindowMode::FullScreen)]);
            assert!(registry.take_toggled_app_windows().is_empty());
        }
    }

    mod z_order_tests {
        use super::*;

        #[test]
        fn test_layers_dominate_show_order() {
            let mut registry =
                registry_with(&[("bar", WindowType::StatusBar), ("app", WindowType::App)]);
            registry.show(1).unwrap();
            registry.show(2).unwrap();
            let names: Vec<String> =
                registry.windows_on_display(0).into_iter().map(|w| w.name).collect();
            assert_eq!(names, vec!["app", "bar"]);
        }

        #[test]
        fn test_reshow_raises_within_layer() {
            let mut registry = registry_with(&[("a", WindowType::App), ("b", WindowType::App)]);
            registry.show(1).unwrap();
            registry.show(2).unwrap();
            assert_eq!(registry.top_window(0).unwrap().name, "b");
            registry.show(1).unwrap();
            assert_eq!(registry.top_window(0).unwrap().name, "a");
        }

        #[test]
        fn test_top_window_skips_unfocusable() {
            let mut registry =
                registry_with(&[("app", WindowType::App), ("bar", WindowType::StatusBar)]);
            registry.show(1).unwrap();
            registry.show(2).unwrap();
            assert_eq!(registry.top_window(0).unwrap().name, "app");
        }

        #[test]
        fn test_refresh_focus_reports_transition() {
            let mut registry = registry_with(&[("a", WindowType::App), ("b", WindowType::App)]);
            registry.show(1).unwrap();
            assert_eq!(registry.refresh_focus(0), FocusChange { lost: None, gained: Some(1) });
            registry.show(2).unwrap();
            assert_eq!(registry.refresh_focus(0), FocusChange { lost: Some(1), gained: Some(2) });
            assert!(registry.refresh_focus(0).is_empty());
        }
    }

    mod property_tests {
        use super::*;

        #[test]
        fn test_brightness_range() {
            let mut registry = registry_with(&[("main", WindowType::App)]);
            assert!(registry.set_property(1, PropertyChange::Brightness(-1.0)).is_ok());
            assert!(registry.set_property(1, PropertyChange::Brightness(0.5)).unwrap());
            assert!(matches!(
                registry.set_property(1, PropertyChange::Brightness(1.5)),
                Err(WmError::InvalidParam(_))
            ));
        }

        #[test]
        fn test_non_finite_values_are_rejected() {
            let mut registry = registry_with(&[("main", WindowType::App)]);
            for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                assert!(matches!(
                    registry.set_property(1, PropertyChange::Brightness(value)),
                    Err(WmError::InvalidParam(_))
                ));
                assert!(matches!(
                    registry.set_property(1, PropertyChange::DimBehind(value)),
                    Err(WmError::InvalidParam(_))
                ));
            }
            let window = registry.require(1).unwrap();
            assert!(window.properties.brightness.is_finite());
            assert!(window.properties.dim_behind.is_finite());

            let frame = Rect::new(0.0, f64::NAN, 100.0, 100.0);
            assert!(matches!(registry.set_requested_frame(1, frame), Err(WmError::InvalidParam(_))));
            let frame = Rect::new(0.0, 0.0, f64::INFINITY, 100.0);
            assert!(matches!(registry.set_requested_frame(1, frame), Err(WmError::InvalidParam(_))));
            assert!(registry.require(1).unwrap().requested_frame.is_none());
        }

        #[test]
        fn test_background_color_format() {
            assert!(is_hex_color("#00ff00"));
            assert!(is_hex_color("#8000FF00"));
            assert!(!is_hex_color("00ff00"));
            assert!(!is_hex_color("#0f0"));
            assert!(!is_hex_color("#GG0000"));
        }

        #[test]
        fn test_same_value_reports_unchanged() {
            let mut registry = registry_with(&[("main", WindowType::App)]);
            assert!(registry.set_property(1, PropertyChange::FullScreen(true)).unwrap());
            assert!(!registry.set_property(1, PropertyChange::FullScreen(true)).unwrap());
        }

        #[test]
        fn test_pending_orientation_overwrites() {
            let mut registry = registry_with(&[("main", WindowType::App)]);
            registry.set_pending_orientation(1, Orientation::Portrait);
            registry.set_pending_orientation(1, Orientation::Landscape);
            assert_eq!(registry.apply_pending_orientations(), vec![1]);
            let window = registry.require(1).unwrap();
            assert_eq!(window.properties.preferred_orientation, Orientation::Landscape);
            assert!(window.pending_orientation.is_none());
        }
    }

    mod death_link_tests {
        use super::*;

        fn counting_callback(counter: &Arc<AtomicUsize>) -> DeathCallback {
            let counter = Arc::clone(counter);
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        }

        #[test]
        fn test_only_dialogs_can_bind() {
            let mut registry = registry_with(&[("main", WindowType::App)]);
            let counter = Arc::new(AtomicUsize::new(0));
            let result = registry.bind_dialog_target(1, RemoteToken(7), counting_callback(&counter));
            assert!(matches!(result, Err(WmError::InvalidParam(_))));
        }

        #[test]
        fn test_rebinding_replaces_link() {
            let mut registry = registry_with(&[("dialog", WindowType::Dialog)]);
            let counter = Arc::new(AtomicUsize::new(0));
            registry.bind_dialog_target(1, RemoteToken(7), counting_callback(&counter)).unwrap();
            registry.bind_dialog_target(1, RemoteToken(8), counting_callback(&counter)).unwrap();
            assert!(registry.take_death_callbacks(RemoteToken(7)).is_empty());
            assert_eq!(registry.take_death_callbacks(RemoteToken(8)).len(), 1);
        }

        #[test]
        fn test_callbacks_are_taken_once() {
            let mut registry = registry_with(&[("dialog", WindowType::Dialog)]);
            let counter = Arc::new(AtomicUsize::new(0));
            registry.bind_dialog_target(1, RemoteToken(7), counting_callback(&counter)).unwrap();
            for (_, callback) in registry.take_death_callbacks(RemoteToken(7)) {
                callback();
            }
            assert!(registry.take_death_callbacks(RemoteToken(7)).is_empty());
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn test_destroy_cancels_link() {
            let mut registry = registry_with(&[("dialog", WindowType::Dialog)]);
            let counter = Arc::new(AtomicUsize::new(0));
            registry.bind_dialog_target(1, RemoteToken(7), counting_callback(&counter)).unwrap();
            registry.destroy(1).unwrap();
            assert!(!registry.has_death_link(1));
            assert!(registry.take_death_callbacks(RemoteToken(7)).is_empty());
        }
    }
}
