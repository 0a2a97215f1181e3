//! System UI windows owned by the service: status bar, navigation bar and
//! the two back-gesture strips.
//!
//! Their frames follow the display size, so they are re-placed on every
//! relayout of the display they live on.

use std::collections::HashMap;

use crate::config::CasementConfig;
use crate::modules::wm::dispatcher::SystemBarTint;
use crate::modules::wm::state::{DisplayId, Rect, Window, WindowId, WindowRegistry, WindowType};

/// Bar sizes and colours.
#[derive(Clone, Debug, PartialEq)]
pub struct BarOptions {
    pub status_bar_height: f64,
    pub navigation_bar_height: f64,
    pub status_bar_color: String,
    pub navigation_bar_color: String,
}

/// Which system UI windows to create on the default display.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemUiOptions {
    pub bars: Option<BarOptions>,
    pub gesture_edge_width: Option<f64>,
}

impl SystemUiOptions {
    /// No system UI at all.
    #[must_use]
    pub fn none() -> Self { Self::default() }

    #[must_use]
    pub fn from_config(config: &CasementConfig) -> Self {
        let bars = config.system_bars.enabled.then(|| BarOptions {
            status_bar_height: config.system_bars.status_bar_height,
            navigation_bar_height: config.system_bars.navigation_bar_height,
            status_bar_color: config.system_bars.status_bar_color.clone(),
            navigation_bar_color: config.system_bars.navigation_bar_color.clone(),
        });
        let gesture_edge_width = config.gesture.enabled.then_some(config.gesture.edge_width);
        Self { bars, gesture_edge_width }
    }
}

/// Roles of service-owned windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SystemUiRole {
    StatusBar,
    NavigationBar,
    GestureLeft,
    GestureRight,
}

impl SystemUiRole {
    pub const ALL: [Self; 4] = [Self::StatusBar, Self::NavigationBar, Self::GestureLeft, Self::GestureRight];

    #[must_use]
    pub const fn window_type(self) -> WindowType {
        match self {
            Self::StatusBar => WindowType::StatusBar,
            Self::NavigationBar => WindowType::NavigationBar,
            Self::GestureLeft | Self::GestureRight => WindowType::SystemGesture,
        }
    }

    /// Unique window name for the role on a display.
    #[must_use]
    pub fn window_name(self, display_id: DisplayId) -> String {
        let role = match self {
            Self::StatusBar => "status-bar",
            Self::NavigationBar => "navigation-bar",
            Self::GestureLeft => "gesture-left",
            Self::GestureRight => "gesture-right",
        };
        format!("casement.{role}.{display_id}")
    }

    /// Frame of the role's window on a `width x height` display.
    #[must_use]
    pub fn frame(self, options: &SystemUiOptions, width: f64, height: f64) -> Option<Rect> {
        match self {
            Self::StatusBar => {
                options.bars.as_ref().map(|b| Rect::new(0.0, 0.0, width, b.status_bar_height.min(height)))
            }
            Self::NavigationBar => options.bars.as_ref().map(|b| {
                let bar = b.navigation_bar_height.min(height);
                Rect::new(0.0, height - bar, width, bar)
            }),
            Self::GestureLeft => options.gesture_edge_width.map(|w| Rect::new(0.0, 0.0, w.min(width), height)),
            Self::GestureRight => options.gesture_edge_width.map(|w| {
                let edge = w.min(width);
                Rect::new(width - edge, 0.0, edge, height)
            }),
        }
    }

    /// Background colour of the role's window.
    #[must_use]
    pub fn color(self, options: &SystemUiOptions) -> Option<String> {
        let bars = options.bars.as_ref()?;
        match self {
            Self::StatusBar => Some(bars.status_bar_color.clone()),
            Self::NavigationBar => Some(bars.navigation_bar_color.clone()),
            Self::GestureLeft | Self::GestureRight => None,
        }
    }
}

/// Service-owned windows and the last reported bar tints, per display.
#[derive(Debug, Default)]
pub struct SystemUiState {
    windows: HashMap<DisplayId, Vec<(SystemUiRole, WindowId)>>,
    tints: HashMap<DisplayId, Vec<SystemBarTint>>,
}

impl SystemUiState {
    pub fn register(&mut self, display_id: DisplayId, role: SystemUiRole, window_id: WindowId) {
        self.windows.entry(display_id).or_default().push((role, window_id));
    }

    #[must_use]
    pub fn windows_of(&self, display_id: DisplayId) -> Vec<(SystemUiRole, WindowId)> {
        self.windows.get(&display_id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_system_ui(&self, window_id: WindowId) -> bool {
        self.windows.values().flatten().any(|(_, id)| *id == window_id)
    }

    /// Forget a display; returns the windows it owned.
    pub fn remove_display(&mut self, display_id: DisplayId) -> Vec<WindowId> {
        self.tints.remove(&display_id);
        self.windows.remove(&display_id).unwrap_or_default().into_iter().map(|(_, id)| id).collect()
    }

    /// Move service windows to follow the display size.
    pub fn place(
        &self,
        registry: &mut WindowRegistry,
        options: &SystemUiOptions,
        display_id: DisplayId,
        width: f64,
        height: f64,
    ) {
        for (role, window_id) in self.windows_of(display_id) {
            if let Some(frame) = role.frame(options, width, height) {
                registry.update_window(window_id, |w| w.requested_frame = Some(frame));
            }
        }
    }

    /// Record the current tints; returns them when they differ from the last report.
    pub fn update_tints(
        &mut self,
        display_id: DisplayId,
        stack: &[Window],
        bars_hidden: bool,
    ) -> Option<Vec<SystemBarTint>> {
        let tints: Vec<SystemBarTint> = stack
            .iter()
            .filter(|w| matches!(w.window_type, WindowType::StatusBar | WindowType::NavigationBar))
            .map(|w| SystemBarTint {
                window_id: w.id,
                visible: w.is_shown() && !bars_hidden,
                background_color: w.properties.background_color.clone(),
            })
            .collect();

        let previous = self.tints.get(&display_id);
        if previous.is_none() && tints.is_empty() {
            return None;
        }
        if previous == Some(&tints) {
            return None;
        }
        self.tints.insert(display_id, tints.clone());
        Some(tints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::wm::state::{WindowLifecycle, WindowSpec};

    fn options() -> SystemUiOptions {
        SystemUiOptions::from_config(&CasementConfig::default())
    }

    #[test]
    fn test_frames_follow_display_size() {
        let options = options();
        assert_eq!(
            SystemUiRole::NavigationBar.frame(&options, 1080.0, 2340.0),
            Some(Rect::new(0.0, 2220.0, 1080.0, 120.0))
        );
        assert_eq!(
            SystemUiRole::GestureRight.frame(&options, 2340.0, 1080.0),
            Some(Rect::new(2292.0, 0.0, 48.0, 1080.0))
        );
        assert_eq!(SystemUiRole::StatusBar.frame(&SystemUiOptions::none(), 10.0, 10.0), None);
    }

    #[test]
    fn test_window_names_are_unique_per_display() {
        assert_ne!(SystemUiRole::StatusBar.window_name(0), SystemUiRole::StatusBar.window_name(1));
        assert_ne!(SystemUiRole::GestureLeft.window_name(0), SystemUiRole::GestureRight.window_name(0));
    }

    #[test]
    fn test_tints_report_only_changes() {
        let mut registry = WindowRegistry::new();
        let bar = registry.create(WindowSpec::new("bar", WindowType::StatusBar, 0)).unwrap();
        registry.update_window(bar.id, |w| w.lifecycle = WindowLifecycle::Shown);
        let stack = registry.windows_on_display(0);

        let mut state = SystemUiState::default();
        let first = state.update_tints(0, &stack, false).unwrap();
        assert!(first[0].visible);
        assert!(state.update_tints(0, &stack, false).is_none());

        let hidden = state.update_tints(0, &stack, true).unwrap();
        assert!(!hidden[0].visible);
    }

    #[test]
    fn test_remove_display_returns_owned_windows() {
        let mut state = SystemUiState::default();
        state.register(3, SystemUiRole::StatusBar, 10);
        state.register(3, SystemUiRole::NavigationBar, 11);
        assert!(state.is_system_ui(11));
        assert_eq!(state.remove_display(3), vec![10, 11]);
        assert!(!state.is_system_ui(11));
    }
}
