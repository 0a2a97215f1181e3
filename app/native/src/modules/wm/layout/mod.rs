//! Layout and avoid-area engine.
//!
//! Geometry and avoid areas are pure functions of the windows on a display.
//! [`LayoutEngine`] adds the state around them: a per-display generation used to
//! memoize avoid areas, the last area reported to each window so listeners only
//! hear about changes, keyboard heights, and the last sensor rotation.

mod arrange;
mod avoid;
mod geometry;
mod orientation;

use std::collections::HashMap;

pub use arrange::{cascade_rect, is_tileable, max_tiles, split_rect, tile_frames, tile_overflow};
pub use avoid::{AvoidEdge, classify_edge, compute_avoid_area, overlap_in_window};
pub use geometry::{effective_frame, limit_rect};
pub use orientation::resolve_rotation;

use crate::modules::wm::state::{
    AvoidArea, AvoidAreaType, Display, DisplayId, Rotation, Window, WindowId, WindowLayoutMode,
};

#[derive(Clone, Copy, Debug)]
struct MemoEntry {
    display_id: DisplayId,
    generation: u64,
    area: AvoidArea,
}

/// Caches and change tracking around the pure layout functions.
#[derive(Debug, Default)]
pub struct LayoutEngine {
    generations: HashMap<DisplayId, u64>,
    memo: HashMap<(WindowId, AvoidAreaType), MemoEntry>,
    reported: HashMap<(WindowId, AvoidAreaType), AvoidArea>,
    keyboard_heights: HashMap<DisplayId, f64>,
    sensor_rotation: Option<Rotation>,
    layout_mode: WindowLayoutMode,
}

impl LayoutEngine {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    // ========================================================================
    // Generations
    // ========================================================================

    /// Marks every cached area on a display stale.
    pub fn invalidate(&mut self, display_id: DisplayId) {
        *self.generations.entry(display_id).or_default() += 1;
    }

    #[must_use]
    pub fn generation(&self, display_id: DisplayId) -> u64 {
        self.generations.get(&display_id).copied().unwrap_or_default()
    }

    /// Drops all state for a removed display.
    pub fn forget_display(&mut self, display_id: DisplayId) {
        self.generations.remove(&display_id);
        self.keyboard_heights.remove(&display_id);
        self.memo.retain(|_, entry| entry.display_id != display_id);
    }

    // ========================================================================
    // Avoid areas
    // ========================================================================

    /// The avoid area of `window`, reusing the cached value while the display is unchanged.
    pub fn avoid_area(
        &mut self,
        window: &Window,
        display: &Display,
        stack: &[Window],
        kind: AvoidAreaType,
    ) -> AvoidArea {
        let generation = self.generation(display.id);
        let key = (window.id, kind);

        if let Some(entry) = self.memo.get(&key)
            && entry.display_id == display.id
            && entry.generation == generation
        {
            return entry.area;
        }

        let area = compute_avoid_area(window, display, stack, kind, self.keyboard_height(display.id));
        self.memo.insert(key, MemoEntry { display_id: display.id, generation, area });
        area
    }

    /// Records `area` as the latest value for a listener and says whether it must be notified.
    ///
    /// An empty first value is recorded silently.
    pub fn diff_reported(&mut self, window_id: WindowId, kind: AvoidAreaType, area: AvoidArea) -> bool {
        match self.reported.insert((window_id, kind), area) {
            Some(previous) => previous != area,
            None => !area.is_empty(),
        }
    }

    /// Drops cached and reported areas of a destroyed window.
    pub fn forget_window(&mut self, window_id: WindowId) {
        self.memo.retain(|(id, _), _| *id != window_id);
        self.reported.retain(|(id, _), _| *id != window_id);
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    #[must_use]
    pub fn keyboard_height(&self, display_id: DisplayId) -> f64 {
        self.keyboard_heights.get(&display_id).copied().unwrap_or_default()
    }

    /// Returns true if the height changed; the display is invalidated on change.
    pub fn set_keyboard_height(&mut self, display_id: DisplayId, height: f64) -> bool {
        let height = height.max(0.0);
        if (self.keyboard_height(display_id) - height).abs() < f64::EPSILON {
            return false;
        }
        self.keyboard_heights.insert(display_id, height);
        self.invalidate(display_id);
        true
    }

    #[must_use]
    pub const fn sensor_rotation(&self) -> Option<Rotation> { self.sensor_rotation }

    pub fn set_sensor_rotation(&mut self, rotation: Rotation) { self.sensor_rotation = Some(rotation); }

    #[must_use]
    pub const fn layout_mode(&self) -> WindowLayoutMode { self.layout_mode }

    /// Returns true if the mode changed.
    pub fn set_layout_mode(&mut self, mode: WindowLayoutMode) -> bool {
        if self.layout_mode == mode {
            return false;
        }
        self.layout_mode = mode;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::wm::state::{DisplayState, Rect, WindowLifecycle, WindowType};

    fn display() -> Display {
        Display {
            id: 7,
            screen_id: 0,
            name: "panel".to_string(),
            width: 1080.0,
            height: 2340.0,
            rotation: Rotation::Deg0,
            refresh_rate: 60,
            virtual_pixel_ratio: 3.0,
            density_dpi: 480.0,
            cutouts: Vec::new(),
            state: DisplayState::On,
            alive: true,
        }
    }

    fn app() -> Window {
        let mut window = Window::new(1, "app", WindowType::App, 7);
        window.frame = display().bounds();
        window.lifecycle = WindowLifecycle::Shown;
        window
    }

    fn status_bar() -> Window {
        let mut window = Window::new(2, "status", WindowType::StatusBar, 7);
        window.frame = Rect::new(0.0, 0.0, 1080.0, 96.0);
        window.lifecycle = WindowLifecycle::Shown;
        window
    }

    #[test]
    fn test_memo_survives_until_invalidated() {
        let mut engine = LayoutEngine::new();
        let first = engine.avoid_area(&app(), &display(), &[status_bar()], AvoidAreaType::System);
        assert!(first.top.is_valid());

        // A stale stack is ignored while the generation holds.
        let cached = engine.avoid_area(&app(), &display(), &[], AvoidAreaType::System);
        assert_eq!(cached, first);

        engine.invalidate(7);
        let fresh = engine.avoid_area(&app(), &display(), &[], AvoidAreaType::System);
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_diff_reported_only_on_change() {
        let mut engine = LayoutEngine::new();
        assert!(!engine.diff_reported(1, AvoidAreaType::System, AvoidArea::default()));

        let area = compute_avoid_area(&app(), &display(), &[status_bar()], AvoidAreaType::System, 0.0);
        assert!(engine.diff_reported(1, AvoidAreaType::System, area));
        assert!(!engine.diff_reported(1, AvoidAreaType::System, area));
        assert!(engine.diff_reported(1, AvoidAreaType::System, AvoidArea::default()));
    }

    #[test]
    fn test_keyboard_height_bumps_generation() {
        let mut engine = LayoutEngine::new();
        assert!(engine.set_keyboard_height(7, 800.0));
        assert_eq!(engine.generation(7), 1);
        assert!(!engine.set_keyboard_height(7, 800.0));
        assert_eq!(engine.generation(7), 1);

        let area = engine.avoid_area(&app(), &display(), &[], AvoidAreaType::Keyboard);
        assert_eq!(area.bottom, Rect::new(0.0, 1540.0, 1080.0, 800.0));
    }

    #[test]
    fn test_layout_mode_reports_changes() {
        let mut engine = LayoutEngine::new();
        assert_eq!(engine.layout_mode(), WindowLayoutMode::Cascade);
        assert!(engine.set_layout_mode(WindowLayoutMode::Tile));
        assert!(!engine.set_layout_mode(WindowLayoutMode::Tile));
        assert_eq!(engine.layout_mode(), WindowLayoutMode::Tile);
    }

    #[test]
    fn test_forget_window_resets_reporting() {
        let mut engine = LayoutEngine::new();
        let area = compute_avoid_area(&app(), &display(), &[status_bar()], AvoidAreaType::System, 0.0);
        assert!(engine.diff_reported(1, AvoidAreaType::System, area));
        engine.forget_window(1);
        assert!(engine.diff_reported(1, AvoidAreaType::System, area));
    }
}
