//! One mutation of the service state.
//!
//! A [`Txn`] holds every store lock for the duration of a mutation. Operations
//! mutate the stores through it and mark displays dirty; [`Txn::settle`] then
//! relays out each dirty display, derives focus and stage changes and collects
//! the resulting events. The caller dispatches them after the locks are gone.

use std::collections::{BTreeSet, HashMap};

use parking_lot::{MutexGuard, RwLockWriteGuard};

use super::WindowManager;
use super::system_ui::{SystemUiOptions, SystemUiState};
use crate::modules::wm::dispatcher::{EventDispatcher, EventTarget, EventType, WmEvent};
use crate::modules::wm::layout::{LayoutEngine, effective_frame, limit_rect, resolve_rotation, tile_frames};
use crate::modules::wm::stage::StageController;
use crate::modules::wm::state::{
    AvoidAreaType, DeathCallback, DisplayId, Rect, TopologyChange, TopologyStore, Window, WindowId,
    WindowLayoutMode, WindowRegistry,
};

/// Geometry below this difference counts as unchanged.
const FRAME_EPSILON: f64 = 0.01;

/// Upper bound on relayout passes per display within one mutation.
const MAX_PASSES: usize = 4;

/// Everything a mutation leaves behind once its locks are released.
#[derive(Default)]
pub struct TxnOutput {
    pub events: Vec<WmEvent>,
    pub cleared_targets: Vec<EventTarget>,
    pub removed_displays: Vec<DisplayId>,
    pub callbacks: Vec<DeathCallback>,
}

/// Write access to all stores plus the events collected so far.
pub struct Txn<'a> {
    pub topology: RwLockWriteGuard<'a, TopologyStore>,
    pub registry: RwLockWriteGuard<'a, WindowRegistry>,
    pub layout: MutexGuard<'a, LayoutEngine>,
    pub stages: MutexGuard<'a, StageController>,
    pub system_ui: MutexGuard<'a, SystemUiState>,
    dispatcher: &'a EventDispatcher,
    options: &'a SystemUiOptions,
    dirty: BTreeSet<DisplayId>,
    output: TxnOutput,
}

impl<'a> Txn<'a> {
    /// Lock every store in the fixed order topology, registry, layout, stages, system UI.
    pub(super) fn begin(manager: &'a WindowManager) -> Self {
        Self {
            topology: manager.topology.write(),
            registry: manager.registry.write(),
            layout: manager.layout.lock(),
            stages: manager.stages.lock(),
            system_ui: manager.system_ui.lock(),
            dispatcher: &manager.dispatcher,
            options: &manager.system_ui_options,
            dirty: BTreeSet::new(),
            output: TxnOutput::default(),
        }
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Schedule a relayout of a display.
    pub fn touch(&mut self, display_id: DisplayId) { self.dirty.insert(display_id); }

    /// Schedule a relayout of every live display.
    pub fn touch_all(&mut self) {
        let ids: Vec<DisplayId> = self.topology.displays.iter().map(|d| d.id).collect();
        self.dirty.extend(ids);
    }

    pub fn emit(&mut self, event: WmEvent) { self.output.events.push(event); }

    /// Queue a death callback to run after the locks are released.
    pub fn defer_callback(&mut self, callback: DeathCallback) { self.output.callbacks.push(callback); }

    /// Turn a committed topology change into events and relayout work.
    pub fn apply_topology(&mut self, change: &TopologyChange) {
        if let Some((screen_id, display_id)) = change.added {
            self.emit(WmEvent::ScreenAdded { screen_id });
            self.emit(WmEvent::DisplayAdded { display_id });
            self.touch(display_id);
        }
        for screen_id in &change.screens {
            self.emit(WmEvent::ScreenChanged { screen_id: *screen_id });
        }
        for display_id in &change.displays {
            self.emit(WmEvent::DisplayChanged { display_id: *display_id });
            self.touch(*display_id);
        }
        if let Some((screen_id, display_id)) = change.removed {
            self.emit(WmEvent::DisplayRemoved { display_id });
            self.emit(WmEvent::ScreenRemoved { screen_id });
            self.evacuate_display(display_id);
        }
    }

    /// Move windows off a removed display onto the default one.
    fn evacuate_display(&mut self, display_id: DisplayId) {
        for window_id in self.system_ui.remove_display(display_id) {
            self.destroy_window_entry(window_id);
        }

        self.dirty.remove(&display_id);
        self.layout.forget_display(display_id);
        self.output.removed_displays.push(display_id);

        match self.topology.default_display_id() {
            Some(target) => {
                let moved = self.registry.move_display(display_id, target);
                tracing::debug!(from = display_id, to = target, count = moved.len(), "windows moved off removed display");
                self.touch(target);
            }
            None => {
                tracing::warn!(display_id, "last display removed; windows keep their dead display");
            }
        }
    }

    // ========================================================================
    // Window teardown
    // ========================================================================

    /// Destroy a window and everything it owns: child windows and, for a
    /// stage's main window, the whole stage.
    pub fn destroy_window_tree(&mut self, window_id: WindowId) {
        let Some(window) = self.registry.get_window(window_id) else {
            return;
        };

        if let Some(stage_id) = self.stages.stage_of_main(window_id)
            && let Ok(stage) = self.stages.require(stage_id)
        {
            let subs = stage.sub_windows.clone();
            for sub in subs {
                self.destroy_window_tree(sub);
            }
        }
        for child in self.registry.children_of(window_id) {
            self.destroy_window_tree(child);
        }

        let Some(destroyed) = self.destroy_window_entry(window_id) else {
            return;
        };
        if let Some(stage_id) = self.stages.stage_of_main(window_id) {
            for lifecycle in self.stages.sync(stage_id, &destroyed) {
                self.emit(WmEvent::StageLifecycleChanged { stage_id, lifecycle });
            }
            self.output.cleared_targets.push(EventTarget::Stage(stage_id));
        }
        self.touch(window.display_id);
    }

    fn destroy_window_entry(&mut self, window_id: WindowId) -> Option<Window> {
        let destroyed = self.registry.destroy(window_id).ok()?;
        self.stages.remove_sub_window(window_id);
        self.layout.forget_window(window_id);
        self.output.cleared_targets.push(EventTarget::Window(window_id));
        Some(destroyed)
    }

    // ========================================================================
    // Settling
    // ========================================================================

    /// Relayout every dirty display until nothing changes.
    pub fn settle(&mut self) {
        let mut passes: HashMap<DisplayId, usize> = HashMap::new();
        while let Some(display_id) = self.dirty.pop_first() {
            let pass = {
                let count = passes.entry(display_id).or_default();
                *count += 1;
                *count
            };
            if pass > MAX_PASSES {
                continue;
            }
            // The last pass keeps the rotation so frames always match the display.
            let rotate = pass < MAX_PASSES;
            if !rotate {
                tracing::warn!(display_id, "orientation did not settle, keeping current rotation");
            }
            self.relayout_display(display_id, rotate);
        }
    }

    fn relayout_display(&mut self, display_id: DisplayId, rotate: bool) {
        let Some(mut display) = self.topology.get_display(display_id) else {
            return;
        };

        // Focus and stages.
        let focus = self.registry.refresh_focus(display_id);
        if !focus.is_empty() {
            tracing::trace!(display_id, lost = ?focus.lost, gained = ?focus.gained, "focus changed");
        }
        self.sync_stages(display_id);

        // Orientation of the top window drives the display rotation. Mirror
        // targets follow their main screen.
        if rotate
            && !self.topology.is_rotation_locked()
            && !self.topology.is_mirror_target(display.screen_id)
            && let Some(top) = self.registry.top_window(display_id)
            && let Some(screen) = self.topology.get_screen(display.screen_id)
        {
            let target = resolve_rotation(
                top.properties.preferred_orientation,
                display.rotation,
                self.layout.sensor_rotation(),
                screen.is_portrait_panel(),
            );
            if target != display.rotation
                && let Ok(Some(change)) = self.topology.set_display_rotation(display_id, target)
            {
                tracing::debug!(display_id, window_id = top.id, ?target, "display rotated for top window");
                self.apply_topology(&change);
                if let Some(updated) = self.topology.get_display(display_id) {
                    display = updated;
                }
            }
        }

        // Geometry.
        self.system_ui.place(&mut self.registry, self.options, display_id, display.width, display.height);
        self.layout.invalidate(display_id);
        let stack = self.registry.windows_on_display(display_id);
        let tiles: HashMap<WindowId, Rect> = match self.layout.layout_mode() {
            WindowLayoutMode::Tile => tile_frames(&display, &limit_rect(&display, &stack), &stack)
                .into_iter()
                .collect(),
            WindowLayoutMode::Cascade => HashMap::new(),
        };
        for window in &stack {
            let frame = tiles
                .get(&window.id)
                .copied()
                .unwrap_or_else(|| effective_frame(window, &display, &stack));
            if frame.approx_eq(&window.frame, FRAME_EPSILON) {
                continue;
            }
            self.registry.update_window(window.id, |w| w.frame = frame);
            let resized = (frame.width - window.frame.width).abs() >= FRAME_EPSILON
                || (frame.height - window.frame.height).abs() >= FRAME_EPSILON;
            if resized {
                self.emit(WmEvent::WindowSizeChanged {
                    window_id: window.id,
                    width: frame.width,
                    height: frame.height,
                });
            }
        }

        // Avoid areas for listening windows.
        let stack = self.registry.windows_on_display(display_id);
        for window in &stack {
            if !self.dispatcher.has_subscribers(EventTarget::Window(window.id), EventType::AvoidAreaChange) {
                continue;
            }
            for area_type in AvoidAreaType::ALL {
                let area = self.layout.avoid_area(window, &display, &stack, area_type);
                if self.layout.diff_reported(window.id, area_type, area) {
                    self.emit(WmEvent::AvoidAreaChanged { window_id: window.id, area_type, area });
                }
            }
        }

        // Bar tints.
        let bars_hidden = self
            .registry
            .top_window(display_id)
            .is_some_and(|w| w.properties.full_screen);
        if let Some(tints) = self.system_ui.update_tints(display_id, &stack, bars_hidden) {
            self.emit(WmEvent::SystemBarTintChanged { display_id, tints });
        }
    }

    fn sync_stages(&mut self, display_id: DisplayId) {
        let mains: Vec<_> = self
            .registry
            .windows_on_display(display_id)
            .into_iter()
            .filter_map(|w| self.stages.stage_of_main(w.id).map(|stage_id| (stage_id, w)))
            .collect();
        for (stage_id, main) in mains {
            for lifecycle in self.stages.sync(stage_id, &main) {
                self.emit(WmEvent::StageLifecycleChanged { stage_id, lifecycle });
            }
        }
    }

    /// Release the collected output; the locks are dropped with `self`.
    pub(super) fn finish(self) -> TxnOutput { self.output }
}
