//! Window, stage and orientation operations.

use super::txn::Txn;
use super::{Scope, WindowManager};
use crate::modules::wm::collaborators::{PixelBuffer, capability};
use crate::modules::wm::dispatcher::WmEvent;
use crate::modules::wm::layout::{cascade_rect, limit_rect, tile_overflow};
use crate::modules::wm::pending::PendingOperation;
use crate::modules::wm::stage::DestroyMode;
use crate::modules::wm::state::{
    AppWindowToggle, DeathCallback, DisplayId, Orientation, PropertyChange, Rect, RemoteToken,
    Rotation, StageId, Window, WindowId, WindowLayoutMode, WindowMode, WindowSpec, WindowType,
};
use crate::error::{WmError, WmResult};

impl WindowManager {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a window.
    ///
    /// A spec carrying a stage id creates a sub-window of that stage, parented
    /// to the stage's main window unless another parent is given.
    ///
    /// # Errors
    ///
    /// - `NoPermission` for non-app types without the `system_window` capability
    /// - `InvalidScreen` when the display does not exist
    /// - `InvalidParam` for an empty or taken name, or an unknown stage
    /// - `StateAbnormally` when the stage is destroyed
    /// - `InvalidWindow` when the parent does not exist
    pub fn create_window(&self, mut spec: WindowSpec) -> WmResult<Window> {
        if spec.window_type.is_system()
            && !self.collaborators.capabilities.has_capability(capability::SYSTEM_WINDOW)
        {
            return Err(WmError::NoPermission(format!(
                "creating a {} window requires '{}'",
                spec.window_type.as_str(),
                capability::SYSTEM_WINDOW
            )));
        }

        let id = self.transaction(Scope::Display(spec.display_id), |txn| {
            txn.topology.require_display(spec.display_id)?;
            if let Some(stage_id) = spec.stage_id {
                txn.stages.check_accepts_sub_window(stage_id)?;
                if spec.parent_id.is_none() {
                    spec.parent_id = txn.stages.get(stage_id).map(|s| s.main_window);
                }
            }

            let window = txn.registry.create(spec.clone())?;
            if let Some(stage_id) = spec.stage_id {
                txn.stages.add_sub_window(stage_id, window.id)?;
            }
            txn.touch(window.display_id);
            Ok(window.id)
        })?;
        self.window(id)
    }

    /// Create a stage with a fresh main app window.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_window`] for the main window.
    pub fn create_stage(&self, ability_name: &str, main_window_name: &str, display_id: DisplayId) -> WmResult<StageId> {
        self.transaction(Scope::Display(display_id), |txn| {
            txn.topology.require_display(display_id)?;
            let window = txn.registry.create(WindowSpec::new(main_window_name, WindowType::App, display_id))?;
            let stage_id = txn.stages.create(ability_name, window.id);
            txn.registry.update_window(window.id, |w| w.stage_id = Some(stage_id));
            txn.touch(display_id);
            Ok(stage_id)
        })
    }

    /// Show a window, raising it to the top of its layer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub fn show_window(&self, id: WindowId) -> WmResult<()> {
        self.transaction(Scope::Window(id), |txn| {
            let window = txn.registry.show(id)?;
            if txn.layout.layout_mode() == WindowLayoutMode::Tile {
                minimize_tile_overflow(txn, window.display_id);
            }
            txn.touch(window.display_id);
            Ok(())
        })
    }

    /// Hide a window. Hiding a hidden window succeeds without effect.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub fn hide_window(&self, id: WindowId) -> WmResult<()> {
        self.transaction(Scope::Window(id), |txn| {
            let display_id = txn.registry.require(id)?.display_id;
            if txn.registry.hide(id)? {
                txn.touch(display_id);
            }
            Ok(())
        })
    }

    /// Destroy a window with its sub-windows; a stage main window takes its stage down.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and on a second destroy.
    pub fn destroy_window(&self, id: WindowId) -> WmResult<()> {
        self.transaction(Scope::Window(id), |txn| {
            txn.registry.require(id)?;
            if txn.system_ui.is_system_ui(id) {
                return Err(WmError::NoPermission(format!("window {id} belongs to the system UI")));
            }
            txn.destroy_window_tree(id);
            Ok(())
        })
    }

    /// Destroy a stage: sub-windows first, then the main window.
    ///
    /// # Errors
    ///
    /// - `InvalidParam` for unknown stages
    /// - `RepeatOperation` for a destroyed stage
    /// - `StateAbnormally` for a visible stage destroyed with [`DestroyMode::Normal`]
    pub fn destroy_stage(&self, id: StageId, mode: DestroyMode) -> WmResult<()> {
        let main = self.stage(id)?.main_window;
        self.transaction(Scope::Window(main), |txn| {
            let teardown = txn.stages.destroy(id, mode)?;
            for lifecycle in teardown.steps {
                txn.emit(WmEvent::StageLifecycleChanged { stage_id: id, lifecycle });
            }
            for window_id in teardown.windows {
                txn.destroy_window_tree(window_id);
            }
            Ok(())
        })
    }

    // ========================================================================
    // Geometry and properties
    // ========================================================================

    /// Move and resize a window. A main app window becomes floating.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for an empty or non-finite rect.
    pub fn set_window_frame(&self, id: WindowId, frame: Rect) -> WmResult<()> {
        self.transaction(Scope::Window(id), |txn| {
            txn.registry.set_requested_frame(id, frame)?;
            let window = txn.registry.require(id)?;
            if window.is_main_app_window() && txn.registry.set_mode(id, WindowMode::Floating)? {
                tracing::debug!(window_id = id, "window floats at its requested frame");
            }
            txn.touch(window.display_id);
            Ok(())
        })
    }

    /// Apply one property change; returns whether the value changed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for bad values.
    pub fn set_window_property(&self, id: WindowId, change: PropertyChange) -> WmResult<bool> {
        self.transaction(Scope::Window(id), |txn| {
            let changed = txn.registry.set_property(id, change)?;
            if changed {
                let display_id = txn.registry.require(id)?.display_id;
                txn.touch(display_id);
            }
            Ok(changed)
        })
    }

    /// Load content into a window. A failed load leaves the window unchanged.
    ///
    /// The loader runs before any lock is taken, so it may call back into the manager.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows or the loader's error.
    pub fn load_content(&self, id: WindowId, path: &str, state: Option<&str>) -> WmResult<()> {
        self.ensure_running()?;
        let window = self.window(id)?;
        self.collaborators.content_loader.load_content(&window, path, state)?;
        self.transaction(Scope::Window(id), |txn| {
            // The window may have gone while the loader ran.
            txn.registry.require(id)?;
            txn.registry.set_content(id, path)
        })
    }

    // ========================================================================
    // Modes and arrangement
    // ========================================================================

    /// The mode of a window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub fn window_mode(&self, id: WindowId) -> WmResult<WindowMode> { self.window(id).map(|w| w.mode) }

    /// Change a main app window's mode; returns whether it changed.
    ///
    /// A window turning floating without a frame of its own is cascaded from
    /// the topmost floating window on its display.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for
    /// anything but a main app window.
    pub fn set_window_mode(&self, id: WindowId, mode: WindowMode) -> WmResult<bool> {
        self.transaction(Scope::Window(id), |txn| {
            let window = txn.registry.require(id)?;
            if !txn.registry.set_mode(id, mode)? {
                return Ok(false);
            }
            if mode == WindowMode::Floating
                && window.requested_frame.is_none()
                && let Some(display) = txn.topology.get_display(window.display_id)
            {
                let stack = txn.registry.windows_on_display(display.id);
                let frame = cascade_rect(&display, &limit_rect(&display, &stack), &stack, id);
                txn.registry.set_requested_frame(id, frame)?;
                tracing::debug!(window_id = id, ?frame, "floating window cascaded");
            }
            txn.touch(window.display_id);
            Ok(true)
        })
    }

    /// Switch every display between cascaded and tiled app windows.
    ///
    /// Entering tile mode minimizes the oldest windows that no longer fit.
    ///
    /// # Errors
    ///
    /// Returns `NoPermission` without the `system_window` capability.
    pub fn set_window_layout_mode(&self, mode: WindowLayoutMode) -> WmResult<()> {
        self.require_capability(capability::SYSTEM_WINDOW, "changing the window layout mode")?;
        self.transaction(Scope::All, |txn| {
            if !txn.layout.set_layout_mode(mode) {
                return Ok(());
            }
            tracing::debug!(?mode, "window layout mode changed");
            if mode == WindowLayoutMode::Tile {
                let display_ids: Vec<DisplayId> = txn.topology.displays.iter().map(|d| d.id).collect();
                for display_id in display_ids {
                    minimize_tile_overflow(txn, display_id);
                }
            }
            txn.touch_all();
            Ok(())
        })
    }

    /// Hide every shown main app window on a display; returns how many were hidden.
    ///
    /// # Errors
    ///
    /// Returns `NoPermission` without the `system_window` capability and
    /// `InvalidScreen` for unknown displays.
    pub fn minimize_all(&self, display_id: DisplayId) -> WmResult<usize> {
        self.require_capability(capability::SYSTEM_WINDOW, "minimizing all windows")?;
        self.transaction(Scope::Display(display_id), |txn| {
            txn.topology.require_display(display_id)?;
            let mut count = 0;
            for window in txn.registry.windows_on_display(display_id) {
                if window.is_main_app_window() && txn.registry.hide(window.id)? {
                    count += 1;
                }
            }
            if count > 0 {
                tracing::debug!(display_id, count, "app windows minimized");
                txn.touch(display_id);
            }
            Ok(count)
        })
    }

    /// Hide all shown main app windows, or show again the ones the last toggle
    /// hid when none are shown. Restored windows get back their mode.
    ///
    /// # Errors
    ///
    /// Returns `NoPermission` without the `system_window` capability.
    pub fn toggle_shown_state_for_all_app_windows(&self) -> WmResult<AppWindowToggle> {
        self.require_capability(capability::SYSTEM_WINDOW, "toggling all app windows")?;
        self.transaction(Scope::All, |txn| {
            let mut shown: Vec<Window> = txn
                .registry
                .all_windows()
                .into_iter()
                .filter(|w| w.is_main_app_window() && w.is_shown())
                .collect();
            shown.sort_by_key(|w| (w.z_seq, w.id));

            if !shown.is_empty() {
                for window in &shown {
                    txn.registry.hide(window.id)?;
                    txn.touch(window.display_id);
                }
                txn.registry.set_toggled_app_windows(shown.iter().map(|w| (w.id, w.mode)).collect());
                tracing::debug!(count = shown.len(), "app windows hidden by toggle");
                return Ok(AppWindowToggle::Hidden(shown.iter().map(|w| w.id).collect()));
            }

            let toggled = txn.registry.take_toggled_app_windows();
            if toggled.is_empty() {
                return Ok(AppWindowToggle::Unchanged);
            }
            for (id, mode) in &toggled {
                txn.registry.set_mode(*id, *mode)?;
                let window = txn.registry.show(*id)?;
                txn.touch(window.display_id);
            }
            tracing::debug!(count = toggled.len(), "app windows restored by toggle");
            Ok(AppWindowToggle::Restored(toggled.into_iter().map(|(id, _)| id).collect()))
        })
    }

    // ========================================================================
    // Orientation
    // ========================================================================

    /// Set a window's preferred orientation.
    ///
    /// While rotation is locked the request is stored as the window's single
    /// pending value and applied when the lock is released.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows.
    pub fn set_preferred_orientation(&self, id: WindowId, orientation: Orientation) -> WmResult<()> {
        self.transaction(Scope::Window(id), |txn| {
            let window = txn.registry.require(id)?;
            if txn.topology.is_rotation_locked() {
                txn.registry.set_pending_orientation(id, orientation);
                tracing::debug!(window_id = id, ?orientation, "orientation deferred by rotation lock");
                return Ok(());
            }
            txn.registry.update_window(id, |w| {
                w.properties.preferred_orientation = orientation;
                w.pending_orientation = None;
            });
            txn.touch(window.display_id);
            Ok(())
        })
    }

    /// Engage or release the global rotation lock. Releasing applies pending orientations.
    ///
    /// # Errors
    ///
    /// Returns `SystemAbnormally` after shutdown.
    pub fn set_rotation_locked(&self, locked: bool) -> WmResult<()> {
        self.transaction(Scope::All, |txn| {
            if !txn.topology.set_rotation_locked(locked) {
                return Ok(());
            }
            tracing::debug!(locked, "rotation lock changed");
            if !locked {
                let applied = txn.registry.apply_pending_orientations();
                tracing::debug!(count = applied.len(), "pending orientations applied");
                txn.touch_all();
            }
            Ok(())
        })
    }

    /// Report a rotation from the orientation sensor. Ignored while rotation is locked.
    ///
    /// # Errors
    ///
    /// Returns `SystemAbnormally` after shutdown.
    pub fn report_sensor_rotation(&self, rotation: Rotation) -> WmResult<()> {
        self.transaction(Scope::All, |txn| {
            if txn.topology.is_rotation_locked() {
                tracing::trace!(?rotation, "sensor rotation ignored while locked");
                return Ok(());
            }
            txn.layout.set_sensor_rotation(rotation);
            txn.touch_all();
            Ok(())
        })
    }

    // ========================================================================
    // Keyboard, screenshots and snapshots
    // ========================================================================

    /// Report the soft keyboard height on a display; `0.0` hides it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown displays and `InvalidParam` for a negative height.
    pub fn set_keyboard_height(&self, display_id: DisplayId, height: f64) -> WmResult<()> {
        if !height.is_finite() || height < 0.0 {
            return Err(WmError::InvalidParam(format!("keyboard height {height} is invalid")));
        }
        self.transaction(Scope::Display(display_id), |txn| {
            txn.topology.require_display(display_id)?;
            if !txn.layout.set_keyboard_height(display_id, height) {
                return Ok(());
            }
            for window in txn.registry.windows_on_display(display_id) {
                if window.is_shown() {
                    txn.emit(WmEvent::KeyboardHeightChanged { window_id: window.id, height });
                }
            }
            txn.touch(display_id);
            Ok(())
        })
    }

    /// Tell the shown windows of a display that the user took a screenshot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown displays.
    pub fn notify_screenshot(&self, display_id: DisplayId) -> WmResult<()> {
        self.transaction(Scope::Display(display_id), |txn| {
            txn.topology.require_display(display_id)?;
            for window in txn.registry.windows_on_display(display_id) {
                if window.is_shown() {
                    txn.emit(WmEvent::Screenshot { window_id: window.id });
                }
            }
            Ok(())
        })
    }

    /// Capture a window's contents.
    ///
    /// The result is delivered only through the returned operation.
    pub fn snapshot(&self, id: WindowId) -> PendingOperation<PixelBuffer> {
        let result = self.ensure_running().and_then(|()| self.window(id)).and_then(|window| {
            self.collaborators.snapshots.capture_window(&window).map_err(|err| match err {
                WmError::DeviceNotSupport(_) => err,
                other => WmError::DeviceNotSupport(other.to_string()),
            })
        });
        PendingOperation::ready(result)
    }

    // ========================================================================
    // Dialog targets
    // ========================================================================

    /// Bind a dialog to a remote peer; the callback runs once when the peer dies.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for non-dialogs.
    pub fn bind_dialog_target(&self, id: WindowId, token: RemoteToken, callback: DeathCallback) -> WmResult<()> {
        self.transaction(Scope::Window(id), |txn| txn.registry.bind_dialog_target(id, token, callback))
    }

    /// Deliver the death of a remote peer; returns how many callbacks ran.
    ///
    /// # Errors
    ///
    /// Returns `SystemAbnormally` after shutdown.
    pub fn notify_remote_died(&self, token: RemoteToken) -> WmResult<usize> {
        self.transaction(Scope::All, |txn| {
            let callbacks = txn.registry.take_death_callbacks(token);
            let count = callbacks.len();
            for (window_id, callback) in callbacks {
                tracing::debug!(window_id, token = token.0, "remote peer died");
                txn.defer_callback(callback);
            }
            Ok(count)
        })
    }

    /// Touch a remote target, notifying the dialogs bound to it.
    ///
    /// # Errors
    ///
    /// Returns `SystemAbnormally` after shutdown.
    pub fn touch_dialog_target(&self, token: RemoteToken) -> WmResult<usize> {
        self.transaction(Scope::All, |txn| {
            let dialogs = txn.registry.dialogs_bound_to(token);
            for window_id in &dialogs {
                txn.emit(WmEvent::DialogTargetTouched { window_id: *window_id });
            }
            Ok(dialogs.len())
        })
    }
}

/// Hide the oldest tiled windows of a display that no longer fit.
fn minimize_tile_overflow(txn: &mut Txn<'_>, display_id: DisplayId) {
    let Some(display) = txn.topology.get_display(display_id) else {
        return;
    };
    let stack = txn.registry.windows_on_display(display_id);
    for window_id in tile_overflow(&display, &limit_rect(&display, &stack), &stack) {
        if matches!(txn.registry.hide(window_id), Ok(true)) {
            tracing::debug!(window_id, display_id, "window minimized, no room to tile");
        }
    }
}
