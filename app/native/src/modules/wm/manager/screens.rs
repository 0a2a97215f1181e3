//! Screen and display operations.
//!
//! Each one commits a [`TopologyChange`] in the topology store and hands it to
//! the transaction, which turns it into `add`/`remove`/`change` events and
//! relayouts the affected displays.

use smallvec::SmallVec;

use super::{Scope, WindowManager};
use crate::error::{WmError, WmResult};
use crate::modules::wm::collaborators::capability;
use crate::modules::wm::pending::PendingOperation;
use crate::modules::wm::state::{
    DisplayId, DisplayState, ExpandGroup, ExpandOption, GroupId, MirrorGroup, Rect, ScreenId,
    ScreenMode, ScreenOrientation, SurfaceId, TopologyChange, VirtualScreenOption,
};

impl WindowManager {
    // ========================================================================
    // Screen lifecycle
    // ========================================================================

    /// Register a physical screen, as reported by the device layer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` when no mode is given, or for a non-finite or out-of-range density.
    pub fn connect_screen(
        &self,
        name: &str,
        modes: SmallVec<[ScreenMode; 4]>,
        virtual_pixel_ratio: f64,
        cutouts: Vec<Rect>,
    ) -> WmResult<TopologyChange> {
        if modes.is_empty() {
            return Err(WmError::InvalidParam(format!("screen '{name}' has no modes")));
        }
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.connect_screen(name, modes, virtual_pixel_ratio, cutouts)?;
            txn.apply_topology(&change);
            Ok(change)
        })
    }

    /// Remove a physical screen after device disconnect.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `InvalidParam` for virtual ones.
    pub fn disconnect_screen(&self, id: ScreenId) -> WmResult<TopologyChange> {
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.disconnect_screen(id)?;
            txn.apply_topology(&change);
            Ok(change)
        })
    }

    /// Create a client-owned virtual screen.
    ///
    /// # Errors
    ///
    /// - `NoPermission` when a surface is given without the `capture_screen` capability
    /// - `InvalidParam` for a zero size or an out-of-range density
    pub fn create_virtual_screen(&self, option: &VirtualScreenOption) -> WmResult<TopologyChange> {
        if option.surface.is_some() {
            self.require_capability(capability::CAPTURE_SCREEN, "binding a virtual screen surface")?;
        }
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.create_virtual_screen(option)?;
            txn.apply_topology(&change);
            Ok(change)
        })
    }

    /// Bind a virtual screen to an external surface.
    ///
    /// # Errors
    ///
    /// - `NoPermission` without the `capture_screen` capability
    /// - `InvalidScreen` for unknown screens
    /// - `DeviceNotSupport` for physical screens
    pub fn set_virtual_screen_surface(&self, id: ScreenId, surface: SurfaceId) -> WmResult<TopologyChange> {
        self.require_capability(capability::CAPTURE_SCREEN, "binding a virtual screen surface")?;
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.set_virtual_screen_surface(id, surface)?;
            txn.apply_topology(&change);
            Ok(change)
        })
    }

    /// Destroy a virtual screen; its windows move to the default display.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `DeviceNotSupport` for physical ones.
    pub fn destroy_virtual_screen(&self, id: ScreenId) -> WmResult<TopologyChange> {
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.destroy_virtual_screen(id)?;
            txn.apply_topology(&change);
            Ok(change)
        })
    }

    // ========================================================================
    // Groups
    // ========================================================================

    /// Mirror `mirrors` onto `main`; returns the group id.
    ///
    /// # Errors
    ///
    /// See [`crate::modules::wm::state::TopologyStore::make_mirror`].
    pub fn make_mirror(&self, main: ScreenId, mirrors: &[ScreenId]) -> WmResult<GroupId> {
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.make_mirror(main, mirrors)?;
            txn.apply_topology(&change);
            change
                .group
                .ok_or_else(|| WmError::StateAbnormally("mirror committed without a group".to_string()))
        })
    }

    /// # Errors
    ///
    /// Returns `InvalidParam` for an empty list and `InvalidScreen` for unknown screens.
    pub fn stop_mirror(&self, screens: &[ScreenId]) -> WmResult<TopologyChange> {
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.stop_mirror(screens)?;
            txn.apply_topology(&change);
            Ok(change)
        })
    }

    /// Tile screens into one logical canvas; returns the group id.
    ///
    /// # Errors
    ///
    /// See [`crate::modules::wm::state::TopologyStore::make_expand`].
    pub fn make_expand(&self, options: &[ExpandOption]) -> WmResult<GroupId> {
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.make_expand(options)?;
            txn.apply_topology(&change);
            change
                .group
                .ok_or_else(|| WmError::StateAbnormally("expand committed without a group".to_string()))
        })
    }

    /// # Errors
    ///
    /// Returns `InvalidParam` for an empty list and `InvalidScreen` for unknown screens.
    pub fn stop_expand(&self, screens: &[ScreenId]) -> WmResult<TopologyChange> {
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.stop_expand(screens)?;
            txn.apply_topology(&change);
            Ok(change)
        })
    }

    /// Union of the member rectangles of an expand group.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` when the group does not exist.
    pub fn expand_bounds(&self, group_id: GroupId) -> WmResult<Rect> { self.topology.read().expand_bounds(group_id) }

    #[must_use]
    pub fn mirror_group(&self, group_id: GroupId) -> Option<MirrorGroup> { self.topology.read().mirror_group(group_id) }

    #[must_use]
    pub fn expand_group(&self, group_id: GroupId) -> Option<ExpandGroup> { self.topology.read().expand_group(group_id) }

    // ========================================================================
    // Screen and display properties
    // ========================================================================

    /// Queue a switch to one of the screen's modes.
    ///
    /// The switch commits on the next [`Self::flush_pending_modes`]; the result
    /// arrives only through the returned operation.
    pub fn request_active_mode(&self, id: ScreenId, mode_index: usize) -> PendingOperation<TopologyChange> {
        self.transaction(Scope::All, |txn| Ok(txn.topology.request_active_mode(id, mode_index)))
            .unwrap_or_else(|err| PendingOperation::ready(Err(err)))
    }

    /// Commit queued mode switches; returns how many were applied.
    ///
    /// # Errors
    ///
    /// Returns `SystemAbnormally` after shutdown.
    pub fn flush_pending_modes(&self) -> WmResult<usize> {
        if !self.topology.read().has_pending_modes() {
            return Ok(0);
        }
        self.transaction(Scope::All, |txn| {
            let changes = txn.topology.flush_pending_modes();
            for change in &changes {
                txn.apply_topology(change);
            }
            Ok(changes.len())
        })
    }

    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `InvalidParam` outside `0.5..=4.0`.
    pub fn set_virtual_pixel_ratio(&self, id: ScreenId, ratio: f64) -> WmResult<TopologyChange> {
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.set_virtual_pixel_ratio(id, ratio)?;
            txn.apply_topology(&change);
            Ok(change)
        })
    }

    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `InvalidParam` for mirror targets.
    pub fn set_screen_orientation(&self, id: ScreenId, orientation: ScreenOrientation) -> WmResult<TopologyChange> {
        self.transaction(Scope::All, |txn| {
            let change = txn.topology.set_screen_orientation(id, orientation)?;
            txn.apply_topology(&change);
            Ok(change)
        })
    }

    /// Move a display to a new power state; `None` when it is already there.
    ///
    /// # Errors
    ///
    /// - `InvalidScreen` when the display is unknown
    /// - `StateAbnormally` when the display is gone
    /// - `InvalidParam` when `state` is `Unknown`
    pub fn set_display_state(&self, display_id: DisplayId, state: DisplayState) -> WmResult<Option<TopologyChange>> {
        self.transaction(Scope::Display(display_id), |txn| {
            let change = txn.topology.set_display_state(display_id, state)?;
            if let Some(change) = &change {
                txn.apply_topology(change);
            }
            Ok(change)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::CasementConfig;
    use crate::modules::wm::dispatcher::{EventTarget, EventType, WmEvent, handler};
    use crate::modules::wm::manager::Collaborators;
    use crate::modules::wm::state::{Rotation, WindowSpec, WindowType};

    fn manager_with(capabilities: &[&str]) -> Arc<WindowManager> {
        WindowManager::from_config(
            &CasementConfig::default(),
            Collaborators::in_process(capabilities.iter().copied()),
        )
        .unwrap()
    }

    fn virtual_screen(wm: &WindowManager, name: &str) -> (ScreenId, DisplayId) {
        let option = VirtualScreenOption {
            name: name.to_string(),
            width: 800,
            height: 600,
            density: 1.0,
            surface: None,
        };
        wm.create_virtual_screen(&option).unwrap().added.unwrap()
    }

    mod virtual_screen_tests {
        use super::*;

        #[test]
        fn test_surface_needs_capture_capability() {
            let wm = manager_with(&["system_window"]);
            let option = VirtualScreenOption {
                name: "cast".to_string(),
                width: 800,
                height: 600,
                density: 1.0,
                surface: Some(7),
            };
            assert!(matches!(wm.create_virtual_screen(&option), Err(WmError::NoPermission(_))));
            assert_eq!(wm.all_screens().len(), 1);

            let (screen_id, _) = virtual_screen(&wm, "cast");
            assert!(matches!(wm.set_virtual_screen_surface(screen_id, 7), Err(WmError::NoPermission(_))));
        }

        #[test]
        fn test_physical_screen_cannot_be_destroyed_as_virtual() {
            let wm = manager_with(&["capture_screen"]);
            assert!(matches!(wm.destroy_virtual_screen(0), Err(WmError::DeviceNotSupport(_))));
            assert!(matches!(wm.set_virtual_screen_surface(0, 1), Err(WmError::DeviceNotSupport(_))));
            assert!(matches!(wm.destroy_virtual_screen(42), Err(WmError::InvalidScreen(_))));
        }

        #[test]
        fn test_destroy_moves_windows_to_default_display() {
            let wm = manager_with(&["system_window"]);
            let (screen_id, display_id) = virtual_screen(&wm, "cast");
            let window = wm.create_window(WindowSpec::new("remote", WindowType::App, display_id)).unwrap();

            let removed = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&removed);
            wm.on(EventTarget::Display, EventType::Remove, handler(move |e| sink.lock().push(e.clone())))
                .unwrap();

            wm.destroy_virtual_screen(screen_id).unwrap();

            assert_eq!(removed.lock().as_slice(), &[WmEvent::DisplayRemoved { display_id }]);
            assert!(matches!(wm.screen(screen_id), Err(WmError::InvalidScreen(_))));
            assert!(matches!(wm.display(display_id), Err(WmError::InvalidScreen(_))));
            assert_eq!(wm.window(window.id).unwrap().display_id, 0);
        }
    }

    mod group_tests {
        use super::*;

        #[test]
        fn test_mirror_takes_main_geometry() {
            let wm = manager_with(&[]);
            let (screen_id, display_id) = virtual_screen(&wm, "mirror");
            wm.make_mirror(0, &[screen_id]).unwrap();

            let mirror = wm.display(display_id).unwrap();
            let main = wm.default_display().unwrap();
            assert_eq!((mirror.width, mirror.height), (main.width, main.height));
            assert!(matches!(wm.make_mirror(screen_id, &[0]), Err(WmError::InvalidParam(_))));
        }

        #[test]
        fn test_expand_bounds_cover_members() {
            let wm = manager_with(&[]);
            let (left, _) = virtual_screen(&wm, "left");
            let (right, _) = virtual_screen(&wm, "right");
            let group = wm
                .make_expand(&[
                    ExpandOption { screen_id: left, start_x: 0.0, start_y: 0.0 },
                    ExpandOption { screen_id: right, start_x: 800.0, start_y: 0.0 },
                ])
                .unwrap();
            assert_eq!(wm.expand_bounds(group).unwrap(), Rect::new(0.0, 0.0, 1600.0, 600.0));
            assert_eq!(wm.expand_group(group).unwrap().members.len(), 2);

            wm.stop_expand(&[left, right]).unwrap();
            assert!(wm.expand_group(group).is_none());
        }
    }

    mod property_tests {
        use super::*;

        #[test]
        fn test_mode_switch_commits_on_flush() {
            let wm = manager_with(&[]);
            let mut pending = wm.request_active_mode(0, 1);
            assert!(pending.try_take().is_none());

            assert_eq!(wm.flush_pending_modes().unwrap(), 1);
            let change = pending.wait().unwrap();
            assert!(change.displays.contains(&0));
            let display = wm.default_display().unwrap();
            assert_eq!((display.width, display.height), (720.0, 1560.0));
        }

        #[test]
        fn test_unsupported_mode_fails_immediately() {
            let wm = manager_with(&[]);
            assert!(matches!(wm.request_active_mode(0, 9).wait(), Err(WmError::InvalidParam(_))));
            assert_eq!(wm.flush_pending_modes().unwrap(), 0);
        }

        #[test]
        fn test_shutdown_fails_pending_switch() {
            let wm = manager_with(&[]);
            let pending = wm.request_active_mode(0, 1);
            wm.shutdown().unwrap();
            assert!(matches!(pending.wait(), Err(WmError::SystemAbnormally(_))));
        }

        #[test]
        fn test_screen_orientation_rotates_display() {
            let wm = manager_with(&[]);
            wm.set_screen_orientation(0, ScreenOrientation::Horizontal).unwrap();
            let display = wm.default_display().unwrap();
            assert_eq!(display.rotation, Rotation::Deg90);
            assert_eq!((display.width, display.height), (2340.0, 1080.0));
        }

        #[test]
        fn test_pixel_ratio_range() {
            let wm = manager_with(&[]);
            assert!(matches!(wm.set_virtual_pixel_ratio(0, 5.0), Err(WmError::InvalidParam(_))));
            wm.set_virtual_pixel_ratio(0, 2.0).unwrap();
            assert!((wm.default_display().unwrap().virtual_pixel_ratio - 2.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_connect_rejects_non_finite_density() {
            let wm = manager_with(&[]);
            for density in [f64::NAN, f64::INFINITY, 9.0] {
                let result = wm.connect_screen(
                    "external",
                    smallvec::smallvec![ScreenMode::new(1920, 1080, 60)],
                    density,
                    Vec::new(),
                );
                assert!(matches!(result, Err(WmError::InvalidParam(_))), "density {density}");
            }
            assert_eq!(wm.all_screens().len(), 1);
            assert!(wm.connect_screen("external", smallvec::smallvec![ScreenMode::new(1920, 1080, 60)], 1.5, Vec::new()).is_ok());
        }

        #[test]
        fn test_display_state_repeats_are_quiet() {
            let wm = manager_with(&[]);
            assert!(wm.set_display_state(0, DisplayState::On).unwrap().is_none());
            assert!(wm.set_display_state(0, DisplayState::Off).unwrap().is_some());
        }

        #[test]
        fn test_display_state_jumps_between_known_states() {
            let wm = manager_with(&[]);
            assert!(wm.set_display_state(0, DisplayState::Vr).unwrap().is_some());
            assert!(wm.set_display_state(0, DisplayState::On).unwrap().is_some());
            assert!(wm.set_display_state(0, DisplayState::OnSuspend).unwrap().is_some());
            assert!(matches!(
                wm.set_display_state(0, DisplayState::Unknown),
                Err(WmError::InvalidParam(_))
            ));
            assert_eq!(wm.default_display().unwrap().state, DisplayState::OnSuspend);
        }
    }
}
