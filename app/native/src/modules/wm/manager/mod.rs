//! The window manager service core.
//!
//! [`WindowManager`] is the explicit, process-scoped handle that owns every
//! store, the per-display lock table and the collaborators. All mutations go
//! through [`WindowManager::transaction`]:
//!
//! ```text
//! ticket ──► display locks ──► store locks ──► mutate ──► settle
//!                                                            │
//!            dispatch events ◄── release locks ◄─────────────┘
//! ```
//!
//! Settling relays out dirty displays, recomputes avoid areas for listening
//! windows and derives focus and stage lifecycle changes, so every event is
//! delivered after the stores reflect the new state.

mod locks;
mod screens;
mod system_ui;
mod txn;
mod windows;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

pub use self::locks::{DisplayGuards, DisplayLocks};
pub use self::system_ui::{BarOptions, SystemUiOptions, SystemUiRole};
use self::system_ui::SystemUiState;
use self::txn::Txn;
use super::collaborators::{
    CapabilityChecker, ContentLoader, NoopContentLoader, SnapshotProducer, SolidColorSnapshot,
    StaticCapabilities,
};
use super::dispatcher::{EventDispatcher, EventHandler, EventTarget, EventType};
use super::layout::LayoutEngine;
use super::stage::StageController;
use super::state::{
    AvoidArea, AvoidAreaType, Display, DisplayId, Rect, Screen, ScreenId, ScreenMode, StageId,
    TopologyStore, Window, WindowId, WindowLayoutMode, WindowRegistry, WindowSpec, WindowStage,
};
use crate::config::CasementConfig;
use crate::error::{WmError, WmResult};

/// External services the manager calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub content_loader: Arc<dyn ContentLoader>,
    pub capabilities: Arc<dyn CapabilityChecker>,
    pub snapshots: Arc<dyn SnapshotProducer>,
}

impl Collaborators {
    /// In-process collaborators granting the given capabilities.
    #[must_use]
    pub fn in_process<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>, {
        Self {
            content_loader: Arc::new(NoopContentLoader::new()),
            capabilities: Arc::new(StaticCapabilities::new(capabilities)),
            snapshots: Arc::new(SolidColorSnapshot),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Displays a mutation must lock.
#[derive(Clone, Debug)]
pub(crate) enum Scope {
    Display(DisplayId),
    Window(WindowId),
    All,
}

/// The process-scoped window/display manager.
pub struct WindowManager {
    topology: RwLock<TopologyStore>,
    registry: RwLock<WindowRegistry>,
    layout: Mutex<LayoutEngine>,
    stages: Mutex<StageController>,
    system_ui: Mutex<SystemUiState>,
    system_ui_options: SystemUiOptions,
    dispatcher: EventDispatcher,
    locks: DisplayLocks,
    collaborators: Collaborators,
    shut_down: AtomicBool,
}

impl WindowManager {
    /// Build a manager from configuration.
    ///
    /// Connects the configured screens, applies the rotation lock and creates
    /// the system UI windows on the default display.
    ///
    /// # Errors
    ///
    /// Returns `Config` when the configuration does not validate.
    pub fn from_config(config: &CasementConfig, collaborators: Collaborators) -> WmResult<Arc<Self>> {
        config.validate()?;

        let manager = Arc::new(Self::empty(SystemUiOptions::from_config(config), collaborators));
        {
            let mut txn = Txn::begin(&manager);
            for screen in &config.screens {
                let mut modes: SmallVec<[ScreenMode; 4]> = SmallVec::new();
                modes.push(ScreenMode::new(screen.width, screen.height, screen.refresh_rate));
                modes.extend(screen.modes.iter().map(|m| ScreenMode::new(m.width, m.height, m.refresh_rate)));
                let cutouts =
                    screen.cutouts.iter().map(|c| Rect::new(c.x, c.y, c.width, c.height)).collect();
                let change = txn.topology.connect_screen(&screen.name, modes, screen.density, cutouts)?;
                txn.apply_topology(&change);
            }
            txn.topology.set_rotation_locked(config.rotation_locked);

            if let Some(display_id) = txn.topology.default_display_id() {
                manager.create_system_ui(&mut txn, display_id)?;
            }
            txn.settle();
            // Nothing can be subscribed yet.
            drop(txn.finish());
        }

        tracing::info!(
            screens = config.screens.len(),
            rotation_locked = config.rotation_locked,
            "window manager started"
        );
        Ok(manager)
    }

    /// A manager without screens or system UI.
    #[must_use]
    pub fn bare(collaborators: Collaborators) -> Arc<Self> {
        Arc::new(Self::empty(SystemUiOptions::none(), collaborators))
    }

    fn empty(system_ui_options: SystemUiOptions, collaborators: Collaborators) -> Self {
        Self {
            topology: RwLock::new(TopologyStore::new()),
            registry: RwLock::new(WindowRegistry::new()),
            layout: Mutex::new(LayoutEngine::new()),
            stages: Mutex::new(StageController::new()),
            system_ui: Mutex::new(SystemUiState::default()),
            system_ui_options,
            dispatcher: EventDispatcher::new(),
            locks: DisplayLocks::new(),
            collaborators,
            shut_down: AtomicBool::new(false),
        }
    }

    fn create_system_ui(&self, txn: &mut Txn<'_>, display_id: DisplayId) -> WmResult<()> {
        for role in SystemUiRole::ALL {
            if role.frame(&self.system_ui_options, 1.0, 1.0).is_none() {
                continue;
            }
            let spec = WindowSpec::new(&role.window_name(display_id), role.window_type(), display_id);
            let window = txn.registry.create(spec)?;
            if let Some(color) = role.color(&self.system_ui_options) {
                txn.registry.update_window(window.id, |w| w.properties.background_color = color);
            }
            txn.registry.show(window.id)?;
            txn.system_ui.register(display_id, role, window.id);
            tracing::debug!(window_id = window.id, ?role, display_id, "system UI window created");
        }
        txn.touch(display_id);
        Ok(())
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    fn ensure_running(&self) -> WmResult<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(WmError::SystemAbnormally("window manager is shut down".to_string()));
        }
        Ok(())
    }

    fn require_capability(&self, name: &str, action: &str) -> WmResult<()> {
        if self.collaborators.capabilities.has_capability(name) {
            return Ok(());
        }
        Err(WmError::NoPermission(format!("{action} requires '{name}'")))
    }

    fn scope_displays(&self, scope: &Scope) -> Vec<DisplayId> {
        match scope {
            Scope::Display(id) => vec![*id],
            Scope::Window(id) => {
                self.registry.read().get_window(*id).map(|w| vec![w.display_id]).unwrap_or_default()
            }
            Scope::All => self.topology.read().displays.iter().map(|d| d.id).collect(),
        }
    }

    /// Run one mutation: lock, mutate, settle, unlock, dispatch.
    ///
    /// A failing closure must not have changed any state.
    pub(crate) fn transaction<T, F>(&self, scope: Scope, f: F) -> WmResult<T>
    where F: FnOnce(&mut Txn<'_>) -> WmResult<T> {
        self.ensure_running()?;
        let ticket = self.dispatcher.ticket();
        let displays = self.scope_displays(&scope);

        let (value, output) = {
            let _guards = self.locks.acquire(&displays);
            let mut txn = Txn::begin(self);
            let value = f(&mut txn)?;
            txn.settle();
            (value, txn.finish())
        };

        for display_id in &output.removed_displays {
            self.locks.remove(*display_id);
        }
        self.dispatcher.dispatch(ticket, &output.events);
        for target in output.cleared_targets {
            self.dispatcher.clear_target(target);
        }
        for callback in output.callbacks {
            callback();
        }
        Ok(value)
    }

    /// Stop the service. Later operations fail with `SystemAbnormally`.
    ///
    /// # Errors
    ///
    /// Returns `RepeatOperation` when already shut down.
    pub fn shutdown(&self) -> WmResult<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Err(WmError::RepeatOperation("window manager already shut down".to_string()));
        }
        self.topology
            .write()
            .fail_pending_modes(&WmError::SystemAbnormally("window manager shut down".to_string()));
        tracing::info!("window manager shut down");
        Ok(())
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool { self.shut_down.load(Ordering::SeqCst) }

    #[must_use]
    pub const fn collaborators(&self) -> &Collaborators { &self.collaborators }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribe to events of a target.
    ///
    /// Listening for `avoidAreaChange` records the window's current areas so
    /// that only later changes are reported.
    ///
    /// # Errors
    ///
    /// - `InvalidParam` when the event type does not exist for the target
    /// - `InvalidWindow` when a window target is unknown
    pub fn on(&self, target: EventTarget, event_type: EventType, handler: EventHandler) -> WmResult<()> {
        self.ensure_running()?;
        if let EventTarget::Window(id) = target {
            self.registry.read().require(id)?;
        }
        if let EventTarget::Stage(id) = target {
            self.stages.lock().require(id)?;
        }
        self.dispatcher.on(target, event_type, handler)?;

        if let (EventTarget::Window(id), EventType::AvoidAreaChange) = (target, event_type) {
            for area_type in AvoidAreaType::ALL {
                let area = self.avoid_area(id, area_type)?;
                self.layout.lock().diff_reported(id, area_type, area);
            }
        }
        Ok(())
    }

    /// Unsubscribe one handler, or all of them when `handler` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` when the event type does not exist for the target.
    pub fn off(&self, target: EventTarget, event_type: EventType, handler: Option<&EventHandler>) -> WmResult<()> {
        self.dispatcher.off(target, event_type, handler)
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &EventDispatcher { &self.dispatcher }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The default display.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` when no display exists.
    pub fn default_display(&self) -> WmResult<Display> {
        self.topology
            .read()
            .default_display()
            .ok_or_else(|| WmError::InvalidScreen("no default display".to_string()))
    }

    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown displays.
    pub fn display(&self, id: DisplayId) -> WmResult<Display> { self.topology.read().require_display(id) }

    #[must_use]
    pub fn all_displays(&self) -> Vec<Display> { self.topology.read().all_displays() }

    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown or destroyed screens.
    pub fn screen(&self, id: ScreenId) -> WmResult<Screen> { self.topology.read().require_screen(id) }

    #[must_use]
    pub fn all_screens(&self) -> Vec<Screen> { self.topology.read().all_screens() }

    #[must_use]
    pub fn is_rotation_locked(&self) -> bool { self.topology.read().is_rotation_locked() }

    #[must_use]
    pub fn window_layout_mode(&self) -> WindowLayoutMode { self.layout.lock().layout_mode() }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub fn window(&self, id: WindowId) -> WmResult<Window> { self.registry.read().require(id) }

    /// Find a live window by name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` when no live window has that name.
    pub fn find_window(&self, name: &str) -> WmResult<Window> { self.registry.read().find(name) }

    #[must_use]
    pub fn all_windows(&self) -> Vec<Window> { self.registry.read().all_windows() }

    /// Windows of a display from bottom to top.
    #[must_use]
    pub fn windows_on_display(&self, display_id: DisplayId) -> Vec<Window> {
        self.registry.read().windows_on_display(display_id)
    }

    /// The focused window of a display.
    #[must_use]
    pub fn top_window(&self, display_id: DisplayId) -> Option<Window> {
        self.registry.read().top_window(display_id)
    }

    /// # Errors
    ///
    /// Returns `InvalidParam` for unknown stages.
    pub fn stage(&self, id: StageId) -> WmResult<WindowStage> { self.stages.lock().require(id).cloned() }

    #[must_use]
    pub fn all_stages(&self) -> Vec<WindowStage> { self.stages.lock().all().cloned().collect() }

    /// Live sub-windows of a stage in creation order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for unknown stages.
    pub fn stage_sub_windows(&self, id: StageId) -> WmResult<Vec<Window>> {
        let stage = self.stage(id)?;
        let registry = self.registry.read();
        Ok(stage.sub_windows.iter().filter_map(|w| registry.get_window(*w)).collect())
    }

    /// The avoid area of a window, served from the per-display cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows.
    pub fn avoid_area(&self, window_id: WindowId, area_type: AvoidAreaType) -> WmResult<AvoidArea> {
        let topology = self.topology.read();
        let registry = self.registry.read();
        let window = registry.require(window_id)?;
        let Some(display) = topology.get_display(window.display_id) else {
            return Ok(AvoidArea::default());
        };
        let stack = registry.windows_on_display(display.id);
        Ok(self.layout.lock().avoid_area(&window, &display, &stack, area_type))
    }
}

impl std::fmt::Debug for WindowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowManager")
            .field("displays", &self.topology.read().displays.len())
            .field("windows", &self.registry.read().len())
            .field("dispatcher", &self.dispatcher)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::wm::state::WindowType;

    fn manager() -> Arc<WindowManager> {
        WindowManager::from_config(&CasementConfig::default(), Collaborators::in_process(["system_window"]))
            .unwrap()
    }

    #[test]
    fn test_from_config_creates_default_display_and_system_ui() {
        let wm = manager();
        let display = wm.default_display().unwrap();
        assert_eq!((display.width, display.height), (1080.0, 2340.0));

        let windows = wm.windows_on_display(display.id);
        assert_eq!(windows.len(), 4);
        let status = windows.iter().find(|w| w.window_type == WindowType::StatusBar).unwrap();
        assert_eq!(status.frame, Rect::new(0.0, 0.0, 1080.0, 96.0));
        assert!(wm.top_window(display.id).is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = CasementConfig { screens: Vec::new(), ..CasementConfig::default() };
        let result = WindowManager::from_config(&config, Collaborators::in_process(["system_window"]));
        assert!(matches!(result, Err(WmError::Config(_))));
    }

    #[test]
    fn test_shutdown_once() {
        let wm = manager();
        wm.shutdown().unwrap();
        assert!(matches!(wm.shutdown(), Err(WmError::RepeatOperation(_))));
        let spec = WindowSpec::new("late", WindowType::App, 0);
        assert!(matches!(wm.create_window(spec), Err(WmError::SystemAbnormally(_))));
    }

    #[test]
    fn test_bare_manager_has_no_display() {
        let wm = WindowManager::bare(Collaborators::in_process(Vec::<String>::new()));
        assert!(matches!(wm.default_display(), Err(WmError::InvalidScreen(_))));
        assert!(wm.all_windows().is_empty());
    }
}
