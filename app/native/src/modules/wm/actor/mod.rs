//! Service actor.
//!
//! The actor owns an `Arc<WindowManager>` and handles requests one at a time,
//! giving asynchronous callers a serialized view of the service. After every
//! message it flushes deferred work, so a queued mode switch commits before
//! the next request is looked at.
//!
//! # Panic Recovery
//!
//! A panic inside a handler is caught and logged; the caller sees its reply
//! channel close (`SystemAbnormally`) and the actor keeps processing.

mod handle;
mod messages;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

pub use handle::{ActorError, ServiceHandle};
pub use messages::{Reply, ServiceMessage};
use tokio::sync::mpsc;

use super::manager::WindowManager;

/// Channel buffer size for the service actor.
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Reply to a request, logging when the caller has gone away.
fn respond<T>(respond_to: tokio::sync::oneshot::Sender<T>, value: T, msg_name: &str) {
    if respond_to.send(value).is_err() {
        tracing::warn!(message = msg_name, "caller dropped before the reply");
    }
}

/// The actor that serializes requests to the window manager.
pub struct ServiceActor {
    manager: Arc<WindowManager>,
    receiver: mpsc::Receiver<ServiceMessage>,
}

impl ServiceActor {
    /// Spawn the actor on the current tokio runtime and return its handle.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(manager: Arc<WindowManager>) -> ServiceHandle {
        tracing::debug!("spawning service actor");
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let actor = Self { manager, receiver };
        tokio::spawn(async move {
            actor.run().await;
        });

        ServiceHandle::new(sender)
    }

    async fn run(mut self) {
        tracing::trace!("service actor message loop starting");

        while let Some(msg) = self.receiver.recv().await {
            if matches!(msg, ServiceMessage::Shutdown) {
                tracing::debug!("service actor received shutdown message");
                return;
            }

            let msg_name = msg.name();
            let result = catch_unwind(AssertUnwindSafe(|| {
                self.handle_message(msg);
                self.flush_deferred();
            }));

            if let Err(panic_info) = result {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());

                tracing::error!(message = msg_name, panic = %panic_msg, "service actor recovered from panic");
            }
        }

        tracing::debug!("service actor channel closed, exiting");
    }

    fn flush_deferred(&self) {
        if self.manager.is_shut_down() {
            return;
        }
        match self.manager.flush_pending_modes() {
            Ok(0) => {}
            Ok(count) => tracing::debug!(count, "mode switches committed"),
            Err(err) => tracing::warn!(%err, "failed to commit mode switches"),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn handle_message(&self, msg: ServiceMessage) {
        let wm = &self.manager;
        let name = msg.name();
        match msg {
            // Queries
            ServiceMessage::GetDefaultDisplay { respond_to } => {
                respond(respond_to, wm.default_display(), name);
            }
            ServiceMessage::GetAllDisplays { respond_to } => respond(respond_to, Ok(wm.all_displays()), name),
            ServiceMessage::GetAllScreens { respond_to } => respond(respond_to, Ok(wm.all_screens()), name),
            ServiceMessage::GetWindow { id, respond_to } => respond(respond_to, wm.window(id), name),
            ServiceMessage::FindWindow { name: window_name, respond_to } => {
                respond(respond_to, wm.find_window(&window_name), name);
            }
            ServiceMessage::GetTopWindow { display_id, respond_to } => {
                respond(respond_to, Ok(wm.top_window(display_id)), name);
            }
            ServiceMessage::GetAvoidArea { window_id, area_type, respond_to } => {
                respond(respond_to, wm.avoid_area(window_id, area_type), name);
            }
            ServiceMessage::GetExpandBounds { group_id, respond_to } => {
                respond(respond_to, wm.expand_bounds(group_id), name);
            }

            // Windows
            ServiceMessage::CreateWindow { spec, respond_to } => {
                respond(respond_to, wm.create_window(spec), name);
            }
            ServiceMessage::CreateStage {
                ability_name,
                main_window_name,
                display_id,
                respond_to,
            } => {
                respond(respond_to, wm.create_stage(&ability_name, &main_window_name, display_id), name);
            }
            ServiceMessage::ShowWindow { id, respond_to } => respond(respond_to, wm.show_window(id), name),
            ServiceMessage::HideWindow { id, respond_to } => respond(respond_to, wm.hide_window(id), name),
            ServiceMessage::DestroyWindow { id, respond_to } => {
                respond(respond_to, wm.destroy_window(id), name);
            }
            ServiceMessage::DestroyStage { id, mode, respond_to } => {
                respond(respond_to, wm.destroy_stage(id, mode), name);
            }
            ServiceMessage::SetWindowFrame { id, frame, respond_to } => {
                respond(respond_to, wm.set_window_frame(id, frame), name);
            }
            ServiceMessage::SetWindowMode { id, mode, respond_to } => {
                respond(respond_to, wm.set_window_mode(id, mode), name);
            }
            ServiceMessage::SetWindowLayoutMode { mode, respond_to } => {
                respond(respond_to, wm.set_window_layout_mode(mode), name);
            }
            ServiceMessage::MinimizeAll { display_id, respond_to } => {
                respond(respond_to, wm.minimize_all(display_id), name);
            }
            ServiceMessage::ToggleAppWindows { respond_to } => {
                respond(respond_to, wm.toggle_shown_state_for_all_app_windows(), name);
            }
            ServiceMessage::SetWindowProperty { id, change, respond_to } => {
                respond(respond_to, wm.set_window_property(id, change), name);
            }
            ServiceMessage::LoadContent { id, path, state, respond_to } => {
                respond(respond_to, wm.load_content(id, &path, state.as_deref()), name);
            }
            ServiceMessage::SetPreferredOrientation { id, orientation, respond_to } => {
                respond(respond_to, wm.set_preferred_orientation(id, orientation), name);
            }
            ServiceMessage::Snapshot { id, respond_to } => respond(respond_to, wm.snapshot(id), name),

            // Screens
            ServiceMessage::CreateVirtualScreen { option, respond_to } => {
                respond(respond_to, wm.create_virtual_screen(&option), name);
            }
            ServiceMessage::DestroyVirtualScreen { id, respond_to } => {
                respond(respond_to, wm.destroy_virtual_screen(id), name);
            }
            ServiceMessage::MakeMirror { main, mirrors, respond_to } => {
                respond(respond_to, wm.make_mirror(main, &mirrors), name);
            }
            ServiceMessage::MakeExpand { options, respond_to } => {
                respond(respond_to, wm.make_expand(&options), name);
            }
            ServiceMessage::SetActiveMode { id, mode_index, respond_to } => {
                respond(respond_to, wm.request_active_mode(id, mode_index), name);
            }
            ServiceMessage::SetRotationLocked { locked, respond_to } => {
                respond(respond_to, wm.set_rotation_locked(locked), name);
            }

            // Device notifications
            ServiceMessage::SensorRotation { rotation } => {
                if let Err(err) = wm.report_sensor_rotation(rotation) {
                    tracing::warn!(%err, ?rotation, "sensor rotation dropped");
                }
            }
            ServiceMessage::KeyboardHeight { display_id, height } => {
                if let Err(err) = wm.set_keyboard_height(display_id, height) {
                    tracing::warn!(%err, display_id, height, "keyboard height dropped");
                }
            }
            ServiceMessage::Screenshot { display_id } => {
                if let Err(err) = wm.notify_screenshot(display_id) {
                    tracing::warn!(%err, display_id, "screenshot notification dropped");
                }
            }
            ServiceMessage::RemoteDied { token } => match wm.notify_remote_died(token) {
                Ok(count) => tracing::debug!(token = token.0, count, "remote death delivered"),
                Err(err) => tracing::warn!(%err, token = token.0, "remote death dropped"),
            },

            // Shutdown handled in run()
            ServiceMessage::Shutdown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::CasementConfig;
    use crate::error::WmError;
    use crate::modules::wm::manager::Collaborators;
    use crate::modules::wm::state::{
        AppWindowToggle, AvoidAreaType, RemoteToken, VirtualScreenOption, WindowLayoutMode,
        WindowMode, WindowSpec, WindowType,
    };

    fn manager() -> Arc<WindowManager> {
        WindowManager::from_config(&CasementConfig::default(), Collaborators::in_process(["system_window"]))
            .unwrap()
    }

    #[tokio::test]
    async fn test_async_and_sync_default_display_agree() {
        let wm = manager();
        let handle = ServiceActor::spawn(Arc::clone(&wm));
        assert_eq!(handle.get_default_display().await.unwrap(), wm.default_display().unwrap());
    }

    #[tokio::test]
    async fn test_window_round_trip_through_actor() {
        let wm = manager();
        let handle = ServiceActor::spawn(Arc::clone(&wm));

        let window = handle.create_window(WindowSpec::new("main", WindowType::App, 0)).await.unwrap();
        handle.show_window(window.id).await.unwrap();
        assert_eq!(handle.get_top_window(0).await.unwrap().map(|w| w.id), Some(window.id));

        let first = handle.get_avoid_area(window.id, AvoidAreaType::System).await.unwrap();
        let second = handle.get_avoid_area(window.id, AvoidAreaType::System).await.unwrap();
        assert_eq!(first, second);

        handle.destroy_window(window.id).await.unwrap();
        assert!(matches!(handle.destroy_window(window.id).await, Err(WmError::InvalidWindow(_))));
    }

    #[tokio::test]
    async fn test_mode_switch_commits_after_request() {
        let wm = manager();
        let handle = ServiceActor::spawn(Arc::clone(&wm));

        let change = handle.set_active_mode(0, 1).await.unwrap();
        assert!(change.displays.contains(&0));
        assert_eq!(wm.default_display().unwrap().width, 720.0);
        assert!(matches!(handle.set_active_mode(0, 7).await, Err(WmError::InvalidParam(_))));
    }

    #[tokio::test]
    async fn test_arrangement_through_actor() {
        let wm = manager();
        let handle = ServiceActor::spawn(Arc::clone(&wm));
        let window = handle.create_window(WindowSpec::new("main", WindowType::App, 0)).await.unwrap();
        handle.show_window(window.id).await.unwrap();

        assert!(handle.set_window_mode(window.id, WindowMode::SplitPrimary).await.unwrap());
        handle.set_window_layout_mode(WindowLayoutMode::Tile).await.unwrap();
        assert_eq!(wm.window_layout_mode(), WindowLayoutMode::Tile);
        assert_eq!(
            handle.toggle_app_windows().await.unwrap(),
            AppWindowToggle::Hidden(vec![window.id])
        );
        assert_eq!(handle.minimize_all(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expand_through_actor() {
        let handle = ServiceActor::spawn(manager());
        let option = |name: &str| VirtualScreenOption {
            name: name.to_string(),
            width: 800,
            height: 600,
            density: 1.0,
            surface: None,
        };
        let (left, _) = handle.create_virtual_screen(option("left")).await.unwrap().added.unwrap();
        let (right, _) = handle.create_virtual_screen(option("right")).await.unwrap().added.unwrap();
        let group = handle
            .make_expand(&[
                crate::modules::wm::state::ExpandOption { screen_id: left, start_x: 0.0, start_y: 0.0 },
                crate::modules::wm::state::ExpandOption { screen_id: right, start_x: 800.0, start_y: 0.0 },
            ])
            .await
            .unwrap();
        assert_eq!(handle.get_expand_bounds(group).await.unwrap().width, 1600.0);
    }

    #[tokio::test]
    async fn test_remote_death_notification() {
        let wm = manager();
        let handle = ServiceActor::spawn(Arc::clone(&wm));
        let dialog = handle.create_window(WindowSpec::new("dialog", WindowType::Dialog, 0)).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        wm.bind_dialog_target(
            dialog.id,
            RemoteToken(5),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        handle.report_remote_died(RemoteToken(5)).unwrap();
        handle.report_remote_died(RemoteToken(5)).unwrap();
        // A request after the notifications observes them.
        handle.get_all_displays().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_closes_handle() {
        let handle = ServiceActor::spawn(manager());
        handle.stop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_alive());
        assert!(matches!(handle.get_all_screens().await, Err(WmError::SystemAbnormally(_))));
    }
}
