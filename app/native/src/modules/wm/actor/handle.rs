//! Handle for communicating with the service actor.
//!
//! [`ServiceHandle`] is the asynchronous view of the window manager. Each call
//! becomes one message; results come back over a oneshot channel and channel
//! failures surface as `SystemAbnormally`.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::messages::{Reply, ServiceMessage};
use crate::error::{WmError, WmResult};
use crate::modules::wm::collaborators::PixelBuffer;
use crate::modules::wm::stage::DestroyMode;
use crate::modules::wm::state::{
    AppWindowToggle, AvoidArea, AvoidAreaType, Display, DisplayId, ExpandOption, GroupId,
    Orientation, PropertyChange, Rect, RemoteToken, Rotation, Screen, ScreenId, StageId,
    TopologyChange, VirtualScreenOption, Window, WindowId, WindowLayoutMode, WindowMode, WindowSpec,
};

/// Error types for actor communication.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// Failed to send message to actor.
    #[error("Failed to send message to actor: channel closed")]
    SendFailed,

    /// Failed to receive response from actor.
    #[error("Failed to receive response from actor: channel closed")]
    ReceiveFailed,

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<ActorError> for WmError {
    fn from(err: ActorError) -> Self { Self::SystemAbnormally(err.to_string()) }
}

/// Handle for communicating with the service actor.
///
/// Cheap to clone and shareable across tasks.
#[derive(Clone)]
pub struct ServiceHandle {
    sender: mpsc::Sender<ServiceMessage>,
}

impl ServiceHandle {
    pub(crate) const fn new(sender: mpsc::Sender<ServiceMessage>) -> Self { Self { sender } }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send a message without waiting for it to be handled.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the channel is closed or full.
    pub fn send(&self, msg: ServiceMessage) -> Result<(), ActorError> {
        self.sender.try_send(msg).map_err(|_| ActorError::SendFailed)
    }

    /// Send a message, waiting for buffer space.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the channel is closed.
    pub async fn send_async(&self, msg: ServiceMessage) -> Result<(), ActorError> {
        self.sender.send(msg).await.map_err(|_| ActorError::SendFailed)
    }

    /// Send a message built around a response channel and wait for the reply.
    async fn call<T, F>(&self, build: F) -> Result<T, ActorError>
    where F: FnOnce(oneshot::Sender<T>) -> ServiceMessage {
        let (tx, rx) = oneshot::channel();
        self.send_async(build(tx)).await?;
        rx.await.map_err(|_| ActorError::ReceiveFailed)
    }

    async fn request<T, F>(&self, build: F) -> WmResult<T>
    where F: FnOnce(Reply<T>) -> ServiceMessage {
        self.call(build).await?
    }

    /// Run a request with a timeout.
    ///
    /// # Errors
    ///
    /// Returns `SystemAbnormally` when the request does not complete in time,
    /// or any error of the request itself.
    pub async fn request_timeout<T, F>(&self, build: F, timeout: Duration) -> WmResult<T>
    where F: FnOnce(Reply<T>) -> ServiceMessage {
        tokio::time::timeout(timeout, self.request(build))
            .await
            .map_err(|_| WmError::from(ActorError::Timeout(timeout)))?
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The default display, read from the same store as
    /// [`crate::modules::wm::WindowManager::default_display`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` when no display exists.
    pub async fn get_default_display(&self) -> WmResult<Display> {
        self.request(|respond_to| ServiceMessage::GetDefaultDisplay { respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `SystemAbnormally` if the actor is gone.
    pub async fn get_all_displays(&self) -> WmResult<Vec<Display>> {
        self.request(|respond_to| ServiceMessage::GetAllDisplays { respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `SystemAbnormally` if the actor is gone.
    pub async fn get_all_screens(&self) -> WmResult<Vec<Screen>> {
        self.request(|respond_to| ServiceMessage::GetAllScreens { respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub async fn get_window(&self, id: WindowId) -> WmResult<Window> {
        self.request(|respond_to| ServiceMessage::GetWindow { id, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` when no live window has that name.
    pub async fn find_window(&self, name: &str) -> WmResult<Window> {
        let name = name.to_string();
        self.request(|respond_to| ServiceMessage::FindWindow { name, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `SystemAbnormally` if the actor is gone.
    pub async fn get_top_window(&self, display_id: DisplayId) -> WmResult<Option<Window>> {
        self.request(|respond_to| ServiceMessage::GetTopWindow { display_id, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows.
    pub async fn get_avoid_area(&self, window_id: WindowId, area_type: AvoidAreaType) -> WmResult<AvoidArea> {
        self.request(|respond_to| ServiceMessage::GetAvoidArea { window_id, area_type, respond_to })
            .await
    }

    /// # Errors
    ///
    /// Returns `InvalidParam` when the group does not exist.
    pub async fn get_expand_bounds(&self, group_id: GroupId) -> WmResult<Rect> {
        self.request(|respond_to| ServiceMessage::GetExpandBounds { group_id, respond_to }).await
    }

    // ========================================================================
    // Windows
    // ========================================================================

    /// # Errors
    ///
    /// See [`crate::modules::wm::WindowManager::create_window`].
    pub async fn create_window(&self, spec: WindowSpec) -> WmResult<Window> {
        self.request(|respond_to| ServiceMessage::CreateWindow { spec, respond_to }).await
    }

    /// # Errors
    ///
    /// See [`crate::modules::wm::WindowManager::create_stage`].
    pub async fn create_stage(
        &self,
        ability_name: &str,
        main_window_name: &str,
        display_id: DisplayId,
    ) -> WmResult<StageId> {
        let ability_name = ability_name.to_string();
        let main_window_name = main_window_name.to_string();
        self.request(|respond_to| ServiceMessage::CreateStage {
            ability_name,
            main_window_name,
            display_id,
            respond_to,
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub async fn show_window(&self, id: WindowId) -> WmResult<()> {
        self.request(|respond_to| ServiceMessage::ShowWindow { id, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown or destroyed windows.
    pub async fn hide_window(&self, id: WindowId) -> WmResult<()> {
        self.request(|respond_to| ServiceMessage::HideWindow { id, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and on a second destroy.
    pub async fn destroy_window(&self, id: WindowId) -> WmResult<()> {
        self.request(|respond_to| ServiceMessage::DestroyWindow { id, respond_to }).await
    }

    /// # Errors
    ///
    /// See [`crate::modules::wm::WindowManager::destroy_stage`].
    pub async fn destroy_stage(&self, id: StageId, mode: DestroyMode) -> WmResult<()> {
        self.request(|respond_to| ServiceMessage::DestroyStage { id, mode, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for an empty or non-finite rect.
    pub async fn set_window_frame(&self, id: WindowId, frame: Rect) -> WmResult<()> {
        self.request(|respond_to| ServiceMessage::SetWindowFrame { id, frame, respond_to }).await
    }

    /// # Errors
    ///
    /// See [`crate::modules::wm::WindowManager::set_window_mode`].
    pub async fn set_window_mode(&self, id: WindowId, mode: WindowMode) -> WmResult<bool> {
        self.request(|respond_to| ServiceMessage::SetWindowMode { id, mode, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `NoPermission` without the `system_window` capability.
    pub async fn set_window_layout_mode(&self, mode: WindowLayoutMode) -> WmResult<()> {
        self.request(|respond_to| ServiceMessage::SetWindowLayoutMode { mode, respond_to }).await
    }

    /// # Errors
    ///
    /// See [`crate::modules::wm::WindowManager::minimize_all`].
    pub async fn minimize_all(&self, display_id: DisplayId) -> WmResult<usize> {
        self.request(|respond_to| ServiceMessage::MinimizeAll { display_id, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `NoPermission` without the `system_window` capability.
    pub async fn toggle_app_windows(&self) -> WmResult<AppWindowToggle> {
        self.request(|respond_to| ServiceMessage::ToggleAppWindows { respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows and `InvalidParam` for bad values.
    pub async fn set_window_property(&self, id: WindowId, change: PropertyChange) -> WmResult<bool> {
        self.request(|respond_to| ServiceMessage::SetWindowProperty { id, change, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows or the loader's error.
    pub async fn load_content(&self, id: WindowId, path: &str, state: Option<&str>) -> WmResult<()> {
        let path = path.to_string();
        let state = state.map(str::to_string);
        self.request(|respond_to| ServiceMessage::LoadContent { id, path, state, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidWindow` for unknown windows.
    pub async fn set_preferred_orientation(&self, id: WindowId, orientation: Orientation) -> WmResult<()> {
        self.request(|respond_to| ServiceMessage::SetPreferredOrientation { id, orientation, respond_to })
            .await
    }

    /// Capture a window's contents.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotSupport` when the window cannot be captured.
    pub async fn snapshot(&self, id: WindowId) -> WmResult<PixelBuffer> {
        let pending = self.call(|respond_to| ServiceMessage::Snapshot { id, respond_to }).await?;
        pending.await
    }

    // ========================================================================
    // Screens
    // ========================================================================

    /// # Errors
    ///
    /// See [`crate::modules::wm::WindowManager::create_virtual_screen`].
    pub async fn create_virtual_screen(&self, option: VirtualScreenOption) -> WmResult<TopologyChange> {
        self.request(|respond_to| ServiceMessage::CreateVirtualScreen { option, respond_to }).await
    }

    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `DeviceNotSupport` for physical ones.
    pub async fn destroy_virtual_screen(&self, id: ScreenId) -> WmResult<TopologyChange> {
        self.request(|respond_to| ServiceMessage::DestroyVirtualScreen { id, respond_to }).await
    }

    /// # Errors
    ///
    /// See [`crate::modules::wm::WindowManager::make_mirror`].
    pub async fn make_mirror(&self, main: ScreenId, mirrors: &[ScreenId]) -> WmResult<GroupId> {
        let mirrors = mirrors.to_vec();
        self.request(|respond_to| ServiceMessage::MakeMirror { main, mirrors, respond_to }).await
    }

    /// # Errors
    ///
    /// See [`crate::modules::wm::WindowManager::make_expand`].
    pub async fn make_expand(&self, options: &[ExpandOption]) -> WmResult<GroupId> {
        let options = options.to_vec();
        self.request(|respond_to| ServiceMessage::MakeExpand { options, respond_to }).await
    }

    /// Switch a screen's mode; resolves once the actor has committed the switch.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for unsupported modes, `StateAbnormally` while
    /// another switch is in flight and `DeviceNotSupport` when the screen goes away.
    pub async fn set_active_mode(&self, id: ScreenId, mode_index: usize) -> WmResult<TopologyChange> {
        let pending = self.call(|respond_to| ServiceMessage::SetActiveMode { id, mode_index, respond_to }).await?;
        pending.await
    }

    /// # Errors
    ///
    /// Returns `SystemAbnormally` if the actor is gone.
    pub async fn set_rotation_locked(&self, locked: bool) -> WmResult<()> {
        self.request(|respond_to| ServiceMessage::SetRotationLocked { locked, respond_to }).await
    }

    // ========================================================================
    // Device notifications
    // ========================================================================

    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the actor is gone.
    pub fn report_sensor_rotation(&self, rotation: Rotation) -> Result<(), ActorError> {
        self.send(ServiceMessage::SensorRotation { rotation })
    }

    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the actor is gone.
    pub fn report_keyboard_height(&self, display_id: DisplayId, height: f64) -> Result<(), ActorError> {
        self.send(ServiceMessage::KeyboardHeight { display_id, height })
    }

    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the actor is gone.
    pub fn report_screenshot(&self, display_id: DisplayId) -> Result<(), ActorError> {
        self.send(ServiceMessage::Screenshot { display_id })
    }

    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the actor is gone.
    pub fn report_remote_died(&self, token: RemoteToken) -> Result<(), ActorError> {
        self.send(ServiceMessage::RemoteDied { token })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop the actor's message loop. The manager itself stays alive.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the actor is already gone.
    pub async fn stop(&self) -> Result<(), ActorError> { self.send_async(ServiceMessage::Shutdown).await }

    /// Check if the actor is still running (channel is open).
    #[must_use]
    pub fn is_alive(&self) -> bool { !self.sender.is_closed() }

    /// Get the number of messages waiting in the queue.
    #[must_use]
    pub fn pending_messages(&self) -> usize { self.sender.max_capacity() - self.sender.capacity() }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("alive", &self.is_alive())
            .field("pending", &self.pending_messages())
            .finish()
    }
}
