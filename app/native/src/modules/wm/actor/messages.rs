//! Message types for the service actor.
//!
//! Requests carry a oneshot `respond_to` channel; notifications from the
//! device side are fire-and-forget.

use tokio::sync::oneshot;

use crate::error::WmResult;
use crate::modules::wm::collaborators::PixelBuffer;
use crate::modules::wm::pending::PendingOperation;
use crate::modules::wm::stage::DestroyMode;
use crate::modules::wm::state::{
    AppWindowToggle, AvoidArea, AvoidAreaType, Display, DisplayId, ExpandOption, GroupId,
    Orientation, PropertyChange, Rect, RemoteToken, Rotation, Screen, ScreenId, StageId,
    TopologyChange, VirtualScreenOption, Window, WindowId, WindowLayoutMode, WindowMode, WindowSpec,
};

/// Response channel of a request.
pub type Reply<T> = oneshot::Sender<WmResult<T>>;

/// Messages sent to the service actor.
#[derive(Debug)]
pub enum ServiceMessage {
    // ════════════════════════════════════════════════════════════════════════
    // Queries
    // ════════════════════════════════════════════════════════════════════════
    GetDefaultDisplay { respond_to: Reply<Display> },
    GetAllDisplays { respond_to: Reply<Vec<Display>> },
    GetAllScreens { respond_to: Reply<Vec<Screen>> },
    GetWindow { id: WindowId, respond_to: Reply<Window> },
    FindWindow { name: String, respond_to: Reply<Window> },
    GetTopWindow { display_id: DisplayId, respond_to: Reply<Option<Window>> },
    GetAvoidArea {
        window_id: WindowId,
        area_type: AvoidAreaType,
        respond_to: Reply<AvoidArea>,
    },
    GetExpandBounds { group_id: GroupId, respond_to: Reply<Rect> },

    // ════════════════════════════════════════════════════════════════════════
    // Window commands
    // ════════════════════════════════════════════════════════════════════════
    CreateWindow { spec: WindowSpec, respond_to: Reply<Window> },
    CreateStage {
        ability_name: String,
        main_window_name: String,
        display_id: DisplayId,
        respond_to: Reply<StageId>,
    },
    ShowWindow { id: WindowId, respond_to: Reply<()> },
    HideWindow { id: WindowId, respond_to: Reply<()> },
    DestroyWindow { id: WindowId, respond_to: Reply<()> },
    DestroyStage {
        id: StageId,
        mode: DestroyMode,
        respond_to: Reply<()>,
    },
    SetWindowFrame { id: WindowId, frame: Rect, respond_to: Reply<()> },
    SetWindowMode { id: WindowId, mode: WindowMode, respond_to: Reply<bool> },
    SetWindowLayoutMode { mode: WindowLayoutMode, respond_to: Reply<()> },
    MinimizeAll { display_id: DisplayId, respond_to: Reply<usize> },
    ToggleAppWindows { respond_to: Reply<AppWindowToggle> },
    SetWindowProperty {
        id: WindowId,
        change: PropertyChange,
        respond_to: Reply<bool>,
    },
    LoadContent {
        id: WindowId,
        path: String,
        state: Option<String>,
        respond_to: Reply<()>,
    },
    SetPreferredOrientation {
        id: WindowId,
        orientation: Orientation,
        respond_to: Reply<()>,
    },
    Snapshot { id: WindowId, respond_to: oneshot::Sender<PendingOperation<PixelBuffer>> },

    // ════════════════════════════════════════════════════════════════════════
    // Screen commands
    // ════════════════════════════════════════════════════════════════════════
    CreateVirtualScreen {
        option: VirtualScreenOption,
        respond_to: Reply<TopologyChange>,
    },
    DestroyVirtualScreen { id: ScreenId, respond_to: Reply<TopologyChange> },
    MakeMirror {
        main: ScreenId,
        mirrors: Vec<ScreenId>,
        respond_to: Reply<GroupId>,
    },
    MakeExpand { options: Vec<ExpandOption>, respond_to: Reply<GroupId> },
    SetActiveMode {
        id: ScreenId,
        mode_index: usize,
        respond_to: oneshot::Sender<PendingOperation<TopologyChange>>,
    },
    SetRotationLocked { locked: bool, respond_to: Reply<()> },

    // ════════════════════════════════════════════════════════════════════════
    // Device notifications
    // ════════════════════════════════════════════════════════════════════════
    SensorRotation { rotation: Rotation },
    KeyboardHeight { display_id: DisplayId, height: f64 },
    Screenshot { display_id: DisplayId },
    RemoteDied { token: RemoteToken },

    // ════════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ════════════════════════════════════════════════════════════════════════
    /// Stop the message loop.
    Shutdown,
}

impl ServiceMessage {
    /// Name of the message, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetDefaultDisplay { .. } => "GetDefaultDisplay",
            Self::GetAllDisplays { .. } => "GetAllDisplays",
            Self::GetAllScreens { .. } => "GetAllScreens",
            Self::GetWindow { .. } => "GetWindow",
            Self::FindWindow { .. } => "FindWindow",
            Self::GetTopWindow { .. } => "GetTopWindow",
            Self::GetAvoidArea { .. } => "GetAvoidArea",
            Self::GetExpandBounds { .. } => "GetExpandBounds",

            Self::CreateWindow { .. } => "CreateWindow",
            Self::CreateStage { .. } => "CreateStage",
            Self::ShowWindow { .. } => "ShowWindow",
            Self::HideWindow { .. } => "HideWindow",
            Self::DestroyWindow { .. } => "DestroyWindow",
            Self::DestroyStage { .. } => "DestroyStage",
            Self::SetWindowFrame { .. } => "SetWindowFrame",
            Self::SetWindowMode { .. } => "SetWindowMode",
            Self::SetWindowLayoutMode { .. } => "SetWindowLayoutMode",
            Self::MinimizeAll { .. } => "MinimizeAll",
            Self::ToggleAppWindows { .. } => "ToggleAppWindows",
            Self::SetWindowProperty { .. } => "SetWindowProperty",
            Self::LoadContent { .. } => "LoadContent",
            Self::SetPreferredOrientation { .. } => "SetPreferredOrientation",
            Self::Snapshot { .. } => "Snapshot",

            Self::CreateVirtualScreen { .. } => "CreateVirtualScreen",
            Self::DestroyVirtualScreen { .. } => "DestroyVirtualScreen",
            Self::MakeMirror { .. } => "MakeMirror",
            Self::MakeExpand { .. } => "MakeExpand",
            Self::SetActiveMode { .. } => "SetActiveMode",
            Self::SetRotationLocked { .. } => "SetRotationLocked",

            Self::SensorRotation { .. } => "SensorRotation",
            Self::KeyboardHeight { .. } => "KeyboardHeight",
            Self::Screenshot { .. } => "Screenshot",
            Self::RemoteDied { .. } => "RemoteDied",

            Self::Shutdown => "Shutdown",
        }
    }
}
