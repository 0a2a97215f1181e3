//! State types and stores for the window/display manager.
//!
//! Two stores hold all mutable state:
//! - [`TopologyStore`] for screens, displays and their groups
//! - [`WindowRegistry`] for windows and dialog death-links
//!
//! Both are plain data owned by the service core, which wraps them in locks.

mod registry;
mod topology;
mod types;

pub use registry::{
    DeathCallback, FocusChange, PropertyChange, RemoteToken, WindowRegistry, WindowSpec,
    is_hex_color,
};
pub use topology::{
    ExpandGroup, ExpandOption, MirrorGroup, PIXEL_RATIO_RANGE, TopologyChange, TopologyStore,
    VirtualScreenOption,
};
pub use types::{
    AppWindowToggle, AvoidArea, AvoidAreaType, ColorSpace, Display, DisplayId, DisplayState, GroupId, Orientation,
    Rect, Rotation, Screen, ScreenId, ScreenKind, ScreenMode, ScreenOrientation, StageId,
    StageLifecycle, SurfaceId, Window, WindowId, WindowLayoutMode, WindowLifecycle, WindowMode,
    WindowProperties, WindowStage, WindowType,
};
