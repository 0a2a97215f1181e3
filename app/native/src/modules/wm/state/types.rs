//! Core state types for the window/display manager.
//!
//! These types form a relational structure:
//! - `Screen` represents a physical panel or a virtual screen
//! - `Display` is the logical surface backed by exactly one screen
//! - `Window` is a client window placed on a display
//!
//! Relations:
//! - `Display.screen_id` → `Screen.id`
//! - `Window.display_id` → `Display.id`
//! - `Window.parent_id` → `Window.id` (sub-windows)
//! - `Window.stage_id` → `WindowStage.id`

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

/// Identifier of a screen.
pub type ScreenId = u64;

/// Identifier of a display.
pub type DisplayId = u64;

/// Identifier of a window.
pub type WindowId = u32;

/// Identifier of a mirror or expand group.
pub type GroupId = u64;

/// Identifier of a window stage (UUID v7).
pub type StageId = Uuid;

/// Identifier of an external surface bound to a virtual screen.
pub type SurfaceId = u64;

// ============================================================================
// Geometry Types
// ============================================================================

/// A rectangle with position and size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Create a zero-sized rectangle at origin.
    #[must_use]
    pub const fn zero() -> Self { Self::new(0.0, 0.0, 0.0, 0.0) }

    /// Check if this rectangle has finite coordinates and a positive size.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 { self.x + self.width }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 { self.y + self.height }

    /// Check if this rectangle contains a point.
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Check if this rectangle intersects with another.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// The overlapping region of two rectangles, if they intersect.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.is_valid() || !other.is_valid() || !self.intersects(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Some(Self::new(x, y, right - x, bottom - y))
    }

    /// The smallest rectangle containing both rectangles.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if !self.is_valid() {
            return *other;
        }
        if !other.is_valid() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(x, y, right - x, bottom - y)
    }

    /// The rectangle moved by the given offset.
    #[must_use]
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Calculate the area of this rectangle.
    #[must_use]
    pub fn area(&self) -> f64 { self.width * self.height }

    /// Get the center point of this rectangle.
    #[must_use]
    pub fn center(&self) -> (f64, f64) { (self.x + self.width / 2.0, self.y + self.height / 2.0) }

    /// Check if two rectangles are approximately equal (within epsilon).
    #[must_use]
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() < epsilon
            && (self.y - other.y).abs() < epsilon
            && (self.width - other.width).abs() < epsilon
            && (self.height - other.height).abs() < epsilon
    }
}

/// Rotation of a display relative to its panel's natural orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Clockwise angle in degrees.
    #[must_use]
    pub const fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Parses a clockwise angle; only multiples of 90 are accepted.
    #[must_use]
    pub const fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    /// True for 90 and 270 degrees, where width and height swap.
    #[must_use]
    pub const fn is_quarter_turn(self) -> bool { matches!(self, Self::Deg90 | Self::Deg270) }

    /// Rotates a rectangle expressed in a `width x height` natural frame.
    #[must_use]
    pub fn rotate_rect(self, rect: &Rect, width: f64, height: f64) -> Rect {
        match self {
            Self::Deg0 => *rect,
            Self::Deg90 => Rect::new(height - rect.bottom(), rect.x, rect.height, rect.width),
            Self::Deg180 => {
                Rect::new(width - rect.right(), height - rect.bottom(), rect.width, rect.height)
            }
            Self::Deg270 => Rect::new(rect.y, width - rect.right(), rect.height, rect.width),
        }
    }
}

// ============================================================================
// Screen Types
// ============================================================================

/// A display mode (resolution and refresh rate).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
}

impl ScreenMode {
    #[must_use]
    pub const fn new(width: u32, height: u32, refresh_rate: u32) -> Self {
        Self { width, height, refresh_rate }
    }
}

/// Whether a screen is a physical panel or created by a client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenKind {
    #[default]
    Real,
    Virtual,
}

/// Orientation requested for a whole screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenOrientation {
    #[default]
    Unspecified,
    Vertical,
    Horizontal,
    ReverseVertical,
    ReverseHorizontal,
}

impl ScreenOrientation {
    /// Maps the orientation to a rotation for a panel of the given shape.
    ///
    /// Portrait panels are natural in `Vertical`, landscape panels in `Horizontal`.
    #[must_use]
    pub const fn rotation_for(self, portrait_panel: bool) -> Rotation {
        match (self, portrait_panel) {
            (Self::Unspecified, _) | (Self::Vertical, true) | (Self::Horizontal, false) => {
                Rotation::Deg0
            }
            (Self::Horizontal, true) | (Self::Vertical, false) => Rotation::Deg90,
            (Self::ReverseVertical, true) | (Self::ReverseHorizontal, false) => Rotation::Deg180,
            (Self::ReverseHorizontal, true) | (Self::ReverseVertical, false) => Rotation::Deg270,
        }
    }
}

/// A physical or virtual screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub id: ScreenId,

    /// Display name (e.g., "Built-in Panel").
    pub name: String,

    pub kind: ScreenKind,

    /// Supported modes; the first entry is the native mode.
    pub modes: SmallVec<[ScreenMode; 4]>,

    /// Index into `modes`.
    pub active_mode: usize,

    pub orientation: ScreenOrientation,

    pub rotation: Rotation,

    /// Logical density (virtual pixel ratio).
    pub virtual_pixel_ratio: f64,

    /// External surface backing a virtual screen.
    pub surface: Option<SurfaceId>,

    /// Cutout bounding rects in the natural orientation.
    pub cutouts: Vec<Rect>,

    pub mirror_group: Option<GroupId>,

    pub expand_group: Option<GroupId>,

    /// Origin inside the expand group's coordinate space.
    pub expand_origin: (f64, f64),
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            kind: ScreenKind::Real,
            modes: SmallVec::new(),
            active_mode: 0,
            orientation: ScreenOrientation::Unspecified,
            rotation: Rotation::Deg0,
            virtual_pixel_ratio: 1.0,
            surface: None,
            cutouts: Vec::new(),
            mirror_group: None,
            expand_group: None,
            expand_origin: (0.0, 0.0),
        }
    }
}

impl Screen {
    /// The active mode, if the screen has any.
    #[must_use]
    pub fn mode(&self) -> Option<&ScreenMode> { self.modes.get(self.active_mode) }

    #[must_use]
    pub const fn is_virtual(&self) -> bool { matches!(self.kind, ScreenKind::Virtual) }

    /// True when the active mode is taller than wide.
    #[must_use]
    pub fn is_portrait_panel(&self) -> bool { self.mode().is_some_and(|m| m.width < m.height) }

    /// Size of the active mode after rotation.
    #[must_use]
    pub fn rotated_size(&self) -> (f64, f64) {
        let Some(mode) = self.mode() else {
            return (0.0, 0.0);
        };
        let (w, h) = (f64::from(mode.width), f64::from(mode.height));
        if self.rotation.is_quarter_turn() { (h, w) } else { (w, h) }
    }
}

// ============================================================================
// Display Types
// ============================================================================

/// Power state of a display.
///
/// Any known state may follow any other; `Unknown` is never entered or left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayState {
    #[default]
    Unknown,
    Off,
    On,
    Doze,
    DozeSuspend,
    Vr,
    OnSuspend,
}

impl DisplayState {
    /// Whether `self -> next` is legal. Staying in the same state is legal and a no-op.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        !matches!(self, Self::Unknown) && !matches!(next, Self::Unknown)
    }
}

/// A logical display backed by exactly one screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Display {
    pub id: DisplayId,
    pub screen_id: ScreenId,
    pub name: String,

    /// Width after rotation.
    pub width: f64,

    /// Height after rotation.
    pub height: f64,

    pub rotation: Rotation,
    pub refresh_rate: u32,
    pub virtual_pixel_ratio: f64,

    /// `virtual_pixel_ratio * 160`.
    pub density_dpi: f64,

    /// Cutout bounding rects in the current rotation.
    pub cutouts: Vec<Rect>,

    pub state: DisplayState,

    /// False once the backing screen is gone.
    pub alive: bool,
}

impl Display {
    /// The display bounds at origin.
    #[must_use]
    pub const fn bounds(&self) -> Rect { Rect::new(0.0, 0.0, self.width, self.height) }
}

// ============================================================================
// Window Types
// ============================================================================

/// Closed set of window types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowType {
    #[default]
    App,
    SystemAlert,
    InputMethod,
    StatusBar,
    Panel,
    Keyguard,
    VolumeOverlay,
    NavigationBar,
    Dialog,
    SystemGesture,
}

impl WindowType {
    /// Stacking layer; higher layers are above lower ones.
    #[must_use]
    pub const fn layer(self) -> u8 {
        match self {
            Self::App => 0,
            Self::Dialog => 1,
            Self::Panel => 2,
            Self::InputMethod => 3,
            Self::StatusBar | Self::NavigationBar => 4,
            Self::VolumeOverlay => 5,
            Self::SystemAlert => 6,
            Self::SystemGesture => 7,
            Self::Keyguard => 8,
        }
    }

    /// Everything but `App` needs the system window capability.
    #[must_use]
    pub const fn is_system(self) -> bool { !matches!(self, Self::App) }

    /// Whether new windows of this type take focus by default.
    #[must_use]
    pub const fn default_focusable(self) -> bool {
        matches!(self, Self::App | Self::Dialog | Self::Panel | Self::SystemAlert | Self::Keyguard)
    }

    /// Returns the type name as a static kebab-case string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::SystemAlert => "system-alert",
            Self::InputMethod => "input-method",
            Self::StatusBar => "status-bar",
            Self::Panel => "panel",
            Self::Keyguard => "keyguard",
            Self::VolumeOverlay => "volume-overlay",
            Self::NavigationBar => "navigation-bar",
            Self::Dialog => "dialog",
            Self::SystemGesture => "system-gesture",
        }
    }
}

/// Lifecycle of a single window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowLifecycle {
    #[default]
    Created,
    Shown,
    Hidden,
    Destroyed,
}

/// Preferred orientation of a window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Unspecified,
    Portrait,
    Landscape,
    PortraitInverted,
    LandscapeInverted,
    AutoRotation,
    AutoRotationPortrait,
    AutoRotationLandscape,
    Locked,
}

impl Orientation {
    /// True for the variants that follow the rotation sensor.
    #[must_use]
    pub const fn follows_sensor(self) -> bool {
        matches!(self, Self::AutoRotation | Self::AutoRotationPortrait | Self::AutoRotationLandscape)
    }
}

/// Colour space of a window surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorSpace {
    #[default]
    Default,
    WideGamut,
}

/// How an app window is placed on its display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowMode {
    /// The display area left by the system bars.
    #[default]
    FullScreen,

    /// The requested frame, or a cascaded one when none was requested.
    Floating,

    /// The first half of the display along its long edge.
    SplitPrimary,

    /// The second half of the display along its long edge.
    SplitSecondary,
}

impl WindowMode {
    #[must_use]
    pub const fn is_split(self) -> bool { matches!(self, Self::SplitPrimary | Self::SplitSecondary) }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullScreen => "full-screen",
            Self::Floating => "floating",
            Self::SplitPrimary => "split-primary",
            Self::SplitSecondary => "split-secondary",
        }
    }
}

/// Placement policy for app windows on every display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowLayoutMode {
    /// Windows keep their own mode; new floating windows are cascaded.
    #[default]
    Cascade,

    /// Shown main app windows share the display side by side.
    Tile,
}

/// What a show/hide toggle over all app windows did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "action", content = "windows")]
pub enum AppWindowToggle {
    /// Shown main app windows were hidden, bottom to top.
    Hidden(Vec<WindowId>),

    /// Windows hidden by the previous toggle were shown again.
    Restored(Vec<WindowId>),

    /// Nothing was shown and nothing was left to restore.
    Unchanged,
}

/// Mutable window properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowProperties {
    pub full_screen: bool,
    pub layout_full_screen: bool,
    pub focusable: bool,
    pub touchable: bool,

    /// `-1.0` follows the system, otherwise `0.0..=1.0`.
    pub brightness: f64,

    /// `0.0..=1.0`.
    pub dim_behind: f64,

    pub keep_screen_on: bool,
    pub privacy_mode: bool,
    pub round_corner: bool,
    pub transparent: bool,

    /// `#RRGGBB` or `#AARRGGBB`.
    pub background_color: String,

    pub color_space: ColorSpace,

    /// Applied preferred orientation.
    pub preferred_orientation: Orientation,
}

impl Default for WindowProperties {
    fn default() -> Self {
        Self {
            full_screen: false,
            layout_full_screen: false,
            focusable: true,
            touchable: true,
            brightness: -1.0,
            dim_behind: 0.0,
            keep_screen_on: false,
            privacy_mode: false,
            round_corner: false,
            transparent: false,
            background_color: "#FFFFFFFF".to_string(),
            color_space: ColorSpace::Default,
            preferred_orientation: Orientation::Unspecified,
        }
    }
}

/// A tracked window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,

    /// Unique identity name among live windows.
    pub name: String,

    pub window_type: WindowType,
    pub display_id: DisplayId,
    pub parent_id: Option<WindowId>,
    pub stage_id: Option<StageId>,

    /// Frame requested by the client, if any.
    pub requested_frame: Option<Rect>,

    /// Effective frame computed by the layout engine.
    pub frame: Rect,

    pub lifecycle: WindowLifecycle,

    pub mode: WindowMode,

    /// Path of the loaded content.
    pub content: Option<String>,

    pub properties: WindowProperties,

    /// Orientation requested while rotation was locked.
    pub pending_orientation: Option<Orientation>,

    /// Whether this window is its display's top window.
    pub is_focused: bool,

    /// Monotonic show counter used for z-order within a layer.
    pub z_seq: u64,
}

impl Window {
    /// Create a new window with type defaults.
    #[must_use]
    pub fn new(id: WindowId, name: &str, window_type: WindowType, display_id: DisplayId) -> Self {
        Self {
            id,
            name: name.to_string(),
            window_type,
            display_id,
            parent_id: None,
            stage_id: None,
            requested_frame: None,
            frame: Rect::zero(),
            lifecycle: WindowLifecycle::Created,
            mode: if matches!(window_type, WindowType::App) {
                WindowMode::FullScreen
            } else {
                WindowMode::Floating
            },
            content: None,
            properties: WindowProperties {
                focusable: window_type.default_focusable(),
                ..WindowProperties::default()
            },
            pending_orientation: None,
            is_focused: false,
            z_seq: 0,
        }
    }

    #[must_use]
    pub const fn is_shown(&self) -> bool { matches!(self.lifecycle, WindowLifecycle::Shown) }

    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        matches!(self.lifecycle, WindowLifecycle::Destroyed)
    }

    /// A top-level app window, the unit that tiling and app-wide toggles act on.
    #[must_use]
    pub const fn is_main_app_window(&self) -> bool {
        matches!(self.window_type, WindowType::App) && self.parent_id.is_none()
    }
}

// ============================================================================
// Avoid Area Types
// ============================================================================

/// Kinds of avoid area a window can query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvoidAreaType {
    System,
    Cutout,
    SystemGesture,
    Keyboard,
}

impl AvoidAreaType {
    pub const ALL: [Self; 4] = [Self::System, Self::Cutout, Self::SystemGesture, Self::Keyboard];
}

/// Regions of a window obscured by system UI, in window-relative coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AvoidArea {
    pub visible: bool,
    pub left: Rect,
    pub top: Rect,
    pub right: Rect,
    pub bottom: Rect,
}

impl AvoidArea {
    /// True when no edge holds an area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.left.is_valid()
            && !self.top.is_valid()
            && !self.right.is_valid()
            && !self.bottom.is_valid()
    }
}

// ============================================================================
// Stage Types
// ============================================================================

/// Lifecycle of a window stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageLifecycle {
    #[default]
    Uninitialized,
    Foreground,
    Active,
    Inactive,
    Background,
    Destroyed,
}

/// One main window plus ordered sub-windows for an ability instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowStage {
    pub id: StageId,
    pub ability_name: String,
    pub main_window: WindowId,
    pub sub_windows: Vec<WindowId>,
    pub lifecycle: StageLifecycle,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod rect_tests {
        use super::*;

        #[test]
        fn test_non_finite_rect_is_invalid() {
            assert!(Rect::new(0.0, 0.0, 10.0, 10.0).is_valid());
            assert!(!Rect::new(f64::NAN, 0.0, 10.0, 10.0).is_valid());
            assert!(!Rect::new(0.0, 0.0, f64::INFINITY, 10.0).is_valid());
            assert!(!Rect::new(0.0, 0.0, 10.0, f64::NAN).is_valid());
        }

        #[test]
        fn test_intersection_overlapping() {
            let a = Rect::new(0.0, 0.0, 100.0, 100.0);
            let b = Rect::new(50.0, 80.0, 100.0, 100.0);
            assert_eq!(a.intersection(&b), Some(Rect::new(50.0, 80.0, 50.0, 20.0)));
        }

        #[test]
        fn test_intersection_touching_edges_is_none() {
            let a = Rect::new(0.0, 0.0, 100.0, 100.0);
            let b = Rect::new(100.0, 0.0, 100.0, 100.0);
            assert_eq!(a.intersection(&b), None);
        }

        #[test]
        fn test_union_spans_both() {
            let a = Rect::new(0.0, 0.0, 800.0, 600.0);
            let b = Rect::new(800.0, 0.0, 800.0, 600.0);
            assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 1600.0, 600.0));
        }

        #[test]
        fn test_union_with_empty() {
            let a = Rect::new(10.0, 10.0, 5.0, 5.0);
            assert_eq!(Rect::zero().union(&a), a);
        }

        #[test]
        fn test_contains_point_excludes_far_edge() {
            let r = Rect::new(0.0, 0.0, 10.0, 10.0);
            assert!(r.contains_point(0.0, 0.0));
            assert!(!r.contains_point(10.0, 5.0));
        }
    }

    mod rotation_tests {
        use super::*;

        #[test]
        fn test_rotate_rect_quarter_turn() {
            let cutout = Rect::new(490.0, 0.0, 100.0, 80.0);
            let rotated = Rotation::Deg90.rotate_rect(&cutout, 1080.0, 2340.0);
            assert_eq!(rotated, Rect::new(2260.0, 490.0, 80.0, 100.0));
        }

        #[test]
        fn test_rotate_rect_half_turn() {
            let cutout = Rect::new(490.0, 0.0, 100.0, 80.0);
            let rotated = Rotation::Deg180.rotate_rect(&cutout, 1080.0, 2340.0);
            assert_eq!(rotated, Rect::new(490.0, 2260.0, 100.0, 80.0));
        }

        #[test]
        fn test_rotate_rect_three_quarter_turn() {
            let cutout = Rect::new(490.0, 0.0, 100.0, 80.0);
            let rotated = Rotation::Deg270.rotate_rect(&cutout, 1080.0, 2340.0);
            assert_eq!(rotated, Rect::new(0.0, 490.0, 80.0, 100.0));
        }

        #[test]
        fn test_from_degrees_rejects_odd_angles() {
            assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
            assert_eq!(Rotation::from_degrees(45), None);
        }

        #[test]
        fn test_screen_orientation_on_portrait_panel() {
            assert_eq!(ScreenOrientation::Vertical.rotation_for(true), Rotation::Deg0);
            assert_eq!(ScreenOrientation::Horizontal.rotation_for(true), Rotation::Deg90);
            assert_eq!(ScreenOrientation::ReverseVertical.rotation_for(true), Rotation::Deg180);
            assert_eq!(ScreenOrientation::ReverseHorizontal.rotation_for(true), Rotation::Deg270);
        }

        #[test]
        fn test_screen_orientation_on_landscape_panel() {
            assert_eq!(ScreenOrientation::Vertical.rotation_for(false), Rotation::Deg90);
            assert_eq!(ScreenOrientation::Horizontal.rotation_for(false), Rotation::Deg0);
            assert_eq!(ScreenOrientation::ReverseVertical.rotation_for(false), Rotation::Deg270);
            assert_eq!(ScreenOrientation::ReverseHorizontal.rotation_for(false), Rotation::Deg180);
            assert_eq!(ScreenOrientation::Unspecified.rotation_for(false), Rotation::Deg0);
        }
    }

    mod display_state_tests {
        use super::*;

        #[test]
        fn test_unknown_is_never_entered_or_left() {
            assert!(!DisplayState::Unknown.can_transition_to(DisplayState::Off));
            assert!(!DisplayState::On.can_transition_to(DisplayState::Unknown));
            assert!(!DisplayState::Unknown.can_transition_to(DisplayState::Unknown));
        }

        #[test]
        fn test_known_states_jump_freely() {
            assert!(DisplayState::On.can_transition_to(DisplayState::Vr));
            assert!(DisplayState::On.can_transition_to(DisplayState::OnSuspend));
            assert!(DisplayState::Off.can_transition_to(DisplayState::DozeSuspend));
            assert!(DisplayState::Doze.can_transition_to(DisplayState::Doze));
        }
    }

    #[test]
    fn test_window_type_layers_keep_keyguard_on_top() {
        assert!(WindowType::Keyguard.layer() > WindowType::SystemGesture.layer());
        assert!(WindowType::Dialog.layer() > WindowType::App.layer());
        assert_eq!(WindowType::StatusBar.layer(), WindowType::NavigationBar.layer());
    }

    #[test]
    fn test_new_window_uses_type_focus_default() {
        let bar = Window::new(1, "bar", WindowType::StatusBar, 0);
        assert!(!bar.properties.focusable);
        let app = Window::new(2, "app", WindowType::App, 0);
        assert!(app.properties.focusable);
        assert_eq!(app.lifecycle, WindowLifecycle::Created);
    }

    #[test]
    fn test_screen_rotated_size_swaps_on_quarter_turn() {
        let screen = Screen {
            modes: smallvec::smallvec![ScreenMode::new(1080, 2340, 60)],
            rotation: Rotation::Deg90,
            ..Screen::default()
        };
        assert_eq!(screen.rotated_size(), (2340.0, 1080.0));
        assert!(screen.is_portrait_panel());
    }

    #[test]
    fn test_avoid_area_default_is_empty() {
        assert!(AvoidArea::default().is_empty());
    }
}
