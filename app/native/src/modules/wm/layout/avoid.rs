//! Avoid-area computation.
//!
//! Each overlay (status bar, cutout, gesture strip, keyboard) is intersected
//! with the window frame and the overlap is assigned to one edge of the window.
//! The edge is picked by which side of the window's two diagonals the overlap
//! centre falls on.

use crate::modules::wm::state::{AvoidArea, AvoidAreaType, Display, Rect, Window, WindowType};

/// Edge of a window an overlap is assigned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AvoidEdge {
    Left,
    Top,
    Right,
    Bottom,
}

/// The overlap of `overlay` with `frame`, in coordinates relative to `frame`.
#[must_use]
pub fn overlap_in_window(frame: &Rect, overlay: &Rect) -> Option<Rect> {
    frame.intersection(overlay).map(|r| r.offset(-frame.x, -frame.y))
}

/// Classifies a window-relative overlap against the window diagonals.
///
/// Returns `None` for a degenerate window.
#[must_use]
pub fn classify_edge(overlap: &Rect, window_width: f64, window_height: f64) -> Option<AvoidEdge> {
    if window_width <= 0.0 || window_height <= 0.0 {
        return None;
    }
    let (cx, cy) = overlap.center();
    let slope = window_height / window_width;

    // Negative means above the diagonal.
    let below_main = cy - slope * cx;
    let below_anti = cy + slope * cx - window_height;

    Some(match (below_main < 0.0, below_anti < 0.0) {
        (true, true) => AvoidEdge::Top,
        (true, false) => AvoidEdge::Right,
        (false, true) => AvoidEdge::Left,
        (false, false) => AvoidEdge::Bottom,
    })
}

fn place(area: &mut AvoidArea, edge: AvoidEdge, overlap: Rect) {
    let slot = match edge {
        AvoidEdge::Left => &mut area.left,
        AvoidEdge::Top => &mut area.top,
        AvoidEdge::Right => &mut area.right,
        AvoidEdge::Bottom => &mut area.bottom,
    };
    *slot = slot.union(&overlap);
}

/// Display-space rectangles that contribute to an avoid area of the given kind.
fn overlays(
    window: &Window,
    display: &Display,
    stack: &[Window],
    kind: AvoidAreaType,
    keyboard_height: f64,
) -> Vec<Rect> {
    let shown_of = |types: &[WindowType]| -> Vec<Rect> {
        stack
            .iter()
            .filter(|w| w.id != window.id && w.is_shown() && types.contains(&w.window_type))
            .map(|w| w.frame)
            .collect()
    };

    match kind {
        AvoidAreaType::System => {
            let props = &window.properties;
            if props.full_screen || props.layout_full_screen {
                return Vec::new();
            }
            shown_of(&[WindowType::StatusBar, WindowType::NavigationBar])
        }
        AvoidAreaType::Cutout => display.cutouts.first().copied().into_iter().collect(),
        AvoidAreaType::SystemGesture => shown_of(&[WindowType::SystemGesture]),
        AvoidAreaType::Keyboard => {
            if window.window_type == WindowType::InputMethod {
                return Vec::new();
            }
            let mut rects = shown_of(&[WindowType::InputMethod]);
            if keyboard_height > 0.0 {
                let height = keyboard_height.min(display.height);
                rects.push(Rect::new(0.0, display.height - height, display.width, height));
            }
            rects
        }
    }
}

/// Computes one avoid area for a window from the current frames on its display.
#[must_use]
pub fn compute_avoid_area(
    window: &Window,
    display: &Display,
    stack: &[Window],
    kind: AvoidAreaType,
    keyboard_height: f64,
) -> AvoidArea {
    let frame = window.frame;
    let mut area = AvoidArea::default();
    if !frame.is_valid() {
        return area;
    }

    for overlay in overlays(window, display, stack, kind, keyboard_height) {
        let Some(overlap) = overlap_in_window(&frame, &overlay) else {
            continue;
        };
        if let Some(edge) = classify_edge(&overlap, frame.width, frame.height) {
            place(&mut area, edge, overlap);
        }
    }

    area.visible = !area.is_empty();
    area
}
