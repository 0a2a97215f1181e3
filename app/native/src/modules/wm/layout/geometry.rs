//! Effective window geometry.
//!
//! Full-screen and layout-full-screen windows cover the whole display. Main app
//! windows are placed by their mode: full screen takes the display minus visible
//! system bars, split modes take half of that, floating windows keep their
//! requested frame. Sub-windows and non-app windows keep their requested frame.
//! Every result is clamped to the display.

use super::arrange::split_rect;
use crate::modules::wm::state::{Display, Rect, Window, WindowMode, WindowType};

/// The display area left free by visible status and navigation bars.
#[must_use]
pub fn limit_rect(display: &Display, stack: &[Window]) -> Rect {
    let bounds = display.bounds();
    let mut top = 0.0_f64;
    let mut bottom = bounds.height;

    for bar in stack.iter().filter(|w| w.is_shown()) {
        let Some(frame) = bar.requested_frame.and_then(|f| f.intersection(&bounds)) else {
            continue;
        };
        match bar.window_type {
            WindowType::StatusBar => top = top.max(frame.bottom()),
            WindowType::NavigationBar => bottom = bottom.min(frame.y),
            _ => {}
        }
    }

    Rect::new(0.0, top, bounds.width, (bottom - top).max(0.0))
}

/// The frame a window occupies on its display.
#[must_use]
pub fn effective_frame(window: &Window, display: &Display, stack: &[Window]) -> Rect {
    let bounds = display.bounds();
    let props = &window.properties;

    if window.window_type == WindowType::App && (props.full_screen || props.layout_full_screen) {
        return bounds;
    }

    if window.is_main_app_window() {
        match window.mode {
            WindowMode::FullScreen => return limit_rect(display, stack),
            WindowMode::SplitPrimary | WindowMode::SplitSecondary => {
                return split_rect(&limit_rect(display, stack), window.mode);
            }
            WindowMode::Floating => {}
        }
    }

    match (window.requested_frame, window.window_type) {
        (Some(frame), _) => frame.intersection(&bounds).unwrap_or_else(Rect::zero),
        (None, WindowType::App | WindowType::Dialog) => limit_rect(display, stack),
        (None, _) => bounds,
    }
}
