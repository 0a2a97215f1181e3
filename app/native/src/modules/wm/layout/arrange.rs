//! Placement of app windows by layout mode and window mode.
//!
//! Sizes are given in virtual pixels and scaled by the display's pixel ratio.
//! Every rect is snapped down to whole pixels.

use crate::modules::wm::state::{Display, Rect, Window, WindowId, WindowMode};

/// Margin between the outer tiles and the display edges.
const TILE_EDGE_VP: f64 = 48.0;

/// Gap between neighbouring tiles.
const TILE_GAP_VP: f64 = 24.0;

/// Narrowest a floating or tiled window may get.
const MIN_FLOATING_WIDTH_VP: f64 = 320.0;

const MIN_FLOATING_HEIGHT_VP: f64 = 240.0;

/// Offset between cascaded windows, one title bar.
const CASCADE_STEP_VP: f64 = 37.0;

/// Share of the display taken by a lone tile or the first cascaded window.
const DEFAULT_ASPECT_RATIO: f64 = 0.67;

/// Whether the window takes part in tiling.
#[must_use]
pub fn is_tileable(window: &Window) -> bool {
    window.is_main_app_window()
        && window.is_shown()
        && !window.properties.full_screen
        && !window.properties.layout_full_screen
}

/// How many tiles fit side by side in `limit`; never less than one.
#[must_use]
pub fn max_tiles(limit: &Rect, ratio: f64) -> usize {
    let edge = (TILE_EDGE_VP * ratio).floor();
    let gap = (TILE_GAP_VP * ratio).floor();
    let min_width = (MIN_FLOATING_WIDTH_VP * ratio).floor();
    let drawable = limit.width - edge * 2.0 + gap;
    let fits = (drawable / (min_width + gap)).floor();
    if fits.is_finite() && fits >= 1.0 {
        // Bounded by the display width, far below usize::MAX.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let fits = fits as usize;
        fits
    } else {
        1
    }
}

/// Frames for `count` tiles, left to right.
#[must_use]
pub fn tile_rects(display: &Display, limit: &Rect, count: usize) -> Vec<Rect> {
    let ratio = display.virtual_pixel_ratio;
    let height = (display.height * DEFAULT_ASPECT_RATIO).floor().min(limit.height);
    let y = limit.y + ((limit.height - height) / 2.0).floor();

    if count <= 1 {
        let width = (display.width * DEFAULT_ASPECT_RATIO).floor().min(limit.width);
        let x = limit.x + ((limit.width - width) / 2.0).floor();
        return vec![Rect::new(x, y, width, height)];
    }

    let edge = (TILE_EDGE_VP * ratio).floor();
    let gap = (TILE_GAP_VP * ratio).floor();
    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    let width = ((limit.width - edge * 2.0 - gap * (n - 1.0)) / n).floor().max(0.0);
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let offset = i as f64 * (width + gap);
            Rect::new(limit.x + edge + offset, y, width, height)
        })
        .collect()
}

/// Tileable windows of a display in show order, oldest first.
fn tileable(stack: &[Window]) -> Vec<&Window> {
    let mut windows: Vec<&Window> = stack.iter().filter(|w| is_tileable(w)).collect();
    windows.sort_by_key(|w| (w.z_seq, w.id));
    windows
}

/// Tile frames for the most recently shown windows that fit, oldest on the left.
#[must_use]
pub fn tile_frames(display: &Display, limit: &Rect, stack: &[Window]) -> Vec<(WindowId, Rect)> {
    let windows = tileable(stack);
    let capacity = max_tiles(limit, display.virtual_pixel_ratio);
    let tiled = &windows[windows.len().saturating_sub(capacity)..];
    if tiled.is_empty() {
        return Vec::new();
    }
    tiled.iter().map(|w| w.id).zip(tile_rects(display, limit, tiled.len())).collect()
}

/// Tileable windows that no longer fit, oldest first.
#[must_use]
pub fn tile_overflow(display: &Display, limit: &Rect, stack: &[Window]) -> Vec<WindowId> {
    let windows = tileable(stack);
    let capacity = max_tiles(limit, display.virtual_pixel_ratio);
    windows[..windows.len().saturating_sub(capacity)].iter().map(|w| w.id).collect()
}

/// The first half (primary) or second half (secondary) of `limit` along its
/// long edge. Other modes get the whole rect.
#[must_use]
pub fn split_rect(limit: &Rect, mode: WindowMode) -> Rect {
    let landscape = limit.width >= limit.height;
    let (first, second) = if landscape {
        let half = (limit.width / 2.0).floor();
        (
            Rect::new(limit.x, limit.y, half, limit.height),
            Rect::new(limit.x + half, limit.y, limit.width - half, limit.height),
        )
    } else {
        let half = (limit.height / 2.0).floor();
        (
            Rect::new(limit.x, limit.y, limit.width, half),
            Rect::new(limit.x, limit.y + half, limit.width, limit.height - half),
        )
    };
    match mode {
        WindowMode::SplitPrimary => first,
        WindowMode::SplitSecondary => second,
        WindowMode::FullScreen | WindowMode::Floating => *limit,
    }
}

/// The rect of the first cascaded window, centred in `limit` when it fits.
#[must_use]
pub fn first_cascade_rect(display: &Display, limit: &Rect) -> Rect {
    let ratio = display.virtual_pixel_ratio;
    let width = (display.width * DEFAULT_ASPECT_RATIO).floor().max((MIN_FLOATING_WIDTH_VP * ratio).floor());
    let height = (display.height * DEFAULT_ASPECT_RATIO).floor().max((MIN_FLOATING_HEIGHT_VP * ratio).floor());

    if width <= limit.width && height <= limit.height {
        let x = limit.x + (limit.width / 2.0).floor() - (width / 2.0).floor();
        let y = limit.y + (limit.height / 2.0).floor() - (height / 2.0).floor();
        Rect::new(x, y, width, height)
    } else {
        Rect::new(limit.x, limit.y, width, height)
    }
}

/// Offset `previous` by one cascade step, wrapping each axis back to the
/// limit's origin when the step would leave it.
#[must_use]
pub fn step_cascade_rect(previous: &Rect, limit: &Rect, ratio: f64) -> Rect {
    let step = (CASCADE_STEP_VP * ratio).floor();
    let x = if previous.x + step >= limit.x && previous.right() + step <= limit.right() {
        previous.x + step
    } else {
        limit.x
    };
    let y = if previous.y + step >= limit.y && previous.bottom() + step <= limit.bottom() {
        previous.y + step
    } else {
        limit.y
    };
    Rect::new(x, y, previous.width, previous.height)
}

/// Where a window turning floating without a frame of its own is placed: one
/// step from the topmost other floating app window, or the first cascade rect.
#[must_use]
pub fn cascade_rect(display: &Display, limit: &Rect, stack: &[Window], window_id: WindowId) -> Rect {
    stack
        .iter()
        .rev()
        .filter(|w| w.id != window_id && w.is_main_app_window() && w.mode == WindowMode::Floating)
        .find_map(|w| w.requested_frame)
        .map_or_else(
            || first_cascade_rect(display, limit),
            |previous| step_cascade_rect(&previous, limit, display.virtual_pixel_ratio),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::wm::state::{DisplayState, Rotation, WindowLifecycle, WindowType};

    fn display(width: f64, height: f64, ratio: f64) -> Display {
        Display {
            id: 0,
            screen_id: 0,
            name: "panel".to_string(),
            width,
            height,
            rotation: Rotation::Deg0,
            refresh_rate: 60,
            virtual_pixel_ratio: ratio,
            density_dpi: ratio * 160.0,
            cutouts: Vec::new(),
            state: DisplayState::On,
            alive: true,
        }
    }

    fn shown_app(id: WindowId, z_seq: u64) -> Window {
        let mut window = Window::new(id, &format!("app-{id}"), WindowType::App, 0);
        window.lifecycle = WindowLifecycle::Shown;
        window.z_seq = z_seq;
        window
    }

    mod tile_tests {
        use super::*;

        #[test]
        fn test_capacity_follows_width_and_density() {
            assert_eq!(max_tiles(&Rect::new(0.0, 96.0, 1080.0, 2124.0), 3.0), 1);
            assert_eq!(max_tiles(&Rect::new(0.0, 0.0, 2340.0, 1080.0), 3.0), 2);
            assert_eq!(max_tiles(&Rect::new(0.0, 0.0, 2560.0, 1600.0), 1.0), 7);
        }

        #[test]
        fn test_two_tiles_side_by_side() {
            let display = display(2560.0, 1600.0, 1.0);
            let rects = tile_rects(&display, &display.bounds(), 2);
            assert_eq!(
                rects,
                vec![Rect::new(48.0, 264.0, 1220.0, 1072.0), Rect::new(1292.0, 264.0, 1220.0, 1072.0)]
            );
        }

        #[test]
        fn test_single_tile_is_centred() {
            let display = display(2560.0, 1600.0, 1.0);
            let rects = tile_rects(&display, &display.bounds(), 1);
            assert_eq!(rects, vec![Rect::new(422.0, 264.0, 1715.0, 1072.0)]);
        }

        #[test]
        fn test_only_latest_windows_are_tiled() {
            let display = display(2340.0, 1080.0, 3.0);
            let stack = vec![shown_app(1, 1), shown_app(2, 2), shown_app(3, 3)];
            let frames = tile_frames(&display, &display.bounds(), &stack);
            let ids: Vec<WindowId> = frames.iter().map(|(id, _)| *id).collect();
            assert_eq!(ids, vec![2, 3]);
            assert!(frames[0].1.x < frames[1].1.x);
            assert_eq!(tile_overflow(&display, &display.bounds(), &stack), vec![1]);
        }

        #[test]
        fn test_full_screen_and_sub_windows_are_not_tiled() {
            let mut full = shown_app(1, 1);
            full.properties.full_screen = true;
            let mut sub = shown_app(2, 2);
            sub.parent_id = Some(3);
            let mut hidden = shown_app(4, 4);
            hidden.lifecycle = WindowLifecycle::Hidden;
            assert!(!is_tileable(&full));
            assert!(!is_tileable(&sub));
            assert!(!is_tileable(&hidden));
            assert!(is_tileable(&shown_app(5, 5)));
        }
    }

    mod split_tests {
        use super::*;

        #[test]
        fn test_portrait_splits_top_and_bottom() {
            let limit = Rect::new(0.0, 96.0, 1080.0, 2124.0);
            assert_eq!(split_rect(&limit, WindowMode::SplitPrimary), Rect::new(0.0, 96.0, 1080.0, 1062.0));
            assert_eq!(split_rect(&limit, WindowMode::SplitSecondary), Rect::new(0.0, 1158.0, 1080.0, 1062.0));
        }

        #[test]
        fn test_landscape_splits_left_and_right() {
            let limit = Rect::new(0.0, 0.0, 2341.0, 1080.0);
            assert_eq!(split_rect(&limit, WindowMode::SplitPrimary), Rect::new(0.0, 0.0, 1170.0, 1080.0));
            assert_eq!(split_rect(&limit, WindowMode::SplitSecondary), Rect::new(1170.0, 0.0, 1171.0, 1080.0));
            assert_eq!(split_rect(&limit, WindowMode::Floating), limit);
        }
    }

    mod cascade_tests {
        use super::*;

        #[test]
        fn test_first_rect_is_centred_in_limit() {
            let display = display(1080.0, 2340.0, 3.0);
            let limit = Rect::new(0.0, 96.0, 1080.0, 2124.0);
            assert_eq!(first_cascade_rect(&display, &limit), Rect::new(60.0, 375.0, 960.0, 1567.0));
        }

        #[test]
        fn test_step_wraps_at_limit_edges() {
            let limit = Rect::new(0.0, 96.0, 1080.0, 2124.0);
            let stepped = step_cascade_rect(&Rect::new(60.0, 375.0, 960.0, 1567.0), &limit, 3.0);
            assert_eq!(stepped, Rect::new(0.0, 486.0, 960.0, 1567.0));
        }

        #[test]
        fn test_cascade_steps_from_topmost_floating_window() {
            let display = display(2560.0, 1600.0, 1.0);
            let limit = display.bounds();
            let mut floating = shown_app(1, 1);
            floating.mode = WindowMode::Floating;
            floating.requested_frame = Some(Rect::new(100.0, 100.0, 800.0, 600.0));
            let stack = vec![floating, shown_app(2, 2)];

            assert_eq!(cascade_rect(&display, &limit, &stack, 2), Rect::new(137.0, 137.0, 800.0, 600.0));
            assert_eq!(cascade_rect(&display, &limit, &stack, 1), first_cascade_rect(&display, &limit));
        }
    }
}
