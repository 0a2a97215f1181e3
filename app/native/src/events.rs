//! Centralized event names.
//!
//! Every event delivered by the dispatcher carries one of these names so log
//! output and CLI traces stay consistent.
//!
//! ## Naming Convention
//!
//! All events follow the pattern: `casement://<target>/<event-name>`
//!
//! - `casement://` - Prefix identifying this as a Casement event
//! - `<target>` - The kind of object the event is attached to
//! - `<event-name>` - Descriptive kebab-case name for the event

/// Display topology events.
pub mod display {
    /// A display was added. Payload: display id.
    pub const ADD: &str = "casement://display/add";

    /// A display was removed. Payload: display id.
    pub const REMOVE: &str = "casement://display/remove";

    /// A display property changed. Payload: display id.
    pub const CHANGE: &str = "casement://display/change";
}

/// Screen topology events.
pub mod screen {
    /// A screen was connected or created. Payload: screen id.
    pub const ADD: &str = "casement://screen/add";

    /// A screen was disconnected or destroyed. Payload: screen id.
    pub const REMOVE: &str = "casement://screen/remove";

    /// A screen mode, density, orientation or group membership changed.
    pub const CHANGE: &str = "casement://screen/change";
}

/// Per-window events.
pub mod window {
    /// The effective window frame changed size.
    pub const SIZE_CHANGE: &str = "casement://window/size-change";

    /// An avoid area of the window changed.
    pub const AVOID_AREA_CHANGE: &str = "casement://window/avoid-area-change";

    /// A screenshot of the window was taken.
    pub const SCREENSHOT: &str = "casement://window/screenshot";

    /// A remote target bound to this dialog was touched.
    pub const DIALOG_TARGET_TOUCH: &str = "casement://window/dialog-target-touch";

    /// The soft keyboard height changed while this window was subscribed.
    pub const KEYBOARD_HEIGHT_CHANGE: &str = "casement://window/keyboard-height-change";
}

/// Global events.
pub mod global {
    /// System bar tint (visibility or colour) changed on a display.
    pub const SYSTEM_BAR_TINT_CHANGE: &str = "casement://global/system-bar-tint-change";
}

/// Window stage events.
pub mod stage {
    /// The stage lifecycle moved to a new state.
    pub const LIFECYCLE: &str = "casement://stage/lifecycle";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_casement_prefix() {
        let events = [
            display::ADD,
            display::REMOVE,
            display::CHANGE,
            screen::ADD,
            screen::REMOVE,
            screen::CHANGE,
            window::SIZE_CHANGE,
            window::AVOID_AREA_CHANGE,
            window::SCREENSHOT,
            window::DIALOG_TARGET_TOUCH,
            window::KEYBOARD_HEIGHT_CHANGE,
            global::SYSTEM_BAR_TINT_CHANGE,
            stage::LIFECYCLE,
        ];

        for event in events {
            assert!(event.starts_with("casement://"), "Event '{event}' missing prefix");
        }
    }
}
