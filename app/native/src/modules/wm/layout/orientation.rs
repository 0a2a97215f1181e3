//! Mapping window orientation preferences onto display rotations.

use crate::modules::wm::state::{Orientation, Rotation, ScreenOrientation};

/// Whether a panel rotated by `rotation` ends up taller than wide.
const fn is_portrait_shape(rotation: Rotation, portrait_panel: bool) -> bool {
    portrait_panel != rotation.is_quarter_turn()
}

/// The rotation a display should take for the focused window's preference.
///
/// `sensor` is the last rotation reported by the sensor, if any. Restricted
/// auto-rotation only follows the sensor into rotations of the matching shape.
#[must_use]
pub fn resolve_rotation(
    preference: Orientation,
    current: Rotation,
    sensor: Option<Rotation>,
    portrait_panel: bool,
) -> Rotation {
    let fixed = |orientation: ScreenOrientation| orientation.rotation_for(portrait_panel);

    match preference {
        Orientation::Unspecified | Orientation::Locked => current,
        Orientation::Portrait => fixed(ScreenOrientation::Vertical),
        Orientation::Landscape => fixed(ScreenOrientation::Horizontal),
        Orientation::PortraitInverted => fixed(ScreenOrientation::ReverseVertical),
        Orientation::LandscapeInverted => fixed(ScreenOrientation::ReverseHorizontal),
        Orientation::AutoRotation => sensor.unwrap_or(current),
        Orientation::AutoRotationPortrait => match sensor {
            Some(r) if is_portrait_shape(r, portrait_panel) => r,
            _ if is_portrait_shape(current, portrait_panel) => current,
            _ => fixed(ScreenOrientation::Vertical),
        },
        Orientation::AutoRotationLandscape => match sensor {
            Some(r) if !is_portrait_shape(r, portrait_panel) => r,
            _ if !is_portrait_shape(current, portrait_panel) => current,
            _ => fixed(ScreenOrientation::Horizontal),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_orientations_on_portrait_panel() {
        let rotate = |pref| resolve_rotation(pref, Rotation::Deg0, None, true);
        assert_eq!(rotate(Orientation::Portrait), Rotation::Deg0);
        assert_eq!(rotate(Orientation::Landscape), Rotation::Deg90);
        assert_eq!(rotate(Orientation::PortraitInverted), Rotation::Deg180);
        assert_eq!(rotate(Orientation::LandscapeInverted), Rotation::Deg270);
    }

    #[test]
    fn test_unspecified_keeps_current() {
        let rotation = resolve_rotation(Orientation::Unspecified, Rotation::Deg90, Some(Rotation::Deg0), true);
        assert_eq!(rotation, Rotation::Deg90);
    }

    #[test]
    fn test_auto_follows_sensor() {
        let rotation = resolve_rotation(Orientation::AutoRotation, Rotation::Deg0, Some(Rotation::Deg270), true);
        assert_eq!(rotation, Rotation::Deg270);
        let without = resolve_rotation(Orientation::AutoRotation, Rotation::Deg180, None, true);
        assert_eq!(without, Rotation::Deg180);
    }

    #[test]
    fn test_auto_portrait_ignores_landscape_sensor() {
        let rotation =
            resolve_rotation(Orientation::AutoRotationPortrait, Rotation::Deg0, Some(Rotation::Deg90), true);
        assert_eq!(rotation, Rotation::Deg0);
        let flipped =
            resolve_rotation(Orientation::AutoRotationPortrait, Rotation::Deg0, Some(Rotation::Deg180), true);
        assert_eq!(flipped, Rotation::Deg180);
    }

    #[test]
    fn test_auto_landscape_snaps_from_portrait() {
        let rotation =
            resolve_rotation(Orientation::AutoRotationLandscape, Rotation::Deg0, Some(Rotation::Deg0), true);
        assert_eq!(rotation, Rotation::Deg90);
    }
}
