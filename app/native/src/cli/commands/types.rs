//! Shared types for CLI commands.

use crate::modules::wm::state::AvoidAreaType;

/// Avoid-area type as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliAvoidAreaType {
    /// Status and navigation bars.
    System,
    /// Display cutouts.
    Cutout,
    /// Back-gesture strips.
    #[value(name = "system-gesture")]
    SystemGesture,
    /// The soft keyboard.
    Keyboard,
}

impl From<CliAvoidAreaType> for AvoidAreaType {
    fn from(value: CliAvoidAreaType) -> Self {
        match value {
            CliAvoidAreaType::System => Self::System,
            CliAvoidAreaType::Cutout => Self::Cutout,
            CliAvoidAreaType::SystemGesture => Self::SystemGesture,
            CliAvoidAreaType::Keyboard => Self::Keyboard,
        }
    }
}

/// A window chosen by id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowSelector {
    Id(u32),
    Name(String),
}

impl std::str::FromStr for WindowSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("window selector is empty".to_string());
        }
        Ok(s.parse::<u32>().map_or_else(|_| Self::Name(s.to_string()), Self::Id))
    }
}

impl std::fmt::Display for WindowSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parses_ids_and_names() {
        assert_eq!("12".parse::<WindowSelector>().unwrap(), WindowSelector::Id(12));
        assert_eq!(
            "casement.status-bar.0".parse::<WindowSelector>().unwrap(),
            WindowSelector::Name("casement.status-bar.0".to_string())
        );
        assert!("  ".parse::<WindowSelector>().is_err());
    }

    #[test]
    fn test_avoid_area_type_conversion() {
        assert_eq!(AvoidAreaType::from(CliAvoidAreaType::SystemGesture), AvoidAreaType::SystemGesture);
    }
}
