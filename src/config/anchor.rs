//! Named overlay anchors and the per-level position choice

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Vertical half of an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

/// Horizontal half of an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

/// One of the nine screen-relative placements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleCenter,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MiddleLeft,
        Anchor::MiddleCenter,
        Anchor::MiddleRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::TopLeft => "Top Left",
            Anchor::TopCenter => "Top Center",
            Anchor::TopRight => "Top Right",
            Anchor::MiddleLeft => "Middle Left",
            Anchor::MiddleCenter => "Middle Center",
            Anchor::MiddleRight => "Middle Right",
            Anchor::BottomLeft => "Bottom Left",
            Anchor::BottomCenter => "Bottom Center",
            Anchor::BottomRight => "Bottom Right",
        }
    }

    /// Exact (case-insensitive) match against the stored names
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|anchor| anchor.as_str().eq_ignore_ascii_case(name))
    }

    pub fn align(self) -> (VerticalAlign, HorizontalAlign) {
        use HorizontalAlign::*;
        use VerticalAlign::*;
        match self {
            Anchor::TopLeft => (Top, Left),
            Anchor::TopCenter => (Top, Center),
            Anchor::TopRight => (Top, Right),
            Anchor::MiddleLeft => (Middle, Left),
            Anchor::MiddleCenter => (Middle, Center),
            Anchor::MiddleRight => (Middle, Right),
            Anchor::BottomLeft => (Bottom, Left),
            Anchor::BottomCenter => (Bottom, Center),
            Anchor::BottomRight => (Bottom, Right),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored position of a level: a named anchor, or "Custom" (use the dragged offset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionChoice {
    Named(Anchor),
    Custom,
}

impl PositionChoice {
    pub const CUSTOM_NAME: &'static str = "Custom";

    /// Parse a stored position; unknown names fall back to "Top Right"
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case(Self::CUSTOM_NAME) {
            return PositionChoice::Custom;
        }
        match Anchor::from_name(name) {
            Some(anchor) => PositionChoice::Named(anchor),
            None => {
                warn!(position = %name, fallback = %Anchor::TopRight, "Unknown position name, using fallback");
                PositionChoice::Named(Anchor::TopRight)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PositionChoice::Named(anchor) => anchor.as_str(),
            PositionChoice::Custom => Self::CUSTOM_NAME,
        }
    }

    /// Anchor to fall back on when no custom offset is stored
    pub fn anchor(self) -> Anchor {
        match self {
            PositionChoice::Named(anchor) => anchor,
            PositionChoice::Custom => Anchor::TopRight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_for_every_anchor() {
        for anchor in Anchor::ALL {
            assert_eq!(Anchor::from_name(anchor.as_str()), Some(anchor));
        }
    }

    #[test]
    fn test_unknown_name_falls_back_to_top_right() {
        assert_eq!(
            PositionChoice::parse("Somewhere"),
            PositionChoice::Named(Anchor::TopRight)
        );
        assert_eq!(PositionChoice::parse("custom"), PositionChoice::Custom);
        assert_eq!(
            PositionChoice::parse("middle center"),
            PositionChoice::Named(Anchor::MiddleCenter)
        );
    }

    #[test]
    fn test_alignment() {
        assert_eq!(
            Anchor::TopLeft.align(),
            (VerticalAlign::Top, HorizontalAlign::Left)
        );
        assert_eq!(
            Anchor::MiddleCenter.align(),
            (VerticalAlign::Middle, HorizontalAlign::Center)
        );
    }
}
