//! Severity levels and the pure resolution of display attributes
//!
//! Nothing here touches tracking state. [`resolve`] can be called at any time
//! and always returns the same attributes for the same inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::color::Color;
use crate::config::{ConfigSnapshot, DisplayMode, PositionChoice};
use crate::constants::palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    One,
    Two,
    Three,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::One, Level::Two, Level::Three];

    /// 1-based number used in store keys
    pub fn number(self) -> u8 {
        match self {
            Level::One => 1,
            Level::Two => 2,
            Level::Three => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Level::One),
            2 => Some(Level::Two),
            3 => Some(Level::Three),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.number() - 1)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Attributes of the level active at a given second count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelAttributes {
    pub level: Level,
    pub color: Color,
    pub position: PositionChoice,
    pub font_size: u32,
    pub blink: bool,
}

/// Half-open thresholds: a value equal to a boundary belongs to the next level
pub fn resolve(accumulated_seconds: u64, config: &ConfigSnapshot) -> LevelAttributes {
    let level = if accumulated_seconds < config.level_1_max_time_seconds {
        Level::One
    } else if accumulated_seconds < config.level_3_start_seconds() {
        Level::Two
    } else {
        Level::Three
    };
    let style = config.style(level);
    LevelAttributes {
        level,
        color: style.color,
        position: style.position,
        font_size: style.font_size,
        blink: style.blink,
    }
}

/// Which colors the blink cadence shows, derived from the second count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPhase {
    /// Level color on the usual translucent background
    Steady,
    /// Black text on a level-colored background
    Inverted,
}

impl BlinkPhase {
    pub fn for_seconds(accumulated_seconds: u64) -> Self {
        if (accumulated_seconds % 60) % 2 == 0 {
            BlinkPhase::Inverted
        } else {
            BlinkPhase::Steady
        }
    }

    /// (text, background) for a level color
    pub fn colors(self, level_color: Color) -> (Color, Color) {
        match self {
            BlinkPhase::Steady => (level_color, palette::OVERLAY_BACKGROUND),
            BlinkPhase::Inverted => (palette::BLINK_TEXT, level_color),
        }
    }
}

/// Whether interval mode shows the counter at this second count.
/// Always true outside interval mode.
pub fn interval_visible(accumulated_seconds: u64, config: &ConfigSnapshot) -> bool {
    match config.display_mode {
        DisplayMode::Always => true,
        DisplayMode::Interval => {
            let interval = config.display_interval_minutes.max(1);
            (accumulated_seconds / 60) % interval == 0
                && accumulated_seconds % 60 < config.display_duration_seconds
        }
    }
}

/// `HH:MM:SS`, hours not wrapped
pub fn format_hms(accumulated_seconds: u64) -> String {
    let hours = accumulated_seconds / 3600;
    let minutes = (accumulated_seconds % 3600) / 60;
    let seconds = accumulated_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::keys;
    use crate::store::{KeyValueStore, MemoryStore};

    fn config_with(level_1: i64, level_2: i64) -> ConfigSnapshot {
        let mut store = MemoryStore::new();
        store.set_int(keys::LEVEL_1_MAX_TIME_SECONDS, level_1);
        store.set_int(keys::LEVEL_2_DURATION_SECONDS, level_2);
        ConfigSnapshot::load(&store)
    }

    #[test]
    fn test_half_open_boundaries() {
        let config = config_with(1800, 1800);
        assert_eq!(resolve(0, &config).level, Level::One);
        assert_eq!(resolve(1799, &config).level, Level::One);
        assert_eq!(resolve(1800, &config).level, Level::Two);
        assert_eq!(resolve(3599, &config).level, Level::Two);
        assert_eq!(resolve(3600, &config).level, Level::Three);
        assert_eq!(resolve(u64::MAX / 2, &config).level, Level::Three);
    }

    #[test]
    fn test_custom_thresholds() {
        let config = config_with(600, 900);
        assert_eq!(resolve(599, &config).level, Level::One);
        assert_eq!(resolve(600, &config).level, Level::Two);
        assert_eq!(resolve(1499, &config).level, Level::Two);
        assert_eq!(resolve(1500, &config).level, Level::Three);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let config = ConfigSnapshot::default();
        let first = resolve(2000, &config);
        for _ in 0..10 {
            assert_eq!(resolve(2000, &config), first);
        }
    }

    #[test]
    fn test_attributes_follow_level_style() {
        let config = ConfigSnapshot::default();
        let attrs = resolve(3600, &config);
        assert_eq!(attrs.level, Level::Three);
        assert_eq!(attrs.color, Color::RED);
        assert_eq!(attrs.font_size, 28);
        assert!(attrs.blink);
    }

    #[test]
    fn test_blink_phase_alternates_with_parity() {
        assert_eq!(BlinkPhase::for_seconds(3600), BlinkPhase::Inverted);
        assert_eq!(BlinkPhase::for_seconds(3601), BlinkPhase::Steady);
        assert_ne!(BlinkPhase::for_seconds(3600), BlinkPhase::for_seconds(3601));

        let (text, background) = BlinkPhase::Inverted.colors(Color::RED);
        assert_eq!((text, background), (Color::BLACK, Color::RED));
        let (text, background) = BlinkPhase::Steady.colors(Color::RED);
        assert_eq!((text, background), (Color::RED, palette::OVERLAY_BACKGROUND));
    }

    #[test]
    fn test_interval_visibility() {
        let mut store = MemoryStore::new();
        store.set_str(keys::TIMER_DISPLAY_MODE, "interval");
        store.set_int(keys::TIMER_DISPLAY_INTERVAL_MINUTES, 2);
        store.set_int(keys::TIMER_DISPLAY_DURATION_SECONDS, 5);
        let config = ConfigSnapshot::load(&store);

        assert!(interval_visible(0, &config));
        assert!(interval_visible(4, &config));
        assert!(!interval_visible(5, &config));
        assert!(!interval_visible(60, &config));
        assert!(interval_visible(120, &config));
        assert!(!interval_visible(185, &config));

        assert!(interval_visible(185, &ConfigSnapshot::default()));
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(3661), "01:01:01");
        assert_eq!(format_hms(100 * 3600 + 59), "100:00:59");
    }
}
