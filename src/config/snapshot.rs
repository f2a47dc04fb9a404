use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::color::Color;
use crate::config::anchor::PositionChoice;
use crate::constants::{bounds, defaults, keys};
use crate::level::Level;
use crate::store::{KeyValueStore, Value};

/// Visual attributes configured for one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelStyle {
    pub color: Color,
    pub position: PositionChoice,
    pub font_size: u32,
    pub blink: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Always,
    Interval,
}

impl DisplayMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "always" => Some(DisplayMode::Always),
            "interval" => Some(DisplayMode::Interval),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Always => "always",
            DisplayMode::Interval => "interval",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every tunable parameter of the tracker, loaded at once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    levels: [LevelStyle; 3],
    pub level_1_max_time_seconds: u64,
    pub level_2_duration_seconds: u64,
    pub reset_hour: u32,
    pub reset_minute: u32,
    pub display_mode: DisplayMode,
    pub display_interval_minutes: u64,
    pub display_duration_seconds: u64,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            levels: [
                LevelStyle {
                    color: defaults::LEVEL_1_COLOR,
                    position: PositionChoice::parse(defaults::LEVEL_1_POSITION),
                    font_size: defaults::LEVEL_1_FONT_SIZE,
                    blink: defaults::LEVEL_1_BLINKING,
                },
                LevelStyle {
                    color: defaults::LEVEL_2_COLOR,
                    position: PositionChoice::parse(defaults::LEVEL_2_POSITION),
                    font_size: defaults::LEVEL_2_FONT_SIZE,
                    blink: defaults::LEVEL_2_BLINKING,
                },
                LevelStyle {
                    color: defaults::LEVEL_3_COLOR,
                    position: PositionChoice::parse(defaults::LEVEL_3_POSITION),
                    font_size: defaults::LEVEL_3_FONT_SIZE,
                    blink: defaults::LEVEL_3_BLINKING,
                },
            ],
            level_1_max_time_seconds: defaults::LEVEL_1_MAX_TIME_SECONDS,
            level_2_duration_seconds: defaults::LEVEL_2_DURATION_SECONDS,
            reset_hour: defaults::RESET_HOUR,
            reset_minute: defaults::RESET_MINUTE,
            display_mode: DisplayMode::Always,
            display_interval_minutes: defaults::DISPLAY_INTERVAL_MINUTES,
            display_duration_seconds: defaults::DISPLAY_DURATION_SECONDS,
        }
    }
}

impl ConfigSnapshot {
    /// Read every setting from the store. Missing or mistyped values use the
    /// defaults; numeric values are validated against the documented bounds.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        let fallback = Self::default();

        let levels = Level::ALL.map(|level| {
            let n = level.number();
            let default = fallback.style(level);
            LevelStyle {
                color: read_color(store, &keys::color(n)).unwrap_or(default.color),
                position: store
                    .get_str(&keys::position(n))
                    .map(|name| PositionChoice::parse(&name))
                    .unwrap_or(default.position),
                font_size: bounded(
                    &keys::font_size(n),
                    store.get_int(&keys::font_size(n)),
                    u64::from(bounds::MIN_FONT_SIZE),
                    u64::from(bounds::MAX_FONT_SIZE),
                    u64::from(default.font_size),
                ) as u32,
                blink: store.get_bool(&keys::blinking(n)).unwrap_or(default.blink),
            }
        });

        let display_mode = match store.get_str(keys::TIMER_DISPLAY_MODE) {
            Some(raw) => DisplayMode::parse(&raw).unwrap_or_else(|| {
                warn!(mode = %raw, "Unknown timer display mode, using default");
                fallback.display_mode
            }),
            None => fallback.display_mode,
        };

        let snapshot = Self {
            levels,
            level_1_max_time_seconds: bounded(
                keys::LEVEL_1_MAX_TIME_SECONDS,
                store.get_int(keys::LEVEL_1_MAX_TIME_SECONDS),
                bounds::MIN_LEVEL_1_TIME_SECONDS,
                bounds::MAX_LEVEL_1_TIME_SECONDS,
                fallback.level_1_max_time_seconds,
            ),
            level_2_duration_seconds: bounded(
                keys::LEVEL_2_DURATION_SECONDS,
                store.get_int(keys::LEVEL_2_DURATION_SECONDS),
                bounds::MIN_LEVEL_2_DURATION_SECONDS,
                bounds::MAX_LEVEL_2_DURATION_SECONDS,
                fallback.level_2_duration_seconds,
            ),
            reset_hour: bounded(
                keys::RESET_HOUR,
                store.get_int(keys::RESET_HOUR),
                0,
                u64::from(bounds::MAX_RESET_HOUR),
                u64::from(fallback.reset_hour),
            ) as u32,
            reset_minute: bounded(
                keys::RESET_MINUTE,
                store.get_int(keys::RESET_MINUTE),
                0,
                u64::from(bounds::MAX_RESET_MINUTE),
                u64::from(fallback.reset_minute),
            ) as u32,
            display_mode,
            display_interval_minutes: bounded(
                keys::TIMER_DISPLAY_INTERVAL_MINUTES,
                store.get_int(keys::TIMER_DISPLAY_INTERVAL_MINUTES),
                bounds::MIN_DISPLAY_INTERVAL_MINUTES,
                bounds::MAX_DISPLAY_INTERVAL_MINUTES,
                fallback.display_interval_minutes,
            ),
            display_duration_seconds: bounded(
                keys::TIMER_DISPLAY_DURATION_SECONDS,
                store.get_int(keys::TIMER_DISPLAY_DURATION_SECONDS),
                bounds::MIN_DISPLAY_DURATION_SECONDS,
                bounds::MAX_DISPLAY_DURATION_SECONDS,
                fallback.display_duration_seconds,
            ),
        };

        debug!(
            level_1_max = snapshot.level_1_max_time_seconds,
            level_2_duration = snapshot.level_2_duration_seconds,
            reset = %format!("{:02}:{:02}", snapshot.reset_hour, snapshot.reset_minute),
            mode = %snapshot.display_mode,
            "Loaded configuration snapshot"
        );
        snapshot
    }

    pub fn style(&self, level: Level) -> &LevelStyle {
        &self.levels[level.index()]
    }

    /// First second of level 3
    pub fn level_3_start_seconds(&self) -> u64 {
        self.level_1_max_time_seconds + self.level_2_duration_seconds
    }
}

/// Below the minimum uses the default, above the maximum clamps to the maximum
fn bounded(key: &str, raw: Option<i64>, min: u64, max: u64, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    if raw < 0 || (raw as u64) < min {
        warn!(key = %key, value = raw, min = min, using = default, "Setting below minimum, using default");
        default
    } else if raw as u64 > max {
        warn!(key = %key, value = raw, max = max, "Setting exceeds maximum, clamping");
        max
    } else {
        raw as u64
    }
}

/// Colors are stored either as ARGB integers or as hex strings
fn read_color<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<Color> {
    match store.get(key)? {
        Value::Int(n) => Some(Color::from_stored(n)),
        Value::Str(hex) => {
            let parsed = Color::parse(&hex);
            if parsed.is_none() {
                warn!(key = %key, value = %hex, "Invalid color string, using default");
            }
            parsed
        }
        other => {
            warn!(key = %key, value = ?other, "Unexpected color value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::anchor::Anchor;
    use crate::store::MemoryStore;

    #[test]
    fn test_empty_store_yields_defaults() {
        let snapshot = ConfigSnapshot::load(&MemoryStore::new());
        assert_eq!(snapshot, ConfigSnapshot::default());
        assert_eq!(snapshot.style(Level::One).color, Color::GREEN);
        assert_eq!(
            snapshot.style(Level::Two).position,
            PositionChoice::Named(Anchor::MiddleLeft)
        );
        assert!(snapshot.style(Level::Three).blink);
        assert_eq!(snapshot.level_3_start_seconds(), 3600);
    }

    #[test]
    fn test_font_size_bounds() {
        let mut store = MemoryStore::new();
        store.set_int(&keys::font_size(1), 5);
        store.set_int(&keys::font_size(2), 500);
        store.set_int(&keys::font_size(3), 40);

        let snapshot = ConfigSnapshot::load(&store);
        assert_eq!(snapshot.style(Level::One).font_size, defaults::LEVEL_1_FONT_SIZE);
        assert_eq!(snapshot.style(Level::Two).font_size, bounds::MAX_FONT_SIZE);
        assert_eq!(snapshot.style(Level::Three).font_size, 40);
    }

    #[test]
    fn test_level_time_bounds() {
        let mut store = MemoryStore::new();
        store.set_int(keys::LEVEL_1_MAX_TIME_SECONDS, 0);
        store.set_int(keys::LEVEL_2_DURATION_SECONDS, 24 * 3600);

        let snapshot = ConfigSnapshot::load(&store);
        assert_eq!(snapshot.level_1_max_time_seconds, defaults::LEVEL_1_MAX_TIME_SECONDS);
        assert_eq!(snapshot.level_2_duration_seconds, bounds::MAX_LEVEL_2_DURATION_SECONDS);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let mut store = MemoryStore::new();
        store.set_str(&keys::font_size(1), "big");
        store.set_str(&keys::color(2), "yellowish");
        store.set_int(&keys::blinking(3), 1);
        store.set_str(keys::TIMER_DISPLAY_MODE, "sometimes");
        store.set_int(keys::RESET_HOUR, 30);

        let snapshot = ConfigSnapshot::load(&store);
        assert_eq!(snapshot.style(Level::One).font_size, defaults::LEVEL_1_FONT_SIZE);
        assert_eq!(snapshot.style(Level::Two).color, defaults::LEVEL_2_COLOR);
        assert!(snapshot.style(Level::Three).blink);
        assert_eq!(snapshot.display_mode, DisplayMode::Always);
        assert_eq!(snapshot.reset_hour, bounds::MAX_RESET_HOUR);
    }

    #[test]
    fn test_colors_accept_ints_and_hex() {
        let mut store = MemoryStore::new();
        store.set_int(&keys::color(1), -65536);
        store.set_str(&keys::color(2), "#0000FF");

        let snapshot = ConfigSnapshot::load(&store);
        assert_eq!(snapshot.style(Level::One).color, Color::RED);
        assert_eq!(snapshot.style(Level::Two).color, Color::from_argb32(0xFF00_00FF));
    }

    #[test]
    fn test_interval_mode_settings() {
        let mut store = MemoryStore::new();
        store.set_str(keys::TIMER_DISPLAY_MODE, "interval");
        store.set_int(keys::TIMER_DISPLAY_INTERVAL_MINUTES, 3);
        store.set_int(keys::TIMER_DISPLAY_DURATION_SECONDS, 45);

        let snapshot = ConfigSnapshot::load(&store);
        assert_eq!(snapshot.display_mode, DisplayMode::Interval);
        assert_eq!(snapshot.display_interval_minutes, 3);
        assert_eq!(snapshot.display_duration_seconds, bounds::MAX_DISPLAY_DURATION_SECONDS);
    }
}
