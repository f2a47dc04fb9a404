//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Deferred-callback cadences of the tracking core
pub mod timing {
    use std::time::Duration;

    /// Tick interval while the device is on and unlocked
    pub const ACTIVE_TICK: Duration = Duration::from_millis(1000);

    /// Tick interval while the device is idle (screen off or locked)
    pub const IDLE_TICK: Duration = Duration::from_millis(2000);

    /// Blink toggle cadence (half a second)
    pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);

    /// Delay before a tap-hidden overlay shows itself again
    pub const AUTO_UNHIDE_DELAY: Duration = Duration::from_secs(5);

    /// Longest wait of the router loop between clock-watch samples
    pub const CLOCK_WATCH_INTERVAL: Duration = Duration::from_secs(1);

    /// Wall-clock drift (against the monotonic clock) treated as a manual time change
    pub const CLOCK_JUMP_TOLERANCE: Duration = Duration::from_secs(2);
}

/// Pointer gesture discrimination
pub mod gesture {
    use std::time::Duration;

    /// Movement (per axis, in pixels) beyond which a press becomes a drag
    pub const DRAG_THRESHOLD_PX: i32 = 10;

    /// A release within this long after the press (without dragging) is a tap
    pub const TAP_MAX_DURATION: Duration = Duration::from_millis(200);

    /// X11 button number that drives the overlay (left button)
    pub const BUTTON_PRIMARY: u8 = 1;
}

/// Documented validation bounds for stored settings
pub mod bounds {
    pub const MIN_FONT_SIZE: u32 = 18;
    pub const MAX_FONT_SIZE: u32 = 60;

    pub const MIN_LEVEL_1_TIME_SECONDS: u64 = 5 * 60;
    pub const MAX_LEVEL_1_TIME_SECONDS: u64 = 60 * 60;

    pub const MIN_LEVEL_2_DURATION_SECONDS: u64 = 15 * 60;
    pub const MAX_LEVEL_2_DURATION_SECONDS: u64 = 60 * 60;

    pub const MIN_DISPLAY_INTERVAL_MINUTES: u64 = 1;
    pub const MAX_DISPLAY_INTERVAL_MINUTES: u64 = 10;

    pub const MIN_DISPLAY_DURATION_SECONDS: u64 = 1;
    pub const MAX_DISPLAY_DURATION_SECONDS: u64 = 30;

    pub const MAX_RESET_HOUR: u32 = 23;
    pub const MAX_RESET_MINUTE: u32 = 59;
}

/// Defaults used whenever a stored value is missing or malformed
pub mod defaults {
    use crate::color::Color;

    pub const LEVEL_1_COLOR: Color = Color::GREEN;
    pub const LEVEL_2_COLOR: Color = Color::YELLOW;
    pub const LEVEL_3_COLOR: Color = Color::RED;

    pub const LEVEL_1_POSITION: &str = "Top Right";
    pub const LEVEL_2_POSITION: &str = "Middle Left";
    pub const LEVEL_3_POSITION: &str = "Middle Center";

    pub const LEVEL_1_FONT_SIZE: u32 = 24;
    pub const LEVEL_2_FONT_SIZE: u32 = 26;
    pub const LEVEL_3_FONT_SIZE: u32 = 28;

    pub const LEVEL_1_BLINKING: bool = false;
    pub const LEVEL_2_BLINKING: bool = false;
    pub const LEVEL_3_BLINKING: bool = true;

    pub const LEVEL_1_MAX_TIME_SECONDS: u64 = 30 * 60;
    pub const LEVEL_2_DURATION_SECONDS: u64 = 30 * 60;

    pub const DISPLAY_MODE: &str = "always";
    pub const DISPLAY_INTERVAL_MINUTES: u64 = 1;
    pub const DISPLAY_DURATION_SECONDS: u64 = 5;

    pub const RESET_HOUR: u32 = 0;
    pub const RESET_MINUTE: u32 = 0;
}

/// Overlay colors that do not depend on the level
pub mod palette {
    use crate::color::Color;

    /// Semi-transparent black behind the counter text
    pub const OVERLAY_BACKGROUND: Color = Color::from_argb32(0x8000_0000);

    /// Text color while the blink phase is inverted
    pub const BLINK_TEXT: Color = Color::BLACK;
}

/// Persistence keys (string-keyed store)
pub mod keys {
    pub const LEVEL_1_MAX_TIME_SECONDS: &str = "level_1_max_time_seconds";
    pub const LEVEL_2_DURATION_SECONDS: &str = "level_2_duration_seconds";

    pub const TIMER_DISPLAY_MODE: &str = "timer_display_mode";
    pub const TIMER_DISPLAY_INTERVAL_MINUTES: &str = "timer_display_interval_minutes";
    pub const TIMER_DISPLAY_DURATION_SECONDS: &str = "timer_display_duration_seconds";

    pub const RESET_HOUR: &str = "reset_hour";
    pub const RESET_MINUTE: &str = "reset_minute";

    /// Epoch milliseconds of the next reset instant, refreshed on every persist
    pub const NEXT_RESET_TIMESTAMP: &str = "next_reset_timestamp";

    /// Set of analytics day keys written by the tracker
    pub const ANALYTICS_DATES: &str = "analytics_dates";

    /// Prefix of the per-period counter key (`screen_time_YYYY_DDD`)
    pub const DAILY_COUNTER_PREFIX: &str = "screen_time";

    /// Prefix of the per-day analytics key (`analytics_YYYY_MM_DD`)
    pub const ANALYTICS_PREFIX: &str = "analytics";

    pub fn color(level: u8) -> String {
        format!("level_{level}_color")
    }

    pub fn position(level: u8) -> String {
        format!("level_{level}_position")
    }

    pub fn font_size(level: u8) -> String {
        format!("level_{level}_font_size")
    }

    pub fn blinking(level: u8) -> String {
        format!("level_{level}_blinking_enabled")
    }

    pub fn use_custom_position(level: u8) -> String {
        format!("level_{level}_use_custom_position")
    }

    pub fn custom_x(level: u8) -> String {
        format!("level_{level}_custom_position_x")
    }

    pub fn custom_y(level: u8) -> String {
        format!("level_{level}_custom_position_y")
    }
}

/// Overlay window geometry
pub mod overlay {
    /// Distance from the screen edge for named anchors
    pub const EDGE_MARGIN: i32 = 16;

    /// Padding between the text and the window border
    pub const TEXT_PADDING: u16 = 8;

    /// Window opacity applied through _NET_WM_WINDOW_OPACITY (0xE0 of 0xFF)
    pub const WINDOW_OPACITY: u32 = 0xE0E0_E0E0;

    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// Core font used when no font matches the requested pixel size
    pub const FALLBACK_FONT: &[u8] = b"fixed";

    /// WM_CLASS of the overlay window
    pub const WM_CLASS: &[u8] = b"screen-timer\0screen-timer\0";
}

/// File and socket locations
pub mod paths {
    /// Directory name under the user's config/runtime dirs
    pub const APP_DIR: &str = "screen-timer";

    /// Store file name
    pub const STORE_FILENAME: &str = "store.json";

    /// Control socket file name
    pub const SOCKET_FILENAME: &str = "control.sock";
}
