//! Everything the router consumes, funneled through one channel

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::Sender;

use crate::ipc::{ControlRequest, ControlResponse};
use crate::types::Point;

/// Asynchronous system notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Signal {
    ScreenOn,
    ScreenOff,
    /// Unlock completed
    UserPresent,
    SettingsChanged,
    TimeChanged,
    DateChanged,
    TimezoneChanged,
    BootCompleted,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::ScreenOn => "screen-on",
            Signal::ScreenOff => "screen-off",
            Signal::UserPresent => "user-present",
            Signal::SettingsChanged => "settings-changed",
            Signal::TimeChanged => "time-changed",
            Signal::DateChanged => "date-changed",
            Signal::TimezoneChanged => "timezone-changed",
            Signal::BootCompleted => "boot-completed",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw pointer input on the overlay, in root-window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up(Point),
}

#[derive(Debug)]
pub enum Event {
    Signal(Signal),
    Pointer(PointerEvent),
    /// The overlay surface needs repainting
    Redraw,
    /// Request from the control socket; the answer goes back on `reply`
    Control {
        request: ControlRequest,
        reply: Sender<ControlResponse>,
    },
    Shutdown,
}
