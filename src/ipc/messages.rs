//! Control socket message types (CLI client <-> tracking daemon)

use serde::{Deserialize, Serialize};

use crate::event::Signal;
use crate::store::Value;

/// Requests sent from a client to the daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ControlRequest {
    /// Deliver a system notification as if the platform had sent it
    Signal(Signal),

    /// Snapshot of the tracking state
    Status,

    /// Write one setting and apply it like a settings-changed notification
    SetSetting { key: String, value: Value },

    /// Choose a level's position; named anchors drop its custom offset
    SelectPosition { level: u8, position: String },

    /// Health check
    Ping,

    /// Request graceful shutdown
    Shutdown,
}

/// Responses sent from the daemon to a client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ControlResponse {
    /// Request was processed
    Ack,

    Status(StatusReport),

    /// Health check response
    Pong,

    Error(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub accumulated_seconds: u64,
    pub display_text: String,
    pub level: u8,
    pub screen_on: bool,
    pub unlocked: bool,
    pub running: bool,
    pub timer_visible: bool,
    pub manually_hidden: bool,
    pub blinking: bool,
    pub counter_key: String,
    /// RFC 3339 instant of the next daily reset
    pub next_reset: Option<String>,
}
