#![forbid(unsafe_code)]

//! Screen-time tracking daemon: counts active (screen on and unlocked)
//! seconds, shows an escalating on-screen counter and resets daily.

pub mod color;
pub mod config;
pub mod constants;
pub mod display;
pub mod drag;
pub mod event;
pub mod history;
pub mod ipc;
pub mod level;
pub mod position;
pub mod probe;
pub mod router;
pub mod schedule;
pub mod store;
pub mod timers;
pub mod tracker;
pub mod types;
