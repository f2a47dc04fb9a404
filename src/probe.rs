//! Screen power and lock state from the X server
//!
//! DPMS reports whether the monitor is powered; the MIT-SCREEN-SAVER
//! extension reports whether a saver (or a locker driving it) is active.
//! A server without either extension is treated as always on and unlocked.

use anyhow::{Context, Result};
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::dpms::{self, ConnectionExt as _};
use x11rb::protocol::screensaver::{self, ConnectionExt as _};
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use crate::tracker::DeviceProbe;

/// DPMS reply fields that matter: whether DPMS is enabled and the power level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerReport {
    pub enabled: bool,
    pub level: dpms::DPMSMode,
}

/// `(screen_on, unlocked)` from what the server reported.
/// An active or cycling saver means the session is not in use.
pub fn device_state(power: Option<PowerReport>, saver: Option<screensaver::State>) -> (bool, bool) {
    let screen_on = match power {
        Some(report) if report.enabled => report.level == dpms::DPMSMode::ON,
        _ => true,
    };
    let saver_active = matches!(
        saver,
        Some(state) if state == screensaver::State::ON || state == screensaver::State::CYCLE
    );
    (screen_on, screen_on && !saver_active)
}

pub struct X11Probe {
    conn: RustConnection,
    root: Window,
}

impl X11Probe {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to the X server for state probing")?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .context(format!("X server has no screen {screen_num}"))?
            .root;
        let probe = Self { conn, root };
        info!(
            dpms = probe.power().is_some(),
            screensaver = probe.saver().is_some(),
            "Screen state probe ready"
        );
        Ok(probe)
    }

    fn power(&self) -> Option<PowerReport> {
        let reply = self
            .conn
            .dpms_info()
            .map_err(anyhow::Error::from)
            .and_then(|cookie| cookie.reply().map_err(anyhow::Error::from));
        match reply {
            Ok(reply) => Some(PowerReport {
                enabled: reply.state,
                level: reply.power_level,
            }),
            Err(e) => {
                debug!(error = %e, "DPMS query failed");
                None
            }
        }
    }

    fn saver(&self) -> Option<screensaver::State> {
        let reply = self
            .conn
            .screensaver_query_info(self.root)
            .map_err(anyhow::Error::from)
            .and_then(|cookie| cookie.reply().map_err(anyhow::Error::from));
        match reply {
            Ok(reply) => Some(screensaver::State::from(reply.state)),
            Err(e) => {
                debug!(error = %e, "Screen saver query failed");
                None
            }
        }
    }

    fn query(&self) -> (bool, bool) {
        device_state(self.power(), self.saver())
    }
}

impl DeviceProbe for X11Probe {
    fn is_screen_on(&self) -> bool {
        self.query().0
    }

    fn is_unlocked(&self) -> bool {
        self.query().1
    }
}
