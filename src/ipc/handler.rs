//! Control socket listener of the daemon

use anyhow::{Context, Result};
use std::os::unix::net::UnixStream;
use std::sync::mpsc::{self, Sender};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::event::Event;
use crate::ipc::{ControlRequest, ControlResponse, ControlServer, read_message, write_message};

/// How long a client waits on the router before getting an error back
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn the listener thread. Requests are forwarded to the router one at a time.
pub fn spawn_control_listener(
    server: ControlServer,
    events: Sender<Event>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(e) = run_control_loop(&server, &events) {
            error!(error = ?e, "Control listener thread crashed");
        }
    })
}

fn run_control_loop(server: &ControlServer, events: &Sender<Event>) -> Result<()> {
    info!(socket = ?server.path(), "Control listener started");

    loop {
        let mut stream = server
            .accept()
            .context("Failed to accept control connection")?;
        debug!("Control client connected");

        match serve_client(&mut stream, events) {
            Ok(ClientEnd::Disconnected) => debug!("Control client disconnected"),
            Ok(ClientEnd::RouterGone) => {
                info!("Router stopped, closing control listener");
                return Ok(());
            }
            Err(e) => warn!(error = ?e, "Control connection closed with error"),
        }
    }
}

enum ClientEnd {
    Disconnected,
    RouterGone,
}

fn serve_client(stream: &mut UnixStream, events: &Sender<Event>) -> Result<ClientEnd> {
    loop {
        let request: ControlRequest = match read_message(stream) {
            Ok(request) => request,
            Err(_) => return Ok(ClientEnd::Disconnected),
        };
        debug!(?request, "Control request");

        let (reply_tx, reply_rx) = mpsc::channel();
        if events
            .send(Event::Control {
                request,
                reply: reply_tx,
            })
            .is_err()
        {
            write_message(stream, &ControlResponse::Error("daemon is shutting down".into()))?;
            return Ok(ClientEnd::RouterGone);
        }

        let response = reply_rx
            .recv_timeout(REPLY_TIMEOUT)
            .unwrap_or_else(|e| ControlResponse::Error(format!("no reply from tracker: {e}")));
        write_message(stream, &response)?;
    }
}
