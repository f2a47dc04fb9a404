//! Control socket via Unix domain sockets
//!
//! One request, one response, framed as length-prefixed JSON
//! (u32 little-endian length, then the payload).

use anyhow::{Context, Result, anyhow, ensure};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::Permissions;
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

mod handler;
mod messages;

pub use handler::spawn_control_listener;
pub use messages::{ControlRequest, ControlResponse, StatusReport};

use crate::constants::paths;

const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Owner-only access
const SOCKET_MODE: u32 = 0o700;

/// `$XDG_RUNTIME_DIR/screen-timer/control.sock`, else under the cache dir
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir)
            .join(paths::APP_DIR)
            .join(paths::SOCKET_FILENAME));
    }

    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(paths::APP_DIR).join(paths::SOCKET_FILENAME))
}

/// CLI side of the control socket
pub struct ControlClient {
    pub(crate) stream: UnixStream,
}

impl ControlClient {
    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).context(format!(
            "Failed to connect to screen-timer daemon at {} (is it running?)",
            path.display()
        ))?;
        Ok(Self { stream })
    }

    pub fn request(&mut self, req: &ControlRequest) -> Result<ControlResponse> {
        write_message(&mut self.stream, req)?;
        read_message(&mut self.stream)
    }
}

pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl ControlServer {
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create socket directory: {}", parent.display()))?;
        }

        // A live daemon answers; anything else is a stale file
        if socket_path.exists() {
            if UnixStream::connect(&socket_path).is_ok() {
                return Err(anyhow!(
                    "Another screen-timer daemon is already listening at {}",
                    socket_path.display()
                ));
            }
            std::fs::remove_file(&socket_path)
                .context(format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("Failed to bind socket at {}", socket_path.display()))?;
        std::fs::set_permissions(&socket_path, Permissions::from_mode(SOCKET_MODE))
            .context("Failed to restrict control socket to its owner")?;

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Blocks until a client connects
    pub fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .context("Failed to accept IPC connection")?;
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

pub(crate) fn write_message<W: Write, T: Serialize>(stream: &mut W, msg: &T) -> Result<()> {
    let payload = serde_json::to_vec(msg).context("Failed to encode control message")?;
    ensure!(
        payload.len() <= MAX_MESSAGE_SIZE,
        "Control message of {} bytes exceeds {MAX_MESSAGE_SIZE}",
        payload.len()
    );

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    stream
        .write_all(&frame)
        .and_then(|()| stream.flush())
        .context("Failed to send control message")
}

pub(crate) fn read_message<R: Read, T: DeserializeOwned>(stream: &mut R) -> Result<T> {
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .context("Failed to read control message header")?;
    let len = u32::from_le_bytes(header) as usize;
    ensure!(
        len <= MAX_MESSAGE_SIZE,
        "Control message of {len} bytes exceeds {MAX_MESSAGE_SIZE}"
    );

    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .context("Failed to read control message body")?;
    serde_json::from_slice(&payload).context("Failed to decode control message")
}
