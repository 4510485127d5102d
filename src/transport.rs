//! Named-pipe transport: server ingress FIFO and per-client private egress FIFOs.
//!
//! Grounded on `src/utils.c`'s `create_fifo` (a `stat`-then-`mkfifo` guard) and
//! `src/server_ops.c`'s `send_response` (open client FIFO for writing, write
//! reply, close). Opening a FIFO end blocks until a peer has the other end
//! open, matching SPEC_FULL.md §5's suspension-point model; here that wait
//! happens on a `tokio` blocking-pool thread via `tokio::fs`, so it never
//! stalls the dispatcher loop itself.

use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use snafu::ResultExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::error::{self, TransportError};
use crate::wire::{Request, REQUEST_SIZE};

pub const SERVER_FIFO: &str = "tmp/server_fifo";

/// Path of the private reply FIFO for a given client PID.
pub fn client_fifo_path(client_pid: i32) -> PathBuf {
    PathBuf::from(format!("tmp/client_fifo_{client_pid}"))
}

/// Creates a FIFO at `path` if one doesn't already exist, mirroring
/// `create_fifo`'s "already exists is fine, keep going" behavior.
pub fn ensure_fifo(path: impl AsRef<Path>) -> Result<(), TransportError> {
    let path = path.as_ref();
    if path.exists() {
        debug!(?path, "fifo already exists");
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR).context(error::CreateFifoSnafu {
        path: path.to_path_buf(),
    })
}

/// Removes the server's ingress FIFO, best-effort (mirrors the source's
/// `unlink(SERVER_FIFO)` on shutdown).
pub fn remove_server_fifo() {
    let _ = std::fs::remove_file(SERVER_FIFO);
}

/// The server's ingress side: opens [`SERVER_FIFO`] for reading and yields
/// one parsed [`Request`] at a time.
pub struct ServerIngress {
    file: File,
}

impl ServerIngress {
    pub async fn open() -> Result<Self, TransportError> {
        ensure_fifo(SERVER_FIFO)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true) // keep a writer reference alive so reads don't see EOF between clients
            .open(SERVER_FIFO)
            .await
            .context(error::OpenFifoSnafu {
                path: PathBuf::from(SERVER_FIFO),
            })?;
        Ok(ServerIngress { file })
    }

    /// Reads exactly one fixed-size [`Request`]. Returns `None` on a clean
    /// EOF (no writer and no data left).
    pub async fn recv(&mut self) -> std::io::Result<Option<Request>> {
        let mut buf = vec![0u8; REQUEST_SIZE];
        let mut read_total = 0;
        while read_total < REQUEST_SIZE {
            let n = self.file.read(&mut buf[read_total..]).await?;
            if n == 0 {
                if read_total == 0 {
                    return Ok(None);
                }
                break;
            }
            read_total += n;
        }
        Ok(Request::from_bytes(&buf))
    }
}

/// Opens a client's private reply FIFO for writing, writes `payload`, and
/// closes it. The client must already have it open for reading, or this
/// suspends until it does (SPEC_FULL.md §5, documented operational limitation
/// if the client never shows up).
pub async fn send_reply(client_pid: i32, payload: &[u8]) -> Result<(), TransportError> {
    let path = client_fifo_path(client_pid);
    let mut file = OpenOptions::new()
        .write(true)
        .open(&path)
        .await
        .context(error::OpenFifoSnafu { path: path.clone() })?;
    file.write_all(payload)
        .await
        .map_err(|source| TransportError::OpenFifo { path, source })?;
    Ok(())
}
