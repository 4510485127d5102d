//! Error types for every fallible component, one enum per concern.
//!
//! Mirrors the teacher's `snafu`-based error style (see `vector_buffers::disk_v2::writer::WriterError`):
//! one variant per failure kind, `#[snafu(display(...))]` messages, `source` chaining for I/O causes.

use std::io;
use std::path::PathBuf;

use snafu::Snafu;

/// Failures surfaced by the storage engine.
#[derive(Debug, Snafu)]
pub enum StorageError {
    #[snafu(display("failed to open storage file {:?}: {}", path, source))]
    OpenStorage { path: PathBuf, source: io::Error },

    #[snafu(display("I/O error on storage file: {}", source))]
    Io { source: io::Error },

    #[snafu(display("slot {} is not a valid document", id))]
    NotFound { id: i64 },

    #[snafu(display("allocation failure while growing the index table"))]
    AllocFailure,
}

/// Failures that can occur while serving a single request.
#[derive(Debug, Snafu)]
pub enum DispatchError {
    #[snafu(display("bad argument: {}", reason))]
    BadArgument { reason: String },

    #[snafu(display("I/O failure talking to a pipe: {}", source))]
    Io { source: io::Error },

    #[snafu(display("storage engine error: {}", source))]
    Storage { source: StorageError },

    #[snafu(display("failed to spawn keyword-matching subprocess: {}", source))]
    ChildSpawn { source: io::Error },

    #[snafu(display("keyword-matching subprocess exited abnormally with status {:?}", status))]
    ChildAbnormalExit { status: Option<i32> },
}

/// Failures setting up the named-pipe transport.
#[derive(Debug, Snafu)]
pub enum TransportError {
    #[snafu(display("failed to create FIFO at {:?}: {}", path, source))]
    CreateFifo {
        path: PathBuf,
        source: nix::errno::Errno,
    },

    #[snafu(display("failed to open FIFO {:?}: {}", path, source))]
    OpenFifo { path: PathBuf, source: io::Error },
}
