//! Background task that serialises every request into a human-readable log.
//!
//! Grounded on `src/server_ops.c`'s `record_requests`: reads `Request`s off a
//! pipe until EOF, formats `"[<pid>] requested <op> | args: <args> |
//! (<timestamp>)\n"`, and appends to `REQUESTS_LOG`. The pipe becomes an
//! unbounded `tokio::mpsc` channel so the dispatcher loop never blocks on log
//! I/O (SPEC_FULL.md §4.8 step 1).

use std::path::Path;

use chrono::Local;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::wire::Request;

pub const REQUESTS_LOG: &str = "tmp/requests.log";

/// Handle held by the dispatcher: a sender into the audit channel plus the
/// task's join handle, so shutdown can flush cleanly (drop the sender, await
/// the task).
pub struct AuditLog {
    sender: mpsc::UnboundedSender<Request>,
    task: JoinHandle<()>,
}

impl AuditLog {
    /// Spawns the audit task appending to `REQUESTS_LOG` under `log_path`.
    pub fn spawn(log_path: impl AsRef<Path> + Send + 'static) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(receiver, log_path));
        AuditLog { sender, task }
    }

    /// Records a request. Never blocks the caller (unbounded channel).
    pub fn record(&self, request: Request) {
        // A closed receiver only happens if the audit task panicked; drop the
        // request rather than propagate a panic into the dispatcher loop.
        let _ = self.sender.send(request);
    }

    /// Closes the channel and waits for the audit task to drain and flush.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.task.await {
            warn!(error = %e, "audit log task panicked");
        }
    }
}

async fn run(mut receiver: mpsc::UnboundedReceiver<Request>, log_path: impl AsRef<Path>) {
    let log_path = log_path.as_ref();
    if let Some(parent) = log_path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }

    let file = OpenOptions::new().create(true).append(true).open(log_path).await;
    let mut file = match file {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "failed to open requests log, audit entries will be dropped");
            return;
        }
    };

    while let Some(request) = receiver.recv().await {
        let line = format_entry(&request);
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!(error = %e, "failed to write audit log entry");
        }
    }
}

fn format_entry(request: &Request) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        "[{}] requested {} | args: {} | ({})\n",
        request.client_pid,
        request.operation.log_letter(),
        request.audit_args(),
        timestamp
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Operation;
    use tempfile::TempDir;

    #[tokio::test]
    async fn flushes_every_recorded_request_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("requests.log");

        let audit = AuditLog::spawn(log_path.clone());
        audit.record(Request {
            client_pid: 42,
            operation: Operation::Index,
            title: "T1".into(),
            authors: "A1".into(),
            year: "2020".into(),
            path: "t1.txt".into(),
        });
        audit.shutdown().await;

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("[42] requested A"));
        assert!(contents.contains("T1 A1 2020 t1.txt"));
    }

    #[test]
    fn format_entry_uses_op_letter_and_audit_args() {
        let request = Request {
            client_pid: 7,
            operation: Operation::Remove,
            title: "3".into(),
            authors: String::new(),
            year: String::new(),
            path: String::new(),
        };
        let line = format_entry(&request);
        assert!(line.starts_with("[7] requested D | args: 3 |"));
    }
}
