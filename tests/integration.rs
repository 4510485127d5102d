//! End-to-end tests driving a real dispatcher loop over real named pipes.
//!
//! Each test starts a dispatcher task against a fresh `tempfile::TempDir`
//! (matching `storage.rs`'s unit-test style) and talks to it the way
//! `bin/dclient.rs` does: encode a `Request`, write it to the server FIFO,
//! read a `Document`-shaped reply off a private FIFO. This exercises
//! `transport.rs` for real rather than mocking the pipes away.

use std::path::PathBuf;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use dserver::audit::AuditLog;
use dserver::dispatcher::Dispatcher;
use dserver::document::{Document, RECORD_SIZE};
use dserver::storage::StorageEngine;
use dserver::transport::{self, ServerIngress};
use dserver::wire::{Operation, Request};

/// Runs `body` with the current directory pointed at a fresh temp dir (so
/// `tmp/server_fifo`, `tmp/metadata.bin`, etc. land in an isolated sandbox).
/// Each test function below runs in its own `#[tokio::test]` (single-threaded
/// runtime, one OS thread per test binary invocation under the default
/// harness), matching the same single-current-dir assumption `storage.rs`'s
/// unit tests already make.
async fn in_sandbox<F, Fut>(body: F)
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let dir = TempDir::new().unwrap();
    let prev = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    body(dir.path().to_path_buf()).await;

    std::env::set_current_dir(prev).unwrap();
}

async fn send(request: &Request) {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(transport::SERVER_FIFO)
        .await
        .unwrap();
    file.write_all(&request.to_bytes()).await.unwrap();
}

async fn recv_reply(pid: i32) -> Document {
    let path = transport::client_fifo_path(pid);
    transport::ensure_fifo(&path).unwrap();
    let mut file = tokio::fs::OpenOptions::new().read(true).open(&path).await.unwrap();
    let mut buf = [0u8; RECORD_SIZE];
    file.read_exact(&mut buf).await.unwrap();
    let doc = Document::from_bytes(&buf);
    let _ = std::fs::remove_file(&path);
    doc
}

fn request(pid: i32, operation: Operation, title: &str, authors: &str, year: &str, path: &str) -> Request {
    Request {
        client_pid: pid,
        operation,
        title: title.to_string(),
        authors: authors.to_string(),
        year: year.to_string(),
        path: path.to_string(),
    }
}

#[tokio::test]
async fn index_consult_remove_round_trip() {
    in_sandbox(|document_folder| async move {
        let storage = StorageEngine::start(&document_folder, None, 4).unwrap();
        let audit = AuditLog::spawn("tmp/requests.log");
        let mut dispatcher = Dispatcher::new(storage, document_folder, audit);
        let mut ingress = ServerIngress::open().await.unwrap();

        let server = tokio::spawn(async move { dispatcher.run(&mut ingress).await });

        send(&request(1001, Operation::Index, "Paper", "A. Author", "2024", "paper.txt")).await;
        let reply = recv_reply(1001).await;
        let id: u32 = reply.title().parse().unwrap();

        send(&request(1002, Operation::Consult, &id.to_string(), "", "", "")).await;
        let consulted = recv_reply(1002).await;
        assert_eq!(consulted.title(), "Paper");
        assert_eq!(consulted.authors(), "A. Author");

        send(&request(1003, Operation::Remove, &id.to_string(), "", "", "")).await;
        let removed = recv_reply(1003).await;
        assert_eq!(removed.title(), id.to_string());

        send(&request(1004, Operation::Consult, &id.to_string(), "", "", "")).await;
        let gone = recv_reply(1004).await;
        assert!(gone.is_not_found());

        send(&request(9999, Operation::Shutdown, "", "", "", "")).await;
        recv_reply(9999).await;
        server.await.unwrap().unwrap();
    })
    .await;
}

#[tokio::test]
async fn consult_of_never_indexed_id_reports_not_found() {
    in_sandbox(|document_folder| async move {
        let storage = StorageEngine::start(&document_folder, None, 4).unwrap();
        let audit = AuditLog::spawn("tmp/requests.log");
        let mut dispatcher = Dispatcher::new(storage, document_folder, audit);
        let mut ingress = ServerIngress::open().await.unwrap();

        let server = tokio::spawn(async move { dispatcher.run(&mut ingress).await });

        send(&request(2001, Operation::Consult, "7", "", "", "")).await;
        let reply = recv_reply(2001).await;
        assert!(reply.is_not_found());

        send(&request(9999, Operation::Shutdown, "", "", "", "")).await;
        recv_reply(9999).await;
        server.await.unwrap().unwrap();
    })
    .await;
}

#[tokio::test]
async fn kill_is_a_no_op_that_leaves_the_dispatcher_running() {
    in_sandbox(|document_folder| async move {
        let storage = StorageEngine::start(&document_folder, None, 4).unwrap();
        let audit = AuditLog::spawn("tmp/requests.log");
        let mut dispatcher = Dispatcher::new(storage, document_folder, audit);
        let mut ingress = ServerIngress::open().await.unwrap();

        let server = tokio::spawn(async move { dispatcher.run(&mut ingress).await });

        // Kill gets no reply on the wire; the loop must keep serving other
        // clients rather than aborting in-flight work or shutting down.
        send(&request(4001, Operation::Kill, "", "", "", "")).await;

        send(&request(4002, Operation::Index, "Survives", "A", "2024", "paper.txt")).await;
        let reply = recv_reply(4002).await;
        assert!(reply.title().parse::<u32>().is_ok());

        send(&request(9999, Operation::Shutdown, "", "", "", "")).await;
        recv_reply(9999).await;
        server.await.unwrap().unwrap();
    })
    .await;
}

#[tokio::test]
async fn shutdown_checkpoints_and_restart_sees_prior_state() {
    in_sandbox(|document_folder| async move {
        let storage = StorageEngine::start(&document_folder, None, 4).unwrap();
        let audit = AuditLog::spawn("tmp/requests.log");
        let mut dispatcher = Dispatcher::new(storage, document_folder.clone(), audit);
        let mut ingress = ServerIngress::open().await.unwrap();

        let server = tokio::spawn(async move {
            dispatcher.run(&mut ingress).await.unwrap();
            dispatcher.checkpoint().await.unwrap();
            dispatcher.shutdown_audit().await;
        });

        send(&request(3001, Operation::Index, "Kept", "A", "2020", "p")).await;
        recv_reply(3001).await;

        send(&request(9999, Operation::Shutdown, "", "", "", "")).await;
        recv_reply(9999).await;
        server.await.unwrap();
        transport::remove_server_fifo();

        let restarted = StorageEngine::start(&document_folder, None, 4).unwrap();
        assert!(restarted.is_valid(0));
    })
    .await;
}
