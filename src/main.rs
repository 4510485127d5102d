//! Server entrypoint: parse arguments, stand up the transport and storage
//! engine, run the dispatch loop until SHUTDOWN/KILL, then exit.
//!
//! Grounded on `src/main.c`'s `main`: create the FIFO (exiting with a
//! distinguished status if that fails), start the server, loop accepting
//! requests, checkpoint and unlink the FIFO on the way out.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dserver::audit;
use dserver::cli::Cli;
use dserver::dispatcher::Dispatcher;
use dserver::storage::StorageEngine;
use dserver::transport;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // SPEC_FULL.md §4.11: -g/--quiet is reinterpreted as lowering the default
    // log level to WARN rather than discarding output entirely. An explicit
    // RUST_LOG still wins over either default.
    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    if let Err(e) = transport::ensure_fifo(transport::SERVER_FIFO) {
        error!(error = %e, "failed to create server fifo");
        // SPEC_FULL.md §4.12's exit-code contract: 2 for a pipe-creation
        // failure, distinct from any other startup error.
        std::process::exit(2);
    }

    if !cli.quiet {
        println!(
            "dserver listening on {} (cache: {:?}, size {})",
            transport::SERVER_FIFO,
            cli.cache_kind,
            cli.cache_size
        );
    }

    let storage = match StorageEngine::start(&cli.document_folder, cli.cache_kind, cli.cache_size) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to start storage engine");
            std::process::exit(exitcode::OSERR);
        }
    };

    let audit = audit::AuditLog::spawn(audit::REQUESTS_LOG);

    let mut ingress = match transport::ServerIngress::open().await {
        Ok(i) => i,
        Err(e) => {
            error!(error = %e, "failed to open server fifo");
            std::process::exit(2);
        }
    };

    let mut dispatcher = Dispatcher::new(storage, cli.document_folder.clone(), audit);
    match dispatcher.run(&mut ingress).await {
        Ok(()) => {
            if let Err(e) = dispatcher.checkpoint().await {
                error!(error = %e, "failed to write shutdown checkpoint");
            }
        }
        Err(e) => error!(error = %e, "dispatcher loop exited with an error"),
    }
    dispatcher.shutdown_audit().await;

    transport::remove_server_fifo();
    info!("server stopped");
    std::process::exit(exitcode::OK);
}
