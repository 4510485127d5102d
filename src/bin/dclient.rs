//! Minimal client: encodes one request, sends it down [`transport::SERVER_FIFO`],
//! opens its own private reply FIFO, and prints whatever comes back.
//!
//! Grounded on `src/main.c`'s client-mode argument handling (one operation
//! per invocation). The source used `getopt`-style single-letter flags; here
//! each operation is its own subcommand, with a single-letter alias matching
//! the audit-log letter already assigned to that [`Operation`] in `wire.rs`:
//! `add`/`a` (Index), `delete`/`d` (Remove), `consult`/`c` (Consult),
//! `count-word`/`l` (CountWord), `list-word`/`s` (ListWord), `shutdown`/`f`
//! (Shutdown), `kill`/`k` (Kill, no log letter of its own).

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;

use dserver::document::{Document, RECORD_SIZE};
use dserver::transport;
use dserver::wire::{Operation, Request};

#[derive(Debug, Parser)]
#[command(name = "dclient", about = "Client for the document-metadata index server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Index a new document.
    #[command(name = "add", visible_alias = "a")]
    Add {
        title: String,
        authors: String,
        year: String,
        path: String,
    },
    /// Remove a document by slot id.
    #[command(name = "delete", visible_alias = "d")]
    Delete { id: u32 },
    /// Fetch a document by slot id.
    #[command(name = "consult", visible_alias = "c")]
    Consult { id: u32 },
    /// Count occurrences of a keyword in one document's file.
    #[command(name = "count-word", visible_alias = "l")]
    CountWord { id: u32, keyword: String },
    /// List the slot ids of documents whose file contains a keyword.
    #[command(name = "list-word", visible_alias = "s")]
    ListWord {
        keyword: String,
        /// Number of worker tasks the server shards the search across.
        #[arg(default_value_t = 4)]
        workers: u32,
    },
    /// Ask the server to checkpoint and stop.
    #[command(name = "shutdown", visible_alias = "f")]
    Shutdown,
    /// Ask the server to stop immediately, without a checkpoint.
    #[command(name = "kill", visible_alias = "k")]
    Kill,
}

fn build_request(pid: i32, command: Command) -> Request {
    let empty = String::new;
    match command {
        Command::Add { title, authors, year, path } => Request {
            client_pid: pid,
            operation: Operation::Index,
            title,
            authors,
            year,
            path,
        },
        Command::Delete { id } => Request {
            client_pid: pid,
            operation: Operation::Remove,
            title: id.to_string(),
            authors: empty(),
            year: empty(),
            path: empty(),
        },
        Command::Consult { id } => Request {
            client_pid: pid,
            operation: Operation::Consult,
            title: id.to_string(),
            authors: empty(),
            year: empty(),
            path: empty(),
        },
        Command::CountWord { id, keyword } => Request {
            client_pid: pid,
            operation: Operation::CountWord,
            title: id.to_string(),
            authors: keyword,
            year: empty(),
            path: empty(),
        },
        Command::ListWord { keyword, workers } => Request {
            client_pid: pid,
            operation: Operation::ListWord,
            title: keyword,
            authors: workers.to_string(),
            year: empty(),
            path: empty(),
        },
        Command::Shutdown => Request {
            client_pid: pid,
            operation: Operation::Shutdown,
            title: empty(),
            authors: empty(),
            year: empty(),
            path: empty(),
        },
        Command::Kill => Request {
            client_pid: pid,
            operation: Operation::Kill,
            title: empty(),
            authors: empty(),
            year: empty(),
            path: empty(),
        },
    }
}

fn expects_reply(op: Operation) -> bool {
    !matches!(op, Operation::Kill)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let pid = std::process::id() as i32;
    let request = build_request(pid, cli.command);
    let op = request.operation;

    let reply_path = transport::client_fifo_path(pid);
    if expects_reply(op) {
        if let Err(e) = transport::ensure_fifo(&reply_path) {
            eprintln!("failed to create reply fifo: {e}");
            std::process::exit(1);
        }
    }

    match send_request(&request).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("failed to send request: {e}");
            std::process::exit(1);
        }
    }

    if !expects_reply(op) {
        return;
    }

    match read_reply(&reply_path).await {
        Ok(doc) => print_reply(op, &doc),
        Err(e) => {
            eprintln!("failed to read reply: {e}");
            std::process::exit(1);
        }
    }

    let _ = std::fs::remove_file(&reply_path);
}

async fn send_request(request: &Request) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(transport::SERVER_FIFO)
        .await?;
    file.write_all(&request.to_bytes()).await
}

async fn read_reply(path: &std::path::Path) -> std::io::Result<Document> {
    let mut file = tokio::fs::OpenOptions::new().read(true).open(path).await?;
    let mut buf = [0u8; RECORD_SIZE];
    file.read_exact(&mut buf).await?;
    Ok(Document::from_bytes(&buf))
}

fn print_reply(op: Operation, doc: &Document) {
    match op {
        Operation::Consult => {
            if doc.is_not_found() {
                println!("{}", doc.title());
            } else {
                println!("{doc}");
            }
        }
        Operation::Index => println!("indexed as id {}", doc.title()),
        Operation::Remove => println!("removed id {}", doc.title()),
        Operation::CountWord => println!("count: {}", doc.title()),
        Operation::ListWord => println!("matching ids: {}", doc.title()),
        Operation::Shutdown => println!("server acknowledged shutdown"),
        Operation::Kill => {}
    }
}
