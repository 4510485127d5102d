//! Server command-line interface.
//!
//! Grounded on `src/main.c`'s argument parsing (`document_folder cache_size
//! [FIFO|RAND|LRU]`) and the teacher's `clap`-derive style for its own
//! binaries. `-g`/`--quiet` suppresses the startup banner the source prints
//! to stdout.

use std::path::PathBuf;

use clap::Parser;

use crate::cache::CacheKind;

#[derive(Debug, Parser)]
#[command(name = "dserver", about = "Persistent document-metadata index server")]
pub struct Cli {
    /// Directory the indexed documents' contents live under, used to resolve
    /// the paths COUNT_WORD/LIST_WORD grep against.
    pub document_folder: PathBuf,

    /// Number of blocks the cache holds. Zero disables caching.
    pub cache_size: usize,

    /// Cache replacement policy; omit to run uncached.
    #[arg(value_parser = parse_cache_kind)]
    pub cache_kind: Option<CacheKind>,

    /// Suppress the startup banner.
    #[arg(short = 'g', long = "quiet")]
    pub quiet: bool,
}

fn parse_cache_kind(s: &str) -> Result<CacheKind, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_args() {
        let cli = Cli::parse_from(["dserver", "docs", "16"]);
        assert_eq!(cli.document_folder, PathBuf::from("docs"));
        assert_eq!(cli.cache_size, 16);
        assert_eq!(cli.cache_kind, None);
        assert!(!cli.quiet);
    }

    #[test]
    fn parses_cache_kind_and_quiet_flag() {
        let cli = Cli::parse_from(["dserver", "-g", "docs", "16", "LRU"]);
        assert_eq!(cli.cache_kind, Some(CacheKind::Lru));
        assert!(cli.quiet);
    }
}
