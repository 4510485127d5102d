//! The storage engine: record file + control file + free list + index table + cache.
//!
//! Grounded on `src/server_ops.c`'s `start_server`/`shutdown_server`/
//! `get_document` and the original `Server` struct, which bundles exactly
//! these collaborators. Startup loads the free list and index table from the
//! control file then unlinks it; shutdown writes a fresh checkpoint. Per
//! SPEC_FULL.md §4.7/§9 the checkpoint write goes through a temp-file-then-
//! rename instead of the source's truncate-in-place, so a crash mid-write
//! cannot corrupt the previous checkpoint.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tracing::{debug, info, instrument};

use crate::cache::{Cache, CacheKind, RecordSource};
use crate::document::{Document, RECORD_SIZE};
use crate::error::{self, StorageError};
use crate::free_list::FreeList;
use crate::index_table::IndexTable;

/// File name of the main metadata store, relative to the server's working directory.
pub const STORAGE_FILE: &str = "tmp/metadata.bin";
/// File name of the checkpoint file, relative to the server's working directory.
pub const CONTROL_FILE: &str = "tmp/metadata_control.bin";

/// Owns the record file, the free list, the index table, and the cache.
///
/// Only the dispatcher loop holds a mutable reference at a time; concurrent
/// worker tasks take a shared read path (see [`StorageEngine::consult`]).
pub struct StorageEngine {
    document_folder: PathBuf,
    storage_path: PathBuf,
    control_path: PathBuf,
    file: File,
    free_list: FreeList,
    index_table: IndexTable,
    cache: Cache,
}

impl StorageEngine {
    /// Opens (creating if absent) the record file, loads the checkpoint from
    /// the control file if one exists, then unlinks the control file so a
    /// crash between now and the next checkpoint starts clean.
    #[instrument(skip(document_folder), fields(document_folder = %document_folder.as_ref().display()))]
    pub fn start(
        document_folder: impl AsRef<Path>,
        cache_kind: Option<CacheKind>,
        cache_size: usize,
    ) -> Result<Self, StorageError> {
        let document_folder = document_folder.as_ref().to_path_buf();
        let storage_path = PathBuf::from(STORAGE_FILE);
        let control_path = PathBuf::from(CONTROL_FILE);

        if let Some(parent) = storage_path.parent() {
            fs::create_dir_all(parent).context(error::IoSnafu)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&storage_path)
            .context(error::OpenStorageSnafu {
                path: storage_path.clone(),
            })?;

        let (free_list, index_table) = match File::open(&control_path) {
            Ok(mut control_file) => {
                let mut bytes = Vec::new();
                control_file.read_to_end(&mut bytes).context(error::IoSnafu)?;
                let mut cursor = &bytes[..];
                let free_list = FreeList::load(&mut cursor).context(error::IoSnafu)?;
                let index_table = IndexTable::load(&mut cursor).context(error::IoSnafu)?;
                (free_list, index_table)
            }
            Err(_) => (FreeList::new(), IndexTable::new()),
        };

        if control_path.exists() {
            fs::remove_file(&control_path).context(error::IoSnafu)?;
        }

        info!(
            free_list_size = free_list.size(),
            valid_count = index_table.size(),
            "storage engine starting up"
        );

        Ok(StorageEngine {
            document_folder,
            storage_path,
            control_path,
            file,
            free_list,
            index_table,
            cache: Cache::new(cache_kind, cache_size),
        })
    }

    pub fn document_folder(&self) -> &Path {
        &self.document_folder
    }

    /// Allocates a slot (recycled if the free list is non-empty, otherwise
    /// appended) and writes the record, updating the index table.
    #[instrument(skip(self, title, authors, year, path))]
    pub fn index(&mut self, title: &str, authors: &str, year: &str, path: &str) -> Result<u32, StorageError> {
        let id = match self.free_list.pop() {
            Some(id) => {
                self.file
                    .seek(SeekFrom::Start(id as u64 * RECORD_SIZE as u64))
                    .context(error::IoSnafu)?;
                id
            }
            None => {
                let end = self.file.seek(SeekFrom::End(0)).context(error::IoSnafu)?;
                (end / RECORD_SIZE as u64) as u32
            }
        };

        let doc = Document::new(title, authors, year, path);
        self.file.write_all(&doc.to_bytes()).context(error::IoSnafu)?;
        self.index_table.add(id);
        self.cache.add(id, doc);

        debug!(id, "indexed document");
        Ok(id)
    }

    /// Clears the index bit for `id` and recycles the slot. Returns `None`
    /// if `id` was not valid. The record bytes on disk are left untouched
    /// (tombstoned purely by the cleared bit).
    #[instrument(skip(self))]
    pub fn remove(&mut self, id: u32) -> Option<u32> {
        let removed = self.index_table.remove(id)?;
        self.free_list.push(removed);
        self.cache.remove(removed);
        Some(removed)
    }

    /// Fetches a document by slot ID, going through the cache.
    #[instrument(skip(self))]
    pub fn consult(&mut self, id: u32) -> Option<Document> {
        if !self.index_table.is_valid(id) {
            return None;
        }
        self.cache.get(id, &mut FileSource(&mut self.file))
    }

    pub fn valid_ids(&self) -> Vec<u32> {
        self.index_table.valid_ids()
    }

    pub fn is_valid(&self, id: u32) -> bool {
        self.index_table.is_valid(id)
    }

    /// Writes a checkpoint (free list, then index table) to a temp file and
    /// atomically renames it over [`CONTROL_FILE`].
    #[instrument(skip(self))]
    pub fn shutdown(&mut self) -> Result<(), StorageError> {
        info!(
            free_list_size = self.free_list.size(),
            valid_count = self.index_table.size(),
            "storage engine shutting down"
        );

        let tmp_path = self.control_path.with_extension("bin.tmp");
        let mut tmp_file = File::create(&tmp_path).context(error::IoSnafu)?;
        self.free_list.save(&mut tmp_file).context(error::IoSnafu)?;
        self.index_table.save(&mut tmp_file).context(error::IoSnafu)?;
        tmp_file.sync_all().context(error::IoSnafu)?;
        fs::rename(&tmp_path, &self.control_path).context(error::IoSnafu)?;

        Ok(())
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }
}

/// Adapts the storage engine's open file handle to [`RecordSource`] for the cache.
struct FileSource<'a>(&'a mut File);

impl RecordSource for FileSource<'_> {
    fn read_block(&mut self, start: u32, block_len: usize) -> std::io::Result<Vec<Document>> {
        self.0.seek(SeekFrom::Start(start as u64 * RECORD_SIZE as u64))?;

        let mut docs = Vec::with_capacity(block_len);
        let mut buf = [0u8; RECORD_SIZE];
        for _ in 0..block_len {
            match self.0.read_exact(&mut buf) {
                Ok(()) => docs.push(Document::from_bytes(&buf)),
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_server<F: FnOnce(&mut StorageEngine)>(f: F) {
        let dir = TempDir::new().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let mut engine = StorageEngine::start(dir.path(), None, 4).unwrap();
        f(&mut engine);
        std::env::set_current_dir(prev).unwrap();
    }

    #[test]
    fn index_then_consult_returns_exact_bytes() {
        with_server(|engine| {
            let id = engine.index("T1", "A1", "2020", "t1.txt").unwrap();
            assert_eq!(id, 0);
            let doc = engine.consult(id).unwrap();
            assert_eq!(doc.title(), "T1");
            assert_eq!(doc.authors(), "A1");
            assert_eq!(doc.year(), "2020");
            assert_eq!(doc.path(), "t1.txt");
        });
    }

    #[test]
    fn remove_then_index_reuses_freed_slot() {
        with_server(|engine| {
            let first = engine.index("T1", "A1", "2020", "t1.txt").unwrap();
            let second = engine.index("T2", "A2", "2021", "t2.txt").unwrap();
            assert_eq!(engine.remove(second), Some(second));
            let third = engine.index("T3", "A3", "2022", "t3.txt").unwrap();
            assert_eq!(third, second);
            // slot 0 still holds T1.
            assert_eq!(engine.consult(first).unwrap().title(), "T1");
        });
    }

    #[test]
    fn consult_of_never_indexed_id_returns_none() {
        with_server(|engine| {
            assert!(engine.consult(42).is_none());
        });
    }

    #[test]
    fn checkpoint_round_trips() {
        let dir = TempDir::new().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let mut engine = StorageEngine::start(dir.path(), None, 4).unwrap();
        engine.index("T1", "A1", "2020", "t1.txt").unwrap();
        let second = engine.index("T2", "A2", "2021", "t2.txt").unwrap();
        engine.remove(second).unwrap();
        engine.shutdown().unwrap();

        let restarted = StorageEngine::start(dir.path(), None, 4).unwrap();
        assert_eq!(restarted.free_list.size(), 1);
        assert_eq!(restarted.index_table.size(), 1);
        assert!(restarted.is_valid(0));
        assert!(!restarted.is_valid(1));

        std::env::set_current_dir(prev).unwrap();
    }
}
