//! The read-through metadata block cache.
//!
//! Grounded on `include/cache.h` / `src/cache.c`: a polymorphic container that
//! dispatches `get`/`add`/`remove`/`show` to one of three concrete replacement
//! strategies. The source implements this with a struct of function pointers
//! assigned at construction time (the Strategy pattern in C); this crate
//! replaces that with a small `CacheStrategy` trait plus a sum type
//! (`Cache::Fifo`/`Cache::Random`/`Cache::Lru`/`Cache::None`), matching how the
//! teacher's `vector_buffers` crate dispatches across `DiskV1Buffer`/
//! `DiskV2Buffer`/in-memory buffer variants behind one `IntoBuffer` interface
//! (SPEC_FULL.md §9, "Polymorphism across cache strategies").

mod fifo;
mod lru;
mod random;

pub use fifo::FifoCache;
pub use lru::LruCache;
pub use random::RandomCache;

use std::io;

use crate::document::Document;

/// The unit fetched from disk on a cache miss: up to `block_len` consecutive
/// records starting at `start`. Implemented by whatever owns the record file
/// (the storage engine); kept as a trait so caches are testable without a
/// real file on disk.
pub trait RecordSource {
    /// Reads up to `block_len` consecutive records starting at slot `start`.
    /// May return fewer if EOF is reached.
    fn read_block(&mut self, start: u32, block_len: usize) -> io::Result<Vec<Document>>;
}

/// Number of records fetched from disk on a single cache miss.
pub const BLOCK_SIZE: usize = 8;

/// The replacement policy selectable at server startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Fifo,
    Random,
    Lru,
}

impl std::str::FromStr for CacheKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIFO" => Ok(CacheKind::Fifo),
            "RAND" => Ok(CacheKind::Random),
            "LRU" => Ok(CacheKind::Lru),
            other => Err(format!("unknown cache type {other:?}")),
        }
    }
}

/// A common interface shared by all three block-cache replacement strategies.
trait CacheStrategy {
    fn get<S: RecordSource>(&mut self, id: u32, source: &mut S) -> Option<Document>;
    fn add(&mut self, id: u32, doc: Document);
    fn remove(&mut self, id: u32);
    fn show(&self) -> String;
}

/// The cache facade used by the storage engine: one of three replacement
/// strategies, or [`Cache::None`] to bypass caching entirely.
pub enum Cache {
    Fifo(FifoCache),
    Random(RandomCache),
    Lru(LruCache),
    None,
}

impl Cache {
    pub fn new(kind: Option<CacheKind>, capacity: usize) -> Self {
        match kind {
            Some(CacheKind::Fifo) => Cache::Fifo(FifoCache::new(capacity)),
            Some(CacheKind::Random) => Cache::Random(RandomCache::new(capacity)),
            Some(CacheKind::Lru) => Cache::Lru(LruCache::new(capacity)),
            None => Cache::None,
        }
    }

    /// Returns a detached clone of the requested document, going to `source`
    /// on a miss. A negative/absent ID is handled upstream by the storage
    /// engine (slot IDs here are always `u32`), so this is a pure lookup.
    pub fn get<S: RecordSource>(&mut self, id: u32, source: &mut S) -> Option<Document> {
        match self {
            Cache::Fifo(c) => c.get(id, source),
            Cache::Random(c) => c.get(id, source),
            Cache::Lru(c) => c.get(id, source),
            Cache::None => source.read_block(id, 1).ok().and_then(|mut v| {
                if v.is_empty() {
                    None
                } else {
                    Some(v.remove(0))
                }
            }),
        }
    }

    pub fn add(&mut self, id: u32, doc: Document) {
        match self {
            Cache::Fifo(c) => c.add(id, doc),
            Cache::Random(c) => c.add(id, doc),
            Cache::Lru(c) => c.add(id, doc),
            Cache::None => {}
        }
    }

    pub fn remove(&mut self, id: u32) {
        match self {
            Cache::Fifo(c) => c.remove(id),
            Cache::Random(c) => c.remove(id),
            Cache::Lru(c) => c.remove(id),
            Cache::None => {}
        }
    }

    pub fn show(&self) -> String {
        match self {
            Cache::Fifo(c) => c.show(),
            Cache::Random(c) => c.show(),
            Cache::Lru(c) => c.show(),
            Cache::None => "- CACHE DISABLED".to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) struct VecSource(pub Vec<Document>);

#[cfg(test)]
impl RecordSource for VecSource {
    fn read_block(&mut self, start: u32, block_len: usize) -> io::Result<Vec<Document>> {
        let start = start as usize;
        if start >= self.0.len() {
            return Ok(Vec::new());
        }
        let end = (start + block_len).min(self.0.len());
        Ok(self.0[start..end].to_vec())
    }
}
