//! Ring-buffer block cache: oldest-inserted entry evicted first.
//!
//! Grounded on `src/fifo_cache.c`: parallel `documents`/`identifiers` arrays,
//! ids initialized to `-1` (here: `None`), plus a write cursor `back` that
//! wraps modulo capacity.

use super::{CacheStrategy, RecordSource, BLOCK_SIZE};
use crate::document::Document;

pub struct FifoCache {
    docs: Vec<Option<Document>>,
    ids: Vec<Option<u32>>,
    back: usize,
}

impl FifoCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        FifoCache {
            docs: vec![None; capacity],
            ids: vec![None; capacity],
            back: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.ids.len()
    }
}

impl CacheStrategy for FifoCache {
    fn get<S: RecordSource>(&mut self, id: u32, source: &mut S) -> Option<Document> {
        if let Some(i) = self.ids.iter().position(|&slot| slot == Some(id)) {
            return self.docs[i].clone();
        }

        let block = source.read_block(id, BLOCK_SIZE).ok()?;
        let result = block.first().cloned();

        for (offset, doc) in block.into_iter().enumerate() {
            let slot = self.back;
            self.docs[slot] = Some(doc);
            self.ids[slot] = Some(id + offset as u32);
            self.back = (self.back + 1) % self.capacity();
        }

        result
    }

    fn add(&mut self, id: u32, doc: Document) {
        let slot = self.back;
        self.docs[slot] = Some(doc);
        self.ids[slot] = Some(id);
        self.back = (self.back + 1) % self.capacity();
    }

    fn remove(&mut self, id: u32) {
        if let Some(i) = self.ids.iter().position(|&slot| slot == Some(id)) {
            self.ids[i] = None;
            self.docs[i] = None;
        }
    }

    fn show(&self) -> String {
        let mut out = format!("\n- FIFO CACHE [capacity: {}]\n[INDEX, IDENTIFIER]\n", self.capacity());
        for (i, id) in self.ids.iter().enumerate() {
            out.push_str(&format!("[{i:3}, {:>5}]\n", id.map(|v| v as i64).unwrap_or(-1)));
        }
        out
    }
}
