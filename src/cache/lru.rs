//! Second-chance (approximate LRU) cache.
//!
//! Grounded on `src/lru_cache.c`: parallel `documents`/`identifiers` arrays
//! plus a `ref_bits` array and a cursor `back`. A hit sets the reference bit;
//! a miss advances the cursor past entries whose reference bit is set
//! (clearing them), evicting the first entry found with a clear bit — the
//! classic second-chance scan, bounded here to `capacity + 1` steps so it
//! always terminates even if every bit starts set.

use super::{CacheStrategy, RecordSource, BLOCK_SIZE};
use crate::document::Document;

pub struct LruCache {
    docs: Vec<Option<Document>>,
    ids: Vec<Option<u32>>,
    ref_bits: Vec<bool>,
    back: usize,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        LruCache {
            docs: vec![None; capacity],
            ids: vec![None; capacity],
            ref_bits: vec![false; capacity],
            back: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.ids.len()
    }

    /// Advances `back` through the second-chance scan, evicting the first
    /// slot whose reference bit is clear, and returns its index.
    fn evict_slot(&mut self) -> usize {
        let capacity = self.capacity();
        for _ in 0..=capacity {
            let slot = self.back;
            if !self.ref_bits[slot] {
                return slot;
            }
            self.ref_bits[slot] = false;
            self.back = (self.back + 1) % capacity;
        }
        // Every slot was referenced; settle on the current cursor position.
        self.back
    }
}

impl CacheStrategy for LruCache {
    fn get<S: RecordSource>(&mut self, id: u32, source: &mut S) -> Option<Document> {
        if let Some(i) = self.ids.iter().position(|&slot| slot == Some(id)) {
            self.ref_bits[i] = true;
            return self.docs[i].clone();
        }

        let block = source.read_block(id, BLOCK_SIZE).ok()?;
        let result = block.first().cloned();
        let capacity = self.capacity();

        let mut remaining: Vec<(u32, Document)> = block
            .into_iter()
            .enumerate()
            .map(|(offset, doc)| (id + offset as u32, doc))
            .collect();

        // First, fill every empty slot.
        for slot in 0..capacity {
            if remaining.is_empty() {
                break;
            }
            if self.ids[slot].is_none() {
                let (new_id, doc) = remaining.remove(0);
                self.ids[slot] = Some(new_id);
                self.docs[slot] = Some(doc);
                self.ref_bits[slot] = true;
            }
        }

        // Then overwrite slots whose reference bit is clear.
        for slot in 0..capacity {
            if remaining.is_empty() {
                break;
            }
            if !self.ref_bits[slot] {
                let (new_id, doc) = remaining.remove(0);
                self.ids[slot] = Some(new_id);
                self.docs[slot] = Some(doc);
                self.ref_bits[slot] = true;
            }
        }

        // Finally, place anything left starting from position 0.
        let mut slot = 0;
        while let Some((new_id, doc)) = remaining.first().cloned() {
            self.ids[slot] = Some(new_id);
            self.docs[slot] = Some(doc);
            self.ref_bits[slot] = true;
            remaining.remove(0);
            slot = (slot + 1) % capacity;
        }

        result
    }

    fn add(&mut self, id: u32, doc: Document) {
        let slot = match self.ids.iter().position(|slot| slot.is_none()) {
            Some(i) => i,
            None => self.evict_slot(),
        };
        self.docs[slot] = Some(doc);
        self.ids[slot] = Some(id);
        self.ref_bits[slot] = true;
    }

    fn remove(&mut self, id: u32) {
        if let Some(i) = self.ids.iter().position(|&slot| slot == Some(id)) {
            self.ids[i] = None;
            self.docs[i] = None;
            self.ref_bits[i] = false;
        }
    }

    fn show(&self) -> String {
        let mut out = format!("\n- LRU CACHE [capacity: {}]\n[INDEX, REF_BIT, IDENTIFIER]\n", self.capacity());
        for i in 0..self.capacity() {
            out.push_str(&format!(
                "[{i:3}, {}, {:>5}]\n",
                self.ref_bits[i] as u8,
                self.ids[i].map(|v| v as i64).unwrap_or(-1)
            ));
        }
        out
    }
}
