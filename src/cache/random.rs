//! Array cache with uniformly random eviction.
//!
//! Grounded on `src/rand_cache.c`. On a miss, a random start position is
//! chosen and the fetched block is written over `p, p+1, ..., p+k-1` (mod
//! capacity) unconditionally — even if that overwrites an entry from earlier
//! in the very same block. This is the specified policy, retained as-is and
//! documented rather than "fixed" (SPEC_FULL.md §9, "RANDOM cache eviction of
//! block peers").

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{CacheStrategy, RecordSource, BLOCK_SIZE};
use crate::document::Document;

pub struct RandomCache {
    docs: Vec<Option<Document>>,
    ids: Vec<Option<u32>>,
    rng: SmallRng,
}

impl RandomCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        RandomCache {
            docs: vec![None; capacity],
            ids: vec![None; capacity],
            rng: SmallRng::from_os_rng(),
        }
    }

    fn capacity(&self) -> usize {
        self.ids.len()
    }
}

impl CacheStrategy for RandomCache {
    fn get<S: RecordSource>(&mut self, id: u32, source: &mut S) -> Option<Document> {
        if let Some(i) = self.ids.iter().position(|&slot| slot == Some(id)) {
            return self.docs[i].clone();
        }

        let block = source.read_block(id, BLOCK_SIZE).ok()?;
        let result = block.first().cloned();

        let capacity = self.capacity();
        let mut position = self.rng.random_range(0..capacity);
        for (offset, doc) in block.into_iter().enumerate() {
            self.docs[position] = Some(doc);
            self.ids[position] = Some(id + offset as u32);
            position = (position + 1) % capacity;
        }

        result
    }

    fn add(&mut self, id: u32, doc: Document) {
        let capacity = self.capacity();
        let position = match self.ids.iter().position(|slot| slot.is_none()) {
            Some(i) => i,
            None => self.rng.random_range(0..capacity),
        };
        self.docs[position] = Some(doc);
        self.ids[position] = Some(id);
    }

    fn remove(&mut self, id: u32) {
        if let Some(i) = self.ids.iter().position(|&slot| slot == Some(id)) {
            self.ids[i] = None;
            self.docs[i] = None;
        }
    }

    fn show(&self) -> String {
        let mut out = format!("\n- RAND CACHE [capacity: {}]\n[INDEX, IDENTIFIER]\n", self.capacity());
        for (i, id) in self.ids.iter().enumerate() {
            out.push_str(&format!("[{i:3}, {:>5}]\n", id.map(|v| v as i64).unwrap_or(-1)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::VecSource;

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new(&format!("T{i}"), "A", "2020", "p"))
            .collect()
    }

    #[test]
    fn hit_returns_clone_without_touching_source() {
        let mut cache = RandomCache::new(4);
        let mut source = VecSource(docs(8));
        cache.get(0, &mut source);
        let hit = cache.get(0, &mut source).unwrap();
        assert_eq!(hit.title(), "T0");
    }

    #[test]
    fn add_prefers_empty_slot_before_evicting() {
        let mut cache = RandomCache::new(2);
        cache.add(1, Document::new("T1", "A", "2020", "p"));
        assert!(cache.ids.contains(&Some(1)));
        assert_eq!(cache.ids.iter().filter(|s| s.is_some()).count(), 1);
    }

    #[test]
    fn remove_marks_slot_invalid() {
        let mut cache = RandomCache::new(2);
        cache.add(1, Document::new("T1", "A", "2020", "p"));
        cache.remove(1);
        assert!(!cache.ids.contains(&Some(1)));
    }
}
