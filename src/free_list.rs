//! LIFO stack of recyclable slot IDs.
//!
//! Grounded on `src/free_list.c`: a singly linked LIFO list with a persisted
//! `(count, [id; count])` layout. The Rust model collapses the original's
//! `(position, id)` link (position is always recoverable as `id * RECORD_SIZE`)
//! down to just `id`, per SPEC_FULL.md §4.1.

use std::io::{self, Read, Write};

/// An ordered, LIFO sequence of slot IDs that are currently unused.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FreeList {
    ids: Vec<u32>,
}

impl FreeList {
    pub fn new() -> Self {
        FreeList { ids: Vec::new() }
    }

    /// Pushes a slot ID onto the free list.
    pub fn push(&mut self, id: u32) {
        self.ids.push(id);
    }

    /// Pops the most recently pushed slot ID, or `None` if the list is empty.
    pub fn pop(&mut self) -> Option<u32> {
        self.ids.pop()
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Persists as `u32` count followed by `count` little-endian `i32` IDs.
    pub fn save<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&(self.ids.len() as u32).to_le_bytes())?;
        for &id in &self.ids {
            writer.write_all(&(id as i32).to_le_bytes())?;
        }
        Ok(())
    }

    /// Loads a free list previously written by [`FreeList::save`].
    ///
    /// A short or empty read (EOF before the declared count is reached) is
    /// treated as "no prior state" rather than an error, matching the
    /// best-effort persistence policy of SPEC_FULL.md §7.
    pub fn load<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut count_bytes = [0u8; 4];
        if reader.read_exact(&mut count_bytes).is_err() {
            return Ok(FreeList::new());
        }
        let count = u32::from_le_bytes(count_bytes);

        let mut ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut id_bytes = [0u8; 4];
            if reader.read_exact(&mut id_bytes).is_err() {
                break;
            }
            ids.push(i32::from_le_bytes(id_bytes) as u32);
        }
        Ok(FreeList { ids })
    }
}
