//! Hole table: the compactor the value store queries once per write via
//! `hole_of(size)`.
//!
//! This is a deliberately simple, non-coalescing free list keyed by exact
//! value length — holes are only reused by a later write of exactly the
//! freed length. It is populated whenever an overwrite or delete frees a
//! value record (see `engines::bitcask::Bitcask::set`/`rm`).

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Tracks freed `(length -> offsets)` slots in the data file.
#[derive(Debug, Default)]
pub struct HoleTable {
    holes: Mutex<BTreeMap<u32, Vec<u64>>>,
}

impl HoleTable {
    /// Create an empty hole table.
    pub fn new() -> Self {
        HoleTable {
            holes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record that the value record of length `len` at `offset` is now free.
    ///
    /// `offset` must never be 0: byte 0 is inside the data file's magic
    /// header and can never be a legal hole.
    pub fn free(&self, offset: u64, len: u32) {
        debug_assert_ne!(offset, 0, "offset 0 is never a legal hole");
        if offset == 0 {
            return;
        }
        self.holes.lock().unwrap().entry(len).or_default().push(offset);
    }

    /// Return a free offset at which a value record of exactly `size` bytes
    /// may be overwritten, or 0 if none is available.
    pub fn hole_of(&self, size: u32) -> u64 {
        let mut holes = self.holes.lock().unwrap();
        if let Some(offsets) = holes.get_mut(&size) {
            if let Some(offset) = offsets.pop() {
                if offsets.is_empty() {
                    holes.remove(&size);
                }
                return offset;
            }
        }
        0
    }
}
