//! In-memory ordered index: key -> location of its most recent value.
//!
//! The core only ever talks to this through `insert`, with last-write-wins
//! semantics for equal keys. It is implemented here as a `BTreeMap` behind
//! an `RwLock` so lookups (reads) do not contend with each other, allowing
//! many concurrent readers alongside the single writer.

use std::collections::BTreeMap;
use std::sync::RwLock;

/// What kind of mutation a log record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// A put: `data_offset` points at a live value record.
    Add,
    /// A delete: the key has no live value.
    Del,
}

/// Location and length of a value record in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdPos {
    /// Offset of the value record's length-prefix in the data file.
    pub offset: u64,
    /// Length of the value payload (not the framed record).
    pub len: u32,
}

impl CmdPos {
    /// Build a `CmdPos` for a put.
    pub fn new(offset: u64, len: u32) -> Self {
        CmdPos { offset, len }
    }
}

/// Ordered key -> value-location index with last-write-wins semantics.
#[derive(Debug, Default)]
pub struct Index {
    map: RwLock<BTreeMap<Vec<u8>, CmdPos>>,
}

impl Index {
    /// Create an empty index.
    pub fn new() -> Self {
        Index {
            map: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or remove a key depending on `op`. Returns whatever `CmdPos`
    /// the key previously mapped to, if any — callers (notably the hole
    /// table) use this to learn the length being freed.
    pub fn insert(&self, key: Vec<u8>, pos: CmdPos, op: Op) -> Option<CmdPos> {
        let mut map = self.map.write().unwrap();
        match op {
            Op::Add => map.insert(key, pos),
            Op::Del => map.remove(&key),
        }
    }

    /// Look up the current location of `key`.
    pub fn get(&self, key: &[u8]) -> Option<CmdPos> {
        self.map.read().unwrap().get(key).copied()
    }

    /// Whether `key` currently has a live value.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.read().unwrap().contains_key(key)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }

    /// Whether the index holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.map.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_del_removes_key() {
        let idx = Index::new();
        idx.insert(b"k".to_vec(), CmdPos::new(4, 3), Op::Add);
        assert_eq!(idx.get(b"k"), Some(CmdPos::new(4, 3)));

        let prev = idx.insert(b"k".to_vec(), CmdPos::new(0, 0), Op::Del);
        assert_eq!(prev, Some(CmdPos::new(4, 3)));
        assert_eq!(idx.get(b"k"), None);
    }

    #[test]
    fn last_write_wins() {
        let idx = Index::new();
        idx.insert(b"k".to_vec(), CmdPos::new(4, 1), Op::Add);
        idx.insert(b"k".to_vec(), CmdPos::new(99, 1), Op::Add);
        assert_eq!(idx.get(b"k"), Some(CmdPos::new(99, 1)));
    }

    #[test]
    fn recovery_order_law_new_then_old() {
        // Replaying new first then old means the old entry (inserted last)
        // wins under last-write-wins semantics.
        let idx = Index::new();
        // "new" log: delete k
        idx.insert(b"k".to_vec(), CmdPos::new(0, 0), Op::Del);
        // "old" log: put k at offset 4
        idx.insert(b"k".to_vec(), CmdPos::new(4, 0), Op::Add);
        assert_eq!(idx.get(b"k"), Some(CmdPos::new(4, 0)));
    }
}
