//! The [Bitcask] storage engine: a value store plus an operation log plus
//! log lifecycle management, fronted by an in-memory ordered index and a
//! hole-table compactor, replayed at startup by the recovery driver.
//!
//! ## Terminology
//!
//! * `value record` - the length+CRC16-framed payload written to the data
//! file for one `put`.
//!
//! * `log record` - one key/offset/opcode entry appended to the current
//! `<n>.log` file, in the order originally issued.
//!
//! * `hole` - a previously-freed value-record slot of an exact size, handed
//! back out by [compactor::HoleTable] for in-place reuse.
//!
//! * `index` - the in-memory map from keys to their most recent value
//! location. Rebuilt by replaying log files at startup; kept live
//! thereafter on every write.

pub mod buffer;
pub mod compactor;
pub mod index;
pub mod log;
pub mod recovery;
pub mod value_store;

use std::cell::RefCell;
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::{KvsEngine, KvsError, Result};

use compactor::HoleTable;
use index::{CmdPos, Index, Op};
use log::OpLog;
pub use log::FlushPolicy;
use value_store::{read_record_at, ValueStore};

/// Name of the data file inside a store's base directory.
const DATA_FILE_NAME: &str = "ndbs.db";

/// The [Bitcask] stores string key/value pairs into disk.
///
/// Key/value pairs live in an on-disk data file; an in-memory [Index] maps
/// each live key to where its value record lives. Every mutation is also
/// appended to a replayable operation log so the index can be rebuilt after
/// a restart without scanning the (unindexed, densely packed) data file.
#[derive(Clone)]
pub struct Bitcask {
    reader: Reader,
    writer: Arc<Mutex<Writer>>,
    index: Arc<Index>,
}

impl Bitcask {
    /// Open the [Bitcask] at a given path, creating it if it does not exist.
    ///
    /// On open, any existing `.log` files are discovered and replayed into
    /// a fresh index in new-then-old order (see [recovery::recover]); the
    /// engine then resumes appending to whichever log file played the role
    /// of "current" rather than forcing a rotation on every restart.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = Arc::new(path.into());
        fs::create_dir_all(&*base_dir)?;

        let index = Arc::new(Index::new());
        let files = recovery::discover_log_files(&base_dir)?;

        // Opened before recovery: each recovered put derives its value length
        // by reading the referenced value record's own header back out of
        // this file, so it must already exist (and carry its magic number)
        // before replay starts.
        let value_store = ValueStore::open(&base_dir, DATA_FILE_NAME)?;
        let data_path = base_dir.join(DATA_FILE_NAME);
        recovery::recover(true, &base_dir, &data_path, &index)?;
        let holes = Arc::new(HoleTable::new());
        let oplog = OpLog::open_at(&base_dir, true, recovery::resume_fid(&files))?;

        let reader = Reader {
            data_path: Arc::new(base_dir.join(DATA_FILE_NAME)),
            file: RefCell::new(None),
        };

        let writer = Writer {
            base_dir,
            value_store,
            oplog,
            holes,
            index: Arc::clone(&index),
        };

        Ok(Bitcask {
            reader,
            writer: Arc::new(Mutex::new(writer)),
            index,
        })
    }

    /// Rotate the current log to sequence `fid`, closing the old one and
    /// starting a fresh one. This is a raw lifecycle primitive; callers
    /// that actually want to reclaim a predecessor log's disk space must
    /// first migrate its content somewhere durable of their own and only
    /// then call [`Bitcask::remove_log`] — this crate exposes the
    /// rotate/remove primitives, not a compaction policy that would make
    /// automatic removal safe.
    pub fn rotate(&self, fid: u64) -> Result<()> {
        self.writer.lock().unwrap().oplog.rotate(fid)
    }

    /// Best-effort removal of `<fid>.log`. See [`Bitcask::rotate`] for why
    /// this engine never calls it on its own.
    pub fn remove_log(&self, fid: u64) {
        self.writer.lock().unwrap().oplog.remove(fid)
    }

    /// Change the durability policy applied after every subsequent write.
    ///
    /// Defaults to [`FlushPolicy::Always`]; switching to
    /// [`FlushPolicy::Never`] trades a crash-durability window for avoiding
    /// an `fsync` on every `set`/`rm`.
    pub fn set_flush_policy(&self, policy: FlushPolicy) {
        self.writer.lock().unwrap().oplog.set_flush_policy(policy);
    }
}

impl KvsEngine for Bitcask {
    /// Set the value of a string key to a string.
    ///
    /// If the key already exists, the previous value's slot is freed for
    /// reuse by a future write of the same length.
    fn set(&self, key: String, value: String) -> Result<()> {
        self.writer
            .lock()
            .unwrap()
            .set(key.into_bytes(), value.into_bytes())
    }

    /// Get the string value of a given string key.
    ///
    /// Returns `None` if the given key does not exist.
    fn get(&self, key: String) -> Result<Option<String>> {
        match self.index.get(key.as_bytes()) {
            Some(pos) if pos.offset != 0 => {
                let bytes = self.reader.read_value(pos)?;
                Ok(Some(String::from_utf8(bytes)?))
            }
            _ => Ok(None),
        }
    }

    /// Remove a given key.
    ///
    /// ## Errors
    ///
    /// Returns `KvsError::KeyNotFound` if the given key is not found.
    fn rm(&self, key: String) -> Result<()> {
        self.writer.lock().unwrap().rm(key.into_bytes())
    }
}

/// Read-only side of the engine: a lazily-opened file handle onto the data
/// file, independent of the writer's own handle so reads never contend
/// with (or get repositioned by) an in-flight append.
///
/// Cloning a [Bitcask] clones this with a fresh, unopened handle, so many
/// parallel readers can share one engine handle alongside a single
/// serialized writer.
struct Reader {
    data_path: Arc<PathBuf>,
    file: RefCell<Option<File>>,
}

impl Reader {
    fn read_value(&self, pos: CmdPos) -> Result<Vec<u8>> {
        let mut slot = self.file.borrow_mut();
        if slot.is_none() {
            *slot = Some(File::open(&*self.data_path)?);
        }
        let file = slot.as_mut().expect("just opened above");
        read_record_at(file, pos.offset)
    }
}

impl Clone for Reader {
    fn clone(&self) -> Self {
        Reader {
            data_path: Arc::clone(&self.data_path),
            file: RefCell::new(None),
        }
    }
}

/// Write side of the engine: the only component allowed to mutate the data
/// file, the current log file, and the index. Reached through one mutex so
/// writes stay single-threaded regardless of how many client threads call
/// into a cloned [Bitcask].
struct Writer {
    base_dir: Arc<PathBuf>,
    value_store: ValueStore,
    oplog: OpLog,
    holes: Arc<HoleTable>,
    index: Arc<Index>,
}

impl Writer {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let offset = self
            .oplog
            .write(&mut self.value_store, &*self.holes, &key, Some(&value))?;

        let pos = CmdPos::new(offset, value.len() as u32);
        if let Some(old) = self.index.insert(key, pos, Op::Add) {
            if old.offset != 0 {
                self.holes.free(old.offset, old.len);
            }
        }
        Ok(())
    }

    fn rm(&mut self, key: Vec<u8>) -> Result<()> {
        if !self.index.contains(&key) {
            return Err(KvsError::KeyNotFound);
        }

        self.oplog
            .write(&mut self.value_store, &*self.holes, &key, None)?;

        if let Some(old) = self.index.insert(key, CmdPos::new(0, 0), Op::Del) {
            if old.offset != 0 {
                self.holes.free(old.offset, old.len);
            }
        }
        Ok(())
    }
}
