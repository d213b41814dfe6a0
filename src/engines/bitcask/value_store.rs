//! Owns the data file: appends length+CRC framed value records and
//! supports in-place overwrite at a hole offset supplied by the compactor.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::error;

use super::buffer::ByteBuffer;
use crate::{KvsError, Result};

/// Fixed magic number written at offset 0 of every data file.
pub const MAGIC: u32 = 2011;

/// Something that can hand back a previously-freed slot of an exact size.
///
/// `hole_of(size) -> offset`, 0 meaning "no hole available". Kept as a
/// trait so the value store does not depend on the concrete hole-table
/// implementation.
pub trait Compactor {
    /// Return a free data-file offset that can hold `size` bytes, or 0.
    fn hole_of(&self, size: u32) -> u64;
}

/// Owns the data file and the scratch buffer used to frame one value record.
#[derive(Debug)]
pub struct ValueStore {
    file: File,
    /// Current logical end-of-file offset; the default append offset.
    data_alloc: u64,
    buf: ByteBuffer,
}

impl ValueStore {
    /// Open (or create) the data file `<base_dir>/<filename>`.
    ///
    /// If the file exists it must start with the magic number; `data_alloc`
    /// is set to the current file size. Otherwise the file is created and
    /// the magic number written, with `data_alloc` set to 4.
    pub fn open(base_dir: &Path, filename: &str) -> Result<Self> {
        let path = base_dir.join(filename);
        let existed = path.exists();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let data_alloc = if existed {
            let mut magic_buf = [0u8; 4];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut magic_buf)?;
            if u32::from_ne_bytes(magic_buf) != MAGIC {
                return Err(KvsError::BadMagic(path));
            }
            file.seek(SeekFrom::End(0))?
        } else {
            file.write_all(&MAGIC.to_ne_bytes())?;
            4
        };

        Ok(ValueStore {
            file,
            data_alloc,
            buf: ByteBuffer::with_capacity(4096),
        })
    }

    /// Current logical end-of-file offset of the data file.
    pub fn data_alloc(&self) -> u64 {
        self.data_alloc
    }

    /// The write descriptor's actual current file offset (test/assertion hook).
    pub fn current_pos(&mut self) -> std::io::Result<u64> {
        self.file.seek(SeekFrom::Current(0))
    }

    /// Append `value`, reusing a hole of the exact size if the compactor has
    /// one, otherwise extending the file. Returns the data-file offset at
    /// which the framed record was written.
    ///
    /// A short write is logged but does not turn this call into an `Err`:
    /// the caller still learns the intended offset, not just that something
    /// went wrong.
    pub fn append(&mut self, value: &[u8], compactor: &dyn Compactor) -> Result<u64> {
        self.buf.put_u32(value.len() as u32);
        self.buf.put_u16(crc16::State::<crc16::CCITT_FALSE>::calculate(value));
        self.buf.put_bytes(value);
        let frame = self.buf.detach();
        let frame_len = frame.len() as u64;

        let hole = compactor.hole_of(value.len() as u32);
        let mut used_hole = hole > 0;
        let offset = if used_hole {
            match self.file.seek(SeekFrom::Start(hole)) {
                Ok(_) => hole,
                Err(_) => {
                    used_hole = false;
                    self.append_offset(frame_len)?
                }
            }
        } else {
            self.append_offset(frame_len)?
        };

        let written = self.file.write(&frame)?;
        if written != frame.len() {
            error!(
                "value aof error when write, length: {}, written: {}",
                frame.len(),
                written
            );
        }

        if used_hole {
            self.file.seek(SeekFrom::Start(self.data_alloc))?;
        }

        Ok(offset)
    }

    fn append_offset(&mut self, frame_len: u64) -> Result<u64> {
        let offset = self.data_alloc;
        self.data_alloc += frame_len;
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(offset)
    }

    /// Push the data file's contents to stable storage.
    pub fn sync_all(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Read back the value record at `offset`, verifying its stored CRC16.
    ///
    /// Used by tests and by hole-reuse bookkeeping; concurrent readers (the
    /// `get` path) use [`read_record_at`] on their own file handle instead,
    /// so they never contend with the writer's file position.
    pub fn read(&mut self, offset: u64) -> Result<Vec<u8>> {
        let payload = read_record_at(&mut self.file, offset)?;
        // restore the writer's end-of-file position for the next append.
        self.file.seek(SeekFrom::Start(self.data_alloc))?;
        Ok(payload)
    }
}

/// Decode the value record at `offset` from `file`, verifying its CRC16.
///
/// Leaves `file`'s position just past the record; callers that share the
/// handle with a writer must reposition it afterward (see [`ValueStore::read`]).
pub fn read_record_at(file: &mut File, offset: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;

    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf)?;
    let len = u32::from_ne_bytes(len_buf);

    let mut crc_buf = [0u8; 2];
    file.read_exact(&mut crc_buf)?;
    let crc = u16::from_ne_bytes(crc_buf);

    let mut payload = vec![0u8; len as usize];
    file.read_exact(&mut payload)?;

    if crc16::State::<crc16::CCITT_FALSE>::calculate(&payload) != crc {
        return Err(KvsError::Crc { offset });
    }

    Ok(payload)
}
