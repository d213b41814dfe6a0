use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Error type for kvs.
#[derive(Error, Debug)]
pub enum KvsError {
    /// IO error
    #[error("{0}")]
    Io(#[from] std::io::Error),
    ///  Serialization or deserialization error.
    #[error("{0}")]
    Serde(#[from] serde_json::Error),
    /// Removing non-existent key error.
    #[error("Key not found")]
    KeyNotFound,
    /// Unexpected command type error.
    /// It indicated a corrupted log or a program bug.
    #[error("Unexpected command type")]
    Unknown,
    /// Error with a string message
    #[error("{0}")]
    StringError(String),
    /// Key or value is invalid UTF-8 sequence
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] FromUtf8Error),
    /// Data file does not start with the expected magic number.
    #[error("data file {0:?} has a bad magic number")]
    BadMagic(PathBuf),
    /// A value record's stored crc16 did not match the bytes read back.
    #[error("crc mismatch for value record at offset {offset}")]
    Crc {
        /// data-file offset of the value record
        offset: u64,
    },
    /// A log record could not be parsed during replay.
    #[error("corrupt log record in {path:?}")]
    CorruptLogRecord {
        /// path of the log file containing the short/malformed record
        path: PathBuf,
    },
}

/// Custom result type for KvsError
pub type Result<T> = std::result::Result<T, KvsError>;
