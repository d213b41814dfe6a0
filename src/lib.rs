#![deny(missing_docs)]
//! A small embedded key/value store backed by a crash-recoverable append
//! log and an in-memory index.

mod client;
mod engines;
mod error;
mod resp;
mod server;
pub mod thread_pool;

pub use client::KvsClient;
pub use engines::{Bitcask, FlushPolicy, KvsEngine};
pub use error::{KvsError, Result};
pub use server::KvsServer;

use std::path::PathBuf;

/// default kvstore data directory
pub fn get_kvstore_data_dir() -> PathBuf {
    let mut dir = std::env::current_dir().unwrap();
    dir.push("data/kvs");
    dir
}
