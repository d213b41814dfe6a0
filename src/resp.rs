//! Wire protocol spoken between [crate::KvsClient] and [crate::KvsServer]:
//! one JSON value per request, one JSON value per response, both written
//! with `serde_json::to_writer` over a single `TcpStream`.

use serde::{Deserialize, Serialize};

/// A request sent from a client to a server.
#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    /// Get the string value of a given string key.
    Get {
        /// Key
        key: String,
    },
    /// Set the value of a string key to a string.
    Set {
        /// Key
        key: String,
        /// Value
        value: String,
    },
    /// Remove a given key.
    Rm {
        /// Key
        key: String,
    },
}

/// Response to a [`Request::Get`].
#[derive(Debug, Serialize, Deserialize)]
pub enum GetResponse {
    /// The key's value, or `None` if it does not exist.
    Ok(Option<String>),
    /// An error occurred on the server.
    Err(String),
}

/// Response to a [`Request::Set`].
#[derive(Debug, Serialize, Deserialize)]
pub enum SetResponse {
    /// The value was stored.
    Ok(()),
    /// An error occurred on the server.
    Err(String),
}

/// Response to a [`Request::Rm`].
#[derive(Debug, Serialize, Deserialize)]
pub enum RemoveResponse {
    /// The key was removed.
    Ok(()),
    /// An error occurred on the server.
    Err(String),
}
