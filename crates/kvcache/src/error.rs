//! Error types for kvcache

use std::io;
use std::num::ParseIntError;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Result type alias for kvcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store, cache and instrumentation operations
#[derive(Debug, Error)]
pub enum Error {
    /// Transport or protocol error from a Redis-compatible server
    #[error("store error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Command issued against a key holding the wrong kind of value
    #[error("WRONGTYPE operation against key '{key}' holding the wrong kind of value")]
    WrongType {
        /// Offending key
        key: String,
    },

    /// INCR on a value that is not a 64-bit decimal integer
    #[error("value at '{key}' is not an integer or out of range")]
    NotAnInteger {
        /// Offending key
        key: String,
    },

    /// Stored bytes are not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// Stored bytes do not parse as an integer
    #[error("invalid integer: {0}")]
    InvalidInteger(#[from] ParseIntError),

    /// Operation identity that would collide with another identity's derived keys
    #[error("invalid operation identity '{0}'")]
    InvalidOperationId(String),

    /// I/O error while rendering a replay
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
