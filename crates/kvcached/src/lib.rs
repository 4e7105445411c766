//! # kvcached
//!
//! In-memory Redis-compatible server for kvcache development and tests.
//!
//! Speaks RESP2 and implements the commands kvcache consumes (SET, GET,
//! INCR, RPUSH, LRANGE, FLUSHDB) plus a few keyspace and handshake
//! commands, all backed by one shared [`kvcache::MemoryStore`].

#![warn(missing_docs)]

mod handler;
mod resp;
mod server;

pub use handler::CommandHandler;
pub use resp::{Frame, ProtocolError};
pub use server::serve;
