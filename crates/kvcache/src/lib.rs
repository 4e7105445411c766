//! # kvcache
//!
//! Caching client for Redis-compatible key-value stores.
//!
//! ## Architecture
//! - **Store**: [`KeyValueStore`] over SET/GET/INCR/RPUSH/LRANGE/FLUSHDB,
//!   backed by a server ([`RedisStore`]) or in-process ([`MemoryStore`])
//! - **Cache**: stores [`Payload`]s under random hex keys, typed reads
//! - **Instrumentation**: [`Counted`] and [`Recorded`] wrap any
//!   [`Operation`] to count calls and log their arguments and results
//! - **Replay**: [`replay`] prints an operation's recorded calls
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use kvcache::{Cache, MemoryStore, Operation, Payload, replay_to};
//!
//! let cache = Cache::new(Arc::new(MemoryStore::new()));
//! let store = cache.instrumented_store();
//!
//! let key = store.call(Payload::from("foo")).unwrap();
//! assert_eq!(cache.get_as_string(&key).unwrap().as_deref(), Some("foo"));
//!
//! let mut out = Vec::new();
//! replay_to(&store, &mut out).unwrap();
//! assert!(String::from_utf8(out).unwrap().starts_with("Cache.store was called 1 times:"));
//! ```

#![warn(missing_docs)]

mod cache;
mod error;
mod instrument;
mod payload;
mod redis_store;
mod replay;
mod store;

pub use cache::{Cache, StoreOperation, STORE_OPERATION};
pub use error::{Error, Result};
pub use instrument::{
    CallArgs, CallRecord, Counted, HistoryPolicy, Operation, OperationId, Recorded,
};
pub use payload::Payload;
pub use redis_store::RedisStore;
pub use replay::{replay, replay_to, CallHistory};
pub use store::{KeyValueStore, MemoryStore};
