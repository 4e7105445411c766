//! [`KeyValueStore`] backed by a Redis-compatible server

use std::fmt;

use parking_lot::Mutex;
use redis::Commands;
use tracing::debug;

use crate::error::Result;
use crate::store::KeyValueStore;

/// Synchronous connection to a Redis-compatible server
///
/// Commands are serialised over one connection; the server is the only
/// point of coordination between handles.
pub struct RedisStore {
    conn: Mutex<redis::Connection>,
}

impl RedisStore {
    /// Connect to the server at `url` (e.g. `redis://127.0.0.1:6379/`)
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        debug!(url, "connected to store");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl KeyValueStore for RedisStore {
    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.conn.lock().set::<_, _, ()>(key, value)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.conn.lock().get(key)?)
    }

    fn incr(&self, key: &str) -> Result<i64> {
        // `Commands::incr` sends INCRBY; keep to the plain command
        let mut conn = self.conn.lock();
        Ok(redis::cmd("INCR").arg(key).query(&mut *conn)?)
    }

    fn rpush(&self, key: &str, value: &[u8]) -> Result<usize> {
        Ok(self.conn.lock().rpush(key, value)?)
    }

    fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>> {
        Ok(self.conn.lock().lrange(key, start, stop)?)
    }

    fn flushdb(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        redis::cmd("FLUSHDB").query::<()>(&mut *conn)?;
        Ok(())
    }
}
