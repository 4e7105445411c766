//! Key-value store abstraction and the in-process backend
//!
//! [`KeyValueStore`] is the six-command surface the cache and the
//! instrumentation wrappers need. [`MemoryStore`] implements it in-process
//! with Redis semantics; [`RedisStore`](crate::RedisStore) talks to a server.

use std::collections::HashMap;

use ahash::RandomState;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Operations consumed from the external store
///
/// Single-key `incr` and `rpush` must be atomic; nothing else is assumed.
pub trait KeyValueStore: Send + Sync {
    /// SET: write `value` under `key`, replacing whatever was there
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// GET: raw value under `key`, `None` if absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// INCR: add one to the integer under `key` (absent counts as 0)
    fn incr(&self, key: &str) -> Result<i64>;

    /// RPUSH: append `value` to the list under `key`, creating it if absent.
    /// Returns the list length after the push.
    fn rpush(&self, key: &str, value: &[u8]) -> Result<usize>;

    /// LRANGE: elements `start..=stop` of the list under `key`; negative
    /// indices count from the end, so `(0, -1)` is the whole list
    fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>>;

    /// FLUSHDB: remove every key
    fn flushdb(&self) -> Result<()>;
}

/// Value stored under one key
#[derive(Debug, Clone)]
enum Entry {
    Bytes(Vec<u8>),
    List(Vec<Vec<u8>>),
}

/// In-process store with Redis semantics for strings and lists
///
/// Keys are kept as raw bytes, so binary keys arriving over the wire stay
/// distinct. The `*_raw` methods take byte keys; the [`KeyValueStore`]
/// impl forwards to them with the UTF-8 bytes of its `&str` keys.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<Vec<u8>, Entry, RandomState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// SET with a byte key
    pub fn set_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data
            .write()
            .insert(key.to_vec(), Entry::Bytes(value.to_vec()));
        Ok(())
    }

    /// GET with a byte key
    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.data.read().get(key) {
            None => Ok(None),
            Some(Entry::Bytes(value)) => Ok(Some(value.clone())),
            Some(Entry::List(_)) => Err(wrong_type(key)),
        }
    }

    /// INCR with a byte key
    pub fn incr_raw(&self, key: &[u8]) -> Result<i64> {
        self.incr_by_raw(key, 1)
    }

    /// INCRBY with a byte key; overflow is reported as not an integer
    pub fn incr_by_raw(&self, key: &[u8], delta: i64) -> Result<i64> {
        let mut data = self.data.write();

        let current = match data.get(key) {
            None => 0,
            Some(Entry::Bytes(value)) => std::str::from_utf8(value)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| not_an_integer(key))?,
            Some(Entry::List(_)) => return Err(wrong_type(key)),
        };

        let next = current.checked_add(delta).ok_or_else(|| not_an_integer(key))?;
        data.insert(key.to_vec(), Entry::Bytes(next.to_string().into_bytes()));
        Ok(next)
    }

    /// RPUSH of every value in `values`, appended under one write lock so
    /// no other push lands between them. Returns the list length after the
    /// push; an empty `values` leaves the key untouched.
    pub fn rpush_all<V: AsRef<[u8]>>(&self, key: &[u8], values: &[V]) -> Result<usize> {
        let mut data = self.data.write();

        match data.get_mut(key) {
            Some(Entry::List(list)) => {
                list.extend(values.iter().map(|v| v.as_ref().to_vec()));
                Ok(list.len())
            }
            Some(Entry::Bytes(_)) => Err(wrong_type(key)),
            None if values.is_empty() => Ok(0),
            None => {
                let list: Vec<Vec<u8>> = values.iter().map(|v| v.as_ref().to_vec()).collect();
                let len = list.len();
                data.insert(key.to_vec(), Entry::List(list));
                Ok(len)
            }
        }
    }

    /// LRANGE with a byte key
    pub fn lrange_raw(&self, key: &[u8], start: isize, stop: isize) -> Result<Vec<Vec<u8>>> {
        let data = self.data.read();

        let list = match data.get(key) {
            None => return Ok(Vec::new()),
            Some(Entry::List(list)) => list,
            Some(Entry::Bytes(_)) => return Err(wrong_type(key)),
        };

        Ok(match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list[from..=to].to_vec(),
            None => Vec::new(),
        })
    }

    /// Remove `key`, returning whether it existed
    pub fn delete(&self, key: &[u8]) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// Check whether `key` holds any value
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_raw(key.as_bytes(), value)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_raw(key.as_bytes())
    }

    fn incr(&self, key: &str) -> Result<i64> {
        self.incr_raw(key.as_bytes())
    }

    fn rpush(&self, key: &str, value: &[u8]) -> Result<usize> {
        self.rpush_all(key.as_bytes(), &[value])
    }

    fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>> {
        self.lrange_raw(key.as_bytes(), start, stop)
    }

    fn flushdb(&self) -> Result<()> {
        self.data.write().clear();
        Ok(())
    }
}

fn wrong_type(key: &[u8]) -> Error {
    Error::WrongType {
        key: String::from_utf8_lossy(key).into_owned(),
    }
}

fn not_an_integer(key: &[u8]) -> Error {
    Error::NotAnInteger {
        key: String::from_utf8_lossy(key).into_owned(),
    }
}

/// Map Redis-style inclusive, possibly negative indices onto `0..len`
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len {
        return None;
    }

    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let store = MemoryStore::new();
        store.set("k", b"v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("k", b"w").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"w".to_vec()));
    }

    #[test]
    fn test_incr() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("n").unwrap(), 1);
        assert_eq!(store.incr("n").unwrap(), 2);
        assert_eq!(store.get("n").unwrap(), Some(b"2".to_vec()));

        store.set("s", b"abc").unwrap();
        assert!(matches!(store.incr("s"), Err(Error::NotAnInteger { .. })));

        store.set("max", i64::MAX.to_string().as_bytes()).unwrap();
        assert!(matches!(store.incr("max"), Err(Error::NotAnInteger { .. })));
    }

    #[test]
    fn test_rpush_lrange() {
        let store = MemoryStore::new();
        assert_eq!(store.rpush("l", b"a").unwrap(), 1);
        assert_eq!(store.rpush("l", b"b").unwrap(), 2);
        assert_eq!(store.rpush("l", b"c").unwrap(), 3);

        assert_eq!(
            store.lrange("l", 0, -1).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        assert_eq!(store.lrange("l", 1, 1).unwrap(), vec![b"b".to_vec()]);
        assert_eq!(
            store.lrange("l", -2, 100).unwrap(),
            vec![b"b".to_vec(), b"c".to_vec()]
        );
        assert!(store.lrange("l", 2, 1).unwrap().is_empty());
        assert!(store.lrange("l", 5, 10).unwrap().is_empty());
        assert!(store.lrange("missing", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_type() {
        let store = MemoryStore::new();
        store.rpush("l", b"a").unwrap();
        store.set("s", b"a").unwrap();

        assert!(matches!(store.get("l"), Err(Error::WrongType { .. })));
        assert!(matches!(store.incr("l"), Err(Error::WrongType { .. })));
        assert!(matches!(store.rpush("s", b"x"), Err(Error::WrongType { .. })));
        assert!(matches!(store.lrange("s", 0, -1), Err(Error::WrongType { .. })));

        // SET replaces a list
        store.set("l", b"now a string").unwrap();
        assert_eq!(store.get("l").unwrap(), Some(b"now a string".to_vec()));
    }

    #[test]
    fn test_flushdb() {
        let store = MemoryStore::new();
        store.set("a", b"1").unwrap();
        store.rpush("b", b"1").unwrap();
        assert_eq!(store.len(), 2);

        store.flushdb().unwrap();
        assert!(store.is_empty());
        assert!(!store.contains_key(b"a"));
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        store.set("a", b"1").unwrap();
        assert!(store.delete(b"a"));
        assert!(!store.delete(b"a"));
    }

    #[test]
    fn test_incr_by() {
        let store = MemoryStore::new();
        assert_eq!(store.incr_by_raw(b"n", 5).unwrap(), 5);
        assert_eq!(store.incr_by_raw(b"n", -7).unwrap(), -2);
        assert_eq!(store.incr("n").unwrap(), -1);

        store.set("max", i64::MAX.to_string().as_bytes()).unwrap();
        assert!(matches!(
            store.incr_by_raw(b"max", 1),
            Err(Error::NotAnInteger { .. })
        ));
    }

    #[test]
    fn test_binary_keys_stay_distinct() {
        let store = MemoryStore::new();
        store.set_raw(b"\xff", b"one").unwrap();

        assert_eq!(store.get_raw(b"\xff").unwrap(), Some(b"one".to_vec()));
        assert_eq!(store.get_raw(b"\xfe").unwrap(), None);
        assert!(!store.contains_key("\u{fffd}".as_bytes()));

        store.set_raw(b"\xfe", b"two").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_raw(b"\xff").unwrap(), Some(b"one".to_vec()));
    }

    #[test]
    fn test_rpush_all() {
        let store = MemoryStore::new();
        assert_eq!(store.rpush_all(b"l", &[&b"a"[..], b"b", b"c"]).unwrap(), 3);
        assert_eq!(store.rpush_all(b"l", &[b"d"]).unwrap(), 4);
        assert_eq!(
            store.lrange_raw(b"l", 0, -1).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );

        let none: [&[u8]; 0] = [];
        assert_eq!(store.rpush_all(b"empty", &none).unwrap(), 0);
        assert!(!store.contains_key(b"empty"));

        store.set("s", b"x").unwrap();
        assert!(matches!(
            store.rpush_all(b"s", &[b"y"]),
            Err(Error::WrongType { .. })
        ));
    }

    #[test]
    fn test_rpush_all_is_atomic() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let batch: Vec<Vec<u8>> = (0..100).map(|i| format!("{}", i).into_bytes()).collect();

        let writers: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|tag| {
                let store = std::sync::Arc::clone(&store);
                let batch: Vec<Vec<u8>> = batch
                    .iter()
                    .map(|v| [tag.as_bytes(), v].concat())
                    .collect();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        store.rpush_all(b"l", &batch).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let list = store.lrange_raw(b"l", 0, -1).unwrap();
        assert_eq!(list.len(), 2 * 20 * 100);
        // every batch of 100 is contiguous and carries a single writer tag
        for chunk in list.chunks(100) {
            let tag = chunk[0][0];
            assert!(chunk.iter().all(|v| v[0] == tag));
            assert_eq!(&chunk[99][1..], b"99");
        }
    }
}
