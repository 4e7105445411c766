//! Cache: stores payloads under freshly generated keys

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::instrument::{Counted, Operation, OperationId, Recorded};
use crate::payload::Payload;
use crate::store::KeyValueStore;

/// Identity of the instrumented `store` operation
pub const STORE_OPERATION: &str = "Cache.store";

/// Caching client over a key-value store
///
/// The cache owns its store handle; clones share it.
pub struct Cache<S: ?Sized> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> Cache<S> {
    /// Create a cache over `store`
    ///
    /// The store is left as-is; call [`Cache::flush`] for a clean slate.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store_handle(&self) -> &S {
        &self.store
    }

    /// Write `data` under a new random key and return the key
    ///
    /// # Arguments
    /// * `data` - Text, bytes, integer or float
    ///
    /// # Returns
    /// * `Result<String>` - 32 hex characters naming the stored value
    pub fn store(&self, data: impl Into<Payload>) -> Result<String> {
        let data = data.into();
        let key = Uuid::new_v4().simple().to_string();

        self.store.set(&key, &data.to_bytes())?;
        debug!(%key, "stored payload");

        Ok(key)
    }

    /// Raw bytes under `key`, `None` if absent
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.store.get(key)
    }

    /// Value under `key` passed through `transform`
    ///
    /// The transform only sees values that exist; a missing key yields
    /// `Ok(None)` without calling it.
    pub fn get_with<T, F>(&self, key: &str, transform: F) -> Result<Option<T>>
    where
        F: FnOnce(Vec<u8>) -> Result<T>,
    {
        self.store.get(key)?.map(transform).transpose()
    }

    /// Value under `key` decoded as UTF-8
    pub fn get_as_string(&self, key: &str) -> Result<Option<String>> {
        self.get_with(key, |raw| Ok(String::from_utf8(raw)?))
    }

    /// Value under `key` parsed as a decimal integer
    pub fn get_as_integer(&self, key: &str) -> Result<Option<i64>> {
        self.get_with(key, |raw| {
            let text = String::from_utf8(raw)?;
            Ok(text.trim().parse::<i64>()?)
        })
    }

    /// Remove every key from the store
    pub fn flush(&self) -> Result<()> {
        self.store.flushdb()
    }

    /// [`Cache::store`] as an [`Operation`] named [`STORE_OPERATION`]
    pub fn store_operation(&self) -> StoreOperation<S> {
        StoreOperation {
            cache: self.clone(),
            id: OperationId::from_static(STORE_OPERATION),
        }
    }

    /// [`Cache::store`] as an [`Operation`] with a caller-chosen identity
    pub fn store_operation_as(&self, id: OperationId) -> StoreOperation<S> {
        StoreOperation {
            cache: self.clone(),
            id,
        }
    }

    /// `store` with call counting around call history, the canonical stack
    pub fn instrumented_store(&self) -> Counted<Recorded<StoreOperation<S>>> {
        Counted::new(Recorded::new(self.store_operation()))
    }
}

impl<S: ?Sized> Clone for Cache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: fmt::Debug + ?Sized> fmt::Debug for Cache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("store", &self.store).finish()
    }
}

/// [`Cache::store`] bound to its cache
pub struct StoreOperation<S: ?Sized> {
    cache: Cache<S>,
    id: OperationId,
}

impl<S: KeyValueStore + ?Sized> StoreOperation<S> {
    /// The owning cache
    pub fn cache(&self) -> &Cache<S> {
        &self.cache
    }
}

impl<S: ?Sized> Clone for StoreOperation<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            id: self.id.clone(),
        }
    }
}

impl<S: ?Sized> fmt::Debug for StoreOperation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOperation").field("id", &self.id).finish()
    }
}

impl<S: KeyValueStore + ?Sized> Operation for StoreOperation<S> {
    type Store = S;
    type Input = Payload;
    type Output = String;

    fn id(&self) -> &OperationId {
        &self.id
    }

    fn store(&self) -> &S {
        self.cache.store_handle()
    }

    fn call(&self, input: Payload) -> Result<String> {
        self.cache.store(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;

    fn cache() -> Cache<MemoryStore> {
        Cache::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_store_round_trip() {
        let cache = cache();

        let cases: Vec<(Payload, &[u8])> = vec![
            (Payload::from("foo"), &b"foo"[..]),
            (Payload::from(&b"\x00\xffbin"[..]), &b"\x00\xffbin"[..]),
            (Payload::from(42), &b"42"[..]),
            (Payload::from(3.14), &b"3.14"[..]),
        ];

        for (payload, expected) in cases {
            let key = cache.store(payload).unwrap();
            assert_eq!(cache.get(&key).unwrap().as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_generated_keys() {
        let cache = cache();
        let a = cache.store("x").unwrap();
        let b = cache.store("x").unwrap();

        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_get_missing() {
        let cache = cache();
        assert_eq!(cache.get("nope").unwrap(), None);
        assert_eq!(cache.get_as_string("nope").unwrap(), None);
        assert_eq!(cache.get_as_integer("nope").unwrap(), None);
    }

    #[test]
    fn test_get_with_transform() {
        let cache = cache();
        let key = cache.store("hello").unwrap();

        let len = cache.get_with(&key, |raw| Ok(raw.len())).unwrap();
        assert_eq!(len, Some(5));

        let mut called = false;
        let missing = cache
            .get_with("nope", |raw| {
                called = true;
                Ok(raw)
            })
            .unwrap();
        assert_eq!(missing, None);
        assert!(!called);
    }

    #[test]
    fn test_typed_getters() {
        let cache = cache();

        let text = cache.store("foo").unwrap();
        let number = cache.store(-123).unwrap();
        assert_eq!(cache.get_as_string(&text).unwrap().as_deref(), Some("foo"));
        assert_eq!(cache.get_as_integer(&number).unwrap(), Some(-123));
        assert_eq!(cache.get_as_string(&number).unwrap().as_deref(), Some("-123"));
    }

    #[test]
    fn test_typed_getter_failures() {
        let cache = cache();

        let text = cache.store("foo").unwrap();
        let float = cache.store(1.5).unwrap();
        let binary = cache.store(vec![0xffu8, 0xfe]).unwrap();

        assert!(matches!(cache.get_as_integer(&text), Err(Error::InvalidInteger(_))));
        assert!(matches!(cache.get_as_integer(&float), Err(Error::InvalidInteger(_))));
        assert!(matches!(cache.get_as_string(&binary), Err(Error::InvalidUtf8(_))));
    }

    #[test]
    fn test_flush() {
        let cache = cache();
        let key = cache.store("foo").unwrap();
        cache.flush().unwrap();
        assert_eq!(cache.get(&key).unwrap(), None);
    }

    #[test]
    fn test_store_operation_shares_store() {
        let cache = cache();
        let op = cache.store_operation();
        assert_eq!(op.id().as_str(), STORE_OPERATION);

        let key = op.call(Payload::from("via op")).unwrap();
        assert_eq!(cache.get_as_string(&key).unwrap().as_deref(), Some("via op"));
        assert_eq!(op.cache().get(&key).unwrap(), Some(b"via op".to_vec()));
    }

    #[test]
    fn test_instrumented_store_first_call() {
        let cache = cache();
        let store = cache.instrumented_store();

        let key = store.call(Payload::from("foo")).unwrap();
        assert_eq!(cache.get(&key).unwrap(), Some(b"foo".to_vec()));

        let backend = cache.store_handle();
        assert_eq!(cache.get_as_integer(STORE_OPERATION).unwrap(), Some(1));
        assert_eq!(
            backend.lrange("Cache.store:inputs", 0, -1).unwrap(),
            vec![b"('foo',)".to_vec()]
        );
        assert_eq!(
            backend.lrange("Cache.store:outputs", 0, -1).unwrap(),
            vec![key.into_bytes()]
        );
    }

    #[test]
    fn test_distinct_identities_stay_independent() {
        let cache = cache();
        let first = Counted::new(Recorded::new(cache.store_operation()));
        let second = Counted::new(Recorded::new(
            cache.store_operation_as(OperationId::new("Cache.store_backup").unwrap()),
        ));

        first.call(Payload::from(1)).unwrap();
        second.call(Payload::from(2)).unwrap();
        first.call(Payload::from(3)).unwrap();

        assert_eq!(cache.get_as_integer("Cache.store").unwrap(), Some(2));
        assert_eq!(cache.get_as_integer("Cache.store_backup").unwrap(), Some(1));

        let backend = cache.store_handle();
        assert_eq!(
            backend.lrange("Cache.store:inputs", 0, -1).unwrap(),
            vec![b"(1,)".to_vec(), b"(3,)".to_vec()]
        );
        assert_eq!(
            backend.lrange("Cache.store_backup:inputs", 0, -1).unwrap(),
            vec![b"(2,)".to_vec()]
        );
    }

    #[test]
    fn test_dyn_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = Cache::new(store);

        let key = cache.instrumented_store().call(Payload::from(7)).unwrap();
        assert_eq!(cache.get_as_integer(&key).unwrap(), Some(7));
    }
}
