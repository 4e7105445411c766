//! Call instrumentation
//!
//! An [`Operation`] is a named, invocable unit of work bound to the store of
//! the object that owns it. Two wrappers add bookkeeping without changing
//! the wrapped operation's inputs or outputs:
//!
//! - [`Counted`] increments a counter under the operation's identity
//! - [`Recorded`] appends each call's rendered arguments and result to the
//!   `<name>:inputs` and `<name>:outputs` lists
//!
//! Both are operations themselves, so they stack in either order:
//!
//! ```
//! use std::sync::Arc;
//! use kvcache::{Cache, Counted, MemoryStore, Operation, Recorded};
//!
//! let cache = Cache::new(Arc::new(MemoryStore::new()));
//! let store = Counted::new(Recorded::new(cache.store_operation()));
//!
//! let key = store.call("foo".into()).unwrap();
//! assert_eq!(cache.get(&key).unwrap(), Some(b"foo".to_vec()));
//! ```

use std::fmt;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::store::KeyValueStore;

const INPUTS_SUFFIX: &str = ":inputs";
const OUTPUTS_SUFFIX: &str = ":outputs";

/// Stable name of an instrumented operation
///
/// The name is the counter key; the history logs live under
/// `<name>:inputs` and `<name>:outputs`. Names ending in either suffix are
/// rejected, which keeps the derived keys of distinct identities disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(String);

impl OperationId {
    /// Validate and wrap an operation name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.ends_with(INPUTS_SUFFIX) || name.ends_with(OUTPUTS_SUFFIX) {
            return Err(Error::InvalidOperationId(name));
        }
        Ok(Self(name))
    }

    /// Built-in names that are known to be valid
    pub(crate) fn from_static(name: &'static str) -> Self {
        Self(name.to_string())
    }

    /// The operation name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the call counter
    pub fn counter_key(&self) -> &str {
        &self.0
    }

    /// Key of the inputs log
    pub fn inputs_key(&self) -> String {
        format!("{}{}", self.0, INPUTS_SUFFIX)
    }

    /// Key of the outputs log
    pub fn outputs_key(&self) -> String {
        format!("{}{}", self.0, OUTPUTS_SUFFIX)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Positional arguments of one call, rendered as a tuple literal for the
/// inputs log
pub trait CallArgs {
    /// `()`, `('foo',)`
    fn render(&self) -> String;
}

impl CallArgs for () {
    fn render(&self) -> String {
        "()".to_string()
    }
}

impl CallArgs for Payload {
    fn render(&self) -> String {
        format!("({},)", self.repr())
    }
}

/// Return value of one call, encoded for the outputs log
pub trait CallRecord {
    /// Bytes appended to the outputs log
    fn record(&self) -> Vec<u8>;
}

impl CallRecord for String {
    fn record(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl CallRecord for Payload {
    fn record(&self) -> Vec<u8> {
        self.to_bytes()
    }
}

/// A named operation bound to the store of its owning object
pub trait Operation {
    /// Store that holds this operation's bookkeeping
    type Store: KeyValueStore + ?Sized;
    /// Positional arguments
    type Input: CallArgs;
    /// Return value
    type Output: CallRecord;

    /// Identity used to derive bookkeeping keys
    fn id(&self) -> &OperationId;

    /// Store handle of the owning object
    fn store(&self) -> &Self::Store;

    /// Run the operation
    fn call(&self, input: Self::Input) -> Result<Self::Output>;
}

/// Counts every call under the operation's counter key
///
/// The increment happens before the wrapped call and is kept even if that
/// call fails, so the counter tracks attempts. If the increment itself
/// fails the wrapped call does not run.
#[derive(Debug, Clone)]
pub struct Counted<O> {
    inner: O,
}

impl<O: Operation> Counted<O> {
    /// Wrap `inner`
    pub fn new(inner: O) -> Self {
        Self { inner }
    }

    /// The wrapped operation
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Unwrap
    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: Operation> Operation for Counted<O> {
    type Store = O::Store;
    type Input = O::Input;
    type Output = O::Output;

    fn id(&self) -> &OperationId {
        self.inner.id()
    }

    fn store(&self) -> &Self::Store {
        self.inner.store()
    }

    fn call(&self, input: Self::Input) -> Result<Self::Output> {
        let id = self.inner.id();
        let count = self.inner.store().incr(id.counter_key())?;
        trace!(operation = %id, count, "call counted");

        self.inner.call(input)
    }
}

/// When [`Recorded`] appends the input record of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPolicy {
    /// Append input and output together after the wrapped call succeeds.
    /// Failed calls leave no history and the two logs stay aligned. The two
    /// appends are separate commands: if the output append fails after the
    /// input landed, that one input stays without an output and the error
    /// is returned.
    #[default]
    OnSuccess,
    /// Append the input before the wrapped call. A failed call leaves an
    /// input record with no matching output.
    Eager,
}

/// Appends each call's arguments and result to the history logs
#[derive(Debug, Clone)]
pub struct Recorded<O> {
    inner: O,
    policy: HistoryPolicy,
}

impl<O: Operation> Recorded<O> {
    /// Wrap `inner` with [`HistoryPolicy::OnSuccess`]
    pub fn new(inner: O) -> Self {
        Self::with_policy(inner, HistoryPolicy::default())
    }

    /// Wrap `inner` with an explicit policy
    pub fn with_policy(inner: O, policy: HistoryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The active policy
    pub fn policy(&self) -> HistoryPolicy {
        self.policy
    }

    /// The wrapped operation
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Unwrap
    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: Operation> Operation for Recorded<O> {
    type Store = O::Store;
    type Input = O::Input;
    type Output = O::Output;

    fn id(&self) -> &OperationId {
        self.inner.id()
    }

    fn store(&self) -> &Self::Store {
        self.inner.store()
    }

    fn call(&self, input: Self::Input) -> Result<Self::Output> {
        let id = self.inner.id();
        let store = self.inner.store();
        let rendered = input.render();

        if self.policy == HistoryPolicy::Eager {
            store.rpush(&id.inputs_key(), rendered.as_bytes())?;
        }

        let output = self.inner.call(input)?;

        if self.policy == HistoryPolicy::OnSuccess {
            store.rpush(&id.inputs_key(), rendered.as_bytes())?;
        }
        let position = store.rpush(&id.outputs_key(), &output.record())?;
        debug!(operation = %id, position, args = %rendered, "call recorded");

        Ok(output)
    }
}
