//! The capability every backing store implements.
//!
//! The workload only talks to a store through [`Store`]. Each worker owns one connection, so the
//! methods take `&mut self` and may block on I/O. Store-level outcomes that are part of normal
//! cache operation ("not stored", "not found", a miss) are reported through the return value;
//! [`StoreError`] is reserved for failures of the store or its connection.

use std::fmt::Debug;

use thiserror::Error;

use crate::config;

mod in_memory;

pub use in_memory::{InMemoryFactory, InMemoryStore};

/// A type-erased [`Store`] connection.
pub type BoxedStore = Box<dyn Store>;

/// A type-erased [`StoreFactory`].
pub type BoxedStoreFactory = Box<dyn StoreFactory>;

/// A CAS token returned by [`Store::gets`].
pub type CasToken = u64;

/// One connection to a key/value store.
pub trait Store: Debug + Send + 'static {
    /// The store name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Opens the connection. Called once before the first operation.
    fn init(&mut self) -> StoreResult<()>;

    /// Closes the connection. Called once after the last operation.
    fn cleanup(&mut self) -> StoreResult<()>;

    /// Stores `value` under `key` unconditionally.
    fn set(&mut self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Stores `value` under `key` together with the cost of recomputing it.
    fn set_cost(&mut self, key: &str, value: &[u8], cost: u32) -> StoreResult<()>;

    /// Reads `key`. Returns `None` on a miss.
    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Reads `key` together with its CAS token. Returns `None` on a miss.
    fn gets(&mut self, key: &str) -> StoreResult<Option<(Vec<u8>, CasToken)>>;

    /// Stores `value` only if `key` is absent. Returns whether it was stored.
    fn add(&mut self, key: &str, value: &[u8]) -> StoreResult<bool>;

    /// Appends `suffix` to an existing value. Returns whether `key` existed.
    fn append(&mut self, key: &str, suffix: &[u8]) -> StoreResult<bool>;

    /// Prepends `prefix` to an existing value. Returns whether `key` existed.
    fn prepend(&mut self, key: &str, prefix: &[u8]) -> StoreResult<bool>;

    /// Stores `value` only if the entry still carries `token`. Returns whether it was stored.
    fn cas(&mut self, key: &str, token: CasToken, value: &[u8]) -> StoreResult<bool>;

    /// Increments a numeric value. Returns the new value, or `None` if `key` is absent.
    fn incr(&mut self, key: &str, delta: u64) -> StoreResult<Option<u64>>;

    /// Decrements a numeric value, saturating at zero. Returns the new value, or `None` if
    /// `key` is absent.
    fn decr(&mut self, key: &str, delta: u64) -> StoreResult<Option<u64>>;

    /// Removes `key`. Returns whether it existed.
    fn delete(&mut self, key: &str) -> StoreResult<bool>;

    /// Stores `value` only if `key` exists. Returns whether it was stored.
    fn replace(&mut self, key: &str, value: &[u8]) -> StoreResult<bool>;

    /// Overwrites part of an existing record. Returns whether `key` existed.
    fn update(&mut self, key: &str, value: &[u8]) -> StoreResult<bool>;
}

/// Opens connections to one configured store.
///
/// The factory is resolved once at startup from [`config::Store`] and handed to the worker pool,
/// which opens one connection per worker.
pub trait StoreFactory: Debug + Send + Sync {
    /// The name of the stores this factory opens.
    fn name(&self) -> &'static str;

    /// Creates a new, not yet initialized connection.
    fn connect(&self) -> StoreResult<BoxedStore>;
}

/// Resolves the configured store into a factory.
pub fn factory(config: &config::Store) -> BoxedStoreFactory {
    match config {
        config::Store::Memory { capacity, eviction } => {
            Box::new(InMemoryFactory::new(*capacity, *eviction))
        }
    }
}

/// Errors reported by a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An operation was issued on a connection that is not open.
    #[error("{store} connection is not open")]
    NotConnected {
        /// The store name.
        store: &'static str,
    },

    /// An arithmetic operation hit a value that is not a decimal integer.
    #[error("value of `{0}` is not numeric")]
    NotNumeric(String),

    /// Any other error stemming from a store, which might be specific to that store or to a
    /// certain operation.
    #[error("store error: {context}")]
    Generic {
        /// What the store was doing.
        context: String,
        /// The underlying error, if any.
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Creates a [`StoreError::Generic`] without an underlying cause.
    pub fn other(context: impl Into<String>) -> Self {
        Self::Generic {
            context: context.into(),
            cause: None,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
