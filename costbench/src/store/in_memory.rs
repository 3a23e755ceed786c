//! A bounded cache living inside the benchmark process.
//!
//! Every connection created by an [`InMemoryFactory`] shares the same cache, the way workers
//! would share one remote cache server. When a capacity is configured, inserting into a full
//! cache evicts according to the configured [`Eviction`] policy, which is what produces misses
//! in the transaction phase.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{BoxedStore, CasToken, Store, StoreError, StoreFactory, StoreResult};
use crate::config::Eviction;

const NAME: &str = "memory";

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    cost: u32,
    cas: CasToken,
    rank: Rank,
}

/// Eviction order: the smallest rank is evicted first.
type Rank = (u32, u64);

#[derive(Debug)]
struct Cache {
    capacity: Option<usize>,
    eviction: Eviction,
    entries: HashMap<String, Entry>,
    order: BTreeMap<Rank, String>,
    clock: u64,
    next_cas: CasToken,
    evictions: u64,
}

impl Cache {
    fn new(capacity: Option<usize>, eviction: Eviction) -> Self {
        Self {
            capacity,
            eviction,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            clock: 0,
            next_cas: 1,
            evictions: 0,
        }
    }

    fn rank(&mut self, cost: u32) -> Rank {
        self.clock += 1;
        match self.eviction {
            Eviction::Lru => (0, self.clock),
            Eviction::LowestCost => (cost, self.clock),
        }
    }

    fn touch(&mut self, key: &str) -> Option<&Entry> {
        let cost = self.entries.get(key)?.cost;
        let rank = self.rank(cost);
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.rank);
        entry.rank = rank;
        self.order.insert(rank, key.to_owned());
        Some(entry)
    }

    fn insert(&mut self, key: &str, value: Vec<u8>, cost: u32) {
        self.remove(key);

        if let Some(capacity) = self.capacity {
            while self.entries.len() >= capacity.max(1) {
                let Some((_, victim)) = self.order.pop_first() else {
                    break;
                };
                self.entries.remove(&victim);
                self.evictions += 1;
            }
        }

        let rank = self.rank(cost);
        let cas = self.next_cas;
        self.next_cas += 1;
        self.order.insert(rank, key.to_owned());
        self.entries.insert(
            key.to_owned(),
            Entry {
                value,
                cost,
                cas,
                rank,
            },
        );
    }

    /// Rewrites an existing value in place, keeping its cost.
    fn modify(&mut self, key: &str, f: impl FnOnce(&mut Vec<u8>)) -> bool {
        let cas = self.next_cas;
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        f(&mut entry.value);
        entry.cas = cas;
        self.next_cas += 1;
        self.touch(key);
        true
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.rank);
                true
            }
            None => false,
        }
    }

    fn arithmetic(&mut self, key: &str, f: impl FnOnce(u64) -> u64) -> StoreResult<Option<u64>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        let current: u64 = std::str::from_utf8(&entry.value)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| StoreError::NotNumeric(key.to_owned()))?;

        let updated = f(current);
        self.modify(key, |value| *value = updated.to_string().into_bytes());
        Ok(Some(updated))
    }
}

/// A connection to a shared in-process cache.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    cache: Arc<Mutex<Cache>>,
    connected: bool,
}

impl InMemoryStore {
    /// Creates a new cache and returns an unconnected handle to it.
    pub fn new(capacity: Option<usize>, eviction: Eviction) -> Self {
        Self {
            cache: Arc::new(Mutex::new(Cache::new(capacity, eviction))),
            connected: false,
        }
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.lock_cache().entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the cache holds an entry for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.lock_cache().entries.contains_key(key)
    }

    /// Returns the recomputation cost stored with `key`, if present.
    pub fn cost_of(&self, key: &str) -> Option<u32> {
        self.lock_cache().entries.get(key).map(|entry| entry.cost)
    }

    fn lock_cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache(&self) -> StoreResult<MutexGuard<'_, Cache>> {
        if !self.connected {
            return Err(StoreError::NotConnected { store: NAME });
        }
        Ok(self.lock_cache())
    }
}

impl Store for InMemoryStore {
    fn name(&self) -> &'static str {
        NAME
    }

    fn init(&mut self) -> StoreResult<()> {
        self.connected = true;
        Ok(())
    }

    fn cleanup(&mut self) -> StoreResult<()> {
        if std::mem::replace(&mut self.connected, false) {
            let cache = self.lock_cache();
            tracing::debug!(
                entries = cache.entries.len(),
                evictions = cache.evictions,
                "memory store connection closed"
            );
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.cache()?.insert(key, value.to_vec(), 0);
        Ok(())
    }

    fn set_cost(&mut self, key: &str, value: &[u8], cost: u32) -> StoreResult<()> {
        self.cache()?.insert(key, value.to_vec(), cost);
        Ok(())
    }

    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.cache()?.touch(key).map(|entry| entry.value.clone()))
    }

    fn gets(&mut self, key: &str) -> StoreResult<Option<(Vec<u8>, CasToken)>> {
        Ok(self
            .cache()?
            .touch(key)
            .map(|entry| (entry.value.clone(), entry.cas)))
    }

    fn add(&mut self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let mut cache = self.cache()?;
        if cache.entries.contains_key(key) {
            return Ok(false);
        }
        cache.insert(key, value.to_vec(), 0);
        Ok(true)
    }

    fn append(&mut self, key: &str, suffix: &[u8]) -> StoreResult<bool> {
        Ok(self
            .cache()?
            .modify(key, |value| value.extend_from_slice(suffix)))
    }

    fn prepend(&mut self, key: &str, prefix: &[u8]) -> StoreResult<bool> {
        Ok(self.cache()?.modify(key, |value| {
            let mut joined = prefix.to_vec();
            joined.append(value);
            *value = joined;
        }))
    }

    fn cas(&mut self, key: &str, token: CasToken, value: &[u8]) -> StoreResult<bool> {
        let mut cache = self.cache()?;
        let Some(entry) = cache.entries.get(key) else {
            return Ok(false);
        };
        if entry.cas != token {
            return Ok(false);
        }
        let cost = entry.cost;
        cache.insert(key, value.to_vec(), cost);
        Ok(true)
    }

    fn incr(&mut self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.cache()?
            .arithmetic(key, |current| current.wrapping_add(delta))
    }

    fn decr(&mut self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.cache()?
            .arithmetic(key, |current| current.saturating_sub(delta))
    }

    fn delete(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.cache()?.remove(key))
    }

    fn replace(&mut self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let mut cache = self.cache()?;
        let Some(cost) = cache.entries.get(key).map(|entry| entry.cost) else {
            return Ok(false);
        };
        cache.insert(key, value.to_vec(), cost);
        Ok(true)
    }

    fn update(&mut self, key: &str, value: &[u8]) -> StoreResult<bool> {
        Ok(self
            .cache()?
            .modify(key, |current| *current = value.to_vec()))
    }
}

/// Hands out connections to one shared [`InMemoryStore`].
#[derive(Debug, Clone)]
pub struct InMemoryFactory {
    store: InMemoryStore,
}

impl InMemoryFactory {
    /// Creates a factory around a new, empty cache.
    pub fn new(capacity: Option<usize>, eviction: Eviction) -> Self {
        Self {
            store: InMemoryStore::new(capacity, eviction),
        }
    }

    /// A handle for inspecting the shared cache.
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }
}

impl StoreFactory for InMemoryFactory {
    fn name(&self) -> &'static str {
        NAME
    }

    fn connect(&self) -> StoreResult<BoxedStore> {
        Ok(Box::new(self.store.clone()))
    }
}
