//! A store stub with a scripted hit/miss sequence and an event log.
//!
//! [`Script`] is a [`StoreFactory`]. Every connection it opens shares one GET counter and one
//! event log, so tests can replay exactly what the workers did.
//!
//! # Example
//!
//! ```
//! use costbench::store::{Store, StoreFactory};
//! use costbench_test::store::{Event, Script};
//!
//! // Every third GET misses.
//! let script = Script::with_misses([false, false, true]);
//! let mut store = script.connect().unwrap();
//! store.init().unwrap();
//!
//! assert!(store.get("a").unwrap().is_some());
//! assert!(store.get("a").unwrap().is_some());
//! assert!(store.get("a").unwrap().is_none());
//! assert_eq!(script.events()[2], Event::Get { key: "a".into(), hit: false });
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use costbench::store::{BoxedStore, CasToken, Store, StoreError, StoreFactory, StoreResult};

const NAME: &str = "scripted";

/// One store call as seen by a [`ScriptedStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A write. `cost` is `None` for writes without a cost annotation.
    Set { key: String, cost: Option<u32> },
    /// A read and whether the script let it hit.
    Get { key: String, hit: bool },
    /// Any other operation, by name.
    Other { op: &'static str, key: String },
}

#[derive(Debug, Default)]
struct State {
    gets: AtomicUsize,
    connections: AtomicUsize,
    cleanups: AtomicUsize,
    events: Mutex<Vec<Event>>,
}

/// Opens [`ScriptedStore`] connections that follow one shared script.
#[derive(Clone, Debug, Default)]
pub struct Script {
    misses: Arc<[bool]>,
    fail_init: Option<usize>,
    state: Arc<State>,
}

impl Script {
    /// A script where every GET hits.
    pub fn new() -> Self {
        Self::default()
    }

    /// A script that cycles through `pattern` on every GET, across all connections. `true`
    /// entries miss.
    pub fn with_misses(pattern: impl IntoIterator<Item = bool>) -> Self {
        Self {
            misses: pattern.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Makes the `connection`-th opened connection (zero-based) fail its `init`.
    pub fn fail_init_on(mut self, connection: usize) -> Self {
        self.fail_init = Some(connection);
        self
    }

    /// All events recorded so far, in call order.
    pub fn events(&self) -> Vec<Event> {
        self.lock_events().clone()
    }

    /// Number of connections opened.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Number of connections closed through `cleanup`.
    pub fn cleanups(&self) -> usize {
        self.state.cleanups.load(Ordering::SeqCst)
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_get_hits(&self) -> bool {
        if self.misses.is_empty() {
            return true;
        }
        let index = self.state.gets.fetch_add(1, Ordering::SeqCst);
        !self.misses[index % self.misses.len()]
    }
}

impl StoreFactory for Script {
    fn name(&self) -> &'static str {
        NAME
    }

    fn connect(&self) -> StoreResult<BoxedStore> {
        let index = self.state.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedStore {
            index,
            script: self.clone(),
        }))
    }
}

/// A connection opened by a [`Script`].
#[derive(Debug)]
pub struct ScriptedStore {
    index: usize,
    script: Script,
}

impl ScriptedStore {
    fn log(&self, event: Event) {
        self.script.lock_events().push(event);
    }

    fn other(&self, op: &'static str, key: &str) {
        self.log(Event::Other {
            op,
            key: key.to_owned(),
        });
    }
}

impl Store for ScriptedStore {
    fn name(&self) -> &'static str {
        NAME
    }

    fn init(&mut self) -> StoreResult<()> {
        if self.script.fail_init == Some(self.index) {
            return Err(StoreError::other(format!(
                "scripted init failure on connection {}",
                self.index
            )));
        }
        Ok(())
    }

    fn cleanup(&mut self) -> StoreResult<()> {
        self.script.state.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set(&mut self, key: &str, _value: &[u8]) -> StoreResult<()> {
        self.log(Event::Set {
            key: key.to_owned(),
            cost: None,
        });
        Ok(())
    }

    fn set_cost(&mut self, key: &str, _value: &[u8], cost: u32) -> StoreResult<()> {
        self.log(Event::Set {
            key: key.to_owned(),
            cost: Some(cost),
        });
        Ok(())
    }

    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let hit = self.script.next_get_hits();
        self.log(Event::Get {
            key: key.to_owned(),
            hit,
        });
        Ok(hit.then(|| b"value".to_vec()))
    }

    fn gets(&mut self, key: &str) -> StoreResult<Option<(Vec<u8>, CasToken)>> {
        self.other("gets", key);
        Ok(Some((b"value".to_vec(), 1)))
    }

    fn add(&mut self, key: &str, _value: &[u8]) -> StoreResult<bool> {
        self.other("add", key);
        Ok(true)
    }

    fn append(&mut self, key: &str, _suffix: &[u8]) -> StoreResult<bool> {
        self.other("append", key);
        Ok(true)
    }

    fn prepend(&mut self, key: &str, _prefix: &[u8]) -> StoreResult<bool> {
        self.other("prepend", key);
        Ok(true)
    }

    fn cas(&mut self, key: &str, _token: CasToken, _value: &[u8]) -> StoreResult<bool> {
        self.other("cas", key);
        Ok(true)
    }

    fn incr(&mut self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.other("incr", key);
        Ok(Some(delta))
    }

    fn decr(&mut self, key: &str, _delta: u64) -> StoreResult<Option<u64>> {
        self.other("decr", key);
        Ok(Some(0))
    }

    fn delete(&mut self, key: &str) -> StoreResult<bool> {
        self.other("delete", key);
        Ok(true)
    }

    fn replace(&mut self, key: &str, _value: &[u8]) -> StoreResult<bool> {
        self.other("replace", key);
        Ok(true)
    }

    fn update(&mut self, key: &str, _value: &[u8]) -> StoreResult<bool> {
        self.other("update", key);
        Ok(true)
    }
}
