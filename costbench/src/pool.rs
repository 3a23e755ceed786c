//! The worker pool that drives a [`Workload`] against one store connection per thread.
//!
//! All workers draw from a shared operation budget. The first `record_count` claimed operations
//! load the store; the rest are transactions. Results flow into a shared [`Aggregator`].
//!
//! Store connections are opened and initialized before any thread starts, so a failing store
//! aborts the benchmark before the first operation. [`WorkerPool::close`] stops further claims
//! without interrupting operations in flight, and [`WorkerPool::join`] waits for every worker to
//! wind down and collects the final report.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use sketches_ddsketch::DDSketch;

use crate::config::Config;
use crate::error::PoolError;
use crate::stats::{Aggregator, MissStats};
use crate::store::{BoxedStore, StoreFactory};
use crate::workload::{OperationKind, OperationResult, Phase, Workload};

/// Settings of a [`WorkerPool`].
#[derive(Clone, Debug)]
pub struct PoolOptions {
    /// Prefix of the worker thread names.
    pub name: String,
    /// Number of workers.
    pub threads: usize,
    /// Total operations across all workers, loads included.
    pub operation_count: u64,
    /// Number of leading operations that load the store.
    pub record_count: u64,
    /// Base seed of the per-worker RNGs. Random if unset.
    pub seed: Option<u64>,
    /// Whether workers print the cost histogram on exit.
    pub print_histogram: bool,
    /// How often progress is logged. Zero disables progress logging.
    pub status_interval: Duration,
}

impl PoolOptions {
    /// Takes the pool settings from the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: "costbench".into(),
            threads: config.threads,
            operation_count: config.operation_count,
            record_count: config.record_count,
            seed: config.seed,
            print_histogram: config.print_histogram,
            status_interval: config.status_interval,
        }
    }
}

#[derive(Debug)]
struct Budget {
    alive: bool,
    remaining: u64,
}

#[derive(Debug)]
struct Shared {
    budget: Mutex<Budget>,
    stats: Aggregator,
    operation_count: u64,
}

impl Shared {
    /// Claims one unit of budget and returns how many units have been consumed, this one
    /// included. Returns `None` once the pool is closed or the budget is spent.
    fn claim(&self) -> Option<u64> {
        let mut budget = self.budget.lock().unwrap_or_else(PoisonError::into_inner);
        if !budget.alive || budget.remaining == 0 {
            return None;
        }
        budget.remaining -= 1;
        Some(self.operation_count - budget.remaining)
    }

    fn remaining(&self) -> u64 {
        self.budget
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remaining
    }

    fn close(&self) {
        self.budget
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .alive = false;
    }
}

/// A cloneable handle that can stop a running pool from another thread.
#[derive(Clone, Debug)]
pub struct PoolHandle {
    shared: Arc<Shared>,
}

impl PoolHandle {
    /// Stops workers from claiming further operations.
    pub fn close(&self) {
        self.shared.close();
    }
}

/// Per-worker operation counts and latencies.
pub struct WorkerReport {
    /// The worker's thread name.
    pub name: String,
    /// Operations performed.
    pub operations: u64,
    /// Operations whose store calls failed.
    pub failures: u64,
    /// Latency of each operation in seconds, by kind.
    pub latencies: BTreeMap<OperationKind, DDSketch>,
}

impl fmt::Debug for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let latencies: BTreeMap<_, _> = self
            .latencies
            .iter()
            .map(|(kind, sketch)| (kind, sketch.count()))
            .collect();

        f.debug_struct("WorkerReport")
            .field("name", &self.name)
            .field("operations", &self.operations)
            .field("failures", &self.failures)
            .field("latencies", &latencies)
            .finish()
    }
}

impl WorkerReport {
    fn new(name: String) -> Self {
        Self {
            name,
            operations: 0,
            failures: 0,
            latencies: BTreeMap::new(),
        }
    }

    fn record(&mut self, result: &OperationResult, elapsed: Duration) {
        self.operations += 1;
        if !result.success {
            self.failures += 1;
        }
        self.latencies
            .entry(result.kind)
            .or_default()
            .add(elapsed.as_secs_f64());
    }
}

/// The outcome of a finished pool.
#[derive(Debug)]
pub struct PoolReport {
    /// Aggregate miss-cost statistics.
    pub stats: MissStats,
    /// One entry per worker that exited normally.
    pub workers: Vec<WorkerReport>,
    /// Wall time from spawn to join.
    pub elapsed: Duration,
}

impl PoolReport {
    /// Operations performed by all workers.
    pub fn operations(&self) -> u64 {
        self.workers.iter().map(|w| w.operations).sum()
    }

    /// Failed operations across all workers.
    pub fn failures(&self) -> u64 {
        self.workers.iter().map(|w| w.failures).sum()
    }

    /// Latencies of all workers merged by operation kind.
    pub fn latencies(&self) -> BTreeMap<OperationKind, DDSketch> {
        let mut merged = BTreeMap::<OperationKind, DDSketch>::new();
        for worker in &self.workers {
            for (kind, sketch) in &worker.latencies {
                let total = merged.entry(*kind).or_default();
                if let Err(error) = total.merge(sketch) {
                    tracing::warn!(%kind, worker = worker.name, "cannot merge latencies: {error}");
                }
            }
        }
        merged
    }
}

struct Worker {
    name: String,
    shared: Arc<Shared>,
    workload: Arc<Workload>,
    store: BoxedStore,
    rng: SmallRng,
    record_count: u64,
    print_histogram: bool,
}

impl Worker {
    fn run(mut self) -> WorkerReport {
        tracing::debug!(worker = self.name, "worker started");
        let mut report = WorkerReport::new(self.name.clone());

        while let Some(consumed) = self.shared.claim() {
            let start = Instant::now();
            let result = if consumed <= self.record_count {
                self.workload
                    .do_insert(self.store.as_mut(), &mut self.rng, Phase::Load)
            } else {
                let committed = self.shared.stats.committed_sets();
                self.workload
                    .do_transaction(self.store.as_mut(), &mut self.rng, committed)
            };
            report.record(&result, start.elapsed());
            self.shared.stats.update(&result);
        }

        if let Err(error) = self.store.cleanup() {
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                worker = self.name,
                "failed to close store connection"
            );
        }

        let (summary, histogram) = self.shared.stats.summary(self.print_histogram);
        println!("{summary}");
        if let Some(histogram) = histogram {
            println!("{histogram}");
        }

        tracing::debug!(
            worker = self.name,
            operations = report.operations,
            failures = report.failures,
            "worker done"
        );
        report
    }
}

/// A fixed set of worker threads sharing one operation budget.
#[derive(Debug)]
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<WorkerReport>>,
    status: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
    started: Instant,
}

impl WorkerPool {
    /// Opens one store connection per worker and starts the workers.
    ///
    /// Fails without starting any worker if a connection cannot be opened or initialized.
    /// Connections that were already initialized are closed again.
    pub fn spawn(
        options: PoolOptions,
        workload: Arc<Workload>,
        factory: &dyn StoreFactory,
    ) -> Result<Self, PoolError> {
        if options.threads == 0 {
            return Err(PoolError::NoWorkers);
        }

        let mut stores = Vec::with_capacity(options.threads);
        for worker in 0..options.threads {
            match open_store(factory) {
                Ok(store) => stores.push(store),
                Err(cause) => {
                    cleanup_all(&mut stores);
                    return Err(PoolError::Store {
                        worker,
                        store: factory.name(),
                        cause,
                    });
                }
            }
        }

        let shared = Arc::new(Shared {
            budget: Mutex::new(Budget {
                alive: true,
                remaining: options.operation_count,
            }),
            stats: Aggregator::new(),
            operation_count: options.operation_count,
        });
        let base_seed = options.seed.unwrap_or_else(rand::random);

        tracing::info!(
            threads = options.threads,
            operations = options.operation_count,
            records = options.record_count,
            store = factory.name(),
            seed = base_seed,
            "starting workers"
        );

        let started = Instant::now();
        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(options.threads),
            status: None,
            started,
        };

        let mut stores = stores.into_iter().enumerate();
        while let Some((index, store)) = stores.next() {
            let worker = Worker {
                name: format!("{}-worker-{index}", options.name),
                shared: Arc::clone(&pool.shared),
                workload: Arc::clone(&workload),
                store,
                rng: SmallRng::seed_from_u64(base_seed.wrapping_add(index as u64)),
                record_count: options.record_count,
                print_histogram: options.print_histogram,
            };

            let spawned = std::thread::Builder::new()
                .name(worker.name.clone())
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(error) => {
                    let mut rest: Vec<_> = stores.map(|(_, store)| store).collect();
                    cleanup_all(&mut rest);
                    pool.close();
                    pool.join();
                    return Err(PoolError::Spawn(error));
                }
            }
        }

        if !options.status_interval.is_zero() {
            pool.status = spawn_status(&options, Arc::clone(&pool.shared));
        }

        Ok(pool)
    }

    /// Claims one unit of budget. Returns `false` once the pool is closed or the budget is spent.
    pub fn claim_next(&self) -> bool {
        self.shared.claim().is_some()
    }

    /// A handle for closing the pool from elsewhere.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stops workers from claiming further operations. Calling this more than once is harmless.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Waits for all workers to exit and returns the final report.
    pub fn join(mut self) -> PoolReport {
        let mut workers = Vec::with_capacity(self.workers.len());
        for handle in self.workers.drain(..) {
            match handle.join() {
                Ok(report) => workers.push(report),
                Err(_) => tracing::error!("worker thread panicked"),
            }
        }

        if let Some((stop, handle)) = self.status.take() {
            drop(stop);
            let _ = handle.join();
        }

        let elapsed = self.started.elapsed();
        tracing::info!(elapsed = ?elapsed, "all workers done");

        PoolReport {
            stats: self.shared.stats.take(),
            workers,
            elapsed,
        }
    }
}

fn open_store(factory: &dyn StoreFactory) -> crate::store::StoreResult<BoxedStore> {
    let mut store = factory.connect()?;
    store.init()?;
    Ok(store)
}

fn cleanup_all(stores: &mut [BoxedStore]) {
    for store in stores {
        if let Err(error) = store.cleanup() {
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                store = store.name(),
                "failed to close store connection"
            );
        }
    }
}

/// Logs progress every `status_interval` until the returned sender is dropped.
fn spawn_status(
    options: &PoolOptions,
    shared: Arc<Shared>,
) -> Option<(mpsc::Sender<()>, JoinHandle<()>)> {
    let (stop, stopped) = mpsc::channel::<()>();
    let interval = options.status_interval;
    let started = Instant::now();

    let spawned = std::thread::Builder::new()
        .name(format!("{}-status", options.name))
        .spawn(move || {
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let done = shared.operation_count - shared.remaining();
                        let totals = shared.stats.totals();
                        let rate = done as f64 / started.elapsed().as_secs_f64();
                        tracing::info!(
                            done,
                            total = shared.operation_count,
                            gets = totals.gets,
                            sets = totals.sets,
                            misses = totals.total_misses,
                            miss_cost = totals.total_miss_cost,
                            "{rate:.2} operations/s"
                        );
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

    match spawned {
        Ok(handle) => Some((stop, handle)),
        Err(error) => {
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                "progress logging disabled"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Eviction, InsertOrder, Operations};
    use crate::store::InMemoryFactory;

    fn config(operation_count: u64, record_count: u64, threads: usize) -> Config {
        Config {
            threads,
            operation_count,
            record_count,
            insert_order: InsertOrder::Ordered,
            print_histogram: false,
            seed: Some(7),
            status_interval: Duration::ZERO,
            ..Config::default()
        }
    }

    fn spawn(config: &Config, factory: &InMemoryFactory) -> WorkerPool {
        let workload = Arc::new(Workload::init(config).unwrap());
        WorkerPool::spawn(PoolOptions::from_config(config), workload, factory).unwrap()
    }

    #[test]
    fn claims_are_bounded_by_budget() {
        let shared = Shared {
            budget: Mutex::new(Budget {
                alive: true,
                remaining: 3,
            }),
            stats: Aggregator::new(),
            operation_count: 3,
        };

        assert_eq!(shared.claim(), Some(1));
        assert_eq!(shared.claim(), Some(2));
        assert_eq!(shared.claim(), Some(3));
        assert_eq!(shared.claim(), None);
        assert_eq!(shared.remaining(), 0);
    }

    #[test]
    fn closed_pool_claims_nothing() {
        let shared = Shared {
            budget: Mutex::new(Budget {
                alive: true,
                remaining: 10,
            }),
            stats: Aggregator::new(),
            operation_count: 10,
        };

        shared.close();
        shared.close();
        assert_eq!(shared.claim(), None);
        assert_eq!(shared.remaining(), 10);
    }

    #[test]
    fn runs_the_whole_budget() {
        let config = config(500, 100, 4);
        let factory = InMemoryFactory::new(None, Eviction::Lru);

        let report = spawn(&config, &factory).join();

        assert_eq!(report.operations(), 500);
        assert_eq!(report.workers.len(), 4);
        assert_eq!(report.stats.load_sets, 100);
        assert_eq!(report.stats.gets + report.stats.transaction_sets, 400);
        // Nothing evicts, so every GET hits.
        assert_eq!(report.stats.total_misses, 0);
        assert!(factory.store().len() >= 100);
    }

    #[test]
    fn workers_are_named_by_pool() {
        let config = config(10, 10, 2);
        let factory = InMemoryFactory::new(None, Eviction::Lru);

        let report = spawn(&config, &factory).join();
        let mut names: Vec<_> = report.workers.iter().map(|w| w.name.as_str()).collect();
        names.sort();
        assert_eq!(names, ["costbench-worker-0", "costbench-worker-1"]);
    }

    #[test]
    fn close_stops_claims() {
        let config = Config {
            operations: Operations::only(OperationKind::Get),
            ..config(u64::MAX, 10, 2)
        };
        let factory = InMemoryFactory::new(None, Eviction::Lru);

        let pool = spawn(&config, &factory);
        pool.handle().close();
        pool.close();
        assert!(!pool.claim_next());

        let report = pool.join();
        assert!(report.operations() < u64::MAX);
    }

    #[test]
    fn zero_threads_rejected() {
        let config = config(10, 10, 0);
        let workload = Arc::new(Workload::init(&config).unwrap());
        let factory = InMemoryFactory::new(None, Eviction::Lru);

        let result = WorkerPool::spawn(PoolOptions::from_config(&config), workload, &factory);
        assert!(matches!(result, Err(PoolError::NoWorkers)));
    }

    #[test]
    fn report_debug_shows_sketch_counts() {
        // Ten operations, all loads.
        let config = config(10, 10, 1);
        let factory = InMemoryFactory::new(None, Eviction::Lru);

        let report = spawn(&config, &factory).join();
        let debug = format!("{report:?}");

        assert!(debug.contains("name: \"costbench-worker-0\""), "{debug}");
        assert!(debug.contains("operations: 10"), "{debug}");
        assert!(debug.contains("latencies: {Set: 10}"), "{debug}");
    }

    #[test]
    fn latencies_cover_every_operation() {
        let config = config(50, 20, 2);
        let factory = InMemoryFactory::new(None, Eviction::Lru);

        let report = spawn(&config, &factory).join();
        let counted: usize = report.latencies().values().map(|s| s.count()).sum();
        assert_eq!(counted as u64, report.operations());
    }
}
