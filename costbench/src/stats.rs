//! Miss-cost accounting shared by all workers of a pool.
//!
//! Every [`OperationResult`] is fed into an [`Aggregator`] exactly once. Updates are plain
//! counter additions and table overwrites inside one short critical section; no store I/O
//! happens while the lock is held.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

use crate::workload::{OperationKind, OperationResult, Phase};

/// The highest cost shown in the histogram. Buckets cover `0..=HISTOGRAM_MAX_COST`.
pub const HISTOGRAM_MAX_COST: u32 = 450;

/// Aggregate miss-cost statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MissStats {
    /// Sum of the costs billed for misses.
    pub total_miss_cost: u64,
    /// Number of GETs that missed.
    pub total_misses: u64,
    /// Number of GETs, hits and misses.
    pub gets: u64,
    /// SETs issued while loading.
    pub load_sets: u64,
    /// SETs issued by transactions.
    pub transaction_sets: u64,
    /// Writes issued to refill a miss.
    pub refills: u64,
    /// Last known cost per key.
    pub costs: HashMap<String, u32>,
    /// Number of misses billed per cost.
    pub histogram: BTreeMap<u32, u64>,
}

impl MissStats {
    /// Folds one result into the statistics.
    ///
    /// Only GET and SET results are counted. A miss is billed with the last cost known for its
    /// key, or with the refill cost if the key has never been seen. The refill cost then becomes
    /// the key's new baseline.
    pub fn record(&mut self, result: &OperationResult) {
        match result.kind {
            OperationKind::Set => {
                match result.phase {
                    Phase::Load => self.load_sets += 1,
                    Phase::Transaction => self.transaction_sets += 1,
                }
                if let (Some(key), Some(cost)) = (&result.key, result.cost) {
                    self.costs.insert(key.clone(), cost);
                }
            }
            OperationKind::Get => {
                self.gets += 1;
                if !result.miss {
                    return;
                }
                let (Some(key), Some(cost)) = (&result.key, result.cost) else {
                    return;
                };

                let billed = self.costs.get(key).copied().unwrap_or(cost);
                self.total_miss_cost += u64::from(billed);
                self.total_misses += 1;
                *self.histogram.entry(billed).or_default() += 1;
                self.costs.insert(key.clone(), cost);
                self.refills += 1;
            }
            _ => (),
        }
    }

    /// All SETs issued by inserts, excluding refills.
    pub fn sets(&self) -> u64 {
        self.load_sets + self.transaction_sets
    }

    /// Writes that have reached the store, including refills.
    pub fn committed_sets(&self) -> u64 {
        self.sets() + self.refills
    }

    /// Miss counts for every cost from zero to [`HISTOGRAM_MAX_COST`], zero for empty buckets.
    pub fn histogram_buckets(&self) -> Vec<u64> {
        dense_buckets(&self.histogram)
    }

    /// The per-worker summary line.
    pub fn summary_line(&self) -> String {
        self.totals().summary_line()
    }

    /// The histogram as a bracketed, comma-separated list.
    pub fn histogram_line(&self) -> String {
        render_histogram(&self.histogram)
    }

    /// The scalar totals without the key table.
    pub fn totals(&self) -> Totals {
        Totals {
            total_miss_cost: self.total_miss_cost,
            total_misses: self.total_misses,
            gets: self.gets,
            sets: self.sets(),
            committed_sets: self.committed_sets(),
        }
    }
}

/// A snapshot of the scalar counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub total_miss_cost: u64,
    pub total_misses: u64,
    pub gets: u64,
    pub sets: u64,
    pub committed_sets: u64,
}

impl Totals {
    /// The per-worker summary line.
    pub fn summary_line(&self) -> String {
        format!(
            "Client Thread Done. Total Miss Cost = {} Total Miss = {} Num Get = {} Num Set = {}",
            self.total_miss_cost, self.total_misses, self.gets, self.sets
        )
    }
}

fn dense_buckets(histogram: &BTreeMap<u32, u64>) -> Vec<u64> {
    (0..=HISTOGRAM_MAX_COST)
        .map(|cost| histogram.get(&cost).copied().unwrap_or(0))
        .collect()
}

fn render_histogram(histogram: &BTreeMap<u32, u64>) -> String {
    let mut line = String::from("[");
    for (index, count) in dense_buckets(histogram).into_iter().enumerate() {
        if index > 0 {
            line.push(',');
        }
        let _ = write!(line, "{count}");
    }
    line.push(']');
    line
}

/// [`MissStats`] behind a lock, shared by the workers of a pool.
#[derive(Debug, Default)]
pub struct Aggregator {
    stats: Mutex<MissStats>,
}

impl Aggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one result.
    pub fn update(&self, result: &OperationResult) {
        self.lock().record(result);
    }

    /// The current committed write count.
    pub fn committed_sets(&self) -> u64 {
        self.lock().committed_sets()
    }

    /// The current scalar totals.
    pub fn totals(&self) -> Totals {
        self.lock().totals()
    }

    /// The summary line and, if requested, the histogram line.
    ///
    /// Both come from one consistent copy of the counters. Rendering happens after the lock is
    /// released, so the workers are only blocked while the shown, non-empty buckets are copied.
    pub fn summary(&self, histogram: bool) -> (String, Option<String>) {
        let (totals, buckets) = {
            let stats = self.lock();
            let shown = || -> BTreeMap<u32, u64> {
                let shown = stats.histogram.range(..=HISTOGRAM_MAX_COST);
                shown.map(|(cost, count)| (*cost, *count)).collect()
            };
            (stats.totals(), histogram.then(shown))
        };
        (
            totals.summary_line(),
            buckets.as_ref().map(render_histogram),
        )
    }

    /// Takes the statistics out, leaving an empty set behind.
    pub fn take(&self) -> MissStats {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MissStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
