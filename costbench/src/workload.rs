//! The workload engine: decides which operation to run, on which key, at which cost.
//!
//! A [`Workload`] is built once from the [`Config`] snapshot and then shared by all workers.
//! Each call draws from the generators with the calling worker's RNG, issues one or two store
//! operations and reports what happened as an [`OperationResult`].
//!
//! Two phases exist. The insert phase ([`Workload::do_insert`]) writes fresh keys from the
//! insert sequence. The transaction phase ([`Workload::do_transaction`]) draws an operation
//! kind and, for everything except ADD and SET, a key that is known to be committed already.
//! A GET that misses is treated as a cache fill: a fresh cost is drawn and written back, and the
//! caller bills the miss.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use costbench_generators::{
    AcknowledgedCounter, ChurnGenerator, DiscreteGenerator, NumberGenerator,
    ScrambledZipfianGenerator, SkewedLatestGenerator, UniformGenerator, ZipfianGenerator,
    fnv_hash64,
};
use rand::Rng;
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};

use crate::config::{Config, InsertOrder};
use crate::error::WorkloadError;
use crate::store::{Store, StoreResult};

/// Keys are truncated to this many trailing characters.
pub const KEY_LENGTH: usize = 16;

/// Upper bound on draws while looking for a committed key.
const MAX_KEY_ATTEMPTS: usize = 100_000;

const APPENDED: &[u8] = b"appended_string";
const PREPENDED: &[u8] = b"prepended_string";

/// The kinds of operations a transaction can perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Add,
    Append,
    Cas,
    Decr,
    Delete,
    Get,
    Gets,
    Incr,
    Prepend,
    Replace,
    Set,
    Update,
}

impl OperationKind {
    /// All kinds, in registration order.
    pub const ALL: [Self; 12] = [
        Self::Add,
        Self::Append,
        Self::Cas,
        Self::Decr,
        Self::Delete,
        Self::Get,
        Self::Gets,
        Self::Incr,
        Self::Prepend,
        Self::Replace,
        Self::Set,
        Self::Update,
    ];

    /// The upper-case name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Append => "APPEND",
            Self::Cas => "CAS",
            Self::Decr => "DECR",
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Gets => "GETS",
            Self::Incr => "INCR",
            Self::Prepend => "PREPEND",
            Self::Replace => "REPLACE",
            Self::Set => "SET",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labelled cost bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CostTier {
    High,
    Mid,
    Low,
}

impl CostTier {
    /// All tiers.
    pub const ALL: [Self; 3] = [Self::High, Self::Mid, Self::Low];
}

/// The phase an operation ran in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Populating the store before transactions begin.
    Load,
    /// Mixed access after the load.
    Transaction,
}

/// What a single workload call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationResult {
    /// Whether every store call involved succeeded.
    pub success: bool,
    /// The operation kind.
    pub kind: OperationKind,
    /// The phase the operation ran in.
    pub phase: Phase,
    /// The key the operation touched, if one was chosen.
    pub key: Option<String>,
    /// The cost assigned by a SET or by the refill after a miss.
    pub cost: Option<u32>,
    /// Whether a GET missed and was refilled.
    pub miss: bool,
    /// The committed set count observed when the transaction was issued.
    pub observed_sets: Option<u64>,
}

impl OperationResult {
    fn set(phase: Phase, key: String, cost: u32, success: bool) -> Self {
        Self {
            success,
            kind: OperationKind::Set,
            phase,
            key: Some(key),
            cost: Some(cost),
            miss: false,
            observed_sets: None,
        }
    }

    fn get(key: Option<String>, cost: Option<u32>, miss: bool, success: bool) -> Self {
        Self {
            success,
            kind: OperationKind::Get,
            phase: Phase::Transaction,
            key,
            cost,
            miss,
            observed_sets: None,
        }
    }

    /// A result that carries nothing for cost accounting.
    pub fn neutral(kind: OperationKind, success: bool) -> Self {
        Self {
            success,
            kind,
            phase: Phase::Transaction,
            key: None,
            cost: None,
            miss: false,
            observed_sets: None,
        }
    }
}

/// Formats a key id into a store key: the prefix followed by the id, truncated to the trailing
/// [`KEY_LENGTH`] characters. Shorter keys are returned unchanged.
pub fn format_key(prefix: &str, id: u64) -> String {
    let key = format!("{prefix}{id}");
    match key.char_indices().rev().nth(KEY_LENGTH - 1) {
        Some((start, _)) => key[start..].to_owned(),
        None => key,
    }
}

/// Names of the distributions a transaction key can be drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyDistribution {
    Uniform,
    Zipfian,
    Latest,
    Churn,
}

impl FromStr for KeyDistribution {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "zipfian" => Ok(Self::Zipfian),
            "latest" => Ok(Self::Latest),
            "churn" => Ok(Self::Churn),
            other => Err(WorkloadError::UnknownDistribution(other.to_owned())),
        }
    }
}

#[derive(Debug)]
enum KeyChooser {
    Uniform(UniformGenerator),
    Zipfian(ScrambledZipfianGenerator),
    Latest(SkewedLatestGenerator),
    Churn(ChurnGenerator),
}

impl NumberGenerator for KeyChooser {
    fn next_number<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match self {
            Self::Uniform(g) => g.next_number(rng),
            Self::Zipfian(g) => g.next_number(rng),
            Self::Latest(g) => g.next_number(rng),
            Self::Churn(g) => g.next_number(rng),
        }
    }

    fn last_number(&self) -> Option<u64> {
        match self {
            Self::Uniform(g) => g.last_number(),
            Self::Zipfian(g) => g.last_number(),
            Self::Latest(g) => g.last_number(),
            Self::Churn(g) => g.last_number(),
        }
    }
}

#[derive(Debug)]
enum ScanLength {
    Uniform(UniformGenerator),
    Zipfian(ZipfianGenerator),
}

#[derive(Debug)]
struct TierSampler {
    costs: UniformGenerator,
    value_length: usize,
}

#[derive(Debug)]
struct Tiers {
    high: TierSampler,
    mid: TierSampler,
    low: TierSampler,
}

impl Tiers {
    fn get(&self, tier: CostTier) -> &TierSampler {
        match tier {
            CostTier::High => &self.high,
            CostTier::Mid => &self.mid,
            CostTier::Low => &self.low,
        }
    }
}

/// A synthetic CRUD workload against a key/value store.
#[derive(Debug)]
pub struct Workload {
    key_prefix: String,
    insert_order: InsertOrder,
    default_set: bool,
    value_length: usize,

    /// Ids of inserted keys; acknowledged once their write returned.
    key_sequence: Arc<AcknowledgedCounter>,
    operations: DiscreteGenerator<OperationKind>,
    tiers: DiscreteGenerator<CostTier>,
    tier_samplers: Tiers,
    keys: KeyChooser,
    fields: UniformGenerator,
    scan_length: ScanLength,
}

impl Workload {
    /// Builds all generators from the configuration.
    ///
    /// Fails on an unknown request or scan length distribution, when no operation or no cost
    /// tier has a positive proportion, and when a generator rejects its parameters.
    pub fn init(config: &Config) -> Result<Self, WorkloadError> {
        let record_count = config.record_count;
        let key_sequence = Arc::new(AcknowledgedCounter::new(config.insert_start));

        let mut operations = DiscreteGenerator::builder();
        for kind in OperationKind::ALL {
            let proportion = config.operations.proportion(kind);
            if proportion > 0.0 {
                operations = operations.add(proportion, kind);
            }
        }
        if operations.is_empty() {
            return Err(WorkloadError::NoOperations);
        }
        let operations = operations
            .build()
            .map_err(WorkloadError::generator("operation proportions"))?;

        let mut tiers = DiscreteGenerator::builder();
        for tier in CostTier::ALL {
            let probability = config.costs.tier(tier).probability;
            if probability > 0.0 {
                tiers = tiers.add(probability, tier);
            }
        }
        if tiers.is_empty() {
            return Err(WorkloadError::NoCostTiers);
        }
        let tiers = tiers
            .build()
            .map_err(WorkloadError::generator("cost tier probabilities"))?;

        let tier_sampler = |tier: CostTier| -> Result<TierSampler, WorkloadError> {
            let tier_config = config.costs.tier(tier);
            let costs =
                UniformGenerator::new(u64::from(tier_config.min), u64::from(tier_config.max))
                    .map_err(WorkloadError::generator("cost range"))?;
            Ok(TierSampler {
                costs,
                value_length: tier_config.value_length,
            })
        };
        let tier_samplers = Tiers {
            high: tier_sampler(CostTier::High)?,
            mid: tier_sampler(CostTier::Mid)?,
            low: tier_sampler(CostTier::Low)?,
        };

        let keys = match config.request_distribution.parse()? {
            KeyDistribution::Uniform => KeyChooser::Uniform(
                UniformGenerator::new(0, record_count.saturating_sub(1))
                    .map_err(WorkloadError::generator("uniform request distribution"))?,
            ),
            KeyDistribution::Zipfian => {
                // Size the key space for the inserts expected during the run, so popular keys
                // stay popular while the key space grows.
                let set_share = operations.probability(&OperationKind::Set);
                let expected_inserts = (config.operation_count as f64 * set_share * 2.0) as u64;
                let item_count = record_count.saturating_add(expected_inserts).max(1);
                KeyChooser::Zipfian(
                    ScrambledZipfianGenerator::with_constant(
                        0,
                        item_count - 1,
                        config.zipfian_constant,
                    )
                    .map_err(WorkloadError::generator("zipfian request distribution"))?,
                )
            }
            KeyDistribution::Latest => KeyChooser::Latest(
                SkewedLatestGenerator::new(Arc::clone(&key_sequence))
                    .map_err(WorkloadError::generator("latest request distribution"))?,
            ),
            KeyDistribution::Churn => KeyChooser::Churn(
                ChurnGenerator::new(config.working_set, config.churn_delta, record_count)
                    .map_err(WorkloadError::generator("churn request distribution"))?,
            ),
        };

        let fields = UniformGenerator::new(0, config.field_count.saturating_sub(1))
            .map_err(WorkloadError::generator("field count"))?;

        let scan_length = match config.scan_length_distribution.as_str() {
            "uniform" => ScanLength::Uniform(
                UniformGenerator::new(1, config.max_scan_length)
                    .map_err(WorkloadError::generator("scan length"))?,
            ),
            "zipfian" => ScanLength::Zipfian(
                ZipfianGenerator::new(1, config.max_scan_length)
                    .map_err(WorkloadError::generator("scan length"))?,
            ),
            other => return Err(WorkloadError::UnknownScanDistribution(other.to_owned())),
        };

        tracing::debug!(
            operations = ?operations.values().collect::<Vec<_>>(),
            distribution = %config.request_distribution,
            "workload initialized"
        );

        Ok(Self {
            key_prefix: config.key_prefix.clone(),
            insert_order: config.insert_order,
            default_set: config.default_set,
            value_length: config.value_length,
            key_sequence,
            operations,
            tiers,
            tier_samplers,
            keys,
            fields,
            scan_length,
        })
    }

    /// The highest insert id whose write, and every write before it, has returned.
    pub fn committed_limit(&self) -> Option<u64> {
        self.key_sequence.last()
    }

    /// Draws the index of the field an UPDATE rewrites.
    pub fn next_field<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        self.fields.next_number(rng)
    }

    /// Draws a scan length for stores that support range scans.
    pub fn next_scan_length<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match &self.scan_length {
            ScanLength::Uniform(g) => g.next_number(rng),
            ScanLength::Zipfian(g) => g.next_number(rng),
        }
    }

    /// Turns a key id into the store key, hashing it first for `hashed` insert order.
    pub fn key_for(&self, id: u64) -> String {
        let id = match self.insert_order {
            InsertOrder::Ordered => id,
            InsertOrder::Hashed => fnv_hash64(id),
        };
        format_key(&self.key_prefix, id)
    }

    /// Writes the next key of the insert sequence with a freshly drawn cost.
    pub fn do_insert<R: Rng + ?Sized>(
        &self,
        store: &mut dyn Store,
        rng: &mut R,
        phase: Phase,
    ) -> OperationResult {
        let id = self.key_sequence.next();
        let key = self.key_for(id);
        let (cost, value) = self.draw_cost(rng);

        let written = self.write(store, &key, &value, cost);
        self.key_sequence.acknowledge(id);
        log_failure(OperationKind::Set, &key, &written);

        OperationResult::set(phase, key, cost, written.is_ok())
    }

    /// Draws an operation kind and performs it.
    ///
    /// `committed_sets` is the caller's count of committed writes; it is recorded on the
    /// result. Only GET and SET produce results that feed cost accounting.
    pub fn do_transaction<R: Rng + ?Sized>(
        &self,
        store: &mut dyn Store,
        rng: &mut R,
        committed_sets: u64,
    ) -> OperationResult {
        let kind = *self.operations.next_value(rng);

        let mut result = match kind {
            OperationKind::Get => self.transaction_get(store, rng),
            OperationKind::Set => self.do_insert(store, rng, Phase::Transaction),
            OperationKind::Add => self.transaction_add(store, rng),
            OperationKind::Append => {
                self.on_existing_key(store, rng, kind, |store, key, _| {
                    store.append(key, APPENDED)
                })
            }
            OperationKind::Prepend => {
                self.on_existing_key(store, rng, kind, |store, key, _| {
                    store.prepend(key, PREPENDED)
                })
            }
            OperationKind::Cas => self.on_existing_key(store, rng, kind, |store, key, rng| {
                let Some((_, token)) = store.gets(key)? else {
                    return Ok(false);
                };
                store.cas(key, token, &payload(rng, self.value_length))
            }),
            OperationKind::Gets => self.on_existing_key(store, rng, kind, |store, key, _| {
                Ok(store.gets(key)?.is_some())
            }),
            OperationKind::Incr => self.on_existing_key(store, rng, kind, |store, key, _| {
                Ok(store.incr(key, 1)?.is_some())
            }),
            OperationKind::Decr => self.on_existing_key(store, rng, kind, |store, key, _| {
                Ok(store.decr(key, 1)?.is_some())
            }),
            OperationKind::Delete => {
                self.on_existing_key(store, rng, kind, |store, key, _| store.delete(key))
            }
            OperationKind::Replace => self.on_existing_key(store, rng, kind, |store, key, rng| {
                store.replace(key, &payload(rng, self.value_length))
            }),
            OperationKind::Update => self.on_existing_key(store, rng, kind, |store, key, rng| {
                let field = self.next_field(rng);
                let mut value = format!("field{field}=").into_bytes();
                value.extend(payload(rng, self.value_length));
                store.update(key, &value)
            }),
        };

        result.observed_sets = Some(committed_sets);
        result
    }

    fn transaction_get<R: Rng + ?Sized>(
        &self,
        store: &mut dyn Store,
        rng: &mut R,
    ) -> OperationResult {
        let Some(key) = self.existing_key(rng) else {
            return OperationResult::get(None, None, false, false);
        };

        match store.get(&key) {
            Ok(Some(_)) => OperationResult::get(Some(key), None, false, true),
            Ok(None) => {
                // A miss is a recomputation: assign a fresh cost and fill the cache.
                let (cost, value) = self.draw_cost(rng);
                let written = self.write(store, &key, &value, cost);
                log_failure(OperationKind::Set, &key, &written);
                OperationResult::get(Some(key), Some(cost), true, written.is_ok())
            }
            Err(error) => {
                tracing::warn!(
                    error = &error as &dyn std::error::Error,
                    key,
                    "GET failed"
                );
                OperationResult::get(Some(key), None, false, false)
            }
        }
    }

    fn transaction_add<R: Rng + ?Sized>(
        &self,
        store: &mut dyn Store,
        rng: &mut R,
    ) -> OperationResult {
        let id = self.key_sequence.next();
        let key = self.key_for(id);

        let added = store.add(&key, &payload(rng, self.value_length));
        self.key_sequence.acknowledge(id);
        log_failure(OperationKind::Add, &key, &added);

        OperationResult::neutral(OperationKind::Add, matches!(added, Ok(true)))
    }

    /// Runs `op` on a committed key. Failures are logged and folded into the result.
    fn on_existing_key<R, F>(
        &self,
        store: &mut dyn Store,
        rng: &mut R,
        kind: OperationKind,
        op: F,
    ) -> OperationResult
    where
        R: Rng + ?Sized,
        F: FnOnce(&mut dyn Store, &str, &mut R) -> StoreResult<bool>,
    {
        let Some(key) = self.existing_key(rng) else {
            return OperationResult::neutral(kind, false);
        };

        let outcome = op(store, &key, rng);
        log_failure(kind, &key, &outcome);
        OperationResult::neutral(kind, matches!(outcome, Ok(true)))
    }

    /// Draws a key whose insert has been acknowledged.
    ///
    /// Ids above the committed limit are rejected and redrawn. The limit is re-read on every
    /// attempt, so inserts finishing on other workers widen the accepted range immediately.
    fn existing_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        self.existing_key_id(rng).map(|id| self.key_for(id))
    }

    fn existing_key_id<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u64> {
        for _ in 0..MAX_KEY_ATTEMPTS {
            let limit = self.committed_limit()?;
            let id = self.keys.next_number(rng);
            if id <= limit {
                return Some(id);
            }
        }

        tracing::warn!(
            limit = ?self.committed_limit(),
            issued = ?self.key_sequence.last_issued(),
            "no committed key found after {MAX_KEY_ATTEMPTS} draws"
        );
        None
    }

    fn draw_cost<R: Rng + ?Sized>(&self, rng: &mut R) -> (u32, Vec<u8>) {
        let sampler = self.tier_samplers.get(*self.tiers.next_value(rng));
        // Tier bounds come from `u32` configuration values.
        let cost = sampler.costs.next_number(rng) as u32;
        (cost, payload(rng, sampler.value_length))
    }

    fn write(&self, store: &mut dyn Store, key: &str, value: &[u8], cost: u32) -> StoreResult<()> {
        if self.default_set {
            store.set(key, value)
        } else {
            store.set_cost(key, value, cost)
        }
    }
}

/// A random alphanumeric payload of `len` bytes.
fn payload<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<u8> {
    Alphanumeric.sample_string(rng, len).into_bytes()
}

fn log_failure<T>(kind: OperationKind, key: &str, outcome: &StoreResult<T>) {
    match outcome {
        Ok(_) => tracing::trace!(%kind, key, "operation done"),
        Err(error) => tracing::warn!(
            error = error as &dyn std::error::Error,
            %kind,
            key,
            "store operation failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::config::{Eviction, Operations};
    use crate::store::InMemoryStore;

    fn config() -> Config {
        Config {
            record_count: 100,
            operation_count: 200,
            insert_order: InsertOrder::Ordered,
            ..Config::default()
        }
    }

    fn store() -> InMemoryStore {
        let mut store = InMemoryStore::new(None, Eviction::Lru);
        store.init().unwrap();
        store
    }

    fn load(workload: &Workload, store: &mut InMemoryStore, rng: &mut SmallRng, count: u64) {
        for _ in 0..count {
            assert!(workload.do_insert(store, rng, Phase::Load).success);
        }
    }

    #[test]
    fn key_formatting() {
        assert_eq!(format_key("user", 1), "user1");
        assert_eq!(format_key("user", 123_456_789_012), "user123456789012");
        assert_eq!(format_key("user", 12_345_678_901_234_567), "2345678901234567");
        assert_eq!(format_key("", 0), "0");
    }

    #[test]
    fn hashed_keys_differ_from_ordered() {
        let ordered = Workload::init(&config()).unwrap();
        let hashed = Workload::init(&Config {
            insert_order: InsertOrder::Hashed,
            ..config()
        })
        .unwrap();

        assert_eq!(ordered.key_for(7), "user7");
        assert_ne!(hashed.key_for(7), "user7");
        assert_eq!(hashed.key_for(7), hashed.key_for(7));
        assert!(hashed.key_for(7).len() <= KEY_LENGTH);
    }

    #[test]
    fn insert_writes_cost_annotated_set() {
        let workload = Workload::init(&config()).unwrap();
        let mut store = store();
        let mut rng = SmallRng::seed_from_u64(0);

        let result = workload.do_insert(&mut store, &mut rng, Phase::Load);

        assert!(result.success);
        assert_eq!(result.kind, OperationKind::Set);
        assert_eq!(result.phase, Phase::Load);
        assert_eq!(result.key.as_deref(), Some("user0"));
        assert!(!result.miss);
        assert_eq!(store.cost_of("user0"), result.cost);
        assert_eq!(workload.committed_limit(), Some(0));
    }

    #[test]
    fn default_set_drops_the_cost() {
        let workload = Workload::init(&Config {
            default_set: true,
            ..config()
        })
        .unwrap();
        let mut store = store();
        let mut rng = SmallRng::seed_from_u64(0);

        let result = workload.do_insert(&mut store, &mut rng, Phase::Load);
        assert!(result.cost.is_some());
        assert_eq!(store.cost_of("user0"), Some(0));
    }

    #[test]
    fn cost_follows_tier_ranges() {
        let mut config = config();
        config.costs.high.probability = 0.0;
        config.costs.mid.probability = 0.0;
        config.costs.low.min = 5;
        config.costs.low.max = 9;
        config.costs.low.value_length = 12;

        let workload = Workload::init(&config).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        for _ in 0..100 {
            let (cost, value) = workload.draw_cost(&mut rng);
            assert!((5..=9).contains(&cost));
            assert_eq!(value.len(), 12);
        }
    }

    #[test]
    fn get_hit_carries_no_cost() {
        let workload = Workload::init(&Config {
            operations: Operations::only(OperationKind::Get),
            ..config()
        })
        .unwrap();
        let mut store = store();
        let mut rng = SmallRng::seed_from_u64(1);
        load(&workload, &mut store, &mut rng, 100);

        let result = workload.do_transaction(&mut store, &mut rng, 100);
        assert_eq!(result.kind, OperationKind::Get);
        assert!(result.success);
        assert!(!result.miss);
        assert_eq!(result.cost, None);
        assert_eq!(result.observed_sets, Some(100));
    }

    #[test]
    fn get_miss_refills_with_new_cost() {
        let workload = Workload::init(&Config {
            operations: Operations::only(OperationKind::Get),
            ..config()
        })
        .unwrap();
        let mut store = store();
        let mut rng = SmallRng::seed_from_u64(2);
        load(&workload, &mut store, &mut rng, 100);

        // Empty the cache behind the workload's back.
        for id in 0..100 {
            store.delete(&workload.key_for(id)).unwrap();
        }

        let result = workload.do_transaction(&mut store, &mut rng, 100);
        assert!(result.miss);
        assert!(result.success);
        let key = result.key.unwrap();
        assert_eq!(store.cost_of(&key), result.cost);
    }

    #[test]
    fn get_never_exceeds_committed_keys() {
        for distribution in ["uniform", "zipfian", "latest", "churn"] {
            let workload = Workload::init(&Config {
                request_distribution: distribution.into(),
                operations: Operations::only(OperationKind::Get),
                working_set: 10,
                churn_delta: 3,
                ..config()
            })
            .unwrap();
            let mut store = store();
            let mut rng = SmallRng::seed_from_u64(3);

            // Only part of the record count is loaded.
            load(&workload, &mut store, &mut rng, 40);

            for _ in 0..500 {
                let id = workload.existing_key_id(&mut rng);
                assert!(id.is_some_and(|id| id <= 39), "{distribution}: {id:?}");
            }
        }
    }

    #[test]
    fn nothing_committed_means_no_key() {
        let workload = Workload::init(&Config {
            operations: Operations::only(OperationKind::Get),
            ..config()
        })
        .unwrap();
        let mut store = store();
        let mut rng = SmallRng::seed_from_u64(0);

        let result = workload.do_transaction(&mut store, &mut rng, 0);
        assert!(!result.success);
        assert_eq!(result.key, None);
    }

    #[test]
    fn set_transaction_inserts_new_key() {
        let workload = Workload::init(&Config {
            operations: Operations::only(OperationKind::Set),
            ..config()
        })
        .unwrap();
        let mut store = store();
        let mut rng = SmallRng::seed_from_u64(0);
        load(&workload, &mut store, &mut rng, 100);

        let result = workload.do_transaction(&mut store, &mut rng, 100);
        assert_eq!(result.kind, OperationKind::Set);
        assert_eq!(result.phase, Phase::Transaction);
        assert_eq!(result.key.as_deref(), Some("user100"));
        assert_eq!(workload.committed_limit(), Some(100));
    }

    #[test]
    fn maintenance_operations_are_neutral() {
        let mut store = store();
        let mut rng = SmallRng::seed_from_u64(4);

        for kind in OperationKind::ALL {
            if matches!(kind, OperationKind::Get | OperationKind::Set) {
                continue;
            }
            let workload = Workload::init(&Config {
                operations: Operations::only(kind),
                ..config()
            })
            .unwrap();
            load(&workload, &mut store, &mut rng, 100);

            let result = workload.do_transaction(&mut store, &mut rng, 100);
            assert_eq!(result.kind, kind);
            assert_eq!(result.key, None);
            assert_eq!(result.cost, None);
            assert!(!result.miss);

            // Payloads are not numeric, so only the arithmetic kinds fail.
            let expect_success = !matches!(kind, OperationKind::Incr | OperationKind::Decr);
            assert_eq!(result.success, expect_success, "{kind}");
        }
    }

    #[test]
    fn add_extends_the_key_space() {
        let workload = Workload::init(&Config {
            operations: Operations::only(OperationKind::Add),
            ..config()
        })
        .unwrap();
        let mut store = store();
        let mut rng = SmallRng::seed_from_u64(0);
        load(&workload, &mut store, &mut rng, 10);

        assert!(workload.do_transaction(&mut store, &mut rng, 10).success);
        assert!(store.contains("user10"));
        assert_eq!(workload.committed_limit(), Some(10));
    }

    #[test]
    fn field_and_scan_generators() {
        let workload = Workload::init(&Config {
            field_count: 3,
            max_scan_length: 5,
            scan_length_distribution: "zipfian".into(),
            ..config()
        })
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(0);

        for _ in 0..100 {
            assert!(workload.next_field(&mut rng) < 3);
            assert!((1..=5).contains(&workload.next_scan_length(&mut rng)));
        }
    }

    #[test]
    fn zipfian_key_space_saturates() {
        let workload = Workload::init(&Config {
            request_distribution: "zipfian".into(),
            record_count: u64::MAX - 1,
            operation_count: u64::MAX,
            ..config()
        })
        .unwrap();

        let KeyChooser::Zipfian(generator) = &workload.keys else {
            panic!("expected a zipfian key chooser");
        };
        assert_eq!(generator.item_count(), u64::MAX);
    }

    #[test]
    fn init_fails_fast() {
        let unknown = Workload::init(&Config {
            request_distribution: "hotspot".into(),
            ..config()
        });
        assert!(matches!(unknown, Err(WorkloadError::UnknownDistribution(name)) if name == "hotspot"));

        let scan = Workload::init(&Config {
            scan_length_distribution: "latest".into(),
            ..config()
        });
        assert!(matches!(scan, Err(WorkloadError::UnknownScanDistribution(_))));

        let mut no_operations = config();
        no_operations.operations.get = 0.0;
        no_operations.operations.set = 0.0;
        assert!(matches!(
            Workload::init(&no_operations),
            Err(WorkloadError::NoOperations)
        ));

        let mut no_tiers = config();
        for tier in [&mut no_tiers.costs.high, &mut no_tiers.costs.mid, &mut no_tiers.costs.low] {
            tier.probability = 0.0;
        }
        assert!(matches!(Workload::init(&no_tiers), Err(WorkloadError::NoCostTiers)));

        let mut inverted = config();
        inverted.costs.low.min = 10;
        inverted.costs.low.max = 1;
        assert!(matches!(
            Workload::init(&inverted),
            Err(WorkloadError::Generator { .. })
        ));
    }
}
