//! Configuration for a benchmark run.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `CB__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults. The loaded
//! configuration is a read-only snapshot: the workload and the worker pool copy what they need
//! out of it before any worker starts.
//!
//! # Environment Variables
//!
//! Environment variables use `CB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `CB__THREADS=8` sets the number of workers
//! - `CB__OPERATIONS__GET=0.9` sets the proportion of GET transactions
//! - `CB__COSTS__HIGH__MAX=450` sets the upper bound of the high cost tier
//!
//! # YAML Configuration File
//!
//! ```yaml
//! threads: 8
//! record_count: 100000
//! operation_count: 1000000
//! request_distribution: zipfian
//!
//! operations:
//!   get: 0.9
//!   set: 0.1
//!
//! store:
//!   type: memory
//!   capacity: 50000
//!   eviction: lowest_cost
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::workload::{CostTier, OperationKind};

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "CB__";

/// Order in which insert key ids are turned into keys.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InsertOrder {
    /// Keys use the raw sequential id.
    Ordered,

    /// Keys use the FNV hash of the sequential id, spreading neighbouring inserts.
    #[default]
    Hashed,
}

/// Relative proportions of the transaction operation kinds.
///
/// Proportions are weights: they do not need to sum to one. Kinds with a proportion of zero are
/// never drawn. At least one kind must be positive.
///
/// Without an `operations` section the mix is GET 0.95 and SET 0.05. Once any kind is
/// configured, every kind that is not mentioned is zero.
///
/// Used in: [`Config::operations`]
///
/// # Environment Variables
///
/// - `CB__OPERATIONS__GET`, `CB__OPERATIONS__SET`, ... (one per kind, lowercase)
#[derive(Debug, Deserialize, Serialize)]
#[serde(default = "Operations::none")]
pub struct Operations {
    pub add: f64,
    pub append: f64,
    pub cas: f64,
    pub decr: f64,
    pub delete: f64,
    pub get: f64,
    pub gets: f64,
    pub incr: f64,
    pub prepend: f64,
    pub replace: f64,
    pub set: f64,
    pub update: f64,
}

impl Operations {
    /// The configured proportion for `kind`.
    pub fn proportion(&self, kind: OperationKind) -> f64 {
        match kind {
            OperationKind::Add => self.add,
            OperationKind::Append => self.append,
            OperationKind::Cas => self.cas,
            OperationKind::Decr => self.decr,
            OperationKind::Delete => self.delete,
            OperationKind::Get => self.get,
            OperationKind::Gets => self.gets,
            OperationKind::Incr => self.incr,
            OperationKind::Prepend => self.prepend,
            OperationKind::Replace => self.replace,
            OperationKind::Set => self.set,
            OperationKind::Update => self.update,
        }
    }

    /// A mix containing only `kind`.
    pub fn only(kind: OperationKind) -> Self {
        let mut operations = Self::none();
        match kind {
            OperationKind::Add => operations.add = 1.0,
            OperationKind::Append => operations.append = 1.0,
            OperationKind::Cas => operations.cas = 1.0,
            OperationKind::Decr => operations.decr = 1.0,
            OperationKind::Delete => operations.delete = 1.0,
            OperationKind::Get => operations.get = 1.0,
            OperationKind::Gets => operations.gets = 1.0,
            OperationKind::Incr => operations.incr = 1.0,
            OperationKind::Prepend => operations.prepend = 1.0,
            OperationKind::Replace => operations.replace = 1.0,
            OperationKind::Set => operations.set = 1.0,
            OperationKind::Update => operations.update = 1.0,
        }
        operations
    }

    fn none() -> Self {
        Self {
            add: 0.0,
            append: 0.0,
            cas: 0.0,
            decr: 0.0,
            delete: 0.0,
            get: 0.0,
            gets: 0.0,
            incr: 0.0,
            prepend: 0.0,
            replace: 0.0,
            set: 0.0,
            update: 0.0,
        }
    }
}

impl Default for Operations {
    fn default() -> Self {
        Self {
            get: 0.95,
            set: 0.05,
            ..Self::none()
        }
    }
}

/// One cost tier: how likely it is, which synthetic costs it assigns, and how large its
/// payload is.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CostTierConfig {
    /// Relative probability of drawing this tier. Zero removes the tier from the draw.
    pub probability: f64,
    /// Inclusive lower bound of the assigned cost.
    pub min: u32,
    /// Inclusive upper bound of the assigned cost.
    pub max: u32,
    /// Length in bytes of the synthetic payload written for this tier.
    pub value_length: usize,
}

/// The three cost tiers.
///
/// Used in: [`Config::costs`]
///
/// # Environment Variables
///
/// - `CB__COSTS__HIGH__PROBABILITY`, `CB__COSTS__HIGH__MIN`, `CB__COSTS__HIGH__MAX`,
///   `CB__COSTS__HIGH__VALUE_LENGTH` (and likewise for `MID` and `LOW`)
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Costs {
    pub high: CostTierConfig,
    pub mid: CostTierConfig,
    pub low: CostTierConfig,
}

impl Costs {
    /// The configuration of `tier`.
    pub fn tier(&self, tier: CostTier) -> &CostTierConfig {
        match tier {
            CostTier::High => &self.high,
            CostTier::Mid => &self.mid,
            CostTier::Low => &self.low,
        }
    }
}

impl Default for Costs {
    fn default() -> Self {
        Self {
            high: CostTierConfig {
                probability: 0.1,
                min: 300,
                max: 450,
                value_length: 4096,
            },
            mid: CostTierConfig {
                probability: 0.3,
                min: 100,
                max: 299,
                value_length: 1024,
            },
            low: CostTierConfig {
                probability: 0.6,
                min: 1,
                max: 99,
                value_length: 128,
            },
        }
    }
}

/// Which entry a full in-memory store evicts first.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Eviction {
    /// The least recently used entry.
    #[default]
    Lru,

    /// The entry with the lowest recomputation cost, least recently used among equal costs.
    LowestCost,
}

/// Store configuration.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is
/// used. The store is resolved once at startup; every worker opens its own connection to it.
///
/// Used in: [`Config::store`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Store {
    /// A cache living inside the benchmark process (type `"memory"`).
    ///
    /// # Example
    ///
    /// ```yaml
    /// store:
    ///   type: memory
    ///   capacity: 10000
    ///   eviction: lru
    /// ```
    Memory {
        /// Maximum number of entries. `None` keeps everything.
        ///
        /// # Environment Variables
        ///
        /// - `CB__STORE__CAPACITY=10000`
        #[serde(default)]
        capacity: Option<usize>,

        /// Eviction policy once `capacity` is reached.
        ///
        /// # Environment Variables
        ///
        /// - `CB__STORE__EVICTION=lowest_cost`
        #[serde(default)]
        eviction: Eviction,
    },
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    #[default]
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::error::Error for FormatParseError {}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Auto => "auto",
            LogFormat::Pretty => "pretty",
            LogFormat::Simplified => "simplified",
            LogFormat::Json => "json",
        })
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they never interleave with the summaries on stdout.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable provides more granular control per module if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `CB__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `CB__LOGGING__FORMAT`
    #[serde(with = "display_fromstr")]
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Benchmark configuration.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Number of workers, each with its own store connection.
    ///
    /// # Default
    ///
    /// `1`
    pub threads: usize,

    /// Total number of operations, including the insert phase.
    ///
    /// # Default
    ///
    /// `1000`
    pub operation_count: u64,

    /// Number of records written by the insert phase before transactions begin.
    ///
    /// # Default
    ///
    /// `1000`
    pub record_count: u64,

    /// First key id handed out by the insert sequence.
    ///
    /// # Default
    ///
    /// `0`
    pub insert_start: u64,

    /// Prefix of every key. Keys are truncated to their trailing 16 characters.
    ///
    /// # Default
    ///
    /// `"user"`
    pub key_prefix: String,

    /// Whether insert ids are used in order or hashed.
    ///
    /// # Default
    ///
    /// `hashed`
    pub insert_order: InsertOrder,

    /// Key distribution for transactions: `uniform`, `zipfian`, `latest` or `churn`.
    ///
    /// Unknown names are rejected when the workload is initialized.
    ///
    /// # Default
    ///
    /// `"uniform"`
    pub request_distribution: String,

    /// Skew of the `zipfian` request distribution.
    ///
    /// # Default
    ///
    /// `0.99`
    pub zipfian_constant: f64,

    /// Size of the hot window of the `churn` request distribution.
    ///
    /// # Default
    ///
    /// `100`
    pub working_set: u64,

    /// Keys the `churn` window advances by after each window's worth of requests.
    ///
    /// # Default
    ///
    /// `1`
    pub churn_delta: u64,

    /// Distribution of scan lengths: `uniform` or `zipfian`.
    ///
    /// # Default
    ///
    /// `"uniform"`
    pub scan_length_distribution: String,

    /// Maximum scan length.
    ///
    /// # Default
    ///
    /// `1000`
    pub max_scan_length: u64,

    /// Number of fields per record.
    ///
    /// # Default
    ///
    /// `10`
    pub field_count: u64,

    /// Payload length of maintenance writes (ADD, CAS, REPLACE, UPDATE).
    ///
    /// # Default
    ///
    /// `100`
    pub value_length: usize,

    /// Issue plain SETs instead of cost-annotated SETs.
    ///
    /// # Default
    ///
    /// `false`
    pub default_set: bool,

    /// Print the per-cost miss histogram with each worker summary.
    ///
    /// # Default
    ///
    /// `true`
    pub print_histogram: bool,

    /// Seed for the per-worker random number generators. Random if unset.
    pub seed: Option<u64>,

    /// Interval between progress log lines. Zero disables them.
    ///
    /// # Default
    ///
    /// `10s`
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,

    /// Proportions of the transaction operation kinds.
    ///
    /// Left out of the serialized defaults, so a configured section replaces the default mix
    /// as a whole instead of being merged into it.
    #[serde(skip_serializing)]
    pub operations: Operations,

    /// Cost tiers.
    pub costs: Costs,

    /// The store the workers run against.
    pub store: Store,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 1,
            operation_count: 1000,
            record_count: 1000,
            insert_start: 0,
            key_prefix: "user".into(),
            insert_order: InsertOrder::default(),
            request_distribution: "uniform".into(),
            zipfian_constant: costbench_generators::ZIPFIAN_CONSTANT,
            working_set: 100,
            churn_delta: 1,
            scan_length_distribution: "uniform".into(),
            max_scan_length: 1000,
            field_count: 10,
            value_length: 100,
            default_set: false,
            print_histogram: true,
            seed: None,
            status_interval: Duration::from_secs(10),
            operations: Operations::default(),
            costs: Costs::default(),
            store: Store::Memory {
                capacity: None,
                eviction: Eviction::default(),
            },
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `CB__`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}
