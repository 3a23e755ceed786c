//! Error types for workload initialization and pool construction.

use costbench_generators::GeneratorError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors raised while initializing a [`Workload`](crate::workload::Workload).
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// The request distribution name is not one of `uniform`, `zipfian`, `latest` or `churn`.
    #[error("unknown request distribution {0:?}")]
    UnknownDistribution(String),

    /// The scan length distribution name is not one of `uniform` or `zipfian`.
    #[error("distribution {0:?} not allowed for scan length")]
    UnknownScanDistribution(String),

    /// No operation kind has a positive proportion.
    #[error("no operation has a positive proportion")]
    NoOperations,

    /// No cost tier has a positive probability.
    #[error("no cost tier has a positive probability")]
    NoCostTiers,

    /// A generator rejected its parameters.
    #[error("invalid {context}: {cause}")]
    Generator {
        /// Which generator was being built.
        context: &'static str,
        /// The rejection.
        #[source]
        cause: GeneratorError,
    },
}

impl WorkloadError {
    pub(crate) fn generator(context: &'static str) -> impl FnOnce(GeneratorError) -> Self {
        move |cause| Self::Generator { context, cause }
    }
}

/// Errors raised while constructing a [`WorkerPool`](crate::pool::WorkerPool).
///
/// Any of these aborts the benchmark before a single operation runs.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was configured without workers.
    #[error("the worker pool needs at least one thread")]
    NoWorkers,

    /// A worker's store connection could not be created or initialized.
    #[error("failed to open {store} connection for worker {worker}")]
    Store {
        /// Index of the worker within the pool.
        worker: usize,
        /// The store name, if the connection got far enough to report it.
        store: &'static str,
        /// The store failure.
        #[source]
        cause: StoreError,
    },

    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker thread")]
    Spawn(#[from] std::io::Error),
}
