//! A synthetic load generator for key/value caches that tracks the cost of cache misses.
//!
//! A [`Workload`](workload::Workload) composes the generators from [`costbench_generators`]
//! into load and transaction operations with tiered recomputation costs. The
//! [`WorkerPool`](pool::WorkerPool) runs it on a number of threads, each with its own
//! [`Store`](store::Store) connection, and bills every GET miss with the last cost known for
//! its key.
//!
//! ```no_run
//! let config = costbench::config::Config::load(None)?;
//! let report = costbench::run(&config)?;
//! println!("{}", report.stats.summary_line());
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};

pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod pool;
pub mod report;
pub mod stats;
pub mod store;
pub mod workload;

use crate::config::Config;
use crate::pool::{PoolOptions, PoolReport, WorkerPool};
use crate::workload::Workload;

/// Runs a complete benchmark against the configured store and waits for it to finish.
pub fn run(config: &Config) -> Result<PoolReport> {
    let workload = Workload::init(config).context("failed to initialize workload")?;
    let factory = store::factory(&config.store);

    let pool = WorkerPool::spawn(
        PoolOptions::from_config(config),
        Arc::new(workload),
        factory.as_ref(),
    )
    .context("failed to start workers")?;

    Ok(pool.join())
}
