//! Prints the final benchmark report.

use std::fmt;
use std::time::Duration;

use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::pool::PoolReport;

/// Prints totals, miss-cost accounting and per-operation latencies.
pub fn print_report(report: &PoolReport) {
    let stats = &report.stats;

    println!();
    println!(
        "{} ({} workers, {:.2?})",
        "## TOTALS".bold(),
        report.workers.len().bold(),
        report.elapsed
    );
    print!("{} ({} ops", "OPERATIONS:".bold().green(), report.operations().bold());
    if report.failures() > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", report.failures()).bold().red()
        );
    }
    println!(")");
    print_ops(report.operations(), report.elapsed);
    println!();

    println!(
        "{} {} loaded, {} inserted, {} refilled",
        "SETS:".bold().green(),
        stats.load_sets.bold(),
        stats.transaction_sets.bold(),
        stats.refills.bold()
    );
    println!(
        "{} {} gets, {} misses, total miss cost {}",
        "MISSES:".bold().green(),
        stats.gets.bold(),
        stats.total_misses.bold(),
        stats.total_miss_cost.bold().blue()
    );
    if stats.total_misses > 0 {
        let avg = stats.total_miss_cost as f64 / stats.total_misses as f64;
        let ratio = stats.total_misses as f64 / stats.gets as f64;
        println!("  avg miss cost: {:.2}; miss ratio: {:.2}%", avg.bold(), ratio * 100.0);
    }

    for (kind, sketch) in report.latencies() {
        if sketch.count() == 0 {
            continue;
        }
        println!();
        println!(
            "{} ({} ops)",
            format!("{kind}:").bold().green(),
            sketch.count().bold()
        );
        print_ops(sketch.count() as u64, report.elapsed);
        println!();
        print_percentiles(&sketch, Duration::from_secs_f64);
    }
}

fn print_percentiles<T: fmt::Debug>(sketch: &DDSketch, map: impl Fn(f64) -> T) {
    let quantile = |q| sketch.quantile(q).ok().flatten().unwrap_or_default();
    let avg = map(sketch.sum().unwrap_or_default() / sketch.count() as f64);
    let p50 = map(quantile(0.5));
    let p90 = map(quantile(0.9));
    let p99 = map(quantile(0.99));
    println!(
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

fn print_ops(ops: u64, duration: Duration) {
    let ops_ps = ops as f64 / duration.as_secs_f64();
    print!("  {:.2} operations/s", ops_ps.bold());
}
