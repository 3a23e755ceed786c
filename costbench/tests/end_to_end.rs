//! Blackbox tests running complete benchmarks against the in-memory and scripted stores.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use costbench::config::{Config, InsertOrder, Operations};
use costbench::error::PoolError;
use costbench::pool::{PoolOptions, PoolReport, WorkerPool};
use costbench::workload::{OperationKind, Workload};
use costbench_test::store::{Event, Script};

fn config(record_count: u64, operation_count: u64, threads: usize) -> Config {
    Config {
        threads,
        record_count,
        operation_count,
        insert_order: InsertOrder::Ordered,
        request_distribution: "uniform".into(),
        print_histogram: false,
        seed: Some(42),
        status_interval: Duration::ZERO,
        ..Config::default()
    }
}

fn run_scripted(config: &Config, script: &Script) -> Result<PoolReport> {
    let workload = Arc::new(Workload::init(config)?);
    let pool = WorkerPool::spawn(PoolOptions::from_config(config), workload, script)?;
    Ok(pool.join())
}

fn key_id(key: &str) -> u64 {
    key.strip_prefix("user").unwrap().parse().unwrap()
}

#[test]
fn pure_write_workload() -> Result<()> {
    costbench_test::tracing::init();

    let config = Config {
        operations: Operations::only(OperationKind::Set),
        ..config(100, 200, 1)
    };

    let report = costbench::run(&config)?;

    assert_eq!(report.stats.sets(), 200);
    assert_eq!(report.stats.load_sets, 100);
    assert_eq!(report.stats.gets, 0);
    assert_eq!(report.stats.total_misses, 0);
    assert_eq!(report.stats.total_miss_cost, 0);
    assert_eq!(report.operations(), 200);
    assert_eq!(report.failures(), 0);

    Ok(())
}

#[test]
fn pure_write_workload_from_yaml() {
    costbench_test::tracing::init();

    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "costbench.yml",
            r#"
            record_count: 100
            operation_count: 200
            status_interval: 0s
            print_histogram: false
            operations:
                set: 1.0
            "#,
        )?;

        let config = Config::load(Some(Path::new("costbench.yml"))).unwrap();
        let report = costbench::run(&config).unwrap();

        assert_eq!(report.stats.sets(), 200);
        assert_eq!(report.stats.transaction_sets, 100);
        assert_eq!(report.stats.gets, 0);
        assert_eq!(report.stats.total_misses, 0);

        Ok(())
    });
}

#[test]
fn misses_bill_the_last_recorded_cost() -> Result<()> {
    costbench_test::tracing::init();

    let config = Config {
        operations: Operations::only(OperationKind::Get),
        ..config(100, 400, 1)
    };
    let script = Script::with_misses([false, true, false, false, true]);

    let report = run_scripted(&config, &script)?;
    let events = script.events();

    let mut costs = HashMap::new();
    let mut expected_cost = 0;
    let mut misses = 0;
    let mut gets = 0;

    for (index, event) in events.iter().enumerate() {
        match event {
            Event::Set { key, cost } => {
                costs.insert(key.clone(), cost.unwrap());
            }
            Event::Get { key, hit } => {
                gets += 1;
                assert!(key_id(key) <= 99, "{key} was never inserted");
                if *hit {
                    continue;
                }

                // A miss is followed by the refill of the same key.
                let Event::Set { key: refilled, cost } = &events[index + 1] else {
                    panic!("miss on {key} was not refilled");
                };
                assert_eq!(refilled, key);
                misses += 1;
                expected_cost += u64::from(costs.get(key).copied().unwrap_or(cost.unwrap()));
            }
            Event::Other { op, .. } => panic!("unexpected {op}"),
        }
    }

    assert_eq!(gets, 300);
    assert_eq!(misses, 120);
    assert_eq!(report.stats.gets, 300);
    assert_eq!(report.stats.total_misses, misses);
    assert_eq!(report.stats.refills, misses);
    assert_eq!(report.stats.total_miss_cost, expected_cost);
    assert_eq!(report.stats.load_sets, 100);
    assert_eq!(report.stats.committed_sets(), 100 + misses);

    Ok(())
}

#[test]
fn default_set_writes_without_cost() -> Result<()> {
    let config = Config {
        default_set: true,
        operations: Operations::only(OperationKind::Set),
        ..config(10, 20, 1)
    };
    let script = Script::new();

    run_scripted(&config, &script)?;

    let events = script.events();
    assert_eq!(events.len(), 20);
    assert!(
        events
            .iter()
            .all(|e| matches!(e, Event::Set { cost: None, .. }))
    );

    Ok(())
}

#[test]
fn maintenance_operations_are_not_billed() -> Result<()> {
    let config = Config {
        operations: Operations::only(OperationKind::Append),
        ..config(50, 150, 2)
    };
    let script = Script::new();

    let report = run_scripted(&config, &script)?;

    assert_eq!(report.operations(), 150);
    assert_eq!(report.stats.load_sets, 50);
    assert_eq!(report.stats.gets, 0);
    assert_eq!(report.stats.transaction_sets, 0);
    let appends = script
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Other { op: "append", .. }))
        .count();
    assert_eq!(appends, 100);

    Ok(())
}

#[test]
fn concurrent_workers_account_every_result() -> Result<()> {
    costbench_test::tracing::init();

    let config = config(100, 2000, 4);
    let script = Script::with_misses([true, false]);

    let report = run_scripted(&config, &script)?;
    let events = script.events();

    let miss_events = events
        .iter()
        .filter(|e| matches!(e, Event::Get { hit: false, .. }))
        .count() as u64;

    assert_eq!(report.operations(), 2000);
    assert_eq!(report.workers.len(), 4);
    assert_eq!(report.stats.gets + report.stats.sets(), 2000);
    assert_eq!(report.stats.load_sets, 100);
    assert_eq!(report.stats.total_misses, miss_events);
    assert_eq!(
        report.stats.committed_sets(),
        report.stats.sets() + miss_events
    );
    assert_eq!(script.cleanups(), 4);

    Ok(())
}

#[test]
fn failing_store_aborts_before_any_operation() {
    let config = config(10, 100, 3);
    let script = Script::new().fail_init_on(1);
    let workload = Arc::new(Workload::init(&config).unwrap());

    let result = WorkerPool::spawn(PoolOptions::from_config(&config), workload, &script);

    assert!(matches!(
        result,
        Err(PoolError::Store {
            worker: 1,
            store: "scripted",
            ..
        })
    ));
    assert_eq!(script.connections(), 2);
    assert_eq!(script.cleanups(), 1);
    assert!(script.events().is_empty());
}

#[test]
fn unknown_distribution_fails_fast() {
    let config = Config {
        request_distribution: "exponential".into(),
        ..config(10, 10, 1)
    };

    let error = costbench::run(&config).unwrap_err();
    assert!(format!("{error:#}").contains("exponential"));
}

#[test]
fn close_lets_workers_finish() -> Result<()> {
    let config = Config {
        operations: Operations::only(OperationKind::Get),
        ..config(10, u64::MAX, 2)
    };
    let script = Script::new();
    let workload = Arc::new(Workload::init(&config)?);

    let pool = WorkerPool::spawn(PoolOptions::from_config(&config), workload, &script)?;
    std::thread::sleep(Duration::from_millis(20));
    pool.close();
    pool.close();
    let report = pool.join();

    // Every claimed operation ran to completion and was accounted.
    assert_eq!(
        report.operations(),
        report.stats.gets + report.stats.sets()
    );
    assert_eq!(script.cleanups(), 2);

    Ok(())
}
