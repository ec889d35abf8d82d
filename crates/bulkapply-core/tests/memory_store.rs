//! End-to-end runs against the in-memory store with injected faults.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bulkapply_core::policy::{AlwaysRetry, ExponentialBackoff, LimitedErrorCount};
use bulkapply_core::transport::{FaultPlan, InMemoryTransport};
use bulkapply_core::{BulkBatch, Code, Operation, Policies, RowMutation, Table};
use common::server_time_row;

fn fast_policies(max_failures: u32) -> Policies {
    Policies::default()
        .with_retry(LimitedErrorCount::new(max_failures))
        .with_backoff(ExponentialBackoff::new(
            Duration::from_micros(1),
            Duration::from_micros(50),
        ))
}

fn numbered_batch(n: usize) -> BulkBatch {
    (0..n)
        .map(|i| {
            RowMutation::new(
                format!("row-{i:04}"),
                vec![Operation::set_cell("fam", "col", 7, format!("v{i}"))],
            )
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn flaky_store_converges_for_idempotent_rows() {
    let transport = Arc::new(InMemoryTransport::with_faults(FaultPlan {
        row_failure_rate: 0.3,
        truncate_rate: 0.1,
        abort_rate: 0.2,
        seed: Some(42),
        ..FaultPlan::none()
    }));
    let table = Table::with_policies(Arc::clone(&transport), "t", fast_policies(200));
    table.bulk_apply(numbered_batch(50)).await.unwrap();

    assert_eq!(transport.row_count("t"), 50);
    for i in 0..50 {
        let versions = transport.cell_versions("t", format!("row-{i:04}").as_bytes(), "fam", b"col");
        assert_eq!(versions, vec![(7, format!("v{i}").into_bytes())]);
    }
}

#[tokio::test(start_paused = true)]
async fn undetermined_server_time_write_is_not_repeated() {
    let transport = Arc::new(InMemoryTransport::with_faults(FaultPlan {
        truncate_rate: 1.0,
        seed: Some(3),
        ..FaultPlan::none()
    }));
    let table = Table::with_policies(Arc::clone(&transport), "t", fast_policies(5));
    let report = table.apply(server_time_row("counter")).await.unwrap_err();

    assert_eq!(report.attempts(), 1);
    assert_eq!(report.failures()[0].original_index(), 0);
    assert_eq!(transport.cell_versions("t", b"counter", "fam", b"col").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn always_retry_accepts_duplicate_server_time_writes() {
    let transport = Arc::new(InMemoryTransport::with_faults(FaultPlan {
        truncate_rate: 1.0,
        seed: Some(3),
        ..FaultPlan::none()
    }));
    let policies = fast_policies(2).with_idempotency(AlwaysRetry);
    let table = Table::with_policies(Arc::clone(&transport), "t", policies);
    let report = table.apply(server_time_row("counter")).await.unwrap_err();

    assert_eq!(report.attempts(), 3);
    assert_eq!(transport.cell_versions("t", b"counter", "fam", b"col").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_faults_fail_fast() {
    let transport = Arc::new(InMemoryTransport::with_faults(FaultPlan {
        permanent_failure_rate: 1.0,
        seed: Some(9),
        ..FaultPlan::none()
    }));
    let table = Table::with_policies(Arc::clone(&transport), "t", fast_policies(5));
    let report = table.bulk_apply(numbered_batch(3)).await.unwrap_err();

    assert_eq!(report.attempts(), 1);
    assert_eq!(report.failures().len(), 3);
    assert!(report
        .failures()
        .iter()
        .all(|f| f.status().code() == Code::OutOfRange));
    let resubmit = report.retry_batch();
    assert_eq!(resubmit.len(), 3);
    assert_eq!(resubmit.get(0).unwrap().row_key(), b"row-0000");
}

#[tokio::test(start_paused = true)]
async fn missing_table_is_not_retried() {
    let transport = Arc::new(InMemoryTransport::new().require_existing_tables());
    let table = Table::with_policies(Arc::clone(&transport), "missing", fast_policies(5));
    let report = table.bulk_apply(numbered_batch(2)).await.unwrap_err();

    assert_eq!(report.attempts(), 1);
    assert_eq!(report.stream_status().code(), Code::FailedPrecondition);
    assert_eq!(report.failures().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_share_transport_but_not_budgets() {
    let transport = Arc::new(InMemoryTransport::with_faults(FaultPlan {
        row_failure_rate: 0.5,
        seed: Some(11),
        ..FaultPlan::none()
    }));
    let table = Table::with_policies(Arc::clone(&transport), "t", fast_policies(100));

    let left: BulkBatch = (0..20)
        .map(|i| RowMutation::new(format!("l{i}"), vec![Operation::set_cell("f", "c", 1, "x")]))
        .collect();
    let right: BulkBatch = (0..20)
        .map(|i| RowMutation::new(format!("r{i}"), vec![Operation::set_cell("f", "c", 1, "y")]))
        .collect();
    let other = table.clone();
    let (a, b) = tokio::join!(table.bulk_apply(left), other.bulk_apply(right));
    a.unwrap();
    b.unwrap();
    assert_eq!(transport.row_count("t"), 40);
}
