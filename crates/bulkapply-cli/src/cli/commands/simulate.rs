//! `bulkapply simulate` – drive one bulk-apply call against a faulty in-memory store.

use anyhow::Result;
use bulkapply_core::config::BulkApplyConfig;
use bulkapply_core::transport::{FaultPlan, InMemoryTransport};
use bulkapply_core::{BulkBatch, FailureReport, Operation, RowMutation, Table};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulateOptions {
    pub rows: usize,
    pub fail_rate: f64,
    pub permanent_rate: f64,
    pub truncate_rate: f64,
    pub abort_rate: f64,
    pub seed: Option<u64>,
    pub server_time_every: Option<usize>,
    pub table: Option<String>,
}

impl SimulateOptions {
    fn fault_plan(&self) -> FaultPlan {
        FaultPlan {
            row_failure_rate: self.fail_rate,
            permanent_failure_rate: self.permanent_rate,
            truncate_rate: self.truncate_rate,
            abort_rate: self.abort_rate,
            seed: self.seed,
        }
    }
}

/// Rows `row-000000..`, each setting one cell; every `server_time_every`-th row
/// lets the store pick the timestamp, which makes it unsafe to resend.
pub(crate) fn synthetic_batch(rows: usize, server_time_every: Option<usize>) -> BulkBatch {
    (0..rows)
        .map(|i| {
            let key = format!("row-{i:06}");
            let value = format!("value-{i}");
            let op = match server_time_every {
                Some(k) if k > 0 && i % k == k - 1 => {
                    Operation::set_cell_server_time("stats", "count", value)
                }
                _ => Operation::set_cell("stats", "count", i as i64, value),
            };
            RowMutation::new(key, vec![op])
        })
        .collect()
}

pub async fn run_simulate(cfg: &BulkApplyConfig, opts: SimulateOptions) -> Result<()> {
    let policies = cfg.policies()?;
    let table_name = opts.table.clone().unwrap_or_else(|| cfg.table.clone());
    let transport = Arc::new(InMemoryTransport::with_faults(opts.fault_plan()));
    let table = Table::with_policies(Arc::clone(&transport), table_name.clone(), policies);

    let batch = synthetic_batch(opts.rows, opts.server_time_every);
    let started = Instant::now();
    let mut call = table.call(batch);
    let result = call.run(&cfg.call_context()).await;
    let stats = call.stats();

    println!("table:          {}", table_name);
    println!("rows:           {}", opts.rows);
    println!("attempts:       {}", stats.attempts);
    println!("retries:        {}", stats.retry_notifications);
    println!("rows stored:    {}", transport.row_count(&table_name));
    println!("elapsed:        {:.3}s", started.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            println!("all {} rows applied", opts.rows);
            Ok(())
        }
        Err(report) => {
            print_failures(&report);
            Err(report.into())
        }
    }
}

fn print_failures(report: &FailureReport) {
    println!();
    println!("{:<8} {:<14} {:<20} {}", "INDEX", "ROW", "CODE", "MESSAGE");
    for f in report.failures() {
        println!(
            "{:<8} {:<14} {:<20} {}",
            f.original_index(),
            String::from_utf8_lossy(f.mutation().row_key()),
            f.status().code().as_str(),
            f.status().message()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_batch_marks_every_kth_row() {
        let batch = synthetic_batch(6, Some(3));
        let server_time: Vec<usize> = batch
            .iter()
            .filter(|(_, row)| row.operations().iter().any(|op| op.uses_server_time()))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(server_time, vec![2, 5]);
        assert_eq!(batch.get(0).unwrap().row_key(), b"row-000000");
    }

    #[test]
    fn synthetic_batch_without_server_time() {
        let batch = synthetic_batch(4, None);
        assert_eq!(batch.len(), 4);
        assert!(batch
            .iter()
            .all(|(_, row)| !row.operations().iter().any(|op| op.uses_server_time())));
        assert_eq!(synthetic_batch(3, Some(0)).len(), 3);
    }

    #[tokio::test]
    async fn simulate_without_faults_succeeds() {
        let cfg = BulkApplyConfig::default();
        let opts = SimulateOptions {
            rows: 10,
            fail_rate: 0.0,
            permanent_rate: 0.0,
            truncate_rate: 0.0,
            abort_rate: 0.0,
            seed: Some(1),
            server_time_every: None,
            table: Some("sim".to_string()),
        };
        run_simulate(&cfg, opts).await.unwrap();
    }

    #[tokio::test]
    async fn simulate_reports_permanent_failures() {
        let cfg = BulkApplyConfig::default();
        let opts = SimulateOptions {
            rows: 3,
            fail_rate: 0.0,
            permanent_rate: 1.0,
            truncate_rate: 0.0,
            abort_rate: 0.0,
            seed: Some(1),
            server_time_every: None,
            table: None,
        };
        let err = run_simulate(&cfg, opts).await.unwrap_err();
        assert!(format!("{:#}", err).contains("3 of 3 rows failed"));
    }
}
