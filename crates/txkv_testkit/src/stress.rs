//! Stress runs for the transactional overlay.
//!
//! These runs hammer a small key space from many tasks at once so that
//! acquisition retries, gated reads and timeouts actually happen.

use crate::fixtures::{key, value};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use txkv_core::{TxDb, TxOptions};
use txkv_storage::{BatchOp, StorageEngine};

/// Result of a stress run.
#[derive(Debug, Clone, Serialize)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of transactions to run in total.
    pub operations: usize,
    /// Number of concurrent tasks.
    pub tasks: usize,
    /// Number of distinct keys the tasks contend on.
    pub key_space: usize,
    /// Keys touched per transaction.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            tasks: 8,
            key_space: 16,
            batch_size: 1,
        }
    }
}

impl StressConfig {
    fn ops_for(&self, operation: usize) -> Vec<BatchOp> {
        (0..self.batch_size.max(1))
            .map(|offset| {
                let k = (operation + offset * 7) % self.key_space.max(1);
                BatchOp::put(key(k), format!("stress {operation}"))
            })
            .collect()
    }
}

async fn run_tasks<E, F, Fut>(db: &TxDb<E>, config: &StressConfig, op: F) -> StressTestResult
where
    E: StorageEngine,
    F: Fn(TxDb<E>, usize) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = bool> + Send + 'static,
{
    let tasks = config.tasks.max(1);
    let per_task = config.operations / tasks;
    let start = Instant::now();

    let mut set = JoinSet::new();
    for t in 0..tasks {
        let db = db.clone();
        let op = op.clone();
        set.spawn(async move {
            let mut ok = 0usize;
            for i in 0..per_task {
                if op(db.clone(), t * per_task + i).await {
                    ok += 1;
                }
            }
            (ok, per_task - ok)
        });
    }

    let mut successful = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((ok, err)) => {
                successful += ok;
                failed += err;
            }
            Err(_) => failed += per_task,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Runs contended transactions that all commit.
pub async fn stress_contended_commits<E: StorageEngine>(
    db: &TxDb<E>,
    config: &StressConfig,
) -> StressTestResult {
    let config_for_ops = config.clone();
    run_tasks(db, config, move |db, operation| {
        let ops = config_for_ops.ops_for(operation);
        async move {
            match db.tx_batch(ops, TxOptions::new()).await {
                Ok(tx) => tx.commit().await.is_ok(),
                Err(_) => false,
            }
        }
    })
    .await
}

/// Runs contended transactions that all roll back.
///
/// On an engine seeded with `key i -> value i` for the whole key space, the
/// engine must hold exactly its seed once the run finishes.
pub async fn stress_rollbacks<E: StorageEngine>(
    db: &TxDb<E>,
    config: &StressConfig,
) -> StressTestResult {
    let config_for_ops = config.clone();
    run_tasks(db, config, move |db, operation| {
        let ops = config_for_ops.ops_for(operation);
        async move {
            match db.tx_batch(ops, TxOptions::new()).await {
                Ok(tx) => tx.rollback().await.is_ok(),
                Err(_) => false,
            }
        }
    })
    .await
}

/// Interleaves committing writers with gated readers.
///
/// Every even operation commits `value i` for its key; every odd operation
/// reads a key through the gate. A read succeeds if it returns a value a
/// writer committed, or the key is still absent.
pub async fn stress_gated_reads<E: StorageEngine>(
    db: &TxDb<E>,
    config: &StressConfig,
) -> StressTestResult {
    let key_space = config.key_space.max(1);
    run_tasks(db, config, move |db, operation| async move {
        let k = operation % key_space;
        if operation % 2 == 0 {
            match db.tx_put(key(k), value(k), TxOptions::new()).await {
                Ok(tx) => tx.commit().await.is_ok(),
                Err(_) => false,
            }
        } else {
            match db.tx_get(key(k)).await {
                Ok(found) => found == value(k),
                Err(err) => err.is_not_found(),
            }
        }
    })
    .await
}
