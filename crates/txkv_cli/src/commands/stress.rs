//! Stress command implementation.

use super::{CliError, Format};
use crate::StressMode;
use serde::Serialize;
use std::time::Duration;
use tracing::info;
use txkv_core::{Config, LockWait, TxDb};
use txkv_storage::InMemoryEngine;
use txkv_testkit::{
    seeded_engine, stress_contended_commits, stress_gated_reads, stress_rollbacks, StressConfig,
    StressTestResult,
};

/// Stress report: the run result plus overlay counters.
#[derive(Debug, Serialize)]
pub struct StressReport {
    /// Workload name.
    pub mode: String,
    /// Throughput and success counts.
    pub result: StressTestResult,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions rolled back.
    pub rolled_back: u64,
    /// Failed acquisition attempts.
    pub acquire_retries: u64,
    /// Point reads that had to wait.
    pub gated_reads: u64,
    /// Keys still locked after the run.
    pub leaked_locks: usize,
}

/// Runs the stress workload.
pub async fn run(
    mode: StressMode,
    config: &StressConfig,
    poll: bool,
    format: &str,
) -> Result<(), CliError> {
    let format = Format::parse(format)?;
    let lock_wait = if poll {
        LockWait::Poll(Duration::ZERO)
    } else {
        LockWait::Notify
    };
    let db = TxDb::with_config(
        seeded_engine(config.key_space),
        Config::new().lock_wait(lock_wait),
    );
    info!(?mode, ?lock_wait, operations = config.operations, tasks = config.tasks, "starting stress run");

    let result = match mode {
        StressMode::Commit => stress_contended_commits(&db, config).await,
        StressMode::Rollback => stress_rollbacks(&db, config).await,
        StressMode::Reads => stress_gated_reads(&db, config).await,
    };
    let report = report(mode, result, &db);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            report.result.print_summary(&report.mode);
            println!("Committed: {}", report.committed);
            println!("Rolled back: {}", report.rolled_back);
            println!("Acquire retries: {}", report.acquire_retries);
            println!("Gated reads: {}", report.gated_reads);
            println!("Leaked locks: {}", report.leaked_locks);
        }
    }
    Ok(())
}

fn report(mode: StressMode, result: StressTestResult, db: &TxDb<InMemoryEngine>) -> StressReport {
    let stats = db.stats();
    StressReport {
        mode: format!("{:?}", mode).to_lowercase(),
        result,
        committed: stats.transactions_committed(),
        rolled_back: stats.transactions_rolled_back(),
        acquire_retries: stats.acquire_retries(),
        gated_reads: stats.gated_reads(),
        leaked_locks: db.locked_keys().len(),
    }
}
