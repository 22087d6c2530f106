//! Scenario command implementation.

use super::{CliError, Format};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::info;
use txkv_core::{CoreError, TxDb, TxOptions};
use txkv_storage::{InMemoryEngine, Value};
use txkv_testkit::{empty_db, key, seed_ops, seeded_db, value};

type ScenarioFuture = Pin<Box<dyn Future<Output = Result<(), CliError>> + Send>>;

/// Outcome of one scenario.
#[derive(Debug, Serialize)]
pub struct ScenarioOutcome {
    /// Scenario name.
    pub name: &'static str,
    /// Whether the expected outcome was observed.
    pub passed: bool,
    /// Failure description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time taken.
    pub elapsed_ms: u128,
}

/// Runs the scenarios, optionally filtered by name.
pub async fn run(timeout_ms: u64, only: Option<&str>, format: &str) -> Result<(), CliError> {
    let format = Format::parse(format)?;
    let scenarios: Vec<(&'static str, ScenarioFuture)> = vec![
        ("put-commit", Box::pin(put_commit())),
        ("put-rollback", Box::pin(put_rollback())),
        ("batch-rollback", Box::pin(batch_rollback())),
        ("del-rollback", Box::pin(del_rollback())),
        ("timeout", Box::pin(timeout(timeout_ms))),
        ("blocked-read", Box::pin(blocked_read())),
    ];

    let mut outcomes = Vec::new();
    for (name, scenario) in scenarios {
        if only.map_or(false, |filter| !name.contains(filter)) {
            continue;
        }
        let start = Instant::now();
        let result = scenario.await;
        info!(scenario = name, ok = result.is_ok(), "scenario finished");
        outcomes.push(ScenarioOutcome {
            name,
            passed: result.is_ok(),
            error: result.err().map(|err| err.to_string()),
            elapsed_ms: start.elapsed().as_millis(),
        });
    }

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        Format::Text => {
            for outcome in &outcomes {
                let mark = if outcome.passed { "✓" } else { "✗" };
                println!("{} {} ({} ms)", mark, outcome.name, outcome.elapsed_ms);
                if let Some(error) = &outcome.error {
                    println!("    {}", error);
                }
            }
        }
    }

    let failed = outcomes.iter().filter(|o| !o.passed).count();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::Summary {
            failed,
            total: outcomes.len(),
        })
    }
}

fn expect_value(
    name: &'static str,
    found: Result<Value, CoreError>,
    expected: &Value,
) -> Result<(), CliError> {
    match found {
        Ok(found) if &found == expected => Ok(()),
        Ok(found) => Err(CliError::ScenarioFailed {
            name,
            reason: format!("expected {:?}, read {:?}", expected, found),
        }),
        Err(err) => Err(CliError::ScenarioFailed {
            name,
            reason: format!("expected {:?}, got error: {}", expected, err),
        }),
    }
}

fn expect_absent(name: &'static str, found: Result<Value, CoreError>) -> Result<(), CliError> {
    match found {
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err.into()),
        Ok(found) => Err(CliError::ScenarioFailed {
            name,
            reason: format!("expected no value, read {:?}", found),
        }),
    }
}

async fn put_commit() -> Result<(), CliError> {
    let db = empty_db();
    db.tx_put("k1", "v1", TxOptions::new()).await?.commit().await?;
    expect_value("put-commit", db.get(b"k1"), &Value::from("v1"))
}

async fn put_rollback() -> Result<(), CliError> {
    let db = empty_db();
    db.tx_put("k1", "v1", TxOptions::new()).await?.rollback().await?;
    expect_absent("put-rollback", db.get(b"k1"))
}

async fn batch_rollback() -> Result<(), CliError> {
    let db = empty_db();
    db.tx_batch(seed_ops(10), TxOptions::new())
        .await?
        .rollback()
        .await?;
    for i in 0..10 {
        expect_absent("batch-rollback", db.get(&key(i)))?;
    }
    Ok(())
}

async fn del_rollback() -> Result<(), CliError> {
    let db = seeded_db(10);
    db.tx_del(key(8), TxOptions::new()).await?.rollback().await?;
    expect_value("del-rollback", db.get(&key(8)), &value(8))
}

async fn timeout(timeout_ms: u64) -> Result<(), CliError> {
    let db: TxDb<InMemoryEngine> = empty_db();
    let mut events = db.subscribe();
    let _tx = db
        .tx_put("k1", "v1", TxOptions::with_timeout_ms(timeout_ms))
        .await?;

    let wait = Duration::from_millis(timeout_ms.saturating_mul(10).max(1_000));
    match tokio::time::timeout(wait, events.recv()).await {
        Ok(Some(event)) if event.is_timeout() => expect_absent("timeout", db.get(b"k1")),
        Ok(other) => Err(CliError::ScenarioFailed {
            name: "timeout",
            reason: format!("expected a timeout rollback event, got {:?}", other),
        }),
        Err(_) => Err(CliError::ScenarioFailed {
            name: "timeout",
            reason: format!("no rollback within {:?}", wait),
        }),
    }
}

async fn blocked_read() -> Result<(), CliError> {
    let db = empty_db();
    let tx = db.tx_put("k1", "v1", TxOptions::new()).await?;

    let reader = {
        let db = db.clone();
        tokio::spawn(async move { db.tx_get("k1").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    if reader.is_finished() {
        return Err(CliError::ScenarioFailed {
            name: "blocked-read",
            reason: "read completed while the key was locked".to_string(),
        });
    }

    tx.commit().await?;
    let found = reader.await.map_err(|err| CliError::ScenarioFailed {
        name: "blocked-read",
        reason: err.to_string(),
    })?;
    expect_value("blocked-read", found, &Value::from("v1"))
}
