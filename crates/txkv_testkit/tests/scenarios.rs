//! End-to-end scenarios for the transactional overlay.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use txkv_core::{CoreError, RollbackCause, TxDb, TxEventKind, TxOptions, TxState};
use txkv_storage::{BatchOp, InMemoryEngine, RangeOptions, StorageEngine, Value};
use txkv_testkit::prelude::*;
use txkv_testkit::scenarios::{holds_seed, open_transactions};

#[tokio::test]
async fn transactional_put_commit() {
    let db = empty_db();
    let tx = db.tx_put("key 1", "value 1", TxOptions::new()).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(db.get(b"key 1").unwrap(), "value 1");
}

#[tokio::test]
async fn transactional_put_rollback() {
    let db = empty_db();
    let tx = db.tx_put("key 1", "value 1", TxOptions::new()).await.unwrap();
    tx.rollback().await.unwrap();
    assert!(db.get(b"key 1").unwrap_err().is_not_found());
}

#[tokio::test]
async fn transactional_batch_commit() {
    let db = empty_db();
    let tx = db.tx_batch(seed_ops(10), TxOptions::new()).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(db.get(b"key 7").unwrap(), "value 7");
}

#[tokio::test]
async fn transactional_batch_rollback_of_new_keys() {
    let db = empty_db();
    let tx = db.tx_batch(seed_ops(10), TxOptions::new()).await.unwrap();
    tx.rollback().await.unwrap();
    for i in 0..10 {
        assert!(db.get(&key(i)).unwrap_err().is_not_found());
    }
}

#[tokio::test]
async fn transactional_batch_rollback_over_seed() {
    let db = seeded_db(10);
    let ops = (0..10)
        .map(|i| BatchOp::put(key(i), format!("overwritten {i}")))
        .collect();
    let tx = db.tx_batch(ops, TxOptions::new()).await.unwrap();
    assert_eq!(db.get(b"key 0").unwrap(), "overwritten 0");

    tx.rollback().await.unwrap();
    assert!(holds_seed(db.engine().as_ref(), 10));
}

#[tokio::test]
async fn transactional_del_commit() {
    let db = seeded_db(10);
    let tx = db.tx_del("key 8", TxOptions::new()).await.unwrap();
    tx.commit().await.unwrap();
    assert!(db.get(b"key 8").unwrap_err().is_not_found());
}

#[tokio::test]
async fn transactional_del_rollback() {
    let db = seeded_db(10);
    let tx = db.tx_del("key 8", TxOptions::new()).await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(db.get(b"key 8").unwrap(), "value 8");
}

#[tokio::test(start_paused = true)]
async fn transaction_times_out() {
    let db = empty_db();
    let mut events = db.subscribe();
    let started = tokio::time::Instant::now();
    let tx = db
        .tx_put("key 1", "value 1", TxOptions::with_timeout_ms(200))
        .await
        .unwrap();

    let event = events.recv().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(
        event.kind,
        TxEventKind::RolledBack {
            cause: RollbackCause::Timeout,
            failed: false,
        }
    );
    assert_eq!(tx.state(), TxState::RolledBack);
    assert!(db.get(b"key 1").unwrap_err().is_not_found());
}

#[tokio::test(start_paused = true)]
async fn default_timeout_comes_from_config() {
    let db = TxDb::with_config(
        InMemoryEngine::new(),
        Config::new().default_timeout(Duration::from_millis(30)),
    );
    let tx = db.tx_put("key 1", "value 1", TxOptions::new()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(31)).await;
    assert!(!tx.is_open());
    assert!(!db.is_locked(b"key 1"));
}

#[tokio::test]
async fn blocks_key_reads_until_commit() {
    let db = empty_db();
    let tx = db.tx_put("key 1", "value 1", TxOptions::new()).await.unwrap();

    let reader = {
        let db = db.clone();
        tokio::spawn(async move { db.tx_get("key 1").await })
    };
    tokio::task::yield_now().await;
    assert!(!reader.is_finished());

    tx.commit().await.unwrap();
    assert_eq!(reader.await.unwrap().unwrap(), "value 1");
}

#[tokio::test]
async fn blocks_key_reads_until_rollback() {
    let db = empty_db();
    let tx = db.tx_put("key 1", "value 1", TxOptions::new()).await.unwrap();

    let reader = {
        let db = db.clone();
        tokio::spawn(async move { db.tx_get("key 1").await })
    };
    tokio::task::yield_now().await;

    tx.rollback().await.unwrap();
    let err = reader.await.unwrap().unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn blocks_key_reads_until_timeout() {
    let db = seeded_db(3);
    let started = tokio::time::Instant::now();
    let tx = db
        .tx_put("key 1", "in flight", TxOptions::with_timeout_ms(200))
        .await
        .unwrap();

    let reader = {
        let db = db.clone();
        tokio::spawn(async move { db.tx_get("key 1").await })
    };
    tokio::task::yield_now().await;
    assert!(!reader.is_finished());

    assert_eq!(reader.await.unwrap().unwrap(), value(1));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(tx.state(), TxState::RolledBack);
    assert!(db.locked_keys().is_empty());
}

#[tokio::test]
async fn blocks_key_writes_during_transaction() {
    let db = empty_db();
    let tx = db.tx_put("key 1", "value 1", TxOptions::new()).await.unwrap();

    let writer = {
        let db = db.clone();
        tokio::spawn(async move {
            let tx = db.tx_put("key 1", "value 2", TxOptions::new()).await?;
            tx.commit().await
        })
    };
    tokio::task::yield_now().await;
    assert!(!writer.is_finished());

    tx.commit().await.unwrap();
    writer.await.unwrap().unwrap();
    assert_eq!(db.get(b"key 1").unwrap(), "value 2");
}

#[tokio::test]
async fn blocks_read_streams_over_locked_range() {
    let db = seeded_db(10);
    let tx = db.tx_put("key 6", "value 6", TxOptions::new()).await.unwrap();

    let reader = {
        let db = db.clone();
        tokio::spawn(async move {
            let stream = db
                .tx_read_stream(RangeOptions::between("key 5", "key 7"))
                .await?;
            Ok::<_, CoreError>(stream.count())
        })
    };
    tokio::task::yield_now().await;
    assert!(!reader.is_finished());

    tx.commit().await.unwrap();
    assert_eq!(reader.await.unwrap().unwrap(), 3);
}

#[tokio::test]
async fn blocks_key_streams_over_locked_range() {
    let db = seeded_db(10);
    let tx = db.tx_del("key 5", TxOptions::new()).await.unwrap();

    let reader = {
        let db = db.clone();
        tokio::spawn(async move {
            let keys = db
                .tx_key_stream(RangeOptions::between("key 5", "key 7"))
                .await?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, CoreError>(keys)
        })
    };
    tokio::task::yield_now().await;
    assert!(!reader.is_finished());

    tx.rollback().await.unwrap();
    let keys = reader.await.unwrap().unwrap();
    assert_eq!(keys, vec![key(5), key(6), key(7)]);
}

#[tokio::test]
async fn blocks_value_streams_over_locked_range() {
    let db = seeded_db(10);
    let tx = db.tx_put("key 7", "value 7", TxOptions::new()).await.unwrap();

    let reader = {
        let db = db.clone();
        tokio::spawn(async move {
            let values = db
                .tx_value_stream(RangeOptions::between("key 5", "key 7"))
                .await?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, CoreError>(values)
        })
    };
    tokio::task::yield_now().await;
    assert!(!reader.is_finished());

    tx.commit().await.unwrap();
    assert_eq!(reader.await.unwrap().unwrap(), vec![value(5), value(6), value(7)]);
}

#[tokio::test(start_paused = true)]
async fn blocks_value_streams_until_timeout() {
    let db = seeded_db(10);
    let started = tokio::time::Instant::now();
    let tx = db
        .tx_batch(
            vec![BatchOp::put("key 6", "in flight"), BatchOp::delete("key 7")],
            TxOptions::with_timeout_ms(200),
        )
        .await
        .unwrap();

    let reader = {
        let db = db.clone();
        tokio::spawn(async move {
            let values = db
                .tx_value_stream(RangeOptions::between("key 5", "key 7"))
                .await?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, CoreError>(values)
        })
    };
    tokio::task::yield_now().await;
    assert!(!reader.is_finished());

    assert_eq!(reader.await.unwrap().unwrap(), vec![value(5), value(6), value(7)]);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(tx.state(), TxState::RolledBack);
}

#[tokio::test]
async fn polling_wait_blocks_read_streams_until_commit() {
    let db = seeded_db_with(10, Config::new().lock_wait(LockWait::Poll(Duration::ZERO)));
    let tx = db.tx_put("key 6", "value 6b", TxOptions::new()).await.unwrap();

    let reader = {
        let db = db.clone();
        tokio::spawn(async move {
            let entries = db
                .tx_read_stream(RangeOptions::between("key 5", "key 7"))
                .await?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, CoreError>(entries)
        })
    };
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert!(!reader.is_finished());

    tx.commit().await.unwrap();
    let entries = reader.await.unwrap().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1], (key(6), Value::from("value 6b")));
    assert!(db.stats().gated_streams() >= 1);
}

#[tokio::test]
async fn range_stream_is_not_blocked_by_later_locks() {
    let db = seeded_db(10);
    let mut entries = db
        .tx_read_stream(RangeOptions::between("key 5", "key 7"))
        .await
        .unwrap();

    let tx = db.tx_put("key 6", "locked later", TxOptions::new()).await.unwrap();
    let first = entries.next().unwrap().unwrap();
    assert_eq!(first.0, key(5));
    assert_eq!(entries.count(), 2);
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn blocks_write_streams_per_entry() {
    let db = empty_db();
    let tx = db.tx_put("key 5", "value 5", TxOptions::new()).await.unwrap();

    let mut stream = db.tx_write_stream();
    stream
        .write_all((0..10).map(|i| (key(i), format!("written {i}"))))
        .unwrap();
    assert_eq!(stream.pending(), 1);
    assert_eq!(db.get(b"key 9").unwrap(), "written 9");
    assert_eq!(db.get(b"key 5").unwrap(), "value 5");

    tx.commit().await.unwrap();
    let summary = stream.finish().await.unwrap();
    assert_eq!(summary.written, 10);
    assert_eq!(summary.deferred, 1);
    assert_eq!(db.get(b"key 5").unwrap(), "written 5");
}

#[tokio::test]
async fn write_stream_from_channel() {
    let db = empty_db();
    let tx = db.tx_put("key 2", "held", TxOptions::new()).await.unwrap();
    let (sender, receiver) = mpsc::channel(4);

    let piping = tokio::spawn(db.tx_write_stream().pipe_from(receiver));
    for i in 0..4 {
        sender.send((key(i), Value::from(format!("written {i}")))).await.unwrap();
    }
    drop(sender);
    tokio::task::yield_now().await;

    tx.rollback().await.unwrap();
    let summary = piping.await.unwrap().unwrap();
    assert_eq!(summary.written, 4);
    assert_eq!(db.get(b"key 2").unwrap(), "written 2");
}

#[tokio::test]
async fn failed_prior_state_read_aborts_without_locks() {
    let engine = FaultyEngine::new(seeded_engine(3));
    engine.fail_get("key 1");
    let db = TxDb::new(engine);

    let err = db
        .tx_batch(
            vec![BatchOp::put("key 0", "x"), BatchOp::put("key 1", "y")],
            TxOptions::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Storage(_)));
    assert!(db.locked_keys().is_empty());
    assert_eq!(db.get(b"key 0").unwrap(), "value 0");
}

#[tokio::test]
async fn failed_forward_batch_aborts_without_locks() {
    let db = TxDb::new(FaultyEngine::new(seeded_engine(3)));
    db.engine().fail_next_batches(1);

    let err = db.tx_put("key 1", "changed", TxOptions::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::Storage(_)));
    assert!(!db.is_locked(b"key 1"));
    assert_eq!(db.get(b"key 1").unwrap(), "value 1");

    // The key is immediately usable again.
    let tx = db.tx_put("key 1", "changed", TxOptions::new()).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(db.get(b"key 1").unwrap(), "changed");
}

#[tokio::test]
async fn failed_rollback_batch_still_releases_locks() {
    let db = TxDb::new(FaultyEngine::new(seeded_engine(3)));
    let mut events = db.subscribe();
    let tx = db.tx_put("key 1", "changed", TxOptions::new()).await.unwrap();

    db.engine().fail_next_batches(1);
    let err = tx.rollback().await.unwrap_err();
    assert!(matches!(err, CoreError::Storage(_)));
    assert_eq!(tx.state(), TxState::RolledBack);
    assert!(db.locked_keys().is_empty());
    assert_eq!(db.stats().rollback_failures(), 1);

    let event = events.recv().await.unwrap();
    assert_eq!(
        event.kind,
        TxEventKind::RolledBack {
            cause: RollbackCause::Explicit,
            failed: true,
        }
    );
}

#[tokio::test]
async fn double_resolution_is_caller_misuse() {
    let db = empty_db();
    let tx = db.tx_put("key 1", "value 1", TxOptions::new()).await.unwrap();
    tx.rollback().await.unwrap();

    let err = tx.commit().await.unwrap_err();
    assert!(err.is_already_resolved());
    assert!(tx.rollback().await.unwrap_err().is_already_resolved());
    assert_eq!(db.stats().transactions_rolled_back(), 1);
    assert_eq!(db.stats().transactions_committed(), 0);
}

#[tokio::test]
async fn cloned_handles_share_resolution() {
    let db = empty_db();
    let tx = db.tx_put("key 1", "value 1", TxOptions::new()).await.unwrap();
    let other = tx.clone();

    tx.commit().await.unwrap();
    assert_eq!(other.state(), TxState::Committed);
    assert!(other.rollback().await.unwrap_err().is_already_resolved());
}

#[tokio::test]
async fn disjoint_transactions_proceed_concurrently() {
    let db = empty_db();
    let open = open_transactions(&db, 5, TxOptions::new()).await.unwrap();
    assert_eq!(db.locked_keys().len(), 5);
    assert_eq!(db.stats().open_transactions(), 5);

    for tx in &open {
        tx.commit().await.unwrap();
    }
    assert!(db.locked_keys().is_empty());
    assert_eq!(db.stats().open_transactions(), 0);
}

#[tokio::test]
async fn commit_wakes_waiters_before_emitting() {
    let db = empty_db();
    let mut events = db.subscribe();
    let tx = db.tx_put("key 1", "value 1", TxOptions::new()).await.unwrap();

    let reader = {
        let db = db.clone();
        tokio::spawn(async move { db.tx_get("key 1").await })
    };
    tokio::task::yield_now().await;

    tx.commit().await.unwrap();
    assert!(reader.is_finished());
    assert!(events.recv().await.unwrap().is_commit());
}

#[tokio::test]
async fn shared_engine_sees_committed_writes() {
    let engine = Arc::new(seeded_engine(2));
    let db = TxDb::from_shared(Arc::clone(&engine), Config::default());

    db.tx_put("key 1", "shared", TxOptions::new())
        .await
        .unwrap()
        .commit()
        .await
        .unwrap();
    assert_eq!(engine.get(b"key 1").unwrap(), "shared");
}
