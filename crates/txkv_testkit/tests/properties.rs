//! Property tests for rollback and lock exclusivity.

use proptest::prelude::*;
use txkv_core::{LockTable, TxDb, TxOptions};
use txkv_storage::InMemoryEngine;
use txkv_testkit::generators::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn rollback_restores_any_prior_state(
        prior in prior_state_strategy(),
        ops in batch_strategy(0, 12),
    ) {
        let db = TxDb::new(InMemoryEngine::with_entries(prior.clone()));
        let after = runtime().block_on(async {
            let tx = db.tx_batch(ops, TxOptions::new()).await.unwrap();
            tx.rollback().await.unwrap();
            db.engine().snapshot()
        });
        prop_assert_eq!(after, prior);
        prop_assert!(db.locked_keys().is_empty());
    }

    #[test]
    fn commit_leaves_last_write_wins_result(
        prior in prior_state_strategy(),
        ops in batch_strategy(1, 12),
    ) {
        let mut expected = prior.clone();
        apply_model(&mut expected, &ops);

        let db = TxDb::new(InMemoryEngine::with_entries(prior));
        let after = runtime().block_on(async {
            let tx = db.tx_batch(ops, TxOptions::new()).await.unwrap();
            tx.commit().await.unwrap();
            db.engine().snapshot()
        });
        prop_assert_eq!(after, expected);
    }

    #[test]
    fn overlapping_sets_never_both_acquire(a in key_set_strategy(), b in key_set_strategy()) {
        let table = LockTable::default();
        prop_assert!(table.try_acquire(&a));
        let second = table.try_acquire(&b);
        prop_assert_eq!(second, a.is_disjoint(&b));
        if !second {
            prop_assert_eq!(table.len(), a.len());
        }
    }

    #[test]
    fn rollback_log_has_one_entry_per_distinct_key(ops in batch_strategy(0, 12)) {
        let distinct = txkv_storage::distinct_keys(&ops).len();
        let db = TxDb::new(InMemoryEngine::new());
        let len = runtime().block_on(async {
            let tx = db.tx_batch(ops, TxOptions::new()).await.unwrap();
            let len = tx.rollback_log_len();
            tx.commit().await.unwrap();
            len
        });
        prop_assert_eq!(len, distinct);
    }
}
