//! Property-based test generators using proptest.
//!
//! Keys are drawn from a small alphabet so that generated batches collide
//! with each other and with generated pre-states often enough to matter.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use txkv_storage::{BatchOp, Key, Value};

/// Strategy for keys from a small, collision-prone key space.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    (0u8..16).prop_map(|i| Key::from(format!("key {i:02}")))
}

/// Strategy for short values (arbitrary bytes).
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::from)
}

/// Strategy for a single batch operation.
pub fn batch_op_strategy() -> impl Strategy<Value = BatchOp> {
    prop_oneof![
        3 => (key_strategy(), value_strategy()).prop_map(|(key, value)| BatchOp::Put { key, value }),
        1 => key_strategy().prop_map(|key| BatchOp::Delete { key }),
    ]
}

/// Strategy for a batch of `min_ops..max_ops` operations.
pub fn batch_strategy(min_ops: usize, max_ops: usize) -> impl Strategy<Value = Vec<BatchOp>> {
    prop::collection::vec(batch_op_strategy(), min_ops..max_ops)
}

/// Strategy for the engine contents before a transaction.
pub fn prior_state_strategy() -> impl Strategy<Value = BTreeMap<Key, Value>> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..12)
}

/// Strategy for a non-empty set of keys.
pub fn key_set_strategy() -> impl Strategy<Value = BTreeSet<Key>> {
    prop::collection::btree_set(key_strategy(), 1..6)
}

/// Applies `ops` to `state` the way an engine batch does: in order, last
/// write to a key wins.
pub fn apply_model(state: &mut BTreeMap<Key, Value>, ops: &[BatchOp]) {
    for op in ops {
        match op {
            BatchOp::Put { key, value } => {
                state.insert(key.clone(), value.clone());
            }
            BatchOp::Delete { key } => {
                state.remove(key);
            }
        }
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_stay_in_key_space(key in key_strategy()) {
            prop_assert!(key.starts_with(b"key "));
            prop_assert_eq!(key.len(), 6);
        }

        #[test]
        fn model_keeps_last_write(key in key_strategy(), first in value_strategy(), last in value_strategy()) {
            let mut state = BTreeMap::new();
            apply_model(&mut state, &[
                BatchOp::Put { key: key.clone(), value: first },
                BatchOp::Put { key: key.clone(), value: last.clone() },
            ]);
            prop_assert_eq!(state.get(&key), Some(&last));
        }
    }
}
