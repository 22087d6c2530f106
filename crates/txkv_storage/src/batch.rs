//! Batch operations and range bounds.

use crate::{Key, Value};
use std::collections::BTreeSet;
use std::ops::Bound;

/// A single operation in an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key.
    Put {
        /// Key to write.
        key: Key,
        /// Value to store.
        value: Value,
    },
    /// Remove a key.
    Delete {
        /// Key to remove.
        key: Key,
    },
}

impl BatchOp {
    /// Creates a put operation.
    pub fn put(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a delete operation.
    pub fn delete(key: impl Into<Key>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Returns the key this operation touches.
    #[must_use]
    pub fn key(&self) -> &Key {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }

    /// Returns `true` for a delete.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// Returns the distinct keys referenced by `ops`, in key order.
#[must_use]
pub fn distinct_keys(ops: &[BatchOp]) -> BTreeSet<Key> {
    ops.iter().map(|op| op.key().clone()).collect()
}

/// Bounds and shape of a range read.
///
/// `start` and `end` are both inclusive. A missing bound is unbounded on
/// that side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeOptions {
    /// Lowest key to include.
    pub start: Option<Key>,
    /// Highest key to include.
    pub end: Option<Key>,
    /// Yield keys in descending order.
    pub reverse: bool,
    /// Maximum number of items to yield.
    pub limit: Option<usize>,
}

impl RangeOptions {
    /// Creates an unbounded range.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a range over `[start, end]`.
    pub fn between(start: impl Into<Key>, end: impl Into<Key>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            ..Self::default()
        }
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn start(mut self, key: impl Into<Key>) -> Self {
        self.start = Some(key.into());
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn end(mut self, key: impl Into<Key>) -> Self {
        self.end = Some(key.into());
        self
    }

    /// Iterate in descending key order.
    #[must_use]
    pub const fn reverse(mut self, value: bool) -> Self {
        self.reverse = value;
        self
    }

    /// Caps the number of yielded items.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the bounds as a pair usable with `BTreeMap::range`.
    ///
    /// An inverted range (`start > end`) is returned unchanged; callers must
    /// check [`RangeOptions::is_empty`] first since `BTreeMap::range` panics
    /// on inverted bounds.
    #[must_use]
    pub fn bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        let lower = self
            .start
            .as_deref()
            .map_or(Bound::Unbounded, Bound::Included);
        let upper = self
            .end
            .as_deref()
            .map_or(Bound::Unbounded, Bound::Included);
        (lower, upper)
    }

    /// Returns `true` if no key can fall inside the range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!((&self.start, &self.end), (Some(s), Some(e)) if s > e)
    }

    /// Returns `true` if `key` lies within the bounds.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        let above = self.start.as_deref().map_or(true, |s| key >= s);
        let below = self.end.as_deref().map_or(true, |e| key <= e);
        above && below
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn batch_op_key() {
        assert_eq!(BatchOp::put("a", "1").key().as_ref(), b"a");
        assert_eq!(BatchOp::delete("b").key().as_ref(), b"b");
        assert!(BatchOp::delete("b").is_delete());
    }

    #[test]
    fn distinct_keys_dedupes_and_sorts() {
        let ops = vec![
            BatchOp::put("b", "1"),
            BatchOp::put("a", "1"),
            BatchOp::delete("b"),
        ];
        let keys: Vec<_> = distinct_keys(&ops).into_iter().collect();
        assert_eq!(keys, vec![Key::from("a"), Key::from("b")]);
    }

    #[test]
    fn range_contains_is_inclusive() {
        let range = RangeOptions::between("key 5", "key 7");
        assert!(range.contains(b"key 5"));
        assert!(range.contains(b"key 6"));
        assert!(range.contains(b"key 7"));
        assert!(!range.contains(b"key 4"));
        assert!(!range.contains(b"key 8"));
    }

    #[test]
    fn unbounded_range_contains_everything() {
        let range = RangeOptions::new();
        assert!(range.contains(b""));
        assert!(range.contains(b"zzz"));
    }

    #[test]
    fn half_open_ranges() {
        let from = RangeOptions::new().start("m");
        assert!(from.contains(b"m"));
        assert!(!from.contains(b"a"));

        let to = RangeOptions::new().end("m");
        assert!(to.contains(b"a"));
        assert!(!to.contains(b"z"));
    }

    fn short_key() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(b'a'..=b'e', 0..4)
    }

    proptest! {
        #[test]
        fn contains_agrees_with_ordered_range(
            keys in proptest::collection::btree_set(short_key(), 0..24),
            start in proptest::option::of(short_key()),
            end in proptest::option::of(short_key()),
        ) {
            let mut range = RangeOptions::new();
            if let Some(start) = start {
                range = range.start(start);
            }
            if let Some(end) = end {
                range = range.end(end);
            }

            let inside: Vec<&Vec<u8>> = keys.iter().filter(|k| range.contains(k.as_slice())).collect();
            if range.is_empty() {
                prop_assert!(inside.is_empty());
            } else {
                let expected: Vec<&Vec<u8>> = keys.range::<[u8], _>(range.bounds()).collect();
                prop_assert_eq!(inside, expected);
            }
        }
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(RangeOptions::between("b", "a").is_empty());
        assert!(!RangeOptions::between("a", "a").is_empty());
        assert!(!RangeOptions::new().is_empty());
    }
}
