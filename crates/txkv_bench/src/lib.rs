//! Benchmark utilities.

#![warn(missing_docs)]

use rand::Rng;
use txkv_core::TxDb;
use txkv_storage::{BatchOp, InMemoryEngine, Key, Value};

/// Generate random value bytes of the specified size.
pub fn random_value(size: usize) -> Value {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen::<u8>()).collect::<Vec<_>>().into()
}

/// Returns the benchmark key for index `i`.
pub fn bench_key(i: usize) -> Key {
    Key::from(format!("bench {i:08}"))
}

/// Generate a batch of puts over `count` consecutive keys.
pub fn generate_batch(count: usize, payload_size: usize) -> Vec<BatchOp> {
    (0..count)
        .map(|i| BatchOp::put(bench_key(i), random_value(payload_size)))
        .collect()
}

/// Creates an overlay over `count` pre-populated keys.
pub fn populated_db(count: usize, payload_size: usize) -> TxDb<InMemoryEngine> {
    let engine = InMemoryEngine::with_entries(
        (0..count).map(|i| (bench_key(i), random_value(payload_size))),
    );
    TxDb::new(engine)
}

/// Builds the multi-threaded runtime the async benchmarks run on.
///
/// # Panics
///
/// Panics if the runtime cannot be created.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}
