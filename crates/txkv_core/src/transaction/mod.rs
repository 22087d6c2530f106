//! Transaction handles and their timeout guards.
//!
//! A txkv transaction is a mutation that has already been applied to the
//! engine while its keys stay locked. The handle decides what happens next:
//! - **Commit**: keep the mutation, release the keys
//! - **Rollback**: write the captured prior state back, release the keys
//! - **Timeout**: the guard performs the rollback if nobody resolved in time

mod handle;
mod timeout;

pub use handle::Transaction;
pub use timeout::TimeoutGuard;
