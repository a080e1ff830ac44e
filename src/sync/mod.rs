//! Offline mutation queue and synchronizer.
//!
//! Writes made while offline are appended to a durable local queue and
//! replayed, oldest first, when connectivity returns or on the periodic tick.
//! There is no conflict resolution: each queued mutation is replayed as-is and
//! the remote store's own semantics decide the outcome.

mod connectivity;
mod mutation;
mod queue;
mod synchronizer;

pub use connectivity::{ConnectivityTracker, Transition};
pub use synchronizer::{SyncReport, Synchronizer, WriteOptions, WriteOutcome};
