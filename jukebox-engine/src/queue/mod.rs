//! Shared play queue
//!
//! - `state`: the queue handle, its locked state, snapshots and the playback
//!   driver
//! - `operations`: client-facing mutations (add, remove, move, balancing,
//!   shuffle, be quiet)
//! - `downloads`: artifact lookup and preparation dedup

mod state;
mod downloads;
mod operations;

pub use state::{Queue, QueueSettings};
pub use downloads::ArtifactStore;
