//! Snapshot types published on the update channels
//!
//! Every queue mutation publishes a full [`QueueSnapshot`]; every player
//! transition (and the periodic heartbeat) publishes a [`PlayerSnapshot`].
//! Both serialize to the JSON documents consumed by connected observers.

mod playback_types;
mod queue_types;

pub use playback_types::{PlayerSnapshot, PlayerState};
pub use queue_types::{QueueItemSnapshot, QueueSnapshot};
