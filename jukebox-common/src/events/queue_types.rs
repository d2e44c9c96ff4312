//! Queue snapshot types

use crate::Media;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the whole queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Whether new items are placed by weighted-fair insertion
    pub balancing: bool,
    /// Items in play order; index 0 is playing or about to play
    pub items: Vec<QueueItemSnapshot>,
}

/// One queue item as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItemSnapshot {
    /// True while a preparation task for this item's artifact is running
    pub downloading: bool,
    /// Preparation error, empty when none
    pub error: String,
    pub id: u32,
    pub media: Media,
    /// Preparation progress in percent; 100 when nothing is downloading
    pub progress: u8,
}

impl QueueSnapshot {
    /// Item ids in queue order.
    pub fn ids(&self) -> Vec<u32> {
        self.items.iter().map(|item| item.id).collect()
    }
}
