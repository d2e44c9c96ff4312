//! Queue handle and locked state
//!
//! **Responsibilities:**
//! - Own the ordered item list, balancing flag and download tracker behind
//!   one lock
//! - Publish full snapshots on the update channel
//! - Hand the head item to the player and advance after it finishes

use super::downloads::{ArtifactStore, DownloadTracker};
use crate::backend::Preparer;
use crate::item::QueueItem;
use crate::player::Player;
use jukebox_common::events::{QueueItemSnapshot, QueueSnapshot};
use jukebox_common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Queue construction parameters
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub data_dir: PathBuf,
    pub video_transcoding: bool,
    /// Capacity of the snapshot channel
    pub update_capacity: usize,
    /// Initial balancing flag
    pub balancing: bool,
}

impl QueueSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            video_transcoding: config.video_transcoding,
            update_capacity: config.update_capacity,
            balancing: true,
        }
    }
}

/// State guarded by the queue lock
#[derive(Debug)]
pub(crate) struct QueueState {
    pub(crate) items: Vec<QueueItem>,
    pub(crate) balancing: bool,
    pub(crate) downloads: DownloadTracker,
}

impl QueueState {
    pub(crate) fn contains(&self, id: u32) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }

    /// Zero if free, otherwise random ids until one is free.
    pub(crate) fn unused_id(&self) -> u32 {
        let mut id = 0;
        while self.contains(id) {
            id = rand::random();
        }
        id
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        let items = self
            .items
            .iter()
            .map(|item| {
                let (downloading, progress) =
                    self.downloads.progress(&item.media().download_key());
                QueueItemSnapshot {
                    downloading,
                    error: item.error().unwrap_or_default(),
                    id: item.id(),
                    media: item.media().clone(),
                    progress,
                }
            })
            .collect();
        QueueSnapshot {
            balancing: self.balancing,
            items,
        }
    }
}

/// The shared play queue
///
/// Every operation runs under one read/write lock. Mutations publish the
/// resulting snapshot before releasing the lock, so snapshots arrive in
/// mutation order. Publishing waits for channel capacity: the receiver
/// returned by [`Queue::new`] must be drained continuously or mutations
/// stall.
pub struct Queue {
    pub(crate) state: RwLock<QueueState>,
    pub(crate) player: Arc<Player>,
    pub(crate) preparer: Arc<dyn Preparer>,
    pub(crate) artifacts: ArtifactStore,
    updates: mpsc::Sender<QueueSnapshot>,
}

impl Queue {
    pub fn new(
        player: Arc<Player>,
        preparer: Arc<dyn Preparer>,
        settings: QueueSettings,
    ) -> (Arc<Self>, mpsc::Receiver<QueueSnapshot>) {
        let (updates, rx) = mpsc::channel(settings.update_capacity.max(1));
        let queue = Arc::new(Self {
            state: RwLock::new(QueueState {
                items: Vec::new(),
                balancing: settings.balancing,
                downloads: DownloadTracker::default(),
            }),
            player,
            preparer,
            artifacts: ArtifactStore::new(settings.data_dir, settings.video_transcoding),
            updates,
        });
        info!("Created queue instance");
        (queue, rx)
    }

    /// Current snapshot.
    pub async fn list(&self) -> QueueSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn balancing(&self) -> bool {
        self.state.read().await.balancing
    }

    /// Number of preparation jobs currently running.
    pub async fn active_downloads(&self) -> usize {
        self.state.read().await.downloads.len()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub(crate) async fn publish(&self, state: &QueueState) {
        if self.updates.send(state.snapshot()).await.is_err() {
            debug!("Queue update receiver dropped, snapshot discarded");
        }
    }

    /// Play `item` in the background and advance once it finishes.
    pub(crate) fn start_playback(self: &Arc<Self>, item: QueueItem) {
        let queue = Arc::clone(self);
        let path = self.artifacts.path(item.media());
        tokio::spawn(async move {
            let id = item.id();
            match queue.player.play(item, path).await {
                Ok(()) => queue.advance(id).await,
                Err(e) => warn!("Playback of item {} was not started: {}", id, e),
            }
        });
    }

    /// Remove the finished item and start the new head, if any.
    ///
    /// Only called by the playback task of `finished`.
    pub(crate) async fn advance(self: &Arc<Self>, finished: u32) {
        let mut state = self.state.write().await;
        match state.items.iter().position(|item| item.id() == finished) {
            Some(0) => {
                state.items.remove(0);
            }
            Some(index) => {
                warn!("Finished item {} was at index {}, not the head", finished, index);
                state.items.remove(index);
            }
            None => warn!("Finished item {} is no longer queued", finished),
        }

        if let Some(head) = state.items.first() {
            debug!("Advancing to item {}", head.id());
            self.start_playback(head.clone());
        }
        self.publish(&state).await;
    }
}
