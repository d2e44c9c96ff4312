//! Queue items
//!
//! A queue item pairs a media reference with the client that submitted it,
//! a readiness gate that settles once the artifact is playable (or failed to
//! prepare), and a cancellation token scoped to the item's lifetime.

use crate::signal::Signal;
use crate::scheduler::Schedulable;
use jukebox_common::Media;
use tokio_util::sync::CancellationToken;

/// Terminal preparation outcome of a queue item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The artifact exists and can be played
    Ready,
    /// Preparation failed; the item will never become playable
    Failed(String),
}

/// A pending or playing unit of work
///
/// Clones share the readiness gate and the cancellation token, so the copy
/// handed to the player observes cancellation triggered through the queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    id: u32,
    media: Media,
    owner: u32,
    balanced: bool,
    ready: Signal<Readiness>,
    cancel: CancellationToken,
}

impl QueueItem {
    pub fn new(id: u32, media: Media, owner: u32, balanced: bool, ready: Signal<Readiness>) -> Self {
        Self {
            id,
            media,
            owner,
            balanced,
            ready,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn media(&self) -> &Media {
        &self.media
    }

    pub fn owner(&self) -> u32 {
        self.owner
    }

    /// Whether the item takes part in weighted-fair accounting.
    pub fn is_balanced(&self) -> bool {
        self.balanced
    }

    pub(crate) fn set_balanced(&mut self, balanced: bool) {
        self.balanced = balanced;
    }

    /// Readiness gate; shared with every item waiting on the same artifact.
    pub fn ready(&self) -> &Signal<Readiness> {
        &self.ready
    }

    /// Preparation error, if preparation failed.
    pub fn error(&self) -> Option<String> {
        match self.ready.get() {
            Some(Readiness::Failed(message)) => Some(message),
            _ => None,
        }
    }

    /// Cancel the item. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Schedulable for QueueItem {
    fn owner(&self) -> u32 {
        self.owner
    }

    fn length(&self) -> u64 {
        self.media.length
    }

    fn is_balanced(&self) -> bool {
        self.balanced
    }
}
