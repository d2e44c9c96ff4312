//! Queue mutations
//!
//! Each operation takes the write lock, mutates, and publishes the resulting
//! snapshot before the lock is released. Invalid indices are logged and
//! ignored.

use super::state::{Queue, QueueState};
use crate::item::{QueueItem, Readiness};
use crate::scheduler::Policy;
use crate::signal::Signal;
use crate::Result;
use jukebox_common::control::MoveCommand;
use jukebox_common::events::PlayerState;
use jukebox_common::Media;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Queue {
    /// Enqueue `media` for `owner` and return the new item's id.
    ///
    /// Returns once preparation has been scheduled; never waits for it.
    pub async fn add(self: &Arc<Self>, media: Media, owner: u32) -> u32 {
        let mut state = self.state.write().await;
        self.add_locked(&mut state, media, owner).await
    }

    async fn add_locked(self: &Arc<Self>, state: &mut QueueState, media: Media, owner: u32) -> u32 {
        let id = state.unused_id();
        let ready = self.request_ready(state, &media);
        let title = media.title.clone();
        let item = QueueItem::new(id, media, owner, state.balancing, ready);

        let index = Policy::from_balancing(state.balancing).insert(item, &mut state.items);
        info!("Queued {} as item {} at index {} (owner {})", title, id, index, owner);

        if index == 0 && self.player.state().await == PlayerState::Stopped {
            self.start_playback(state.items[0].clone());
        }
        self.publish(state).await;
        id
    }

    /// Remove the item at `index`.
    ///
    /// The head is never spliced out here: it is cancelled, and the playback
    /// driver advances past it once the player has let go of it.
    pub async fn remove(&self, index: usize) {
        let mut state = self.state.write().await;
        if index >= state.items.len() {
            warn!("Remove: index {} out of range ({} items)", index, state.items.len());
            return;
        }

        if index == 0 {
            debug!("Remove: cancelling playing item {}", state.items[0].id());
            state.items[0].cancel();
            return;
        }

        let item = state.items.remove(index);
        item.cancel();
        info!("Removed item {} from index {}", item.id(), index);
        self.publish(&state).await;
    }

    /// Move the item at `index` to `to` (`None` = the end).
    ///
    /// The head cannot be moved and nothing can be moved in front of it. A
    /// moved item leaves weighted-fair accounting.
    pub async fn move_to(&self, index: usize, to: Option<usize>) {
        let mut state = self.state.write().await;
        let len = state.items.len();

        if index == 0 || to == Some(0) {
            debug!("Move: {} -> {:?} would displace the head", index, to);
            return;
        }
        if index >= len {
            warn!("Move: index {} out of range ({} items)", index, len);
            return;
        }
        let to = to.unwrap_or(len - 1);
        if to >= len {
            warn!("Move: target {} out of range ({} items)", to, len);
            return;
        }
        if index == to {
            debug!("Move: item at {} is already in place", index);
            return;
        }

        let mut item = state.items.remove(index);
        item.set_balanced(false);
        let id = item.id();
        state.items.insert(to, item);
        info!("Moved item {} from index {} to {}", id, index, to);
        self.publish(&state).await;
    }

    /// Resolve a client move instruction for the item at `index`.
    pub async fn move_item(&self, index: usize, command: MoveCommand) -> Result<()> {
        let to = command.target(index)?;
        self.move_to(index, to).await;
        Ok(())
    }

    /// Switch between weighted-fair and FIFO insertion.
    ///
    /// Turning balancing on re-runs weighted-fair insertion over the current
    /// items in their existing order; the head stays in place. Turning it off
    /// takes every item out of the accounting without reordering.
    pub async fn set_balancing(&self, enabled: bool) {
        let mut state = self.state.write().await;
        state.balancing = enabled;

        if enabled {
            let mut items = std::mem::take(&mut state.items).into_iter();
            let mut reordered = Vec::with_capacity(items.len());
            if let Some(mut head) = items.next() {
                head.set_balanced(true);
                reordered.push(head);
            }
            for mut item in items {
                item.set_balanced(true);
                Policy::WeightedFair.insert(item, &mut reordered);
            }
            state.items = reordered;
        } else {
            for item in state.items.iter_mut() {
                item.set_balanced(false);
            }
        }

        info!("Balancing {}", if enabled { "enabled" } else { "disabled" });
        self.publish(&state).await;
    }

    /// Randomly permute everything behind the head.
    pub async fn shuffle(&self) {
        let mut state = self.state.write().await;
        if let Some(rest) = state.items.get_mut(1..) {
            rest.shuffle(&mut rand::thread_rng());
        }
        debug!("Shuffled {} items", state.items.len().saturating_sub(1));
        self.publish(&state).await;
    }

    /// Interrupt the current item with the built-in quiet placeholder.
    pub async fn be_quiet(self: &Arc<Self>) {
        let mut state = self.state.write().await;

        if state.items.is_empty() {
            info!("Be quiet on an empty queue, queueing placeholder");
            self.add_locked(&mut state, Media::be_quiet(), 0).await;
            return;
        }

        if self.player.state().await == PlayerState::Loading {
            debug!("Be quiet ignored while the player is loading");
            return;
        }

        let id = state.unused_id();
        let quiet = QueueItem::new(id, Media::be_quiet(), 0, false, Signal::settled(Readiness::Ready));
        state.items.insert(1, quiet);
        state.items[0].cancel();
        info!("Be quiet: interrupting item {} with placeholder {}", state.items[0].id(), id);
        self.publish(&state).await;
    }
}
