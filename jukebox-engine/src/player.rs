//! Single-output player
//!
//! State machine around one playback backend. At most one backend session is
//! open at a time, and only while the player is Loading or Playing.
//!
//! **Transitions:**
//! - Stopped -> Loading: [`Player::play`] is handed the queue head
//! - Loading -> Playing: readiness gate settled Ready and the session started
//! - Loading/Playing -> Stopped: end of media, item cancelled, failed
//!   preparation, or any backend error; the session is always released

use crate::backend::{PlaybackBackend, PlaybackEvent, PlaybackSession};
use crate::item::{QueueItem, Readiness};
use crate::{Error, Result};
use jukebox_common::events::{PlayerSnapshot, PlayerState};
use jukebox_common::{Config, Media};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

/// Default volume on startup
pub const DEFAULT_VOLUME: u8 = 100;

/// Player construction parameters
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// Step applied by [`Player::up_volume`] and [`Player::down_volume`]
    pub volume_step: u8,
    /// Capacity of the snapshot channel
    pub update_capacity: usize,
}

impl PlayerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            volume_step: config.volume_step,
            update_capacity: config.update_capacity,
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume_step: 5,
            update_capacity: 1,
        }
    }
}

struct PlayerInner {
    state: PlayerState,
    volume: u8,
    session: Option<Box<dyn PlaybackSession>>,
}

impl PlayerInner {
    fn snapshot(&self) -> PlayerSnapshot {
        let (current_time, total_time) = match (self.state, &self.session) {
            (PlayerState::Playing, Some(session)) => (
                session.current_time().unwrap_or(0),
                session.total_time().unwrap_or(0),
            ),
            _ => (0, 0),
        };
        PlayerSnapshot {
            current_time,
            total_time,
            state: self.state,
            volume: self.volume,
        }
    }
}

/// The process-wide player
///
/// Control calls are serialized by one mutex, which also covers every
/// backend call so a control call never races a session teardown.
pub struct Player {
    inner: Mutex<PlayerInner>,
    backend: Arc<dyn PlaybackBackend>,
    updates: mpsc::Sender<PlayerSnapshot>,
    volume_step: u8,
}

impl Player {
    pub fn new(
        backend: Arc<dyn PlaybackBackend>,
        settings: PlayerSettings,
    ) -> (Arc<Self>, mpsc::Receiver<PlayerSnapshot>) {
        let (updates, rx) = mpsc::channel(settings.update_capacity.max(1));
        let player = Arc::new(Self {
            inner: Mutex::new(PlayerInner {
                state: PlayerState::Stopped,
                volume: DEFAULT_VOLUME,
                session: None,
            }),
            backend,
            updates,
            volume_step: settings.volume_step,
        });
        info!("Created player instance");
        (player, rx)
    }

    /// Publish a snapshot every `period` while the player is alive.
    pub fn spawn_heartbeat(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let player = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(player) = player.upgrade() else {
                    debug!("Player dropped, heartbeat stopped");
                    break;
                };
                let inner = player.inner.lock().await;
                player.publish(inner.snapshot()).await;
            }
        })
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn volume(&self) -> u8 {
        self.inner.lock().await.volume
    }

    /// Current snapshot.
    pub async fn get(&self) -> PlayerSnapshot {
        self.inner.lock().await.snapshot()
    }

    async fn publish(&self, snapshot: PlayerSnapshot) {
        if self.updates.send(snapshot).await.is_err() {
            debug!("Player update receiver dropped, snapshot discarded");
        }
    }

    /// Play `item` from the artifact at `path` until it ends or is cancelled.
    ///
    /// Fails only if the player is not Stopped, in which case nothing
    /// happened. Every other outcome, including backend and preparation
    /// failures, ends with the player Stopped and returns `Ok`: the item is
    /// done and the queue should advance.
    pub async fn play(&self, item: QueueItem, path: impl AsRef<Path>) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != PlayerState::Stopped {
                return Err(Error::InvalidState(format!(
                    "cannot play item {} while {}",
                    item.id(),
                    inner.state
                )));
            }
            inner.state = PlayerState::Loading;
            self.publish(inner.snapshot()).await;
        }

        let cancel = item.cancellation().clone();
        let readiness = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            readiness = item.ready().wait() => Some(readiness),
        };

        match readiness {
            None => {
                info!("Item {} cancelled before it became ready", item.id());
                self.finish().await;
                return Ok(());
            }
            Some(Readiness::Failed(message)) => {
                warn!("Skipping item {} ({}): {}", item.id(), item.media().title, message);
                self.finish().await;
                return Ok(());
            }
            Some(Readiness::Ready) => {}
        }

        let mut events = match self.start_session(item.media(), path.as_ref()).await {
            Ok(events) => events,
            Err(e) => {
                error!("Playback of {} failed: {}", item.media().title, e);
                self.finish().await;
                return Ok(());
            }
        };
        info!("Playing item {} ({})", item.id(), item.media().title);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Playback of item {} cancelled", item.id());
                    break;
                }
                event = events.recv() => match event {
                    Some(PlaybackEvent::Playing) => {
                        let inner = self.inner.lock().await;
                        self.publish(inner.snapshot()).await;
                    }
                    Some(PlaybackEvent::EndReached) => {
                        debug!("Item {} reached its end", item.id());
                        item.cancel();
                        break;
                    }
                    None => {
                        warn!("Playback session of item {} closed its event stream", item.id());
                        break;
                    }
                },
            }
        }

        self.finish().await;
        Ok(())
    }

    /// Open, load and start a session, then enter Playing.
    ///
    /// The session is stored even when setup fails so that [`Self::finish`]
    /// releases it.
    async fn start_session(
        &self,
        media: &Media,
        path: &Path,
    ) -> Result<mpsc::UnboundedReceiver<PlaybackEvent>> {
        let mut inner = self.inner.lock().await;
        let mut session = self.backend.open()?;
        let events = session.events();
        let started = start(&mut *session, media, path, inner.volume);
        inner.session = Some(session);
        started?;

        inner.state = PlayerState::Playing;
        self.publish(inner.snapshot()).await;
        Ok(events)
    }

    /// Release the session and return to Stopped.
    async fn finish(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut session) = inner.session.take() {
            if let Err(e) = session.stop() {
                warn!("Failed to stop playback session: {}", e);
            }
        }
        inner.state = PlayerState::Stopped;
        self.publish(inner.snapshot()).await;
    }

    pub async fn up_volume(&self) {
        self.change_volume(i16::from(self.volume_step)).await;
    }

    pub async fn down_volume(&self) {
        self.change_volume(-i16::from(self.volume_step)).await;
    }

    async fn change_volume(&self, delta: i16) {
        let mut inner = self.inner.lock().await;
        let volume = (i16::from(inner.volume) + delta).clamp(0, 100) as u8;
        inner.volume = volume;

        if inner.state == PlayerState::Playing {
            if let Some(session) = inner.session.as_mut() {
                if let Err(e) = session.set_volume(volume) {
                    warn!("Failed to apply volume {}: {}", volume, e);
                }
            }
        }
        debug!("Volume set to {}", volume);
        self.publish(inner.snapshot()).await;
    }

    /// Seek the playing item to `position_ms`.
    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != PlayerState::Playing {
            warn!("Seek to {} ms rejected while {}", position_ms, inner.state);
            return Err(Error::InvalidState(format!("cannot seek while {}", inner.state)));
        }
        let session = inner
            .session
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no playback session".to_string()))?;
        session.seek(position_ms)?;
        self.publish(inner.snapshot()).await;
        Ok(())
    }
}

fn start(session: &mut dyn PlaybackSession, media: &Media, path: &Path, volume: u8) -> Result<()> {
    session.load(path, media)?;
    session.play()?;
    session.set_volume(volume)?;
    if media.video && session.has_video_output() {
        session.set_fullscreen(true)?;
    }
    Ok(())
}
