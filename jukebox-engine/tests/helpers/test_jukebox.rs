//! Queue + player wired to scripted backends
//!
//! Both update channels are drained for the whole test; every snapshot is
//! kept so tests can wait for a state or inspect the history.

use super::scripted_playback::{PlaybackLog, ScriptedPlayback};
use super::scripted_preparer::ScriptedPreparer;
use jukebox_common::events::{PlayerSnapshot, PlayerState, QueueSnapshot};
use jukebox_common::Media;
use jukebox_engine::{Player, PlayerSettings, Queue, QueueSettings};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

/// Upper bound for any single wait
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Media of type `youtube` with a predictable url and title.
pub fn media(id: &str, length: u64) -> Media {
    Media {
        id: id.to_string(),
        media_type: "youtube".to_string(),
        length,
        title: id.to_uppercase(),
        video: false,
        url: format!("https://www.youtube.com/watch?v={id}"),
    }
}

pub struct TestJukebox {
    pub queue: Arc<Queue>,
    pub player: Arc<Player>,
    pub preparer: Arc<ScriptedPreparer>,
    pub playback: Arc<PlaybackLog>,
    pub data_dir: TempDir,
    queue_view: watch::Receiver<Option<QueueSnapshot>>,
    player_view: watch::Receiver<Option<PlayerSnapshot>>,
    queue_history: Arc<Mutex<Vec<QueueSnapshot>>>,
}

impl TestJukebox {
    pub fn start() -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        let (backend, playback) = ScriptedPlayback::new();
        let (player, player_rx) = Player::new(
            backend,
            PlayerSettings {
                volume_step: 10,
                update_capacity: 1,
            },
        );

        let preparer = ScriptedPreparer::new();
        let (queue, queue_rx) = Queue::new(
            Arc::clone(&player),
            preparer.clone(),
            QueueSettings {
                data_dir: data_dir.path().to_path_buf(),
                video_transcoding: true,
                update_capacity: 1,
                balancing: true,
            },
        );

        let queue_history = Arc::new(Mutex::new(Vec::new()));
        let queue_view = drain(queue_rx, Some(Arc::clone(&queue_history)));
        let player_view = drain(player_rx, None);

        Self {
            queue,
            player,
            preparer,
            playback,
            data_dir,
            queue_view,
            player_view,
            queue_history,
        }
    }

    /// Create the artifact for `media` so no preparation is needed.
    pub fn install_artifact(&self, media: &Media) {
        let path = self.queue.artifacts().path(media);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"artifact").unwrap();
    }

    /// Wait until a published queue snapshot satisfies `pred`.
    pub async fn wait_queue<F>(&self, what: &str, pred: F) -> QueueSnapshot
    where
        F: Fn(&QueueSnapshot) -> bool,
    {
        let mut view = self.queue_view.clone();
        let found = timeout(TIMEOUT, view.wait_for(|s| s.as_ref().is_some_and(&pred))).await;
        match found {
            Ok(Ok(snapshot)) => snapshot.clone().unwrap(),
            _ => panic!("timed out waiting for queue: {what} (last: {:?})", self.queue_view.borrow().clone()),
        }
    }

    /// Wait until a published player snapshot satisfies `pred`.
    pub async fn wait_player<F>(&self, what: &str, pred: F) -> PlayerSnapshot
    where
        F: Fn(&PlayerSnapshot) -> bool,
    {
        let mut view = self.player_view.clone();
        let found = timeout(TIMEOUT, view.wait_for(|s| s.as_ref().is_some_and(&pred))).await;
        match found {
            Ok(Ok(snapshot)) => snapshot.unwrap(),
            _ => panic!("timed out waiting for player: {what} (last: {:?})", *self.player_view.borrow()),
        }
    }

    pub async fn wait_player_state(&self, state: PlayerState) -> PlayerSnapshot {
        self.wait_player(&format!("state {state}"), |s| s.state == state).await
    }

    /// Wait until the playback backend has loaded exactly `ids`, in order.
    pub async fn wait_loaded(&self, ids: &[&str]) {
        let playback = Arc::clone(&self.playback);
        eventually(&format!("loaded {ids:?}"), || {
            let loaded = playback.loaded();
            async move { loaded == ids }
        })
        .await;
    }

    /// Every queue snapshot published so far, oldest first.
    pub fn queue_history(&self) -> Vec<QueueSnapshot> {
        self.queue_history.lock().unwrap().clone()
    }
}

/// Forward every update into a watch channel (and optionally a history).
fn drain<T>(
    mut rx: mpsc::Receiver<T>,
    history: Option<Arc<Mutex<Vec<T>>>>,
) -> watch::Receiver<Option<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let (tx, view) = watch::channel(None);
    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            if let Some(history) = &history {
                history.lock().unwrap().push(snapshot.clone());
            }
            tx.send_replace(Some(snapshot));
        }
    });
    view
}

/// Poll `check` until it holds, failing the test after [`TIMEOUT`].
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = timeout(TIMEOUT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}
