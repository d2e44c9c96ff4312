//! Playback backend driven by the test
//!
//! Sessions report `Playing` when started and only reach the end when the
//! test calls [`PlaybackLog::end_current`]. Every call is recorded.

use jukebox_common::Media;
use jukebox_engine::backend::{PlaybackBackend, PlaybackEvent, PlaybackSession};
use jukebox_engine::{Error, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What the scripted sessions did
#[derive(Default)]
pub struct PlaybackLog {
    opened: AtomicUsize,
    stopped: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fail_next_open: AtomicBool,
    loaded: Mutex<Vec<String>>,
    volumes: Mutex<Vec<u8>>,
    seeks: Mutex<Vec<u64>>,
    current: Mutex<Option<mpsc::UnboundedSender<PlaybackEvent>>>,
}

impl PlaybackLog {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sessions currently alive.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of sessions ever alive at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Media ids in load order.
    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn volumes(&self) -> Vec<u8> {
        self.volumes.lock().unwrap().clone()
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }

    /// Report end of media on the most recently subscribed session.
    pub fn end_current(&self) {
        if let Some(events) = self.current.lock().unwrap().as_ref() {
            let _ = events.send(PlaybackEvent::EndReached);
        }
    }
}

pub struct ScriptedPlayback {
    log: Arc<PlaybackLog>,
}

impl ScriptedPlayback {
    pub fn new() -> (Arc<Self>, Arc<PlaybackLog>) {
        let log = Arc::new(PlaybackLog::default());
        (
            Arc::new(Self {
                log: Arc::clone(&log),
            }),
            log,
        )
    }
}

impl PlaybackBackend for ScriptedPlayback {
    fn open(&self) -> Result<Box<dyn PlaybackSession>> {
        if self.log.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(Error::Backend("no output device".to_string()));
        }
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.log.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_active.fetch_max(active, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            log: Arc::clone(&self.log),
            events: None,
            total: 0,
        }))
    }
}

struct ScriptedSession {
    log: Arc<PlaybackLog>,
    events: Option<mpsc::UnboundedSender<PlaybackEvent>>,
    total: u64,
}

impl PlaybackSession for ScriptedSession {
    fn events(&mut self) -> mpsc::UnboundedReceiver<PlaybackEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.log.current.lock().unwrap() = Some(tx.clone());
        self.events = Some(tx);
        rx
    }

    fn load(&mut self, _path: &Path, media: &Media) -> Result<()> {
        self.log.loaded.lock().unwrap().push(media.id.clone());
        self.total = media.length;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if let Some(events) = &self.events {
            let _ = events.send(PlaybackEvent::Playing);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.log.volumes.lock().unwrap().push(volume);
        Ok(())
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        self.log.seeks.lock().unwrap().push(position_ms);
        Ok(())
    }

    fn current_time(&self) -> Result<u64> {
        Ok(self.total / 2)
    }

    fn total_time(&self) -> Result<u64> {
        Ok(self.total)
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.log.active.fetch_sub(1, Ordering::SeqCst);
    }
}
