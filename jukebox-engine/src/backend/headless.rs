//! Clock-driven playback without an output device
//!
//! A headless session "plays" for the media's length: it keeps a position
//! clock (with seek), reports `Playing` when started and `EndReached` when
//! the clock runs out. Nothing is decoded or rendered.

use super::{PlaybackBackend, PlaybackEvent, PlaybackSession};
use crate::{Error, Result};
use jukebox_common::Media;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Headless playback backend
#[derive(Debug, Default, Clone)]
pub struct HeadlessPlayback;

impl HeadlessPlayback {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackBackend for HeadlessPlayback {
    fn open(&self) -> Result<Box<dyn PlaybackSession>> {
        Ok(Box::new(HeadlessSession::new()))
    }
}

struct HeadlessSession {
    events_tx: mpsc::UnboundedSender<PlaybackEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<PlaybackEvent>>,
    total_ms: Option<u64>,
    offset_ms: u64,
    started_at: Option<Instant>,
    end_timer: Option<JoinHandle<()>>,
    volume: u8,
}

impl HeadlessSession {
    fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            events_tx,
            events_rx: Some(events_rx),
            total_ms: None,
            offset_ms: 0,
            started_at: None,
            end_timer: None,
            volume: 100,
        }
    }

    fn position_ms(&self) -> u64 {
        let elapsed = self
            .started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let position = self.offset_ms.saturating_add(elapsed);
        self.total_ms.map_or(position, |total| position.min(total))
    }

    fn arm_end_timer(&mut self, total_ms: u64) {
        self.cancel_end_timer();
        let remaining = Duration::from_millis(total_ms.saturating_sub(self.offset_ms));
        let events = self.events_tx.clone();
        self.end_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            let _ = events.send(PlaybackEvent::EndReached);
        }));
    }

    fn cancel_end_timer(&mut self) {
        if let Some(timer) = self.end_timer.take() {
            timer.abort();
        }
    }
}

impl PlaybackSession for HeadlessSession {
    fn events(&mut self) -> mpsc::UnboundedReceiver<PlaybackEvent> {
        match self.events_rx.take() {
            Some(rx) => rx,
            None => {
                // Re-subscribing replaces the previous stream
                let (tx, rx) = mpsc::unbounded_channel();
                self.events_tx = tx;
                rx
            }
        }
    }

    fn load(&mut self, path: &Path, media: &Media) -> Result<()> {
        debug!("Headless session loaded {} ({} ms)", path.display(), media.length);
        self.total_ms = Some(media.length);
        self.offset_ms = 0;
        self.started_at = None;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let total_ms = self
            .total_ms
            .ok_or_else(|| Error::Backend("no media loaded".to_string()))?;
        self.started_at = Some(Instant::now());
        let _ = self.events_tx.send(PlaybackEvent::Playing);
        self.arm_end_timer(total_ms);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.offset_ms = self.position_ms();
        self.started_at = None;
        self.cancel_end_timer();
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.volume = volume.min(100);
        Ok(())
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        let total_ms = self
            .total_ms
            .ok_or_else(|| Error::Backend("no media loaded".to_string()))?;
        self.offset_ms = position_ms.min(total_ms);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
            self.arm_end_timer(total_ms);
        }
        Ok(())
    }

    fn current_time(&self) -> Result<u64> {
        Ok(self.position_ms())
    }

    fn total_time(&self) -> Result<u64> {
        self.total_ms
            .ok_or_else(|| Error::Backend("no media loaded".to_string()))
    }
}

impl Drop for HeadlessSession {
    fn drop(&mut self) {
        self.cancel_end_timer();
    }
}
