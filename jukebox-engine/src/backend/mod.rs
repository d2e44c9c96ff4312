//! Collaborator interfaces consumed by the engine
//!
//! - [`Preparer`]: resolves URLs to media and turns media into on-disk
//!   artifacts (download + transcode)
//! - [`PlaybackBackend`]: opens playback sessions that render an artifact

pub mod headless;
pub mod process;

use crate::Result;
use async_trait::async_trait;
use jukebox_common::Media;
use std::path::Path;
use tokio::sync::{mpsc, oneshot};

pub use headless::HeadlessPlayback;
pub use process::ProcessPreparer;

/// A running preparation job
///
/// `progress` yields percentages in `0..=100` and closes when the job ends;
/// `done` then carries the terminal result.
pub struct Preparation {
    pub progress: mpsc::Receiver<u8>,
    pub done: oneshot::Receiver<std::result::Result<(), String>>,
}

impl Preparation {
    /// Create a job handle plus the sending halves the job reports through.
    pub fn channel() -> (
        Self,
        mpsc::Sender<u8>,
        oneshot::Sender<std::result::Result<(), String>>,
    ) {
        let (progress_tx, progress) = mpsc::channel(16);
        let (done_tx, done) = oneshot::channel();
        (Self { progress, done }, progress_tx, done_tx)
    }
}

/// Media lookup and artifact preparation
#[async_trait]
pub trait Preparer: Send + Sync {
    /// Look up media metadata for a URL.
    async fn info(&self, url: &str, video: bool) -> Result<Media>;

    /// Whether clients may submit this URL.
    async fn validate_url(&self, url: &str) -> bool;

    /// Start preparing the artifact for `media`.
    ///
    /// Must not block: the job runs in the background and reports through the
    /// returned [`Preparation`].
    fn prepare(&self, media: &Media) -> Result<Preparation>;
}

/// Events a playback session reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Output is actively playing; timing information is now meaningful
    Playing,
    /// The end of the media was reached
    EndReached,
}

/// Factory for playback sessions
pub trait PlaybackBackend: Send + Sync {
    /// Initialise a new session. Dropping the session releases it.
    fn open(&self) -> Result<Box<dyn PlaybackSession>>;
}

/// One open playback session
pub trait PlaybackSession: Send {
    /// Subscribe to session events. Called once, before `play`.
    fn events(&mut self) -> mpsc::UnboundedReceiver<PlaybackEvent>;

    fn load(&mut self, path: &Path, media: &Media) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Volume in `0..=100`.
    fn set_volume(&mut self, volume: u8) -> Result<()>;

    fn seek(&mut self, position_ms: u64) -> Result<()>;

    fn current_time(&self) -> Result<u64>;

    fn total_time(&self) -> Result<u64>;

    /// Whether this session renders video.
    fn has_video_output(&self) -> bool {
        false
    }

    fn set_fullscreen(&mut self, _fullscreen: bool) -> Result<()> {
        Ok(())
    }
}
