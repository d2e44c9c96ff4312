//! Download deduplication
//!
//! **Responsibilities:**
//! - Resolve where a media artifact lives and whether it already exists
//! - Track in-flight preparation jobs by [`DownloadKey`]
//! - Give every item that needs the same artifact the same readiness gate
//! - Relay job progress into queue snapshots

use super::state::{Queue, QueueState};
use crate::backend::Preparation;
use crate::item::Readiness;
use crate::signal::Signal;
use jukebox_common::{DownloadKey, Media};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Location of prepared artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    data_dir: PathBuf,
    video_transcoding: bool,
}

impl ArtifactStore {
    pub fn new(data_dir: PathBuf, video_transcoding: bool) -> Self {
        Self {
            data_dir,
            video_transcoding,
        }
    }

    pub fn path(&self, media: &Media) -> PathBuf {
        media.artifact_path(&self.data_dir, self.video_transcoding)
    }

    pub fn is_present(&self, media: &Media) -> bool {
        self.path(media).is_file()
    }
}

/// An in-flight preparation job
#[derive(Debug)]
pub(crate) struct Download {
    /// Settles when the job ends; every waiting item shares it as its gate
    pub(crate) done: Signal<Readiness>,
    /// Last reported percentage
    pub(crate) progress: u8,
}

/// In-flight downloads keyed by artifact identity
#[derive(Debug, Default)]
pub(crate) struct DownloadTracker {
    downloads: HashMap<DownloadKey, Download>,
}

impl DownloadTracker {
    pub(crate) fn get(&self, key: &DownloadKey) -> Option<&Download> {
        self.downloads.get(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.downloads.len()
    }

    /// `(downloading, progress)` as reported in snapshots.
    pub(crate) fn progress(&self, key: &DownloadKey) -> (bool, u8) {
        match self.downloads.get(key) {
            Some(download) => (true, download.progress),
            None => (false, 100),
        }
    }

    fn start(&mut self, key: DownloadKey) -> Signal<Readiness> {
        let done = Signal::new();
        self.downloads.insert(
            key,
            Download {
                done: done.clone(),
                progress: 0,
            },
        );
        done
    }

    fn record_progress(&mut self, key: &DownloadKey, percent: u8) -> bool {
        match self.downloads.get_mut(key) {
            Some(download) => {
                download.progress = percent.min(100);
                true
            }
            None => false,
        }
    }

    /// Remove the record and settle its waiters.
    fn finish(&mut self, key: &DownloadKey, outcome: Readiness) {
        if let Some(download) = self.downloads.remove(key) {
            download.done.set(outcome);
        }
    }
}

impl Queue {
    /// Readiness gate for a new item carrying `media`.
    ///
    /// Joins the in-flight download for the same artifact if there is one,
    /// returns a settled gate if the artifact already exists, and otherwise
    /// starts a preparation job. Never waits on preparation.
    pub(crate) fn request_ready(self: &Arc<Self>, state: &mut QueueState, media: &Media) -> Signal<Readiness> {
        if media.is_internal() {
            return Signal::settled(Readiness::Ready);
        }

        let key = media.download_key();
        if let Some(download) = state.downloads.get(&key) {
            debug!("Joining in-flight download of {} ({})", media.id, media.media_type);
            return download.done.clone();
        }

        if self.artifacts.is_present(media) {
            debug!("Artifact for {} already present", media.id);
            return Signal::settled(Readiness::Ready);
        }

        match self.preparer.prepare(media) {
            Ok(preparation) => {
                info!("Started download of {} ({})", media.title, media.url);
                let done = state.downloads.start(key.clone());
                self.spawn_download(key, preparation);
                done
            }
            Err(e) => {
                error!("Error when downloading media {}: {}", media.title, e);
                Signal::settled(Readiness::Failed(e.to_string()))
            }
        }
    }

    /// Owning task of one preparation job.
    fn spawn_download(self: &Arc<Self>, key: DownloadKey, preparation: Preparation) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let Preparation { mut progress, done } = preparation;

            while let Some(percent) = progress.recv().await {
                let mut state = queue.state.write().await;
                if state.downloads.record_progress(&key, percent) {
                    queue.publish(&state).await;
                }
            }

            let outcome = match done.await {
                Ok(Ok(())) => Readiness::Ready,
                Ok(Err(message)) => Readiness::Failed(message),
                Err(_) => Readiness::Failed("preparation ended without a result".to_string()),
            };
            match &outcome {
                Readiness::Ready => info!("Download of {} ({}) finished", key.id, key.media_type),
                Readiness::Failed(message) => {
                    warn!("Download of {} ({}) failed: {}", key.id, key.media_type, message)
                }
            }

            let mut state = queue.state.write().await;
            state.downloads.finish(&key, outcome);
            queue.publish(&state).await;
        });
    }
}
