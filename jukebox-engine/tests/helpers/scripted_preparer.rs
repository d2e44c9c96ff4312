//! Preparation backend driven by the test
//!
//! `prepare` registers a job per media id and returns immediately. The test
//! then reports progress and completes or fails the job.

use async_trait::async_trait;
use jukebox_common::Media;
use jukebox_engine::backend::{Preparation, Preparer};
use jukebox_engine::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

struct Job {
    progress: mpsc::Sender<u8>,
    done: oneshot::Sender<std::result::Result<(), String>>,
}

#[derive(Default)]
pub struct ScriptedPreparer {
    jobs: Mutex<HashMap<String, Job>>,
    refuse: Mutex<HashSet<String>>,
    prepare_calls: AtomicUsize,
}

impl ScriptedPreparer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of `prepare` calls so far, including refused ones.
    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    pub fn has_job(&self, media_id: &str) -> bool {
        self.jobs.lock().unwrap().contains_key(media_id)
    }

    /// Make `prepare` fail to start a job for `media_id`.
    pub fn refuse(&self, media_id: &str) {
        self.refuse.lock().unwrap().insert(media_id.to_string());
    }

    pub async fn report_progress(&self, media_id: &str, percent: u8) {
        let progress = self
            .jobs
            .lock()
            .unwrap()
            .get(media_id)
            .map(|job| job.progress.clone())
            .unwrap_or_else(|| panic!("no job for {media_id}"));
        progress.send(percent).await.unwrap();
    }

    pub fn complete(&self, media_id: &str) {
        self.finish(media_id, Ok(()));
    }

    pub fn fail(&self, media_id: &str, message: &str) {
        self.finish(media_id, Err(message.to_string()));
    }

    fn finish(&self, media_id: &str, result: std::result::Result<(), String>) {
        let job = self
            .jobs
            .lock()
            .unwrap()
            .remove(media_id)
            .unwrap_or_else(|| panic!("no job for {media_id}"));
        drop(job.progress);
        let _ = job.done.send(result);
    }
}

#[async_trait]
impl Preparer for ScriptedPreparer {
    async fn info(&self, url: &str, video: bool) -> Result<Media> {
        let id = url
            .rsplit('=')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Preparation(format!("no id in {url}")))?;
        Ok(Media {
            video,
            ..media_for(id)
        })
    }

    async fn validate_url(&self, url: &str) -> bool {
        url.starts_with("https://www.youtube.com/")
    }

    fn prepare(&self, media: &Media) -> Result<Preparation> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse.lock().unwrap().contains(&media.id) {
            return Err(Error::Preparation(format!("cannot start job for {}", media.id)));
        }

        let (preparation, progress, done) = Preparation::channel();
        self.jobs
            .lock()
            .unwrap()
            .insert(media.id.clone(), Job { progress, done });
        Ok(preparation)
    }
}

fn media_for(id: &str) -> Media {
    super::media(id, 1_000)
}
