//! Preparation through external programs
//!
//! Media info and downloads come from a youtube-dl compatible downloader
//! (yt-dlp by default); transcoding is done by ffmpeg. Progress is reported
//! as 0-50 for the download and 50-100 for the transcode.

use super::{Preparation, Preparer};
use crate::{Error, Result};
use async_trait::async_trait;
use jukebox_common::{Config, Media};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Preparer backed by the downloader and ffmpeg executables
#[derive(Debug, Clone)]
pub struct ProcessPreparer {
    downloader: String,
    ffmpeg: String,
    download_format: String,
    allowed_types: Vec<String>,
    data_dir: PathBuf,
    temp_dir: PathBuf,
    video_transcoding: bool,
}

/// Fields read from the downloader's `--dump-json` output
#[derive(Debug, Deserialize)]
struct InfoJson {
    id: String,
    title: String,
    extractor: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
}

impl ProcessPreparer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            downloader: config.downloader.clone(),
            ffmpeg: config.ffmpeg.clone(),
            download_format: config.download_format.clone(),
            allowed_types: config.allowed_types.clone(),
            data_dir: config.data_dir.clone(),
            temp_dir: std::env::temp_dir().join("jukebox"),
            video_transcoding: config.video_transcoding,
        }
    }

    async fn run_downloader(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.downloader)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Preparation(format!("cannot run {}: {}", self.downloader, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Preparation(format!(
                "{} exited with {}: {}",
                self.downloader,
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Use `dir` for temporary downloads instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Download, then transcode or copy into the artifact path.
    ///
    /// Every job downloads into its own scratch directory, removed when the
    /// job ends whatever the outcome, so jobs for the audio and video
    /// artifacts of one media never see each other's files.
    async fn run_job(self, media: Media, progress: mpsc::Sender<u8>) -> Result<()> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", media.media_type, media.id))
            .tempdir_in(&self.temp_dir)?;

        let downloaded = self.download(&media, scratch.path(), &progress).await?;
        debug!("Downloaded {} to {}", media.url, downloaded.display());

        let target = media.artifact_path(&self.data_dir, self.video_transcoding);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(&target);

        let converted = if !media.video || self.video_transcoding {
            self.transcode(&media, &downloaded, &partial, &progress).await
        } else {
            debug!("Video transcoding disabled, copying {}", downloaded.display());
            tokio::fs::copy(&downloaded, &partial).await.map(|_| ()).map_err(Error::from)
        };
        let result = match converted {
            Ok(()) => tokio::fs::rename(&partial, &target).await.map_err(Error::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            if let Err(remove) = tokio::fs::remove_file(&partial).await {
                debug!("No partial file {} to remove: {}", partial.display(), remove);
            }
            return Err(e);
        }

        if let Err(e) = scratch.close() {
            warn!("Could not remove temporary directory for {}: {}", media.id, e);
        }
        info!(
            "Prepared media {} ({}) at {}",
            media.id,
            media.media_type,
            target.display()
        );
        Ok(())
    }

    /// Run the downloader into `dir` and return the file it produced.
    async fn download(&self, media: &Media, dir: &Path, progress: &mpsc::Sender<u8>) -> Result<PathBuf> {
        let template = dir.join(format!("{}.%(ext)s", media.id));
        let mut child = Command::new(&self.downloader)
            .arg("--newline")
            .arg("--no-playlist")
            .arg("-f")
            .arg(&self.download_format)
            .arg("-o")
            .arg(&template)
            .arg(&media.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Preparation(format!("cannot run {}: {}", self.downloader, e)))?;

        if let Some(stdout) = child.stdout.take() {
            relay_progress(stdout, progress, |line| {
                parse_download_percent(line).map(|p| (p / 2.0) as u8)
            })
            .await;
        }
        let status = child.wait().await?;
        if !status.success() {
            return Err(Error::Preparation(format!(
                "{} exited with {} for {}",
                self.downloader, status, media.url
            )));
        }
        find_download(dir, &media.id).await
    }

    async fn transcode(
        &self,
        media: &Media,
        input: &Path,
        output: &Path,
        progress: &mpsc::Sender<u8>,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-nostats")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-c:a")
            .arg("libopus");
        if media.video {
            // Opus in mp4 still needs the experimental flag
            cmd.arg("-c:v").arg("libx264").arg("-strict").arg("-2").arg("-f").arg("mp4");
        } else {
            cmd.arg("-vn").arg("-f").arg("opus");
        }
        cmd.arg("-progress").arg("pipe:1").arg(output);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Preparation(format!("cannot run {}: {}", self.ffmpeg, e)))?;
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut tail = String::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tail = line;
                }
            }
            tail
        });

        if let Some(stdout) = child.stdout.take() {
            let length = media.length;
            relay_progress(stdout, progress, |line| {
                parse_transcode_percent(line, length).map(|p| 50 + (p / 2.0) as u8)
            })
            .await;
        }
        let status = child.wait().await?;
        let last_error = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(Error::Preparation(format!(
                "{} exited with {}: {}",
                self.ffmpeg, status, last_error
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Preparer for ProcessPreparer {
    async fn info(&self, url: &str, video: bool) -> Result<Media> {
        let stdout = self.run_downloader(&["--dump-json", "--no-playlist", url]).await?;
        let info: InfoJson = serde_json::from_str(stdout.trim())?;
        Ok(media_from_info(info, url, video))
    }

    async fn validate_url(&self, url: &str) -> bool {
        match self
            .run_downloader(&["--no-playlist", "--simulate", "--print", "extractor", url])
            .await
        {
            Ok(stdout) => extractor_allowed(stdout.trim(), &self.allowed_types),
            Err(e) => {
                warn!("Could not determine extractor for {}: {}", url, e);
                false
            }
        }
    }

    fn prepare(&self, media: &Media) -> Result<Preparation> {
        let (preparation, progress_tx, done_tx) = Preparation::channel();
        let job = self.clone();
        let media = media.clone();
        tokio::spawn(async move {
            let title = media.title.clone();
            let result = job.run_job(media, progress_tx).await.map_err(|e| {
                error!("Preparation of {} failed: {}", title, e);
                e.to_string()
            });
            let _ = done_tx.send(result);
        });
        Ok(preparation)
    }
}

fn media_from_info(info: InfoJson, url: &str, video: bool) -> Media {
    let video = video && info.vcodec.as_deref() != Some("none");
    Media {
        id: info.id,
        media_type: extractor_base(&info.extractor),
        length: info
            .duration
            .map(|secs| (secs * 1000.0).round() as u64)
            .unwrap_or(0),
        title: info.title,
        video,
        url: info.webpage_url.unwrap_or_else(|| url.to_string()),
    }
}

/// `youtube:tab` -> `youtube`
fn extractor_base(extractor: &str) -> String {
    extractor
        .split(':')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn extractor_allowed(extractor: &str, allowed: &[String]) -> bool {
    let base = extractor_base(extractor);
    if base.is_empty() || base == "generic" {
        return false;
    }
    allowed.iter().any(|t| t.eq_ignore_ascii_case(&base))
}

/// `[download]  42.7% of 3.21MiB at ...` -> 42.7
fn parse_download_percent(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("[download]")?;
    let token = rest.split_whitespace().next()?;
    let percent: f64 = token.strip_suffix('%')?.parse().ok()?;
    Some(percent.clamp(0.0, 100.0))
}

/// ffmpeg `-progress` key `out_time_us` (or the misnamed `out_time_ms`, also
/// microseconds) against the media length in milliseconds.
fn parse_transcode_percent(line: &str, length_ms: u64) -> Option<f64> {
    if length_ms == 0 {
        return None;
    }
    let (key, value) = line.trim().split_once('=')?;
    if key != "out_time_us" && key != "out_time_ms" {
        return None;
    }
    let micros: f64 = value.parse().ok()?;
    let percent = micros / 1000.0 / length_ms as f64 * 100.0;
    Some(percent.clamp(0.0, 100.0))
}

async fn relay_progress<R, F>(reader: R, progress: &mpsc::Sender<u8>, parse: F)
where
    R: AsyncRead + Unpin,
    F: Fn(&str) -> Option<u8>,
{
    let mut lines = BufReader::new(reader).lines();
    let mut last = None;
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(percent) = parse(&line) {
            if last != Some(percent) {
                last = Some(percent);
                let _ = progress.send(percent).await;
            }
        }
    }
}

/// Locate the downloader's output: the file named `<id>.<ext>`.
async fn find_download(dir: &Path, id: &str) -> Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_match = path.file_stem().and_then(|s| s.to_str()) == Some(id)
            && path.extension().and_then(|e| e.to_str()) != Some("part");
        if is_match {
            return Ok(path);
        }
    }
    Err(Error::Preparation(format!(
        "downloaded file for {} not found in {}",
        id,
        dir.display()
    )))
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
