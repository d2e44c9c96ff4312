//! Configuration loading
//!
//! Resolution priority, highest first:
//! 1. Command-line flags (applied by the binary after loading)
//! 2. `JUKEBOX_*` environment variables
//! 3. TOML config file
//! 4. Compiled defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "JUKEBOX_";

/// Process-wide configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root folder for prepared artifacts
    pub data_dir: PathBuf,
    /// Transcode video to mp4 instead of keeping the downloaded container
    pub video_transcoding: bool,
    /// Format selector handed to the downloader
    pub download_format: String,
    /// Extractors that clients may submit URLs for
    pub allowed_types: Vec<String>,
    /// Default log filter when RUST_LOG is unset
    pub verbosity: String,
    /// Interval of the unconditional player snapshot
    pub heartbeat_secs: u64,
    /// Volume change per UpVolume/DownVolume call
    pub volume_step: u8,
    /// Capacity of each update channel
    pub update_capacity: usize,
    /// Downloader program
    pub downloader: String,
    /// ffmpeg program
    pub ffmpeg: String,
    /// Audio file installed as the "be quiet" placeholder artifact
    pub quiet_asset: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/jukebox"),
            video_transcoding: true,
            download_format: "bestvideo+bestaudio/best".to_string(),
            allowed_types: vec!["soundcloud".to_string(), "youtube".to_string()],
            verbosity: "info".to_string(),
            heartbeat_secs: 30,
            volume_step: 5,
            update_capacity: 1,
            downloader: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            quiet_asset: None,
        }
    }
}

impl Config {
    /// Load configuration from the config file (if any) and the process
    /// environment.
    ///
    /// An explicitly requested file must exist; otherwise a missing file just
    /// means compiled defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_file() {
                Some(path) => Self::from_file(&path)?,
                None => {
                    info!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config file {}", path.display());
        Ok(config)
    }

    /// Parse TOML text; absent keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `JUKEBOX_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("VIDEO_TRANSCODING") {
            self.video_transcoding = parse_bool("VIDEO_TRANSCODING", &v)?;
        }
        if let Some(v) = var("DOWNLOAD_FORMAT") {
            self.download_format = v;
        }
        if let Some(v) = var("ALLOWED_TYPES") {
            self.allowed_types = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = var("VERBOSITY") {
            self.verbosity = v;
        }
        if let Some(v) = var("HEARTBEAT_SECS") {
            self.heartbeat_secs = parse_number("HEARTBEAT_SECS", &v)?;
        }
        if let Some(v) = var("VOLUME_STEP") {
            self.volume_step = parse_number("VOLUME_STEP", &v)?;
        }
        if let Some(v) = var("UPDATE_CAPACITY") {
            self.update_capacity = parse_number("UPDATE_CAPACITY", &v)?;
        }
        if let Some(v) = var("DOWNLOADER") {
            self.downloader = v;
        }
        if let Some(v) = var("FFMPEG") {
            self.ffmpeg = v;
        }
        if let Some(v) = var("QUIET_ASSET") {
            self.quiet_asset = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_secs == 0 {
            return Err(Error::Config("heartbeat_secs must be at least 1".to_string()));
        }
        if self.update_capacity == 0 {
            return Err(Error::Config("update_capacity must be at least 1".to_string()));
        }
        if self.volume_step == 0 || self.volume_step > 100 {
            return Err(Error::Config("volume_step must be within 1..=100".to_string()));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

/// Find the first existing config file in the platform search path:
/// `<config_dir>/jukebox/config.toml`, then `/etc/jukebox/config.toml`.
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("jukebox").join("config.toml"));
    let system_config = PathBuf::from("/etc/jukebox/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|path| {
            let exists = path.exists();
            debug!("Config candidate {} exists: {}", path.display(), exists);
            exists
        })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{ENV_PREFIX}{name}: not a boolean: {other:?}"))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{ENV_PREFIX}{name}: not a number: {value:?}")))
}
