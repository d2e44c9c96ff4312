//! Media value type
//!
//! Media records are owned by the catalog outside the engine. The engine only
//! reads them, so `Media` is a plain value that is cloned freely.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Media type used for built-in media that is never downloaded.
pub const INTERNAL_TYPE: &str = "internal";

/// Identifier of the built-in "be quiet" placeholder.
pub const BE_QUIET_ID: &str = "bequiet";

/// A playable media reference
///
/// Identity is `(id, media_type)`. `length` is the duration in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub length: u64,
    pub title: String,
    pub video: bool,
    pub url: String,
}

impl Media {
    /// The built-in placeholder played by the "be quiet" interrupt.
    pub fn be_quiet() -> Self {
        Self {
            id: BE_QUIET_ID.to_string(),
            media_type: INTERNAL_TYPE.to_string(),
            length: 0,
            title: "Be Quiet".to_string(),
            video: false,
            url: String::new(),
        }
    }

    /// Internal media ships with the application and needs no preparation.
    pub fn is_internal(&self) -> bool {
        self.media_type == INTERNAL_TYPE
    }

    /// Key identifying the on-disk artifact prepared for this media.
    pub fn download_key(&self) -> DownloadKey {
        DownloadKey {
            id: self.id.clone(),
            media_type: self.media_type.clone(),
            video: self.video,
        }
    }

    /// Artifact file extension.
    ///
    /// Audio is always stored as Opus. Video is either transcoded to mp4 or
    /// kept in whatever container the downloader produced.
    pub fn artifact_extension(&self, video_transcoding: bool) -> &'static str {
        match (self.video, video_transcoding) {
            (false, _) => "opus",
            (true, true) => "mp4",
            (true, false) => "video",
        }
    }

    /// Resolve `<data_dir>/<type>/<id>.<ext>`.
    pub fn artifact_path(&self, data_dir: &Path, video_transcoding: bool) -> PathBuf {
        data_dir
            .join(&self.media_type)
            .join(format!("{}.{}", self.id, self.artifact_extension(video_transcoding)))
    }
}

/// Identity of a prepared artifact: `(media id, media type, video flag)`
///
/// The same media requested as audio and as video produces two artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadKey {
    pub id: String,
    pub media_type: String,
    pub video: bool,
}
