//! Error types for jukebox-engine
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for jukebox-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Operation not allowed in the current player state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Playback backend errors (session setup, load, transport control)
    #[error("Playback backend error: {0}")]
    Backend(String),

    /// Preparation backend errors (download, transcode, info lookup)
    #[error("Preparation error: {0}")]
    Preparation(String),

    /// Unparseable media info from the downloader
    #[error("Invalid media info: {0}")]
    MediaInfo(#[from] serde_json::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared configuration and input errors
    #[error(transparent)]
    Common(#[from] jukebox_common::Error),
}

/// Convenience Result type using jukebox-engine Error
pub type Result<T> = std::result::Result<T, Error>;
