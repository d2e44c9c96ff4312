//! # Jukebox Common Library
//!
//! Shared code for the jukebox crates:
//! - Media value type and download identity
//! - Snapshot types published on the queue and player update channels
//! - Client-facing control helpers (owner derivation, move instructions)
//! - Configuration loading

pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod media;

pub use config::Config;
pub use error::{Error, Result};
pub use media::{DownloadKey, Media};
