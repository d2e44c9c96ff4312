//! Test helper modules for jukebox engine integration tests
//!
//! Provides reusable test infrastructure components:
//! - ScriptedPreparer: preparation jobs completed or failed by the test
//! - ScriptedPlayback: playback sessions that end on command
//! - TestJukebox: queue + player wired to both, with drained update channels

#![allow(dead_code)]

pub mod scripted_playback;
pub mod scripted_preparer;
pub mod test_jukebox;

pub use scripted_playback::{PlaybackLog, ScriptedPlayback};
pub use scripted_preparer::ScriptedPreparer;
pub use test_jukebox::{media, TestJukebox};
