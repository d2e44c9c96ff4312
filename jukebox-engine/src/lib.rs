//! # Jukebox Engine Library
//!
//! Queue/player concurrency core of the shared jukebox.
//!
//! **Purpose:** Order submitted media fairly between clients, prepare each
//! artifact exactly once no matter how many clients ask for it, and play the
//! head of the queue on a single shared output.
//!
//! **Architecture:** One [`Queue`] (ordered items, download tracker, update
//! channel) drives one [`Player`] (state machine around a playback backend).
//! Preparation and playback are external collaborators behind the traits in
//! [`backend`].

pub mod backend;
pub mod error;
pub mod item;
pub mod player;
pub mod queue;
pub mod scheduler;
pub mod signal;

pub use error::{Error, Result};
pub use item::{QueueItem, Readiness};
pub use player::{Player, PlayerSettings};
pub use queue::{Queue, QueueSettings};
pub use scheduler::Policy;
pub use signal::Signal;
