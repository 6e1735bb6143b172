//! Playback service boundary
//!
//! The controller never decodes audio; it drives an external player. Every
//! command failure is returned as an error and never used as control flow.

mod mopidy;
mod uri;

pub use mopidy::MopidyClient;
pub use uri::track_uri;

use crate::error::Result;
use async_trait::async_trait;

/// Track the player currently has loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentTrack {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub uri: String,
}

/// Remote playback command/query service
#[async_trait]
pub trait Player: Send + Sync {
    /// Currently loaded track, `None` when nothing is playing
    async fn current_track(&self) -> Result<Option<CurrentTrack>>;

    async fn play(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn clear_queue(&self) -> Result<()>;

    /// Append track URIs to the queue, in order
    async fn enqueue(&self, uris: &[String]) -> Result<()>;

    /// Make the player pick up newly cached content
    async fn refresh_library(&self) -> Result<()>;
}
