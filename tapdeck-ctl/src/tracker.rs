//! Position tracker
//!
//! Polls the player on a fixed interval for the whole process lifetime.
//! While a track is loaded its ordinal is written to the position store;
//! when the player has nothing loaded but a session is still playing, the
//! content ran to its end: the record is removed, the queue cleared and the
//! session reset.

use crate::content::ContentResolver;
use crate::error::{Error, Result};
use crate::player::Player;
use crate::session::SharedSession;
use std::sync::Arc;
use std::time::Duration;
use tapdeck_common::ContentDescriptor;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What one tracker tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing loaded and no session playing
    Idle,
    /// Progress written for a content id
    Recorded { content_id: String, ordinal: u32 },
    /// The loaded track does not belong to any known content
    Untracked,
    /// A session ended naturally
    Finished { content_id: String },
    /// The session changed during the tick; nothing written
    Stale,
}

/// Fixed-interval player poller
pub struct PositionTracker {
    player: Arc<dyn Player>,
    resolver: Arc<ContentResolver>,
    session: SharedSession,
    period: Duration,
}

impl PositionTracker {
    pub fn new(
        player: Arc<dyn Player>,
        resolver: Arc<ContentResolver>,
        session: SharedSession,
        period: Duration,
    ) -> Self {
        Self {
            player,
            resolver,
            session,
            period,
        }
    }

    /// Tick forever; errors are logged and the loop carries on
    pub async fn run(self) {
        info!(interval_ms = self.period.as_millis() as u64, "Position tracker started");
        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            match self.tick().await {
                Ok(outcome) => debug!(?outcome, "Tracker tick"),
                Err(e) => warn!(error = %e, "Tracker tick failed"),
            }
        }
    }

    /// One poll of the player
    pub async fn tick(&self) -> Result<TickOutcome> {
        let observed = self.session.snapshot().await;

        let Some(track) = self.player.current_track().await? else {
            if !observed.is_playing() {
                return Ok(TickOutcome::Idle);
            }
            return match self.session.end_naturally(observed.generation).await {
                Some(content_id) => {
                    self.player.clear_queue().await?;
                    Ok(TickOutcome::Finished { content_id })
                }
                None => Ok(TickOutcome::Stale),
            };
        };

        let descriptor = match observed
            .content
            .filter(|c| c.artist == track.artist && c.title == track.album)
        {
            Some(active) => active,
            None => match self.lookup(&track.artist, &track.album).await? {
                Some(found) => found,
                None => return Ok(TickOutcome::Untracked),
            },
        };

        let Some(ordinal) = descriptor.ordinal_of_title(&track.title) else {
            debug!(content_id = %descriptor.id, track = %track.title, "Loaded track not in content");
            return Ok(TickOutcome::Untracked);
        };

        if self
            .session
            .record_progress(observed.generation, &descriptor, ordinal)
            .await?
        {
            Ok(TickOutcome::Recorded {
                content_id: descriptor.id,
                ordinal,
            })
        } else {
            Ok(TickOutcome::Stale)
        }
    }

    async fn lookup(&self, artist: &str, album: &str) -> Result<Option<ContentDescriptor>> {
        match self.resolver.find_by_artist_title(artist, album).await {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(Error::Resolution(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
