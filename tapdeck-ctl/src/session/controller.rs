//! Session controller
//!
//! Consumes presence events one at a time and drives the resolver, the
//! player and the position store:
//!
//! ```text
//! Idle    --Present(id)-->            Resolving --ok--> Playing
//!                                     Resolving --err-> Idle
//! Playing --Absent-->                 Idle      (position saved)
//! Playing --Present(other id)-->      Resolving (old session saved first)
//! any     --Error-->                  unchanged
//! ```

use super::state::SharedSession;
use crate::content::{ContentResolver, LocalCache};
use crate::error::{Error, Result};
use crate::player::{track_uri, Player};
use crate::presence::PresenceEvent;
use std::sync::Arc;
use tapdeck_common::ContentDescriptor;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Token-driven session state machine
pub struct SessionController {
    player: Arc<dyn Player>,
    resolver: Arc<ContentResolver>,
    session: SharedSession,
}

impl SessionController {
    pub fn new(player: Arc<dyn Player>, resolver: Arc<ContentResolver>, session: SharedSession) -> Self {
        Self {
            player,
            resolver,
            session,
        }
    }

    /// Consume presence events until the queue closes
    pub async fn run(&self, mut events: mpsc::Receiver<PresenceEvent>) {
        info!("Session controller started");
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle_event(event).await {
                error!(error = %e, "Session transition failed");
            }
        }
        info!("Presence queue closed, session controller stopped");
    }

    /// Apply one presence event
    pub async fn handle_event(&self, event: PresenceEvent) -> Result<()> {
        match event {
            PresenceEvent::Present { tag_id } => self.on_present(&tag_id).await,
            PresenceEvent::Absent { tag_id } => self.on_absent(&tag_id).await,
            PresenceEvent::Error { message } => {
                warn!(error = %message, "Reader error, session unchanged");
                Ok(())
            }
        }
    }

    async fn on_present(&self, tag_id: &str) -> Result<()> {
        let current = self.session.snapshot().await;
        if current.is_playing() {
            if current.tag_id.as_deref() == Some(tag_id) {
                debug!(tag_id = %tag_id, "Token already playing");
                return Ok(());
            }
            info!(
                tag_id = %tag_id,
                active = current.content_id.as_deref().unwrap_or_default(),
                "New token pre-empts active session"
            );
            self.suspend(current.generation, current.content.as_ref()).await?;
        }

        let generation = self.session.begin_resolving(tag_id).await;
        match self.start(generation, tag_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.session.abandon(generation).await;
                Err(e)
            }
        }
    }

    async fn on_absent(&self, tag_id: &str) -> Result<()> {
        let current = self.session.snapshot().await;
        if !current.is_playing() {
            debug!(tag_id = %tag_id, "Token removed with no active session");
            return Ok(());
        }
        self.suspend(current.generation, current.content.as_ref()).await
    }

    /// Save progress of the playing session, reset it, stop the player
    async fn suspend(&self, generation: u64, content: Option<&ContentDescriptor>) -> Result<()> {
        let ordinal = match content {
            Some(descriptor) => self.current_ordinal(descriptor).await,
            None => None,
        };

        if self.session.end_removed(generation, ordinal).await.is_none() {
            debug!(generation, "Session already ended before removal was handled");
        }

        self.player.stop().await?;
        self.player.clear_queue().await?;
        Ok(())
    }

    /// Ordinal of the player's current track within `descriptor`
    async fn current_ordinal(&self, descriptor: &ContentDescriptor) -> Option<u32> {
        match self.player.current_track().await {
            Ok(Some(track)) => {
                let ordinal = descriptor.ordinal_of_title(&track.title);
                if ordinal.is_none() {
                    warn!(
                        content_id = %descriptor.id,
                        track = %track.title,
                        "Current track not part of active content"
                    );
                }
                ordinal
            }
            Ok(None) => None,
            Err(e) => {
                warn!(content_id = %descriptor.id, error = %e, "Could not query current track, position not saved");
                None
            }
        }
    }

    /// Resolve, materialize and start playback for session `generation`
    async fn start(&self, generation: u64, tag_id: &str) -> Result<()> {
        let resolved = self.resolver.resolve_by_tag_id(tag_id).await?;
        let descriptor = &resolved.descriptor;
        if descriptor.tracks.is_empty() {
            return Err(Error::Resolution(format!(
                "content {} declares no tracks",
                descriptor.id
            )));
        }

        self.player.stop().await?;
        self.player.clear_queue().await?;

        if !resolved.existed_locally {
            info!(content_id = %descriptor.id, "Refreshing player library for new content");
            self.player.refresh_library().await?;
        }

        let start_ordinal = self.session.start_ordinal(descriptor).await;
        let uris = descriptor
            .tracks_from(start_ordinal)
            .into_iter()
            .map(|track| LocalCache::relative_track_path(descriptor, track).map(|p| track_uri(&p)))
            .collect::<Result<Vec<_>>>()?;

        info!(
            content_id = %descriptor.id,
            from = start_ordinal,
            tracks = uris.len(),
            "Starting playback"
        );
        self.player.enqueue(&uris).await?;
        self.player.play().await?;

        if !self.session.mark_playing(generation, descriptor, start_ordinal).await {
            warn!(content_id = %descriptor.id, "Session superseded while starting playback");
        }
        Ok(())
    }
}
