//! Shared session state
//!
//! Session identity and the position store sit behind a single mutex. Both
//! the controller and the tracker go through [`SharedSession`]; every
//! read-then-write sequence is one method, so it runs under one lock
//! acquisition. Remote calls are never made while the lock is held.
//!
//! Every session start and every return to idle bumps `generation`. A loop
//! that observed the session, went off to talk to the player, and comes back
//! to write must present the generation it observed; if the session changed
//! in between, the write is dropped.

use crate::error::Result;
use crate::store::PositionStore;
use std::sync::Arc;
use tapdeck_common::ContentDescriptor;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Resolving,
    Playing,
}

/// The single mutable session
///
/// `content_id` is set iff `status` is not `Idle`. While resolving it holds
/// the token id; once playing, the resolved content id.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub tag_id: Option<String>,
    pub content_id: Option<String>,
    pub content: Option<ContentDescriptor>,
    /// Bumped on every session start and every return to idle
    pub generation: u64,
}

impl SessionState {
    fn reset(&mut self) {
        self.generation += 1;
        self.status = SessionStatus::Idle;
        self.tag_id = None;
        self.content_id = None;
        self.content = None;
    }

    pub fn is_playing(&self) -> bool {
        self.status == SessionStatus::Playing
    }
}

struct Ledger {
    session: SessionState,
    store: PositionStore,
}

/// Lock-guarded session plus position store, shared by both loops
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedSession {
    pub fn new(store: PositionStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Ledger {
                session: SessionState::default(),
                store,
            })),
        }
    }

    /// Copy of the current session
    pub async fn snapshot(&self) -> SessionState {
        self.inner.lock().await.session.clone()
    }

    /// Start a new session for `tag_id`; returns its generation
    pub async fn begin_resolving(&self, tag_id: &str) -> u64 {
        let mut ledger = self.inner.lock().await;
        let session = &mut ledger.session;
        session.generation += 1;
        session.status = SessionStatus::Resolving;
        session.tag_id = Some(tag_id.to_string());
        session.content_id = Some(tag_id.to_string());
        session.content = None;
        debug!(tag_id = %tag_id, generation = session.generation, "Session resolving");
        session.generation
    }

    /// Ordinal playback should start from
    ///
    /// The stored ordinal if it names a declared track, else the first track.
    pub async fn start_ordinal(&self, descriptor: &ContentDescriptor) -> u32 {
        let ledger = self.inner.lock().await;
        match ledger.store.get(&descriptor.id) {
            Some(ord) if descriptor.contains_ordinal(ord) => ord,
            Some(ord) => {
                warn!(content_id = %descriptor.id, ordinal = ord, "Stored ordinal out of range, starting from the beginning");
                descriptor.first_ordinal()
            }
            None => descriptor.first_ordinal(),
        }
    }

    /// Mark the session `generation` as playing `descriptor`
    ///
    /// Writes a position record with `start_ordinal` if none exists yet.
    /// Returns `false` if the session moved on in the meantime.
    pub async fn mark_playing(
        &self,
        generation: u64,
        descriptor: &ContentDescriptor,
        start_ordinal: u32,
    ) -> bool {
        let mut ledger = self.inner.lock().await;
        if ledger.session.generation != generation {
            return false;
        }

        if !ledger.store.exists(&descriptor.id) {
            if let Err(e) = ledger.store.set(
                &descriptor.id,
                &descriptor.artist,
                &descriptor.title,
                start_ordinal,
            ) {
                warn!(content_id = %descriptor.id, error = %e, "Failed to persist initial position");
            }
        }

        let session = &mut ledger.session;
        session.status = SessionStatus::Playing;
        session.content_id = Some(descriptor.id.clone());
        session.content = Some(descriptor.clone());
        info!(content_id = %descriptor.id, ordinal = start_ordinal, generation, "Session playing");
        true
    }

    /// Drop session `generation` back to idle if it is still current
    pub async fn abandon(&self, generation: u64) {
        let mut ledger = self.inner.lock().await;
        if ledger.session.generation == generation && ledger.session.status != SessionStatus::Idle {
            debug!(generation, "Session abandoned");
            ledger.session.reset();
        }
    }

    /// End a playing session because its token was removed
    ///
    /// Persists `ordinal` (if any) for the active content and resets to idle,
    /// all under one lock. Returns the content that was active, or `None` if
    /// session `generation` is no longer playing.
    pub async fn end_removed(
        &self,
        generation: u64,
        ordinal: Option<u32>,
    ) -> Option<ContentDescriptor> {
        let mut ledger = self.inner.lock().await;
        if ledger.session.generation != generation || !ledger.session.is_playing() {
            return None;
        }

        let content = ledger.session.content.take();
        if let (Some(descriptor), Some(ord)) = (&content, ordinal) {
            if let Err(e) = ledger
                .store
                .set(&descriptor.id, &descriptor.artist, &descriptor.title, ord)
            {
                warn!(content_id = %descriptor.id, error = %e, "Failed to persist position");
            } else {
                info!(content_id = %descriptor.id, ordinal = ord, "Position saved");
            }
        }

        ledger.session.reset();
        content
    }

    /// End a playing session because the player ran out of tracks
    ///
    /// Removes the position record and resets to idle if session
    /// `generation` is still playing. Returns the ended content id.
    pub async fn end_naturally(&self, generation: u64) -> Option<String> {
        let mut ledger = self.inner.lock().await;
        if ledger.session.generation != generation || !ledger.session.is_playing() {
            return None;
        }

        let content_id = ledger.session.content_id.clone()?;
        if let Err(e) = ledger.store.remove(&content_id) {
            warn!(content_id = %content_id, error = %e, "Failed to remove finished position");
        }
        ledger.session.reset();
        info!(content_id = %content_id, "Content finished");
        Some(content_id)
    }

    /// Create or update a position record
    ///
    /// Skipped (returns `Ok(false)`) if the session generation changed since
    /// `observed_generation`.
    pub async fn record_progress(
        &self,
        observed_generation: u64,
        descriptor: &ContentDescriptor,
        ordinal: u32,
    ) -> Result<bool> {
        let mut ledger = self.inner.lock().await;
        if ledger.session.generation != observed_generation {
            debug!(content_id = %descriptor.id, "Session changed, dropping stale progress");
            return Ok(false);
        }
        if ledger.store.get(&descriptor.id) == Some(ordinal) {
            return Ok(true);
        }
        ledger
            .store
            .set(&descriptor.id, &descriptor.artist, &descriptor.title, ordinal)?;
        Ok(true)
    }

    /// Stored ordinal for a content id
    pub async fn stored_ordinal(&self, content_id: &str) -> Option<u32> {
        self.inner.lock().await.store.get(content_id)
    }
}
