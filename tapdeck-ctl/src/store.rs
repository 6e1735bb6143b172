//! Position store
//!
//! Durable content id → progress mapping, kept as one pretty-printed JSON
//! array. Every mutation rewrites the whole document. The store does no
//! locking of its own: it is only ever reached through the session lock.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tapdeck_common::PositionRecord;
use tracing::{debug, info};

/// JSON-file backed position store
#[derive(Debug)]
pub struct PositionStore {
    path: PathBuf,
    records: Vec<PositionRecord>,
}

impl PositionStore {
    /// Open the store, loading `path` if it exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::Persistence(format!("corrupt position store {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        info!(path = %path.display(), records = records.len(), "Position store opened");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    /// Stored ordinal for `id`
    pub fn get(&self, id: &str) -> Option<u32> {
        self.find(id).map(|r| r.current_ord)
    }

    pub fn get_artist_and_title(&self, id: &str) -> Option<(&str, &str)> {
        self.find(id).map(|r| (r.artist.as_str(), r.title.as_str()))
    }

    /// Create or update the record for `id`
    pub fn set(&mut self, id: &str, artist: &str, title: &str, ordinal: u32) -> Result<()> {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                debug!(content_id = %id, ordinal, "Updating stored position");
                record.current_ord = ordinal;
            }
            None => {
                debug!(content_id = %id, ordinal, "Storing new position");
                self.records.push(PositionRecord {
                    id: id.to_string(),
                    artist: artist.to_string(),
                    title: title.to_string(),
                    current_ord: ordinal,
                });
            }
        }
        self.persist()
    }

    /// Update the ordinal of an existing record only
    pub fn set_ord(&mut self, id: &str, ordinal: u32) -> Result<()> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::Persistence(format!("no stored position for {}", id)))?;
        record.current_ord = ordinal;
        self.persist()
    }

    /// Remove the record for `id`; returns whether one existed
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            return Ok(false);
        }
        info!(content_id = %id, "Removed stored position");
        self.persist()?;
        Ok(true)
    }

    pub fn records(&self) -> &[PositionRecord] {
        &self.records
    }

    fn find(&self, id: &str) -> Option<&PositionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn persist(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.records)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        std::fs::write(&self.path, bytes).map_err(|e| {
            Error::Persistence(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}
