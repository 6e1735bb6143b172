//! Content manifest and position record models
//!
//! The manifest is the remote JSON document listing every known content set
//! and where its archive lives. Field names follow the manifest wire format
//! (`baseURL`, `archiveFile`, `ord`), not Rust naming.

use serde::{Deserialize, Serialize};

/// A single track within a content set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// 1-based position within the content
    #[serde(rename = "ord")]
    pub ordinal: u32,
    pub title: String,
    /// File name inside the archive and inside the local cache directory
    pub filename: String,
}

/// Content set resolved from the manifest
///
/// Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub id: String,
    #[serde(rename = "Artist", alias = "artist")]
    pub artist: String,
    pub title: String,
    /// Archive location relative to the manifest's base URL
    #[serde(rename = "archiveFile")]
    pub archive_ref: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl ContentDescriptor {
    /// Whether a token id refers to this content.
    ///
    /// Tokens may carry more bytes than the manifest id, so the manifest id
    /// only has to be a prefix of the token id. Empty ids never match.
    pub fn matches_tag(&self, tag_id: &str) -> bool {
        !self.id.is_empty() && tag_id.starts_with(&self.id)
    }

    /// Tracks ordered by ordinal
    pub fn ordered_tracks(&self) -> Vec<&Track> {
        let mut tracks: Vec<&Track> = self.tracks.iter().collect();
        tracks.sort_by_key(|t| t.ordinal);
        tracks
    }

    /// Tracks from `ordinal` (inclusive) to the end, in ordinal order
    pub fn tracks_from(&self, ordinal: u32) -> Vec<&Track> {
        self.ordered_tracks()
            .into_iter()
            .filter(|t| t.ordinal >= ordinal)
            .collect()
    }

    /// Map a track title to its ordinal (exact match, first match wins)
    pub fn ordinal_of_title(&self, title: &str) -> Option<u32> {
        self.ordered_tracks()
            .into_iter()
            .find(|t| t.title == title)
            .map(|t| t.ordinal)
    }

    /// Whether `ordinal` points at a declared track
    pub fn contains_ordinal(&self, ordinal: u32) -> bool {
        self.tracks.iter().any(|t| t.ordinal == ordinal)
    }

    /// First ordinal of the content (1 for well-formed manifests)
    pub fn first_ordinal(&self) -> u32 {
        self.tracks.iter().map(|t| t.ordinal).min().unwrap_or(1)
    }
}

/// Remote content manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "baseURL", alias = "baseUrl")]
    pub base_url: String,
    #[serde(default)]
    pub books: Vec<ContentDescriptor>,
}

impl Manifest {
    /// First entry whose id is a prefix of `tag_id`
    pub fn find_by_tag(&self, tag_id: &str) -> Option<&ContentDescriptor> {
        self.books.iter().find(|b| b.matches_tag(tag_id))
    }

    /// Exact artist/title lookup
    pub fn find_by_artist_title(&self, artist: &str, title: &str) -> Option<&ContentDescriptor> {
        self.books
            .iter()
            .find(|b| b.artist == artist && b.title == title)
    }

    /// Full archive URL for a descriptor
    pub fn archive_url(&self, descriptor: &ContentDescriptor) -> String {
        format!("{}{}", self.base_url, descriptor.archive_ref)
    }
}

/// Persisted playback progress for one content id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: String,
    pub artist: String,
    pub title: String,
    #[serde(rename = "currentOrd")]
    pub current_ord: u32,
}
