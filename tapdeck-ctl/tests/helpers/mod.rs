//! Test helpers for tapdeck-ctl integration tests
//!
//! Provides:
//! - FakePlayer: records every command, serves a scripted current track
//! - content fixtures: descriptors, zip archives, a wiremock manifest server

#![allow(dead_code)]

use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tapdeck_common::{ContentDescriptor, Manifest, Track};
use tapdeck_ctl::content::{ContentResolver, Fetcher, LocalCache};
use tapdeck_ctl::player::{track_uri, CurrentTrack, Player};
use tapdeck_ctl::{Error, Result};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

/// One recorded player command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    CurrentTrack,
    Play,
    Stop,
    ClearQueue,
    Enqueue(Vec<String>),
    RefreshLibrary,
}

/// In-memory player
#[derive(Default)]
pub struct FakePlayer {
    calls: Mutex<Vec<PlayerCall>>,
    current: Mutex<Option<CurrentTrack>>,
    fail_play: AtomicBool,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_current(&self, track: Option<CurrentTrack>) {
        *self.current.lock().unwrap() = track;
    }

    pub fn fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded commands, ignoring current-track queries
    pub fn commands(&self) -> Vec<PlayerCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != PlayerCall::CurrentTrack)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn enqueued(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlayerCall::Enqueue(uris) => Some(uris),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlayerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Player for FakePlayer {
    async fn current_track(&self) -> Result<Option<CurrentTrack>> {
        self.record(PlayerCall::CurrentTrack);
        Ok(self.current.lock().unwrap().clone())
    }

    async fn play(&self) -> Result<()> {
        self.record(PlayerCall::Play);
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(Error::PlayerCommand("play refused".to_string()));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(PlayerCall::Stop);
        self.set_current(None);
        Ok(())
    }

    async fn clear_queue(&self) -> Result<()> {
        self.record(PlayerCall::ClearQueue);
        Ok(())
    }

    async fn enqueue(&self, uris: &[String]) -> Result<()> {
        self.record(PlayerCall::Enqueue(uris.to_vec()));
        Ok(())
    }

    async fn refresh_library(&self) -> Result<()> {
        self.record(PlayerCall::RefreshLibrary);
        Ok(())
    }
}

/// Content with `tracks` tracks titled "Kapitel <n>"
pub fn book(id: &str, artist: &str, title: &str, tracks: u32) -> ContentDescriptor {
    ContentDescriptor {
        id: id.to_string(),
        artist: artist.to_string(),
        title: title.to_string(),
        archive_ref: format!("{}.zip", id),
        tracks: (1..=tracks)
            .map(|n| Track {
                ordinal: n,
                title: format!("Kapitel {}", n),
                filename: format!("{:02}.mp3", n),
            })
            .collect(),
    }
}

/// What the player reports while playing `ordinal` of `descriptor`
pub fn playing(descriptor: &ContentDescriptor, ordinal: u32) -> CurrentTrack {
    let track = descriptor
        .tracks
        .iter()
        .find(|t| t.ordinal == ordinal)
        .unwrap();
    CurrentTrack {
        artist: descriptor.artist.clone(),
        album: descriptor.title.clone(),
        title: track.title.clone(),
        uri: uri_for(descriptor, ordinal),
    }
}

/// Player URI the controller enqueues for a track
pub fn uri_for(descriptor: &ContentDescriptor, ordinal: u32) -> String {
    let track = descriptor
        .tracks
        .iter()
        .find(|t| t.ordinal == ordinal)
        .unwrap();
    track_uri(&LocalCache::relative_track_path(descriptor, track).unwrap())
}

/// Zip archive containing the given entries
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Zip archive holding every declared track of `descriptor`
pub fn archive_for(descriptor: &ContentDescriptor) -> Vec<u8> {
    let entries: Vec<(String, Vec<u8>)> = descriptor
        .tracks
        .iter()
        .map(|t| (t.filename.clone(), format!("audio {}", t.title).into_bytes()))
        .collect();
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    zip_bytes(&borrowed)
}

pub fn manifest_for(server: &MockServer, books: &[ContentDescriptor]) -> Manifest {
    Manifest {
        id: "test-manifest".to_string(),
        base_url: format!("{}/files/", server.uri()),
        books: books.to_vec(),
    }
}

/// Serve the manifest at `/manifest.json`
pub async fn mount_manifest(server: &MockServer, books: &[ContentDescriptor]) {
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest_for(server, books)))
        .mount(server)
        .await;
}

/// Serve `bytes` as the archive of `descriptor`
pub async fn mount_archive(server: &MockServer, descriptor: &ContentDescriptor, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{}", descriptor.archive_ref)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(server)
        .await;
}

/// Manifest plus a complete archive for every book
pub async fn content_server(books: &[ContentDescriptor]) -> MockServer {
    let server = MockServer::start().await;
    mount_manifest(&server, books).await;
    for descriptor in books {
        mount_archive(&server, descriptor, archive_for(descriptor)).await;
    }
    server
}

/// Number of requests the server received for `request_path`
pub async fn hits(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

pub fn resolver(server: &MockServer, dir: &TempDir) -> ContentResolver {
    let fetcher = Fetcher::new(None).unwrap();
    let cache = LocalCache::new(dir.path().join("library"), dir.path().join("scratch"));
    ContentResolver::new(format!("{}/manifest.json", server.uri()), fetcher, cache)
}
