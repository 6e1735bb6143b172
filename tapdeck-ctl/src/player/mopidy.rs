//! Mopidy JSON-RPC client
//!
//! Commands are JSON-RPC 2.0 calls POSTed to the player's `/mopidy/rpc`
//! endpoint. An RPC `error` object is reported as a player command error.

use super::{CurrentTrack, Player};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MopidyTrack {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    album: Option<MopidyAlbum>,
    #[serde(default)]
    artists: Vec<MopidyArtist>,
}

#[derive(Debug, Deserialize)]
struct MopidyAlbum {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MopidyArtist {
    #[serde(default)]
    name: Option<String>,
}

impl From<MopidyTrack> for CurrentTrack {
    fn from(track: MopidyTrack) -> Self {
        Self {
            artist: track
                .artists
                .into_iter()
                .find_map(|a| a.name)
                .unwrap_or_default(),
            album: track.album.and_then(|a| a.name).unwrap_or_default(),
            title: track.name.unwrap_or_default(),
            uri: track.uri,
        }
    }
}

/// Client for a Mopidy server
pub struct MopidyClient {
    http: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
    scan_command: Option<Vec<String>>,
}

impl MopidyClient {
    /// Create a client for `rpc_url`
    ///
    /// `scan_command` is run before every library refresh, e.g.
    /// `["sudo", "mopidyctl", "local", "scan"]`.
    pub fn new(rpc_url: impl Into<String>, scan_command: Option<Vec<String>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::PlayerCommand(e.to_string()))?;
        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
            scan_command,
        })
    }

    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if let Some(params) = params {
            body["params"] = params;
        }

        debug!(method = %method, id, "Player RPC call");

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::PlayerCommand(format!("{} failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::PlayerCommand(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::PlayerCommand(format!("{} returned invalid JSON: {}", method, e)))?;

        if let Some(err) = rpc.error {
            return Err(Error::PlayerCommand(format!(
                "{} failed with code {}: {}",
                method, err.code, err.message
            )));
        }

        Ok(rpc.result.unwrap_or(Value::Null))
    }

    async fn run_scan_command(&self) -> Result<()> {
        let Some((program, args)) = self.scan_command.as_ref().and_then(|c| c.split_first()) else {
            return Ok(());
        };

        info!(program = %program, "Running library scan command");
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| Error::PlayerCommand(format!("failed to run {}: {}", program, e)))?;

        if !status.success() {
            return Err(Error::PlayerCommand(format!(
                "library scan {} exited with {}",
                program, status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Player for MopidyClient {
    async fn current_track(&self) -> Result<Option<CurrentTrack>> {
        let result = self.call("core.playback.get_current_track", None).await?;
        if result.is_null() {
            return Ok(None);
        }
        let track: MopidyTrack = serde_json::from_value(result)
            .map_err(|e| Error::PlayerCommand(format!("unexpected track shape: {}", e)))?;
        Ok(Some(track.into()))
    }

    async fn play(&self) -> Result<()> {
        self.call("core.playback.play", None).await.map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        self.call("core.playback.stop", None).await.map(|_| ())
    }

    async fn clear_queue(&self) -> Result<()> {
        self.call("core.tracklist.clear", None).await.map(|_| ())
    }

    async fn enqueue(&self, uris: &[String]) -> Result<()> {
        info!(count = uris.len(), "Adding tracks to tracklist");
        self.call("core.tracklist.add", Some(json!({ "uris": uris })))
            .await
            .map(|_| ())
    }

    async fn refresh_library(&self) -> Result<()> {
        self.run_scan_command().await?;
        self.call("core.library.refresh", None).await.map(|_| ())
    }
}
