//! HTTP downloads for manifests and archives

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tapdeck_common::config::ManifestAuth;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("tapdeck/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client carrying optional basic-auth credentials
///
/// No request timeout is set beyond the client's own defaults; a stalled
/// download stalls only the loop that issued it.
#[derive(Clone)]
pub struct Fetcher {
    http: reqwest::Client,
    auth: Option<ManifestAuth>,
}

impl Fetcher {
    pub fn new(auth: Option<ManifestAuth>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { http, auth })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut request = self.http.get(url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.user, auth.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("GET {} returned {}", url, status)));
        }
        Ok(response)
    }

    /// Fetch and decode a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "Fetching JSON document");
        self.get(url)
            .await?
            .json()
            .await
            .map_err(|e| Error::Network(format!("invalid document at {}: {}", url, e)))
    }

    /// Stream a download into `dest`, overwriting it
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!(url = %url, dest = %dest.display(), "Downloading file");
        let mut response = self.get(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(dest).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Network(format!("download of {} interrupted: {}", url, e)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(url = %url, dest = %dest.display(), size = written, "Download complete");
        Ok(written)
    }
}
