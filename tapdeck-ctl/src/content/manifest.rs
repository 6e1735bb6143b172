//! Two-tier manifest resolution
//!
//! Every lookup fetches the remote manifest fresh. If that fails, the last
//! manifest that was fetched successfully is reused; only when none was
//! ever obtained does the lookup fail.

use super::fetch::Fetcher;
use crate::error::{Error, Result};
use std::sync::Arc;
use tapdeck_common::Manifest;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Where a manifest snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestOrigin {
    Remote,
    Snapshot,
}

/// Remote manifest with a last-good in-memory snapshot
pub struct ManifestSource {
    url: String,
    fetcher: Fetcher,
    last_good: RwLock<Option<Arc<Manifest>>>,
}

impl ManifestSource {
    pub fn new(url: impl Into<String>, fetcher: Fetcher) -> Self {
        Self {
            url: url.into(),
            fetcher,
            last_good: RwLock::new(None),
        }
    }

    /// Fetch the manifest, falling back to the last good snapshot
    pub async fn current(&self) -> Result<(Arc<Manifest>, ManifestOrigin)> {
        match self.fetcher.get_json::<Manifest>(&self.url).await {
            Ok(manifest) => {
                debug!(entries = manifest.books.len(), "Fetched content manifest");
                let manifest = Arc::new(manifest);
                *self.last_good.write().await = Some(Arc::clone(&manifest));
                Ok((manifest, ManifestOrigin::Remote))
            }
            Err(e) => match self.snapshot().await {
                Some(manifest) => {
                    warn!(error = %e, "Manifest fetch failed, using last good snapshot");
                    Ok((manifest, ManifestOrigin::Snapshot))
                }
                None => Err(Error::Network(format!(
                    "manifest unavailable and no snapshot cached: {}",
                    e
                ))),
            },
        }
    }

    /// Last successfully fetched manifest, without touching the network
    pub async fn snapshot(&self) -> Option<Arc<Manifest>> {
        self.last_good.read().await.clone()
    }
}
