//! Content resolver
//!
//! Lookups go through the two-tier manifest. `ensure_local` validates the
//! cache and, on any failure, purges the content directory and refetches
//! the whole archive. Archive failures are not retried here.

use super::cache::{extract_archive, CacheStatus, LocalCache};
use super::fetch::Fetcher;
use super::manifest::ManifestSource;
use crate::error::{Error, Result};
use std::sync::Arc;
use tapdeck_common::config::Settings;
use tapdeck_common::{ContentDescriptor, Manifest};
use tracing::{debug, info, warn};

/// A resolved token
#[derive(Debug, Clone)]
pub struct Resolved {
    pub descriptor: ContentDescriptor,
    /// The cache was already valid; nothing was downloaded
    pub existed_locally: bool,
}

/// Resolves token ids to locally available content
pub struct ContentResolver {
    manifest: ManifestSource,
    fetcher: Fetcher,
    cache: LocalCache,
}

impl ContentResolver {
    pub fn new(manifest_url: impl Into<String>, fetcher: Fetcher, cache: LocalCache) -> Self {
        Self {
            manifest: ManifestSource::new(manifest_url, fetcher.clone()),
            fetcher,
            cache,
        }
    }

    /// Build from resolved settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let fetcher = Fetcher::new(settings.manifest_auth.clone())?;
        let cache = LocalCache::new(&settings.library_path, &settings.scratch_dir);
        Ok(Self::new(settings.manifest_url.clone(), fetcher, cache))
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Resolve a token id and make its content available locally
    pub async fn resolve_by_tag_id(&self, tag_id: &str) -> Result<Resolved> {
        info!(tag_id = %tag_id, "Resolving token");
        let (manifest, origin) = self.manifest.current().await?;

        let descriptor = manifest
            .find_by_tag(tag_id)
            .cloned()
            .ok_or_else(|| Error::Resolution(format!("token id not found in manifest: {}", tag_id)))?;

        debug!(tag_id = %tag_id, content_id = %descriptor.id, ?origin, "Token matched manifest entry");

        let existed_locally = self.materialize(&descriptor, Some(&manifest)).await?;
        Ok(Resolved {
            descriptor,
            existed_locally,
        })
    }

    /// Exact artist/title lookup returning the content id
    pub async fn resolve_by_artist_title(&self, artist: &str, title: &str) -> Result<String> {
        self.find_by_artist_title(artist, title)
            .await
            .map(|descriptor| descriptor.id)
    }

    /// Exact artist/title lookup returning the full descriptor
    pub async fn find_by_artist_title(&self, artist: &str, title: &str) -> Result<ContentDescriptor> {
        let (manifest, _) = self.manifest.current().await?;
        match manifest.find_by_artist_title(artist, title) {
            Some(descriptor) => {
                debug!(artist = %artist, title = %title, content_id = %descriptor.id, "Resolved content by artist/title");
                Ok(descriptor.clone())
            }
            None => {
                debug!(artist = %artist, title = %title, "No content for artist/title");
                Err(Error::Resolution(format!(
                    "no content for artist {:?} title {:?}",
                    artist, title
                )))
            }
        }
    }

    /// Make sure every track of `descriptor` exists locally
    ///
    /// Returns `true` if the cache was already valid (no I/O beyond the
    /// check), `false` if the content was freshly fetched. The archive
    /// location comes from the current manifest, which is only looked up
    /// when a download is needed.
    pub async fn ensure_local(&self, descriptor: &ContentDescriptor) -> Result<bool> {
        self.materialize(descriptor, None).await
    }

    /// Validate the cache and fetch from `manifest` (or the current one)
    async fn materialize(
        &self,
        descriptor: &ContentDescriptor,
        manifest: Option<&Arc<Manifest>>,
    ) -> Result<bool> {
        match self.cache.check(descriptor).await? {
            CacheStatus::Valid => {
                debug!(content_id = %descriptor.id, "Content already cached");
                return Ok(true);
            }
            CacheStatus::Missing => {
                info!(content_id = %descriptor.id, "Content not cached, fetching");
            }
            CacheStatus::Damaged { missing_file } => {
                warn!(
                    content_id = %descriptor.id,
                    missing_file = %missing_file,
                    "Cached content is damaged, purging and refetching"
                );
                self.cache.purge(descriptor).await?;
            }
        }

        let manifest = match manifest {
            Some(manifest) => Arc::clone(manifest),
            None => self.manifest.current().await?.0,
        };
        self.fetch_content(&manifest, descriptor).await?;
        Ok(false)
    }

    async fn fetch_content(&self, manifest: &Manifest, descriptor: &ContentDescriptor) -> Result<()> {
        let url = manifest.archive_url(descriptor);
        let scratch = self.cache.scratch_path(&url);
        let dest = self.cache.content_dir(descriptor)?;

        let result = self.download_and_extract(&url, &scratch, &dest).await;

        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %scratch.display(), error = %e, "Failed to delete scratch archive");
            }
        }

        if let Err(e) = result {
            // never leave a half-extracted directory behind
            self.cache.purge(descriptor).await?;
            return Err(e);
        }

        // the archive must actually contain every declared track
        match self.cache.check(descriptor).await? {
            CacheStatus::Valid => {
                info!(content_id = %descriptor.id, path = %dest.display(), "Content cached");
                Ok(())
            }
            status => {
                self.cache.purge(descriptor).await?;
                Err(Error::Archive(format!(
                    "archive for {} is incomplete: {:?}",
                    descriptor.id, status
                )))
            }
        }
    }

    async fn download_and_extract(
        &self,
        url: &str,
        scratch: &std::path::Path,
        dest: &std::path::Path,
    ) -> Result<()> {
        self.fetcher.download_to(url, scratch).await?;
        tokio::fs::create_dir_all(dest).await?;

        let archive = scratch.to_path_buf();
        let target = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extract_archive(&archive, &target))
            .await
            .map_err(|e| Error::Archive(format!("extraction task failed: {}", e)))??;
        Ok(())
    }
}
