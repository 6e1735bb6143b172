//! On-disk content cache
//!
//! Content lives under `<library>/<artist>/<title>/<filename>`. A cache entry
//! is valid iff its directory and every declared track file exist. Validity
//! is re-checked on every access and a partial entry is never patched.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tapdeck_common::{ContentDescriptor, Track};
use tracing::{debug, info, warn};

/// Outcome of a cache validity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Valid,
    /// Content directory does not exist
    Missing,
    /// Directory exists but a declared track file does not
    Damaged { missing_file: String },
}

/// Local materialization of resolved content
#[derive(Debug, Clone)]
pub struct LocalCache {
    library_path: PathBuf,
    scratch_dir: PathBuf,
}

impl LocalCache {
    pub fn new(library_path: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_path: library_path.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Deterministic directory for a descriptor
    pub fn content_dir(&self, descriptor: &ContentDescriptor) -> Result<PathBuf> {
        check_component(&descriptor.artist)?;
        check_component(&descriptor.title)?;
        Ok(self
            .library_path
            .join(&descriptor.artist)
            .join(&descriptor.title))
    }

    /// Path of a track relative to the library root, `/`-separated
    pub fn relative_track_path(descriptor: &ContentDescriptor, track: &Track) -> Result<String> {
        check_component(&descriptor.artist)?;
        check_component(&descriptor.title)?;
        if safe_join(Path::new(""), &track.filename).is_none() {
            return Err(Error::Resolution(format!(
                "track filename escapes content directory: {}",
                track.filename
            )));
        }
        Ok(format!(
            "{}/{}/{}",
            descriptor.artist, descriptor.title, track.filename
        ))
    }

    /// Scratch file for a download, named from a hash of its URL
    ///
    /// The same URL always maps to the same path, so a retried download
    /// overwrites its previous attempt instead of leaving a new file.
    pub fn scratch_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.scratch_dir.join(format!("{:x}", digest))
    }

    /// Check the directory and every declared track file
    pub async fn check(&self, descriptor: &ContentDescriptor) -> Result<CacheStatus> {
        let dir = self.content_dir(descriptor)?;
        if !is_dir(&dir).await {
            debug!(content_id = %descriptor.id, path = %dir.display(), "Content not cached");
            return Ok(CacheStatus::Missing);
        }

        for track in &descriptor.tracks {
            let path = safe_join(&dir, &track.filename).ok_or_else(|| {
                Error::Resolution(format!("illegal track filename: {}", track.filename))
            })?;
            if !is_file(&path).await {
                return Ok(CacheStatus::Damaged {
                    missing_file: track.filename.clone(),
                });
            }
        }

        Ok(CacheStatus::Valid)
    }

    /// Remove the whole content directory tree
    pub async fn purge(&self, descriptor: &ContentDescriptor) -> Result<()> {
        let dir = self.content_dir(descriptor)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(content_id = %descriptor.id, path = %dir.display(), "Purged cached content");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Artist and title must each be exactly one plain path component
fn check_component(value: &str) -> Result<()> {
    let mut components = Path::new(value).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_normal || value.contains(['/', '\\', '\0']) {
        return Err(Error::Resolution(format!(
            "unusable path component in content metadata: {:?}",
            value
        )));
    }
    Ok(())
}

/// Resolve `name` lexically under `dest`
///
/// Returns `None` if the entry is absolute or would climb above `dest`.
pub fn safe_join(dest: &Path, name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }

    let mut path = dest.to_path_buf();
    path.extend(parts);
    Some(path)
}

/// Extract a zip archive into `dest`
///
/// Every entry name is checked before anything is written: one entry that
/// would land outside `dest` rejects the whole archive.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(io::BufReader::new(file))?;

    let mut targets = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        match safe_join(dest, &name) {
            Some(target) => targets.push((target, entry.is_dir())),
            None => {
                warn!(entry = %name, archive = %archive_path.display(), "Rejecting archive with illegal entry path");
                return Err(Error::Archive(format!("{}: illegal file path", name)));
            }
        }
    }

    fs::create_dir_all(dest)?;
    let mut written = Vec::new();

    for (index, (target, is_dir)) in targets.into_iter().enumerate() {
        if is_dir {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut entry = archive.by_index(index)?;
        let mut out = fs::File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        written.push(target);
    }

    debug!(archive = %archive_path.display(), dest = %dest.display(), files = written.len(), "Archive extracted");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn descriptor() -> ContentDescriptor {
        ContentDescriptor {
            id: "ABCD".to_string(),
            artist: "Artist".to_string(),
            title: "Title".to_string(),
            archive_ref: "abcd.zip".to_string(),
            tracks: vec![
                Track { ordinal: 1, title: "One".to_string(), filename: "01.mp3".to_string() },
                Track { ordinal: 2, title: "Two".to_string(), filename: "02.mp3".to_string() },
            ],
        }
    }

    #[test]
    fn test_safe_join_rules() {
        let dest = Path::new("/lib/a/t");
        assert_eq!(safe_join(dest, "01.mp3"), Some(PathBuf::from("/lib/a/t/01.mp3")));
        assert_eq!(safe_join(dest, "cd1/01.mp3"), Some(PathBuf::from("/lib/a/t/cd1/01.mp3")));
        assert_eq!(safe_join(dest, "cd1/../01.mp3"), Some(PathBuf::from("/lib/a/t/01.mp3")));
        assert_eq!(safe_join(dest, "../01.mp3"), None);
        assert_eq!(safe_join(dest, "cd1/../../x"), None);
        assert_eq!(safe_join(dest, "/etc/passwd"), None);
        assert_eq!(safe_join(dest, "..\\evil.mp3"), None);
        assert_eq!(safe_join(dest, ""), None);
    }

    #[test]
    fn test_scratch_path_is_deterministic() {
        let cache = LocalCache::new("/lib", "/scratch");
        let a = cache.scratch_path("http://host/a.zip");
        assert_eq!(a, cache.scratch_path("http://host/a.zip"));
        assert_ne!(a, cache.scratch_path("http://host/b.zip"));
        assert!(a.starts_with("/scratch"));
    }

    #[test]
    fn test_content_metadata_cannot_escape_library() {
        let cache = LocalCache::new("/lib", "/scratch");
        let mut d = descriptor();
        d.artist = "..".to_string();
        assert!(cache.content_dir(&d).is_err());
        d.artist = "a/b".to_string();
        assert!(cache.content_dir(&d).is_err());
    }

    #[test]
    fn test_relative_track_path() {
        let d = descriptor();
        let path = LocalCache::relative_track_path(&d, &d.tracks[1]).unwrap();
        assert_eq!(path, "Artist/Title/02.mp3");
    }

    #[tokio::test]
    async fn test_check_reports_missing_and_damaged() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path(), dir.path().join("scratch"));
        let d = descriptor();
        assert_eq!(cache.check(&d).await.unwrap(), CacheStatus::Missing);

        let content = cache.content_dir(&d).unwrap();
        fs::create_dir_all(&content).unwrap();
        fs::write(content.join("01.mp3"), b"one").unwrap();
        assert_eq!(
            cache.check(&d).await.unwrap(),
            CacheStatus::Damaged { missing_file: "02.mp3".to_string() }
        );

        fs::write(content.join("02.mp3"), b"two").unwrap();
        assert_eq!(cache.check(&d).await.unwrap(), CacheStatus::Valid);

        cache.purge(&d).await.unwrap();
        assert!(!content.exists());
        // purging twice is fine
        cache.purge(&d).await.unwrap();
    }

    #[test]
    fn test_extract_archive_writes_entries() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("a.zip");
        write_zip(&archive, &[("01.mp3", b"one"), ("02.mp3", b"two")]);

        let dest = dir.path().join("out");
        let written = extract_archive(&archive, &dest).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(fs::read(dest.join("02.mp3")).unwrap(), b"two");
    }

    #[test]
    fn test_extract_archive_rejects_traversal_before_writing() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("01.mp3", b"one"), ("../escaped.mp3", b"evil")]);

        let dest = dir.path().join("lib").join("out");
        let result = extract_archive(&archive, &dest);

        assert!(matches!(result, Err(Error::Archive(_))));
        assert!(!dir.path().join("lib").join("escaped.mp3").exists());
        assert!(!dest.join("01.mp3").exists());
    }
}
