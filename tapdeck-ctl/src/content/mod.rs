//! Content resolution and local caching
//!
//! Turns an opaque token id into a content descriptor from the remote
//! manifest and guarantees a valid local copy of its tracks exists.

mod cache;
mod fetch;
mod manifest;
mod resolver;

pub use cache::{extract_archive, safe_join, CacheStatus, LocalCache};
pub use fetch::Fetcher;
pub use manifest::{ManifestOrigin, ManifestSource};
pub use resolver::{ContentResolver, Resolved};
