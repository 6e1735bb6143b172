//! # Tapdeck Common Library
//!
//! Shared code for the tapdeck jukebox controller:
//! - Error type and result alias
//! - Bootstrap configuration loading (TOML + CLI/env overrides)
//! - Content manifest and position record models

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{ContentDescriptor, Manifest, PositionRecord, Track};
