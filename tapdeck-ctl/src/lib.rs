//! # Tapdeck Controller Library (tapdeck-ctl)
//!
//! Binds the presence of a physical token on a reader to playback of the
//! matching content set on a Mopidy player, and remembers the playback
//! position across insert/remove cycles.
//!
//! **Architecture:** two long-running loops share one lock-guarded session:
//! - presence source → session controller (driven by token events)
//! - position tracker (fixed interval poll of the player)

pub mod content;
pub mod error;
pub mod player;
pub mod presence;
pub mod session;
pub mod store;
pub mod tracker;

pub use error::{Error, Result};
pub use session::{SessionController, SharedSession};
