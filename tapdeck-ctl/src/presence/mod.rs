//! Token presence detection
//!
//! The raw reader driver is polled at a fixed sub-second cadence. Reads are
//! debounced into a deduplicated stream of [`PresenceEvent`]s delivered
//! through a bounded queue.

mod command_reader;
mod debounce;
mod source;

pub use command_reader::CommandTagReader;
pub use debounce::{transition, DebounceState, Observation};
pub use source::PresenceSource;

use crate::error::Result;

/// Debounced presence event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A token with a new id was placed on the reader
    Present { tag_id: String },
    /// The token that was present has been removed
    Absent { tag_id: String },
    /// The driver failed a read (does not imply removal)
    Error { message: String },
}

/// Target shape reported by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTarget {
    /// ISO 14443-A card with its UID bytes
    Iso14443a { uid: Vec<u8> },
    /// Any target the controller cannot identify
    Unknown { description: String },
}

/// Result of one driver poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRead {
    NoTarget,
    Target(RawTarget),
}

/// Blocking token reader driver
///
/// Initialization and reconnects are the driver's own business; the
/// presence source only polls and finally closes it.
pub trait TagReader: Send + 'static {
    /// Perform one blocking read
    fn read(&mut self) -> Result<RawRead>;

    /// Release the underlying device
    fn close(&mut self) {}
}

/// Printable token id for a target
///
/// ISO 14443-A UIDs render as `0x`-prefixed lowercase hex.
pub fn format_target(target: &RawTarget) -> Option<String> {
    match target {
        RawTarget::Iso14443a { uid } => {
            let hex: String = uid.iter().map(|b| format!("{:02x}", b)).collect();
            Some(format!("0x{}", hex))
        }
        RawTarget::Unknown { .. } => None,
    }
}
