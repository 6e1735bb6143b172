//! Error types for tapdeck-ctl
//!
//! One variant per failure class the controller distinguishes. None of them
//! is fatal to the process: the session state machine always lands in a
//! well-defined state after reporting one.

use thiserror::Error;

/// Main error type for tapdeck-ctl
#[derive(Error, Debug)]
pub enum Error {
    /// Token reader driver failed a read
    #[error("Hardware read error: {0}")]
    HardwareRead(String),

    /// Token id not present in the manifest
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Manifest or archive download failed
    #[error("Network error: {0}")]
    Network(String),

    /// Archive could not be opened or contains an illegal entry
    #[error("Archive error: {0}")]
    Archive(String),

    /// Position store could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Player rejected or failed a command
    #[error("Player command error: {0}")]
    PlayerCommand(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using tapdeck-ctl Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<tapdeck_common::Error> for Error {
    fn from(err: tapdeck_common::Error) -> Self {
        match err {
            tapdeck_common::Error::Io(e) => Error::Io(e),
            tapdeck_common::Error::Config(msg) => Error::Config(msg),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Archive(err.to_string())
    }
}
