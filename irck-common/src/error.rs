//! Common error types for irck

use thiserror::Error;

/// Common result type for irck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the irck crates
#[derive(Error, Debug)]
pub enum Error {
    /// Requested command absent from the code library
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Captured code too short to be a key press (button repeat or bounce)
    #[error("Short capture: {pulses} pulses")]
    ShortCapture { pulses: usize },

    /// Persisted code library missing or unreadable
    #[error("Code source unavailable: {0}")]
    SourceUnavailable(String),

    /// Output line rejected a chain while a transmission is in flight
    #[error("Output line busy")]
    HardwareBusy,

    /// Hardware capability failure
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Edge subscription lost while a capture was in progress
    #[error("Capture error: {0}")]
    Capture(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Library serialization error (wraps serde_json::Error)
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
