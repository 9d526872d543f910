use std::path::PathBuf;

use wallpad_packet::ChangeError;
use wallpad_packet::DecodeError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("Not connected to the wall pad")]
    NotConnected,

    #[error("Already connected to the wall pad")]
    AlreadyConnected,

    #[error("Gateway is closed")]
    Closed,

    #[error("Failed to decode frame: {0}")]
    Decode(#[from] DecodeError),

    #[error("Command rejected: {0}")]
    Rejected(#[from] ChangeError),

    #[error("Registry store {0}: {1}")]
    Store(PathBuf, #[source] StoreError),
}

/// Failure reading or writing the persisted entity list.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported store version {0}")]
    Version(u32),
}
