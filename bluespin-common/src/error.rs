//! Common error types for bluespin

use thiserror::Error;

/// Common result type for bluespin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the bluespin crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level media server failure (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Media server returned a non-success status
    #[error("Media server error {status}: {body}")]
    Api { status: u16, body: String },

    /// Configured playlist does not exist on the media server
    #[error("Playlist {0} not found on media server")]
    PlaylistNotFound(u64),

    /// Configured playlist exists but contains no tracks
    #[error("Playlist {0} is empty")]
    PlaylistEmpty(u64),

    /// Selected track exposes no playable media part
    #[error("Track '{0}' has no playable media part")]
    MissingStream(String),
}
