//! Error types for torrent core services.

use std::error::Error;

use thiserror::Error;

/// Primary error type for torrent operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// Operation failed in the underlying client.
    #[error("torrent operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Torrent hash when available.
        hash: Option<String>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Torrent was not found on the client.
    #[error("torrent not found")]
    NotFound {
        /// Missing torrent hash.
        hash: String,
    },
    /// Info-hash string was not valid hex of an accepted length.
    #[error("invalid torrent hash")]
    InvalidHash {
        /// Offending value.
        value: String,
    },
}

/// Convenience alias for torrent operation results.
pub type TorrentResult<T> = Result<T, TorrentError>;
