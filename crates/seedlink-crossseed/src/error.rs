//! # Design
//!
//! - Constant error messages; context lives in fields and sources are preserved.
//! - Every variant maps to a stable, matchable reason string callers can show
//!   verbatim in skip messages.
//! - Skips (unsafe overlap, recheck refusal, ineligible match) are separated from
//!   failures so callers can decide what to surface.

use std::path::PathBuf;

use seedlink_config::ConfigError;
use seedlink_fsops::FsOpsError;
use seedlink_torrent_core::{ClientTorrentId, TorrentError, TorrentHash};
use thiserror::Error;

/// Reason reported when an extra file shares a piece with existing content.
pub const REASON_UNSAFE_OVERLAP: &str = "extra files share pieces with content";
/// Reason reported when a recheck is needed but disabled by configuration.
pub const REASON_RECHECK_REQUIRED: &str = "recheck required but skip recheck is enabled";
/// Reason reported when the matched torrent is incomplete.
pub const REASON_INCOMPLETE_MATCH: &str = "matched torrent is not fully downloaded";
/// Reason reported when link directories span filesystems.
pub const REASON_CROSS_FILESYSTEM: &str =
    "link base directory is not on the same filesystem as the download path";
/// Reason reported when the filesystem rejects copy-on-write clones.
pub const REASON_CLONE_UNSUPPORTED: &str = "filesystem does not support reflinks";
/// Reason reported when transient filesystem errors outlast the retry budget.
pub const REASON_TRANSIENT_IO: &str = "transient filesystem errors persisted";
/// Reason reported when link tree creation stops partway.
pub const REASON_PARTIAL_TREE: &str = "link tree creation failed partway";
/// Reason reported when the torrent was added but a later client step failed.
pub const REASON_PARTIALLY_APPLIED: &str = "torrent added but post-add steps failed";
/// Reason reported for other filesystem failures.
pub const REASON_FILESYSTEM: &str = "filesystem operation failed";
/// Reason reported when a torrent-client call fails.
pub const REASON_CLIENT: &str = "torrent client operation failed";

/// Result alias for cross-seed operations.
pub type CrossSeedResult<T> = Result<T, CrossSeedError>;

/// Error taxonomy bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrossSeedErrorKind {
    /// Settings cannot be honoured.
    Configuration,
    /// Link base and download path are on different filesystems.
    CrossFilesystem,
    /// Extra files share pieces with existing content.
    UnsafeOverlap,
    /// Copy-on-write clones are not available.
    CloneUnsupported,
    /// Transient filesystem errors outlasted the retry budget.
    TransientIo,
    /// Link tree creation stopped partway.
    PartialTree,
    /// Recheck is required but disabled.
    RecheckRequired,
    /// Matched torrent cannot serve as a source.
    Ineligible,
    /// Torrent metadata or call arguments are inconsistent.
    InvalidInput,
    /// Torrent-client collaborator failed.
    Client,
    /// The torrent was added but renames or the recheck did not go through.
    PartiallyApplied,
    /// Any other filesystem failure.
    Filesystem,
}

/// Errors produced while planning or executing a cross-seed.
#[derive(Debug, Error)]
pub enum CrossSeedError {
    /// Settings cannot be honoured.
    #[error("invalid cross-seed configuration")]
    Configuration {
        /// Machine-readable reason.
        reason: &'static str,
        /// Validation failure, when one triggered the error.
        source: Option<ConfigError>,
    },
    /// Link base and download path are on different filesystems.
    #[error("link base directory is on a different filesystem")]
    CrossFilesystem {
        /// Link base directory (or its nearest existing ancestor).
        base_dir: PathBuf,
        /// Matched torrent save path.
        save_path: PathBuf,
        /// Device of the base directory.
        base_device: Option<u64>,
        /// Device of the save path.
        save_device: Option<u64>,
    },
    /// Extra files share pieces with existing content.
    #[error("extra files share pieces with content")]
    UnsafeOverlap {
        /// First shared piece index found.
        piece: u64,
        /// Extra file touching the piece.
        extra: String,
        /// Content file touching the piece.
        content: String,
    },
    /// Copy-on-write clones are not available in the target directory.
    #[error("filesystem does not support copy-on-write clones")]
    CloneUnsupported {
        /// Directory the probe ran in.
        dir: PathBuf,
        /// Clone failure with device diagnostics.
        source: FsOpsError,
    },
    /// Transient filesystem errors outlasted the retry budget.
    #[error("transient filesystem errors persisted")]
    TransientIo {
        /// Exhaustion error with device diagnostics.
        source: FsOpsError,
    },
    /// Link tree creation stopped partway and was rolled back.
    #[error("link tree creation failed partway")]
    PartialTree {
        /// Directory the tree was being built in.
        target_dir: PathBuf,
        /// Paths removed during rollback.
        rolled_back: usize,
        /// Tree failure naming the failed file and progress.
        source: FsOpsError,
    },
    /// A recheck is required but disabled by configuration.
    #[error("recheck required but skip recheck is enabled")]
    RecheckRequired {
        /// Link mode that required the recheck.
        mode: &'static str,
    },
    /// The matched torrent is not fully downloaded.
    #[error("matched torrent is not fully downloaded")]
    Ineligible {
        /// Matched torrent hash.
        hash: TorrentHash,
        /// Reported completion percentage.
        progress: f64,
    },
    /// Torrent metadata or call arguments are inconsistent.
    #[error("invalid cross-seed input")]
    InvalidInput {
        /// Field or argument that failed validation.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// Torrent-client collaborator failed.
    #[error("torrent client operation failed")]
    Client {
        /// Client failure with operation context.
        source: TorrentError,
    },
    /// The torrent was added (paused, link tree kept) but a later step failed.
    #[error("torrent added but post-add steps failed")]
    PartiallyApplied {
        /// Identifier returned by the client for the added torrent.
        client_id: ClientTorrentId,
        /// Step that failed (`rename` or `recheck`).
        step: &'static str,
        /// Renames applied before the failure.
        renames_applied: usize,
        /// Client failure with operation context.
        source: TorrentError,
    },
    /// Any other filesystem failure.
    #[error("filesystem operation failed")]
    Filesystem {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        source: FsOpsError,
    },
}

impl CrossSeedError {
    /// Taxonomy bucket for this error.
    #[must_use]
    pub const fn kind(&self) -> CrossSeedErrorKind {
        match self {
            Self::Configuration { .. } => CrossSeedErrorKind::Configuration,
            Self::CrossFilesystem { .. } => CrossSeedErrorKind::CrossFilesystem,
            Self::UnsafeOverlap { .. } => CrossSeedErrorKind::UnsafeOverlap,
            Self::CloneUnsupported { .. } => CrossSeedErrorKind::CloneUnsupported,
            Self::TransientIo { .. } => CrossSeedErrorKind::TransientIo,
            Self::PartialTree { .. } => CrossSeedErrorKind::PartialTree,
            Self::RecheckRequired { .. } => CrossSeedErrorKind::RecheckRequired,
            Self::Ineligible { .. } => CrossSeedErrorKind::Ineligible,
            Self::InvalidInput { .. } => CrossSeedErrorKind::InvalidInput,
            Self::Client { .. } => CrossSeedErrorKind::Client,
            Self::PartiallyApplied { .. } => CrossSeedErrorKind::PartiallyApplied,
            Self::Filesystem { .. } => CrossSeedErrorKind::Filesystem,
        }
    }

    /// Stable reason string suitable for user-facing skip messages.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Configuration { reason, .. } | Self::InvalidInput { reason, .. } => *reason,
            Self::CrossFilesystem { .. } => REASON_CROSS_FILESYSTEM,
            Self::UnsafeOverlap { .. } => REASON_UNSAFE_OVERLAP,
            Self::CloneUnsupported { .. } => REASON_CLONE_UNSUPPORTED,
            Self::TransientIo { .. } => REASON_TRANSIENT_IO,
            Self::PartialTree { .. } => REASON_PARTIAL_TREE,
            Self::RecheckRequired { .. } => REASON_RECHECK_REQUIRED,
            Self::Ineligible { .. } => REASON_INCOMPLETE_MATCH,
            Self::Client { .. } => REASON_CLIENT,
            Self::PartiallyApplied { .. } => REASON_PARTIALLY_APPLIED,
            Self::Filesystem { .. } => REASON_FILESYSTEM,
        }
    }

    /// Whether the attempt was skipped by a guard rather than failing.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::UnsafeOverlap { .. } | Self::RecheckRequired { .. } | Self::Ineligible { .. }
        )
    }

    pub(crate) fn client(
        operation: &'static str,
        hash: &TorrentHash,
        source: anyhow::Error,
    ) -> Self {
        Self::Client {
            source: TorrentError::OperationFailed {
                operation,
                hash: Some(hash.to_string()),
                source: source.into(),
            },
        }
    }

    pub(crate) fn partially_applied(
        client_id: &ClientTorrentId,
        step: &'static str,
        renames_applied: usize,
        hash: &TorrentHash,
        source: anyhow::Error,
    ) -> Self {
        Self::PartiallyApplied {
            client_id: client_id.clone(),
            step,
            renames_applied,
            source: TorrentError::OperationFailed {
                operation: step,
                hash: Some(hash.to_string()),
                source: source.into(),
            },
        }
    }

    /// Classify a filesystem failure raised outside tree creation.
    pub(crate) fn filesystem(operation: &'static str, source: FsOpsError) -> Self {
        match source {
            FsOpsError::CloneRetriesExhausted { .. } => Self::TransientIo { source },
            other => Self::Filesystem {
                operation,
                source: other,
            },
        }
    }
}

impl From<ConfigError> for CrossSeedError {
    fn from(source: ConfigError) -> Self {
        Self::Configuration {
            reason: source.reason().unwrap_or("invalid settings"),
            source: Some(source),
        }
    }
}
