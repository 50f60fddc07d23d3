//! # Design
//!
//! - Provide structured, constant-message errors for link-tree operations.
//! - Capture operation context (paths, devices, filesystem types) so failures can be
//!   diagnosed without reproducing them.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by filesystem primitives.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A path required for the operation does not exist.
    #[error("path not found")]
    PathNotFound {
        /// Missing path.
        path: PathBuf,
    },
    /// Target path is already occupied by a different file.
    #[error("target already exists")]
    TargetExists {
        /// Occupied target path.
        path: PathBuf,
    },
    /// The filesystem rejected copy-on-write cloning.
    #[error("filesystem does not support copy-on-write clones")]
    CloneUnsupported {
        /// Source of the attempted clone.
        source_path: PathBuf,
        /// Target of the attempted clone.
        target_path: PathBuf,
        /// Device identifier of the source, when readable.
        device: Option<u64>,
        /// Filesystem type of the source, when readable.
        fs_type: String,
        /// Last error returned by the clone call.
        source: io::Error,
    },
    /// Transient clone failures persisted past the retry budget.
    #[error("clone retries exhausted")]
    CloneRetriesExhausted {
        /// Source of the attempted clone.
        source_path: PathBuf,
        /// Target of the attempted clone.
        target_path: PathBuf,
        /// Attempts made before giving up.
        attempts: u32,
        /// Device identifier of the source, when readable.
        source_device: Option<u64>,
        /// Filesystem type of the source, when readable.
        source_fs_type: String,
        /// Device identifier of the target directory, when readable.
        target_device: Option<u64>,
        /// Filesystem type of the target directory, when readable.
        target_fs_type: String,
        /// Last transient error.
        source: io::Error,
    },
    /// The clone call failed with a non-retryable error.
    #[error("clone failed")]
    CloneFailed {
        /// Source of the attempted clone.
        source_path: PathBuf,
        /// Target of the attempted clone.
        target_path: PathBuf,
        /// Device identifier of the source, when readable.
        source_device: Option<u64>,
        /// Filesystem type of the source, when readable.
        source_fs_type: String,
        /// Device identifier of the target directory, when readable.
        target_device: Option<u64>,
        /// Filesystem type of the target directory, when readable.
        target_fs_type: String,
        /// Underlying error.
        source: io::Error,
    },
    /// Tree creation stopped partway.
    #[error("link tree creation failed partway")]
    PartialTree {
        /// Target file whose creation failed.
        failed_target: PathBuf,
        /// Files completed before the failure.
        completed: usize,
        /// Files requested in total.
        total: usize,
        /// Failure for the file that stopped the tree.
        source: Box<FsOpsError>,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Map an IO error to [`FsOpsError::PathNotFound`] when it reports a missing path.
    pub(crate) fn from_lookup(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::PathNotFound { path }
        } else {
            Self::io(operation, path, source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn lookup_errors_map_not_found() {
        let missing = FsOpsError::from_lookup(
            "stat",
            "/missing",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(missing, FsOpsError::PathNotFound { .. }));

        let denied = FsOpsError::from_lookup(
            "stat",
            "/denied",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(denied, FsOpsError::Io { operation: "stat", .. }));
        assert!(denied.source().is_some());
    }

    #[test]
    fn partial_tree_preserves_cause() {
        let err = FsOpsError::PartialTree {
            failed_target: PathBuf::from("/t/b"),
            completed: 1,
            total: 3,
            source: Box::new(FsOpsError::TargetExists {
                path: PathBuf::from("/t/b"),
            }),
        };
        assert_eq!(err.to_string(), "link tree creation failed partway");
        assert!(err.source().is_some());
    }
}
