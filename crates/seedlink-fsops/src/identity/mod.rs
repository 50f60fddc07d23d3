//! Physical file identity and same-filesystem checks.
//!
//! # Design
//! - One implementation per platform, selected at compile time; callers only see
//!   [`FileId`], which is `Copy` and usable as a map key.
//! - Hardlinks and reflinks cannot cross device/volume boundaries, so callers check
//!   [`same_filesystem`] before attempting either.

use std::path::Path;

use crate::error::FsOpsResult;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as sys;

#[cfg(windows)]
#[allow(unsafe_code)]
mod windows;
#[cfg(windows)]
use windows as sys;

#[cfg(not(any(unix, windows)))]
mod fallback;
#[cfg(not(any(unix, windows)))]
use fallback as sys;

/// Platform-native physical file identifier.
///
/// `device` is the device id on POSIX and the volume serial number on Windows;
/// `index` is the inode number or the NTFS file index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    /// Device or volume component.
    pub device: u64,
    /// Inode or file-index component.
    pub index: u64,
}

/// Identity of a file together with its hardlink count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    /// Physical identifier.
    pub id: FileId,
    /// Number of directory entries pointing at the file.
    pub link_count: u64,
}

/// Device and filesystem-type details used in error diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDiagnostics {
    /// Device identifier, when the path could be inspected.
    pub device: Option<u64>,
    /// Filesystem type name, `unknown` when it cannot be determined.
    pub fs_type: String,
}

/// Read the physical identity of `path`, following symlinks.
///
/// # Errors
///
/// Returns [`crate::FsOpsError::PathNotFound`] when the path does not exist and
/// [`crate::FsOpsError::Io`] for any other metadata failure.
pub fn identity(path: &Path) -> FsOpsResult<FileIdentity> {
    sys::identity(path)
}

/// Whether two existing paths live on the same filesystem/volume.
///
/// # Errors
///
/// Returns [`crate::FsOpsError::PathNotFound`] when either path does not exist.
pub fn same_filesystem(a: &Path, b: &Path) -> FsOpsResult<bool> {
    let left = identity(a)?;
    let right = identity(b)?;
    Ok(left.id.device == right.id.device)
}

/// Collect device and filesystem-type diagnostics for `path`; never fails.
#[must_use]
pub fn describe(path: &Path) -> DeviceDiagnostics {
    DeviceDiagnostics {
        device: identity(path).ok().map(|found| found.id.device),
        fs_type: sys::filesystem_type(path).unwrap_or_else(|| "unknown".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FsOpsError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn identity_tracks_hardlinks() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let original = temp.path().join("original.bin");
        let link = temp.path().join("link.bin");
        let other = temp.path().join("other.bin");
        fs::write(&original, b"payload")?;
        fs::write(&other, b"payload")?;
        fs::hard_link(&original, &link)?;

        let first = identity(&original)?;
        let second = identity(&link)?;
        assert_eq!(first.id, second.id);
        assert_eq!(first.link_count, 2);
        assert_ne!(identity(&other)?.id, first.id);
        Ok(())
    }

    #[test]
    fn same_filesystem_compares_devices() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let nested = temp.path().join("nested");
        fs::create_dir(&nested)?;
        assert!(same_filesystem(temp.path(), &nested)?);
        Ok(())
    }

    #[test]
    fn same_filesystem_reports_missing_paths() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let missing = temp.path().join("missing");
        let err = same_filesystem(temp.path(), &missing).expect_err("missing path");
        assert!(matches!(err, FsOpsError::PathNotFound { path } if path == missing));
        Ok(())
    }

    #[test]
    fn describe_never_fails() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let present = describe(temp.path());
        assert!(present.device.is_some());
        assert!(!present.fs_type.is_empty());
        let absent = describe(&temp.path().join("missing"));
        assert_eq!(absent.device, None);
        Ok(())
    }
}
