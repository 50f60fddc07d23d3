//! POSIX identity via `stat` device and inode numbers.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use super::{FileId, FileIdentity};
use crate::error::{FsOpsError, FsOpsResult};

pub(super) fn identity(path: &Path) -> FsOpsResult<FileIdentity> {
    let metadata = fs::metadata(path).map_err(|err| FsOpsError::from_lookup("stat", path, err))?;
    Ok(FileIdentity {
        id: FileId {
            device: metadata.dev(),
            index: metadata.ino(),
        },
        link_count: metadata.nlink(),
    })
}

#[cfg(target_os = "linux")]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(super) fn filesystem_type(path: &Path) -> Option<String> {
    let stat = nix::sys::statfs::statfs(path).ok()?;
    // Magic numbers fit in 32 bits; the libc field width varies by target.
    let magic = stat.filesystem_type().0 as u32;
    let name = match magic {
        0x9123_683E => "btrfs",
        0x5846_5342 => "xfs",
        0xEF53 => "ext4",
        0x0102_1994 => "tmpfs",
        0x2FC1_2FC1 => "zfs",
        0xCA45_1A4E => "bcachefs",
        0x794C_7630 => "overlayfs",
        0x6969 => "nfs",
        0xFF53_4D42 => "cifs",
        0x6573_5546 => "fuse",
        0xF2F5_2010 => "f2fs",
        0x5346_544E => "ntfs",
        0x4d44 => "vfat",
        other => return Some(format!("unknown(0x{other:x})")),
    };
    Some(name.to_string())
}

#[cfg(not(target_os = "linux"))]
pub(super) fn filesystem_type(_path: &Path) -> Option<String> {
    None
}
