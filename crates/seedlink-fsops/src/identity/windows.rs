//! Windows identity via volume serial number and NTFS file index.

use std::fs::OpenOptions;
use std::io;
use std::mem::MaybeUninit;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::AsRawHandle;
use std::path::Path;

use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::Storage::FileSystem::{
    BY_HANDLE_FILE_INFORMATION, FILE_FLAG_BACKUP_SEMANTICS, GetFileInformationByHandle,
};

use super::{FileId, FileIdentity};
use crate::error::{FsOpsError, FsOpsResult};

pub(super) fn identity(path: &Path) -> FsOpsResult<FileIdentity> {
    // Backup semantics lets the handle open directories as well as files.
    let file = OpenOptions::new()
        .access_mode(0)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)
        .map_err(|err| FsOpsError::from_lookup("open_identity_handle", path, err))?;

    let handle = file.as_raw_handle() as HANDLE;
    let mut info = MaybeUninit::<BY_HANDLE_FILE_INFORMATION>::uninit();
    // SAFETY: `handle` stays valid while `file` is alive and `info` is only read
    // after the call reports success.
    let status = unsafe { GetFileInformationByHandle(handle, info.as_mut_ptr()) };
    if status == 0 {
        return Err(FsOpsError::io(
            "file_information",
            path,
            io::Error::last_os_error(),
        ));
    }
    // SAFETY: the call succeeded and fully initialised the structure.
    let info = unsafe { info.assume_init() };

    Ok(FileIdentity {
        id: FileId {
            device: u64::from(info.dwVolumeSerialNumber),
            index: (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow),
        },
        link_count: u64::from(info.nNumberOfLinks),
    })
}

pub(super) fn filesystem_type(_path: &Path) -> Option<String> {
    None
}
