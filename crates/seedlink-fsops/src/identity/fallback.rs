//! Targets without a physical identity API.

use std::io;
use std::path::Path;

use super::FileIdentity;
use crate::error::{FsOpsError, FsOpsResult};

pub(super) fn identity(path: &Path) -> FsOpsResult<FileIdentity> {
    Err(FsOpsError::io(
        "identity",
        path,
        io::Error::from(io::ErrorKind::Unsupported),
    ))
}

pub(super) fn filesystem_type(_path: &Path) -> Option<String> {
    None
}
