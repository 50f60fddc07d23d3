//! Copy-on-write clone primitive with bounded retry.
//!
//! # Design
//! - Whole-file clone first; a range clone when the whole-file call is not
//!   implemented on the filesystem.
//! - Transient "try again" failures back off exponentially through an injected
//!   [`Sleeper`] so tests never wait on the wall clock.
//! - Failures carry device and filesystem-type diagnostics for both sides.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{FsOpsError, FsOpsResult};
use crate::identity::describe;

const PROBE_PREFIX: &str = ".seedlink-reflink-probe-";
const PROBE_PAYLOAD: &[u8] = b"seedlink reflink probe";

/// Blocking sleep used between clone retries.
pub trait Sleeper: Send + Sync {
    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Raw clone calls against open file handles.
pub trait CloneOps: Send + Sync {
    /// Clone the whole of `source` into `target`.
    ///
    /// # Errors
    ///
    /// Returns the OS error reported by the clone call.
    fn clone_file(&self, source: &File, target: &File) -> io::Result<()>;

    /// Clone `length` bytes of `source` starting at offset zero into `target`.
    ///
    /// # Errors
    ///
    /// Returns the OS error reported by the clone call.
    fn clone_range(&self, source: &File, target: &File, length: u64) -> io::Result<()>;
}

/// Platform clone calls (`FICLONE`/`FICLONERANGE` on Linux).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCloneOps;

impl CloneOps for SystemCloneOps {
    fn clone_file(&self, source: &File, target: &File) -> io::Result<()> {
        sys::clone_file(source, target)
    }

    fn clone_range(&self, source: &File, target: &File, length: u64) -> io::Result<()> {
        sys::clone_range(source, target, length)
    }
}

/// Retry budget for transient clone failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total clone calls allowed, including the first.
    pub max_attempts: u32,
    /// Delay after the first transient failure.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given 1-based failed attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }
}

/// Outcome of a successful clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneReport {
    /// Clone calls issued, including retries and the range fallback.
    pub attempts: u32,
    /// Whether the range clone call produced the result.
    pub used_range_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloneErrorClass {
    Transient,
    Unsupported,
    Fatal,
}

/// Creates copy-on-write clones.
#[derive(Clone)]
pub struct Cloner {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    ops: Arc<dyn CloneOps>,
}

impl Default for Cloner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cloner {
    /// Cloner using platform clone calls, the default retry policy, and real sleeps.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            ops: Arc::new(SystemCloneOps),
        }
    }

    /// Replace the raw clone calls.
    #[must_use]
    pub fn with_ops(mut self, ops: Arc<dyn CloneOps>) -> Self {
        self.ops = ops;
        self
    }

    /// Replace the sleeper used between retries.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Clone `source` into a new file at `target`.
    ///
    /// The target must not exist; its parent must. A failed clone removes the
    /// partially created target.
    ///
    /// # Errors
    ///
    /// - [`FsOpsError::TargetExists`] when `target` is already present.
    /// - [`FsOpsError::CloneUnsupported`] when neither clone call is implemented.
    /// - [`FsOpsError::CloneRetriesExhausted`] when transient failures outlast the policy.
    /// - [`FsOpsError::CloneFailed`] for any other clone error.
    pub fn clone_file(&self, source: &Path, target: &Path) -> FsOpsResult<CloneReport> {
        let source_file = File::open(source)
            .map_err(|err| FsOpsError::from_lookup("open_clone_source", source, err))?;
        let length = source_file
            .metadata()
            .map_err(|err| FsOpsError::io("stat_clone_source", source, err))?
            .len();
        let target_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .map_err(|err| {
                if err.kind() == io::ErrorKind::AlreadyExists {
                    FsOpsError::TargetExists {
                        path: target.to_path_buf(),
                    }
                } else {
                    FsOpsError::io("create_clone_target", target, err)
                }
            })?;

        let result = self.clone_with_retry(&source_file, &target_file, length, source, target);
        if result.is_err() {
            drop(target_file);
            if let Err(err) = fs::remove_file(target) {
                warn!(
                    error = %err,
                    target = %target.display(),
                    "failed to remove target after clone failure"
                );
            }
        }
        result
    }

    /// Verify that `dir` accepts clones by cloning a scratch file inside it.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::CloneUnsupported`] when the filesystem rejects the
    /// probe clone, or an IO error when the scratch file cannot be written.
    pub fn probe(&self, dir: &Path) -> FsOpsResult<()> {
        let token = Uuid::new_v4().simple().to_string();
        let probe_source = dir.join(format!("{PROBE_PREFIX}{token}"));
        let probe_target = dir.join(format!("{PROBE_PREFIX}{token}.clone"));
        fs::write(&probe_source, PROBE_PAYLOAD)
            .map_err(|err| FsOpsError::io("write_reflink_probe", &probe_source, err))?;

        let outcome = self.clone_file(&probe_source, &probe_target);
        for path in [&probe_source, &probe_target] {
            if path.exists()
                && let Err(err) = fs::remove_file(path)
            {
                warn!(error = %err, path = %path.display(), "failed to remove reflink probe");
            }
        }
        outcome.map(|report| {
            debug!(
                dir = %dir.display(),
                attempts = report.attempts,
                range_fallback = report.used_range_fallback,
                "reflink probe succeeded"
            );
        })
    }

    fn clone_with_retry(
        &self,
        source_file: &File,
        target_file: &File,
        length: u64,
        source: &Path,
        target: &Path,
    ) -> FsOpsResult<CloneReport> {
        let mut attempts = 0_u32;
        let mut use_range = false;
        loop {
            attempts += 1;
            let result = if use_range {
                self.ops.clone_range(source_file, target_file, length)
            } else {
                self.ops.clone_file(source_file, target_file)
            };
            let err = match result {
                Ok(()) => {
                    return Ok(CloneReport {
                        attempts,
                        used_range_fallback: use_range,
                    });
                }
                Err(err) => err,
            };

            match classify(&err) {
                CloneErrorClass::Transient if attempts < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempts);
                    warn!(
                        error = %err,
                        attempt = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        source = %source.display(),
                        "transient clone failure; retrying"
                    );
                    self.sleeper.sleep(delay);
                }
                CloneErrorClass::Transient => {
                    let (source_diag, target_diag) = diagnostics(source, target);
                    return Err(FsOpsError::CloneRetriesExhausted {
                        source_path: source.to_path_buf(),
                        target_path: target.to_path_buf(),
                        attempts,
                        source_device: source_diag.device,
                        source_fs_type: source_diag.fs_type,
                        target_device: target_diag.device,
                        target_fs_type: target_diag.fs_type,
                        source: err,
                    });
                }
                CloneErrorClass::Unsupported if !use_range => {
                    debug!(
                        error = %err,
                        source = %source.display(),
                        "whole-file clone unsupported; trying range clone"
                    );
                    use_range = true;
                }
                CloneErrorClass::Unsupported => {
                    let source_diag = describe(source);
                    return Err(FsOpsError::CloneUnsupported {
                        source_path: source.to_path_buf(),
                        target_path: target.to_path_buf(),
                        device: source_diag.device,
                        fs_type: source_diag.fs_type,
                        source: err,
                    });
                }
                CloneErrorClass::Fatal => {
                    let (source_diag, target_diag) = diagnostics(source, target);
                    return Err(FsOpsError::CloneFailed {
                        source_path: source.to_path_buf(),
                        target_path: target.to_path_buf(),
                        source_device: source_diag.device,
                        source_fs_type: source_diag.fs_type,
                        target_device: target_diag.device,
                        target_fs_type: target_diag.fs_type,
                        source: err,
                    });
                }
            }
        }
    }
}

fn diagnostics(
    source: &Path,
    target: &Path,
) -> (crate::DeviceDiagnostics, crate::DeviceDiagnostics) {
    let target_dir = target.parent().unwrap_or(target);
    (describe(source), describe(target_dir))
}

fn classify(err: &io::Error) -> CloneErrorClass {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
            return CloneErrorClass::Transient;
        }
        io::ErrorKind::Unsupported => return CloneErrorClass::Unsupported,
        _ => {}
    }

    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        use nix::errno::Errno;
        return match Errno::from_raw(code) {
            Errno::EAGAIN | Errno::EINTR => CloneErrorClass::Transient,
            Errno::EOPNOTSUPP | Errno::ENOTTY | Errno::ENOSYS | Errno::EINVAL => {
                CloneErrorClass::Unsupported
            }
            _ => CloneErrorClass::Fatal,
        };
    }

    CloneErrorClass::Fatal
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::fd::AsRawFd;

    /// Mirror of the kernel's `struct file_clone_range`.
    #[repr(C)]
    #[allow(dead_code)]
    pub(super) struct FileCloneRange {
        src_fd: i64,
        src_offset: u64,
        src_length: u64,
        dest_offset: u64,
    }

    nix::ioctl_write_int!(ficlone, 0x94, 9);
    nix::ioctl_write_ptr!(ficlonerange, 0x94, 13, FileCloneRange);

    #[allow(clippy::cast_sign_loss)]
    pub(super) fn clone_file(source: &File, target: &File) -> io::Result<()> {
        let source_fd = source.as_raw_fd() as nix::sys::ioctl::ioctl_param_type;
        // SAFETY: both descriptors stay open for the duration of the call.
        unsafe { ficlone(target.as_raw_fd(), source_fd) }
            .map(drop)
            .map_err(io::Error::from)
    }

    pub(super) fn clone_range(source: &File, target: &File, length: u64) -> io::Result<()> {
        let range = FileCloneRange {
            src_fd: i64::from(source.as_raw_fd()),
            src_offset: 0,
            src_length: length,
            dest_offset: 0,
        };
        // SAFETY: `range` outlives the call and both descriptors stay open.
        unsafe { ficlonerange(target.as_raw_fd(), &range) }
            .map(drop)
            .map_err(io::Error::from)
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::fs::File;
    use std::io;

    pub(super) fn clone_file(_source: &File, _target: &File) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    pub(super) fn clone_range(_source: &File, _target: &File, _length: u64) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}
