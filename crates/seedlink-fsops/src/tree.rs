//! Hardlink and reflink tree creation with rollback.
//!
//! # Design
//! - Every file and directory the builder creates is recorded so a failed tree
//!   can be removed without touching pre-existing paths or the source data.
//! - The first failure stops the tree; nothing continues past a link error.
//! - A target that already is the same physical file as its source counts as
//!   linked, so re-running a finished tree is a no-op.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::identity::identity;
use crate::reflink::Cloner;

/// One file to materialise in the target tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTask {
    /// Existing file holding the data.
    pub source: PathBuf,
    /// Path to create.
    pub target: PathBuf,
}

impl LinkTask {
    /// Construct a new task.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// How target files are created.
#[derive(Clone, Copy)]
pub enum LinkMethod<'a> {
    /// Hard links sharing the source inode.
    Hardlink,
    /// Copy-on-write clones created through the given cloner.
    Reflink(&'a Cloner),
}

impl LinkMethod<'_> {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Hardlink => "hardlink",
            Self::Reflink(_) => "reflink",
        }
    }
}

/// Counters for a completed tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeReport {
    /// Files newly created.
    pub linked: usize,
    /// Targets that already were the source file.
    pub reused: usize,
    /// Transient clone retries across all files.
    pub clone_retries: u32,
}

enum LinkOutcome {
    Created { clone_retries: u32 },
    Reused,
}

/// Builds a link tree and remembers what it created.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    created_files: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
}

impl TreeBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files created so far, in creation order.
    #[must_use]
    pub fn created_files(&self) -> &[PathBuf] {
        &self.created_files
    }

    /// Directories created so far, parents before children.
    #[must_use]
    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.created_dirs
    }

    /// Create `dir` and any missing ancestors, recording each one created.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when a directory cannot be created.
    pub fn ensure_dir(&mut self, dir: &Path) -> FsOpsResult<()> {
        let mut missing = Vec::new();
        let mut cursor = Some(dir);
        while let Some(current) = cursor {
            if current.as_os_str().is_empty() || current.exists() {
                break;
            }
            missing.push(current.to_path_buf());
            cursor = current.parent();
        }

        for path in missing.into_iter().rev() {
            match fs::create_dir(&path) {
                Ok(()) => self.created_dirs.push(path),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => {}
                Err(err) => return Err(FsOpsError::io("create_dir", path, err)),
            }
        }
        Ok(())
    }

    /// Materialise every task, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::PartialTree`] naming the failed target and the
    /// number of files completed before it. Created paths are kept for
    /// [`TreeBuilder::rollback`].
    pub fn link_all(&mut self, method: LinkMethod<'_>, tasks: &[LinkTask]) -> FsOpsResult<TreeReport> {
        let mut report = TreeReport::default();
        for (completed, task) in tasks.iter().enumerate() {
            match self.link_one(method, task) {
                Ok(LinkOutcome::Created { clone_retries }) => {
                    report.linked += 1;
                    report.clone_retries += clone_retries;
                    debug!(
                        method = method.label(),
                        source = %task.source.display(),
                        target = %task.target.display(),
                        "linked file"
                    );
                }
                Ok(LinkOutcome::Reused) => {
                    report.reused += 1;
                    debug!(target = %task.target.display(), "target already linked");
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        method = method.label(),
                        target = %task.target.display(),
                        completed,
                        total = tasks.len(),
                        "link tree creation stopped"
                    );
                    return Err(FsOpsError::PartialTree {
                        failed_target: task.target.clone(),
                        completed,
                        total: tasks.len(),
                        source: Box::new(err),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Remove everything this builder created: files first, then directories
    /// deepest first. Returns the number of paths removed.
    pub fn rollback(self) -> usize {
        let mut removed = 0;
        for file in self.created_files.iter().rev() {
            match fs::remove_file(file) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(error = %err, path = %file.display(), "rollback failed to remove file"),
            }
        }
        for dir in self.created_dirs.iter().rev() {
            match fs::remove_dir(dir) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(error = %err, path = %dir.display(), "rollback failed to remove directory"),
            }
        }
        removed
    }

    fn link_one(&mut self, method: LinkMethod<'_>, task: &LinkTask) -> FsOpsResult<LinkOutcome> {
        let source_identity = identity(&task.source)?;

        match fs::symlink_metadata(&task.target) {
            Ok(_) => {
                let existing = identity(&task.target)?;
                if existing.id == source_identity.id {
                    return Ok(LinkOutcome::Reused);
                }
                return Err(FsOpsError::TargetExists {
                    path: task.target.clone(),
                });
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(FsOpsError::io("stat_link_target", &task.target, err)),
        }

        if let Some(parent) = task.target.parent() {
            self.ensure_dir(parent)?;
        }

        let clone_retries = match method {
            LinkMethod::Hardlink => {
                fs::hard_link(&task.source, &task.target).map_err(|err| {
                    if err.kind() == io::ErrorKind::AlreadyExists {
                        FsOpsError::TargetExists {
                            path: task.target.clone(),
                        }
                    } else {
                        FsOpsError::io("hard_link", &task.target, err)
                    }
                })?;
                0
            }
            LinkMethod::Reflink(cloner) => {
                let report = cloner.clone_file(&task.source, &task.target)?;
                report
                    .attempts
                    .saturating_sub(1 + u32::from(report.used_range_fallback))
            }
        };
        self.created_files.push(task.target.clone());
        Ok(LinkOutcome::Created { clone_retries })
    }
}
