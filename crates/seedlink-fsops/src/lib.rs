#![deny(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(
    dead_code,
    unused,
    unused_imports,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

//! Filesystem primitives for building cross-seed link trees.
//!
//! Layout: `paths.rs` (path canonicalisation), `identity/` (physical file
//! identity per platform), `reflink.rs` (copy-on-write clones with retry),
//! `tree.rs` (hardlink/reflink tree creation with rollback).

pub mod error;
pub mod identity;
pub mod paths;
pub mod reflink;
pub mod tree;

pub use error::{FsOpsError, FsOpsResult};
pub use identity::{DeviceDiagnostics, FileId, FileIdentity, describe, identity, same_filesystem};
pub use paths::{normalize, normalize_fold};
pub use reflink::{CloneOps, CloneReport, Cloner, RetryPolicy, Sleeper, SystemCloneOps, ThreadSleeper};
pub use tree::{LinkMethod, LinkTask, TreeBuilder, TreeReport};
