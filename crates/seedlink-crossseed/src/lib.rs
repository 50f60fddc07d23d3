#![forbid(unsafe_code)]
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

//! Cross-seed linking engine: decides how an incoming torrent reuses the data of
//! an already-seeded match, builds the hardlink or reflink tree when configured,
//! and drives the post-add recheck.
//!
//! Layout: `pieces.rs` (piece layout and boundary analysis), `pairing.rs` (file
//! pairing), `layout.rs` (directory presets), `category.rs` (category
//! inheritance), `strategy.rs` (link strategies and plans), `orchestrator.rs`
//! (plan/execute), `recheck.rs` (auto-resume decision), `locks.rs` (per-hash
//! advisory locks), `cache.rs` (tracker-name TTL cache), `error.rs`.

pub mod cache;
pub mod category;
pub mod error;
pub mod layout;
pub mod locks;
pub mod orchestrator;
pub mod pairing;
pub mod pieces;
pub mod recheck;
pub mod strategy;

pub use cache::{Clock, SystemClock, TrackerNameCache};
pub use category::{BaseCategory, CROSS_SUFFIX, CategoryDecision, CategoryResolver, EnsureCategory};
pub use error::{
    CrossSeedError, CrossSeedErrorKind, CrossSeedResult, REASON_CLIENT, REASON_CLONE_UNSUPPORTED,
    REASON_CROSS_FILESYSTEM, REASON_FILESYSTEM, REASON_INCOMPLETE_MATCH, REASON_PARTIAL_TREE,
    REASON_PARTIALLY_APPLIED, REASON_RECHECK_REQUIRED, REASON_TRANSIENT_IO, REASON_UNSAFE_OVERLAP,
};
pub use layout::{
    DirectoryDecision, DirectoryPresetResolver, has_root_folder, isolation_folder_name,
    requires_isolation, sanitize_component,
};
pub use locks::{HashGuard, HashLocks};
pub use orchestrator::{CrossSeedOrchestrator, CrossSeedPlan, ExecutionReport};
pub use pairing::{FilePair, FilePairing, pair_files};
pub use pieces::{ExtraFileSet, FileSpan, PieceLayout, SafetyVerdict, analyze};
pub use recheck::{DEFAULT_RECHECK_THRESHOLD, RecheckMonitor, RecheckOutcome, RecheckState};
pub use strategy::{
    DefaultStrategy, FileAction, HardlinkStrategy, LinkPlan, LinkStrategy, PlanInput, PlannedFile,
    ReflinkStrategy, RenameInstruction, RenameKind, StrategyTag,
};
