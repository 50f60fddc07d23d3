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

//! Engine-agnostic torrent descriptors and the collaborator traits consumed by
//! the cross-seed engine.
//!
//! Layout: `model/` (torrent snapshots and client DTOs), `service/` (client,
//! matcher, and tracker-name traits), `error.rs` (shared error type).

pub mod error;
pub mod model;
pub mod service;

pub use error::{TorrentError, TorrentResult};
pub use model::{
    AddTorrentRequest, ClientTorrentId, ClientTorrentState, ContentLayout, FileEntry,
    IncomingTorrent, MatchedTorrent, TorrentActivity, TorrentHash, TorrentSource,
};
pub use service::{TorrentClient, TorrentMatcher, TrackerNameResolver};
