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

//! Per-instance cross-seed settings.
//!
//! Layout: `model.rs` (serde settings model and effective view), `validate.rs`
//! (normalisation into an effective [`LinkMode`]), `loader.rs` (JSON documents
//! and the async [`SettingsProvider`] seam).

pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{JsonSettingsProvider, SettingsFile, SettingsProvider};
pub use model::{DirectoryPreset, EffectiveSettings, InstanceSettings, LinkMode};
pub use validate::{normalize_instance_settings, parse_instance_settings};
