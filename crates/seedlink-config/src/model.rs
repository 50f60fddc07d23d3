//! Typed settings models and the effective view handed to the engine.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default tag attached to cross-seeded torrents.
pub const DEFAULT_TAG: &str = "cross-seed";
/// Default size-mismatch tolerance in percent.
pub const DEFAULT_TOLERANCE_PERCENT: f64 = 5.0;

/// Directory layout used under the link base directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectoryPreset {
    /// Every torrent gets its own isolation folder directly under the base.
    Flat,
    /// One directory per tracker display name.
    #[default]
    ByTracker,
    /// One directory per client instance.
    ByInstance,
}

impl DirectoryPreset {
    #[must_use]
    /// Render the preset as its canonical string representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::ByTracker => "by-tracker",
            Self::ByInstance => "by-instance",
        }
    }
}

impl fmt::Display for DirectoryPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-seed settings for one torrent-client instance, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSettings {
    /// Instance name used by the `by-instance` preset and in logs.
    pub instance_name: String,
    /// Whether this process can reach the instance's download paths.
    pub local_filesystem_access: bool,
    /// Build hardlink trees for cross-seeds.
    pub hardlink_enabled: bool,
    /// Build copy-on-write reflink trees for cross-seeds.
    pub reflink_enabled: bool,
    /// Root directory for link trees; required when a link mode is enabled.
    pub link_base_dir: Option<String>,
    /// Layout of link trees under the base directory.
    pub directory_preset: DirectoryPreset,
    /// Allowed size mismatch in percent; the recheck resume threshold is `100 - tolerance`.
    pub size_mismatch_tolerance_percent: f64,
    /// Refuse cross-seeds that would need a recheck.
    pub skip_recheck: bool,
    /// Use the indexer name as category instead of the `.cross` category.
    pub use_indexer_name_as_category: bool,
    /// Append `.cross` to inherited categories.
    pub cross_category_suffix: bool,
    /// Tags attached to every cross-seeded torrent.
    pub tags: Vec<String>,
    /// Add cross-seeds paused even when nothing else requires it.
    pub start_paused: bool,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            instance_name: String::new(),
            local_filesystem_access: false,
            hardlink_enabled: false,
            reflink_enabled: false,
            link_base_dir: None,
            directory_preset: DirectoryPreset::default(),
            size_mismatch_tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            skip_recheck: false,
            use_indexer_name_as_category: false,
            cross_category_suffix: true,
            tags: vec![DEFAULT_TAG.to_string()],
            start_paused: false,
        }
    }
}

/// Effective linking mode after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LinkMode {
    /// Reuse the matched torrent's data in place.
    Default,
    /// Build a hardlink tree under `base_dir`.
    Hardlink {
        /// Absolute link base directory.
        base_dir: PathBuf,
        /// Directory preset applied under the base.
        preset: DirectoryPreset,
    },
    /// Build a reflink tree under `base_dir`.
    Reflink {
        /// Absolute link base directory.
        base_dir: PathBuf,
        /// Directory preset applied under the base.
        preset: DirectoryPreset,
    },
}

impl LinkMode {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Hardlink { .. } => "hardlink",
            Self::Reflink { .. } => "reflink",
        }
    }

    /// Base directory for link modes.
    #[must_use]
    pub fn base_dir(&self) -> Option<&Path> {
        match self {
            Self::Default => None,
            Self::Hardlink { base_dir, .. } | Self::Reflink { base_dir, .. } => Some(base_dir),
        }
    }

    /// Directory preset for link modes.
    #[must_use]
    pub const fn preset(&self) -> Option<DirectoryPreset> {
        match self {
            Self::Default => None,
            Self::Hardlink { preset, .. } | Self::Reflink { preset, .. } => Some(*preset),
        }
    }
}

/// Effective settings after guard rails, consumed by the cross-seed engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveSettings {
    /// Instance name.
    pub instance_name: String,
    /// Whether this process can reach the instance's download paths.
    pub local_filesystem_access: bool,
    /// Validated linking mode.
    pub link_mode: LinkMode,
    /// Completion percentage at or above which a rechecked torrent resumes.
    pub recheck_threshold_percent: f64,
    /// Refuse cross-seeds that would need a recheck.
    pub skip_recheck: bool,
    /// Use the indexer name as category.
    pub use_indexer_name_as_category: bool,
    /// Append `.cross` to inherited categories.
    pub cross_category_suffix: bool,
    /// De-duplicated, non-empty tags.
    pub tags: Vec<String>,
    /// Add cross-seeds paused.
    pub start_paused: bool,
    /// Guard-rail or normalisation warnings applied to the settings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_uses_defaults() -> anyhow::Result<()> {
        let settings: InstanceSettings = serde_json::from_value(json!({}))?;
        assert_eq!(settings, InstanceSettings::default());
        assert_eq!(settings.directory_preset, DirectoryPreset::ByTracker);
        assert!(settings.cross_category_suffix);
        assert_eq!(settings.tags, vec![DEFAULT_TAG.to_string()]);
        Ok(())
    }

    #[test]
    fn presets_use_kebab_case() -> anyhow::Result<()> {
        let preset: DirectoryPreset = serde_json::from_value(json!("by-instance"))?;
        assert_eq!(preset, DirectoryPreset::ByInstance);
        assert_eq!(serde_json::to_value(DirectoryPreset::Flat)?, json!("flat"));
        assert_eq!(DirectoryPreset::ByTracker.to_string(), "by-tracker");
        Ok(())
    }

    #[test]
    fn link_mode_accessors() {
        let mode = LinkMode::Reflink {
            base_dir: PathBuf::from("/data/links"),
            preset: DirectoryPreset::Flat,
        };
        assert_eq!(mode.label(), "reflink");
        assert_eq!(mode.base_dir(), Some(Path::new("/data/links")));
        assert_eq!(mode.preset(), Some(DirectoryPreset::Flat));
        assert_eq!(LinkMode::Default.base_dir(), None);
    }
}
