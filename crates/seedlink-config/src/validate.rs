//! Validation and normalisation of instance settings.
//!
//! # Design
//! - Rejects combinations the engine cannot honour before any filesystem work.
//! - Surfaces an "effective" view with derived values plus guard-rail warnings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{EffectiveSettings, InstanceSettings, LinkMode};

const SECTION_FALLBACK: &str = "instance";
const KNOWN_FIELDS: &[&str] = &[
    "instance_name",
    "local_filesystem_access",
    "hardlink_enabled",
    "reflink_enabled",
    "link_base_dir",
    "directory_preset",
    "size_mismatch_tolerance_percent",
    "skip_recheck",
    "use_indexer_name_as_category",
    "cross_category_suffix",
    "tags",
    "start_paused",
];

/// Decode one instance's settings from a JSON object, rejecting unknown keys.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the payload is not an object,
/// [`ConfigError::UnknownField`] for unexpected keys, and
/// [`ConfigError::Parse`] when a field has the wrong type.
pub fn parse_instance_settings(value: &Value) -> ConfigResult<InstanceSettings> {
    let section = value
        .get("instance_name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(SECTION_FALLBACK)
        .to_string();
    let Some(map) = value.as_object() else {
        return Err(ConfigError::invalid(
            &section,
            "<root>",
            Some(value.to_string()),
            "must be a JSON object",
        ));
    };
    if let Some(field) = map.keys().find(|key| !KNOWN_FIELDS.contains(&key.as_str())) {
        return Err(ConfigError::UnknownField {
            section,
            field: field.clone(),
        });
    }
    serde_json::from_value(value.clone()).map_err(|source| ConfigError::Parse { section, source })
}

/// Validate settings and derive the effective view.
///
/// # Errors
///
/// - [`ConfigError::ConflictingFields`] when hardlink and reflink are both enabled.
/// - [`ConfigError::InvalidField`] for an empty instance name, an out-of-range
///   tolerance, or a link mode without local access or an absolute base directory.
pub fn normalize_instance_settings(settings: &InstanceSettings) -> ConfigResult<EffectiveSettings> {
    let instance_name = settings.instance_name.trim().to_string();
    if instance_name.is_empty() {
        return Err(ConfigError::invalid(
            SECTION_FALLBACK,
            "instance_name",
            None,
            "must not be empty",
        ));
    }
    let section = instance_name.as_str();

    let tolerance = settings.size_mismatch_tolerance_percent;
    if !(0.0..=100.0).contains(&tolerance) {
        return Err(ConfigError::invalid(
            section,
            "size_mismatch_tolerance_percent",
            Some(tolerance.to_string()),
            "must be between 0 and 100",
        ));
    }

    let mut warnings = Vec::new();
    let link_mode = resolve_link_mode(section, settings, &mut warnings)?;
    let tags = normalize_tags(&settings.tags, &mut warnings);

    if settings.skip_recheck && matches!(link_mode, LinkMode::Reflink { .. }) {
        warnings.push(
            "reflink mode always rechecks; cross-seeds are skipped while skip_recheck is enabled"
                .to_string(),
        );
    }

    for warning in &warnings {
        warn!(instance = section, warning = %warning, "cross-seed settings guard rail applied");
    }

    Ok(EffectiveSettings {
        instance_name: instance_name.clone(),
        local_filesystem_access: settings.local_filesystem_access,
        link_mode,
        recheck_threshold_percent: 100.0 - tolerance,
        skip_recheck: settings.skip_recheck,
        use_indexer_name_as_category: settings.use_indexer_name_as_category,
        cross_category_suffix: settings.cross_category_suffix,
        tags,
        start_paused: settings.start_paused,
        warnings,
    })
}

fn resolve_link_mode(
    section: &str,
    settings: &InstanceSettings,
    warnings: &mut Vec<String>,
) -> ConfigResult<LinkMode> {
    let base_dir = settings
        .link_base_dir
        .as_deref()
        .map(str::trim)
        .filter(|dir| !dir.is_empty());

    if settings.hardlink_enabled && settings.reflink_enabled {
        return Err(ConfigError::ConflictingFields {
            section: section.to_string(),
            first: "hardlink_enabled",
            second: "reflink_enabled",
            reason: "hardlink and reflink modes are mutually exclusive",
        });
    }

    if !settings.hardlink_enabled && !settings.reflink_enabled {
        if base_dir.is_some() {
            warnings.push("link_base_dir is ignored because no link mode is enabled".to_string());
        }
        return Ok(LinkMode::Default);
    }

    if !settings.local_filesystem_access {
        return Err(ConfigError::invalid(
            section,
            "local_filesystem_access",
            Some("false".to_string()),
            "link modes require local filesystem access",
        ));
    }

    let Some(raw_dir) = base_dir else {
        return Err(ConfigError::invalid(
            section,
            "link_base_dir",
            None,
            "required when a link mode is enabled",
        ));
    };
    if !Path::new(raw_dir).is_absolute() {
        return Err(ConfigError::invalid(
            section,
            "link_base_dir",
            Some(raw_dir.to_string()),
            "must be an absolute path",
        ));
    }

    let base_dir = PathBuf::from(raw_dir);
    let preset = settings.directory_preset;
    Ok(if settings.hardlink_enabled {
        LinkMode::Hardlink { base_dir, preset }
    } else {
        LinkMode::Reflink { base_dir, preset }
    })
}

fn normalize_tags(tags: &[String], warnings: &mut Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(tags.len());
    let mut dropped = 0_usize;
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            dropped += 1;
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    if dropped > 0 {
        warnings.push(format!("dropped {dropped} empty or duplicate tag(s)"));
    }
    normalized
}
