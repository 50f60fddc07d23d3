//! JSON settings documents keyed by instance name.
//!
//! # Design
//! - A document is a JSON object whose keys are instance names and whose values
//!   are [`InstanceSettings`] objects; the key fills in a missing `instance_name`.
//! - [`SettingsProvider`] is the async seam the orchestration layer reads from;
//!   [`JsonSettingsProvider`] re-reads the file on every lookup so edits apply
//!   to the next attempt without a restart.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{EffectiveSettings, InstanceSettings};
use crate::validate::{normalize_instance_settings, parse_instance_settings};

/// Source of effective per-instance settings.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Effective settings for the named instance.
    async fn instance_settings(&self, instance: &str) -> ConfigResult<EffectiveSettings>;
}

/// Parsed settings document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsFile {
    instances: BTreeMap<String, InstanceSettings>,
}

impl SettingsFile {
    /// Read and parse a settings document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and the
    /// [`SettingsFile::from_value`] errors for malformed content.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: "read_settings",
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = Self::from_str_document(&raw)?;
        debug!(
            path = %path.display(),
            instances = parsed.instances.len(),
            "loaded cross-seed settings"
        );
        Ok(parsed)
    }

    /// Parse a settings document from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid JSON and the
    /// [`SettingsFile::from_value`] errors for malformed content.
    pub fn from_str_document(raw: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            section: "<document>".to_string(),
            source,
        })?;
        Self::from_value(&value)
    }

    /// Build a settings document from a decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the document is not an object
    /// or an entry's `instance_name` disagrees with its key, plus any
    /// [`parse_instance_settings`] error.
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        let Some(entries) = value.as_object() else {
            return Err(ConfigError::invalid(
                "<document>",
                "<root>",
                None,
                "must be a JSON object keyed by instance name",
            ));
        };

        let mut instances = BTreeMap::new();
        for (name, entry) in entries {
            let mut settings = parse_instance_settings(entry)?;
            let declared = settings.instance_name.trim();
            if declared.is_empty() {
                settings.instance_name.clone_from(name);
            } else if declared != name.as_str() {
                return Err(ConfigError::invalid(
                    name,
                    "instance_name",
                    Some(settings.instance_name.clone()),
                    "must match the document key",
                ));
            }
            instances.insert(name.clone(), settings);
        }
        Ok(Self { instances })
    }

    /// Names of every configured instance, sorted.
    pub fn instance_names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    /// Stored settings for an instance.
    #[must_use]
    pub fn raw(&self, instance: &str) -> Option<&InstanceSettings> {
        self.instances.get(instance)
    }

    /// Validated settings for an instance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownInstance`] for unknown names and any
    /// [`normalize_instance_settings`] error.
    pub fn effective(&self, instance: &str) -> ConfigResult<EffectiveSettings> {
        let settings = self
            .instances
            .get(instance)
            .ok_or_else(|| ConfigError::UnknownInstance {
                name: instance.to_string(),
            })?;
        normalize_instance_settings(settings)
    }
}

#[async_trait]
impl SettingsProvider for SettingsFile {
    async fn instance_settings(&self, instance: &str) -> ConfigResult<EffectiveSettings> {
        self.effective(instance)
    }
}

/// Provider that re-reads a JSON settings file on every lookup.
#[derive(Debug, Clone)]
pub struct JsonSettingsProvider {
    path: PathBuf,
}

impl JsonSettingsProvider {
    /// Provider for the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsProvider for JsonSettingsProvider {
    async fn instance_settings(&self, instance: &str) -> ConfigResult<EffectiveSettings> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigError::Io {
                operation: "read_settings",
                path: self.path.clone(),
                source,
            })?;
        SettingsFile::from_str_document(&raw)?.effective(instance)
    }
}
