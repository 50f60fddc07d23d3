//! Prometheus-backed metrics registry for cross-seed attempts.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Cheap to clone; every clone records into the same registry.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the engine.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    attempts_total: IntCounterVec,
    linked_files_total: IntCounterVec,
    clone_retries_total: IntCounter,
    recheck_outcomes_total: IntCounterVec,
}

/// Snapshot of selected counters for health reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Files hardlinked into cross-seed trees.
    pub hardlinked_files: u64,
    /// Files cloned into cross-seed trees.
    pub reflinked_files: u64,
    /// Transient clone retries.
    pub clone_retries_total: u64,
    /// Rechecks that ended in an automatic resume.
    pub rechecks_auto_resumed: u64,
    /// Rechecks that left the torrent paused.
    pub rechecks_staying_paused: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the cross-seed collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let attempts_total = IntCounterVec::new(
            Opts::new(
                "crossseed_attempts_total",
                "Cross-seed attempts by link mode and outcome",
            ),
            &["mode", "outcome"],
        )
        .map_err(|source| collector("crossseed_attempts_total", source))?;
        let linked_files_total = IntCounterVec::new(
            Opts::new(
                "crossseed_linked_files_total",
                "Files materialised in cross-seed trees by link kind",
            ),
            &["kind"],
        )
        .map_err(|source| collector("crossseed_linked_files_total", source))?;
        let clone_retries_total = IntCounter::with_opts(Opts::new(
            "crossseed_clone_retries_total",
            "Transient clone failures retried",
        ))
        .map_err(|source| collector("crossseed_clone_retries_total", source))?;
        let recheck_outcomes_total = IntCounterVec::new(
            Opts::new(
                "crossseed_recheck_outcomes_total",
                "Recheck decisions by outcome",
            ),
            &["outcome"],
        )
        .map_err(|source| collector("crossseed_recheck_outcomes_total", source))?;

        register(&registry, "crossseed_attempts_total", &attempts_total)?;
        register(&registry, "crossseed_linked_files_total", &linked_files_total)?;
        register(&registry, "crossseed_clone_retries_total", &clone_retries_total)?;
        register(
            &registry,
            "crossseed_recheck_outcomes_total",
            &recheck_outcomes_total,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                attempts_total,
                linked_files_total,
                clone_retries_total,
                recheck_outcomes_total,
            }),
        })
    }

    /// Count one cross-seed attempt by link mode and outcome (`added`, `skipped`, `failed`).
    pub fn inc_attempt(&self, mode: &str, outcome: &str) {
        self.inner
            .attempts_total
            .with_label_values(&[mode, outcome])
            .inc();
    }

    /// Add files materialised with the given link kind (`hardlink` or `reflink`).
    pub fn add_linked_files(&self, kind: &str, count: u64) {
        self.inner
            .linked_files_total
            .with_label_values(&[kind])
            .inc_by(count);
    }

    /// Add transient clone retries.
    pub fn add_clone_retries(&self, count: u64) {
        self.inner.clone_retries_total.inc_by(count);
    }

    /// Count one recheck decision (`auto_resumed` or `staying_paused`).
    pub fn inc_recheck_outcome(&self, outcome: &str) {
        self.inner
            .recheck_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Current attempt count for a mode and outcome pair.
    #[must_use]
    pub fn attempts(&self, mode: &str, outcome: &str) -> u64 {
        self.inner
            .attempts_total
            .with_label_values(&[mode, outcome])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the cross-seed counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            hardlinked_files: inner.linked_files_total.with_label_values(&["hardlink"]).get(),
            reflinked_files: inner.linked_files_total.with_label_values(&["reflink"]).get(),
            clone_retries_total: inner.clone_retries_total.get(),
            rechecks_auto_resumed: inner
                .recheck_outcomes_total
                .with_label_values(&["auto_resumed"])
                .get(),
            rechecks_staying_paused: inner
                .recheck_outcomes_total
                .with_label_values(&["staying_paused"])
                .get(),
        }
    }
}

const fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_attempt("hardlink", "added");
        metrics.inc_attempt("hardlink", "added");
        metrics.inc_attempt("reflink", "skipped");
        metrics.add_linked_files("hardlink", 3);
        metrics.add_linked_files("reflink", 1);
        metrics.add_clone_retries(2);
        metrics.inc_recheck_outcome("auto_resumed");
        metrics.inc_recheck_outcome("staying_paused");

        let snapshot = metrics.clone().snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                hardlinked_files: 3,
                reflinked_files: 1,
                clone_retries_total: 2,
                rechecks_auto_resumed: 1,
                rechecks_staying_paused: 1,
            }
        );
        assert_eq!(metrics.attempts("hardlink", "added"), 2);
        assert_eq!(metrics.attempts("default", "added"), 0);

        let rendered = metrics.render()?;
        assert!(rendered.contains("crossseed_attempts_total"));
        assert!(rendered.contains("crossseed_recheck_outcomes_total"));
        Ok(())
    }
}
