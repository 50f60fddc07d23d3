//! Top-level cross-seed coordinator.
//!
//! # Design
//! - `plan` reads the filesystem and the client but never changes either
//!   (reflink probes excepted), so a rejected attempt leaves no trace.
//! - `execute` requires the caller's [`HashGuard`] for the matched torrent and
//!   rolls back every path it created when any later step fails.
//! - Recheck monitoring is caller-driven through [`CrossSeedOrchestrator::monitor_recheck`].

use std::sync::Arc;

use seedlink_config::{EffectiveSettings, LinkMode};
use seedlink_fsops::{Cloner, FsOpsError, LinkMethod, TreeBuilder, TreeReport, normalize};
use seedlink_telemetry::Metrics;
use seedlink_torrent_core::{
    AddTorrentRequest, ClientTorrentId, IncomingTorrent, MatchedTorrent, TorrentClient,
    TorrentHash, TorrentMatcher, TrackerNameResolver,
};
use tracing::{debug, info, warn};

use crate::category::{BaseCategory, CategoryDecision, CategoryResolver};
use crate::error::{CrossSeedError, CrossSeedResult};
use crate::layout::DirectoryPresetResolver;
use crate::locks::HashGuard;
use crate::pairing::pair_files;
use crate::pieces::{PieceLayout, SafetyVerdict};
use crate::recheck::{RecheckMonitor, RecheckOutcome};
use crate::strategy::{
    DefaultStrategy, HardlinkStrategy, LinkPlan, LinkStrategy, PlanInput, ReflinkStrategy,
    RenameKind, StrategyTag,
};

/// Everything needed to execute one cross-seed.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSeedPlan {
    /// Filesystem plan.
    pub link_plan: LinkPlan,
    /// Category decision applied to the request.
    pub category: CategoryDecision,
    /// Fully resolved add request.
    pub request: AddTorrentRequest,
    /// Auto-resume threshold for the recheck.
    pub recheck_threshold_percent: f64,
}

impl CrossSeedPlan {
    /// Strategy that produced the plan.
    #[must_use]
    pub const fn strategy(&self) -> StrategyTag {
        self.link_plan.strategy
    }
}

/// What `execute` did.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Identifier returned by the client.
    pub client_id: ClientTorrentId,
    /// Files created in the link tree.
    pub linked: usize,
    /// Tree entries that already pointed at the source.
    pub reused: usize,
    /// Renames applied on the client.
    pub renames_applied: usize,
    /// Monitor for the recheck, when one was started.
    pub recheck: Option<RecheckMonitor>,
}

/// Plans and executes cross-seeds against one torrent client.
pub struct CrossSeedOrchestrator<C: TorrentClient + ?Sized> {
    client: Arc<C>,
    trackers: Arc<dyn TrackerNameResolver>,
    cloner: Cloner,
    metrics: Option<Metrics>,
}

impl<C: TorrentClient + ?Sized> CrossSeedOrchestrator<C> {
    /// Orchestrator using the platform clone primitive and no metrics.
    #[must_use]
    pub fn new(client: Arc<C>, trackers: Arc<dyn TrackerNameResolver>) -> Self {
        Self {
            client,
            trackers,
            cloner: Cloner::new(),
            metrics: None,
        }
    }

    /// Replace the clone primitive used for probes and reflink trees.
    #[must_use]
    pub fn with_cloner(mut self, cloner: Cloner) -> Self {
        self.cloner = cloner;
        self
    }

    /// Record attempts into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Ask `matcher` for a source and plan against it.
    ///
    /// Returns `Ok(None)` when the matcher finds nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CrossSeedError::Client`] when the matcher fails, or any
    /// planning error from [`Self::plan`].
    pub async fn plan_from_matcher(
        &self,
        matcher: &dyn TorrentMatcher,
        incoming: &IncomingTorrent,
        settings: &EffectiveSettings,
    ) -> CrossSeedResult<Option<CrossSeedPlan>> {
        let matched = matcher
            .find_match(incoming)
            .await
            .map_err(|err| CrossSeedError::client("find_match", &incoming.hash, err))?;
        let Some(matched) = matched else {
            debug!(hash = %incoming.hash, "no matching torrent");
            return Ok(None);
        };
        self.plan(incoming, &matched, settings).await.map(Some)
    }

    /// Decide how `incoming` reuses `matched`'s data.
    ///
    /// # Errors
    ///
    /// Returns the skip or failure reason; nothing on disk or on the client is
    /// changed when planning fails.
    pub async fn plan(
        &self,
        incoming: &IncomingTorrent,
        matched: &MatchedTorrent,
        settings: &EffectiveSettings,
    ) -> CrossSeedResult<CrossSeedPlan> {
        let result = self.build_plan(incoming, matched, settings).await;
        if let Err(err) = &result {
            self.record_rejection(settings.link_mode.label(), err);
        }
        result
    }

    async fn build_plan(
        &self,
        incoming: &IncomingTorrent,
        matched: &MatchedTorrent,
        settings: &EffectiveSettings,
    ) -> CrossSeedResult<CrossSeedPlan> {
        if !matched.is_complete() {
            return Err(CrossSeedError::Ineligible {
                hash: matched.hash.clone(),
                progress: matched.progress,
            });
        }
        if settings.link_mode != LinkMode::Default && !settings.local_filesystem_access {
            return Err(CrossSeedError::Configuration {
                reason: "link modes require local filesystem access",
                source: None,
            });
        }

        let layout = PieceLayout::from_incoming(incoming)?;
        let pairing = pair_files(&incoming.files, &matched.files);
        if pairing.pairs.is_empty() {
            return Err(CrossSeedError::InvalidInput {
                field: "files",
                reason: "no incoming file matches the matched torrent",
            });
        }

        let strategy = self.strategy_for(incoming, settings);
        let link_plan = strategy.plan(&PlanInput {
            incoming,
            matched,
            pairing: &pairing,
            layout: &layout,
            skip_recheck: settings.skip_recheck,
        })?;
        ensure_safe(&link_plan.safety_verdict)?;
        if settings.skip_recheck && link_plan.recheck_required {
            return Err(CrossSeedError::RecheckRequired {
                mode: link_plan.strategy.label(),
            });
        }

        let base = self.base_category(matched).await?;
        let category = CategoryResolver::new(settings.cross_category_suffix).resolve(
            matched,
            &base,
            settings.use_indexer_name_as_category,
            incoming.indexer.as_deref(),
        );
        let request = build_request(incoming, &link_plan, &category, settings);

        info!(
            hash = %incoming.hash,
            matched = %matched.hash,
            strategy = link_plan.strategy.label(),
            save_path = request.save_path.as_deref().unwrap_or("<auto>"),
            category = request.category.as_deref().unwrap_or("<none>"),
            auto_managed = request.auto_managed,
            recheck = link_plan.recheck_required,
            renames = link_plan.renames.len(),
            downloads = link_plan.downloads(),
            "cross-seed planned"
        );
        Ok(CrossSeedPlan {
            link_plan,
            category,
            request,
            recheck_threshold_percent: settings.recheck_threshold_percent,
        })
    }

    fn strategy_for(&self, incoming: &IncomingTorrent, settings: &EffectiveSettings) -> Box<dyn LinkStrategy> {
        let tracker_name = || {
            self.trackers
                .display_name(&incoming.tracker)
                .unwrap_or_else(|| incoming.tracker.clone())
        };
        match &settings.link_mode {
            LinkMode::Default => Box::new(DefaultStrategy),
            LinkMode::Hardlink { base_dir, preset } => Box::new(HardlinkStrategy::new(
                DirectoryPresetResolver::new(base_dir.clone(), *preset, settings.instance_name.clone()),
                tracker_name(),
            )),
            LinkMode::Reflink { base_dir, preset } => Box::new(ReflinkStrategy::new(
                DirectoryPresetResolver::new(base_dir.clone(), *preset, settings.instance_name.clone()),
                tracker_name(),
                self.cloner.clone(),
            )),
        }
    }

    async fn base_category(&self, matched: &MatchedTorrent) -> CrossSeedResult<BaseCategory> {
        if matched.category.trim().is_empty() {
            return Ok(BaseCategory::default());
        }
        let save_path = self
            .client
            .category_save_path(&matched.category)
            .await
            .map_err(|err| CrossSeedError::client("category_save_path", &matched.hash, err))?
            .filter(|path| !path.trim().is_empty());
        Ok(BaseCategory {
            name: matched.category.clone(),
            save_path,
        })
    }

    /// Build the link tree, add the torrent, apply renames, and start the recheck.
    ///
    /// # Errors
    ///
    /// - [`CrossSeedError::InvalidInput`] when `guard` covers a different hash.
    /// - [`CrossSeedError::PartialTree`] when tree creation stops partway; the
    ///   created paths have been removed.
    /// - [`CrossSeedError::Client`] when the category or add call fails; the
    ///   tree has been removed.
    /// - [`CrossSeedError::PartiallyApplied`] when a rename or the recheck
    ///   request fails after the add; the torrent stays paused and the tree is kept.
    pub async fn execute(&self, plan: &CrossSeedPlan, guard: &HashGuard) -> CrossSeedResult<ExecutionReport> {
        let mode = plan.link_plan.strategy.label();
        let result = self.run(plan, guard).await;
        match &result {
            Ok(_) => self.record(|metrics| metrics.inc_attempt(mode, "added")),
            Err(err) => self.record_rejection(mode, err),
        }
        result
    }

    async fn run(&self, plan: &CrossSeedPlan, guard: &HashGuard) -> CrossSeedResult<ExecutionReport> {
        if guard.hash() != &plan.link_plan.matched_hash {
            return Err(CrossSeedError::InvalidInput {
                field: "guard",
                reason: "lock guard does not cover the matched torrent",
            });
        }
        ensure_safe(&plan.link_plan.safety_verdict)?;

        let hash = &plan.request.hash;
        let (tree, report) = self.build_tree(&plan.link_plan)?;

        if let Some(ensure) = &plan.category.ensure
            && let Err(err) = self
                .client
                .ensure_category(&ensure.name, ensure.save_path.as_deref())
                .await
        {
            discard(tree);
            return Err(CrossSeedError::client("ensure_category", hash, err));
        }

        let client_id = match self.client.add_torrent(plan.request.clone()).await {
            Ok(id) => id,
            Err(err) => {
                discard(tree);
                return Err(CrossSeedError::client("add_torrent", hash, err));
            }
        };

        let mut renames_applied = 0;
        for kind in [RenameKind::Folder, RenameKind::File] {
            for rename in plan.link_plan.renames.iter().filter(|rename| rename.kind == kind) {
                let outcome = match kind {
                    RenameKind::Folder => self.client.rename_folder(hash, &rename.from, &rename.to).await,
                    RenameKind::File => self.client.rename_file(hash, &rename.from, &rename.to).await,
                };
                outcome.map_err(|err| {
                    warn!(
                        hash = %hash,
                        from = %rename.from,
                        to = %rename.to,
                        "rename failed after add; torrent left paused"
                    );
                    CrossSeedError::partially_applied(&client_id, "rename", renames_applied, hash, err)
                })?;
                renames_applied += 1;
            }
        }

        let recheck = if plan.link_plan.recheck_required {
            let baseline = self.progress_before_recheck(hash).await;
            self.client.recheck(hash).await.map_err(|err| {
                warn!(hash = %hash, "recheck request failed after add; torrent left paused");
                CrossSeedError::partially_applied(&client_id, "recheck", renames_applied, hash, err)
            })?;
            let monitor = RecheckMonitor::new(hash.clone(), plan.recheck_threshold_percent);
            Some(match baseline {
                Some(progress) => monitor.with_baseline(progress),
                None => monitor,
            })
        } else {
            None
        };

        info!(
            hash = %hash,
            strategy = plan.link_plan.strategy.label(),
            linked = report.linked,
            reused = report.reused,
            renames = renames_applied,
            recheck = recheck.is_some(),
            "cross-seed added"
        );
        Ok(ExecutionReport {
            client_id,
            linked: report.linked,
            reused: report.reused,
            renames_applied,
            recheck,
        })
    }

    async fn progress_before_recheck(&self, hash: &TorrentHash) -> Option<f64> {
        match self.client.torrent_state(hash).await {
            Ok(state) => state.map(|state| state.progress),
            Err(err) => {
                debug!(hash = %hash, error = %err, "no pre-recheck progress; monitor waits for checking");
                None
            }
        }
    }

    fn build_tree(&self, plan: &LinkPlan) -> CrossSeedResult<(Option<TreeBuilder>, TreeReport)> {
        let Some(target_dir) = &plan.target_dir else {
            return Ok((None, TreeReport::default()));
        };
        let (method, kind) = match plan.strategy {
            StrategyTag::Reflink => (LinkMethod::Reflink(&self.cloner), "reflink"),
            StrategyTag::Hardlink | StrategyTag::Default => (LinkMethod::Hardlink, "hardlink"),
        };
        let tasks = plan.link_tasks();
        let mut builder = TreeBuilder::new();
        let outcome = builder
            .ensure_dir(target_dir)
            .and_then(|()| builder.link_all(method, &tasks));

        match outcome {
            Ok(report) => {
                self.record(|metrics| {
                    metrics.add_linked_files(kind, u64::try_from(report.linked).unwrap_or(u64::MAX));
                    metrics.add_clone_retries(u64::from(report.clone_retries));
                });
                Ok((Some(builder), report))
            }
            Err(err) => {
                let rolled_back = builder.rollback();
                Err(match err {
                    FsOpsError::PartialTree { .. } => CrossSeedError::PartialTree {
                        target_dir: target_dir.clone(),
                        rolled_back,
                        source: err,
                    },
                    other => CrossSeedError::filesystem("create_link_dir", other),
                })
            }
        }
    }

    /// Poll the client once for `monitor`'s torrent and act on a finished recheck.
    ///
    /// # Errors
    ///
    /// Returns [`CrossSeedError::Client`] when the client call fails.
    pub async fn monitor_recheck(&self, monitor: &mut RecheckMonitor) -> CrossSeedResult<Option<RecheckOutcome>> {
        let outcome = monitor.poll(self.client.as_ref()).await?;
        if let Some(outcome) = outcome {
            self.record(|metrics| metrics.inc_recheck_outcome(outcome.label()));
        }
        Ok(outcome)
    }

    fn record(&self, apply: impl FnOnce(&Metrics)) {
        if let Some(metrics) = &self.metrics {
            apply(metrics);
        }
    }

    fn record_rejection(&self, mode: &str, err: &CrossSeedError) {
        if err.is_skip() {
            warn!(mode, reason = err.reason(), error = %err, "cross-seed skipped");
            self.record(|metrics| metrics.inc_attempt(mode, "skipped"));
        } else {
            warn!(mode, reason = err.reason(), error = %err, "cross-seed failed");
            self.record(|metrics| metrics.inc_attempt(mode, "failed"));
        }
    }
}

fn ensure_safe(verdict: &SafetyVerdict) -> CrossSeedResult<()> {
    match verdict {
        SafetyVerdict::Safe => Ok(()),
        SafetyVerdict::UnsafePieceOverlap {
            piece,
            extra,
            content,
        } => Err(CrossSeedError::UnsafeOverlap {
            piece: *piece,
            extra: extra.clone(),
            content: content.clone(),
        }),
        SafetyVerdict::Unsupported { reason } => Err(CrossSeedError::InvalidInput {
            field: "files",
            reason: *reason,
        }),
    }
}

fn build_request(
    incoming: &IncomingTorrent,
    plan: &LinkPlan,
    category: &CategoryDecision,
    settings: &EffectiveSettings,
) -> AddTorrentRequest {
    // Link trees live outside any category path; auto-management would move them.
    let auto_managed = plan.strategy == StrategyTag::Default
        && category.auto_managed
        && !plan.root_adjusted
        && category
            .ensure
            .as_ref()
            .and_then(|ensure| ensure.save_path.as_deref())
            .is_some_and(|path| normalize(path) == normalize(&plan.save_path));

    AddTorrentRequest {
        hash: incoming.hash.clone(),
        source: incoming.source.clone(),
        save_path: (!auto_managed).then(|| plan.save_path.clone()),
        category: category.category.clone(),
        auto_managed,
        content_layout: plan.content_layout,
        skip_checking: plan.skip_checking,
        paused: settings.start_paused || plan.recheck_required || !plan.renames.is_empty(),
        tags: settings.tags.clone(),
    }
}

fn discard(tree: Option<TreeBuilder>) {
    if let Some(builder) = tree {
        let removed = builder.rollback();
        debug!(removed, "rolled back link tree");
    }
}
