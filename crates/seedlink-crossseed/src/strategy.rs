//! Link strategies that turn a pairing into a [`LinkPlan`].
//!
//! # Design
//! - Planning never mutates the filesystem apart from the reflink probe, which
//!   cleans up after itself.
//! - Preconditions fail hard; a strategy never falls back to another mode.
//! - Hardlink and default plans run piece analysis for extras; reflink plans
//!   skip it because clones can be rewritten without touching the source.

use std::path::{Component, Path, PathBuf};

use seedlink_fsops::{Cloner, FsOpsError, LinkTask, describe, normalize, same_filesystem};
use seedlink_torrent_core::{ContentLayout, FileEntry, IncomingTorrent, MatchedTorrent, TorrentHash};
use tracing::{debug, info};

use crate::error::{CrossSeedError, CrossSeedResult};
use crate::layout::{DirectoryDecision, DirectoryPresetResolver};
use crate::pairing::FilePairing;
use crate::pieces::{PieceLayout, SafetyVerdict, analyze};

/// Which strategy produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyTag {
    /// Reuse the matched data in place.
    Default,
    /// Hardlinked tree.
    Hardlink,
    /// Copy-on-write cloned tree.
    Reflink,
}

impl StrategyTag {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Hardlink => "hardlink",
            Self::Reflink => "reflink",
        }
    }
}

/// What happens to one incoming file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    /// Hardlink `source` to `target`.
    Link {
        /// Existing file.
        source: PathBuf,
        /// Path inside the tree.
        target: PathBuf,
    },
    /// Clone `source` to `target`.
    Clone {
        /// Existing file.
        source: PathBuf,
        /// Path inside the tree.
        target: PathBuf,
    },
    /// Use the data in place at `source`.
    Reuse {
        /// Existing file.
        source: PathBuf,
    },
    /// The client downloads the file.
    Download,
}

/// Action for one incoming file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// Path inside the incoming torrent.
    pub path: String,
    /// Planned action.
    pub action: FileAction,
}

/// Kind of rename sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameKind {
    /// Rename a folder.
    Folder,
    /// Rename a file.
    File,
}

/// Rename that aligns the client's names with what is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameInstruction {
    /// Folder or file.
    pub kind: RenameKind,
    /// Name the client starts with.
    pub from: String,
    /// Name on disk.
    pub to: String,
}

/// Plan produced by a [`LinkStrategy`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPlan {
    /// Producing strategy.
    pub strategy: StrategyTag,
    /// Tree directory for hardlink and reflink plans.
    pub target_dir: Option<PathBuf>,
    /// Directory decision behind `target_dir`.
    pub directory: Option<DirectoryDecision>,
    /// Save path handed to the client.
    pub save_path: String,
    /// Content layout forced on the add.
    pub content_layout: ContentLayout,
    /// Whether the client may skip its initial hash check.
    pub skip_checking: bool,
    /// Whether a recheck must follow the add.
    pub recheck_required: bool,
    /// Whether the save path differs from the matched torrent's save path.
    pub root_adjusted: bool,
    /// Piece-boundary verdict for the extras.
    pub safety_verdict: SafetyVerdict,
    /// Action per incoming file, in torrent order.
    pub files: Vec<PlannedFile>,
    /// Renames, folders first.
    pub renames: Vec<RenameInstruction>,
    /// Hash of the matched torrent whose data is used.
    pub matched_hash: TorrentHash,
}

impl LinkPlan {
    /// Tree entries to create, in torrent order.
    #[must_use]
    pub fn link_tasks(&self) -> Vec<LinkTask> {
        self.files
            .iter()
            .filter_map(|file| match &file.action {
                FileAction::Link { source, target } | FileAction::Clone { source, target } => {
                    Some(LinkTask::new(source.clone(), target.clone()))
                }
                FileAction::Reuse { .. } | FileAction::Download => None,
            })
            .collect()
    }

    /// Number of files the client has to download.
    #[must_use]
    pub fn downloads(&self) -> usize {
        self.files
            .iter()
            .filter(|file| file.action == FileAction::Download)
            .count()
    }
}

/// Inputs shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    /// Torrent being cross-seeded.
    pub incoming: &'a IncomingTorrent,
    /// Source of the data.
    pub matched: &'a MatchedTorrent,
    /// Pairing between the two file lists.
    pub pairing: &'a FilePairing,
    /// Piece layout of the incoming torrent.
    pub layout: &'a PieceLayout,
    /// Whether the instance disables rechecks.
    pub skip_recheck: bool,
}

/// Produces a [`LinkPlan`] for one cross-seed attempt.
pub trait LinkStrategy: Send + Sync {
    /// Strategy identifier.
    fn tag(&self) -> StrategyTag;

    /// Build the plan.
    ///
    /// # Errors
    ///
    /// Returns a [`CrossSeedError`] when a precondition does not hold.
    fn plan(&self, input: &PlanInput<'_>) -> CrossSeedResult<LinkPlan>;
}

/// Reuse the matched data in place, renaming where names differ.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStrategy;

impl LinkStrategy for DefaultStrategy {
    fn tag(&self) -> StrategyTag {
        StrategyTag::Default
    }

    fn plan(&self, input: &PlanInput<'_>) -> CrossSeedResult<LinkPlan> {
        let PlanInput {
            incoming,
            matched,
            pairing,
            layout,
            ..
        } = *input;

        let mut renames = Vec::new();
        let (content_layout, save_path, client_root) =
            match (pairing.incoming_root.as_deref(), pairing.matched_root.as_deref()) {
                (Some(incoming_root), Some(matched_root)) => {
                    if incoming_root != matched_root {
                        renames.push(RenameInstruction {
                            kind: RenameKind::Folder,
                            from: incoming_root.to_string(),
                            to: matched_root.to_string(),
                        });
                    }
                    (ContentLayout::Original, matched.save_path.clone(), Some(matched_root))
                }
                (Some(_), None) => (ContentLayout::NoSubfolder, matched.save_path.clone(), None),
                (None, Some(matched_root)) => (
                    ContentLayout::Original,
                    join_client_path(&matched.save_path, matched_root),
                    None,
                ),
                (None, None) => (ContentLayout::Original, matched.save_path.clone(), None),
            };

        let data_root = Path::new(&matched.save_path);
        let mut files = Vec::with_capacity(incoming.files.len());
        for (index, file) in incoming.files.iter().enumerate() {
            let action = match pairing.matched_for(index) {
                Some(found) => {
                    let matched_file = &matched.files[found];
                    let from = client_relative(&file.path, pairing.incoming_root.as_deref(), client_root);
                    let to = client_relative(&matched_file.path, pairing.matched_root.as_deref(), client_root);
                    if from != to {
                        renames.push(RenameInstruction {
                            kind: RenameKind::File,
                            from,
                            to,
                        });
                    }
                    FileAction::Reuse {
                        source: data_root.join(relative_path(matched_file)?),
                    }
                }
                None => FileAction::Download,
            };
            files.push(PlannedFile {
                path: file.path.clone(),
                action,
            });
        }

        let safety_verdict = if pairing.extras.is_empty() {
            SafetyVerdict::Safe
        } else {
            analyze(layout, &pairing.extras)
        };
        let recheck_required = !pairing.extras.is_empty() || !renames.is_empty();
        let root_adjusted = save_path != matched.save_path || content_layout != ContentLayout::Original;

        debug!(
            hash = %incoming.hash,
            layout = %content_layout,
            renames = renames.len(),
            extras = pairing.extras.len(),
            "planned in-place cross-seed"
        );
        Ok(LinkPlan {
            strategy: StrategyTag::Default,
            target_dir: None,
            directory: None,
            save_path,
            content_layout,
            skip_checking: !recheck_required,
            recheck_required,
            root_adjusted,
            safety_verdict,
            files,
            renames,
            matched_hash: matched.hash.clone(),
        })
    }
}

/// Hardlinked tree under the link base directory.
#[derive(Debug, Clone)]
pub struct HardlinkStrategy {
    resolver: DirectoryPresetResolver,
    tracker_display_name: String,
}

impl HardlinkStrategy {
    /// Strategy placing trees with `resolver`.
    #[must_use]
    pub fn new(resolver: DirectoryPresetResolver, tracker_display_name: impl Into<String>) -> Self {
        Self {
            resolver,
            tracker_display_name: tracker_display_name.into(),
        }
    }
}

impl LinkStrategy for HardlinkStrategy {
    fn tag(&self) -> StrategyTag {
        StrategyTag::Hardlink
    }

    fn plan(&self, input: &PlanInput<'_>) -> CrossSeedResult<LinkPlan> {
        ensure_same_filesystem(self.resolver.base_dir(), Path::new(&input.matched.save_path))?;

        let safety_verdict = if input.pairing.extras.is_empty() {
            SafetyVerdict::Safe
        } else {
            analyze(input.layout, &input.pairing.extras)
        };

        let decision = self.resolver.resolve_for_layout(
            input.incoming,
            &self.tracker_display_name,
            ContentLayout::Original,
        );
        let files = tree_actions(input, &decision.target(), |source, target| FileAction::Link {
            source,
            target,
        })?;
        let recheck_required = !input.pairing.extras.is_empty();
        Ok(tree_plan(
            StrategyTag::Hardlink,
            input,
            decision,
            files,
            safety_verdict,
            recheck_required,
        ))
    }
}

/// Copy-on-write cloned tree under the link base directory.
#[derive(Clone)]
pub struct ReflinkStrategy {
    resolver: DirectoryPresetResolver,
    tracker_display_name: String,
    cloner: Cloner,
}

impl ReflinkStrategy {
    /// Strategy placing trees with `resolver` and probing with `cloner`.
    #[must_use]
    pub fn new(
        resolver: DirectoryPresetResolver,
        tracker_display_name: impl Into<String>,
        cloner: Cloner,
    ) -> Self {
        Self {
            resolver,
            tracker_display_name: tracker_display_name.into(),
            cloner,
        }
    }
}

impl LinkStrategy for ReflinkStrategy {
    fn tag(&self) -> StrategyTag {
        StrategyTag::Reflink
    }

    fn plan(&self, input: &PlanInput<'_>) -> CrossSeedResult<LinkPlan> {
        if input.skip_recheck {
            return Err(CrossSeedError::RecheckRequired {
                mode: StrategyTag::Reflink.label(),
            });
        }
        let anchor = ensure_same_filesystem(self.resolver.base_dir(), Path::new(&input.matched.save_path))?;

        let decision = self.resolver.resolve_for_layout(
            input.incoming,
            &self.tracker_display_name,
            ContentLayout::Original,
        );
        let probe_dir = nearest_existing(&decision.target())
            .unwrap_or(anchor.as_path())
            .to_path_buf();
        self.cloner.probe(&probe_dir).map_err(|err| match err {
            FsOpsError::CloneUnsupported { .. } => CrossSeedError::CloneUnsupported {
                dir: probe_dir.clone(),
                source: err,
            },
            other => CrossSeedError::filesystem("reflink_probe", other),
        })?;

        let files = tree_actions(input, &decision.target(), |source, target| FileAction::Clone {
            source,
            target,
        })?;
        Ok(tree_plan(
            StrategyTag::Reflink,
            input,
            decision,
            files,
            SafetyVerdict::Safe,
            true,
        ))
    }
}

fn tree_actions(
    input: &PlanInput<'_>,
    target_dir: &Path,
    make: impl Fn(PathBuf, PathBuf) -> FileAction,
) -> CrossSeedResult<Vec<PlannedFile>> {
    let data_root = Path::new(&input.matched.save_path);
    input
        .incoming
        .files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let action = match input.pairing.matched_for(index) {
                Some(found) => make(
                    data_root.join(relative_path(&input.matched.files[found])?),
                    target_dir.join(relative_path(file)?),
                ),
                None => FileAction::Download,
            };
            Ok(PlannedFile {
                path: file.path.clone(),
                action,
            })
        })
        .collect()
}

fn tree_plan(
    strategy: StrategyTag,
    input: &PlanInput<'_>,
    decision: DirectoryDecision,
    files: Vec<PlannedFile>,
    safety_verdict: SafetyVerdict,
    recheck_required: bool,
) -> LinkPlan {
    let target_dir = decision.target();
    info!(
        hash = %input.incoming.hash,
        strategy = strategy.label(),
        target = %target_dir.display(),
        isolated = decision.isolation_folder.is_some(),
        extras = input.pairing.extras.len(),
        "planned link tree"
    );
    LinkPlan {
        strategy,
        save_path: target_dir.to_string_lossy().into_owned(),
        target_dir: Some(target_dir),
        directory: Some(decision),
        content_layout: ContentLayout::Original,
        skip_checking: !recheck_required,
        recheck_required,
        root_adjusted: true,
        safety_verdict,
        files,
        renames: Vec::new(),
        matched_hash: input.matched.hash.clone(),
    }
}

/// Check that hardlinks or clones from `save_path` into `base_dir` are possible.
///
/// Returns the existing directory the base was anchored on.
fn ensure_same_filesystem(base_dir: &Path, save_path: &Path) -> CrossSeedResult<PathBuf> {
    let anchor = nearest_existing(base_dir).ok_or_else(|| {
        CrossSeedError::filesystem(
            "resolve_link_base",
            FsOpsError::PathNotFound {
                path: base_dir.to_path_buf(),
            },
        )
    })?;
    let same = same_filesystem(anchor, save_path)
        .map_err(|err| CrossSeedError::filesystem("same_filesystem", err))?;
    if !same {
        return Err(CrossSeedError::CrossFilesystem {
            base_dir: anchor.to_path_buf(),
            save_path: save_path.to_path_buf(),
            base_device: describe(anchor).device,
            save_device: describe(save_path).device,
        });
    }
    Ok(anchor.to_path_buf())
}

fn nearest_existing(path: &Path) -> Option<&Path> {
    path.ancestors()
        .find(|candidate| !candidate.as_os_str().is_empty() && candidate.exists())
}

/// Torrent-relative path that cannot leave the directory it is joined onto.
fn relative_path(file: &FileEntry) -> CrossSeedResult<PathBuf> {
    let normalized = normalize(&file.path);
    let path = PathBuf::from(&normalized);
    let contained = normalized != "."
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if contained {
        Ok(path)
    } else {
        Err(CrossSeedError::InvalidInput {
            field: "files",
            reason: "file path escapes the torrent root",
        })
    }
}

fn client_relative(path: &str, own_root: Option<&str>, client_root: Option<&str>) -> String {
    let normalized = normalize(path);
    let relative = own_root.map_or(normalized.as_str(), |root| {
        seedlink_fsops::paths::strip_root(&normalized, root)
    });
    match client_root {
        Some(root) => format!("{root}/{relative}"),
        None => relative.to_string(),
    }
}

fn join_client_path(save_path: &str, folder: &str) -> String {
    let trimmed = save_path.trim_end_matches(['/', '\\']);
    let separator = if save_path.contains('\\') && !save_path.contains('/') {
        '\\'
    } else {
        '/'
    };
    format!("{trimmed}{separator}{folder}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::pair_files;
    use seedlink_torrent_core::TorrentSource;

    fn incoming(files: &[(&str, u64)]) -> IncomingTorrent {
        let entries: Vec<FileEntry> = files.iter().map(|(p, s)| FileEntry::new(*p, *s)).collect();
        let total: u64 = entries.iter().map(|file| file.size).sum();
        IncomingTorrent {
            hash: TorrentHash::from_bytes(&[2; 20]),
            name: "Incoming".into(),
            files: entries,
            piece_length: 16,
            piece_count: total.div_ceil(16),
            content_layout: ContentLayout::Original,
            tracker: "tracker.example.org".into(),
            indexer: None,
            source: TorrentSource::magnet("magnet:?xt=urn:btih:02"),
        }
    }

    fn matched(save_path: &str, files: &[(&str, u64)]) -> MatchedTorrent {
        MatchedTorrent {
            hash: TorrentHash::from_bytes(&[1; 20]),
            name: "Matched".into(),
            save_path: save_path.into(),
            category: String::new(),
            auto_managed: false,
            files: files.iter().map(|(p, s)| FileEntry::new(*p, *s)).collect(),
            progress: 100.0,
        }
    }

    fn default_plan(incoming: &IncomingTorrent, matched: &MatchedTorrent) -> CrossSeedResult<LinkPlan> {
        let pairing = pair_files(&incoming.files, &matched.files);
        let layout = PieceLayout::from_incoming(incoming)?;
        DefaultStrategy.plan(&PlanInput {
            incoming,
            matched,
            pairing: &pairing,
            layout: &layout,
            skip_recheck: false,
        })
    }

    #[test]
    fn default_reuses_in_place_without_renames() -> CrossSeedResult<()> {
        let incoming = incoming(&[("Movie/a.mkv", 32), ("Movie/a.srt", 16)]);
        let matched = matched("/data", &[("Movie/a.mkv", 32), ("Movie/a.srt", 16)]);
        let plan = default_plan(&incoming, &matched)?;
        assert_eq!(plan.strategy, StrategyTag::Default);
        assert_eq!(plan.save_path, "/data");
        assert!(plan.renames.is_empty());
        assert!(plan.skip_checking);
        assert!(!plan.recheck_required);
        assert!(!plan.root_adjusted);
        assert!(plan.link_tasks().is_empty());
        assert_eq!(
            plan.files[0].action,
            FileAction::Reuse {
                source: PathBuf::from("/data/Movie/a.mkv")
            }
        );
        Ok(())
    }

    #[test]
    fn default_renames_root_and_files() -> CrossSeedResult<()> {
        let incoming = incoming(&[("Movie.2024/movie.mkv", 32)]);
        let matched = matched("/data", &[("Movie 2024/Movie 2024.mkv", 32)]);
        let plan = default_plan(&incoming, &matched)?;
        assert_eq!(
            plan.renames,
            vec![
                RenameInstruction {
                    kind: RenameKind::Folder,
                    from: "Movie.2024".into(),
                    to: "Movie 2024".into(),
                },
                RenameInstruction {
                    kind: RenameKind::File,
                    from: "Movie 2024/movie.mkv".into(),
                    to: "Movie 2024/Movie 2024.mkv".into(),
                },
            ]
        );
        assert!(plan.recheck_required);
        assert!(!plan.skip_checking);
        Ok(())
    }

    #[test]
    fn default_aligns_mismatched_roots() -> CrossSeedResult<()> {
        let rooted = incoming(&[("Movie/a.mkv", 32)]);
        let loose = matched("/data", &[("a.mkv", 32)]);
        let plan = default_plan(&rooted, &loose)?;
        assert_eq!(plan.content_layout, ContentLayout::NoSubfolder);
        assert_eq!(plan.save_path, "/data");
        assert!(plan.root_adjusted);
        assert!(plan.renames.is_empty());

        let loose_incoming = incoming(&[("a.mkv", 32)]);
        let rooted_matched = matched("/data/", &[("Movie/a.mkv", 32)]);
        let plan = default_plan(&loose_incoming, &rooted_matched)?;
        assert_eq!(plan.content_layout, ContentLayout::Original);
        assert_eq!(plan.save_path, "/data/Movie");
        assert!(plan.renames.is_empty());
        Ok(())
    }

    #[test]
    fn default_flags_unsafe_extras() -> CrossSeedResult<()> {
        let incoming = incoming(&[("a.mkv", 30), ("a.nfo", 5)]);
        let matched = matched("/data", &[("a.mkv", 30)]);
        let plan = default_plan(&incoming, &matched)?;
        assert!(matches!(
            plan.safety_verdict,
            SafetyVerdict::UnsafePieceOverlap { piece: 1, .. }
        ));
        assert_eq!(plan.downloads(), 1);
        Ok(())
    }

    #[test]
    fn escaping_paths_are_rejected() {
        assert!(relative_path(&FileEntry::new("../etc/passwd", 1)).is_err());
        assert!(relative_path(&FileEntry::new("/etc/passwd", 1)).is_err());
        assert!(relative_path(&FileEntry::new("a/../../b", 1)).is_err());
        assert_eq!(
            relative_path(&FileEntry::new(r"Movie\a.mkv", 1)).ok(),
            Some(PathBuf::from("Movie/a.mkv"))
        );
    }

    #[test]
    fn client_paths_join_with_native_separator() {
        assert_eq!(join_client_path("/data/", "Movie"), "/data/Movie");
        assert_eq!(join_client_path(r"D:\data", "Movie"), r"D:\data\Movie");
    }

    #[test]
    fn hardlink_requires_existing_save_path() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let incoming = incoming(&[("a.mkv", 32)]);
        let missing = temp.path().join("missing");
        let matched = matched(&missing.to_string_lossy(), &[("a.mkv", 32)]);
        let pairing = pair_files(&incoming.files, &matched.files);
        let layout = PieceLayout::from_incoming(&incoming)?;
        let strategy = HardlinkStrategy::new(
            DirectoryPresetResolver::new(temp.path().join("links"), seedlink_config::DirectoryPreset::Flat, "qbit"),
            "Example",
        );
        let err = strategy
            .plan(&PlanInput {
                incoming: &incoming,
                matched: &matched,
                pairing: &pairing,
                layout: &layout,
                skip_recheck: false,
            })
            .expect_err("missing save path must fail");
        assert_eq!(err.kind(), crate::error::CrossSeedErrorKind::Filesystem);
        assert!(!temp.path().join("links").exists());
        Ok(())
    }
}
