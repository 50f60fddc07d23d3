//! Target directory resolution for hardlink and reflink trees.
//!
//! # Design
//! - Pure: the same preset, torrent, and names always yield the same decision.
//! - The root-folder rule mirrors the client's content-layout handling so the
//!   tree never leaves files loose in a shared directory.

use std::path::{Path, PathBuf};

use seedlink_config::DirectoryPreset;
use seedlink_fsops::paths::common_root;
use seedlink_torrent_core::{ContentLayout, FileEntry, IncomingTorrent, TorrentHash};

const ILLEGAL_CHARS: &[char] = &[':', '*', '?', '"', '<', '>', '|', '\\', '/'];
const FALLBACK_FOLDER: &str = "torrent";
const FALLBACK_COMPONENT: &str = "Unknown";

/// Whether files added with `layout` end up under a single root folder.
#[must_use]
pub fn has_root_folder(layout: ContentLayout, files: &[FileEntry]) -> bool {
    match layout {
        ContentLayout::Subfolder => true,
        ContentLayout::Original => common_root(files.iter().map(|file| file.path.as_str())).is_some(),
        ContentLayout::NoSubfolder => false,
    }
}

/// Whether an isolation folder must be inserted to keep files together.
#[must_use]
pub fn requires_isolation(layout: ContentLayout, files: &[FileEntry]) -> bool {
    !has_root_folder(layout, files)
}

/// `<name>--<first 8 hash chars>` with characters illegal on common filesystems removed.
#[must_use]
pub fn isolation_folder_name(name: &str, hash: &TorrentHash) -> String {
    let cleaned = sanitize_component(name);
    let stem = if cleaned.is_empty() {
        FALLBACK_FOLDER
    } else {
        cleaned.as_str()
    };
    format!("{stem}--{}", hash.short())
}

/// Strip characters that cannot appear in a directory name on Windows or POSIX.
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|ch| !ILLEGAL_CHARS.contains(ch) && !ch.is_control())
        .collect();
    filtered
        .trim()
        .trim_end_matches(['.', ' '])
        .to_string()
}

/// Directory chosen for a link tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDecision {
    /// Preset directory under the link base.
    pub directory: PathBuf,
    /// Isolation folder appended below `directory`, when required.
    pub isolation_folder: Option<String>,
}

impl DirectoryDecision {
    /// Final directory the torrent is saved into.
    #[must_use]
    pub fn target(&self) -> PathBuf {
        match &self.isolation_folder {
            Some(folder) => self.directory.join(folder),
            None => self.directory.clone(),
        }
    }
}

/// Applies a [`DirectoryPreset`] under a link base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPresetResolver {
    base_dir: PathBuf,
    preset: DirectoryPreset,
    instance_name: String,
}

impl DirectoryPresetResolver {
    /// Resolver for one instance.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, preset: DirectoryPreset, instance_name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            preset,
            instance_name: instance_name.into(),
        }
    }

    /// Link base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Preset applied under the base.
    #[must_use]
    pub const fn preset(&self) -> DirectoryPreset {
        self.preset
    }

    /// Resolve using the torrent's own content layout.
    #[must_use]
    pub fn resolve(&self, incoming: &IncomingTorrent, tracker_display_name: &str) -> DirectoryDecision {
        self.resolve_for_layout(incoming, tracker_display_name, incoming.content_layout)
    }

    /// Resolve as if the torrent were added with `layout`.
    #[must_use]
    pub fn resolve_for_layout(
        &self,
        incoming: &IncomingTorrent,
        tracker_display_name: &str,
        layout: ContentLayout,
    ) -> DirectoryDecision {
        let directory = match self.preset {
            DirectoryPreset::Flat => self.base_dir.clone(),
            DirectoryPreset::ByTracker => self.base_dir.join(component(tracker_display_name)),
            DirectoryPreset::ByInstance => self.base_dir.join(component(&self.instance_name)),
        };
        let isolate = self.preset == DirectoryPreset::Flat || requires_isolation(layout, &incoming.files);
        DirectoryDecision {
            directory,
            isolation_folder: isolate.then(|| isolation_folder_name(&incoming.name, &incoming.hash)),
        }
    }
}

fn component(raw: &str) -> String {
    let cleaned = sanitize_component(raw);
    if cleaned.is_empty() {
        FALLBACK_COMPONENT.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedlink_torrent_core::TorrentSource;

    fn torrent(files: &[&str], layout: ContentLayout) -> IncomingTorrent {
        IncomingTorrent {
            hash: TorrentHash::from_bytes(&[0xab; 20]),
            name: "Movie: The Cut?".into(),
            files: files.iter().map(|path| FileEntry::new(*path, 1)).collect(),
            piece_length: 16,
            piece_count: 1,
            content_layout: layout,
            tracker: "tracker.example.org".into(),
            indexer: None,
            source: TorrentSource::magnet("magnet:?xt=urn:btih:ab"),
        }
    }

    #[test]
    fn isolation_name_uses_short_hash() -> anyhow::Result<()> {
        let hash = TorrentHash::parse("abcdef1234567890")?;
        assert_eq!(
            isolation_folder_name("My.Movie.2024.1080p.BluRay", &hash),
            "My.Movie.2024.1080p.BluRay--abcdef12"
        );
        assert_eq!(isolation_folder_name("a:b*c?\"d<e>f|g", &hash), "abcdefg--abcdef12");
        assert_eq!(isolation_folder_name("???", &hash), "torrent--abcdef12");
        Ok(())
    }

    #[test]
    fn root_folder_follows_content_layout() {
        let rooted = torrent(&["Movie/video.mkv", "Movie/subs.srt"], ContentLayout::Original);
        let loose = torrent(&["video.mkv", "subs.srt"], ContentLayout::Original);
        assert!(!requires_isolation(ContentLayout::Original, &rooted.files));
        assert!(requires_isolation(ContentLayout::Original, &loose.files));
        assert!(!requires_isolation(ContentLayout::Subfolder, &loose.files));
        assert!(requires_isolation(ContentLayout::NoSubfolder, &rooted.files));
    }

    #[test]
    fn presets_place_trees_under_base() {
        let rooted = torrent(&["Movie/video.mkv"], ContentLayout::Original);
        let loose = torrent(&["video.mkv"], ContentLayout::Original);

        let by_tracker = DirectoryPresetResolver::new("/links", DirectoryPreset::ByTracker, "qbit");
        let decision = by_tracker.resolve(&rooted, "Example: Tracker");
        assert_eq!(decision.directory, PathBuf::from("/links/Example Tracker"));
        assert_eq!(decision.isolation_folder, None);
        assert_eq!(decision.target(), PathBuf::from("/links/Example Tracker"));

        let by_instance = DirectoryPresetResolver::new("/links", DirectoryPreset::ByInstance, "qbit");
        let decision = by_instance.resolve(&loose, "ignored");
        assert_eq!(
            decision.target(),
            PathBuf::from("/links/qbit/Movie The Cut--abababab")
        );

        let flat = DirectoryPresetResolver::new("/links", DirectoryPreset::Flat, "qbit");
        let decision = flat.resolve(&rooted, "ignored");
        assert_eq!(decision.directory, PathBuf::from("/links"));
        assert_eq!(decision.isolation_folder.as_deref(), Some("Movie The Cut--abababab"));
    }

    #[test]
    fn resolution_is_deterministic_and_layout_aware() {
        let rooted = torrent(&["Movie/video.mkv"], ContentLayout::NoSubfolder);
        let resolver = DirectoryPresetResolver::new("/links", DirectoryPreset::ByTracker, "qbit");
        let first = resolver.resolve(&rooted, "");
        assert_eq!(first, resolver.resolve(&rooted, ""));
        assert_eq!(first.directory, PathBuf::from("/links/Unknown"));
        assert!(first.isolation_folder.is_some());
        let forced = resolver.resolve_for_layout(&rooted, "", ContentLayout::Original);
        assert!(forced.isolation_folder.is_none());
    }
}
