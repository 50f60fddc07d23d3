//! Torrent builders and on-disk fixtures.

use std::fs;
use std::io;
use std::path::Path;

use seedlink_torrent_core::{
    ContentLayout, FileEntry, IncomingTorrent, MatchedTorrent, TorrentHash, TorrentSource,
};
use walkdir::WalkDir;

/// Tracker domain used by [`incoming`].
pub const TRACKER: &str = "tracker.example.org";

/// Deterministic 40-hex-character hash built from a single seed byte.
#[must_use]
pub fn torrent_hash(seed: u8) -> TorrentHash {
    TorrentHash::from_bytes(&[seed; 20])
}

/// File entries from `(path, size)` pairs.
#[must_use]
pub fn files(entries: &[(&str, u64)]) -> Vec<FileEntry> {
    entries
        .iter()
        .map(|(path, size)| FileEntry::new(*path, *size))
        .collect()
}

/// Number of pieces needed for `total` bytes.
#[must_use]
pub const fn piece_count(total: u64, piece_length: u64) -> u64 {
    if piece_length == 0 {
        0
    } else {
        total.div_ceil(piece_length)
    }
}

/// Incoming torrent with a consistent piece count and `Original` layout.
#[must_use]
pub fn incoming(seed: u8, name: &str, piece_length: u64, entries: &[(&str, u64)]) -> IncomingTorrent {
    let files = files(entries);
    let total = files.iter().map(|file| file.size).sum();
    IncomingTorrent {
        hash: torrent_hash(seed),
        name: name.to_string(),
        files,
        piece_length,
        piece_count: piece_count(total, piece_length),
        content_layout: ContentLayout::Original,
        tracker: TRACKER.to_string(),
        indexer: None,
        source: TorrentSource::metainfo(format!("d4:name{}:{name}e", name.len()).into_bytes()),
    }
}

/// Fully downloaded, uncategorised matched torrent saved under `save_path`.
#[must_use]
pub fn matched(seed: u8, name: &str, save_path: &Path, entries: &[(&str, u64)]) -> MatchedTorrent {
    MatchedTorrent {
        hash: torrent_hash(seed),
        name: name.to_string(),
        save_path: save_path.to_string_lossy().into_owned(),
        category: String::new(),
        auto_managed: false,
        files: files(entries),
        progress: 100.0,
    }
}

/// Write each `(path, size)` entry under `root`, creating parent directories.
///
/// # Errors
///
/// Returns any IO error raised while creating directories or files.
pub fn seed_files(root: &Path, entries: &[(&str, u64)]) -> io::Result<()> {
    for (path, size) in entries {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let length = usize::try_from(*size).map_err(io::Error::other)?;
        fs::write(&target, vec![b'x'; length])?;
    }
    Ok(())
}

/// Count regular files below `root` (zero when it does not exist).
#[must_use]
pub fn count_files(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compute_piece_counts() {
        let torrent = incoming(1, "Movie", 16, &[("Movie/a.mkv", 40), ("Movie/a.nfo", 1)]);
        assert_eq!(torrent.piece_count, 3);
        assert_eq!(torrent.hash.as_str().len(), 40);
        assert_eq!(piece_count(0, 16), 0);
        assert_eq!(piece_count(10, 0), 0);
    }

    #[test]
    fn seeded_files_are_counted() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        seed_files(temp.path(), &[("A/a.mkv", 4), ("b.nfo", 0)])?;
        assert_eq!(count_files(temp.path()), 2);
        assert_eq!(fs::metadata(temp.path().join("A/a.mkv"))?.len(), 4);
        assert_eq!(count_files(&temp.path().join("missing")), 0);
        Ok(())
    }
}
