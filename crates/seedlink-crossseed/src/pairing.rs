//! Pairing incoming files with the matched torrent's files on disk.
//!
//! Paths are compared after stripping each side's own root folder, normalising
//! separators, and case-folding. Files left over are paired by identical size
//! and extension when exactly one candidate exists; anything still unpaired on
//! the incoming side is an extra that the client has to download.

use std::collections::HashMap;

use seedlink_fsops::paths::{common_root, extension_fold, strip_root};
use seedlink_fsops::{normalize, normalize_fold};
use seedlink_torrent_core::FileEntry;

use crate::pieces::ExtraFileSet;

/// One incoming file backed by one matched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePair {
    /// Index into the incoming torrent's files.
    pub incoming: usize,
    /// Index into the matched torrent's files.
    pub matched: usize,
}

/// Result of pairing two file lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePairing {
    /// Paired files in incoming order.
    pub pairs: Vec<FilePair>,
    /// Incoming files with no counterpart.
    pub extras: ExtraFileSet,
    /// Root folder shared by every incoming file.
    pub incoming_root: Option<String>,
    /// Root folder shared by every matched file.
    pub matched_root: Option<String>,
}

impl FilePairing {
    /// Matched index paired with an incoming index.
    #[must_use]
    pub fn matched_for(&self, incoming: usize) -> Option<usize> {
        self.pairs
            .iter()
            .find(|pair| pair.incoming == incoming)
            .map(|pair| pair.matched)
    }
}

/// Pair incoming files with matched files.
#[must_use]
pub fn pair_files(incoming: &[FileEntry], matched: &[FileEntry]) -> FilePairing {
    let incoming_root = common_root(incoming.iter().map(|file| file.path.as_str()));
    let matched_root = common_root(matched.iter().map(|file| file.path.as_str()));

    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, file) in matched.iter().enumerate() {
        by_key
            .entry(relative_key(&file.path, matched_root.as_deref()))
            .or_default()
            .push(index);
    }

    let mut used = vec![false; matched.len()];
    let mut paired: Vec<Option<usize>> = vec![None; incoming.len()];

    for (index, file) in incoming.iter().enumerate() {
        let key = relative_key(&file.path, incoming_root.as_deref());
        let Some(candidates) = by_key.get(&key) else {
            continue;
        };
        if let Some(&found) = candidates
            .iter()
            .find(|&&candidate| !used[candidate] && matched[candidate].size == file.size)
        {
            used[found] = true;
            paired[index] = Some(found);
        }
    }

    for (index, file) in incoming.iter().enumerate() {
        if paired[index].is_some() {
            continue;
        }
        let extension = extension_fold(&normalize(&file.path));
        let mut candidates = matched.iter().enumerate().filter(|(candidate, entry)| {
            !used[*candidate]
                && entry.size == file.size
                && extension_fold(&normalize(&entry.path)) == extension
        });
        if let (Some((found, _)), None) = (candidates.next(), candidates.next()) {
            used[found] = true;
            paired[index] = Some(found);
        }
    }

    let mut pairing = FilePairing {
        incoming_root,
        matched_root,
        ..FilePairing::default()
    };
    for (index, found) in paired.into_iter().enumerate() {
        match found {
            Some(matched) => pairing.pairs.push(FilePair {
                incoming: index,
                matched,
            }),
            None => pairing.extras.insert(index),
        }
    }
    pairing
}

fn relative_key(path: &str, root: Option<&str>) -> String {
    let normalized = normalize(path);
    let relative = root.map_or(normalized.as_str(), |root| strip_root(&normalized, root));
    normalize_fold(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(items: &[(&str, u64)]) -> Vec<FileEntry> {
        items
            .iter()
            .map(|(path, size)| FileEntry::new(*path, *size))
            .collect()
    }

    #[test]
    fn pairs_by_root_stripped_case_folded_path() {
        let incoming = entries(&[("Movie.2024/Movie.mkv", 10), ("Movie.2024/Subs/en.srt", 2)]);
        let matched = entries(&[(r"movie 2024\subs\EN.srt", 2), ("movie 2024/movie.MKV", 10)]);
        let pairing = pair_files(&incoming, &matched);
        assert_eq!(
            pairing.pairs,
            vec![
                FilePair { incoming: 0, matched: 1 },
                FilePair { incoming: 1, matched: 0 },
            ]
        );
        assert!(pairing.extras.is_empty());
        assert_eq!(pairing.incoming_root.as_deref(), Some("Movie.2024"));
        assert_eq!(pairing.matched_root.as_deref(), Some("movie 2024"));
    }

    #[test]
    fn falls_back_to_unique_size_and_extension() {
        let incoming = entries(&[("Show.S01E01.mkv", 100), ("Show.S01E01.nfo", 3)]);
        let matched = entries(&[("show-s01e01-group.mkv", 100)]);
        let pairing = pair_files(&incoming, &matched);
        assert_eq!(pairing.matched_for(0), Some(0));
        assert_eq!(pairing.extras.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn ambiguous_size_matches_stay_extras() {
        let incoming = entries(&[("a.mkv", 5)]);
        let matched = entries(&[("b.mkv", 5), ("c.mkv", 5)]);
        let pairing = pair_files(&incoming, &matched);
        assert!(pairing.pairs.is_empty());
        assert!(pairing.extras.contains(0));
    }

    #[test]
    fn size_mismatch_prevents_path_pairing() {
        let incoming = entries(&[("a.mkv", 5), ("a.nfo", 1)]);
        let matched = entries(&[("a.mkv", 5), ("a.nfo", 2)]);
        let pairing = pair_files(&incoming, &matched);
        assert_eq!(pairing.pairs.len(), 1);
        assert!(pairing.extras.contains(1));
    }
}
