//! Piece layout and piece-boundary safety analysis.
//!
//! # Design
//! - Files occupy consecutive half-open byte ranges of the concatenated torrent
//!   stream; a piece is unsafe to download when it covers both a file that will
//!   be downloaded and a file that already exists.
//! - Only the first and last piece of a file can be shared with a neighbour, so
//!   the analysis inspects two pieces per extra file regardless of file size.
//! - Zero-length files occupy no bytes and therefore no pieces.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use seedlink_torrent_core::{FileEntry, IncomingTorrent};

use crate::error::{CrossSeedError, CrossSeedResult};

/// Byte range of one file inside the torrent stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSpan {
    /// Offset of the first byte.
    pub offset: u64,
    /// File length in bytes.
    pub size: u64,
}

impl FileSpan {
    /// Exclusive end offset.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Read-only mapping between files and pieces for one torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceLayout {
    piece_length: u64,
    piece_count: u64,
    spans: Vec<FileSpan>,
    paths: Vec<String>,
}

impl PieceLayout {
    /// Build the layout for files in metainfo order.
    ///
    /// # Errors
    ///
    /// Returns [`CrossSeedError::InvalidInput`] when the piece length is zero,
    /// the total size overflows, or `piece_count` disagrees with the file sizes.
    pub fn new(piece_length: u64, piece_count: u64, files: &[FileEntry]) -> CrossSeedResult<Self> {
        if piece_length == 0 {
            return Err(CrossSeedError::InvalidInput {
                field: "piece_length",
                reason: "piece length must be positive",
            });
        }

        let mut offset = 0_u64;
        let mut spans = Vec::with_capacity(files.len());
        for file in files {
            spans.push(FileSpan {
                offset,
                size: file.size,
            });
            offset = offset
                .checked_add(file.size)
                .ok_or(CrossSeedError::InvalidInput {
                    field: "files",
                    reason: "total torrent size overflows",
                })?;
        }

        if offset.div_ceil(piece_length) != piece_count {
            return Err(CrossSeedError::InvalidInput {
                field: "piece_count",
                reason: "piece count does not match total size and piece length",
            });
        }

        Ok(Self {
            piece_length,
            piece_count,
            spans,
            paths: files.iter().map(|file| file.path.clone()).collect(),
        })
    }

    /// Build the layout for an incoming torrent.
    ///
    /// # Errors
    ///
    /// See [`PieceLayout::new`].
    pub fn from_incoming(incoming: &IncomingTorrent) -> CrossSeedResult<Self> {
        Self::new(incoming.piece_length, incoming.piece_count, &incoming.files)
    }

    /// Piece length in bytes.
    #[must_use]
    pub const fn piece_length(&self) -> u64 {
        self.piece_length
    }

    /// Number of pieces.
    #[must_use]
    pub const fn piece_count(&self) -> u64 {
        self.piece_count
    }

    /// File spans in metainfo order.
    #[must_use]
    pub fn spans(&self) -> &[FileSpan] {
        &self.spans
    }

    /// Relative path of a file.
    #[must_use]
    pub fn path(&self, index: usize) -> Option<&str> {
        self.paths.get(index).map(String::as_str)
    }

    /// Pieces overlapped by a file, `None` for zero-length or unknown files.
    #[must_use]
    pub fn pieces_for(&self, index: usize) -> Option<RangeInclusive<u64>> {
        let span = self.spans.get(index)?;
        if span.size == 0 {
            return None;
        }
        let first = span.offset / self.piece_length;
        let last = (span.end() - 1) / self.piece_length;
        Some(first..=last)
    }

    /// Indices of non-empty files overlapping a piece, in metainfo order.
    #[must_use]
    pub fn files_in_piece(&self, piece: u64) -> Vec<usize> {
        if piece >= self.piece_count {
            return Vec::new();
        }
        let start = piece * self.piece_length;
        let end = start.saturating_add(self.piece_length);
        let first = self.spans.partition_point(|span| span.end() <= start);
        self.spans[first..]
            .iter()
            .enumerate()
            .take_while(|(_, span)| span.offset < end)
            .filter(|(_, span)| span.size > 0)
            .map(|(offset, _)| first + offset)
            .collect()
    }
}

/// Incoming files with no counterpart in the matched torrent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFileSet {
    indices: BTreeSet<usize>,
}

impl ExtraFileSet {
    /// Empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            indices: BTreeSet::new(),
        }
    }

    /// Add an incoming file index.
    pub fn insert(&mut self, index: usize) {
        self.indices.insert(index);
    }

    /// Whether the incoming file is an extra.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Whether there are no extras.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of extras.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Extra indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }
}

impl FromIterator<usize> for ExtraFileSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            indices: iter.into_iter().collect(),
        }
    }
}

/// Outcome of piece-boundary analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// No piece covers both an extra file and existing content.
    Safe,
    /// A piece covers both an extra file and existing content.
    UnsafePieceOverlap {
        /// Shared piece index.
        piece: u64,
        /// Extra file touching the piece.
        extra: String,
        /// Content file touching the piece.
        content: String,
    },
    /// The analysis could not be performed.
    Unsupported {
        /// Machine-readable reason.
        reason: &'static str,
    },
}

impl SafetyVerdict {
    /// Whether the verdict allows execution.
    #[must_use]
    pub const fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    /// Stable label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::UnsafePieceOverlap { .. } => "unsafe_piece_overlap",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

/// Decide whether the extra files can be downloaded without touching pieces
/// shared with existing content.
#[must_use]
pub fn analyze(layout: &PieceLayout, extras: &ExtraFileSet) -> SafetyVerdict {
    for extra in extras.iter() {
        if extra >= layout.spans.len() {
            return SafetyVerdict::Unsupported {
                reason: "extra file index outside the torrent",
            };
        }
        let Some(range) = layout.pieces_for(extra) else {
            continue;
        };
        let (first, last) = range.into_inner();
        let boundary = if first == last { vec![first] } else { vec![first, last] };
        for piece in boundary {
            if let Some(content) = layout
                .files_in_piece(piece)
                .into_iter()
                .find(|index| !extras.contains(*index))
            {
                return SafetyVerdict::UnsafePieceOverlap {
                    piece,
                    extra: layout.paths[extra].clone(),
                    content: layout.paths[content].clone(),
                };
            }
        }
    }
    SafetyVerdict::Safe
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(piece_length: u64, sizes: &[(&str, u64)]) -> CrossSeedResult<PieceLayout> {
        let files: Vec<FileEntry> = sizes
            .iter()
            .map(|(path, size)| FileEntry::new(*path, *size))
            .collect();
        let total: u64 = sizes.iter().map(|(_, size)| size).sum();
        PieceLayout::new(piece_length, total.div_ceil(piece_length), &files)
    }

    #[test]
    fn layout_maps_files_to_pieces() -> CrossSeedResult<()> {
        let layout = layout(16, &[("a.mkv", 40), ("a.nfo", 8), ("empty", 0), ("b.srt", 16)])?;
        assert_eq!(layout.piece_count(), 4);
        assert_eq!(layout.pieces_for(0), Some(0..=2));
        assert_eq!(layout.pieces_for(1), Some(2..=2));
        assert_eq!(layout.pieces_for(2), None);
        assert_eq!(layout.pieces_for(3), Some(3..=3));
        assert_eq!(layout.files_in_piece(2), vec![0, 1]);
        assert_eq!(layout.files_in_piece(3), vec![3]);
        assert!(layout.files_in_piece(9).is_empty());
        assert_eq!(layout.spans()[3], FileSpan { offset: 48, size: 16 });
        Ok(())
    }

    #[test]
    fn layout_rejects_inconsistent_metadata() {
        let files = [FileEntry::new("a", 10)];
        assert!(matches!(
            PieceLayout::new(0, 1, &files),
            Err(CrossSeedError::InvalidInput { field: "piece_length", .. })
        ));
        assert!(matches!(
            PieceLayout::new(4, 2, &files),
            Err(CrossSeedError::InvalidInput { field: "piece_count", .. })
        ));
    }

    #[test]
    fn empty_extras_are_safe() -> CrossSeedResult<()> {
        let layout = layout(16, &[("a.mkv", 17)])?;
        assert_eq!(analyze(&layout, &ExtraFileSet::new()), SafetyVerdict::Safe);
        Ok(())
    }

    #[test]
    fn aligned_extras_are_safe() -> CrossSeedResult<()> {
        let layout = layout(16, &[("a.mkv", 32), ("a.nfo", 5)])?;
        let extras: ExtraFileSet = [1].into_iter().collect();
        assert!(analyze(&layout, &extras).is_safe());
        Ok(())
    }

    #[test]
    fn extra_sharing_tail_piece_is_unsafe() -> CrossSeedResult<()> {
        let layout = layout(16, &[("a.mkv", 30), ("a.nfo", 5)])?;
        let extras: ExtraFileSet = [1].into_iter().collect();
        assert_eq!(
            analyze(&layout, &extras),
            SafetyVerdict::UnsafePieceOverlap {
                piece: 1,
                extra: "a.nfo".into(),
                content: "a.mkv".into(),
            }
        );
        Ok(())
    }

    #[test]
    fn extra_sharing_head_piece_is_unsafe() -> CrossSeedResult<()> {
        let layout = layout(16, &[("sample.mkv", 20), ("movie.mkv", 100)])?;
        let extras: ExtraFileSet = [0].into_iter().collect();
        assert!(matches!(
            analyze(&layout, &extras),
            SafetyVerdict::UnsafePieceOverlap { piece: 1, .. }
        ));
        Ok(())
    }

    #[test]
    fn neighbouring_extras_do_not_conflict() -> CrossSeedResult<()> {
        let layout = layout(16, &[("a.mkv", 32), ("a.nfo", 5), ("a.srt", 11), ("b.mkv", 16)])?;
        let extras: ExtraFileSet = [1, 2].into_iter().collect();
        assert!(analyze(&layout, &extras).is_safe());
        Ok(())
    }

    #[test]
    fn zero_length_extras_are_ignored() -> CrossSeedResult<()> {
        let layout = layout(16, &[("a.mkv", 10), ("empty.txt", 0), ("b.mkv", 6)])?;
        let extras: ExtraFileSet = [1].into_iter().collect();
        assert!(analyze(&layout, &extras).is_safe());
        Ok(())
    }

    #[test]
    fn verdict_is_independent_of_file_order() -> CrossSeedResult<()> {
        let forward = layout(16, &[("a.mkv", 30), ("a.nfo", 5)])?;
        let reversed = layout(16, &[("a.nfo", 5), ("a.mkv", 30)])?;
        assert!(!analyze(&forward, &[1].into_iter().collect()).is_safe());
        assert!(!analyze(&reversed, &[0].into_iter().collect()).is_safe());

        let forward = layout(16, &[("a.mkv", 32), ("a.nfo", 16)])?;
        let reversed = layout(16, &[("a.nfo", 16), ("a.mkv", 32)])?;
        assert!(analyze(&forward, &[1].into_iter().collect()).is_safe());
        assert!(analyze(&reversed, &[0].into_iter().collect()).is_safe());
        Ok(())
    }

    #[test]
    fn out_of_range_extras_are_unsupported() -> CrossSeedResult<()> {
        let layout = layout(16, &[("a.mkv", 16)])?;
        assert_eq!(
            analyze(&layout, &[4].into_iter().collect()).label(),
            "unsupported"
        );
        Ok(())
    }
}
