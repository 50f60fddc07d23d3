//! Torrent snapshots and client DTOs shared across the workspace.
//!
//! # Design
//! - Snapshots are plain data; the engine never mutates them once received.
//! - Client-facing paths stay as strings because they are interpreted by the
//!   remote client, not by this process.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TorrentError, TorrentResult};

/// Source describing how a torrent should be handed to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TorrentSource {
    /// Represents a magnet URI that the client resolves itself.
    Magnet {
        /// Magnet URI to resolve and add.
        uri: String,
    },
    /// Represents raw `.torrent` metainfo bytes.
    Metainfo {
        /// Bencoded metainfo payload.
        bytes: Vec<u8>,
    },
}

impl TorrentSource {
    #[must_use]
    /// Convenience constructor for magnet-based sources.
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self::Magnet { uri: uri.into() }
    }

    #[must_use]
    /// Convenience constructor for metainfo-based sources.
    pub fn metainfo(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Metainfo {
            bytes: bytes.into(),
        }
    }
}

/// Lower-case hex content identifier of a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TorrentHash(String);

impl TorrentHash {
    /// Parse a hex info-hash, normalising it to lower case.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::InvalidHash`] when the value is empty or contains
    /// non-hex characters.
    pub fn parse(value: &str) -> TorrentResult<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(TorrentError::InvalidHash {
                value: value.to_string(),
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Hex-encode a raw digest (e.g. the 20-byte v1 info-hash).
    #[must_use]
    pub fn from_bytes(digest: &[u8]) -> Self {
        use std::fmt::Write as _;
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Full hash as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters (or the whole hash when shorter).
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for TorrentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TorrentHash {
    type Error = TorrentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TorrentHash> for String {
    fn from(hash: TorrentHash) -> Self {
        hash.0
    }
}

/// One file inside a torrent, addressed by its relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative path inside the torrent, `/`-separated.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
}

impl FileEntry {
    /// Construct a new file entry.
    #[must_use]
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Client content-layout setting applied when a torrent is added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentLayout {
    /// Keep the torrent's own structure.
    #[default]
    Original,
    /// Always create a root folder.
    Subfolder,
    /// Strip the root folder if one exists.
    NoSubfolder,
}

impl ContentLayout {
    /// Render the layout using the client's canonical spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Original => "Original",
            Self::Subfolder => "Subfolder",
            Self::NoSubfolder => "NoSubfolder",
        }
    }
}

impl fmt::Display for ContentLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Torrent offered for cross-seeding (from RSS, webhook, or search).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingTorrent {
    /// Content identifier.
    pub hash: TorrentHash,
    /// Display name from the metainfo.
    pub name: String,
    /// Files in metainfo order.
    pub files: Vec<FileEntry>,
    /// Piece length in bytes.
    pub piece_length: u64,
    /// Total number of pieces declared by the metainfo.
    pub piece_count: u64,
    /// Content layout the client would apply by default.
    pub content_layout: ContentLayout,
    /// Tracker domain the torrent was announced on.
    pub tracker: String,
    /// Indexer that supplied the torrent, when known.
    #[serde(default)]
    pub indexer: Option<String>,
    /// Payload handed to the client on add.
    pub source: TorrentSource,
}

impl IncomingTorrent {
    /// Sum of all file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}

/// Snapshot of an already-seeded torrent selected by the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedTorrent {
    /// Content identifier.
    pub hash: TorrentHash,
    /// Display name on the client.
    pub name: String,
    /// Current save path as reported by the client.
    pub save_path: String,
    /// Category assigned on the client (empty when uncategorised).
    #[serde(default)]
    pub category: String,
    /// Whether the client manages the save path through category rules.
    #[serde(default)]
    pub auto_managed: bool,
    /// Files in metainfo order.
    pub files: Vec<FileEntry>,
    /// Completion percentage in the range `0.0..=100.0`.
    pub progress: f64,
}

impl MatchedTorrent {
    /// Whether the torrent is fully downloaded and therefore eligible as a source.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress >= 100.0
    }
}

/// Identifier returned by the client after admitting a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientTorrentId(pub String);

/// Coarse activity state reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentActivity {
    /// Hash check in progress.
    CheckingFiles,
    /// Waiting in the hash-check queue.
    QueuedForChecking,
    /// Client is validating resume data.
    CheckingResumeData,
    /// Stopped by the user or by add options.
    Paused,
    /// Actively downloading.
    Downloading,
    /// Complete and uploading.
    Seeding,
    /// Active with no peers.
    Stalled,
    /// Client reports files missing on disk.
    MissingFiles,
    /// Client reports an error.
    Error,
    /// Anything the adapter could not classify.
    Unknown,
}

impl TorrentActivity {
    /// Whether the client is still verifying pieces.
    #[must_use]
    pub const fn is_checking(self) -> bool {
        matches!(
            self,
            Self::CheckingFiles | Self::QueuedForChecking | Self::CheckingResumeData
        )
    }
}

/// Point-in-time torrent state reported by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTorrentState {
    /// Torrent the state belongs to.
    pub hash: TorrentHash,
    /// Completion percentage in the range `0.0..=100.0`.
    pub progress: f64,
    /// Current activity.
    pub activity: TorrentActivity,
    /// Files as currently named on the client.
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// Fully-resolved add request handed to the client collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddTorrentRequest {
    /// Hash of the torrent being added.
    pub hash: TorrentHash,
    /// Payload for the client.
    pub source: TorrentSource,
    /// Explicit save path; `None` lets auto-management decide.
    pub save_path: Option<String>,
    /// Category to assign; `None` leaves the torrent uncategorised.
    pub category: Option<String>,
    /// Whether the client should manage the save path.
    pub auto_managed: bool,
    /// Content layout to apply.
    pub content_layout: ContentLayout,
    /// Whether the client may skip the initial hash check.
    pub skip_checking: bool,
    /// Whether the torrent is added stopped.
    pub paused: bool,
    /// Tags to attach.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torrent_source_helpers_construct_variants() {
        let magnet = TorrentSource::magnet("magnet:?xt=urn:btih:abc");
        assert!(matches!(magnet, TorrentSource::Magnet { .. }));
        let meta = TorrentSource::metainfo(vec![1_u8, 2, 3]);
        assert!(matches!(meta, TorrentSource::Metainfo { bytes } if bytes.len() == 3));
    }

    #[test]
    fn hash_parse_lowercases_and_shortens() -> Result<(), TorrentError> {
        let hash = TorrentHash::parse(" ABCDEF1234567890 ")?;
        assert_eq!(hash.as_str(), "abcdef1234567890");
        assert_eq!(hash.short(), "abcdef12");
        assert_eq!(TorrentHash::parse("abc")?.short(), "abc");
        assert_eq!(TorrentHash::from_bytes(&[0xAB, 0x01]).as_str(), "ab01");
        Ok(())
    }

    #[test]
    fn hash_parse_rejects_non_hex() {
        assert!(matches!(
            TorrentHash::parse("xyz"),
            Err(TorrentError::InvalidHash { .. })
        ));
        assert!(TorrentHash::parse("").is_err());
    }

    #[test]
    fn hash_deserialises_through_validation() {
        let ok: Result<TorrentHash, _> = serde_json::from_str("\"ABCD\"");
        assert_eq!(ok.map(String::from).ok(), Some("abcd".to_string()));
        let bad: Result<TorrentHash, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn matched_completion_requires_full_progress() {
        let mut matched = MatchedTorrent {
            hash: TorrentHash("aa".into()),
            name: "x".into(),
            save_path: "/data".into(),
            category: String::new(),
            auto_managed: false,
            files: vec![FileEntry::new("x.mkv", 1)],
            progress: 99.9,
        };
        assert!(!matched.is_complete());
        matched.progress = 100.0;
        assert!(matched.is_complete());
    }

    #[test]
    fn checking_activities_are_classified() {
        assert!(TorrentActivity::CheckingFiles.is_checking());
        assert!(TorrentActivity::QueuedForChecking.is_checking());
        assert!(!TorrentActivity::Paused.is_checking());
        assert_eq!(ContentLayout::NoSubfolder.to_string(), "NoSubfolder");
    }
}
