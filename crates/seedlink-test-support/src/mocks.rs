//! Fake collaborators for integration tests.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use async_trait::async_trait;
use seedlink_fsops::CloneOps;
use seedlink_torrent_core::{
    AddTorrentRequest, ClientTorrentId, ClientTorrentState, IncomingTorrent, MatchedTorrent,
    TorrentClient, TorrentHash, TorrentMatcher, TrackerNameResolver,
};
use tokio::sync::RwLock;

/// Torrent client that records every call and replays scripted states.
#[derive(Debug, Default)]
pub struct RecordingClient {
    calls: RwLock<Vec<String>>,
    added: RwLock<Vec<AddTorrentRequest>>,
    rechecked: RwLock<Vec<TorrentHash>>,
    resumed: RwLock<Vec<TorrentHash>>,
    categories: RwLock<Vec<(String, Option<String>)>>,
    renamed_files: RwLock<Vec<(String, String)>>,
    renamed_folders: RwLock<Vec<(String, String)>>,
    category_paths: RwLock<HashMap<String, String>>,
    states: RwLock<HashMap<TorrentHash, VecDeque<ClientTorrentState>>>,
    add_failure: RwLock<Option<String>>,
    recheck_failure: RwLock<Option<String>>,
}

impl RecordingClient {
    /// Empty client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a state returned by `torrent_state`; the last queued state repeats.
    pub async fn push_state(&self, state: ClientTorrentState) {
        self.states
            .write()
            .await
            .entry(state.hash.clone())
            .or_default()
            .push_back(state);
    }

    /// Configure a category save path reported by `category_save_path`.
    pub async fn set_category_path(&self, category: &str, path: &str) {
        self.category_paths
            .write()
            .await
            .insert(category.to_string(), path.to_string());
    }

    /// Make `add_torrent` fail with the given message.
    pub async fn fail_adds(&self, message: &str) {
        *self.add_failure.write().await = Some(message.to_string());
    }

    /// Make `recheck` fail with the given message.
    pub async fn fail_rechecks(&self, message: &str) {
        *self.recheck_failure.write().await = Some(message.to_string());
    }

    /// Method names in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    /// Add requests received.
    pub async fn added(&self) -> Vec<AddTorrentRequest> {
        self.added.read().await.clone()
    }

    /// Hashes rechecked.
    pub async fn rechecked(&self) -> Vec<TorrentHash> {
        self.rechecked.read().await.clone()
    }

    /// Hashes resumed.
    pub async fn resumed(&self) -> Vec<TorrentHash> {
        self.resumed.read().await.clone()
    }

    /// Categories ensured, with their save paths.
    pub async fn categories(&self) -> Vec<(String, Option<String>)> {
        self.categories.read().await.clone()
    }

    /// File renames applied as `(old, new)`.
    pub async fn renamed_files(&self) -> Vec<(String, String)> {
        self.renamed_files.read().await.clone()
    }

    /// Folder renames applied as `(old, new)`.
    pub async fn renamed_folders(&self) -> Vec<(String, String)> {
        self.renamed_folders.read().await.clone()
    }

    async fn record(&self, call: &str) {
        self.calls.write().await.push(call.to_string());
    }
}

#[async_trait]
impl TorrentClient for RecordingClient {
    async fn add_torrent(&self, request: AddTorrentRequest) -> anyhow::Result<ClientTorrentId> {
        self.record("add_torrent").await;
        if let Some(message) = self.add_failure.read().await.clone() {
            bail!(message);
        }
        let id = ClientTorrentId(request.hash.to_string());
        self.added.write().await.push(request);
        Ok(id)
    }

    async fn recheck(&self, hash: &TorrentHash) -> anyhow::Result<()> {
        self.record("recheck").await;
        if let Some(message) = self.recheck_failure.read().await.clone() {
            bail!(message);
        }
        self.rechecked.write().await.push(hash.clone());
        Ok(())
    }

    async fn resume(&self, hash: &TorrentHash) -> anyhow::Result<()> {
        self.record("resume").await;
        self.resumed.write().await.push(hash.clone());
        Ok(())
    }

    async fn torrent_state(&self, hash: &TorrentHash) -> anyhow::Result<Option<ClientTorrentState>> {
        let mut states = self.states.write().await;
        let Some(queue) = states.get_mut(hash) else {
            return Ok(None);
        };
        if queue.len() > 1 {
            return Ok(queue.pop_front());
        }
        Ok(queue.front().cloned())
    }

    async fn category_save_path(&self, category: &str) -> anyhow::Result<Option<String>> {
        Ok(self.category_paths.read().await.get(category).cloned())
    }

    async fn ensure_category(&self, name: &str, save_path: Option<&str>) -> anyhow::Result<()> {
        self.record("ensure_category").await;
        self.categories
            .write()
            .await
            .push((name.to_string(), save_path.map(str::to_string)));
        Ok(())
    }

    async fn rename_file(&self, _hash: &TorrentHash, old: &str, new: &str) -> anyhow::Result<()> {
        self.record("rename_file").await;
        self.renamed_files
            .write()
            .await
            .push((old.to_string(), new.to_string()));
        Ok(())
    }

    async fn rename_folder(&self, _hash: &TorrentHash, old: &str, new: &str) -> anyhow::Result<()> {
        self.record("rename_folder").await;
        self.renamed_folders
            .write()
            .await
            .push((old.to_string(), new.to_string()));
        Ok(())
    }
}

/// Matcher returning a fixed answer for every incoming torrent.
#[derive(Debug, Clone, Default)]
pub struct StaticMatcher {
    matched: Option<MatchedTorrent>,
}

impl StaticMatcher {
    /// Matcher that always returns `matched`.
    #[must_use]
    pub const fn new(matched: Option<MatchedTorrent>) -> Self {
        Self { matched }
    }
}

#[async_trait]
impl TorrentMatcher for StaticMatcher {
    async fn find_match(&self, _incoming: &IncomingTorrent) -> anyhow::Result<Option<MatchedTorrent>> {
        Ok(self.matched.clone())
    }
}

/// Tracker-name resolver backed by a fixed table that counts lookups.
#[derive(Debug, Default)]
pub struct StaticTrackerNames {
    names: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl StaticTrackerNames {
    /// Resolver from `(domain, display name)` pairs.
    #[must_use]
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            names: entries
                .iter()
                .map(|(domain, name)| ((*domain).to_string(), (*name).to_string()))
                .collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of lookups served.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl TrackerNameResolver for StaticTrackerNames {
    fn display_name(&self, tracker_domain: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.names.get(tracker_domain).cloned()
    }
}

/// Clone calls that copy bytes, standing in for a copy-on-write filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyCloneOps;

impl CloneOps for CopyCloneOps {
    fn clone_file(&self, source: &File, target: &File) -> io::Result<()> {
        let mut reader = source;
        let mut writer = target;
        io::copy(&mut reader, &mut writer).map(drop)
    }

    fn clone_range(&self, source: &File, target: &File, _length: u64) -> io::Result<()> {
        self.clone_file(source, target)
    }
}

/// Clone calls that always report the operation as unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCloneOps;

impl CloneOps for UnsupportedCloneOps {
    fn clone_file(&self, _source: &File, _target: &File) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    fn clone_range(&self, _source: &File, _target: &File, _length: u64) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::torrent_hash;
    use seedlink_torrent_core::TorrentActivity;

    fn state(progress: f64, activity: TorrentActivity) -> ClientTorrentState {
        ClientTorrentState {
            hash: torrent_hash(7),
            progress,
            activity,
            files: Vec::new(),
        }
    }

    #[tokio::test]
    async fn scripted_states_replay_then_repeat() -> anyhow::Result<()> {
        let client = RecordingClient::new();
        let hash = torrent_hash(7);
        assert!(client.torrent_state(&hash).await?.is_none());

        client.push_state(state(10.0, TorrentActivity::CheckingFiles)).await;
        client.push_state(state(100.0, TorrentActivity::Paused)).await;
        let first = client.torrent_state(&hash).await?;
        let second = client.torrent_state(&hash).await?;
        let third = client.torrent_state(&hash).await?;
        assert_eq!(first.map(|s| s.activity), Some(TorrentActivity::CheckingFiles));
        assert_eq!(second.map(|s| s.activity), Some(TorrentActivity::Paused));
        assert_eq!(third.map(|s| s.activity), Some(TorrentActivity::Paused));
        Ok(())
    }

    #[test]
    fn tracker_names_count_lookups() {
        let names = StaticTrackerNames::new(&[("tracker.example.org", "Example")]);
        assert_eq!(names.display_name("tracker.example.org").as_deref(), Some("Example"));
        assert_eq!(names.display_name("other"), None);
        assert_eq!(names.lookups(), 2);
    }
}
