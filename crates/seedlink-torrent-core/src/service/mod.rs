//! Collaborator traits implemented by client adapters and the matching layer.

use anyhow::bail;
use async_trait::async_trait;

use crate::model::{
    AddTorrentRequest, ClientTorrentId, ClientTorrentState, IncomingTorrent, MatchedTorrent,
    TorrentHash,
};

/// Remote torrent client driven by the cross-seed engine.
///
/// Adapters speak the client's wire protocol; the engine only supplies values
/// computed from its link plan and category decision.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Admit a torrent with fully resolved options.
    async fn add_torrent(&self, request: AddTorrentRequest) -> anyhow::Result<ClientTorrentId>;

    /// Force a hash check of on-disk data.
    async fn recheck(&self, hash: &TorrentHash) -> anyhow::Result<()>;

    /// Resume a stopped torrent.
    async fn resume(&self, hash: &TorrentHash) -> anyhow::Result<()>;

    /// Fetch the current state, `None` when the client does not know the torrent.
    async fn torrent_state(&self, hash: &TorrentHash) -> anyhow::Result<Option<ClientTorrentState>>;

    /// Save path configured for a category, `None` when unset or unknown.
    async fn category_save_path(&self, category: &str) -> anyhow::Result<Option<String>> {
        let _ = category;
        Ok(None)
    }

    /// Create the category when missing; default implementation reports lack of support.
    async fn ensure_category(&self, name: &str, save_path: Option<&str>) -> anyhow::Result<()> {
        let _ = (name, save_path);
        bail!("category management not supported by this client");
    }

    /// Rename a file inside a torrent; default implementation reports lack of support.
    async fn rename_file(&self, hash: &TorrentHash, old: &str, new: &str) -> anyhow::Result<()> {
        let _ = (hash, old, new);
        bail!("file rename not supported by this client");
    }

    /// Rename a folder inside a torrent; default implementation reports lack of support.
    async fn rename_folder(&self, hash: &TorrentHash, old: &str, new: &str) -> anyhow::Result<()> {
        let _ = (hash, old, new);
        bail!("folder rename not supported by this client");
    }
}

/// Content-equality matcher that selects an already-seeded torrent.
#[async_trait]
pub trait TorrentMatcher: Send + Sync {
    /// Find a seeded torrent carrying the same content, if any.
    async fn find_match(&self, incoming: &IncomingTorrent)
    -> anyhow::Result<Option<MatchedTorrent>>;
}

/// Resolves tracker domains to human display names.
pub trait TrackerNameResolver: Send + Sync {
    /// Display name for the domain, `None` when unknown.
    fn display_name(&self, tracker_domain: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubClient;

    #[async_trait]
    impl TorrentClient for StubClient {
        async fn add_torrent(&self, request: AddTorrentRequest) -> anyhow::Result<ClientTorrentId> {
            Ok(ClientTorrentId(request.hash.to_string()))
        }

        async fn recheck(&self, _hash: &TorrentHash) -> anyhow::Result<()> {
            Ok(())
        }

        async fn resume(&self, _hash: &TorrentHash) -> anyhow::Result<()> {
            Ok(())
        }

        async fn torrent_state(
            &self,
            _hash: &TorrentHash,
        ) -> anyhow::Result<Option<ClientTorrentState>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn client_default_methods_error() -> anyhow::Result<()> {
        let client = StubClient;
        let hash = TorrentHash::parse("abcdef")?;
        assert!(client.ensure_category("tv.cross", None).await.is_err());
        assert!(client.rename_file(&hash, "a", "b").await.is_err());
        assert!(
            client
                .rename_folder(&hash, "a", "b")
                .await
                .expect_err("folder rename should error")
                .to_string()
                .contains("folder rename")
        );
        assert_eq!(client.category_save_path("tv").await?, None);
        Ok(())
    }
}
