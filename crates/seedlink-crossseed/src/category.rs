//! Category and save-path inheritance for cross-seeded torrents.

use seedlink_torrent_core::MatchedTorrent;

/// Suffix appended to inherited categories.
pub const CROSS_SUFFIX: &str = ".cross";

/// Category the matched torrent belongs to, with its configured save path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseCategory {
    /// Category name (empty when uncategorised).
    pub name: String,
    /// Explicit save path configured on the client for this category.
    pub save_path: Option<String>,
}

impl BaseCategory {
    /// Base category without a configured save path.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            save_path: None,
        }
    }
}

/// Category that must exist on the client before the add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureCategory {
    /// Category name.
    pub name: String,
    /// Save path to create it with, when known.
    pub save_path: Option<String>,
}

/// Category, save path, and management mode for the new torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDecision {
    /// Category to assign; `None` leaves the torrent uncategorised.
    pub category: Option<String>,
    /// Explicit save path; `None` means the client manages it.
    pub save_path: Option<String>,
    /// Whether the client manages the save path.
    pub auto_managed: bool,
    /// Category to create on the client first.
    pub ensure: Option<EnsureCategory>,
}

/// Derives [`CategoryDecision`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryResolver {
    cross_suffix: bool,
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CategoryResolver {
    /// Resolver that appends `.cross` when `cross_suffix` is set.
    #[must_use]
    pub const fn new(cross_suffix: bool) -> Self {
        Self { cross_suffix }
    }

    /// Decide the category for a cross-seed of `matched`.
    ///
    /// With `use_indexer_name` the indexer becomes the category and the save path
    /// is always explicit. Without an indexer name the inherited category is used
    /// but auto-management stays off.
    #[must_use]
    pub fn resolve(
        &self,
        matched: &MatchedTorrent,
        base: &BaseCategory,
        use_indexer_name: bool,
        indexer: Option<&str>,
    ) -> CategoryDecision {
        let explicit_path = base
            .save_path
            .clone()
            .unwrap_or_else(|| matched.save_path.clone());

        if use_indexer_name {
            let category = indexer
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .or_else(|| self.cross_name(&base.name));
            return CategoryDecision {
                ensure: category.clone().map(|name| EnsureCategory {
                    name,
                    save_path: None,
                }),
                category,
                save_path: Some(explicit_path),
                auto_managed: false,
            };
        }

        let Some(category) = self.cross_name(&base.name) else {
            return CategoryDecision {
                category: None,
                save_path: Some(matched.save_path.clone()),
                auto_managed: false,
                ensure: None,
            };
        };

        let ensure = Some(EnsureCategory {
            name: category.clone(),
            save_path: Some(explicit_path.clone()),
        });
        if matched.auto_managed {
            CategoryDecision {
                category: Some(category),
                save_path: None,
                auto_managed: true,
                ensure,
            }
        } else {
            CategoryDecision {
                category: Some(category),
                save_path: Some(explicit_path),
                auto_managed: false,
                ensure,
            }
        }
    }

    fn cross_name(&self, base: &str) -> Option<String> {
        let base = base.trim();
        if base.is_empty() {
            return None;
        }
        if !self.cross_suffix || base.ends_with(CROSS_SUFFIX) {
            return Some(base.to_string());
        }
        Some(format!("{base}{CROSS_SUFFIX}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedlink_torrent_core::{FileEntry, TorrentHash};

    fn matched(category: &str, auto_managed: bool) -> MatchedTorrent {
        MatchedTorrent {
            hash: TorrentHash::from_bytes(&[1; 20]),
            name: "Movie".into(),
            save_path: "/data/movies".into(),
            category: category.into(),
            auto_managed,
            files: vec![FileEntry::new("Movie/a.mkv", 1)],
            progress: 100.0,
        }
    }

    #[test]
    fn inherits_auto_management_with_cross_suffix() {
        let torrent = matched("movies", true);
        let base = BaseCategory {
            name: "movies".into(),
            save_path: Some("/data/movies".into()),
        };
        let decision = CategoryResolver::default().resolve(&torrent, &base, false, None);
        assert_eq!(decision.category.as_deref(), Some("movies.cross"));
        assert!(decision.auto_managed);
        assert_eq!(decision.save_path, None);
        assert_eq!(
            decision.ensure,
            Some(EnsureCategory {
                name: "movies.cross".into(),
                save_path: Some("/data/movies".into()),
            })
        );
    }

    #[test]
    fn manual_torrents_use_base_path_then_matched_path() {
        let torrent = matched("movies", false);
        let resolver = CategoryResolver::default();
        let with_path = BaseCategory {
            name: "movies".into(),
            save_path: Some("/srv/movies".into()),
        };
        let decision = resolver.resolve(&torrent, &with_path, false, None);
        assert_eq!(decision.save_path.as_deref(), Some("/srv/movies"));
        assert!(!decision.auto_managed);

        let decision = resolver.resolve(&torrent, &BaseCategory::named("movies"), false, None);
        assert_eq!(decision.save_path.as_deref(), Some("/data/movies"));
    }

    #[test]
    fn indexer_name_forces_explicit_path() {
        let torrent = matched("movies", true);
        let resolver = CategoryResolver::default();
        let decision = resolver.resolve(&torrent, &BaseCategory::named("movies"), true, Some("Example"));
        assert_eq!(decision.category.as_deref(), Some("Example"));
        assert!(!decision.auto_managed);
        assert_eq!(decision.save_path.as_deref(), Some("/data/movies"));

        let fallback = resolver.resolve(&torrent, &BaseCategory::named("movies"), true, Some("  "));
        assert_eq!(fallback.category.as_deref(), Some("movies.cross"));
        assert!(!fallback.auto_managed);
    }

    #[test]
    fn suffix_rules() {
        let torrent = matched("movies.cross", true);
        let decision =
            CategoryResolver::default().resolve(&torrent, &BaseCategory::named("movies.cross"), false, None);
        assert_eq!(decision.category.as_deref(), Some("movies.cross"));

        let plain = CategoryResolver::new(false).resolve(&torrent, &BaseCategory::named("movies"), false, None);
        assert_eq!(plain.category.as_deref(), Some("movies"));

        let none = CategoryResolver::default().resolve(&matched("", true), &BaseCategory::default(), false, None);
        assert_eq!(none.category, None);
        assert!(!none.auto_managed);
        assert_eq!(none.save_path.as_deref(), Some("/data/movies"));
        assert!(none.ensure.is_none());
    }

    #[test]
    fn resolution_is_pure() {
        let torrent = matched("tv", false);
        let resolver = CategoryResolver::default();
        let base = BaseCategory::named("tv");
        assert_eq!(
            resolver.resolve(&torrent, &base, false, None),
            resolver.resolve(&torrent, &base, false, None)
        );
    }
}
