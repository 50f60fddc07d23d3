//! TTL cache in front of a [`TrackerNameResolver`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use seedlink_torrent_core::TrackerNameResolver;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CachedName {
    name: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Caches display names (including misses) for a fixed TTL.
pub struct TrackerNameCache {
    inner: Arc<dyn TrackerNameResolver>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    entries: Mutex<HashMap<String, CachedName>>,
}

impl TrackerNameCache {
    /// Wrap `inner`, keeping answers for `ttl`.
    #[must_use]
    pub fn new(inner: Arc<dyn TrackerNameResolver>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            inner,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drop the cached answer for `tracker_domain`.
    pub fn invalidate(&self, tracker_domain: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&cache_key(tracker_domain));
    }

    /// Number of cached domains, expired ones included until next lookup.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrackerNameResolver for TrackerNameCache {
    fn display_name(&self, tracker_domain: &str) -> Option<String> {
        let key = cache_key(tracker_domain);
        let now = self.clock.now();
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.retain(|_, cached| cached.expires_at > now);
            if let Some(cached) = entries.get(&key) {
                return cached.name.clone();
            }
        }

        let name = self.inner.display_name(&key);
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key,
                CachedName {
                    name: name.clone(),
                    expires_at,
                },
            );
        name
    }
}

fn cache_key(tracker_domain: &str) -> String {
    tracker_domain.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, by: TimeDelta) {
            let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    #[derive(Default)]
    struct CountingResolver(AtomicUsize);

    impl TrackerNameResolver for CountingResolver {
        fn display_name(&self, tracker_domain: &str) -> Option<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            (tracker_domain == "tracker.example.org").then(|| "Example".to_string())
        }
    }

    #[test]
    fn answers_are_cached_until_expiry() {
        let inner = Arc::new(CountingResolver::default());
        let clock = Arc::new(ManualClock(Mutex::new(DateTime::<Utc>::UNIX_EPOCH)));
        let cache = TrackerNameCache::new(inner.clone(), clock.clone(), Duration::from_secs(60));

        assert_eq!(cache.display_name("Tracker.Example.org ").as_deref(), Some("Example"));
        assert_eq!(cache.display_name("tracker.example.org").as_deref(), Some("Example"));
        assert_eq!(cache.display_name("unknown.example").as_deref(), None);
        assert_eq!(cache.display_name("unknown.example").as_deref(), None);
        assert_eq!(inner.0.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);

        clock.advance(TimeDelta::seconds(61));
        assert_eq!(cache.display_name("tracker.example.org").as_deref(), Some("Example"));
        assert_eq!(inner.0.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_forces_lookup() {
        let inner = Arc::new(CountingResolver::default());
        let cache = TrackerNameCache::new(inner.clone(), Arc::new(SystemClock), Duration::from_secs(3600));
        cache.display_name("tracker.example.org");
        cache.invalidate("TRACKER.example.org");
        assert!(cache.is_empty());
        cache.display_name("tracker.example.org");
        assert_eq!(inner.0.load(Ordering::SeqCst), 2);
    }
}
