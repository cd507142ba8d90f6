//! Check result cache with TTL-based expiration.
//!
//! Expiry is lazy: there is no sweeper, an expired entry is removed by the
//! next read that trips over it.

use std::fmt;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::checker::CheckOutcome;
use crate::resolver::Resolver;

/// Storage backend for check outcomes.
///
/// Implement this to plug in a shared or remote store. [`NoCache`] turns
/// caching off without callers having to special-case it.
pub trait Cache: Send + Sync + fmt::Debug {
    /// A live entry for `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Option<CheckOutcome>;

    fn set(&self, key: &str, outcome: CheckOutcome);

    /// Drop every entry.
    fn flush(&self);
}

/// Cache key for a domain checked against one resolver.
///
/// The keyword and record type are part of the key, so reconfiguring a
/// resolver implicitly invalidates what was cached under the old settings.
pub fn cache_key(domain: &str, resolver: &Resolver) -> String {
    format!(
        "{}:{}:{}:{}",
        domain,
        resolver.address,
        resolver.keyword,
        u16::from(resolver.record_type)
    )
}

struct CacheEntry {
    outcome: CheckOutcome,
    expires_at: Instant,
}

/// In-process TTL cache.
pub struct MemoryCache {
    entries: RwLock<FxHashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove `key` only if it still holds the entry that expired at `seen`;
    /// a fresher write may have landed between the read and write locks.
    fn evict_if_unchanged(&self, key: &str, seen: Instant) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if entries.get(key).is_some_and(|e| e.expires_at == seen) {
            entries.remove(key);
        }
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<CheckOutcome> {
        let now = Instant::now();

        let seen = {
            let Ok(entries) = self.entries.read() else {
                return None;
            };
            let entry = entries.get(key)?;
            if now < entry.expires_at {
                return Some(entry.outcome.clone());
            }
            entry.expires_at
        };

        self.evict_if_unchanged(key, seen);
        None
    }

    fn set(&self, key: &str, outcome: CheckOutcome) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        entries.insert(
            key.to_string(),
            CacheEntry {
                outcome,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    fn flush(&self) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        *entries = FxHashMap::default();
    }
}

/// Always misses; used when caching is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _key: &str) -> Option<CheckOutcome> {
        None
    }

    fn set(&self, _key: &str, _outcome: CheckOutcome) {}

    fn flush(&self) {}
}
