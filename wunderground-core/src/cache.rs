//! Response cache keyed by resolved request URL.

use serde_json::Value;
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

/// Seconds a response stays cached when no TTL is given.
pub const DEFAULT_TTL_SECS: u64 = 300;
/// Seconds between sweeps of expired entries when none is given.
pub const DEFAULT_SWEEP_SECS: u64 = 30;

/// Stores parsed responses under an opaque key with an expiry.
pub trait ResponseCache: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value, ttl: Duration);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

#[derive(Debug)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    last_sweep: Instant,
}

/// In-memory TTL cache.
///
/// Expired entries are never returned. They are physically removed by a
/// sweep, which runs on access once `sweep_interval` has passed since the
/// previous one, or on demand through [`TtlCache::sweep`].
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    sweep_interval: Duration,
    entries: Mutex<Entries>,
}

impl TtlCache {
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            ttl,
            sweep_interval,
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Cache with 0 meaning "use the default" for either setting.
    pub fn from_secs(ttl_secs: u64, sweep_secs: u64) -> Self {
        let ttl = if ttl_secs == 0 {
            DEFAULT_TTL_SECS
        } else {
            ttl_secs
        };
        let sweep = if sweep_secs == 0 {
            DEFAULT_SWEEP_SECS
        } else {
            sweep_secs
        };
        Self::new(Duration::from_secs(ttl), Duration::from_secs(sweep))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut entries = self.lock();
        Self::sweep_locked(&mut entries, Instant::now())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep_locked(entries: &mut Entries, now: Instant) -> usize {
        let before = entries.map.len();
        entries.map.retain(|_, entry| !entry.is_expired(now));
        entries.last_sweep = now;

        let removed = before - entries.map.len();
        if removed > 0 {
            tracing::trace!(removed, "Swept expired cache entries");
        }
        removed
    }

    fn maybe_sweep(&self, entries: &mut Entries, now: Instant) {
        if now.duration_since(entries.last_sweep) >= self.sweep_interval {
            Self::sweep_locked(entries, now);
        }
    }
}

impl ResponseCache for TtlCache {
    fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.lock();
        self.maybe_sweep(&mut entries, now);

        entries
            .map
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.lock();
        self.maybe_sweep(&mut entries, now);

        entries.map.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                ttl,
            },
        );
    }
}
