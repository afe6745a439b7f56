// src/ingest/cache.rs

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::{debug, trace};

use crate::error::PipelineResult;
use crate::ingest::{parse_bytes, raw_table::RawTable, FileKind};

/// Freshness window for parsed tables.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

type CacheKey = (FileKind, Vec<u8>);

struct Entry {
    table: Arc<RawTable>,
    inserted_at: Instant,
}

/// Parsed tables keyed by file kind + SHA-256 of the raw bytes.
///
/// Invalidation rules:
/// - an entry older than `ttl` is stale: a lookup of its key parses the
///   bytes again, and every insert first sweeps all stale entries;
/// - failed parses are never stored;
/// - the file name is not part of the key, so identical content uploaded
///   under two names shares one table.
pub struct TableCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

static GLOBAL: Lazy<TableCache> = Lazy::new(|| TableCache::with_ttl(DEFAULT_CACHE_TTL));

impl TableCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide cache used by [`crate::ingest::load_cached`].
    pub fn global() -> &'static TableCache {
        &GLOBAL
    }

    /// Return the cached table for `data`, parsing it on a miss or after expiry.
    pub fn load(&self, source_name: &str, data: &[u8]) -> PipelineResult<Arc<RawTable>> {
        self.load_at(source_name, data, Instant::now())
    }

    /// [`TableCache::load`] with an explicit clock reading.
    pub fn load_at(
        &self,
        source_name: &str,
        data: &[u8],
        now: Instant,
    ) -> PipelineResult<Arc<RawTable>> {
        let kind = FileKind::from_name(source_name)?;
        let key: CacheKey = (kind, Sha256::digest(data).to_vec());

        {
            let mut entries = self.lock();
            let cached = entries.get(&key).map(|e| {
                let fresh = now.saturating_duration_since(e.inserted_at) < self.ttl;
                (fresh, Arc::clone(&e.table))
            });
            match cached {
                Some((true, table)) => {
                    trace!(source = source_name, "table cache hit");
                    return Ok(table);
                }
                Some((false, _)) => {
                    debug!(source = source_name, "table cache entry expired");
                    entries.remove(&key);
                }
                None => trace!(source = source_name, "table cache miss"),
            }
        }

        // parse outside the lock; a failure leaves the cache untouched
        let table = Arc::new(parse_bytes(kind, source_name, data)?);
        let mut entries = self.lock();
        let evicted = self.evict_expired(&mut entries, now);
        if evicted > 0 {
            debug!(evicted, "evicted stale tables");
        }
        entries.insert(
            key,
            Entry {
                table: Arc::clone(&table),
                inserted_at: now,
            },
        );
        Ok(table)
    }

    /// Drop every entry whose freshness window has passed at `now`.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        self.evict_expired(&mut entries, now)
    }

    fn evict_expired(&self, entries: &mut HashMap<CacheKey, Entry>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.inserted_at) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Entry>> {
        // a poisoned map only ever holds fully-built entries
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    const CSV: &[u8] = b"sales,country\n10,US\n20,CA\n";

    #[test]
    fn test_identical_content_shares_table() {
        let cache = TableCache::with_ttl(Duration::from_secs(60));
        let now = Instant::now();
        let a = cache.load_at("a.csv", CSV, now).unwrap();
        let b = cache.load_at("renamed.csv", CSV, now).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_reparsed() {
        let cache = TableCache::with_ttl(Duration::from_secs(60));
        let t0 = Instant::now();
        let a = cache.load_at("a.csv", CSV, t0).unwrap();
        let b = cache
            .load_at("a.csv", CSV, t0 + Duration::from_secs(61))
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(*a, *b);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = TableCache::with_ttl(Duration::from_secs(60));
        let err = cache.load("a.csv", b"").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyOrInvalidInput { .. }));
        assert!(cache.is_empty());

        let err = cache.load("a.txt", CSV).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFileType { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache = TableCache::with_ttl(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.load_at("a.csv", CSV, t0).unwrap();
        cache
            .load_at("b.csv", b"revenue\n1\n", t0 + Duration::from_secs(5))
            .unwrap();
        assert_eq!(cache.purge_expired(t0 + Duration::from_secs(12)), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insert_sweeps_stale_entries() {
        let cache = TableCache::with_ttl(Duration::from_secs(10));
        let t0 = Instant::now();
        for i in 0..50 {
            let csv = format!("sales\n{}\n", i);
            cache.load_at("s.csv", csv.as_bytes(), t0).unwrap();
        }
        assert_eq!(cache.len(), 50);

        cache
            .load_at("late.csv", CSV, t0 + Duration::from_secs(3600))
            .unwrap();
        assert_eq!(cache.len(), 1);
    }
}
