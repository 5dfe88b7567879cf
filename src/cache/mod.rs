//! Persistent summary cache.
//!
//! Entries are addressed by the SHA-256 of the canonical video id and stored in
//! SQLite, so they survive restarts. Expiry is lazy: an entry whose age has
//! reached its TTL reads as a miss but stays on disk until it is overwritten,
//! cleared, or removed by [`SummaryCache::cleanup_expired`]. There is no
//! background sweep.
//!
//! Caching never fails a request. Read errors degrade to a miss and write
//! errors are logged and dropped.

use crate::error::{RecapError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS summaries (
        cache_key TEXT PRIMARY KEY,
        video_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        source_url TEXT,
        created_at INTEGER NOT NULL,
        ttl_seconds INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_summaries_created_at ON summaries(created_at);
"#;

/// Cache occupancy report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub payload_bytes: u64,
}

/// SQLite-backed, TTL-bounded summary store.
pub struct SummaryCache {
    conn: Mutex<Connection>,
    default_ttl: Duration,
}

impl SummaryCache {
    /// Open (or create) the cache database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, default_ttl: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized summary cache at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            default_ttl,
        })
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory(default_ttl: Duration) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            default_ttl,
        })
    }

    /// TTL applied by callers that don't choose their own.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Deterministic, one-way key for a canonical video id.
    pub fn cache_key(video_id: &str) -> String {
        format!("{:x}", Sha256::digest(video_id.as_bytes()))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RecapError::CacheIo(format!("Failed to acquire lock: {}", e)))
    }

    /// Cached payload for `video_id`, or `None` on miss, expiry, or any read error.
    #[instrument(skip(self))]
    pub fn get(&self, video_id: &str) -> Option<String> {
        match self.try_get(video_id, Utc::now()) {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Cache read failed, treating as miss: {}", e);
                None
            }
        }
    }

    fn try_get(&self, video_id: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let conn = self.conn()?;

        let row: Option<(String, i64, i64)> = conn
            .query_row(
                "SELECT payload, created_at, ttl_seconds FROM summaries WHERE cache_key = ?1",
                params![Self::cache_key(video_id)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((payload, created_at, ttl_seconds)) = row else {
            debug!("Cache miss for {}", video_id);
            return Ok(None);
        };

        if is_expired(created_at, ttl_seconds, now) {
            debug!("Cache entry for {} expired", video_id);
            return Ok(None);
        }

        debug!("Cache hit for {}", video_id);
        Ok(Some(payload))
    }

    /// Store `payload` for `video_id`, replacing any previous entry. Best effort.
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub fn put(&self, video_id: &str, payload: &str, source_url: Option<&str>, ttl: Duration) {
        if let Err(e) = self.try_put(video_id, payload, source_url, ttl, Utc::now()) {
            warn!("Cache write failed for {}: {}", video_id, e);
        }
    }

    fn try_put(
        &self,
        video_id: &str,
        payload: &str,
        source_url: Option<&str>,
        ttl: Duration,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let ttl_seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        conn.execute(
            r#"
            INSERT OR REPLACE INTO summaries
            (cache_key, video_id, payload, source_url, created_at, ttl_seconds)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                Self::cache_key(video_id),
                video_id,
                payload,
                source_url,
                created_at.timestamp_millis(),
                ttl_seconds,
            ],
        )?;

        debug!("Cached summary for {}", video_id);
        Ok(())
    }

    /// Remove one video's entry, or every entry when `video_id` is `None`.
    pub fn clear(&self, video_id: Option<&str>) -> Result<usize> {
        let conn = self.conn()?;
        let removed = match video_id {
            Some(id) => conn.execute(
                "DELETE FROM summaries WHERE cache_key = ?1",
                params![Self::cache_key(id)],
            )?,
            None => conn.execute("DELETE FROM summaries", [])?,
        };
        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    /// Count valid and expired entries.
    pub fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now();
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT created_at, ttl_seconds, length(payload) FROM summaries")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;

        let mut stats = CacheStats::default();
        for row in rows {
            let (created_at, ttl_seconds, bytes) = row?;
            stats.total_entries += 1;
            stats.payload_bytes += bytes.max(0) as u64;
            if is_expired(created_at, ttl_seconds, now) {
                stats.expired_entries += 1;
            } else {
                stats.valid_entries += 1;
            }
        }

        Ok(stats)
    }

    /// Delete every expired entry and return how many were removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM summaries WHERE ?1 - created_at >= ttl_seconds * 1000",
            params![Utc::now().timestamp_millis()],
        )?;
        info!("Removed {} expired cache entries", removed);
        Ok(removed)
    }
}

fn is_expired(created_at_ms: i64, ttl_seconds: i64, now: DateTime<Utc>) -> bool {
    let age_ms = now.timestamp_millis().saturating_sub(created_at_ms);
    age_ms >= ttl_seconds.saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_unseen_key_misses() {
        let cache = SummaryCache::in_memory(HOUR).unwrap();
        assert_eq!(cache.get("dQw4w9WgXcQ"), None);
    }

    #[test]
    fn test_put_then_get_returns_payload_unchanged() {
        let cache = SummaryCache::in_memory(HOUR).unwrap();
        let payload = "## General Summary\n\nÜnïcödé and [00:42] timestamps";

        cache.put("dQw4w9WgXcQ", payload, Some("https://youtu.be/dQw4w9WgXcQ"), HOUR);
        assert_eq!(cache.get("dQw4w9WgXcQ").as_deref(), Some(payload));
        assert_eq!(cache.get("aaaaaaaaaaa"), None);
    }

    #[test]
    fn test_expired_entry_misses_but_remains() {
        let cache = SummaryCache::in_memory(HOUR).unwrap();
        let written = Utc::now() - chrono::Duration::hours(2);
        cache
            .try_put("dQw4w9WgXcQ", "old", None, HOUR, written)
            .unwrap();

        assert_eq!(cache.get("dQw4w9WgXcQ"), None);

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.expired_entries, 1);

        // Expired entries are eligible for overwrite.
        cache.put("dQw4w9WgXcQ", "new", None, HOUR);
        assert_eq!(cache.get("dQw4w9WgXcQ").as_deref(), Some("new"));
    }

    #[test]
    fn test_entry_valid_until_ttl() {
        let cache = SummaryCache::in_memory(HOUR).unwrap();
        let written = Utc::now();
        cache.try_put("vid", "p", None, HOUR, written).unwrap();

        let just_before = written + chrono::Duration::minutes(59);
        let at_ttl = written + chrono::Duration::minutes(60);
        assert_eq!(cache.try_get("vid", just_before).unwrap().as_deref(), Some("p"));
        assert_eq!(cache.try_get("vid", at_ttl).unwrap(), None);
    }

    #[test]
    fn test_zero_ttl_is_immediately_stale() {
        let cache = SummaryCache::in_memory(HOUR).unwrap();
        cache.put("vid", "p", None, Duration::ZERO);
        assert_eq!(cache.get("vid"), None);
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = SummaryCache::cache_key("dQw4w9WgXcQ");
        assert_eq!(a, SummaryCache::cache_key("dQw4w9WgXcQ"));
        assert_ne!(a, SummaryCache::cache_key("dQw4w9WgXcR"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = SummaryCache::new(&path, HOUR).unwrap();
            cache.put("dQw4w9WgXcQ", "persisted", None, HOUR);
        }

        let reopened = SummaryCache::new(&path, HOUR).unwrap();
        assert_eq!(reopened.get("dQw4w9WgXcQ").as_deref(), Some("persisted"));
    }

    #[test]
    fn test_clear_and_cleanup() {
        let cache = SummaryCache::in_memory(HOUR).unwrap();
        let old = Utc::now() - chrono::Duration::hours(3);
        cache.try_put("stale", "x", None, HOUR, old).unwrap();
        cache.put("fresh-one", "y", None, HOUR);
        cache.put("fresh-two", "z", None, HOUR);

        assert_eq!(cache.cleanup_expired().unwrap(), 1);
        assert_eq!(cache.clear(Some("fresh-one")).unwrap(), 1);
        assert_eq!(cache.stats().unwrap().total_entries, 1);
        assert_eq!(cache.clear(None).unwrap(), 1);
    }
}
