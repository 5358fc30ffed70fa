//! Session cache: one refresh token per session key, with a time-to-live.

use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::clock::Clock;
use crate::storage::models::CachedSession;
use crate::storage::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("session cache backend error: {0}")]
    Backend(#[from] DatabaseError),
}

/// Key-value store with per-key TTL.
///
/// `set` overwrites and `delete` removes atomically per key; expired entries read as absent.
pub trait SessionCache: Send + Sync {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    /// Returns whether a live entry was removed. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;
}

/// Session cache persisted in the embedded database, so sessions survive restarts.
pub struct RedbSessionCache {
    clock: Arc<dyn Clock>,
    db: Database,
}

impl RedbSessionCache {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { clock, db }
    }
}

impl SessionCache for RedbSessionCache {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let session = CachedSession {
            expires_at: self.clock.now() + ttl,
            value: value.to_string(),
        };
        self.db.put_cached_session(key, &session)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.db.get_cached_session(key)? {
            Some(session) if session.expires_at > self.clock.now() => Ok(Some(session.value)),
            // Expired entries are left for the sweeper
            _ => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let live = self.get(key)?.is_some();
        self.db.delete_cached_session(key)?;
        Ok(live)
    }
}

/// Process-local session cache. Sessions are lost on restart.
pub struct MemorySessionCache {
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CachedSession>>,
}

impl MemorySessionCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl SessionCache for MemorySessionCache {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let session = CachedSession {
            expires_at: self.clock.now() + ttl,
            value: value.to_string(),
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), session);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .get(key)
            .filter(|s| s.expires_at > now)
            .map(|s| s.value.clone()))
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .remove(key)
            .map_or(false, |s| s.expires_at > now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testutil::setup_db;

    fn exercise(cache: &dyn SessionCache, clock: &ManualClock) {
        assert!(cache.get("u1").unwrap().is_none());

        cache.set("u1", "first", Duration::days(7)).unwrap();
        assert_eq!(cache.get("u1").unwrap().as_deref(), Some("first"));

        // Last write wins
        cache.set("u1", "second", Duration::days(7)).unwrap();
        assert_eq!(cache.get("u1").unwrap().as_deref(), Some("second"));

        assert!(cache.delete("u1").unwrap());
        assert!(!cache.delete("u1").unwrap());
        assert!(cache.get("u1").unwrap().is_none());

        // TTL
        cache.set("u2", "tok", Duration::days(7)).unwrap();
        clock.advance(Duration::days(7));
        assert!(cache.get("u2").unwrap().is_none());
        assert!(!cache.delete("u2").unwrap());
    }

    #[test]
    fn test_redb_session_cache() {
        let (db, _temp) = setup_db();
        let clock = Arc::new(ManualClock::default());
        let cache = RedbSessionCache::new(db, clock.clone());
        exercise(&cache, &clock);
    }

    #[test]
    fn test_memory_session_cache() {
        let clock = Arc::new(ManualClock::default());
        let cache = MemorySessionCache::new(clock.clone());
        exercise(&cache, &clock);
    }
}
