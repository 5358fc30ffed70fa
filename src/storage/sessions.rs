use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{expiry_key, expiry_key_ms, Database, DatabaseError};
use super::models::CachedSession;
use super::tables::*;

impl Database {
    // ========================================================================
    // Session cache operations
    // ========================================================================

    /// Store the session value for a key, replacing whatever was there
    pub fn put_cached_session(
        &self,
        key: &str,
        session: &CachedSession,
    ) -> Result<(), DatabaseError> {
        debug_assert!(!key.is_empty(), "session key must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            let previous: Option<CachedSession> = table
                .get(key)?
                .map(|v| rmp_serde::from_slice(v.value()))
                .transpose()?;

            let data = rmp_serde::to_vec_named(session)?;
            table.insert(key, data.as_slice())?;

            // Keep exactly one expiration index entry per key
            let mut expiry_table = write_txn.open_table(SESSION_EXPIRY)?;
            if let Some(previous) = previous {
                expiry_table.remove(expiry_key(&previous.expires_at, key).as_str())?;
            }
            let ek = expiry_key(&session.expires_at, key);
            expiry_table.insert(ek.as_str(), key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get the raw session entry for a key, expired or not
    pub fn get_cached_session(&self, key: &str) -> Result<Option<CachedSession>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;

        match table.get(key)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Delete the session entry for a key. Returns whether anything was removed.
    pub fn delete_cached_session(&self, key: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(SESSIONS)?;
            let removed: Option<CachedSession> = table
                .remove(key)?
                .map(|v| rmp_serde::from_slice(v.value()))
                .transpose()?;

            match removed {
                Some(session) => {
                    let mut expiry_table = write_txn.open_table(SESSION_EXPIRY)?;
                    expiry_table.remove(expiry_key(&session.expires_at, key).as_str())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    /// Delete sessions that expired at or before `now`, using the expiration index.
    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let now_ms = now.timestamp_millis();

        // Phase 1: collect expired entries from the index
        let expired: Vec<(String, String)> = {
            let read_txn = self.begin_read()?;
            let table = read_txn.open_table(SESSION_EXPIRY)?;
            let mut result = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let key_str = key.value().to_string();
                match expiry_key_ms(&key_str) {
                    Some(ms) if ms <= now_ms => {
                        result.push((key_str, value.value().to_string()));
                    }
                    _ => break,
                }
            }
            result
        };

        if expired.is_empty() {
            return Ok(0);
        }

        // Phase 2: remove them, re-checking each entry in case it was refreshed meanwhile
        let write_txn = self.begin_write()?;
        let mut removed = 0;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            let mut expiry_table = write_txn.open_table(SESSION_EXPIRY)?;

            for (index_key, session_key) in &expired {
                expiry_table.remove(index_key.as_str())?;

                let current: Option<CachedSession> = table
                    .get(session_key.as_str())?
                    .map(|v| rmp_serde::from_slice(v.value()))
                    .transpose()?;

                if let Some(session) = current {
                    if session.expires_at.timestamp_millis() <= now_ms {
                        table.remove(session_key.as_str())?;
                        removed += 1;
                    }
                }
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::storage::models::CachedSession;
    use crate::testutil::setup_db;

    fn session(value: &str, ttl: Duration) -> CachedSession {
        CachedSession {
            expires_at: Utc::now() + ttl,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_put_overwrites_previous_value() {
        let (db, _temp) = setup_db();

        db.put_cached_session("u1", &session("first", Duration::days(7)))
            .unwrap();
        db.put_cached_session("u1", &session("second", Duration::days(7)))
            .unwrap();

        let cached = db.get_cached_session("u1").unwrap().unwrap();
        assert_eq!(cached.value, "second");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (db, _temp) = setup_db();

        db.put_cached_session("u1", &session("tok", Duration::days(7)))
            .unwrap();
        assert!(db.delete_cached_session("u1").unwrap());
        assert!(!db.delete_cached_session("u1").unwrap());
        assert!(db.get_cached_session("u1").unwrap().is_none());
    }

    #[test]
    fn test_delete_expired_sessions() {
        let (db, _temp) = setup_db();

        db.put_cached_session("old", &session("a", -Duration::minutes(1)))
            .unwrap();
        db.put_cached_session("live", &session("b", Duration::days(1)))
            .unwrap();

        assert_eq!(db.delete_expired_sessions(Utc::now()).unwrap(), 1);
        assert!(db.get_cached_session("old").unwrap().is_none());
        assert!(db.get_cached_session("live").unwrap().is_some());

        // Nothing left to sweep
        assert_eq!(db.delete_expired_sessions(Utc::now()).unwrap(), 0);
    }

    #[test]
    fn test_overwrite_moves_expiry_index() {
        let (db, _temp) = setup_db();

        // Short-lived entry replaced by a long-lived one must survive the sweep
        db.put_cached_session("u1", &session("a", -Duration::minutes(1)))
            .unwrap();
        db.put_cached_session("u1", &session("b", Duration::days(7)))
            .unwrap();

        assert_eq!(db.delete_expired_sessions(Utc::now()).unwrap(), 0);
        assert_eq!(db.get_cached_session("u1").unwrap().unwrap().value, "b");
    }
}
