//! Cache pool backed by SQLite.
//!
//! One database file can be opened by several processes; it is the point
//! where adapters serving different requests share cached metadata.
//! Expiry is stored as a unix timestamp in milliseconds and checked on read.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use drivefs_common::backend::CachePool;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct PendingWrite {
    key: String,
    value: String,
    expires_at: i64,
}

pub struct SqlitePool {
    db: Mutex<Connection>,
    deferred: Mutex<Vec<PendingWrite>>,
}

impl SqlitePool {
    /// Open or create the pool at the given database path.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(db_path)
            .with_context(|| format!("Failed to open cache database {}", db_path.display()))?;
        db.busy_timeout(BUSY_TIMEOUT)?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_items (
                cache_key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cache_items_expires ON cache_items(expires_at);",
        )?;

        Ok(Self {
            db: Mutex::new(db),
            deferred: Mutex::new(Vec::new()),
        })
    }

    /// Delete every expired row. Returns the number removed.
    pub fn purge_expired(&self) -> anyhow::Result<usize> {
        let removed = self.db.lock().unwrap().execute(
            "DELETE FROM cache_items WHERE expires_at <= ?1",
            params![now_millis()],
        )?;
        if removed > 0 {
            debug!(removed, "Expired cache rows purged");
        }
        Ok(removed)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn expiry(ttl: Duration) -> i64 {
    now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

impl CachePool for SqlitePool {
    fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let row: Option<(String, i64)> = self
            .db
            .lock()
            .unwrap()
            .query_row(
                "SELECT value, expires_at FROM cache_items WHERE cache_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((value, expires_at)) if expires_at > now_millis() => {
                Ok(Some(serde_json::from_str(&value)?))
            }
            Some(_) => {
                self.delete(key)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> anyhow::Result<()> {
        self.db.lock().unwrap().execute(
            "INSERT OR REPLACE INTO cache_items (cache_key, value, expires_at)
             VALUES (?1, ?2, ?3)",
            params![key, value.to_string(), expiry(ttl)],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.db
            .lock()
            .unwrap()
            .execute("DELETE FROM cache_items WHERE cache_key = ?1", params![key])?;
        Ok(())
    }

    fn save_deferred(&self, key: &str, value: serde_json::Value, ttl: Duration) -> anyhow::Result<()> {
        self.deferred.lock().unwrap().push(PendingWrite {
            key: key.to_string(),
            value: value.to_string(),
            expires_at: expiry(ttl),
        });
        Ok(())
    }

    fn commit(&self) -> anyhow::Result<()> {
        let pending = std::mem::take(&mut *self.deferred.lock().unwrap());
        if pending.is_empty() {
            return Ok(());
        }

        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO cache_items (cache_key, value, expires_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for write in &pending {
                stmt.execute(params![write.key, write.value, write.expires_at])?;
            }
        }
        tx.commit()?;
        debug!(entries = pending.len(), "Deferred cache writes committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::open(&dir.path().join("cache.db")).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_set_and_get() {
        let (_dir, pool) = temp_pool();
        pool.set("abc", json!({"type": "file", "path": "abc"}), Duration::from_secs(60))
            .unwrap();
        assert_eq!(
            pool.get("abc").unwrap(),
            Some(json!({"type": "file", "path": "abc"}))
        );
        assert_eq!(pool.get("missing").unwrap(), None);
    }

    #[test]
    fn test_expired_row_is_removed_on_read() {
        let (_dir, pool) = temp_pool();
        pool.set("abc", json!("x"), Duration::from_millis(0)).unwrap();
        assert_eq!(pool.get("abc").unwrap(), None);
        assert_eq!(pool.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_null_value_round_trips() {
        let (_dir, pool) = temp_pool();
        pool.set("parent_of_abc", serde_json::Value::Null, Duration::from_secs(60))
            .unwrap();
        assert_eq!(pool.get("parent_of_abc").unwrap(), Some(serde_json::Value::Null));
    }

    #[test]
    fn test_deferred_batch() {
        let (_dir, pool) = temp_pool();
        for i in 0..5 {
            pool.save_deferred(&format!("k{}", i), json!(i), Duration::from_secs(60))
                .unwrap();
        }
        assert_eq!(pool.get("k0").unwrap(), None);
        pool.commit().unwrap();
        assert_eq!(pool.get("k4").unwrap(), Some(json!(4)));
    }

    #[test]
    fn test_delete() {
        let (_dir, pool) = temp_pool();
        pool.set("abc", json!(1), Duration::from_secs(60)).unwrap();
        pool.delete("abc").unwrap();
        assert_eq!(pool.get("abc").unwrap(), None);
    }

    #[test]
    fn test_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let a = SqlitePool::open(&path).unwrap();
        let b = SqlitePool::open(&path).unwrap();
        a.set("k", json!("v"), Duration::from_secs(60)).unwrap();
        assert_eq!(b.get("k").unwrap(), Some(json!("v")));
    }

    #[test]
    fn test_purge_expired() {
        let (_dir, pool) = temp_pool();
        pool.save_deferred("old", json!(1), Duration::from_millis(0)).unwrap();
        pool.save_deferred("new", json!(2), Duration::from_secs(60)).unwrap();
        pool.commit().unwrap();
        assert_eq!(pool.purge_expired().unwrap(), 1);
        assert_eq!(pool.get("new").unwrap(), Some(json!(2)));
    }
}
