// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered key-value store on SQLite.
//!
//! One table, `kv(key TEXT PRIMARY KEY, value TEXT)`; the primary-key
//! index gives lexicographic range scans for free. All access goes through
//! tokio-rusqlite's single background thread. Do NOT open additional
//! connections for writes to the same keyspace.

use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;
use tracing::debug;

use zapgate_core::GatewayError;

/// Convert a tokio-rusqlite error into `GatewayError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> GatewayError {
    GatewayError::Storage {
        source: Box::new(e),
    }
}

/// SQLite-backed ordered key-value store.
///
/// Cloning is cheap and shares the same background connection thread.
#[derive(Clone)]
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    /// Opens (or creates) the database at `path`, enabling WAL mode and
    /// creating the `kv` table if needed.
    pub async fn open(path: &str) -> Result<Self, GatewayError> {
        let conn = Connection::open(path).await.map_err(map_tr_err)?;
        let kv = Self { conn };
        kv.init().await?;
        debug!(path, "kv store opened");
        Ok(kv)
    }

    /// Opens an in-memory database (tests).
    pub async fn open_in_memory() -> Result<Self, GatewayError> {
        let conn = Connection::open_in_memory().await.map_err(map_tr_err)?;
        let kv = Self { conn };
        kv.init().await?;
        Ok(kv)
    }

    async fn init(&self) -> Result<(), GatewayError> {
        self.conn
            .call(|conn| {
                // journal_mode returns the resulting mode as a row, so it
                // goes through pragma_update rather than execute_batch.
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS kv (
                         key   TEXT PRIMARY KEY NOT NULL,
                         value TEXT NOT NULL
                     );",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// The underlying connection handle, for components that need to run
    /// compound read-modify-write operations in a single closure.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub async fn put(&self, key: &str, value: String) -> Result<(), GatewayError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                put_sync(conn, &key, &value)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| Ok(get_sync(conn, &key)?))
            .await
            .map_err(map_tr_err)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        Ok(self.get(key).await?.is_some())
    }

    pub async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Range-scans all keys starting with `prefix`, in key order
    /// (`reverse` flips it), up to `limit` entries.
    pub async fn scan_prefix(
        &self,
        prefix: &str,
        reverse: bool,
        limit: Option<u64>,
    ) -> Result<Vec<(String, String)>, GatewayError> {
        let prefix = prefix.to_string();
        self.conn
            .call(move |conn| Ok(scan_prefix_sync(conn, &prefix, reverse, limit)?))
            .await
            .map_err(map_tr_err)
    }

    /// Flushes the WAL into the main database file (shutdown path).
    pub async fn checkpoint(&self) -> Result<(), GatewayError> {
        self.conn
            .call(|conn| {
                // wal_checkpoint returns a (busy, log, checkpointed) row.
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_row| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

// Synchronous helpers shared by the async methods above and by compound
// closures in the conversation store and ledger.

pub fn put_sync(
    conn: &rusqlite::Connection,
    key: &str,
    value: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn get_sync(
    conn: &rusqlite::Connection,
    key: &str,
) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
        row.get(0)
    })
    .optional()
}

pub fn scan_prefix_sync(
    conn: &rusqlite::Connection,
    prefix: &str,
    reverse: bool,
    limit: Option<u64>,
) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let upper = prefix_upper_bound(prefix);
    let order = if reverse { "DESC" } else { "ASC" };
    let limit_clause = match limit {
        Some(n) => format!(" LIMIT {n}"),
        None => String::new(),
    };

    let mut rows = Vec::new();
    match upper {
        Some(upper) => {
            let sql = format!(
                "SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key {order}{limit_clause}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map(params![prefix, upper], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in mapped {
                rows.push(row?);
            }
        }
        None => {
            let sql = format!(
                "SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key {order}{limit_clause}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map(params![prefix], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in mapped {
                rows.push(row?);
            }
        }
    }
    Ok(rows)
}

/// Smallest string strictly greater than every key with the given prefix,
/// or `None` when no such bound exists (prefix of 0xFF bytes).
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut bytes = prefix.as_bytes().to_vec();
    while let Some(last) = bytes.last_mut() {
        if *last < 0xFF {
            *last += 1;
            // Our prefixes are ASCII, so the bumped byte stays valid UTF-8.
            return String::from_utf8(bytes).ok();
        }
        bytes.pop();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_overwrite_delete() {
        let kv = SqliteKv::open_in_memory().await.unwrap();

        kv.put("a", "1".into()).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("1"));

        kv.put("a", "2".into()).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("2"));

        kv.delete("a").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
        assert!(!kv.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn scan_prefix_is_ordered_and_bounded() {
        let kv = SqliteKv::open_in_memory().await.unwrap();

        for key in ["b:1", "b:2", "b:3", "a:9", "c:0"] {
            kv.put(key, key.to_uppercase()).await.unwrap();
        }

        let forward = kv.scan_prefix("b:", false, None).await.unwrap();
        let keys: Vec<&str> = forward.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b:1", "b:2", "b:3"]);

        let reverse = kv.scan_prefix("b:", true, Some(2)).await.unwrap();
        let keys: Vec<&str> = reverse.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b:3", "b:2"]);
    }

    #[tokio::test]
    async fn scan_prefix_excludes_adjacent_prefixes() {
        let kv = SqliteKv::open_in_memory().await.unwrap();

        // "b;" sorts immediately after every "b:..." key.
        kv.put("b:x", "in".into()).await.unwrap();
        kv.put("b;y", "out".into()).await.unwrap();

        let rows = kv.scan_prefix("b:", false, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "b:x");
    }

    #[tokio::test]
    async fn zero_padded_keys_scan_in_time_order() {
        let kv = SqliteKv::open_in_memory().await.unwrap();

        let timestamps = [999_i64, 1_000, 10_000, 2];
        for ts in timestamps {
            kv.put(&format!("m:{ts:013}"), ts.to_string()).await.unwrap();
        }

        let rows = kv.scan_prefix("m:", false, None).await.unwrap();
        let values: Vec<&str> = rows.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(values, vec!["2", "999", "1000", "10000"]);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        let path = path.to_str().unwrap();

        {
            let kv = SqliteKv::open(path).await.unwrap();
            kv.put("durable", "yes".into()).await.unwrap();
            kv.checkpoint().await.unwrap();
        }

        let kv = SqliteKv::open(path).await.unwrap();
        assert_eq!(kv.get("durable").await.unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn upper_bound_increments_last_byte() {
        assert_eq!(prefix_upper_bound("b:").as_deref(), Some("b;"));
        assert_eq!(prefix_upper_bound("a").as_deref(), Some("b"));
        assert_eq!(prefix_upper_bound(""), None);
    }
}
