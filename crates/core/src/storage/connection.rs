//! SQLite-backed storage with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), creating the schema, and
//! implementing the [`Storage`] port over a single `kv` table.

use super::Storage;
use crate::Error;
use async_trait::async_trait;
use std::path::Path;
use tokio_rusqlite::{Connection, params, rusqlite};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Tracked in SQLite's `user_version` header field.
const SCHEMA_VERSION: i64 = 1;
const SCHEMA: &str = include_str!("../../migrations/001_kv.sql");

/// SQLite storage handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct SqliteStorage {
    pub(crate) conn: Connection,
}

impl SqliteStorage {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and creates the `kv` table on first open.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        Self::migrate(&conn).await?;

        Ok(Self { conn })
    }

    async fn migrate(conn: &Connection) -> Result<(), Error> {
        conn.call(|conn| -> Result<(), Error> {
            let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
            if current < SCHEMA_VERSION {
                tracing::debug!(from = current, to = SCHEMA_VERSION, "creating storage schema");
                conn.execute_batch(SCHEMA)
                    .and_then(|_| conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}")))
                    .map_err(|e| Error::MigrationFailed(e.to_string()))?;
            }
            Ok(())
        })
        .await
        .map_err(Error::from)
    }

    /// Schema version recorded in the database header.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0)))
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0));

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![key, value, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let prefix = prefix.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                // substr comparison avoids LIKE wildcard escaping for '%' and '_' in keys
                let mut stmt =
                    conn.prepare("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key ASC")?;
                let keys = stmt
                    .query_map(params![prefix], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let prefix = prefix.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM kv WHERE substr(key, 1, length(?1)) = ?1", params![prefix])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = SqliteStorage::open_in_memory().await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_schema_applied_once() {
        let db = SqliteStorage::open_in_memory().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), SCHEMA_VERSION);

        db.set("document_versions", "{}").await.unwrap();
        SqliteStorage::migrate(&db.conn).await.unwrap();
        assert_eq!(db.get("document_versions").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let db = SqliteStorage::open_in_memory().await.unwrap();
        db.set("document_versions", "{}").await.unwrap();
        assert_eq!(db.get("document_versions").await.unwrap().as_deref(), Some("{}"));

        db.set("document_versions", r#"{"a":[]}"#).await.unwrap();
        assert_eq!(db.get("document_versions").await.unwrap().as_deref(), Some(r#"{"a":[]}"#));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = SqliteStorage::open_in_memory().await.unwrap();
        assert!(db.get("nonexistent").await.unwrap().is_none());
        assert!(!db.delete("nonexistent").await.unwrap());
    }

    #[tokio::test]
    async fn test_prefix_with_wildcard_characters() {
        let db = SqliteStorage::open_in_memory().await.unwrap();
        db.set("cache-entry:v1_0-static:a", "x").await.unwrap();
        db.set("cache-entry:v1x0-static:a", "x").await.unwrap();
        db.set("cache-entry:v1_0-static:b", "x").await.unwrap();

        let keys = db.keys("cache-entry:v1_0-static:").await.unwrap();
        assert_eq!(keys, vec!["cache-entry:v1_0-static:a", "cache-entry:v1_0-static:b"]);

        let removed = db.delete_prefix("cache-entry:v1_0-static:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(db.get("cache-entry:v1x0-static:a").await.unwrap().is_some());
    }
}
