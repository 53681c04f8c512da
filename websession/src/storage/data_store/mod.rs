mod postgres;
mod sqlite;

use async_trait::async_trait;
use chrono::Utc;

use crate::storage::errors::StorageError;
use crate::storage::types::{DatabasePool, DatabaseSessionStore, SessionBackend};
use crate::utils::time_before;

use postgres::*;
use sqlite::*;

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn validate_table_name(table: &str) -> Result<(), StorageError> {
    let valid = !table.is_empty()
        && table.len() <= 63
        && table
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        && !table.as_bytes()[0].is_ascii_digit();

    if valid {
        Ok(())
    } else {
        Err(StorageError::Config(format!(
            "Invalid session table name: {table:?}"
        )))
    }
}

impl DatabaseSessionStore {
    pub(crate) fn new(pool: DatabasePool, table: String) -> Result<Self, StorageError> {
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl SessionBackend for DatabaseSessionStore {
    fn name(&self) -> &'static str {
        match self.pool {
            DatabasePool::Sqlite(_) => "sqlite",
            DatabasePool::Postgres(_) => "postgres",
        }
    }

    #[tracing::instrument(skip(self), fields(table = %self.table))]
    async fn init(&self) -> Result<(), StorageError> {
        match &self.pool {
            DatabasePool::Sqlite(pool) => create_table_sqlite(pool, &self.table).await,
            DatabasePool::Postgres(pool) => create_table_postgres(pool, &self.table).await,
        }
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match &self.pool {
            DatabasePool::Sqlite(pool) => read_session_sqlite(pool, &self.table, id).await,
            DatabasePool::Postgres(pool) => read_session_postgres(pool, &self.table, id).await,
        }
    }

    async fn write(&self, id: &str, data: &[u8], _ttl: u64) -> Result<(), StorageError> {
        let timestamp = Utc::now().timestamp();
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                write_session_sqlite(pool, &self.table, id, data, timestamp).await
            }
            DatabasePool::Postgres(pool) => {
                write_session_postgres(pool, &self.table, id, data, timestamp).await
            }
        }
    }

    async fn destroy(&self, id: &str) -> Result<(), StorageError> {
        match &self.pool {
            DatabasePool::Sqlite(pool) => delete_session_sqlite(pool, &self.table, id).await,
            DatabasePool::Postgres(pool) => delete_session_postgres(pool, &self.table, id).await,
        }
    }

    #[tracing::instrument(skip(self), fields(table = %self.table))]
    async fn gc(&self, max_lifetime: u64) -> Result<u64, StorageError> {
        let cutoff = time_before(Utc::now(), max_lifetime).timestamp();
        let removed = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                delete_stale_sessions_sqlite(pool, &self.table, cutoff).await?
            }
            DatabasePool::Postgres(pool) => {
                delete_stale_sessions_postgres(pool, &self.table, cutoff).await?
            }
        };
        tracing::debug!(removed, "Purged stale session rows");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn sqlite_store() -> DatabaseSessionStore {
        // A single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store =
            DatabaseSessionStore::new(DatabasePool::Sqlite(pool), "sessions".to_string()).unwrap();
        store.init().await.unwrap();
        store
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("sessions").is_ok());
        assert!(validate_table_name("app_sessions_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1sessions").is_err());
        assert!(validate_table_name("sessions; DROP TABLE users").is_err());
        assert!(validate_table_name("sessions--").is_err());
    }

    #[tokio::test]
    async fn test_sqlite_write_and_read() {
        // Given an initialized SQLite store
        let store = sqlite_store().await;

        // When writing a blob
        store.write("sid_1", b"{\"values\":{}}", 1440).await.unwrap();

        // Then it can be read back
        let data = store.read("sid_1").await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"{\"values\":{}}"[..]));
        assert_eq!(store.name(), "sqlite");
    }

    #[tokio::test]
    async fn test_sqlite_upsert_overwrites() {
        let store = sqlite_store().await;
        store.write("sid_1", b"one", 1440).await.unwrap();
        store.write("sid_1", b"two", 1440).await.unwrap();

        assert_eq!(store.read("sid_1").await.unwrap().unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_sqlite_destroy() {
        let store = sqlite_store().await;
        store.write("sid_1", b"payload", 1440).await.unwrap();

        store.destroy("sid_1").await.unwrap();

        assert!(store.read("sid_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_gc_removes_stale_rows() {
        // Given one current row and one row with an old timestamp
        let store = sqlite_store().await;
        store.write("fresh", b"new", 1440).await.unwrap();
        if let DatabasePool::Sqlite(pool) = &store.pool {
            write_session_sqlite(pool, "sessions", "stale", b"old", 0)
                .await
                .unwrap();
        }

        // When collecting garbage
        let removed = store.gc(1440).await.unwrap();

        // Then only the stale row is removed
        assert_eq!(removed, 1);
        assert!(store.read("fresh").await.unwrap().is_some());
        assert!(store.read("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injection_attempt_in_id_is_bound_not_interpolated() {
        let store = sqlite_store().await;
        store.write("sid_1", b"payload", 1440).await.unwrap();

        let result = store.read("sid_1' OR '1'='1").await.unwrap();
        assert!(result.is_none());
        assert!(store.read("sid_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sqlite_gc_with_huge_lifetime() {
        let store = sqlite_store().await;
        store.write("sid_1", b"payload", u64::MAX).await.unwrap();

        assert_eq!(store.gc(u64::MAX).await.unwrap(), 0);
        assert!(store.read("sid_1").await.unwrap().is_some());
    }
}
