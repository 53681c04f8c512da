use sqlx::{Pool, Sqlite};

use crate::storage::errors::StorageError;

// SQLite implementations
pub(super) async fn create_table_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY NOT NULL,
            data BLOB NOT NULL,
            timestamp INTEGER NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn read_session_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    id: &str,
) -> Result<Option<Vec<u8>>, StorageError> {
    let data = sqlx::query_scalar::<_, Vec<u8>>(&format!(
        r#"
        SELECT data FROM {table_name} WHERE id = ?
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(data)
}

pub(super) async fn write_session_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    id: &str,
    data: &[u8],
    timestamp: i64,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, data, timestamp)
        VALUES (?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            data = excluded.data,
            timestamp = excluded.timestamp
        "#
    ))
    .bind(id)
    .bind(data)
    .bind(timestamp)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn delete_session_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    id: &str,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE id = ?
        "#
    ))
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn delete_stale_sessions_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    cutoff: i64,
) -> Result<u64, StorageError> {
    let result = sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE timestamp < ?
        "#
    ))
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
