mod cache_store;
mod config;
mod data_store;
mod errors;
mod file_store;
mod types;

use std::str::FromStr;
use std::sync::Arc;

pub use errors::StorageError;
pub use types::{DatabasePool, HandlerKind, HandlerOptions, SessionBackend};

pub(crate) use config::{SESSION_HANDLER_TYPE, SESSION_HANDLER_URL, SESSION_SAVE_PATH};
pub(crate) use types::FileSessionStore;

use config::DB_TABLE_SESSIONS;
use types::{DatabaseSessionStore, InMemorySessionStore, RedisSessionStore};

/// Build and open the backend for `kind`.
///
/// Missing required options and failed connectivity checks are reported here,
/// never on first use.
pub(crate) async fn open_backend(
    kind: HandlerKind,
    options: HandlerOptions,
) -> Result<Arc<dyn SessionBackend>, StorageError> {
    let backend: Arc<dyn SessionBackend> = match kind {
        HandlerKind::Files => {
            let save_path = options
                .save_path
                .unwrap_or_else(|| SESSION_SAVE_PATH.clone());
            Arc::new(FileSessionStore::new(save_path))
        }
        HandlerKind::Database => {
            let pool = options.database.ok_or_else(|| {
                StorageError::Config("The database handler requires a connection pool".to_string())
            })?;
            let table = options
                .table
                .unwrap_or_else(|| DB_TABLE_SESSIONS.clone());
            Arc::new(DatabaseSessionStore::new(pool, table)?)
        }
        HandlerKind::Redis => {
            let client = options.redis.ok_or_else(|| {
                StorageError::Config("The redis handler requires a redis client".to_string())
            })?;
            Arc::new(RedisSessionStore::new(client))
        }
        HandlerKind::Memory => Arc::new(InMemorySessionStore::new()),
    };

    backend.init().await.map_err(|e| {
        tracing::error!("Failed to open {} session backend: {}", backend.name(), e);
        e
    })?;

    tracing::info!("Opened session backend: {}", backend.name());
    Ok(backend)
}

impl HandlerOptions {
    /// Options for `kind` derived from a single URL, as found in
    /// `SESSION_HANDLER_URL`. Pools are created lazily; `open_backend` performs
    /// the first round-trip.
    pub fn from_url(kind: HandlerKind, url: Option<&str>) -> Result<Self, StorageError> {
        let mut options = Self::default();
        match (kind, url) {
            (HandlerKind::Files, Some(path)) => options.save_path = Some(path.into()),
            (HandlerKind::Files | HandlerKind::Memory, _) => {}
            (HandlerKind::Database, Some(url)) if url.starts_with("sqlite:") => {
                let opts = sqlx::sqlite::SqliteConnectOptions::from_str(url)?
                    .create_if_missing(true);
                options.database = Some(DatabasePool::Sqlite(
                    sqlx::sqlite::SqlitePool::connect_lazy_with(opts),
                ));
            }
            (HandlerKind::Database, Some(url))
                if url.starts_with("postgres:") || url.starts_with("postgresql:") =>
            {
                options.database = Some(DatabasePool::Postgres(sqlx::PgPool::connect_lazy(url)?));
            }
            (HandlerKind::Database, Some(url)) => {
                return Err(StorageError::Config(format!(
                    "Unsupported database url: {url}. Supported schemes are 'sqlite:' and 'postgres:'"
                )));
            }
            (HandlerKind::Redis, Some(url)) => options.redis = Some(redis::Client::open(url)?),
            (HandlerKind::Database | HandlerKind::Redis, None) => {}
        }
        Ok(options)
    }
}
