use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;

/// Persistence contract for raw session blobs.
///
/// A backend only ever sees opaque identifiers and opaque bytes; the session
/// layer owns the encoding of what is inside.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Open the backend. Called once when the handler is configured.
    async fn init(&self) -> Result<(), StorageError>;

    /// Read the blob stored for `id`, if any.
    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store the blob for `id`. `ttl` is the number of seconds the blob must
    /// survive without being written again.
    async fn write(&self, id: &str, data: &[u8], ttl: u64) -> Result<(), StorageError>;

    /// Remove the blob for `id`. Removing an absent blob is not an error.
    async fn destroy(&self, id: &str) -> Result<(), StorageError>;

    /// Remove blobs untouched for more than `max_lifetime` seconds.
    /// Returns the number of removed blobs.
    async fn gc(&self, max_lifetime: u64) -> Result<u64, StorageError>;
}

/// The persistence backends a `SessionManager` can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerKind {
    /// One file per session under a save path.
    #[default]
    Files,
    /// Relational table `{id, data, timestamp}` in SQLite or PostgreSQL.
    Database,
    /// Redis, keys expire through the server-side TTL.
    Redis,
    /// Process-local map, mostly for tests and single-process demos.
    Memory,
}

impl FromStr for HandlerKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "files" | "file" => Ok(Self::Files),
            "database" | "db" => Ok(Self::Database),
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            t => Err(StorageError::Config(format!(
                "Unsupported session handler type: {t}. Supported types are 'files', 'database', 'redis' and 'memory'"
            ))),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Files => "files",
            Self::Database => "database",
            Self::Redis => "redis",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Connection pool for the database handler.
#[derive(Clone, Debug)]
pub enum DatabasePool {
    Sqlite(sqlx::SqlitePool),
    Postgres(sqlx::PgPool),
}

/// Options accompanying a `HandlerKind`. Which fields are required depends on
/// the kind; see `SessionManager::set_handler`.
#[derive(Clone, Debug, Default)]
pub struct HandlerOptions {
    /// Directory for the files handler.
    pub save_path: Option<PathBuf>,
    /// Pool for the database handler.
    pub database: Option<DatabasePool>,
    /// Table name override for the database handler.
    pub table: Option<String>,
    /// Client for the redis handler.
    pub redis: Option<redis::Client>,
}

pub(crate) struct FileSessionStore {
    pub(super) save_path: PathBuf,
}

pub(crate) struct DatabaseSessionStore {
    pub(super) pool: DatabasePool,
    pub(super) table: String,
}

pub(crate) struct RedisSessionStore {
    pub(super) client: redis::Client,
}

pub(crate) struct InMemorySessionStore {
    pub(super) entries: Mutex<HashMap<String, MemoryEntry>>,
}

pub(super) struct MemoryEntry {
    pub(super) data: Vec<u8>,
    pub(super) written_at: DateTime<Utc>,
    pub(super) expires_at: Option<DateTime<Utc>>,
}
