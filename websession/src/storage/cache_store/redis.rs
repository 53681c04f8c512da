use async_trait::async_trait;
use redis::{self, AsyncCommands};

use crate::storage::errors::StorageError;
use crate::storage::types::{RedisSessionStore, SessionBackend};
use crate::utils::MAX_LIFETIME_SECS;

const SESSION_PREFIX: &str = "session";

impl RedisSessionStore {
    pub(crate) fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn make_key(id: &str) -> String {
        format!("{SESSION_PREFIX}:{id}")
    }
}

#[async_trait]
impl SessionBackend for RedisSessionStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn init(&self) -> Result<(), StorageError> {
        // Verify the connection works
        let _conn = self.client.get_multiplexed_async_connection().await?;
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let value: Option<Vec<u8>> = conn.get(Self::make_key(id)).await?;
        Ok(value)
    }

    async fn write(&self, id: &str, data: &[u8], ttl: u64) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = Self::make_key(id);
        if ttl > 0 {
            let _: () = conn.set_ex(&key, data, ttl.min(MAX_LIFETIME_SECS)).await?;
        } else {
            let _: () = conn.set(&key, data).await?;
        }
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let _: () = conn.del(Self::make_key(id)).await?;
        Ok(())
    }

    async fn gc(&self, _max_lifetime: u64) -> Result<u64, StorageError> {
        // Keys carry their own TTL; the server evicts them.
        Ok(0)
    }
}
