use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::storage::types::{InMemorySessionStore, MemoryEntry, SessionBackend};
use crate::utils::{time_after, time_before};

impl InMemorySessionStore {
    pub(crate) fn new() -> Self {
        tracing::info!("Creating new in-memory session store");
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionBackend for InMemorySessionStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> Result<(), StorageError> {
        Ok(()) // Nothing to initialize for in-memory store
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(id) {
            None => return Ok(None),
            Some(entry) => entry.expires_at.is_some_and(|at| at <= Utc::now()),
        };

        if expired {
            tracing::debug!("Dropping expired in-memory session");
            entries.remove(id);
            return Ok(None);
        }

        Ok(entries.get(id).map(|entry| entry.data.clone()))
    }

    async fn write(&self, id: &str, data: &[u8], ttl: u64) -> Result<(), StorageError> {
        let now = Utc::now();
        let expires_at = (ttl > 0).then(|| time_after(now, ttl));

        self.entries.lock().await.insert(
            id.to_string(),
            MemoryEntry {
                data: data.to_vec(),
                written_at: now,
                expires_at,
            },
        );
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), StorageError> {
        self.entries.lock().await.remove(id);
        Ok(())
    }

    async fn gc(&self, max_lifetime: u64) -> Result<u64, StorageError> {
        let now = Utc::now();
        let cutoff = time_before(now, max_lifetime);

        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            entry.written_at > cutoff && entry.expires_at.is_none_or(|at| at > now)
        });

        Ok((before - entries.len()) as u64)
    }
}
