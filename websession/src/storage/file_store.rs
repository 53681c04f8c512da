use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use crate::storage::errors::StorageError;
use crate::storage::types::{FileSessionStore, SessionBackend};
use crate::utils::{is_valid_session_id, time_before};

const FILE_PREFIX: &str = "sess_";
const TMP_PREFIX: &str = ".sess_";

impl FileSessionStore {
    pub(crate) fn new(save_path: PathBuf) -> Self {
        Self { save_path }
    }

    fn session_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_session_id(id) {
            return Err(StorageError::Storage("Invalid session id".to_string()));
        }
        Ok(self.save_path.join(format!("{FILE_PREFIX}{id}")))
    }
}

#[async_trait]
impl SessionBackend for FileSessionStore {
    fn name(&self) -> &'static str {
        "files"
    }

    #[tracing::instrument(skip(self), fields(save_path = %self.save_path.display()))]
    async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.save_path).await?;
        let metadata = tokio::fs::metadata(&self.save_path).await?;
        if !metadata.is_dir() {
            return Err(StorageError::Config(format!(
                "Session save path is not a directory: {}",
                self.save_path.display()
            )));
        }
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.session_path(id)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, id: &str, data: &[u8], _ttl: u64) -> Result<(), StorageError> {
        let path = self.session_path(id)?;
        tokio::fs::create_dir_all(&self.save_path).await?;

        // Every writer gets its own temp file beside the target; the rename
        // replaces the blob whole, and the last writer wins.
        let dir = self.save_path.clone();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut tmp = tempfile::Builder::new()
                .prefix(TMP_PREFIX)
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Storage(format!("Session write task failed: {e}")))?
    }

    async fn destroy(&self, id: &str) -> Result<(), StorageError> {
        let path = self.session_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self), fields(save_path = %self.save_path.display()))]
    async fn gc(&self, max_lifetime: u64) -> Result<u64, StorageError> {
        let cutoff = time_before(Utc::now(), max_lifetime);
        let mut removed = 0;

        let mut dir = match tokio::fs::read_dir(&self.save_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_name().to_string_lossy().starts_with(FILE_PREFIX) {
                continue;
            }
            let modified: DateTime<Utc> = entry.metadata().await?.modified()?.into();
            if modified < cutoff {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        tracing::debug!(removed, "Purged stale session files");
        Ok(removed)
    }
}
