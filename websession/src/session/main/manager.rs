use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::session::config::SessionConfig;
use crate::session::errors::SessionError;
use crate::session::types::{CookieCommand, SessionData};
use crate::storage::{
    FileSessionStore, HandlerKind, HandlerOptions, SESSION_HANDLER_TYPE, SESSION_HANDLER_URL,
    SESSION_SAVE_PATH, SessionBackend, open_backend,
};
use crate::utils::{gen_random_string, is_valid_session_id, redact};

use super::session::{RANDOM_BYTES, Session};

/// Shared entry point: holds the configuration and the persistence backend,
/// starts a [`Session`] per request and writes it back afterwards.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: SessionConfig,
    backend: RwLock<(HandlerKind, Arc<dyn SessionBackend>)>,
    started: AtomicBool,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Manager backed by the files handler under `SESSION_SAVE_PATH`.
    /// The directory is created on the first write.
    pub fn new(config: SessionConfig) -> Self {
        let backend: Arc<dyn SessionBackend> =
            Arc::new(FileSessionStore::new(SESSION_SAVE_PATH.clone()));
        Self::from_parts(config, HandlerKind::Files, backend)
    }

    fn from_parts(config: SessionConfig, kind: HandlerKind, backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                backend: RwLock::new((kind, backend)),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub async fn with_handler(
        config: SessionConfig,
        kind: HandlerKind,
        options: HandlerOptions,
    ) -> Result<Self, SessionError> {
        let backend = open_backend(kind, options)
            .await
            .map_err(|e| SessionError::HandlerConfig(e.to_string()))?;
        Ok(Self::from_parts(config, kind, backend))
    }

    /// Manager using the handler named by `SESSION_HANDLER_TYPE` and
    /// `SESSION_HANDLER_URL`.
    pub async fn from_env(config: SessionConfig) -> Result<Self, SessionError> {
        let kind: HandlerKind = SESSION_HANDLER_TYPE
            .parse()
            .map_err(|e: crate::storage::StorageError| SessionError::HandlerConfig(e.to_string()))?;
        let options = HandlerOptions::from_url(kind, SESSION_HANDLER_URL.as_deref())
            .map_err(|e| SessionError::HandlerConfig(e.to_string()))?;
        Self::with_handler(config, kind, options).await
    }

    /// Swaps the persistence backend. Refused once any session has been started.
    #[tracing::instrument(skip(self, options))]
    pub async fn set_handler(
        &self,
        kind: HandlerKind,
        options: HandlerOptions,
    ) -> Result<(), SessionError> {
        if self.inner.started.load(Ordering::SeqCst) {
            return Err(SessionError::HandlerConfig(
                "Cannot change the session handler after a session has started".to_string(),
            ));
        }
        let backend = open_backend(kind, options)
            .await
            .map_err(|e| SessionError::HandlerConfig(e.to_string()))?;
        *self.inner.backend.write().await = (kind, backend);
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub async fn handler_kind(&self) -> HandlerKind {
        self.inner.backend.read().await.0
    }

    async fn backend(&self) -> Arc<dyn SessionBackend> {
        self.inner.backend.read().await.1.clone()
    }

    /// Loads the session named by the client's identifier, or begins a new one.
    ///
    /// An identifier that is malformed or unknown to the backend is never
    /// adopted; the client receives a fresh one. Expired keys are swept before
    /// the session is returned.
    pub async fn start(
        &self,
        id: Option<&str>,
        output_started: bool,
    ) -> Result<Session, SessionError> {
        if output_started && !self.inner.config.allow_start_after_output {
            return Err(SessionError::AlreadyStartedOutput);
        }
        self.inner.started.store(true, Ordering::SeqCst);

        let backend = self.backend().await;
        let incoming_id = id.map(str::to_string);

        let loaded = match id.filter(|id| is_valid_session_id(id)) {
            Some(id) => match backend.read(id).await? {
                Some(blob) => match serde_json::from_slice::<SessionData>(&blob) {
                    Ok(data) => Some((id.to_string(), data)),
                    Err(e) => {
                        tracing::warn!("Discarding unreadable session {}: {}", redact(id), e);
                        None
                    }
                },
                None => {
                    tracing::debug!("Unknown session id {}", redact(id));
                    None
                }
            },
            None => None,
        };

        let mut session = match loaded {
            Some((id, data)) => Session::new(
                id,
                incoming_id,
                data,
                true,
                self.inner.config.token_lifetime,
            ),
            None => Session::new(
                gen_random_string(RANDOM_BYTES)?,
                incoming_id,
                SessionData::default(),
                false,
                self.inner.config.token_lifetime,
            ),
        };
        session.sweep_expired();
        Ok(session)
    }

    /// Persists the session and returns what the response must do with the cookie.
    pub async fn save(&self, session: &mut Session) -> Result<CookieCommand, SessionError> {
        let command = session.cookie_command();
        let backend = self.backend().await;

        for id in session.discard_ids.drain(..) {
            if is_valid_session_id(&id) {
                backend.destroy(&id).await?;
                tracing::debug!("Removed session {}", redact(&id));
            }
        }

        if session.needs_write() {
            let blob = serde_json::to_vec(&session.data)?;
            backend
                .write(&session.id, &blob, self.inner.config.gc_max_lifetime)
                .await?;
            session.dirty = false;
            session.persisted = true;
        }

        Ok(command)
    }

    /// Removes one stored session.
    pub async fn destroy_id(&self, id: &str) -> Result<(), SessionError> {
        if !is_valid_session_id(id) {
            return Ok(());
        }
        self.backend().await.destroy(id).await?;
        Ok(())
    }

    /// Purges sessions not written within the GC lifetime.
    pub async fn gc(&self) -> Result<u64, SessionError> {
        let removed = self
            .backend()
            .await
            .gc(self.inner.config.gc_max_lifetime)
            .await?;
        tracing::info!(removed, "Session garbage collection finished");
        Ok(removed)
    }
}
