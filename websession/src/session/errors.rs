use thiserror::Error;

use crate::storage::StorageError;
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// The response has already begun; a session cookie can no longer be sent.
    #[error("Cannot start session: output has already started")]
    AlreadyStartedOutput,

    #[error("Session is not started")]
    NotStarted,

    #[error("Session handler configuration error: {0}")]
    HandlerConfig(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),

    #[error("Cookie error: {0}")]
    Cookie(String),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Config(msg) => Self::HandlerConfig(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<UtilError> for SessionError {
    fn from(err: UtilError) -> Self {
        match err {
            UtilError::Crypto(msg) => Self::Crypto(msg),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}
