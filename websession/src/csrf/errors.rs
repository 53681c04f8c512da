use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error, Clone)]
pub enum CsrfError {
    #[error("CSRF token is missing from the request")]
    TokenMissing,

    #[error("CSRF token is invalid or expired")]
    TokenInvalid,

    #[error("CSRF configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}
