//! websession - per-client session state and CSRF protection
//!
//! A [`SessionManager`] loads one [`Session`] per request from a pluggable
//! backend (files, SQLite/PostgreSQL, Redis, memory) and writes it back after
//! the response is built. Sessions hold a generic key space plus flash, input
//! and meta scopes, per-key expirations and a bounded list of CSRF tokens that
//! [`CsrfGuard`] validates for state-changing requests.

mod csrf;
mod session;
mod storage;
mod utils;

pub use csrf::{
    CSRF_FORM_FIELD, CSRF_HEADER_NAME, CsrfConfig, CsrfError, CsrfGuard, CsrfRequest,
    ExecutionMode, PROTECTED_METHODS, Rejection, Verdict,
};
pub use session::{
    CookieCommand, CookieConfig, SESSION_COOKIE_NAME, SameSite, Session, SessionConfig,
    SessionError, SessionKey, SessionManager, header_set_cookie,
};
pub use storage::{DatabasePool, HandlerKind, HandlerOptions, SessionBackend, StorageError};
