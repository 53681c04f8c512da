//! websession-axum - Axum integration for websession
//!
//! [`manage_session`] loads a session per request and writes it back with the
//! matching `Set-Cookie` header. [`csrf_protect`] checks CSRF tokens on
//! state-changing requests inside that layer. [`protect`] installs both.

mod config;
mod csrf;
mod error;
mod session;

use axum::{Router, middleware};
use std::sync::Arc;

pub use config::WEBSESSION_RESPOND_WITH_X_CSRF_TOKEN;
pub use csrf::{CsrfToken, csrf_protect};
pub use error::IntoResponseError;
pub use session::{SessionHandle, manage_session};

pub use websession::{
    CSRF_FORM_FIELD, CSRF_HEADER_NAME, CookieConfig, CsrfConfig, CsrfError, CsrfGuard,
    ExecutionMode, HandlerKind, HandlerOptions, SameSite, Session, SessionConfig, SessionError,
    SessionKey, SessionManager,
};

/// Adds the session layer to `router`.
pub fn with_sessions<S>(router: Router<S>, manager: SessionManager) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(manager, manage_session))
}

/// Adds the session layer and, inside it, the CSRF layer to `router`.
///
/// ```no_run
/// use axum::{Router, routing::post};
/// use websession_axum::{CsrfConfig, CsrfGuard, SessionConfig, SessionManager, protect};
///
/// # async fn build() -> Result<Router, Box<dyn std::error::Error>> {
/// let manager = SessionManager::from_env(SessionConfig::default()).await?;
/// let guard = CsrfGuard::new(CsrfConfig::from_env()?);
/// let app: Router = protect(Router::new().route("/submit", post(|| async { "ok" })), manager, guard);
/// # Ok(app)
/// # }
/// ```
pub fn protect<S>(router: Router<S>, manager: SessionManager, guard: CsrfGuard) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let router = router.layer(middleware::from_fn_with_state(Arc::new(guard), csrf_protect));
    with_sessions(router, manager)
}
