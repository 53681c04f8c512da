use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{self, HeaderMapExt};
use http::{StatusCode, request::Parts};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use websession::{Session, SessionManager, header_set_cookie};

use super::error::IntoResponseError;

/// Request-scoped access to the current session, available as an Axum extractor
/// once [`manage_session`] runs in front of the handler.
///
/// ```no_run
/// use websession_axum::SessionHandle;
///
/// async fn visit(session: SessionHandle) -> String {
///     let mut session = session.lock().await;
///     let visits = session.increment("visits", 1).unwrap_or_default();
///     format!("Visit number {visits}")
/// }
/// ```
#[derive(Clone, Debug)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionHandle>().cloned().ok_or_else(|| {
            tracing::error!("SessionHandle requested but the session middleware is not installed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable")
        })
    }
}

/// Middleware that loads the session before the handler and saves it afterwards,
/// adding the `Set-Cookie` header the session calls for.
pub async fn manage_session(
    State(manager): State<SessionManager>,
    mut req: Request,
    next: Next,
) -> Response {
    let cookies = req.headers().typed_get::<headers::Cookie>();
    let incoming_id = cookies
        .as_ref()
        .and_then(|c| c.get(manager.config().cookie.name.as_str()));

    let session = match manager.start(incoming_id, false).await.into_response_error() {
        Ok(session) => session,
        Err(err) => {
            tracing::error!("Failed to start session: {}", err.1);
            return err.into_response();
        }
    };

    let handle = SessionHandle(Arc::new(Mutex::new(session)));
    req.extensions_mut().insert(handle.clone());

    let mut response = next.run(req).await;

    let mut session = handle.lock().await;
    let saved = manager
        .save(&mut session)
        .await
        .and_then(|command| {
            header_set_cookie(response.headers_mut(), &manager.config().cookie, &command)
        })
        .into_response_error();

    match saved {
        Ok(()) => response,
        Err(err) => {
            tracing::error!("Failed to save session: {}", err.1);
            err.into_response()
        }
    }
}
