use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, StatusCode, header::CONTENT_TYPE, header::HeaderValue, request::Parts};
use std::collections::HashMap;
use std::sync::Arc;

use websession::{CSRF_HEADER_NAME, CsrfGuard, CsrfRequest, Verdict};

use super::config::{CSRF_BODY_LIMIT, WEBSESSION_RESPOND_WITH_X_CSRF_TOKEN};
use super::error::IntoResponseError;
use super::session::SessionHandle;

/// A CSRF token for the current session, available as an Axum extractor.
///
/// After a successful check this is the replacement token; otherwise a new
/// token is issued from the session.
#[derive(Clone, Debug)]
pub struct CsrfToken(pub String);

impl CsrfToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = parts.extensions.get::<CsrfToken>() {
            return Ok(token.clone());
        }
        let handle = SessionHandle::from_request_parts(parts, state)
            .await
            .map_err(|(status, msg)| (status, msg.to_string()))?;
        let token = handle.lock().await.token().into_response_error()?;
        Ok(CsrfToken(token))
    }
}

/// A request whose body has been read and parsed for the guard.
struct BufferedRequest<'a> {
    parts: &'a Parts,
    fields: HashMap<String, String>,
}

impl CsrfRequest for BufferedRequest<'_> {
    fn method(&self) -> &str {
        self.parts.method.as_str()
    }

    fn path(&self) -> &str {
        self.parts.uri.path()
    }

    fn body_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Top-level string fields of a form-urlencoded or JSON body.
fn parse_fields(headers: &HeaderMap, body: &[u8]) -> HashMap<String, String> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        url::form_urlencoded::parse(body).into_owned().collect()
    } else if content_type.starts_with("application/json") {
        match serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(body) {
            Ok(map) => map
                .into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                .collect(),
            Err(e) => {
                tracing::debug!("Request body is not a JSON object: {}", e);
                HashMap::new()
            }
        }
    } else {
        HashMap::new()
    }
}

fn add_csrf_header(mut response: Response, csrf_token: &str) -> Response {
    if !*WEBSESSION_RESPOND_WITH_X_CSRF_TOKEN {
        return response;
    }

    if let Ok(header_value) = HeaderValue::from_str(csrf_token) {
        response.headers_mut().insert(CSRF_HEADER_NAME, header_value);
    } else {
        tracing::error!("Failed to create CSRF header value from token");
    }
    response
}

/// Middleware enforcing CSRF tokens on state-changing requests.
///
/// Must run inside [`manage_session`](super::manage_session). The body is
/// buffered only when the request needs checking, then handed on unchanged.
pub async fn csrf_protect(
    State(guard): State<Arc<CsrfGuard>>,
    session: SessionHandle,
    req: Request,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();

    let probe = BufferedRequest {
        parts: &parts,
        fields: HashMap::new(),
    };
    if !guard.applies_to(&probe) {
        return next.run(Request::from_parts(parts, body)).await;
    }

    let bytes = match axum::body::to_bytes(body, *CSRF_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to buffer request body: {}", e);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let verdict = {
        let request = BufferedRequest {
            parts: &parts,
            fields: parse_fields(&parts.headers, &bytes),
        };
        let mut session = session.lock().await;
        guard.check(&mut session, &request)
    };

    match verdict.into_response_error() {
        Ok(Verdict::Bypassed) => next.run(Request::from_parts(parts, Body::from(bytes))).await,
        Ok(Verdict::Validated { token }) => {
            let mut req = Request::from_parts(parts, Body::from(bytes));
            req.extensions_mut().insert(CsrfToken(token.clone()));
            let response = next.run(req).await;
            add_csrf_header(response, &token)
        }
        Ok(Verdict::Rejected(rejection)) => (rejection.status, rejection.body).into_response(),
        Err(err) => {
            tracing::error!("CSRF check failed: {}", err.1);
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect;
    use axum::{Router, routing::get, routing::post};
    use http::header::{COOKIE, SET_COOKIE};
    use tower::ServiceExt;
    use websession::{
        CookieConfig, CsrfConfig, ExecutionMode, HandlerKind, HandlerOptions, SessionConfig,
        SessionManager,
    };

    async fn test_manager() -> SessionManager {
        let config = SessionConfig {
            cookie: CookieConfig {
                name: "SessionId".to_string(),
                secure: false,
                ..Default::default()
            },
            ..Default::default()
        };
        SessionManager::with_handler(config, HandlerKind::Memory, HandlerOptions::default())
            .await
            .unwrap()
    }

    async fn form(token: CsrfToken) -> String {
        token.0
    }

    async fn submit(token: CsrfToken) -> String {
        format!("accepted {}", token.as_str())
    }

    async fn webhook() -> &'static str {
        "hook"
    }

    async fn app(mode: ExecutionMode) -> Router {
        let guard = CsrfGuard::new(CsrfConfig::new(mode).exclude("^/api/webhook").unwrap());
        let router = Router::new()
            .route("/form", get(form))
            .route("/submit", post(submit))
            .route("/api/webhook/callback", post(webhook));
        protect(router, test_manager().await, guard)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Loads the form page and returns the session cookie and token.
    async fn fetch_form(app: &Router) -> (String, String) {
        let response = app
            .clone()
            .oneshot(http::Request::get("/form").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        (cookie, body_string(response).await)
    }

    fn form_post(cookie: &str, body: String) -> Request {
        http::Request::post("/submit")
            .header(COOKIE, cookie)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_form_token_accepted_once() {
        // Given a client that loaded the form
        let app = app(ExecutionMode::Production).await;
        let (cookie, token) = fetch_form(&app).await;

        // When it posts the token back
        let response = app
            .clone()
            .oneshot(form_post(&cookie, format!("name=alice&_token={token}")))
            .await
            .unwrap();

        // Then the handler runs with a replacement token
        assert_eq!(response.status(), StatusCode::OK);
        let fresh = body_string(response).await;
        assert!(fresh.starts_with("accepted "));
        assert_ne!(fresh.trim_start_matches("accepted "), token);

        // And replaying the consumed token is forbidden
        let response = app
            .oneshot(form_post(&cookie, format!("_token={token}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_token_in_development_is_500() {
        let app = app(ExecutionMode::Development).await;
        let (cookie, _) = fetch_form(&app).await;

        let response = app
            .oneshot(form_post(&cookie, "_token=invalid_token".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "CSRF token is invalid or expired");
    }

    #[tokio::test]
    async fn test_header_token_with_empty_body() {
        let app = app(ExecutionMode::Production).await;
        let (cookie, token) = fetch_form(&app).await;

        let response = app
            .oneshot(
                http::Request::post("/submit")
                    .header(COOKIE, &cookie)
                    .header("x-csrf-token", &token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_json_body_token() {
        let app = app(ExecutionMode::Production).await;
        let (cookie, token) = fetch_form(&app).await;

        let response = app
            .oneshot(
                http::Request::post("/submit")
                    .header(COOKIE, &cookie)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(r#"{{"_token":"{token}","n":1}}"#)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_forbidden_in_production() {
        let app = app(ExecutionMode::Production).await;

        let response = app
            .oneshot(form_post("SessionId=none", "name=alice".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_excluded_path_needs_no_token() {
        let app = app(ExecutionMode::Development).await;

        let response = app
            .oneshot(
                http::Request::post("/api/webhook/callback")
                    .body(Body::from("payload"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hook");
    }

    #[tokio::test]
    async fn test_csrf_layer_without_session_layer() {
        let guard = Arc::new(CsrfGuard::default());
        let app: Router = Router::new()
            .route("/submit", post(submit))
            .layer(axum::middleware::from_fn_with_state(guard, csrf_protect));

        let response = app
            .oneshot(http::Request::post("/submit").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_parse_fields() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
        );
        let fields = parse_fields(&headers, b"_token=a%2Bb&name=alice");
        assert_eq!(fields.get("_token").map(String::as_str), Some("a+b"));
        assert_eq!(fields.get("name").map(String::as_str), Some("alice"));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let fields = parse_fields(&headers, br#"{"_token":"t","count":3}"#);
        assert_eq!(fields.get("_token").map(String::as_str), Some("t"));
        assert!(!fields.contains_key("count"));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(parse_fields(&headers, b"_token=t").is_empty());
    }
}
