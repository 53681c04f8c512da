mod handlers;
mod server;

use axum::{
    Router,
    routing::{get, post},
};

use websession_axum::{CsrfConfig, CsrfGuard, SessionConfig, SessionManager, protect};

use crate::handlers::{contact, index, logout, webhook};
use crate::server::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing("demo_forms");

    let manager = SessionManager::from_env(SessionConfig::default()).await?;
    let guard = CsrfGuard::new(CsrfConfig::from_env()?.exclude("^/api/webhook")?);

    let app = Router::new()
        .route("/", get(index))
        .route("/contact", post(contact))
        .route("/logout", post(logout))
        .route("/api/webhook/callback", post(webhook));
    let app = protect(app, manager, guard);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Starting server on http://localhost:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
