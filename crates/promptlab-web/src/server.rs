//! Axum server setup and router construction.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::response::Html;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::api::{self, AppState};
use crate::ws;

/// The bundled single-page UI.
const INDEX_HTML: &str = include_str!("../static/index.html");

/// Build the full axum router.
///
/// The router serves:
/// - The bundled page at `/`
/// - WebSocket at `/ws`
/// - REST API at `/api/*`
/// - Optional static files from `static_dir` for anything else
pub fn build_router(app_state: AppState, static_dir: Option<PathBuf>) -> Router {
    // CORS layer for frontends served from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/", get(|| async { Html(INDEX_HTML) }))
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/patterns", get(api::get_patterns))
        .route("/api/state", get(api::get_state))
        .route("/api/input", post(api::post_input))
        .route("/api/selection/{id}", post(api::post_toggle))
        .route("/api/run", post(api::post_run_selected))
        .route("/api/run/{id}", post(api::post_run_one))
        .with_state(app_state)
        .layer(cors);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
}

/// Bind the listener, spawn the server, and return the bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("web server stopped: {e}");
        }
    });

    Ok(addr)
}
