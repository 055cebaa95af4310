//! Browser-based pattern comparison UI for `promptlab`.
//!
//! `promptlab-web` exposes an [`Orchestrator`] over HTTP: a bundled page at
//! `/`, a REST API for input, selection, and runs, and a WebSocket that
//! streams run progress to every open tab.
//!
//! # Quick start
//!
//! ```ignore
//! use promptlab::prelude::*;
//! use promptlab_web::{WebBroadcastHandler, WebConfig, WsMessage, spawn_web};
//! use std::sync::Arc;
//!
//! let (ws_tx, _) = tokio::sync::broadcast::channel::<WsMessage>(256);
//! let orchestrator = Arc::new(
//!     Orchestrator::new(Arc::new(client))
//!         .with_event_handler(WebBroadcastHandler::new(ws_tx.clone())),
//! );
//!
//! let addr = spawn_web(orchestrator, ws_tx, WebConfig::default()).await?;
//! println!("Web UI: http://{addr}");
//! ```
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──RunEvent──▶ WebBroadcastHandler ──WsMessage──▶ WebSocket clients
//!      ▲                                                              │
//!      └──── /api/input, /api/selection/{id}, /api/run ◀──────────────┘
//! ```
//!
//! # REST API
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | GET | `/api/patterns` | | registry in display order |
//! | GET | `/api/state` | | [`StateSnapshot`] |
//! | POST | `/api/input` | `{"prompt"?, "context"?}` | 204 |
//! | POST | `/api/selection/{id}` | | `{"id", "selected"}`, 404 if unknown |
//! | POST | `/api/run/{id}` | | run outcome, 404 if unknown |
//! | POST | `/api/run` | | `[{"id", "outcome"}]` in selection order |

mod api;
pub mod broadcast;
mod server;
pub mod snapshot;
mod ws;

pub use broadcast::{WebBroadcastHandler, WsMessage};
pub use snapshot::{PatternPanel, StateSnapshot};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use promptlab::orchestrator::Orchestrator;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
    /// Directory of extra static files served for unmatched paths.
    pub static_dir: Option<PathBuf>,
    /// WebSocket broadcast channel capacity. Default: 256.
    ///
    /// Clients that fall behind by this many messages receive a fresh
    /// state snapshot to resynchronize.
    pub broadcast_capacity: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            static_dir: None,
            broadcast_capacity: 256,
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// # Arguments
///
/// * `orchestrator`: Session state and run logic shared by all handlers.
/// * `broadcast_tx`: Sender half of the WebSocket broadcast channel. Pass the
///   same sender to the [`WebBroadcastHandler`] installed on the orchestrator.
/// * `config`: Server configuration.
pub async fn spawn_web(
    orchestrator: Arc<Orchestrator>,
    broadcast_tx: tokio::sync::broadcast::Sender<WsMessage>,
    config: WebConfig,
) -> std::io::Result<SocketAddr> {
    let app_state = api::AppState {
        orchestrator,
        broadcast_tx,
    };
    let router = server::build_router(app_state, config.static_dir);
    server::start_server(router, config.bind_addr).await
}
