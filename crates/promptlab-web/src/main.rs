//! Prompt pattern playground in the browser.
//!
//! Serves the comparison page and API, and runs the selected patterns
//! against the Anthropic Messages API.
//!
//! # Usage
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-... cargo run -p promptlab-web
//! ANTHROPIC_API_KEY=sk-... cargo run -p promptlab-web -- --port 8080
//! ANTHROPIC_API_KEY=sk-... cargo run -p promptlab-web -- --model claude-3-5-haiku-latest
//! ```
//!
//! Then open the printed URL in a browser.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use promptlab::prelude::*;
use promptlab_web::{WebBroadcastHandler, WebConfig, WsMessage, spawn_web};
use tracing_subscriber::EnvFilter;

/// Prompt pattern playground with a browser UI.
#[derive(Parser)]
#[command(about = "Compare prompt engineering patterns side by side in the browser")]
struct Args {
    /// Model to use for every pattern.
    #[arg(long, default_value = promptlab::DEFAULT_MODEL)]
    model: String,

    /// Maximum tokens per response.
    #[arg(long, default_value_t = promptlab::DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Per-request timeout in seconds (default: none).
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Port for the web UI server.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Extra static files served for unmatched paths.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 1. Model client.
    let api_key = api_key_from_env().map_err(|e| e.to_string())?;
    let client_config = ClientConfig::default()
        .with_model(&args.model)
        .with_max_tokens(args.max_tokens)
        .with_timeout(args.timeout_secs.map(Duration::from_secs));
    let client = AnthropicClient::new(api_key, client_config).map_err(|e| e.to_string())?;

    // 2. Broadcast channel and orchestrator wired to it.
    let web_config = WebConfig {
        bind_addr: ([127, 0, 0, 1], args.port).into(),
        static_dir: args.static_dir,
        ..Default::default()
    };
    let (ws_tx, _) = tokio::sync::broadcast::channel::<WsMessage>(web_config.broadcast_capacity);
    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(WebBroadcastHandler::new(ws_tx.clone()));
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(client)).with_event_handler(handler));

    // 3. Serve until interrupted.
    let addr = spawn_web(orchestrator, ws_tx, web_config)
        .await
        .map_err(|e| format!("failed to start web server: {e}"))?;
    println!("Web UI: http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown: {e}"))?;
    Ok(())
}
