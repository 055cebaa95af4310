//! WebSocket upgrade handler and message dispatch.
//!
//! Each connected client receives:
//! 1. A full [`StateSnapshot`](crate::snapshot::StateSnapshot) on connect.
//! 2. Incremental [`WsMessage`] updates as the orchestrator works.
//!
//! Clients can drive the page over the same socket: edit input, toggle a
//! pattern, run one pattern, or run the selection.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use promptlab::patterns::PatternId;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::broadcast::WsMessage;

/// GET /ws: WebSocket upgrade handler.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, app: AppState) {
    let (mut sink, mut stream) = socket.split();

    let snapshot_msg = WsMessage::Snapshot {
        data: app.snapshot().to_json(),
    };
    if ws_send(&mut sink, &snapshot_msg).await.is_err() {
        return;
    }

    debug!("WebSocket client connected");

    let mut broadcast_rx = app.broadcast_tx.subscribe();

    // Forward broadcast messages to this client.
    let app_for_resync = app.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            match broadcast_rx.recv().await {
                Ok(msg) => {
                    if ws_send(&mut sink, &msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged by {n} messages, resending snapshot");
                    let msg = WsMessage::Snapshot {
                        data: app_for_resync.snapshot().to_json(),
                    };
                    if ws_send(&mut sink, &msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => handle_client_message(&text, &app),
            Message::Close(_) => break,
            _ => {}
        }
    }

    debug!("WebSocket client disconnected");
    forward_task.abort();
}

#[derive(serde::Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Input {
        prompt: Option<String>,
        context: Option<String>,
    },
    Toggle {
        id: String,
    },
    Run {
        id: String,
    },
    RunSelected,
}

/// Process a JSON message received from a client.
///
/// Runs are spawned; their progress reaches every client through the
/// broadcast channel, not as a direct reply.
fn handle_client_message(text: &str, app: &AppState) {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        debug!("Ignoring malformed WebSocket message");
        return;
    };

    match msg {
        ClientMessage::Input { prompt, context } => {
            if let Some(prompt) = prompt {
                app.orchestrator.set_prompt(prompt);
            }
            if let Some(context) = context {
                app.orchestrator.set_context(context);
            }
            let _ = app.broadcast_tx.send(WsMessage::Snapshot {
                data: app.snapshot().to_json(),
            });
        }
        ClientMessage::Toggle { id } => match PatternId::parse(&id) {
            Ok(id) => {
                app.orchestrator.toggle_selection(id);
            }
            Err(e) => debug!("Ignoring toggle: {e}"),
        },
        ClientMessage::Run { id } => match PatternId::parse(&id) {
            Ok(id) => {
                let orchestrator = app.orchestrator.clone();
                tokio::spawn(async move {
                    orchestrator.run_pattern(id).await;
                });
            }
            Err(e) => debug!("Ignoring run: {e}"),
        },
        ClientMessage::RunSelected => {
            let orchestrator = app.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator.run_selected().await;
            });
        }
    }
}

/// Serialize a `WsMessage` and send it over the WebSocket sink.
async fn ws_send(sink: &mut SplitSink<WebSocket, Message>, msg: &WsMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).unwrap_or_default();
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use promptlab::generator::FnGenerator;
    use promptlab::orchestrator::Orchestrator;

    use crate::broadcast::WebBroadcastHandler;

    fn test_app() -> (AppState, broadcast::Receiver<WsMessage>) {
        let (tx, rx) = broadcast::channel(64);
        let generator = FnGenerator::new(|_, prompt| async move { Ok(format!("echo: {prompt}")) });
        let orchestrator = Arc::new(
            Orchestrator::new(Arc::new(generator))
                .with_event_handler(WebBroadcastHandler::new(tx.clone())),
        );
        let app = AppState {
            orchestrator,
            broadcast_tx: tx,
        };
        (app, rx)
    }

    /// Wait for the next message matching `pred`, skipping others.
    async fn next_matching(
        rx: &mut broadcast::Receiver<WsMessage>,
        pred: impl Fn(&WsMessage) -> bool,
    ) -> WsMessage {
        loop {
            let msg = rx.recv().await.unwrap();
            if pred(&msg) {
                return msg;
            }
        }
    }

    #[tokio::test]
    async fn input_and_toggle_update_state() {
        let (app, mut rx) = test_app();

        handle_client_message(
            r#"{"type":"input","prompt":"Write a tagline","context":"Acme"}"#,
            &app,
        );
        let state = app.orchestrator.snapshot();
        assert_eq!(state.prompt, "Write a tagline");
        assert_eq!(state.context, "Acme");
        assert!(matches!(rx.try_recv().unwrap(), WsMessage::Snapshot { .. }));

        handle_client_message(r#"{"type":"toggle","id":"persona"}"#, &app);
        assert!(app.orchestrator.snapshot().is_selected(PatternId::Persona));
        assert!(matches!(rx.try_recv().unwrap(), WsMessage::Selection { .. }));

        // Unknown ids and malformed text are ignored.
        let before = app.orchestrator.snapshot().selection;
        handle_client_message(r#"{"type":"toggle","id":"socratic"}"#, &app);
        handle_client_message("not json", &app);
        assert_eq!(app.orchestrator.snapshot().selection, before);
    }

    #[tokio::test]
    async fn run_commands_are_dispatched() {
        let (app, mut rx) = test_app();
        app.orchestrator.set_prompt("Write a tagline");

        handle_client_message(r#"{"type":"run","id":"basic"}"#, &app);
        let msg = next_matching(&mut rx, |m| matches!(m, WsMessage::RunFinished { .. })).await;
        let WsMessage::RunFinished { id, result } = msg else {
            unreachable!()
        };
        assert_eq!(id, PatternId::Basic);
        assert_eq!(result.output, "echo: Write a tagline");

        handle_client_message(r#"{"type":"run_selected"}"#, &app);
        let msg = next_matching(&mut rx, |m| matches!(m, WsMessage::BatchFinished { .. })).await;
        assert!(matches!(
            msg,
            WsMessage::BatchFinished {
                completed: 2,
                skipped: 0
            }
        ));
        assert_eq!(app.orchestrator.snapshot().results.len(), 2);

        handle_client_message(r#"{"type":"run","id":"socratic"}"#, &app);
        assert!(app.orchestrator.snapshot().in_flight.is_empty());
    }

    #[test]
    fn client_messages_deserialize() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"toggle","id":"cot"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Toggle { id: "cot".into() });

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"run_selected"}"#).unwrap();
        assert_eq!(msg, ClientMessage::RunSelected);

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"input","prompt":"Write a tagline"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Input {
                prompt: Some("Write a tagline".into()),
                context: None
            }
        );
    }
}
