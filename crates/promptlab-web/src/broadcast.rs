//! [`EventHandler`] that converts orchestrator events into WebSocket messages.
//!
//! [`WebBroadcastHandler`] turns each [`RunEvent`] into a [`WsMessage`] and
//! broadcasts it to all connected WebSocket clients via a
//! `tokio::sync::broadcast` channel.

use promptlab::events::{EventHandler, RunEvent};
use promptlab::orchestrator::RunResult;
use promptlab::patterns::PatternId;
use serde::Serialize;
use tokio::sync::broadcast;

/// A message sent from the server to WebSocket clients.
///
/// Discriminated on the `type` field when serialized to JSON.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Full state snapshot (sent on connect, after input edits, and on resync).
    Snapshot { data: serde_json::Value },
    /// The selection changed.
    Selection { selection: Vec<PatternId> },
    /// A pattern's request was sent.
    RunStarted { id: PatternId },
    /// A pattern's result was stored.
    RunFinished { id: PatternId, result: RunResult },
    /// A batch over the selection started.
    BatchStarted { selection: Vec<PatternId> },
    /// The batch finished.
    BatchFinished { completed: usize, skipped: usize },
}

/// Event handler that broadcasts orchestrator events to WebSocket clients.
///
/// Pass it to [`Orchestrator::with_event_handler`](promptlab::orchestrator::Orchestrator::with_event_handler),
/// alongside a [`LoggingHandler`](promptlab::events::LoggingHandler) in a
/// [`CompositeEventHandler`](promptlab::events::CompositeEventHandler):
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(WebBroadcastHandler::new(ws_tx.clone()));
/// ```
pub struct WebBroadcastHandler {
    sender: broadcast::Sender<WsMessage>,
}

impl WebBroadcastHandler {
    pub fn new(sender: broadcast::Sender<WsMessage>) -> Self {
        Self { sender }
    }

    /// Silently ignores send errors (no subscribers is fine).
    fn broadcast(&self, msg: WsMessage) {
        let _ = self.sender.send(msg);
    }
}

impl EventHandler for WebBroadcastHandler {
    fn on_event(&self, event: &RunEvent<'_>) {
        let msg = match event {
            RunEvent::SelectionChanged { selection } => WsMessage::Selection {
                selection: selection.to_vec(),
            },
            RunEvent::RunStarted { id, .. } => WsMessage::RunStarted { id: *id },
            RunEvent::RunFinished { id, result } => WsMessage::RunFinished {
                id: *id,
                result: (*result).clone(),
            },
            RunEvent::BatchStarted { selection } => WsMessage::BatchStarted {
                selection: selection.to_vec(),
            },
            RunEvent::BatchFinished { completed, skipped } => WsMessage::BatchFinished {
                completed: *completed,
                skipped: *skipped,
            },
        };
        self.broadcast(msg);
    }
}
