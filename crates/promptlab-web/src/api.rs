//! REST API endpoint handlers.
//!
//! Runs are awaited inside the request, so `POST /api/run` answers with the
//! finished outcomes. Progress for other tabs goes out over `/ws`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use promptlab::orchestrator::{Orchestrator, RunOutcome};
use promptlab::patterns::{PatternDescriptor, PatternId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::error;

use crate::broadcast::WsMessage;
use crate::snapshot::StateSnapshot;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub broadcast_tx: broadcast::Sender<WsMessage>,
}

impl AppState {
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::from_state(self.orchestrator.registry(), &self.orchestrator.snapshot())
    }
}

type ApiError = (StatusCode, String);

fn parse_id(app: &AppState, id: &str) -> Result<PatternId, ApiError> {
    app.orchestrator
        .registry()
        .lookup(id)
        .map(|d| d.id)
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))
}

/// GET /api/patterns: The registry in display order.
pub async fn get_patterns(State(app): State<AppState>) -> Json<Vec<&'static PatternDescriptor>> {
    Json(app.orchestrator.registry().iter().collect())
}

/// GET /api/state: Full state snapshot.
pub async fn get_state(State(app): State<AppState>) -> Json<StateSnapshot> {
    Json(app.snapshot())
}

/// Request body for POST /api/input. Omitted fields are left unchanged.
#[derive(Deserialize)]
pub struct InputRequest {
    pub prompt: Option<String>,
    pub context: Option<String>,
}

/// POST /api/input: Update the prompt and/or context.
///
/// Broadcasts a fresh snapshot so other tabs pick up the edit.
pub async fn post_input(State(app): State<AppState>, Json(body): Json<InputRequest>) -> StatusCode {
    if let Some(prompt) = body.prompt {
        app.orchestrator.set_prompt(prompt);
    }
    if let Some(context) = body.context {
        app.orchestrator.set_context(context);
    }
    let _ = app.broadcast_tx.send(WsMessage::Snapshot {
        data: app.snapshot().to_json(),
    });
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub id: PatternId,
    pub selected: bool,
}

/// POST /api/selection/{id}: Toggle a pattern in or out of the selection.
///
/// Returns 404 for unknown ids.
pub async fn post_toggle(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let id = parse_id(&app, &id)?;
    let selected = app.orchestrator.toggle_selection(id);
    Ok(Json(ToggleResponse { id, selected }))
}

/// POST /api/run/{id}: Run one pattern and return its outcome.
///
/// The run is spawned so that a client disconnect does not cancel it.
pub async fn post_run_one(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunOutcome>, ApiError> {
    let id = parse_id(&app, &id)?;
    let orchestrator = app.orchestrator.clone();
    tokio::spawn(async move { orchestrator.run_pattern(id).await })
        .await
        .map(Json)
        .map_err(join_error)
}

#[derive(Serialize)]
pub struct RunEntry {
    pub id: PatternId,
    pub outcome: RunOutcome,
}

/// POST /api/run: Run every selected pattern sequentially.
pub async fn post_run_selected(
    State(app): State<AppState>,
) -> Result<Json<Vec<RunEntry>>, ApiError> {
    let orchestrator = app.orchestrator.clone();
    let outcomes = tokio::spawn(async move { orchestrator.run_selected().await })
        .await
        .map_err(join_error)?;
    Ok(Json(
        outcomes
            .into_iter()
            .map(|(id, outcome)| RunEntry { id, outcome })
            .collect(),
    ))
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    error!("run task failed: {e}");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
