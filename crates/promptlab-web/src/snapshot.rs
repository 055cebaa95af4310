//! Serializable projection of the orchestrator state for WebSocket and REST.
//!
//! [`RunState`] keys results by pattern id and keeps in-flight markers in a
//! set. [`StateSnapshot`] flattens both into one panel per registered
//! pattern, in registry order, which is what a page renders.

use promptlab::orchestrator::{RunResult, RunState};
use promptlab::patterns::{PatternId, PatternRegistry};
use serde::Serialize;

/// Serializable view of the session sent over WebSocket or REST.
#[derive(Debug, Serialize)]
pub struct StateSnapshot {
    pub prompt: String,
    pub context: String,
    /// Selected ids in selection order.
    pub selection: Vec<PatternId>,
    /// Whether "run selected" would send anything.
    pub can_run: bool,
    /// One entry per registered pattern, in display order.
    pub patterns: Vec<PatternPanel>,
}

/// One pattern's card and result panel.
#[derive(Debug, Serialize)]
pub struct PatternPanel {
    pub id: PatternId,
    pub name: &'static str,
    pub description: &'static str,
    pub accent: &'static str,
    pub selected: bool,
    pub in_flight: bool,
    /// Latest result, or `null` if the pattern has not run.
    pub result: Option<RunResult>,
}

impl StateSnapshot {
    pub fn from_state(registry: &PatternRegistry, state: &RunState) -> Self {
        let patterns = registry
            .iter()
            .map(|d| PatternPanel {
                id: d.id,
                name: d.name,
                description: d.description,
                accent: d.accent,
                selected: state.is_selected(d.id),
                in_flight: state.is_in_flight(d.id),
                result: state.results.get(&d.id).cloned(),
            })
            .collect();

        Self {
            prompt: state.prompt.clone(),
            context: state.context.clone(),
            selection: state.selection.clone(),
            can_run: state.can_run(),
            patterns,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
