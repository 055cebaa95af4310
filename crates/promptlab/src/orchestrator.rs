//! Pattern selection, per-pattern runs, and sequential batch runs.
//!
//! [`Orchestrator`] owns the session state ([`RunState`]): the prompt and
//! context being compared, the ordered selection, the latest [`RunResult`]
//! per pattern, and which patterns are in flight. Frontends read the state
//! through [`Orchestrator::snapshot`] and only change it through the
//! operations here.
//!
//! # Concurrency
//!
//! The state sits behind a `Mutex` that is never held across an `.await`.
//! Each run locks once to mark the pattern in flight, awaits the
//! [`Generator`] unlocked, then locks again to store the result and clear the
//! marker in the same critical section. The marker is owned by a drop guard,
//! so it is also cleared when the run's future is dropped mid-request.
//!
//! [`Orchestrator::run_selected`] awaits each pattern before starting the
//! next; latency grows with the selection size but the service never sees
//! more than one request per batch at a time and results land in selection
//! order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use serde::Serialize;
use tracing::debug;

use crate::error::{GenerateError, PatternError};
use crate::events::{EventHandler, NoopHandler, RunEvent};
use crate::generator::Generator;
use crate::patterns::{PatternId, PatternRegistry};

/// Selection a fresh session starts with.
pub const DEFAULT_SELECTION: [PatternId; 2] = [PatternId::Basic, PatternId::Structured];

// ── Results ─────────────────────────────────────────────────────────

/// Outcome of the most recent run of one pattern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Model text, or `"Error: ..."` when the request failed.
    pub output: String,
    /// Local wall-clock time the run completed (`HH:MM:SS`).
    pub timestamp: String,
    /// Whether the context was non-empty when the run started.
    pub used_context: bool,
    /// Whether `output` is an error message.
    pub is_error: bool,
}

impl RunResult {
    fn success(output: String, used_context: bool) -> Self {
        Self {
            output,
            timestamp: now_timestamp(),
            used_context,
            is_error: false,
        }
    }

    fn failure(err: &GenerateError, used_context: bool) -> Self {
        Self {
            output: format!("Error: {err}"),
            timestamp: now_timestamp(),
            used_context,
            is_error: true,
        }
    }
}

fn now_timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// What a call to [`Orchestrator::run_pattern`] did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A request was sent and its result stored.
    Completed(RunResult),
    /// Nothing was sent and no state changed.
    Skipped { reason: SkipReason },
}

impl RunOutcome {
    fn skipped(reason: SkipReason) -> Self {
        RunOutcome::Skipped { reason }
    }

    pub fn result(&self) -> Option<&RunResult> {
        match self {
            RunOutcome::Completed(result) => Some(result),
            RunOutcome::Skipped { .. } => None,
        }
    }
}

/// Why a run was not started.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The prompt is empty or whitespace.
    EmptyPrompt,
    /// The pattern already has a request outstanding.
    AlreadyInFlight,
}

// ── State ───────────────────────────────────────────────────────────

/// Session state for one comparison page.
#[derive(Clone, Debug, Serialize)]
pub struct RunState {
    pub prompt: String,
    pub context: String,
    /// Selected patterns in the order they were selected.
    pub selection: Vec<PatternId>,
    pub results: HashMap<PatternId, RunResult>,
    pub in_flight: HashSet<PatternId>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            context: String::new(),
            selection: DEFAULT_SELECTION.to_vec(),
            results: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }
}

impl RunState {
    /// Whether a batch run would send anything.
    pub fn can_run(&self) -> bool {
        !self.prompt.trim().is_empty() && !self.selection.is_empty()
    }

    pub fn is_selected(&self, id: PatternId) -> bool {
        self.selection.contains(&id)
    }

    pub fn is_in_flight(&self, id: PatternId) -> bool {
        self.in_flight.contains(&id)
    }
}

/// Clears a pattern's in-flight marker when dropped unless
/// [`finish`](Self::finish) already did it under the caller's lock.
struct InFlightGuard<'a> {
    state: &'a Mutex<RunState>,
    id: PatternId,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn finish(mut self, state: &mut RunState) {
        state.in_flight.remove(&self.id);
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("[{}] run dropped before completion", self.id);
            lock(self.state).in_flight.remove(&self.id);
        }
    }
}

fn lock(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Orchestrator ────────────────────────────────────────────────────

/// Runs selected patterns against a [`Generator`] and keeps their results.
pub struct Orchestrator {
    generator: Arc<dyn Generator>,
    registry: PatternRegistry,
    handler: Box<dyn EventHandler>,
    state: Mutex<RunState>,
}

impl Orchestrator {
    /// An orchestrator over the built-in registry with the default selection.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            registry: PatternRegistry::builtin(),
            handler: Box::new(NoopHandler),
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// A copy of the current state for rendering.
    pub fn snapshot(&self) -> RunState {
        lock(&self.state).clone()
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        lock(&self.state).prompt = prompt.into();
    }

    pub fn set_context(&self, context: impl Into<String>) {
        lock(&self.state).context = context.into();
    }

    pub fn can_run(&self) -> bool {
        lock(&self.state).can_run()
    }

    pub fn result(&self, id: PatternId) -> Option<RunResult> {
        lock(&self.state).results.get(&id).cloned()
    }

    pub fn is_in_flight(&self, id: PatternId) -> bool {
        lock(&self.state).is_in_flight(id)
    }

    /// Add `id` to the end of the selection, or remove it if present.
    ///
    /// Returns whether `id` is selected afterwards.
    pub fn toggle_selection(&self, id: PatternId) -> bool {
        let (selected, selection) = {
            let mut state = lock(&self.state);
            let selected = match state.selection.iter().position(|s| *s == id) {
                Some(idx) => {
                    state.selection.remove(idx);
                    false
                }
                None => {
                    state.selection.push(id);
                    true
                }
            };
            (selected, state.selection.clone())
        };
        self.handler.on_event(&RunEvent::SelectionChanged {
            selection: &selection,
        });
        selected
    }

    /// [`toggle_selection`](Self::toggle_selection) by wire id; unknown ids
    /// are rejected.
    pub fn toggle_selection_str(&self, id: &str) -> Result<bool, PatternError> {
        let descriptor = self.registry.lookup(id)?;
        Ok(self.toggle_selection(descriptor.id))
    }

    /// Replace the selection, keeping first occurrences in the given order.
    pub fn set_selection(&self, ids: impl IntoIterator<Item = PatternId>) {
        let selection = {
            let mut state = lock(&self.state);
            state.selection.clear();
            for id in ids {
                if !state.selection.contains(&id) {
                    state.selection.push(id);
                }
            }
            state.selection.clone()
        };
        self.handler.on_event(&RunEvent::SelectionChanged {
            selection: &selection,
        });
    }

    /// Run one pattern against the current prompt and context.
    ///
    /// Skips without side effects when the prompt is blank or the pattern is
    /// already in flight. Service failures become an error [`RunResult`];
    /// they are never returned as `Err`.
    pub async fn run_pattern(&self, id: PatternId) -> RunOutcome {
        let (prompt, context) = {
            let state = lock(&self.state);
            (state.prompt.clone(), state.context.clone())
        };
        self.run_pattern_with(id, &prompt, &context).await
    }

    /// Run every selected pattern, one at a time, in selection order.
    ///
    /// The selection, prompt and context are captured together when the
    /// batch starts, so edits made mid-batch do not reach later patterns. A
    /// failing pattern does not stop the batch. An empty selection returns
    /// immediately.
    pub async fn run_selected(&self) -> Vec<(PatternId, RunOutcome)> {
        let (selection, prompt, context) = {
            let state = lock(&self.state);
            (
                state.selection.clone(),
                state.prompt.clone(),
                state.context.clone(),
            )
        };
        if selection.is_empty() {
            return Vec::new();
        }

        self.handler.on_event(&RunEvent::BatchStarted {
            selection: &selection,
        });

        let mut outcomes = Vec::with_capacity(selection.len());
        for id in selection {
            let outcome = self.run_pattern_with(id, &prompt, &context).await;
            outcomes.push((id, outcome));
        }

        let completed = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, RunOutcome::Completed(_)))
            .count();
        self.handler.on_event(&RunEvent::BatchFinished {
            completed,
            skipped: outcomes.len() - completed,
        });
        outcomes
    }

    async fn run_pattern_with(&self, id: PatternId, prompt: &str, context: &str) -> RunOutcome {
        if prompt.trim().is_empty() {
            return RunOutcome::skipped(SkipReason::EmptyPrompt);
        }
        if !lock(&self.state).in_flight.insert(id) {
            debug!("[{id}] already in flight, ignoring");
            return RunOutcome::skipped(SkipReason::AlreadyInFlight);
        }
        let guard = InFlightGuard {
            state: &self.state,
            id,
            armed: true,
        };

        let descriptor = id.descriptor();
        let rendered = descriptor.render(prompt, context);
        let used_context = !context.is_empty();

        self.handler.on_event(&RunEvent::RunStarted {
            id,
            rendered_prompt: &rendered,
        });

        let result = match self
            .generator
            .generate(descriptor.system_instruction, &rendered)
            .await
        {
            Ok(text) => RunResult::success(text, used_context),
            Err(err) => RunResult::failure(&err, used_context),
        };

        {
            let mut state = lock(&self.state);
            state.results.insert(id, result.clone());
            guard.finish(&mut state);
        }

        self.handler.on_event(&RunEvent::RunFinished {
            id,
            result: &result,
        });
        RunOutcome::Completed(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FnEventHandler;
    use crate::generator::FnGenerator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    type Calls = Arc<Mutex<Vec<(String, String)>>>;

    /// Generator that records every call and answers with a fixed text.
    fn recording(reply: &'static str) -> (Arc<dyn Generator>, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let log = calls.clone();
        let generator = FnGenerator::new(move |system, prompt| {
            log.lock().unwrap().push((system, prompt));
            async move { Ok(reply.to_string()) }
        });
        (Arc::new(generator), calls)
    }

    fn failing(message: &'static str) -> Arc<dyn Generator> {
        Arc::new(FnGenerator::new(move |_, _| async move {
            Err(GenerateError::Other(message.to_string()))
        }))
    }

    /// Generator that blocks until `release` is notified.
    fn gated(release: Arc<Notify>, started: Arc<Notify>) -> Arc<dyn Generator> {
        Arc::new(FnGenerator::new(move |_, _| {
            let release = release.clone();
            let started = started.clone();
            async move {
                started.notify_one();
                release.notified().await;
                Ok("released".to_string())
            }
        }))
    }

    #[test]
    fn fresh_state_selects_basic_and_structured() {
        let (generator, _) = recording("ok");
        let orch = Orchestrator::new(generator);
        let state = orch.snapshot();
        assert_eq!(state.selection, vec![PatternId::Basic, PatternId::Structured]);
        assert!(state.results.is_empty());
        assert!(!state.can_run());
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let (generator, _) = recording("ok");
        let orch = Orchestrator::new(generator);
        let before = orch.snapshot().selection;

        assert!(orch.toggle_selection(PatternId::Persona));
        assert_eq!(orch.snapshot().selection.last(), Some(&PatternId::Persona));
        assert!(!orch.toggle_selection(PatternId::Persona));
        assert_eq!(orch.snapshot().selection, before);

        assert!(!orch.toggle_selection(PatternId::Basic));
        assert!(orch.toggle_selection(PatternId::Basic));
        assert_eq!(
            orch.snapshot().selection,
            vec![PatternId::Structured, PatternId::Basic]
        );
    }

    #[test]
    fn toggle_by_unknown_id_is_rejected() {
        let (generator, _) = recording("ok");
        let orch = Orchestrator::new(generator);
        let before = orch.snapshot().selection;
        assert_eq!(
            orch.toggle_selection_str("socratic"),
            Err(PatternError::Unknown("socratic".into()))
        );
        assert_eq!(orch.snapshot().selection, before);
        assert_eq!(orch.toggle_selection_str("cot"), Ok(true));
    }

    #[test]
    fn set_selection_dedups_in_order() {
        let (generator, _) = recording("ok");
        let orch = Orchestrator::new(generator);
        orch.set_selection([PatternId::Persona, PatternId::Cot, PatternId::Persona]);
        assert_eq!(
            orch.snapshot().selection,
            vec![PatternId::Persona, PatternId::Cot]
        );
    }

    #[tokio::test]
    async fn empty_prompt_sends_nothing() {
        let (generator, calls) = recording("ok");
        let orch = Orchestrator::new(generator);
        orch.set_prompt("   \n");

        let outcome = orch.run_pattern(PatternId::Basic).await;
        assert_eq!(
            outcome,
            RunOutcome::Skipped {
                reason: SkipReason::EmptyPrompt
            }
        );
        assert!(calls.lock().unwrap().is_empty());
        assert!(orch.snapshot().results.is_empty());
        assert!(!orch.is_in_flight(PatternId::Basic));
    }

    #[tokio::test]
    async fn run_pattern_sends_system_instruction_and_rendered_prompt() {
        let (generator, calls) = recording("A tagline");
        let orch = Orchestrator::new(generator);
        orch.set_prompt("Write a tagline");
        orch.set_context("Acme Corp, a widget maker");

        let outcome = orch.run_pattern(PatternId::Basic).await;
        let result = outcome.result().unwrap();
        assert_eq!(result.output, "A tagline");
        assert!(result.used_context);
        assert!(!result.is_error);
        assert_eq!(result.timestamp.len(), 8);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "You are a helpful AI assistant.");
        assert_eq!(
            calls[0].1,
            "Context: Acme Corp, a widget maker\n\nTask: Write a tagline"
        );
        assert_eq!(orch.result(PatternId::Basic).as_ref(), Some(result));
    }

    #[tokio::test]
    async fn run_selected_stores_one_result_per_pattern() {
        let (generator, calls) = recording("ok");
        let orch = Orchestrator::new(generator);
        orch.set_selection([PatternId::Basic, PatternId::Cot]);
        orch.set_prompt("Write a tagline");

        let outcomes = orch.run_selected().await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, PatternId::Basic);
        assert_eq!(outcomes[1].0, PatternId::Cot);

        let state = orch.snapshot();
        assert_eq!(state.results.len(), 2);
        assert!(state.results.values().all(|r| !r.used_context));
        assert!(state.in_flight.is_empty());

        let prompts: Vec<String> = calls.lock().unwrap().iter().map(|c| c.1.clone()).collect();
        assert_eq!(
            prompts,
            vec![
                "Write a tagline".to_string(),
                "Write a tagline\n\nLet's think through this step by step:".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn run_selected_with_empty_selection_is_noop() {
        let (generator, calls) = recording("ok");
        let orch = Orchestrator::new(generator);
        orch.set_selection(Vec::new());
        orch.set_prompt("Write a tagline");
        assert!(!orch.can_run());
        assert!(orch.run_selected().await.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_becomes_error_result_and_clears_in_flight() {
        let orch = Orchestrator::new(failing("network unreachable"));
        orch.set_prompt("Write a tagline");

        let outcome = orch.run_pattern(PatternId::Structured).await;
        let result = outcome.result().unwrap();
        assert!(result.output.starts_with("Error: "));
        assert_eq!(result.output, "Error: network unreachable");
        assert!(result.is_error);
        assert!(!orch.is_in_flight(PatternId::Structured));
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let generator: Arc<dyn Generator> = Arc::new(FnGenerator::new(|system, _| async move {
            if system.contains("structured") {
                Err(GenerateError::Api {
                    status: 500,
                    message: "Internal".into(),
                })
            } else {
                Ok("fine".to_string())
            }
        }));
        let orch = Orchestrator::new(generator);
        orch.set_selection([PatternId::Structured, PatternId::Persona]);
        orch.set_prompt("Write a tagline");

        let outcomes = orch.run_selected().await;
        assert_eq!(
            outcomes[0].1.result().unwrap().output,
            "Error: API HTTP 500: Internal"
        );
        assert_eq!(outcomes[1].1.result().unwrap().output, "fine");
    }

    #[tokio::test]
    async fn batch_runs_one_request_at_a_time() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (active.clone(), peak.clone());
        let generator: Arc<dyn Generator> = Arc::new(FnGenerator::new(move |_, _| {
            let (a, p) = (a.clone(), p.clone());
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                a.fetch_sub(1, Ordering::SeqCst);
                Ok("ok".to_string())
            }
        }));
        let orch = Orchestrator::new(generator);
        orch.set_selection(PatternId::ALL);
        orch.set_prompt("Write a tagline");

        assert_eq!(orch.run_selected().await.len(), 5);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reentrant_run_is_skipped_while_in_flight() {
        let release = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let orch = Arc::new(Orchestrator::new(gated(release.clone(), started.clone())));
        orch.set_prompt("Write a tagline");

        let first = tokio::spawn({
            let orch = orch.clone();
            async move { orch.run_pattern(PatternId::Cot).await }
        });
        started.notified().await;
        assert!(orch.is_in_flight(PatternId::Cot));

        let second = orch.run_pattern(PatternId::Cot).await;
        assert_eq!(
            second,
            RunOutcome::Skipped {
                reason: SkipReason::AlreadyInFlight
            }
        );

        release.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.result().unwrap().output, "released");
        assert!(!orch.is_in_flight(PatternId::Cot));
    }

    #[tokio::test]
    async fn batch_keeps_input_from_when_it_started() {
        let release = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let generator: Arc<dyn Generator> = Arc::new(FnGenerator::new({
            let (release, started, log) = (release.clone(), started.clone(), calls.clone());
            move |system, prompt| {
                log.lock().unwrap().push((system, prompt));
                let (release, started) = (release.clone(), started.clone());
                async move {
                    started.notify_one();
                    release.notified().await;
                    Ok("ok".to_string())
                }
            }
        }));
        let orch = Arc::new(Orchestrator::new(generator));
        orch.set_selection([PatternId::Basic, PatternId::Cot]);
        orch.set_prompt("Write a tagline");

        let batch = tokio::spawn({
            let orch = orch.clone();
            async move { orch.run_selected().await }
        });

        started.notified().await;
        orch.set_prompt("Write a haiku");
        orch.set_context("Acme");
        release.notify_one();
        started.notified().await;
        release.notify_one();
        let outcomes = batch.await.unwrap();

        let prompts: Vec<String> = calls.lock().unwrap().iter().map(|c| c.1.clone()).collect();
        assert_eq!(
            prompts,
            vec![
                "Write a tagline".to_string(),
                "Write a tagline\n\nLet's think through this step by step:".to_string(),
            ]
        );
        assert!(
            outcomes
                .iter()
                .all(|(_, o)| !o.result().unwrap().used_context)
        );

        // A single run afterwards sees the edited input.
        release.notify_one();
        let outcome = orch.run_pattern(PatternId::Basic).await;
        assert!(outcome.result().unwrap().used_context);
        assert_eq!(
            calls.lock().unwrap().last().unwrap().1,
            "Context: Acme\n\nTask: Write a haiku"
        );
    }

    #[tokio::test]
    async fn dropped_run_clears_in_flight() {
        let release = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let orch = Arc::new(Orchestrator::new(gated(release, started.clone())));
        orch.set_prompt("Write a tagline");

        let task = tokio::spawn({
            let orch = orch.clone();
            async move { orch.run_pattern(PatternId::Persona).await }
        });
        started.notified().await;
        assert!(orch.is_in_flight(PatternId::Persona));

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!orch.is_in_flight(PatternId::Persona));
        assert!(orch.result(PatternId::Persona).is_none());
    }

    #[tokio::test]
    async fn rerun_overwrites_previous_result() {
        let (generator, _) = recording("ok");
        let orch = Orchestrator::new(generator);
        orch.set_prompt("Write a tagline");
        orch.run_pattern(PatternId::Basic).await;
        assert!(!orch.result(PatternId::Basic).unwrap().used_context);

        orch.set_context("Acme Corp");
        orch.run_pattern(PatternId::Basic).await;
        let state = orch.snapshot();
        assert_eq!(state.results.len(), 1);
        assert!(state.results[&PatternId::Basic].used_context);
    }

    #[tokio::test]
    async fn events_fire_in_order() {
        let (generator, _) = recording("ok");
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let log = seen.clone();
        let orch = Orchestrator::new(generator).with_event_handler(FnEventHandler::new(
            move |event| {
                let label = match event {
                    RunEvent::SelectionChanged { .. } => "selection".to_string(),
                    RunEvent::RunStarted { id, .. } => format!("start:{id}"),
                    RunEvent::RunFinished { id, .. } => format!("finish:{id}"),
                    RunEvent::BatchStarted { .. } => "batch".to_string(),
                    RunEvent::BatchFinished { completed, .. } => format!("done:{completed}"),
                };
                log.lock().unwrap().push(label);
            },
        ));
        orch.set_prompt("Write a tagline");
        orch.run_selected().await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "batch",
                "start:basic",
                "finish:basic",
                "start:structured",
                "finish:structured",
                "done:2",
            ]
        );
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let skipped = RunOutcome::Skipped {
            reason: SkipReason::EmptyPrompt,
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "empty_prompt");

        let done = RunOutcome::Completed(RunResult::success("hi".into(), false));
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["output"], "hi");
        assert_eq!(json["used_context"], false);
    }
}
