//! Observation hooks for the orchestrator.
//!
//! The [`Orchestrator`](crate::orchestrator::Orchestrator) reports every
//! state change as a [`RunEvent`]. Frontends implement [`EventHandler`] to
//! push updates to their views; [`LoggingHandler`] writes them to `tracing`.

use tracing::{debug, info, warn};

use crate::orchestrator::RunResult;
use crate::patterns::PatternId;

/// Something the orchestrator did.
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    /// The selection changed; carries the full selection in order.
    SelectionChanged { selection: &'a [PatternId] },
    /// A pattern was marked in flight and its request is about to be sent.
    RunStarted {
        id: PatternId,
        rendered_prompt: &'a str,
    },
    /// A pattern's result was stored and its in-flight marker cleared.
    RunFinished { id: PatternId, result: &'a RunResult },
    /// A sequential batch over the selection is starting.
    BatchStarted { selection: &'a [PatternId] },
    /// The batch finished; `completed` counts runs that produced a result.
    BatchFinished { completed: usize, skipped: usize },
}

/// Receives [`RunEvent`]s. Called on the orchestrator's task, outside any lock.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &RunEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>
where
    F: Fn(&RunEvent<'_>) + Send + Sync,
{
    func: F,
}

impl<F> FnEventHandler<F>
where
    F: Fn(&RunEvent<'_>) + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&RunEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &RunEvent<'_>) {
        (self.func)(event);
    }
}

/// Fans each event out to several handlers in registration order.
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &RunEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs every event through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &RunEvent<'_>) {
        match event {
            RunEvent::SelectionChanged { selection } => {
                debug!("selection: {}", join_ids(selection));
            }
            RunEvent::RunStarted {
                id,
                rendered_prompt,
            } => {
                info!("[{id}] running ({} chars)", rendered_prompt.len());
            }
            RunEvent::RunFinished { id, result } => {
                if result.is_error {
                    warn!("[{id}] {}", result.output);
                } else {
                    info!(
                        "[{id}] finished at {} ({} chars, context={})",
                        result.timestamp,
                        result.output.len(),
                        result.used_context
                    );
                }
            }
            RunEvent::BatchStarted { selection } => {
                info!("running {} pattern(s): {}", selection.len(), join_ids(selection));
            }
            RunEvent::BatchFinished { completed, skipped } => {
                info!("batch done: {completed} completed, {skipped} skipped");
            }
        }
    }
}

fn join_ids(ids: &[PatternId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}
