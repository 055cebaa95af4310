//! Convenience re-exports for common `promptlab` types.
//!
//! ```ignore
//! use promptlab::prelude::*;
//! ```

// ── Client ──────────────────────────────────────────────────────────
pub use crate::config::{API_KEY_ENV, ClientConfig, api_key_from_env};
pub use crate::error::{GenerateError, PatternError};
pub use crate::generator::{FnGenerator, GenerateFuture, Generator};
pub use crate::{AnthropicClient, ContentBlock, MessagesRequest, aggregate_text};

// ── Patterns ────────────────────────────────────────────────────────
pub use crate::patterns::{PatternDescriptor, PatternId, PatternRegistry};

// ── Orchestration ───────────────────────────────────────────────────
pub use crate::events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler, RunEvent,
};
pub use crate::orchestrator::{Orchestrator, RunOutcome, RunResult, RunState, SkipReason};
