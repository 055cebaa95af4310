//! Built-in prompt engineering patterns.
//!
//! A [`PatternId`] names one transformation strategy. Each id has a fixed
//! [`PatternDescriptor`] (display name, description, system instruction) and a
//! pure [`transform`](PatternId::transform) from `(prompt, context)` to the
//! rendered prompt that is sent to the model.
//!
//! The [`PatternRegistry`] collects the descriptors in display order. Adding a
//! pattern means adding a variant, its descriptor, and its transform arm; the
//! orchestrator and the frontends only ever iterate the registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// Identifier of a built-in pattern.
///
/// Serialized as the short wire id (`"basic"`, `"cot"`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternId {
    Basic,
    Structured,
    Cot,
    FewShot,
    Persona,
}

impl PatternId {
    /// All ids in display order.
    pub const ALL: [PatternId; 5] = [
        PatternId::Basic,
        PatternId::Structured,
        PatternId::Cot,
        PatternId::FewShot,
        PatternId::Persona,
    ];

    /// The short wire id.
    pub fn as_str(self) -> &'static str {
        match self {
            PatternId::Basic => "basic",
            PatternId::Structured => "structured",
            PatternId::Cot => "cot",
            PatternId::FewShot => "fewshot",
            PatternId::Persona => "persona",
        }
    }

    /// Parse a wire id. Long-form aliases (`chain-of-thought`, `few-shot`)
    /// are accepted as well.
    pub fn parse(id: &str) -> Result<Self, PatternError> {
        match id.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(PatternId::Basic),
            "structured" => Ok(PatternId::Structured),
            "cot" | "chain-of-thought" => Ok(PatternId::Cot),
            "fewshot" | "few-shot" => Ok(PatternId::FewShot),
            "persona" => Ok(PatternId::Persona),
            _ => Err(PatternError::Unknown(id.to_string())),
        }
    }

    /// Render the prompt this pattern sends for `prompt` and `context`.
    ///
    /// Pure: no state is read or written, so identical inputs always
    /// produce identical output. An empty `context` means "no context".
    pub fn transform(self, prompt: &str, context: &str) -> String {
        match self {
            PatternId::Basic => with_context(prompt, context),
            PatternId::Structured => format!(
                "{}\n\nProvide your response in a clear, structured format with headers and bullet points.",
                with_context(prompt, context)
            ),
            PatternId::Cot => format!(
                "{}\n\nLet's think through this step by step:",
                with_context(prompt, context)
            ),
            PatternId::FewShot => {
                let context_part = if context.is_empty() {
                    String::new()
                } else {
                    format!("\n\nContext for your task: {context}")
                };
                format!("{FEW_SHOT_EXAMPLES}{context_part}\n\nNow, for the following:\n{prompt}")
            }
            PatternId::Persona => {
                let context_part = if context.is_empty() {
                    "\n\n".to_string()
                } else {
                    format!("\n\nProduct/Company Context:\n{context}\n\n")
                };
                format!(
                    "As a senior product manager,{context_part}{}",
                    prompt.to_lowercase()
                )
            }
        }
    }

    /// The static descriptor for this id.
    pub fn descriptor(self) -> &'static PatternDescriptor {
        match self {
            PatternId::Basic => &BASIC,
            PatternId::Structured => &STRUCTURED,
            PatternId::Cot => &COT,
            PatternId::FewShot => &FEW_SHOT,
            PatternId::Persona => &PERSONA,
        }
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternId {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternId::parse(s)
    }
}

/// `"Context: {context}\n\nTask: {prompt}"` when context is present,
/// otherwise the prompt unchanged.
fn with_context(prompt: &str, context: &str) -> String {
    if context.is_empty() {
        prompt.to_string()
    } else {
        format!("Context: {context}\n\nTask: {prompt}")
    }
}

const FEW_SHOT_EXAMPLES: &str = "Here are some examples:\n\n\
Example 1: Input: \"analyze user feedback\"\n\
Output: Categorized into: Bugs (2), Feature Requests (3), Praise (1)\n\n\
Example 2: Input: \"summarize quarterly report\"\n\
Output: Key metrics, Highlights, Action items in bullet format";

// ── Descriptors ─────────────────────────────────────────────────────

/// Display metadata and system instruction for a pattern.
#[derive(Debug, Clone, Serialize)]
pub struct PatternDescriptor {
    pub id: PatternId,
    /// Human-readable label.
    pub name: &'static str,
    /// One-line explanation of the technique.
    pub description: &'static str,
    /// Sent as the model's system prompt, never shown as part of the prompt body.
    pub system_instruction: &'static str,
    /// Colour hint for frontends.
    pub accent: &'static str,
}

impl PatternDescriptor {
    /// Shorthand for `self.id.transform(prompt, context)`.
    pub fn render(&self, prompt: &str, context: &str) -> String {
        self.id.transform(prompt, context)
    }
}

static BASIC: PatternDescriptor = PatternDescriptor {
    id: PatternId::Basic,
    name: "Basic Prompt",
    description: "Direct prompt without any special techniques",
    system_instruction: "You are a helpful AI assistant.",
    accent: "blue",
};

static STRUCTURED: PatternDescriptor = PatternDescriptor {
    id: PatternId::Structured,
    name: "Structured Output",
    description: "Request specific format (JSON, lists, etc.)",
    system_instruction: "You are a helpful AI assistant. Provide responses in clear, structured formats.",
    accent: "purple",
};

static COT: PatternDescriptor = PatternDescriptor {
    id: PatternId::Cot,
    name: "Chain of Thought",
    description: "Ask model to show its reasoning process",
    system_instruction: "You are a helpful AI assistant. Show your thinking process step by step.",
    accent: "amber",
};

static FEW_SHOT: PatternDescriptor = PatternDescriptor {
    id: PatternId::FewShot,
    name: "Few-Shot Learning",
    description: "Provide examples before the actual task",
    system_instruction: "You are a helpful AI assistant. Follow the pattern shown in the examples.",
    accent: "green",
};

static PERSONA: PatternDescriptor = PatternDescriptor {
    id: PatternId::Persona,
    name: "Persona Pattern",
    description: "Give the AI a specific role/expertise",
    system_instruction: "You are an experienced product manager with 15 years at top tech companies. \
You ground your responses in specific details when context is provided, \
and clearly indicate when you need more information.",
    accent: "pink",
};

// ── Registry ────────────────────────────────────────────────────────

/// Ordered, immutable collection of pattern descriptors.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    entries: Vec<&'static PatternDescriptor>,
}

impl PatternRegistry {
    /// The five built-in patterns in display order.
    pub fn builtin() -> Self {
        Self {
            entries: PatternId::ALL.iter().map(|id| id.descriptor()).collect(),
        }
    }

    /// Look up a descriptor by id.
    pub fn get(&self, id: PatternId) -> Option<&'static PatternDescriptor> {
        self.entries.iter().copied().find(|d| d.id == id)
    }

    /// Look up a descriptor by wire id.
    pub fn lookup(&self, id: &str) -> Result<&'static PatternDescriptor, PatternError> {
        let parsed = PatternId::parse(id)?;
        self.get(parsed)
            .ok_or_else(|| PatternError::Unknown(id.to_string()))
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<PatternId> {
        self.entries.iter().map(|d| d.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static PatternDescriptor> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
