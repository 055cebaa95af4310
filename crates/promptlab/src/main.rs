//! Compare prompt patterns from the terminal.
//!
//! Reads the API key from the `ANTHROPIC_API_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Default selection (basic + structured)
//! promptlab --prompt "Write a product launch email"
//!
//! # Pick patterns and add context
//! promptlab --prompt "Write a tagline" \
//!   --context "Acme Corp, a widget maker" \
//!   --pattern cot --pattern persona
//!
//! # Every pattern, prompt from stdin
//! cat brief.md | promptlab --stdin --all
//!
//! # Inspect what would be sent without calling the API
//! promptlab --prompt "Write a tagline" --all --show-prompt
//!
//! # List the available patterns
//! promptlab --list
//! ```

use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use promptlab::orchestrator::DEFAULT_SELECTION;
use promptlab::prelude::*;
use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is unset. Logs go to stderr.
const DEFAULT_LOG_FILTER: &str = "info";

/// Run a prompt through several prompt-engineering patterns and compare.
#[derive(Parser)]
#[command(name = "promptlab")]
struct Cli {
    // ── Input ──────────────────────────────────────────────────
    /// The task prompt
    #[arg(long)]
    prompt: Option<String>,

    /// Read the prompt from stdin
    #[arg(long)]
    stdin: bool,

    /// Background the model should ground its answer in
    #[arg(long, default_value = "")]
    context: String,

    // ── Patterns ───────────────────────────────────────────────
    /// Pattern to run (repeatable): basic, structured, cot, fewshot, persona
    #[arg(long = "pattern")]
    patterns: Vec<String>,

    /// Run every pattern
    #[arg(long, conflicts_with = "patterns")]
    all: bool,

    /// List the available patterns and exit
    #[arg(long)]
    list: bool,

    /// Print the rendered prompts instead of calling the API
    #[arg(long)]
    show_prompt: bool,

    // ── Client ─────────────────────────────────────────────────
    /// Model to use
    #[arg(long, default_value = promptlab::DEFAULT_MODEL)]
    model: String,

    /// Maximum tokens per response
    #[arg(long, default_value_t = promptlab::DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Per-request timeout in seconds (default: none)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// API origin
    #[arg(long, default_value = promptlab::ANTHROPIC_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(io::stderr)
        .init();

    let registry = PatternRegistry::builtin();

    if cli.list {
        for d in registry.iter() {
            println!("{:<11} {:<18} {}", d.id.as_str(), d.name, d.description);
        }
        return Ok(());
    }

    let selection: Vec<PatternId> = if cli.all {
        registry.ids()
    } else if cli.patterns.is_empty() {
        DEFAULT_SELECTION.to_vec()
    } else {
        cli.patterns
            .iter()
            .map(|p| PatternId::parse(p))
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?
    };

    let prompt = match (&cli.prompt, cli.stdin) {
        (Some(p), _) => p.clone(),
        (None, true) => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            buf
        }
        (None, false) => return Err("provide --prompt or --stdin".into()),
    };
    if prompt.trim().is_empty() {
        return Err("prompt is empty".into());
    }

    if cli.show_prompt {
        for id in &selection {
            let d = id.descriptor();
            println!("=== {} ===", d.name);
            println!("[system] {}\n", d.system_instruction);
            println!("{}\n", d.render(&prompt, &cli.context));
        }
        return Ok(());
    }

    let config = ClientConfig::default()
        .with_model(&cli.model)
        .with_max_tokens(cli.max_tokens)
        .with_base_url(&cli.base_url)
        .with_timeout(cli.timeout_secs.map(Duration::from_secs));
    let api_key = api_key_from_env().map_err(|e| e.to_string())?;
    let client = AnthropicClient::new(api_key, config).map_err(|e| e.to_string())?;

    let orchestrator = Orchestrator::new(Arc::new(client)).with_event_handler(LoggingHandler);
    orchestrator.set_prompt(prompt);
    orchestrator.set_context(cli.context.as_str());
    orchestrator.set_selection(selection);

    for (id, outcome) in orchestrator.run_selected().await {
        let name = id.descriptor().name;
        match outcome {
            RunOutcome::Completed(result) => {
                let context_tag = if result.used_context {
                    " | with context"
                } else {
                    ""
                };
                println!("=== {name} ({}{context_tag}) ===", result.timestamp);
                println!("{}\n", result.output);
            }
            RunOutcome::Skipped { reason } => {
                println!("=== {name} === skipped: {reason:?}\n");
            }
        }
    }

    Ok(())
}
