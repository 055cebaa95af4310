//! The generation service seam.
//!
//! The orchestrator only needs "system instruction + rendered prompt in,
//! text or error out". [`Generator`] captures that contract so the HTTP
//! client can be swapped for a fake in tests or a different provider.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::GenerateError;

/// Boxed future returned by [`Generator::generate`].
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<String, GenerateError>> + Send + 'a>>;

/// A text-in, text-out generation service.
///
/// Uses a boxed future so the trait stays dyn-compatible and the
/// orchestrator can hold an `Arc<dyn Generator>`.
pub trait Generator: Send + Sync {
    /// Send one request carrying `system` as the system instruction and
    /// `prompt` as the single user message. Returns the display text.
    fn generate<'a>(&'a self, system: &'a str, prompt: &'a str) -> GenerateFuture<'a>;
}

impl<G: Generator + ?Sized> Generator for Arc<G> {
    fn generate<'a>(&'a self, system: &'a str, prompt: &'a str) -> GenerateFuture<'a> {
        (**self).generate(system, prompt)
    }
}

type GenerateFn =
    Box<dyn Fn(String, String) -> Pin<Box<dyn Future<Output = Result<String, GenerateError>> + Send>> + Send + Sync>;

/// A [`Generator`] backed by an async closure.
///
/// ```ignore
/// let echo = FnGenerator::new(|_system, prompt| async move { Ok(prompt) });
/// ```
pub struct FnGenerator {
    func: GenerateFn,
}

impl FnGenerator {
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, GenerateError>> + Send + 'static,
    {
        let erased = move |system: String, prompt: String| -> Pin<
            Box<dyn Future<Output = Result<String, GenerateError>> + Send>,
        > { Box::pin(func(system, prompt)) };
        Self {
            func: Box::new(erased),
        }
    }
}

impl Generator for FnGenerator {
    fn generate<'a>(&'a self, system: &'a str, prompt: &'a str) -> GenerateFuture<'a> {
        (self.func)(system.to_string(), prompt.to_string())
    }
}
