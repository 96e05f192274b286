//! The contract an optional AI-assisted step executor must satisfy.
//! This crate ships only the shape and a no-op default; a real
//! implementation lives outside this workspace.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiMode {
    /// May reach out to a network service to plan a new action.
    Auto,
    /// Only replays a previously cached plan; no network probes.
    Warm,
    /// Same as `Warm`, but never falls back to `Auto` if no plan is cached.
    Locked,
}

#[derive(Debug, Clone, Default)]
pub struct AiStepOutcome {
    pub handled: bool,
    pub passed: bool,
    pub error: Option<String>,
    pub plan: Option<String>,
    pub from_cache: bool,
}

/// Consulted when a step has no registered handler. Implementations
/// must honor `AiMode::Locked` by never performing network I/O.
#[async_trait]
pub trait AiStepExecutor: Send + Sync {
    async fn try_handle(&self, step_text: &str, mode: AiMode) -> AiStepOutcome;
}

pub struct NoopAiStepExecutor;

#[async_trait]
impl AiStepExecutor for NoopAiStepExecutor {
    async fn try_handle(&self, _step_text: &str, mode: AiMode) -> AiStepOutcome {
        let error = if mode == AiMode::Locked {
            Some("locked mode: no cached plan".to_string())
        } else {
            None
        };
        AiStepOutcome { handled: false, passed: false, error, plan: None, from_cache: false }
    }
}
