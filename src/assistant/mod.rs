//! Assistant provider abstraction.
//!
//! `AssistantProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! Async is delegated to the underlying provider; the `complete` method is
//! `async fn` on the enum so callers need no trait-object machinery.
//!
//! A completion yields an [`AssistantTurn`]: either plain text, or a tool
//! invocation the hosted service decided to make from its own intent
//! classification of the user's message.

pub mod providers;
pub mod thread;

use serde::Serialize;
use thiserror::Error;

use thread::ThreadMessage;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("NEXUS_API_KEY is not set — the hosted assistant requires an API key")]
    MissingApiKey,
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Tool contract ─────────────────────────────────────────────────────────────

/// A named, schema-typed function the assistant service may invoke.
///
/// `parameters` is a JSON Schema object serialized verbatim into the hosted
/// provider's `tools` array.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool invocation the service chose to make on this turn.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    /// Raw JSON arguments exactly as the service produced them.
    pub args_json: String,
}

/// One assistant turn: text to show the user, or a tool to execute.
#[derive(Debug, Clone)]
pub enum AssistantTurn {
    Text(String),
    Invoke(ToolInvocation),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum AssistantProvider {
    Hosted(providers::hosted::HostedProvider),
    Scripted(providers::scripted::ScriptedProvider),
}

impl AssistantProvider {
    /// Run one conversational round-trip: the prior thread plus the new user
    /// `content`, returning the service's next turn.
    pub async fn complete(
        &self,
        system: Option<&str>,
        history: &[ThreadMessage],
        content: &str,
    ) -> Result<AssistantTurn, ProviderError> {
        match self {
            AssistantProvider::Hosted(p) => p.complete(system, history, content).await,
            AssistantProvider::Scripted(p) => p.complete(content).await,
        }
    }
}
