//! Provider construction from config.

pub mod hosted;
pub mod scripted;

use crate::config::AssistantConfig;

use super::{AssistantProvider, ProviderError, ToolDefinition};

/// Build the configured provider.
///
/// `api_key` comes from `NEXUS_API_KEY` env — never TOML. The hosted
/// provider refuses to construct without it; this is the single hard
/// startup failure the gateway defines.
pub fn build(
    config: &AssistantConfig,
    api_key: Option<String>,
    tools: Vec<ToolDefinition>,
) -> Result<AssistantProvider, ProviderError> {
    match config.provider.as_str() {
        "scripted" => Ok(AssistantProvider::Scripted(scripted::ScriptedProvider::new())),
        "hosted" => {
            let api_key = api_key.ok_or(ProviderError::MissingApiKey)?;
            let p = hosted::HostedProvider::new(
                config.hosted.api_base_url.clone(),
                config.hosted.model.clone(),
                config.hosted.temperature,
                config.hosted.timeout_seconds,
                api_key,
                tools,
            )?;
            Ok(AssistantProvider::Hosted(p))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}
