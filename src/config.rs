//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `NEXUS_SERVICE_URL` and `NEXUS_LOG_LEVEL` env overrides.
//! The hosted-assistant API key comes from `NEXUS_API_KEY` only — never
//! from TOML.

use std::{env, fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::error::AppError;

/// Console channel configuration.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Whether the console channel is explicitly enabled.
    pub enabled: bool,
}

/// HTTP channel configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whether the HTTP channel is explicitly enabled.
    pub enabled: bool,
    /// Socket address to bind the HTTP channel to.
    pub bind: String,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub console: ConsoleConfig,
    pub http: HttpConfig,
}

/// Hosted (OpenAI-compatible) provider configuration.
/// Populated from `[assistant.hosted]` in the TOML.
#[derive(Debug, Clone)]
pub struct HostedConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Assistant subsystem configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Which provider is active (`"scripted"` or `"hosted"`).
    /// Maps to `default` in `[assistant]` TOML — named `default` there to
    /// signal that other provider sections can coexist without being loaded.
    pub provider: String,
    /// Config for the hosted provider (`[assistant.hosted]`).
    pub hosted: HostedConfig,
}

/// Chat-surface copy shared by the console and HTTP channels.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    pub title: String,
    pub tagline: String,
    pub placeholder: String,
    /// Fixed suggestion strip served by the assistant subsystem.
    pub suggestions: Vec<String>,
}

/// Fully-resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_name: String,
    pub log_level: String,
    /// Fixed delay between a portal classification and the navigation.
    pub transition_delay: Duration,
    pub comms: CommsConfig,
    pub assistant: AssistantConfig,
    pub surface: SurfaceConfig,
    /// API key from `NEXUS_API_KEY` env — `None` halts startup when the
    /// hosted provider is selected. Never sourced from TOML.
    pub api_key: Option<String>,
}

impl Config {
    /// Returns `true` if the console channel should be loaded.
    pub fn comms_console_should_load(&self) -> bool {
        self.comms.console.enabled
    }

    /// Returns `true` if the HTTP channel should be loaded.
    pub fn comms_http_should_load(&self) -> bool {
        self.comms.http.enabled
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    gateway: RawGateway,
    #[serde(default)]
    comms: RawComms,
    #[serde(default)]
    assistant: RawAssistant,
    #[serde(default)]
    surface: RawSurface,
}

#[derive(Deserialize)]
struct RawGateway {
    name: String,
    log_level: String,
    #[serde(default = "default_transition_delay_ms")]
    transition_delay_ms: u64,
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    console: RawConsole,
    #[serde(default)]
    http: RawHttp,
}

#[derive(Deserialize)]
struct RawConsole {
    /// Defaults to `true`: the console auto-enables when nothing else is.
    #[serde(default = "default_true")]
    enabled: bool,
}

#[derive(Deserialize)]
struct RawHttp {
    /// Defaults to `false`: HTTP must be explicitly enabled.
    #[serde(default = "default_false")]
    enabled: bool,
    /// Bind address for the HTTP listener.
    #[serde(default = "default_http_bind")]
    bind: String,
}

#[derive(Deserialize)]
struct RawAssistant {
    /// Maps to `default = "..."` in `[assistant]`.
    #[serde(rename = "default", default = "default_assistant_provider")]
    provider: String,
    #[serde(default)]
    hosted: RawHostedConfig,
}

impl Default for RawAssistant {
    fn default() -> Self {
        Self { provider: default_assistant_provider(), hosted: RawHostedConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawHostedConfig {
    #[serde(default = "default_hosted_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_hosted_model")]
    model: String,
    #[serde(default = "default_hosted_temperature")]
    temperature: f32,
    #[serde(default = "default_hosted_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawHostedConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_hosted_api_base_url(),
            model: default_hosted_model(),
            temperature: default_hosted_temperature(),
            timeout_seconds: default_hosted_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawSurface {
    #[serde(default = "default_surface_title")]
    title: String,
    #[serde(default = "default_surface_tagline")]
    tagline: String,
    #[serde(default = "default_surface_placeholder")]
    placeholder: String,
    #[serde(default)]
    suggestions: Vec<String>,
}

impl Default for RawSurface {
    fn default() -> Self {
        Self {
            title: default_surface_title(),
            tagline: default_surface_tagline(),
            placeholder: default_surface_placeholder(),
            suggestions: Vec::new(),
        }
    }
}

impl Default for RawConsole {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for RawHttp {
    fn default() -> Self {
        Self { enabled: false, bind: default_http_bind() }
    }
}

fn default_assistant_provider() -> String { "scripted".to_string() }
fn default_hosted_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_hosted_model() -> String { "gpt-4o-mini".to_string() }
fn default_hosted_temperature() -> f32 { 0.2 }
fn default_hosted_timeout_seconds() -> u64 { 60 }
fn default_transition_delay_ms() -> u64 { 1500 }
fn default_http_bind() -> String { "127.0.0.1:8080".to_string() }
fn default_surface_title() -> String { "Nexus Health Gateway".to_string() }

fn default_surface_tagline() -> String {
    "Your intelligent healthcare companion. Tell me what you need, and I'll guide you to the right place."
        .to_string()
}

fn default_surface_placeholder() -> String {
    "Describe your symptoms, ask about lab results, or tell me what you need...".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let service_url_override = env::var("NEXUS_SERVICE_URL").ok();
    let log_level_override = env::var("NEXUS_LOG_LEVEL").ok();
    let api_key = env::var("NEXUS_API_KEY").ok().filter(|k| !k.trim().is_empty());
    load_from(
        Path::new("config/default.toml"),
        service_url_override.as_deref(),
        log_level_override.as_deref(),
        api_key,
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    service_url_override: Option<&str>,
    log_level_override: Option<&str>,
    api_key: Option<String>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let g = parsed.gateway;

    let log_level = log_level_override.unwrap_or(&g.log_level).to_string();
    let api_base_url = service_url_override
        .unwrap_or(&parsed.assistant.hosted.api_base_url)
        .to_string();

    Ok(Config {
        gateway_name: g.name,
        log_level,
        transition_delay: Duration::from_millis(g.transition_delay_ms),
        comms: CommsConfig {
            console: ConsoleConfig {
                enabled: parsed.comms.console.enabled,
            },
            http: HttpConfig {
                enabled: parsed.comms.http.enabled,
                bind: parsed.comms.http.bind,
            },
        },
        assistant: AssistantConfig {
            provider: parsed.assistant.provider,
            hosted: HostedConfig {
                api_base_url,
                model: parsed.assistant.hosted.model,
                temperature: parsed.assistant.hosted.temperature,
                timeout_seconds: parsed.assistant.hosted.timeout_seconds,
            },
        },
        surface: SurfaceConfig {
            title: parsed.surface.title,
            tagline: parsed.surface.tagline,
            placeholder: parsed.surface.placeholder,
            suggestions: parsed.surface.suggestions,
        },
        api_key,
    })
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — scripted provider, no API keys, no
/// external calls.
#[cfg(test)]
impl Config {
    pub fn test_default() -> Self {
        Self {
            gateway_name: "test-gateway".into(),
            log_level: "info".into(),
            transition_delay: Duration::from_millis(1500),
            comms: CommsConfig {
                console: ConsoleConfig { enabled: true },
                http: HttpConfig {
                    enabled: false,
                    bind: default_http_bind(),
                },
            },
            assistant: AssistantConfig {
                provider: "scripted".into(),
                hosted: HostedConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            surface: SurfaceConfig {
                title: "Nexus Health Gateway".into(),
                tagline: "test tagline".into(),
                placeholder: "type here".into(),
                suggestions: vec!["Show me my latest lab results".into()],
            },
            api_key: None,
        }
    }
}
