//! Hosted chat completion provider (`/v1/chat/completions`).
//!
//! Adapter for the OpenAI-compatible endpoint the gateway's conversational
//! intelligence lives behind. All wire types are private to this module —
//! callers only see [`AssistantTurn`]. The service performs its own intent
//! classification; when it decides to route, the response carries a
//! `tool_calls` entry instead of text, surfaced here as
//! [`AssistantTurn::Invoke`].

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::assistant::thread::ThreadMessage;
use crate::assistant::{AssistantTurn, ProviderError, ToolDefinition, ToolInvocation};

// ── Public provider ───────────────────────────────────────────────────────────

/// Client for any HTTP endpoint implementing `/v1/chat/completions` with
/// function calling.
///
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct HostedProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
    tools: Vec<ToolDefinition>,
}

impl HostedProvider {
    /// Build a provider from config values, the required API key, and the
    /// tool definitions offered to the service on every request.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        timeout_seconds: u64,
        api_key: String,
        tools: Vec<ToolDefinition>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, model, temperature, api_key, tools })
    }

    /// One conversational round-trip: system prompt, prior thread, new user
    /// message. Tool execution is the caller's responsibility — this method
    /// only reports what the service chose to do.
    pub async fn complete(
        &self,
        system: Option<&str>,
        history: &[ThreadMessage],
        content: &str,
    ) -> Result<AssistantTurn, ProviderError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(sys) = system {
            messages.push(Message { role: "system".to_string(), content: sys.to_string() });
        }
        for entry in history {
            messages.push(Message {
                role: entry.role.as_str().to_string(),
                content: entry.content.clone(),
            });
        }
        messages.push(Message { role: "user".to_string(), content: content.to_string() });

        let tools: Vec<ToolWire> = self
            .tools
            .iter()
            .map(|t| ToolWire { kind: "function".to_string(), function: t.clone() })
            .collect();

        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            tools,
        };

        debug!(
            model = %payload.model,
            history_len = history.len(),
            content_len = content.len(),
            "sending assistant request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full assistant request payload");
        }

        let response = self
            .client
            .post(&self.api_base_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, "assistant HTTP request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize assistant response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(choices = parsed.choices.len(), "received assistant response");

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Request("no choices in response".into()))?;

        // The service either invokes a tool or answers in text; a tool call
        // takes precedence when both are present.
        if let Some(call) = choice.message.tool_calls.and_then(|mut calls| {
            if calls.is_empty() { None } else { Some(calls.remove(0)) }
        }) {
            return Ok(AssistantTurn::Invoke(ToolInvocation {
                name: call.function.name,
                args_json: call.function.arguments,
            }));
        }

        let text = choice
            .message
            .content
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))?;

        Ok(AssistantTurn::Text(text))
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ToolWire {
    #[serde(rename = "type")]
    kind: String,
    function: ToolDefinition,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolWire>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallWire>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallWire {
    function: FunctionCallWire,
}

#[derive(Debug, Deserialize)]
struct FunctionCallWire {
    name: String,
    /// JSON-encoded arguments string, passed through verbatim.
    arguments: String,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%status, %message, "assistant request returned HTTP error");
    Err(ProviderError::Request(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_tools_as_functions() {
        let req = ChatCompletionRequest {
            model: "test".into(),
            messages: vec![Message { role: "user".into(), content: "hi".into() }],
            temperature: Some(0.2),
            tools: vec![ToolWire {
                kind: "function".into(),
                function: ToolDefinition {
                    name: "access_portal".into(),
                    description: "route".into(),
                    parameters: serde_json::json!({"type": "object"}),
                },
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "access_portal");
    }

    #[test]
    fn response_with_tool_call_parses() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "access_portal", "arguments": "{\"role\":\"lab\"}"}
                    }]
                }
            }]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        let calls = parsed.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "access_portal");
        assert!(calls[0].function.arguments.contains("lab"));
    }

    #[test]
    fn response_with_text_parses() {
        let body = r#"{"choices": [{"message": {"content": "Hello there."}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Hello there.")
        );
    }
}
