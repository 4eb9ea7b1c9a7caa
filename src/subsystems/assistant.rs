//! Assistant subsystem — fronts the conversational-AI provider.
//!
//! Implements [`BusHandler`] with prefix `"assistant"` so the supervisor can
//! register it generically. `send` requests are resolved in a spawned task;
//! the supervisor loop is never blocked on provider I/O. Thread snapshots
//! and the suggestion strip resolve synchronously.
//!
//! When the provider reports that the service invoked the portal tool, this
//! subsystem executes it through the router over the bus and surfaces the
//! acknowledgement message as the assistant's reply — the text the user
//! reads while the transition runs.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::assistant::thread::{ThreadMessage, ThreadStore};
use crate::assistant::{AssistantProvider, AssistantTurn};
use crate::portal::RedirectAck;
use crate::supervisor::bus::{
    BusError, BusHandle, BusPayload, BusResult, ERR_INTERNAL, ERR_INVALID_REQUEST,
    ERR_METHOD_NOT_FOUND,
};
use crate::supervisor::dispatch::BusHandler;

pub struct AssistantSubsystem {
    provider: AssistantProvider,
    threads: Arc<ThreadStore>,
    suggestions: Vec<String>,
    system_prompt: String,
    bus: BusHandle,
}

impl AssistantSubsystem {
    pub fn new(
        provider: AssistantProvider,
        suggestions: Vec<String>,
        gateway_name: &str,
        bus: BusHandle,
    ) -> Self {
        Self {
            provider,
            threads: Arc::new(ThreadStore::new()),
            suggestions,
            system_prompt: build_system_prompt(gateway_name),
            bus,
        }
    }
}

fn build_system_prompt(gateway_name: &str) -> String {
    format!(
        "You are the {gateway_name} assistant. Greet users briefly, work out which \
         healthcare portal they need, and call the access_portal tool as soon as their \
         intent is clear. Ask one short clarifying question when it is not. Never give \
         medical advice — your only job is getting people to the right portal."
    )
}

impl BusHandler for AssistantSubsystem {
    fn prefix(&self) -> &str {
        "assistant"
    }

    /// Route an `assistant/*` request. For `send`, ownership of `reply_tx`
    /// moves into a spawned task — the supervisor loop returns immediately.
    fn handle_request(&self, method: &str, payload: BusPayload, reply_tx: oneshot::Sender<BusResult>) {
        match method {
            "assistant/send" => match payload {
                BusPayload::UserMessage { channel_id, content } => {
                    let provider = self.provider.clone();
                    let threads = Arc::clone(&self.threads);
                    let system_prompt = self.system_prompt.clone();
                    let bus = self.bus.clone();
                    debug!(%channel_id, "dispatching to assistant provider");
                    tokio::spawn(async move {
                        let result = run_turn(
                            provider,
                            threads,
                            system_prompt,
                            bus,
                            channel_id,
                            content,
                        )
                        .await;
                        let _ = reply_tx.send(result);
                    });
                }
                _ => {
                    let _ = reply_tx.send(Err(BusError::new(
                        ERR_INVALID_REQUEST,
                        "expected UserMessage payload",
                    )));
                }
            },
            "assistant/thread" => match payload {
                BusPayload::ThreadQuery { channel_id } => {
                    let _ = reply_tx.send(Ok(BusPayload::ThreadSnapshot {
                        messages: self.threads.snapshot(&channel_id),
                    }));
                }
                _ => {
                    let _ = reply_tx.send(Err(BusError::new(
                        ERR_INVALID_REQUEST,
                        "expected ThreadQuery payload",
                    )));
                }
            },
            "assistant/suggestions" => {
                let _ = reply_tx.send(Ok(BusPayload::Suggestions {
                    items: self.suggestions.clone(),
                }));
            }
            other => {
                let _ = reply_tx.send(Err(BusError::new(
                    ERR_METHOD_NOT_FOUND,
                    format!("method not found: {other}"),
                )));
            }
        }
    }
}

/// One full conversational turn: append the user message, run the provider,
/// execute a tool invocation if the service made one, append and return the
/// assistant's reply.
async fn run_turn(
    provider: AssistantProvider,
    threads: Arc<ThreadStore>,
    system_prompt: String,
    bus: BusHandle,
    channel_id: String,
    content: String,
) -> BusResult {
    let history = threads.snapshot(&channel_id);
    threads.append(&channel_id, ThreadMessage::user(&content));

    let turn = provider
        .complete(Some(&system_prompt), &history, &content)
        .await
        .map_err(|e| {
            warn!(%channel_id, error = %e, "assistant provider failed");
            BusError::new(ERR_INTERNAL, e.to_string())
        })?;

    match turn {
        AssistantTurn::Text(text) => {
            threads.append(&channel_id, ThreadMessage::assistant(&text));
            Ok(BusPayload::AssistantReply {
                channel_id,
                content: text,
                redirect: None,
            })
        }
        AssistantTurn::Invoke(invocation) => {
            debug!(%channel_id, tool = %invocation.name, "service invoked a tool");
            let ack = execute_tool(&bus, &channel_id, invocation.name, invocation.args_json).await?;
            threads.append(&channel_id, ThreadMessage::assistant(&ack.message));
            Ok(BusPayload::AssistantReply {
                channel_id,
                content: ack.message.clone(),
                redirect: Some(ack),
            })
        }
    }
}

/// Execute a tool invocation through the router and parse its
/// acknowledgement.
async fn execute_tool(
    bus: &BusHandle,
    channel_id: &str,
    tool: String,
    args_json: String,
) -> Result<RedirectAck, BusError> {
    let payload = BusPayload::ToolRequest {
        tool,
        args_json,
        channel_id: channel_id.to_string(),
    };

    match bus.request("router/execute", payload).await {
        Err(e) => Err(BusError::new(ERR_INTERNAL, format!("bus error: {e}"))),
        Ok(Err(e)) => Err(e),
        Ok(Ok(BusPayload::ToolResponse { ok: true, data_json: Some(json), .. })) => {
            serde_json::from_str(&json)
                .map_err(|e| BusError::new(ERR_INTERNAL, format!("malformed tool ack: {e}")))
        }
        Ok(Ok(BusPayload::ToolResponse { error, .. })) => Err(BusError::new(
            ERR_INVALID_REQUEST,
            error.unwrap_or_else(|| "tool execution rejected".to_string()),
        )),
        Ok(Ok(_)) => Err(BusError::new(ERR_INTERNAL, "unexpected reply payload")),
    }
}
