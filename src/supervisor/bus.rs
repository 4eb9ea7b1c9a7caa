//! Supervisor event bus — typed request/notification channel between comms
//! channels and subsystems.
//!
//! Channels and subsystems never hold references to each other; everything
//! crosses the bus as a [`BusMessage`] routed by the supervisor loop.
//! Requests carry a oneshot reply slot; notifications are fire-and-forget.

use tokio::sync::{mpsc, oneshot};

use crate::assistant::thread::ThreadMessage;
use crate::portal::RedirectAck;

// ── Error codes ───────────────────────────────────────────────────────────────

pub const ERR_INVALID_REQUEST: i32 = -32600;
pub const ERR_METHOD_NOT_FOUND: i32 = -32601;
pub const ERR_INTERNAL: i32 = -32000;

/// Structured error carried in bus replies.
#[derive(Debug, Clone)]
pub struct BusError {
    pub code: i32,
    pub message: String,
}

impl BusError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for BusError {}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Typed payloads exchanged over the bus.
///
/// One enum for both directions keeps routing generic; each subsystem
/// rejects payload shapes it does not understand with
/// [`ERR_INVALID_REQUEST`].
#[derive(Debug, Clone)]
pub enum BusPayload {
    /// A user message submitted on a comms channel.
    UserMessage { channel_id: String, content: String },
    /// The assistant's reply, with the redirect acknowledgement when the
    /// service invoked the portal tool on this turn.
    AssistantReply {
        channel_id: String,
        content: String,
        redirect: Option<RedirectAck>,
    },
    /// Ask the assistant subsystem for a channel's thread snapshot.
    ThreadQuery { channel_id: String },
    /// Ordered copy of a channel's conversation thread.
    ThreadSnapshot { messages: Vec<ThreadMessage> },
    /// Ask the assistant subsystem for the suggestion strip.
    SuggestionsQuery,
    /// The suggestion strip.
    Suggestions { items: Vec<String> },
    /// A tool invocation the assistant service decided to make.
    ToolRequest {
        tool: String,
        args_json: String,
        channel_id: String,
    },
    /// Result of executing a tool.
    ToolResponse {
        tool: String,
        ok: bool,
        data_json: Option<String>,
        error: Option<String>,
    },
    /// A comms channel has torn down; pending per-channel work must stop.
    ChannelClosed { channel_id: String },
}

pub type BusResult = Result<BusPayload, BusError>;

/// A message travelling over the supervisor bus.
pub enum BusMessage {
    /// Expects a reply through `reply_tx`.
    Request {
        method: String,
        payload: BusPayload,
        reply_tx: oneshot::Sender<BusResult>,
    },
    /// Fire-and-forget.
    Notification { method: String, payload: BusPayload },
}

// ── Bus ───────────────────────────────────────────────────────────────────────

/// Owns the supervisor-side receiving end.
pub struct SupervisorBus {
    /// Supervisor receives inbound messages here.
    pub rx: mpsc::Receiver<BusMessage>,
    handle: BusHandle,
}

impl SupervisorBus {
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        Self { rx, handle: BusHandle { tx } }
    }

    /// Cloneable sender given to channels and subsystems.
    pub fn handle(&self) -> BusHandle {
        self.handle.clone()
    }
}

/// Cloneable capability to submit bus messages.
#[derive(Clone)]
pub struct BusHandle {
    tx: mpsc::Sender<BusMessage>,
}

impl BusHandle {
    /// Send a request and await its reply.
    ///
    /// The outer `Err` is a transport failure (bus closed, reply dropped);
    /// the inner [`BusResult`] is the subsystem's answer.
    pub async fn request(&self, method: &str, payload: BusPayload) -> Result<BusResult, BusError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BusMessage::Request {
                method: method.to_string(),
                payload,
                reply_tx,
            })
            .await
            .map_err(|_| BusError::new(ERR_INTERNAL, "supervisor bus closed"))?;
        reply_rx
            .await
            .map_err(|_| BusError::new(ERR_INTERNAL, "reply slot dropped"))
    }

    /// Send a fire-and-forget notification. Errors are swallowed — a closed
    /// bus means the supervisor is already gone.
    pub async fn notify(&self, method: &str, payload: BusPayload) {
        let _ = self
            .tx
            .send(BusMessage::Notification {
                method: method.to_string(),
                payload,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_error_display_includes_code() {
        let e = BusError::new(ERR_METHOD_NOT_FOUND, "method not found: x");
        assert!(e.to_string().contains("-32601"));
        assert!(e.to_string().contains("method not found"));
    }

    #[tokio::test]
    async fn request_on_closed_bus_is_transport_error() {
        let bus = SupervisorBus::new(4);
        let handle = bus.handle();
        drop(bus);
        let result = handle
            .request("assistant/send", BusPayload::SuggestionsQuery)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn request_reaches_supervisor_side() {
        let mut bus = SupervisorBus::new(4);
        let handle = bus.handle();

        tokio::spawn(async move {
            match bus.rx.recv().await {
                Some(BusMessage::Request { method, reply_tx, .. }) => {
                    assert_eq!(method, "assistant/suggestions");
                    let _ = reply_tx.send(Ok(BusPayload::Suggestions { items: vec![] }));
                }
                _ => panic!("expected request"),
            }
        });

        let reply = handle
            .request("assistant/suggestions", BusPayload::SuggestionsQuery)
            .await
            .unwrap();
        assert!(matches!(reply, Ok(BusPayload::Suggestions { .. })));
    }
}
