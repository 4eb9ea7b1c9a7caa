//! Shared state for the comms subsystem — capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and are restricted to the typed
//! methods below.  The raw [`BusHandle`] is private; channels cannot call
//! arbitrary bus methods or supervisor internals.
//!
//! # Intra-subsystem events
//!
//! [`CommsState::report_event`] lets a running channel signal the comms
//! subsystem manager (e.g. "I shut down") without going through the
//! supervisor bus.  The manager owns the receiver end and forwards channel
//! teardown to the router so pending transitions die with their channel.

use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::assistant::thread::ThreadMessage;
use crate::error::AppError;
use crate::portal::{NavigationEvent, RedirectAck};
use crate::supervisor::bus::{BusHandle, BusPayload};

// ── Events ────────────────────────────────────────────────────────────────────

/// Events a channel sends back to the comms subsystem manager.
#[derive(Debug)]
pub enum CommsEvent {
    /// Channel has stopped (clean exit, EOF, or navigation completed).
    ChannelShutdown { channel_id: String },
}

/// The assistant's answer to one submitted message.
#[derive(Debug, Clone)]
pub struct ChannelReply {
    pub content: String,
    /// Present when the service routed the user on this turn.
    pub redirect: Option<RedirectAck>,
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared state passed as `Arc<CommsState>` to every channel task.
pub struct CommsState {
    /// Supervisor bus — private so channels can't call arbitrary methods.
    bus: BusHandle,
    /// Back-channel to the comms subsystem manager.
    event_tx: mpsc::Sender<CommsEvent>,
    /// Router navigation events; channels subscribe and filter their own id.
    navigations: broadcast::Sender<NavigationEvent>,
}

impl CommsState {
    pub fn new(
        bus: BusHandle,
        event_tx: mpsc::Sender<CommsEvent>,
        navigations: broadcast::Sender<NavigationEvent>,
    ) -> Self {
        Self { bus, event_tx, navigations }
    }

    /// Send `content` from `channel_id` to the assistant and await the reply.
    ///
    /// This is the primary outbound path for all comms channels.  Channels
    /// do not need to know about the supervisor bus protocol.
    pub async fn send_message(
        &self,
        channel_id: &str,
        content: String,
    ) -> Result<ChannelReply, AppError> {
        let payload = BusPayload::UserMessage {
            channel_id: channel_id.to_string(),
            content,
        };

        match self.bus.request("assistant/send", payload).await {
            Err(e) => Err(AppError::Comms(format!("bus error: {e}"))),
            Ok(Err(e)) => Err(AppError::Comms(format!(
                "assistant error {}: {}",
                e.code, e.message
            ))),
            Ok(Ok(BusPayload::AssistantReply { content, redirect, .. })) => {
                Ok(ChannelReply { content, redirect })
            }
            Ok(Ok(_)) => Err(AppError::Comms("unexpected reply payload".to_string())),
        }
    }

    /// Ordered copy of the channel's conversation thread.
    pub async fn thread_snapshot(&self, channel_id: &str) -> Result<Vec<ThreadMessage>, AppError> {
        let payload = BusPayload::ThreadQuery {
            channel_id: channel_id.to_string(),
        };

        match self.bus.request("assistant/thread", payload).await {
            Err(e) => Err(AppError::Comms(format!("bus error: {e}"))),
            Ok(Err(e)) => Err(AppError::Comms(format!(
                "assistant error {}: {}",
                e.code, e.message
            ))),
            Ok(Ok(BusPayload::ThreadSnapshot { messages })) => Ok(messages),
            Ok(Ok(_)) => Err(AppError::Comms("unexpected reply payload".to_string())),
        }
    }

    /// The configured suggestion strip.
    pub async fn suggestions(&self) -> Result<Vec<String>, AppError> {
        match self
            .bus
            .request("assistant/suggestions", BusPayload::SuggestionsQuery)
            .await
        {
            Err(e) => Err(AppError::Comms(format!("bus error: {e}"))),
            Ok(Err(e)) => Err(AppError::Comms(format!(
                "assistant error {}: {}",
                e.code, e.message
            ))),
            Ok(Ok(BusPayload::Suggestions { items })) => Ok(items),
            Ok(Ok(_)) => Err(AppError::Comms("unexpected reply payload".to_string())),
        }
    }

    /// Subscribe to router navigation events.
    pub fn subscribe_navigations(&self) -> broadcast::Receiver<NavigationEvent> {
        self.navigations.subscribe()
    }

    /// Report an event to the comms subsystem manager.
    ///
    /// Non-blocking: drops the event and logs a warning if the manager is not
    /// keeping up (channel full) or has already exited (closed).
    pub fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("comms event dropped: {e}");
        }
    }
}
