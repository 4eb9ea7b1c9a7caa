//! Comms subsystem — manages the gateway's chat surfaces.
//!
//! # Architecture
//!
//! Each channel (console, HTTP) implements [`Component`] and is spawned as
//! an independent concurrent task by [`start`] via [`spawn_components`].
//! Channels capture their shared
//! [`Arc<CommsState>`] at construction time — no state is passed through the
//! generic `Component::run` signature.
//!
//! An intra-subsystem [`mpsc`] channel lets running channels signal the
//! comms manager (lifecycle events).  The manager forwards channel teardown
//! to the router over the bus so a channel's pending transition is cancelled
//! the moment its surface is gone.
//!
//! # Starting
//!
//! [`start`] is synchronous — it returns a [`SubsystemHandle`] as soon as
//! the tasks are spawned.  The caller decides when (or whether) to await it.

mod state;

#[cfg(feature = "channel-console")]
pub mod console;
#[cfg(feature = "channel-http")]
pub mod http;
pub mod surface;

pub use state::{ChannelReply, CommsEvent, CommsState};

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::portal::NavigationEvent;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};
use crate::supervisor::bus::{BusHandle, BusPayload};

// ── start ────────────────────────────────────────────────────────────────────

/// Spawn all configured comms channels and return a [`SubsystemHandle`].
///
/// Channels start immediately.  If any channel exits with an error the shared
/// `shutdown` token is cancelled so siblings stop cooperatively.  The handle
/// resolves when all channels have exited.
pub fn start(
    config: &Config,
    bus: BusHandle,
    navigations: broadcast::Sender<NavigationEvent>,
    shutdown: CancellationToken,
) -> SubsystemHandle {
    // Intra-subsystem event channel: channels → manager.
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(32);
    let state = Arc::new(CommsState::new(bus.clone(), event_tx, navigations));

    // Build the component list from config.
    // Each channel captures Arc<CommsState> at construction; the generic
    // Component::run signature only needs the shutdown token.
    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-console")]
    {
        if config.comms_console_should_load() {
            info!("loading console channel");
            components.push(Box::new(console::ConsoleChannel::new(
                "console0",
                state.clone(),
                config.surface.clone(),
            )));
        }
    }

    #[cfg(feature = "channel-http")]
    {
        if config.comms_http_should_load() {
            info!("loading http channel");
            components.push(Box::new(http::HttpChannel::new(
                "http0",
                config.comms.http.bind.clone(),
                state.clone(),
                config.surface.clone(),
            )));
        }
    }

    if components.is_empty() {
        info!("no comms channels configured — waiting for shutdown");
    }

    // Drain channel events until all channel senders are dropped (i.e. all
    // channels have exited). Teardown is forwarded to the router so pending
    // navigation timers die with their channel.
    tokio::spawn(async move {
        let mut rx = event_rx;
        while let Some(event) = rx.recv().await {
            match event {
                CommsEvent::ChannelShutdown { channel_id } => {
                    debug!(%channel_id, "channel reported shutdown");
                    bus.notify(
                        "router/teardown",
                        BusPayload::ChannelClosed { channel_id },
                    )
                    .await;
                }
            }
        }
    });

    // Delegate component lifecycle (JoinSet + error propagation + shutdown
    // cancellation) entirely to the generic runtime helper.
    spawn_components(components, shutdown)
}
