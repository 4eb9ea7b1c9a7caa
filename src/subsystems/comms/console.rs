//! Console comms channel — the gateway's landing chat surface on a terminal.
//!
//! Reads composer lines from stdin, sends submissions to the assistant, and
//! renders one of two views derived from thread contents: the empty-state
//! landing or the threaded conversation. A redirect acknowledgement switches
//! the channel into the transition screen until the router's navigation
//! event fires, then the portal view is shown and the channel exits — the
//! landing surface is gone once the user has been routed.
//!
//! All supervisor communication goes through [`CommsState`] — this module
//! has no direct bus access. Runs until the `shutdown` token is cancelled
//! (Ctrl-C), stdin closes, or navigation completes.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assistant::thread::{Role, ThreadMessage};
use crate::config::SurfaceConfig;
use crate::error::AppError;
use crate::portal::{NavigationEvent, Portal};
use crate::subsystems::runtime::{Component, ComponentFuture};

use super::state::{CommsEvent, CommsState};
use super::surface::{Composer, SurfaceView, view_for};

/// Render width for the composer height calculation.
const CONSOLE_WIDTH: usize = 80;

// ── ConsoleChannel ───────────────────────────────────────────────────────────

/// A console channel instance.  Multiple instances would each get a unique id.
pub struct ConsoleChannel {
    channel_id: String,
    state: Arc<CommsState>,
    surface: SurfaceConfig,
}

impl ConsoleChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>, surface: SurfaceConfig) -> Self {
        Self { channel_id: channel_id.into(), state, surface }
    }
}

impl Component for ConsoleChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_console(self.channel_id, self.state, self.surface, shutdown))
    }
}

// ── run_console ──────────────────────────────────────────────────────────────

async fn run_console(
    channel_id: String,
    state: Arc<CommsState>,
    surface: SurfaceConfig,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "console channel started — type a message and press Enter. Ctrl-C to quit.");

    // Subscribe before the first send so no navigation event can be missed.
    let mut navigations = state.subscribe_navigations();

    let suggestions = state.suggestions().await.unwrap_or_else(|e| {
        warn!(%channel_id, "suggestions unavailable: {e}");
        Vec::new()
    });

    render_landing(&surface);

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut composer = Composer::new();

    loop {
        render_prompt(&composer);

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!("\n[console] shutdown signal received — closing channel");
                info!("console channel shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("console stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        // Blank input never sends; continuation lines keep
                        // accumulating the draft.
                        let Some(submission) = composer.push_line(&input) else {
                            continue;
                        };

                        debug!(%channel_id, chars = submission.len(), "console submission");

                        let was_landing =
                            current_view(&state, &channel_id).await == SurfaceView::Landing;

                        match state.send_message(&channel_id, submission).await {
                            Err(e) => {
                                println!("! {e}");
                                warn!(%channel_id, "send_message error: {e}");
                            }
                            Ok(reply) => {
                                if was_landing {
                                    render_thread_header(&surface);
                                }
                                render_exchange(&state, &channel_id, &suggestions).await;

                                if let Some(ack) = reply.redirect {
                                    let navigated = await_navigation(
                                        &channel_id,
                                        ack.target,
                                        &mut navigations,
                                        &shutdown,
                                    )
                                    .await;
                                    if navigated {
                                        state.report_event(CommsEvent::ChannelShutdown { channel_id });
                                        return Ok(());
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}

/// Derive the current view from the thread — never stored.
async fn current_view(state: &Arc<CommsState>, channel_id: &str) -> SurfaceView {
    let len = state
        .thread_snapshot(channel_id)
        .await
        .map(|t| t.len())
        .unwrap_or(0);
    view_for(len)
}

/// Show the transition screen, then block until the router's navigation
/// event for this channel fires or shutdown wins.
///
/// Returns `true` when navigation completed (the channel is done), `false`
/// on shutdown or a closed event stream.
async fn await_navigation(
    channel_id: &str,
    target: Portal,
    navigations: &mut broadcast::Receiver<NavigationEvent>,
    shutdown: &CancellationToken,
) -> bool {
    render_transition(target);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(%channel_id, "shutdown during transition — navigation abandoned");
                return false;
            }

            event = navigations.recv() => match event {
                Ok(ev) if ev.channel_id == channel_id => {
                    render_portal(ev.portal);
                    return true;
                }
                Ok(_) => continue, // another channel's navigation
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%channel_id, skipped, "navigation events lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!(%channel_id, "navigation stream closed during transition");
                    return false;
                }
            }
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────────────────

fn render_landing(surface: &SurfaceConfig) {
    println!("─────────────────────────────────────────────");
    println!(" {}", surface.title);
    println!(" {}", surface.tagline);
    println!("─────────────────────────────────────────────");
    println!(" {}", surface.placeholder);
    println!(" [mic] voice input · end a line with \\ to continue it");
    println!();
}

fn render_thread_header(surface: &SurfaceConfig) {
    println!();
    println!("═══ {} ═══", surface.title);
}

/// Render the latest exchange from the thread snapshot, plus the suggestion
/// strip under the assistant's reply.
async fn render_exchange(state: &Arc<CommsState>, channel_id: &str, suggestions: &[String]) {
    let thread = match state.thread_snapshot(channel_id).await {
        Ok(thread) => thread,
        Err(e) => {
            warn!(%channel_id, "thread snapshot unavailable: {e}");
            return;
        }
    };

    // Everything from the latest user message onward is this exchange.
    let start = thread
        .iter()
        .rposition(|m| m.role == Role::User)
        .unwrap_or(0);
    for message in &thread[start..] {
        render_message(message);
    }

    if !suggestions.is_empty() {
        println!("  try: {}", suggestions.join(" · "));
    }
}

fn render_message(message: &ThreadMessage) {
    let tag = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    for line in message.content.lines() {
        println!("{tag:>9} │ {line}");
    }
}

fn render_transition(target: Portal) {
    println!();
    println!("  ◌ Generating interface...");
    println!("  Configuring the {} portal for your session.", target.display_name());
}

fn render_portal(portal: Portal) {
    println!();
    println!("═════════════════════════════════════════════");
    println!(" {} portal — {}", portal.display_name(), portal.route());
    println!("═════════════════════════════════════════════");
}

fn render_prompt(composer: &Composer) {
    use std::io::Write as _;
    if composer.draft().is_empty() {
        print!("> ");
    } else {
        // Pending draft: show its rendered height so the composer visibly
        // grows with content.
        print!("…({} rows)> ", composer.rows(CONSOLE_WIDTH));
    }
    let _ = std::io::stdout().flush();
}
