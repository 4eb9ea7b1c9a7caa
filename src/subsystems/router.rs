//! Router subsystem — owns the `access_portal` tool and transition state.
//!
//! The assistant service decides *when* to route; this subsystem decides
//! *what happens* when it does: it validates the classified role, records
//! the pending transition, schedules the fixed-delay navigation, and returns
//! the structured acknowledgement the service (and the chat surface) see.
//!
//! # Timer lifetime
//!
//! Navigation timers are never fire-and-forget. Each pending transition
//! holds a child [`CancellationToken`] of the gateway shutdown token;
//! channel teardown (`router/teardown`) and superseding invocations cancel
//! it. Exactly one navigation fires per surviving transition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assistant::ToolDefinition;
use crate::portal::{NavigationEvent, Portal, RedirectAck};
use crate::supervisor::bus::{
    BusError, BusPayload, BusResult, ERR_INVALID_REQUEST, ERR_METHOD_NOT_FOUND,
};
use crate::supervisor::dispatch::BusHandler;

/// Name of the single tool the gateway exposes to the assistant service.
pub const TOOL_ACCESS_PORTAL: &str = "access_portal";

/// Definition of `access_portal`, serialized into the hosted provider's
/// `tools` array. The schema's enum is the closed role set; the description
/// carries the classification rules the service applies.
pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_ACCESS_PORTAL.to_string(),
        description: "Route the user to the correct healthcare portal based on their role or intent."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "role": {
                    "type": "string",
                    "enum": ["doctor", "patient", "lab", "pharmacy"],
                    "description": "The target portal. Rules:\n\
                        - 'doctor': for EHR, providers, analysis.\n\
                        - 'patient': for symptoms, pain, appointments, or personal health questions.\n\
                        - 'lab': for test results.\n\
                        - 'pharmacy': for medications."
                }
            },
            "required": ["role"]
        }),
    }
}

/// Arguments of an `access_portal` invocation. Deserializing into [`Portal`]
/// is what enforces the closed-set invariant — the router never sees a role
/// outside the enum.
#[derive(Debug, Deserialize)]
struct AccessPortalArgs {
    role: Portal,
}

// ── Subsystem ─────────────────────────────────────────────────────────────────

struct PendingTransition {
    portal: Portal,
    guard: CancellationToken,
    /// Identifies this transition across the sleep/lock gap in the timer
    /// task; a superseding transition carries a higher sequence.
    seq: u64,
}

pub struct RouterSubsystem {
    delay: Duration,
    navigations: broadcast::Sender<NavigationEvent>,
    pending: Arc<Mutex<HashMap<String, PendingTransition>>>,
    next_seq: AtomicU64,
    /// Parent for all timer guards — gateway shutdown cancels every pending
    /// transition at once.
    shutdown: CancellationToken,
}

impl RouterSubsystem {
    pub fn new(
        delay: Duration,
        navigations: broadcast::Sender<NavigationEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            delay,
            navigations,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
            shutdown,
        }
    }

    /// The portal a channel is currently transitioning to, if any.
    pub fn pending_target(&self, channel_id: &str) -> Option<Portal> {
        let pending = self.pending.lock().expect("transition table poisoned");
        pending.get(channel_id).map(|t| t.portal)
    }

    /// Execute `access_portal`: record transition state, start the scoped
    /// navigation timer, return the acknowledgement.
    ///
    /// A transition already pending for the channel is superseded — its
    /// timer is cancelled and the new target replaces it (latest wins).
    fn schedule(&self, channel_id: &str, portal: Portal) -> RedirectAck {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let guard = self.shutdown.child_token();

        {
            let mut pending = self.pending.lock().expect("transition table poisoned");
            if let Some(prev) = pending.remove(channel_id) {
                info!(
                    %channel_id,
                    superseded = %prev.portal,
                    replacement = %portal,
                    "superseding pending transition"
                );
                prev.guard.cancel();
            }
            pending.insert(
                channel_id.to_string(),
                PendingTransition { portal, guard: guard.clone(), seq },
            );
        }

        let delay = self.delay;
        let navigations = self.navigations.clone();
        let pending = Arc::clone(&self.pending);
        let channel_id = channel_id.to_string();

        tokio::spawn({
            let channel_id = channel_id.clone();
            async move {
            tokio::select! {
                biased;

                _ = guard.cancelled() => {
                    debug!(%channel_id, %portal, "navigation timer cancelled");
                }

                _ = tokio::time::sleep(delay) => {
                    // A superseding transition may land between the sleep
                    // elapsing and this lock; the sequence number keeps the
                    // newer transition in place.
                    let still_current = {
                        let mut pending = pending.lock().expect("transition table poisoned");
                        match pending.get(&channel_id) {
                            Some(t) if t.seq == seq => {
                                pending.remove(&channel_id);
                                true
                            }
                            _ => false,
                        }
                    };
                    if still_current {
                        info!(%channel_id, %portal, route = portal.route(), "navigation fired");
                        let _ = navigations.send(NavigationEvent {
                            channel_id: channel_id.clone(),
                            portal,
                        });
                    }
                }
            }
            }
        });

        debug!(%channel_id, %portal, delay_ms = delay.as_millis() as u64, "transition scheduled");
        RedirectAck::new(portal, delay.as_millis() as u64)
    }

    /// Cancel and discard a channel's pending transition, if any.
    fn cancel_pending(&self, channel_id: &str) {
        let mut pending = self.pending.lock().expect("transition table poisoned");
        if let Some(t) = pending.remove(channel_id) {
            debug!(%channel_id, portal = %t.portal, "cancelling pending transition");
            t.guard.cancel();
        }
    }
}

impl BusHandler for RouterSubsystem {
    fn prefix(&self) -> &str {
        "router"
    }

    fn handle_request(&self, method: &str, payload: BusPayload, reply_tx: oneshot::Sender<BusResult>) {
        if method != "router/execute" {
            let _ = reply_tx.send(Err(BusError::new(
                ERR_METHOD_NOT_FOUND,
                format!("method not found: {method}"),
            )));
            return;
        }

        match payload {
            BusPayload::ToolRequest { tool, args_json, channel_id } => {
                if tool != TOOL_ACCESS_PORTAL {
                    let _ = reply_tx.send(Err(BusError::new(
                        ERR_METHOD_NOT_FOUND,
                        format!("tool not found: {tool}"),
                    )));
                    return;
                }

                let response = match serde_json::from_str::<AccessPortalArgs>(&args_json) {
                    Ok(args) => {
                        let ack = self.schedule(&channel_id, args.role);
                        let data_json = serde_json::to_string(&ack)
                            .unwrap_or_else(|_| "{}".to_string());
                        BusPayload::ToolResponse {
                            tool,
                            ok: true,
                            data_json: Some(data_json),
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!(%channel_id, error = %e, "rejecting access_portal arguments");
                        BusPayload::ToolResponse {
                            tool,
                            ok: false,
                            data_json: None,
                            error: Some(format!("invalid arguments: {e}")),
                        }
                    }
                };
                let _ = reply_tx.send(Ok(response));
            }
            _ => {
                let _ = reply_tx.send(Err(BusError::new(
                    ERR_INVALID_REQUEST,
                    "expected ToolRequest payload",
                )));
            }
        }
    }

    fn handle_notification(&self, method: &str, payload: BusPayload) {
        if method == "router/teardown"
            && let BusPayload::ChannelClosed { channel_id } = payload
        {
            self.cancel_pending(&channel_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_with(
        delay_ms: u64,
    ) -> (RouterSubsystem, broadcast::Receiver<NavigationEvent>, CancellationToken) {
        let (nav_tx, nav_rx) = broadcast::channel(8);
        let shutdown = CancellationToken::new();
        let router = RouterSubsystem::new(Duration::from_millis(delay_ms), nav_tx, shutdown.clone());
        (router, nav_rx, shutdown)
    }

    fn execute(router: &RouterSubsystem, channel_id: &str, args_json: &str) -> BusResult {
        let (reply_tx, mut reply_rx) = oneshot::channel();
        router.handle_request(
            "router/execute",
            BusPayload::ToolRequest {
                tool: TOOL_ACCESS_PORTAL.to_string(),
                args_json: args_json.to_string(),
                channel_id: channel_id.to_string(),
            },
            reply_tx,
        );
        reply_rx.try_recv().expect("router resolves synchronously")
    }

    fn ack_from(result: BusResult) -> RedirectAck {
        match result {
            Ok(BusPayload::ToolResponse { ok: true, data_json: Some(json), .. }) => {
                serde_json::from_str(&json).unwrap()
            }
            other => panic!("expected successful tool response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn each_role_acks_with_matching_target_and_route() {
        let (router, _nav_rx, _shutdown) = router_with(1500);
        for portal in Portal::ALL {
            let args = format!("{{\"role\":\"{}\"}}", portal.as_str());
            let ack = ack_from(execute(&router, "console0", &args));
            assert_eq!(ack.action, "redirect");
            assert_eq!(ack.target, portal);
            assert_eq!(ack.route, portal.route());
            assert_eq!(ack.delay_ms, 1500);
            assert!(ack.message.contains(portal.long_name()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_fires_after_exact_delay() {
        let (router, mut nav_rx, _shutdown) = router_with(1500);
        execute(&router, "console0", "{\"role\":\"patient\"}");
        assert_eq!(router.pending_target("console0"), Some(Portal::Patient));

        tokio::time::sleep(Duration::from_millis(1499)).await;
        assert!(nav_rx.try_recv().is_err(), "navigation must not fire early");

        tokio::time::sleep(Duration::from_millis(2)).await;
        let ev = nav_rx.try_recv().expect("navigation fires after the delay");
        assert_eq!(ev.channel_id, "console0");
        assert_eq!(ev.portal, Portal::Patient);
        assert_eq!(router.pending_target("console0"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_invocation_cancels_prior_timer() {
        let (router, mut nav_rx, _shutdown) = router_with(1500);
        execute(&router, "console0", "{\"role\":\"doctor\"}");
        tokio::time::sleep(Duration::from_millis(500)).await;
        execute(&router, "console0", "{\"role\":\"lab\"}");
        assert_eq!(router.pending_target("console0"), Some(Portal::Lab));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let ev = nav_rx.try_recv().expect("one navigation fires");
        assert_eq!(ev.portal, Portal::Lab);
        assert!(nav_rx.try_recv().is_err(), "superseded timer must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_navigation() {
        let (router, mut nav_rx, _shutdown) = router_with(1500);
        execute(&router, "console0", "{\"role\":\"pharmacy\"}");

        router.handle_notification(
            "router/teardown",
            BusPayload::ChannelClosed { channel_id: "console0".to_string() },
        );
        assert_eq!(router.pending_target("console0"), None);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(nav_rx.try_recv().is_err(), "torn-down channel must not navigate");
    }

    #[tokio::test(start_paused = true)]
    async fn gateway_shutdown_cancels_all_timers() {
        let (router, mut nav_rx, shutdown) = router_with(1500);
        execute(&router, "console0", "{\"role\":\"lab\"}");
        execute(&router, "http0", "{\"role\":\"patient\"}");

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(nav_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_role_is_rejected_before_scheduling() {
        let (router, _nav_rx, _shutdown) = router_with(1500);
        match execute(&router, "console0", "{\"role\":\"nurse\"}") {
            Ok(BusPayload::ToolResponse { ok: false, error: Some(e), .. }) => {
                assert!(e.contains("invalid arguments"));
            }
            other => panic!("expected rejected tool response, got {other:?}"),
        }
        assert_eq!(router.pending_target("console0"), None);
    }

    #[tokio::test]
    async fn unknown_tool_is_method_not_found() {
        let (router, _nav_rx, _shutdown) = router_with(1500);
        let (reply_tx, mut reply_rx) = oneshot::channel();
        router.handle_request(
            "router/execute",
            BusPayload::ToolRequest {
                tool: "open_garage".to_string(),
                args_json: "{}".to_string(),
                channel_id: "console0".to_string(),
            },
            reply_tx,
        );
        let err = reply_rx.try_recv().unwrap().unwrap_err();
        assert_eq!(err.code, ERR_METHOD_NOT_FOUND);
    }

    #[test]
    fn tool_definition_enumerates_all_roles() {
        let def = tool_definition();
        assert_eq!(def.name, TOOL_ACCESS_PORTAL);
        let roles = def.parameters["properties"]["role"]["enum"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(roles, vec!["doctor", "patient", "lab", "pharmacy"]);
    }
}
