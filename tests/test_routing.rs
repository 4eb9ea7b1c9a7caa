//! End-to-end bus tests: user message → scripted classification → portal
//! tool → acknowledgement and scheduled navigation.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use nexus_gateway::assistant::AssistantProvider;
use nexus_gateway::assistant::providers::scripted::ScriptedProvider;
use nexus_gateway::portal::{NavigationEvent, Portal, RedirectAck};
use nexus_gateway::subsystems::assistant::AssistantSubsystem;
use nexus_gateway::subsystems::router::{RouterSubsystem, TOOL_ACCESS_PORTAL};
use nexus_gateway::supervisor;
use nexus_gateway::supervisor::bus::{BusHandle, BusPayload, SupervisorBus};
use nexus_gateway::supervisor::dispatch::BusHandler;

const DELAY_MS: u64 = 1500;

struct Gateway {
    bus: BusHandle,
    nav_rx: broadcast::Receiver<NavigationEvent>,
    shutdown: CancellationToken,
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Spin up the supervisor with the scripted assistant and the router — the
/// same wiring as `main`, minus the comms channels.
fn boot() -> Gateway {
    let bus = SupervisorBus::new(16);
    let handle = bus.handle();
    let shutdown = CancellationToken::new();
    let (nav_tx, nav_rx) = broadcast::channel::<NavigationEvent>(16);

    let handlers: Vec<Box<dyn BusHandler>> = vec![
        Box::new(AssistantSubsystem::new(
            AssistantProvider::Scripted(ScriptedProvider::new()),
            vec!["Show me my latest lab results".to_string()],
            "Nexus Health Gateway",
            handle.clone(),
        )),
        Box::new(RouterSubsystem::new(
            Duration::from_millis(DELAY_MS),
            nav_tx,
            shutdown.clone(),
        )),
    ];

    tokio::spawn(supervisor::run(bus, shutdown.clone(), handlers));

    Gateway { bus: handle, nav_rx, shutdown }
}

async fn send(gateway: &Gateway, channel_id: &str, content: &str) -> (String, Option<RedirectAck>) {
    let reply = gateway
        .bus
        .request(
            "assistant/send",
            BusPayload::UserMessage {
                channel_id: channel_id.to_string(),
                content: content.to_string(),
            },
        )
        .await
        .expect("bus alive")
        .expect("assistant replies");

    match reply {
        BusPayload::AssistantReply { content, redirect, .. } => (content, redirect),
        other => panic!("unexpected reply payload: {other:?}"),
    }
}

async fn thread_len(gateway: &Gateway, channel_id: &str) -> usize {
    let reply = gateway
        .bus
        .request(
            "assistant/thread",
            BusPayload::ThreadQuery { channel_id: channel_id.to_string() },
        )
        .await
        .expect("bus alive")
        .expect("thread query succeeds");
    match reply {
        BusPayload::ThreadSnapshot { messages } => messages.len(),
        other => panic!("unexpected reply payload: {other:?}"),
    }
}

#[tokio::test]
async fn routed_message_acks_with_matching_target() {
    let gateway = boot();

    let (content, redirect) = send(&gateway, "console0", "I'm having chest pain").await;
    let ack = redirect.expect("symptom intent routes to a portal");

    assert_eq!(ack.action, "redirect");
    assert_eq!(ack.target, Portal::Patient);
    assert_eq!(ack.route, "/demos/patient");
    assert_eq!(ack.delay_ms, DELAY_MS);
    assert!(ack.message.contains("patient"));
    assert_eq!(content, ack.message);
}

#[tokio::test]
async fn unmatched_message_gets_text_reply_and_no_redirect() {
    let gateway = boot();

    let (content, redirect) = send(&gateway, "console0", "good morning!").await;
    assert!(redirect.is_none());
    assert!(content.contains("portal"));
}

#[tokio::test]
async fn thread_grows_one_exchange_per_send() {
    let gateway = boot();

    assert_eq!(thread_len(&gateway, "console0").await, 0);
    send(&gateway, "console0", "good morning!").await;
    assert_eq!(thread_len(&gateway, "console0").await, 2);
    send(&gateway, "console0", "I need to refill a prescription").await;
    assert_eq!(thread_len(&gateway, "console0").await, 4);

    // Other channels are unaffected.
    assert_eq!(thread_len(&gateway, "http0").await, 0);
}

#[tokio::test(start_paused = true)]
async fn navigation_fires_on_the_routed_channel_after_the_delay() {
    let mut gateway = boot();

    let (_, redirect) = send(&gateway, "console0", "show me my lab results").await;
    assert_eq!(redirect.unwrap().target, Portal::Lab);

    tokio::time::sleep(Duration::from_millis(DELAY_MS - 1)).await;
    assert!(gateway.nav_rx.try_recv().is_err(), "must not navigate early");

    tokio::time::sleep(Duration::from_millis(2)).await;
    let ev = gateway.nav_rx.try_recv().expect("navigation fires");
    assert_eq!(ev.channel_id, "console0");
    assert_eq!(ev.portal, Portal::Lab);
}

#[tokio::test(start_paused = true)]
async fn second_classification_supersedes_pending_navigation() {
    let mut gateway = boot();

    send(&gateway, "console0", "open the EHR dashboard").await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    send(&gateway, "console0", "actually, I need my medication refilled").await;

    tokio::time::sleep(Duration::from_millis(DELAY_MS * 2)).await;
    let ev = gateway.nav_rx.try_recv().expect("exactly one navigation fires");
    assert_eq!(ev.portal, Portal::Pharmacy);
    assert!(gateway.nav_rx.try_recv().is_err(), "superseded timer must not fire");
}

#[tokio::test(start_paused = true)]
async fn channel_teardown_cancels_pending_navigation() {
    let mut gateway = boot();

    send(&gateway, "console0", "I'm having chest pain").await;
    gateway
        .bus
        .notify(
            "router/teardown",
            BusPayload::ChannelClosed { channel_id: "console0".to_string() },
        )
        .await;

    tokio::time::sleep(Duration::from_millis(DELAY_MS * 2)).await;
    assert!(gateway.nav_rx.try_recv().is_err(), "torn-down channel must not navigate");
}

#[tokio::test]
async fn every_role_round_trips_through_the_router() {
    let gateway = boot();

    for portal in Portal::ALL {
        let args = format!("{{\"role\":\"{}\"}}", portal.as_str());
        let reply = gateway
            .bus
            .request(
                "router/execute",
                BusPayload::ToolRequest {
                    tool: TOOL_ACCESS_PORTAL.to_string(),
                    args_json: args,
                    channel_id: "console0".to_string(),
                },
            )
            .await
            .expect("bus alive")
            .expect("tool executes");

        match reply {
            BusPayload::ToolResponse { ok: true, data_json: Some(json), .. } => {
                let ack: RedirectAck = serde_json::from_str(&json).unwrap();
                assert_eq!(ack.target, portal);
                assert_eq!(ack.route, portal.route());
                assert!(ack.message.contains(portal.long_name()));
            }
            other => panic!("unexpected reply payload: {other:?}"),
        }
    }
}

#[tokio::test]
async fn suggestions_are_served_over_the_bus() {
    let gateway = boot();

    let reply = gateway
        .bus
        .request("assistant/suggestions", BusPayload::SuggestionsQuery)
        .await
        .expect("bus alive")
        .expect("suggestions query succeeds");
    match reply {
        BusPayload::Suggestions { items } => {
            assert_eq!(items, vec!["Show me my latest lab results".to_string()]);
        }
        other => panic!("unexpected reply payload: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let gateway = boot();

    let result = gateway
        .bus
        .request("billing/charge", BusPayload::SuggestionsQuery)
        .await
        .expect("bus alive");
    let err = result.unwrap_err();
    assert!(err.message.contains("method not found"));
}
