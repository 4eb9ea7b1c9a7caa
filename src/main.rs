//! Nexus Health Gateway — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at the configured level
//!   4. Build the assistant provider — halts here if the hosted provider
//!      is selected and NEXUS_API_KEY is absent
//!   5. Wire supervisor, subsystems, and comms channels (explicit DI)
//!   6. Run until Ctrl-C or all channels exit

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nexus_gateway::assistant::providers;
use nexus_gateway::error::AppError;
use nexus_gateway::portal::NavigationEvent;
use nexus_gateway::subsystems::assistant::AssistantSubsystem;
use nexus_gateway::subsystems::comms;
use nexus_gateway::subsystems::router::{self, RouterSubsystem};
use nexus_gateway::supervisor::{self, bus::SupervisorBus, dispatch::BusHandler};
use nexus_gateway::{config, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    info!(
        gateway = %config.gateway_name,
        provider = %config.assistant.provider,
        transition_delay_ms = config.transition_delay.as_millis() as u64,
        "config loaded"
    );

    // The single hard startup failure: hosted provider without an API key.
    let provider = providers::build(
        &config.assistant,
        config.api_key.clone(),
        vec![router::tool_definition()],
    )?;

    let bus = SupervisorBus::new(64);
    let handle = bus.handle();
    let shutdown = CancellationToken::new();

    // Navigation events flow router → channels.
    let (nav_tx, _) = broadcast::channel::<NavigationEvent>(16);

    let handlers: Vec<Box<dyn BusHandler>> = vec![
        Box::new(AssistantSubsystem::new(
            provider,
            config.surface.suggestions.clone(),
            &config.gateway_name,
            handle.clone(),
        )),
        Box::new(RouterSubsystem::new(
            config.transition_delay,
            nav_tx.clone(),
            shutdown.clone(),
        )),
    ];

    let supervisor_task = tokio::spawn(supervisor::run(bus, shutdown.clone(), handlers));

    let comms_handle = comms::start(&config, handle, nav_tx, shutdown.clone());

    // Ctrl-C cancels the shared token; every channel and pending navigation
    // timer stops cooperatively.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received — shutting down");
                shutdown.cancel();
            }
        });
    }

    // Resolves when all channels exit: navigation completed, stdin closed,
    // or shutdown. A channel error has already cancelled the token.
    let result = comms_handle.join().await;
    if let Err(e) = &result {
        warn!("comms subsystem exited with error: {e}");
    }

    shutdown.cancel();
    let _ = supervisor_task.await;
    result
}
