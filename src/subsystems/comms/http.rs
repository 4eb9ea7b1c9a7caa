//! Axum-based HTTP channel — the chat surface as a JSON API plus the four
//! portal routes.
//!
//! Implements [`Component`] so it slots into the comms subsystem lifecycle:
//! `run()` drives the axum event loop; the shared [`CancellationToken`] is
//! wired to axum's graceful shutdown. Navigation on this surface is
//! client-side: the redirect acknowledgement gives the client the route and
//! delay, so no server-side navigation event is consumed here.
//!
//! ## URL layout
//!
//! ```text
//! GET  /api/health
//! POST /api/message
//! GET  /api/thread
//! GET  /api/suggestions
//! GET  /demos/{portal}        — the four fixed portal routes
//! GET  /favicon.ico           → 204
//! GET  /                      → landing page
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SurfaceConfig;
use crate::error::AppError;
use crate::portal::Portal;
use crate::subsystems::runtime::{Component, ComponentFuture};

use super::state::{CommsEvent, CommsState};

// ── Shared request state ──────────────────────────────────────────────────────

/// Axum router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone — all fields are reference-counted.
#[derive(Clone)]
pub struct HttpState {
    /// Channel identifier used in log spans and as the thread key.
    pub channel_id: Arc<str>,
    /// Comms subsystem capabilities (message routing, thread queries).
    pub comms: Arc<CommsState>,
    /// Surface copy rendered into the landing page.
    pub surface: Arc<SurfaceConfig>,
}

// ── HttpChannel ───────────────────────────────────────────────────────────────

pub struct HttpChannel {
    channel_id: String,
    bind_addr: String,
    state: Arc<CommsState>,
    surface: SurfaceConfig,
}

impl HttpChannel {
    pub fn new(
        channel_id: impl Into<String>,
        bind_addr: impl Into<String>,
        state: Arc<CommsState>,
        surface: SurfaceConfig,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            bind_addr: bind_addr.into(),
            state,
            surface,
        }
    }
}

impl Component for HttpChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_http(
            self.channel_id,
            self.bind_addr,
            self.state,
            self.surface,
            shutdown,
        ))
    }
}

// ── Server loop ───────────────────────────────────────────────────────────────

async fn run_http(
    channel_id: String,
    bind_addr: String,
    comms: Arc<CommsState>,
    surface: SurfaceConfig,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let http_state = HttpState {
        channel_id: Arc::from(channel_id.as_str()),
        comms: comms.clone(),
        surface: Arc::new(surface),
    };

    let router = build_router(http_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Comms(format!("http bind failed on {bind_addr}: {e}")))?;

    info!(%channel_id, %bind_addr, "http channel listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Comms(format!("http server error: {e}")))?;

    info!(%channel_id, "http channel shut down");
    comms.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the channel's route table. Public so handler tests can drive the
/// router directly with `tower::ServiceExt::oneshot`.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/message", post(message))
        .route("/api/thread", get(thread))
        .route("/api/suggestions", get(suggestions))
        .route("/demos/{portal}", get(portal_page))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/", get(landing))
        .with_state(state)
}

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MessageRequest {
    message: String,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/health
async fn health() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

/// POST /api/message
async fn message(State(state): State<HttpState>, Json(req): Json<MessageRequest>) -> Response {
    // Blank input never triggers a send.
    if req.message.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            json_error("blank_message", "message must not be blank"),
        )
            .into_response();
    }

    match tokio::time::timeout(
        Duration::from_secs(120),
        state.comms.send_message(&state.channel_id, req.message),
    )
    .await
    {
        Ok(Ok(reply)) => {
            let body = json!({
                "reply": reply.content,
                "redirect": reply.redirect,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(Err(e)) => {
            warn!(channel_id = %state.channel_id, "message send failed: {e}");
            (StatusCode::BAD_GATEWAY, json_error("internal", e)).into_response()
        }
        Err(_) => (
            StatusCode::GATEWAY_TIMEOUT,
            json_error("timeout", "assistant request timed out"),
        )
            .into_response(),
    }
}

/// GET /api/thread
async fn thread(State(state): State<HttpState>) -> Response {
    match tokio::time::timeout(
        Duration::from_secs(10),
        state.comms.thread_snapshot(&state.channel_id),
    )
    .await
    {
        Ok(Ok(messages)) => (StatusCode::OK, Json(json!({ "messages": messages }))).into_response(),
        Ok(Err(e)) => {
            warn!(channel_id = %state.channel_id, "thread request failed: {e}");
            (StatusCode::BAD_GATEWAY, json_error("internal", e)).into_response()
        }
        Err(_) => (
            StatusCode::GATEWAY_TIMEOUT,
            json_error("timeout", "thread request timed out"),
        )
            .into_response(),
    }
}

/// GET /api/suggestions
async fn suggestions(State(state): State<HttpState>) -> Response {
    match tokio::time::timeout(Duration::from_secs(10), state.comms.suggestions()).await {
        Ok(Ok(items)) => (StatusCode::OK, Json(json!({ "suggestions": items }))).into_response(),
        Ok(Err(e)) => {
            warn!(channel_id = %state.channel_id, "suggestions request failed: {e}");
            (StatusCode::BAD_GATEWAY, json_error("internal", e)).into_response()
        }
        Err(_) => (
            StatusCode::GATEWAY_TIMEOUT,
            json_error("timeout", "suggestions request timed out"),
        )
            .into_response(),
    }
}

/// GET /demos/{portal} — one of the four fixed portal routes.
async fn portal_page(Path(segment): Path<String>) -> Response {
    match Portal::from_route_segment(&segment) {
        Some(portal) => Html(render_portal_page(portal)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            json_error("not_found", format!("no portal at /demos/{segment}")),
        )
            .into_response(),
    }
}

/// GET / — the landing page shell.
async fn landing(State(state): State<HttpState>) -> Response {
    Html(render_landing_page(&state.surface)).into_response()
}

// ── Pages ─────────────────────────────────────────────────────────────────────

fn render_landing_page(surface: &SurfaceConfig) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{title}</title>
  <style>
    *, *::before, *::after {{ box-sizing: border-box; margin: 0; padding: 0; }}
    body {{
      font-family: system-ui, -apple-system, sans-serif;
      background: #0f0f14; color: #e0e0e0;
      display: flex; align-items: center; justify-content: center;
      height: 100vh;
    }}
    .card {{
      text-align: center; padding: 2rem 3rem; max-width: 36rem;
      border: 1px solid #333; border-radius: 12px;
      background: #1a1a22;
    }}
    h1 {{ font-size: 1.5rem; margin-bottom: 0.5rem; }}
    p  {{ font-size: 0.9rem; color: #888; margin-bottom: 1rem; }}
    code {{ color: #a0a0d0; }}
  </style>
</head>
<body>
  <div class="card">
    <h1>{title}</h1>
    <p>{tagline}</p>
    <p>{placeholder}</p>
    <p>POST to <code>/api/message</code> to start a conversation.</p>
  </div>
</body>
</html>
"#,
        title = surface.title,
        tagline = surface.tagline,
        placeholder = surface.placeholder,
    )
}

fn render_portal_page(portal: Portal) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>{name} portal</title>
  <style>
    body {{
      font-family: system-ui, -apple-system, sans-serif;
      background: #0f0f14; color: #e0e0e0;
      display: flex; align-items: center; justify-content: center;
      height: 100vh;
    }}
    .card {{
      text-align: center; padding: 2rem 3rem;
      border: 1px solid #333; border-radius: 12px;
      background: #1a1a22;
    }}
  </style>
</head>
<body>
  <div class="card">
    <h1>{name} portal</h1>
    <p>{route}</p>
  </div>
</body>
</html>
"#,
        name = portal.display_name(),
        route = portal.route(),
    )
}
