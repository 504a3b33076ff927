//! REST API for the call relay
//!
//! - `GET  /api/call-sid`         current call identifier and diagnostics
//! - `GET  /api/call-sid/stream`  server-sent events on every change
//! - `POST /api/call-status`      provider status webhook (observed only)
//! - `GET  /health`               liveness

pub mod types;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::FormRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Form, Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::events::{CallStatusAck, CallStatusWebhook};
use crate::registry::CallRegistry;

pub use types::{CallSidEvent, CallSidResponse, DebugInfo, HealthResponse};

/// Shared state of the API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<CallRegistry>,
    pub started_at: Instant,
    pub sse_keep_alive: Duration,
    /// Ends open push streams so graceful shutdown can complete
    pub shutdown: CancellationToken,
}

impl ApiState {
    /// Create API state over `registry`
    pub fn new(registry: Arc<CallRegistry>) -> Self {
        Self {
            registry,
            started_at: Instant::now(),
            sse_keep_alive: Duration::from_secs(15),
            shutdown: CancellationToken::new(),
        }
    }

    /// Override the push stream keep-alive interval
    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.sse_keep_alive = interval;
        self
    }

    /// End push streams when `token` is cancelled
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }
}

/// Create the REST API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/call-sid", get(get_call_sid))
        .route("/api/call-sid/stream", get(stream_call_sid))
        .route("/api/call-status", post(post_call_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_call_sid(State(state): State<ApiState>) -> Json<CallSidResponse> {
    let response = CallSidResponse::from(state.registry.read());
    debug!(
        "📊 Call SID query: callSid={:?} ws={} attempts={} messages={} last={:?}",
        response.call_sid,
        response.debug.ws_status,
        response.debug.connection_attempts,
        response.debug.message_count,
        response.debug.last_message_time,
    );
    Json(response)
}

async fn stream_call_sid(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Push subscriber attached");
    let shutdown = state.shutdown.clone();
    let stream = WatchStream::new(state.registry.subscribe()).map(|call_sid| {
        let payload = CallSidEvent { call_sid };
        let event = match Event::default().event("call_sid").json_data(&payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to encode call_sid event: {}", e);
                Event::default().event("error").data(e.to_string())
            }
        };
        Ok(event)
    })
    .take_until(async move { shutdown.cancelled().await });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.sse_keep_alive))
}

async fn post_call_status(
    form: Result<Form<CallStatusWebhook>, FormRejection>,
) -> Result<Json<CallStatusAck>, RelayError> {
    let Form(webhook) = form.map_err(|e| {
        warn!("Rejected status callback: {}", e);
        RelayError::decode(e.body_text())
    })?;
    Ok(Json(webhook.observe()))
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        ws_status: state.registry.connection_state().label().to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
