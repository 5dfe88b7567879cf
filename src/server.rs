//! HTTP ingress.
//!
//! `POST /assist` answers with Server-Sent Events. Each request runs on its
//! own task; dropping the response stream (client disconnect) fires the
//! request's cancellation token.

use crate::cache::CacheStats;
use crate::config::StreamingSettings;
use crate::error::Result;
use crate::pipeline::{AssistRequest, Pipeline, ResponseEmitter};
use crate::rate_limit::{PlatformStats, RateLimiter};
use axum::{
    extract::State,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    streaming: StreamingSettings,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let streaming = pipeline.settings().streaming.clone();
        Self {
            pipeline,
            streaming,
        }
    }
}

/// Build the router with CORS enabled.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/assist", post(assist))
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl+C, pruning idle rate-limit sessions in the background.
pub async fn serve(listener: TcpListener, pipeline: Arc<Pipeline>) -> Result<()> {
    let prune_every = Duration::from_secs(pipeline.settings().server.prune_interval_seconds);
    let pruner = spawn_prune_task(pipeline.limiter().clone(), prune_every);

    let app = router(AppState::new(pipeline));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pruner.abort();
    info!("Server stopped");
    Ok(served?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Periodically forget idle rate-limit sessions.
pub fn spawn_prune_task(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = limiter.prune_idle();
            debug!("Prune pass removed {} sessions", removed);
        }
    })
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct StatsResponse {
    platform: PlatformStats,
    cache: Option<CacheStats>,
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let cache = match state.pipeline.cache().stats() {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!("Cache stats unavailable: {}", e);
            None
        }
    };

    Json(StatsResponse {
        platform: state.pipeline.limiter().platform_stats(),
        cache,
    })
}

async fn assist(
    State(state): State<AppState>,
    Json(request): Json<AssistRequest>,
) -> impl IntoResponse {
    let cancel = CancellationToken::new();
    let (emitter, receiver) = ResponseEmitter::channel(&state.streaming, cancel.clone());

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.handle(&request, &emitter).await;
    });

    // Lives as long as the response stream.
    let guard = cancel.drop_guard();
    let stream = ReceiverStream::new(receiver).map(move |event| {
        let _ = &guard;
        Ok::<_, Infallible>(
            Event::default()
                .event(event.kind())
                .data(serde_json::to_string(&event).unwrap_or_default()),
        )
    });

    Sse::new(stream)
}
