//! HTTP + WebSocket relay for homewatch.
//!
//! Sensor bridges `POST /api/events`; dashboards load history through
//! `GET /api/events` and follow live traffic on `/ws`. All state lives in
//! one [`Relay`] handle carried in [`AppState`].

pub mod error;
pub mod routes;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use homewatch_core::Relay;

pub use crate::error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    /// Cancelled on shutdown; open WebSocket sessions close when it fires.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(relay: Relay) -> Self {
        Self {
            relay,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the full route table.
pub fn router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/api/events", post(routes::ingest).get(routes::recent))
        .route("/api/events/{id}", get(routes::event_by_id))
        .route("/api/ping", get(routes::ping))
        .route("/health", get(routes::health))
        .route("/ws", get(ws::upgrade))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `*` allows any origin; anything else is matched exactly.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!(origin, "invalid CORS origin, cross-origin requests will be refused");
            layer
        }
    }
}

/// Serve until `state.shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState, cors_origin: &str) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = router(state, cors_origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
