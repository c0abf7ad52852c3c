// ── REST handlers ──

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;

use homewatch_api::{Event, HealthStatus, IngestResponse, Pong, RawNotification};
use homewatch_core::relay::DEFAULT_QUERY_LIMIT;

use crate::AppState;
use crate::error::{ApiError, EVENT_NOT_FOUND};

/// `POST /api/events`
pub async fn ingest(
    State(state): State<AppState>,
    body: Result<Json<RawNotification>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let Json(raw) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "unreadable notification body");
        ApiError::BadRequest(rejection.body_text())
    })?;

    let ack = state.relay.ingest(&raw).await?;
    Ok((StatusCode::CREATED, Json(IngestResponse::accepted(ack))))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    limit: Option<String>,
}

/// Non-numeric or non-positive limits fall back to the default.
fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map_or(DEFAULT_QUERY_LIMIT, |n| usize::try_from(n).unwrap_or(usize::MAX))
}

/// `GET /api/events?limit=N`
pub async fn recent(State(state): State<AppState>, Query(query): Query<RecentQuery>) -> Json<Vec<Event>> {
    let limit = parse_limit(query.limit.as_deref());
    Json(state.relay.recent(Some(limit)).await)
}

/// `GET /api/events/{id}`
pub async fn event_by_id(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Event>, ApiError> {
    let id: u64 = id
        .parse()
        .map_err(|_| ApiError::NotFound(EVENT_NOT_FOUND.into()))?;
    Ok(Json(state.relay.get(id).await?))
}

/// `GET /api/ping`
pub async fn ping() -> Json<Pong> {
    Json(Pong {
        pong: true,
        timestamp: Utc::now(),
    })
}

/// `GET /health`
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".into(),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_parsing() {
        assert_eq!(parse_limit(None), 50);
        assert_eq!(parse_limit(Some("10")), 10);
        assert_eq!(parse_limit(Some("abc")), 50);
        assert_eq!(parse_limit(Some("0")), 50);
        assert_eq!(parse_limit(Some("-3")), 50);
    }
}
