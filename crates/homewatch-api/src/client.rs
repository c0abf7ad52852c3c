// Events API HTTP client
//
// Wraps `reqwest::Client` with relay URL construction and the
// `{success, event?, error?}` response convention. Used by the CLI for
// queries and submissions, by the offline queue for delivery, and by the
// connectivity probe.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::event::{Event, EventAck, IngestResponse, RawNotification};
use crate::transport::TransportConfig;

/// `GET /api/ping` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub pong: bool,
    pub timestamp: DateTime<Utc>,
}

/// `GET /health` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// `{error}` body returned by the query endpoints on a miss.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the relay's events API.
#[derive(Debug, Clone)]
pub struct EventsClient {
    http: reqwest::Client,
    base_url: Url,
}

impl EventsClient {
    /// Create a client for the relay rooted at `base_url`
    /// (e.g. `http://localhost:8000`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Realtime endpoint derived from the base URL: `http(s)://host/` →
    /// `ws(s)://host/ws`.
    pub fn websocket_url(&self) -> Result<Url, Error> {
        let mut url = self.base_url.join("ws")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| {
            Error::WebSocketConnect(format!("cannot derive a WebSocket URL from {}", self.base_url))
        })?;
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Submit a raw notification.
    ///
    /// `POST /api/events`
    pub async fn submit(&self, notification: &RawNotification) -> Result<EventAck, Error> {
        let url = self.base_url.join("api/events")?;
        debug!(
            event_type = notification.event_type.as_deref().unwrap_or(""),
            device_id = notification.device_id.as_deref().unwrap_or(""),
            "submitting event"
        );

        let resp = self
            .http
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        let parsed: Option<IngestResponse> = serde_json::from_str(&body).ok();

        if status.is_success() {
            return match parsed {
                Some(IngestResponse {
                    event: Some(ack), ..
                }) => Ok(ack),
                _ => Err(Error::Deserialization {
                    message: "ingestion response carried no event".into(),
                    body,
                }),
            };
        }

        let message = parsed
            .and_then(|r| r.error)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_owned());
        if status.is_server_error() {
            Err(Error::Server {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(Error::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Most recent events, newest first.
    ///
    /// `GET /api/events?limit={n}`; the relay applies its own default when
    /// `limit` is `None`.
    pub async fn recent(&self, limit: Option<u32>) -> Result<Vec<Event>, Error> {
        let mut url = self.base_url.join("api/events")?;
        if let Some(n) = limit {
            url.query_pairs_mut().append_pair("limit", &n.to_string());
        }
        debug!(?limit, "listing events");
        self.get(url, "events", "").await
    }

    /// One event by id.
    ///
    /// `GET /api/events/{id}`
    pub async fn get_event(&self, id: u64) -> Result<Event, Error> {
        let url = self.base_url.join(&format!("api/events/{id}"))?;
        debug!(id, "fetching event");
        self.get(url, "Event", &id.to_string()).await
    }

    /// Lightweight liveness check used by the connectivity probe.
    ///
    /// `GET /api/ping`
    pub async fn ping(&self) -> Result<Pong, Error> {
        let url = self.base_url.join("api/ping")?;
        self.get(url, "ping", "").await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        let url = self.base_url.join("health")?;
        self.get(url, "health", "").await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        resource: &'static str,
        id: &str,
    ) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                resource,
                id: id.to_owned(),
            });
        }
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| body.clone());
            return Err(if status.is_server_error() {
                Error::Server {
                    status: status.as_u16(),
                    message,
                }
            } else {
                Error::Rejected {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
