// ── Runtime configuration ──
//
// These types describe how the relay and the dashboard client behave.
// They never touch disk: homewatch-config builds them from files and
// environment and hands them in.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use url::Url;

use homewatch_api::{ReconnectConfig, TransportConfig};

use crate::error::CoreError;

/// Label used when a notification names no source at all.
pub const UNKNOWN_SOURCE_LABEL: &str = "Capteur inconnu";

/// Display-label lookups applied during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTables {
    /// Raw sensor tag → display label.
    pub sources: IndexMap<String, String>,
    /// Device id → location label.
    pub locations: IndexMap<String, String>,
}

impl Default for LabelTables {
    fn default() -> Self {
        let sources = [
            ("PIR", "PIR Entrée"),
            ("Button", "Bouton Arrêt"),
            ("Pressure", "Tapis Salon"),
        ];
        let locations = [("raspberry-1", "Maison"), ("raspberry-2", "Garage")];

        Self {
            sources: sources
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
            locations: locations
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        }
    }
}

impl LabelTables {
    /// Add or replace entries on top of the current tables.
    pub fn extend(
        mut self,
        sources: impl IntoIterator<Item = (String, String)>,
        locations: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.sources.extend(sources);
        self.locations.extend(locations);
        self
    }

    /// Table label, else the raw source, else [`UNKNOWN_SOURCE_LABEL`].
    pub fn source_name(&self, source: Option<&str>) -> String {
        match source {
            Some(raw) => self
                .sources
                .get(raw)
                .cloned()
                .unwrap_or_else(|| raw.to_owned()),
            None => UNKNOWN_SOURCE_LABEL.to_owned(),
        }
    }

    /// Table label, else the device id itself.
    pub fn location(&self, device_id: &str) -> String {
        self.locations
            .get(device_id)
            .cloned()
            .unwrap_or_else(|| device_id.to_owned())
    }
}

/// Configuration for the in-process relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Events kept in the ring buffer.
    pub history_capacity: usize,
    /// Per-subscriber backlog before a slow subscriber starts lagging.
    pub broadcast_capacity: usize,
    pub labels: LabelTables,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            history_capacity: crate::relay::ring::DEFAULT_CAPACITY,
            broadcast_capacity: 1024,
            labels: LabelTables::default(),
        }
    }
}

/// Configuration for a dashboard client.
///
/// Built by the CLI, passed to the subscriber, probe and stores.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay base URL (e.g. `http://localhost:8000`).
    pub api_url: Url,
    /// Realtime endpoint. Derived from `api_url` when `None`.
    pub ws_url: Option<Url>,
    pub reconnect_delay: Duration,
    /// `None` retries forever.
    pub reconnect_attempts: Option<u32>,
    /// Connectivity probe period while online.
    pub probe_interval: Duration,
    pub request_timeout: Duration,
    /// Directory for persisted preferences. `None` keeps them in memory.
    pub state_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            ws_url: None,
            reconnect_delay: Duration::from_secs(1),
            reconnect_attempts: Some(10),
            probe_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            state_dir: None,
        }
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            delay: self.reconnect_delay,
            max_attempts: self.reconnect_attempts,
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(self.request_timeout)
    }

    /// Build an events client for `api_url`.
    pub fn events_client(&self) -> Result<homewatch_api::EventsClient, CoreError> {
        Ok(homewatch_api::EventsClient::new(
            self.api_url.clone(),
            &self.transport(),
        )?)
    }

    /// The realtime endpoint: `ws_url` if set, else derived from `api_url`.
    pub fn websocket_url(&self) -> Result<Url, CoreError> {
        if let Some(url) = &self.ws_url {
            return Ok(url.clone());
        }
        Ok(self.events_client()?.websocket_url()?)
    }
}
