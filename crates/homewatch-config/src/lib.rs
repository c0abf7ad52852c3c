//! Shared configuration for the homewatch relay and dashboard client.
//!
//! One TOML file with a `[server]` and a `[client]` section, layered under
//! `HOMEWATCH_` environment variables, and translation to the runtime
//! configs in `homewatch_core`. Command-line flags are applied on top by
//! the binaries.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use homewatch_core::{ClientConfig, LabelTables, RelayConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration shared by the server and the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub client: ClientSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origin allowed by CORS. `*` allows any.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Extra or replacement source labels (`PIR = "PIR Entrée"`).
    #[serde(default)]
    pub sources: IndexMap<String, String>,

    /// Extra or replacement location labels keyed by device id.
    #[serde(default)]
    pub locations: IndexMap<String, String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origin: default_cors_origin(),
            history_capacity: default_history_capacity(),
            broadcast_capacity: default_broadcast_capacity(),
            sources: IndexMap::new(),
            locations: IndexMap::new(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".into()
}
fn default_cors_origin() -> String {
    "http://localhost:3000".into()
}
fn default_history_capacity() -> usize {
    100
}
fn default_broadcast_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Realtime endpoint; derived from `api_url` when absent.
    pub ws_url: Option<String>,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Consecutive failed attempts before giving up. `0` retries forever.
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Where mode and settings are persisted. Defaults to the platform
    /// data directory.
    pub state_dir: Option<PathBuf>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reconnect_attempts: default_reconnect_attempts(),
            probe_interval_secs: default_probe_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            state_dir: None,
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8000".into()
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_reconnect_attempts() -> u32 {
    10
}
fn default_probe_interval_secs() -> u64 {
    10
}
fn default_request_timeout_secs() -> u64 {
    10
}

// ── Translation to runtime configs ──────────────────────────────────

impl ServerSection {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| ConfigError::Validation {
            field: "server.bind".into(),
            reason: format!("expected host:port, got '{}'", self.bind),
        })
    }

    /// Relay settings with the label overrides applied over the defaults.
    pub fn relay_config(&self) -> Result<RelayConfig, ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "server.history_capacity".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "server.broadcast_capacity".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(RelayConfig {
            history_capacity: self.history_capacity,
            broadcast_capacity: self.broadcast_capacity,
            labels: LabelTables::default()
                .extend(self.sources.clone(), self.locations.clone()),
        })
    }
}

impl ClientSection {
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let api_url = parse_url("client.api_url", &self.api_url)?;
        let ws_url = self
            .ws_url
            .as_deref()
            .map(|raw| parse_url("client.ws_url", raw))
            .transpose()?;

        Ok(ClientConfig {
            api_url,
            ws_url,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            reconnect_attempts: (self.reconnect_attempts > 0).then_some(self.reconnect_attempts),
            probe_interval: Duration::from_secs(self.probe_interval_secs.max(1)),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            state_dir: Some(self.state_dir.clone().unwrap_or_else(default_state_dir)),
        })
    }
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "homewatch", "homewatch")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory for persisted client state.
pub fn default_state_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("state"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("homewatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) with `HOMEWATCH_` env vars on
/// top. Nested keys use `__`, e.g. `HOMEWATCH_SERVER__BIND`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HOMEWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg.server.bind, "0.0.0.0:8000");
        assert_eq!(cfg.server.cors_origin, "http://localhost:3000");
        assert_eq!(cfg.client.api_url, "http://localhost:8000");
        assert_eq!(cfg.client.reconnect_attempts, 10);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "127.0.0.1:9000"
history_capacity = 20

[server.locations]
pi-cellar = "Cave"

[client]
api_url = "http://10.0.0.5:9000"
reconnect_attempts = 0
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.server.bind_addr().unwrap().port(), 9000);
        assert_eq!(cfg.server.broadcast_capacity, 1024);

        let relay = cfg.server.relay_config().unwrap();
        assert_eq!(relay.history_capacity, 20);
        assert_eq!(relay.labels.location("pi-cellar"), "Cave");
        assert_eq!(relay.labels.location("raspberry-1"), "Maison");

        let client = cfg.client.client_config().unwrap();
        assert_eq!(client.api_url.as_str(), "http://10.0.0.5:9000/");
        assert_eq!(client.reconnect_attempts, None);
        assert_eq!(client.websocket_url().unwrap().as_str(), "ws://10.0.0.5:9000/ws");
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.client.state_dir = Some(dir.path().join("state"));
        cfg.server.sources.insert("Door".into(), "Porte".into());
        save_config_to(&cfg, &path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = Config::default();
        cfg.server.bind = "localhost".into();
        assert!(matches!(
            cfg.server.bind_addr(),
            Err(ConfigError::Validation { .. })
        ));

        cfg.server.history_capacity = 0;
        assert!(cfg.server.relay_config().is_err());

        cfg.client.api_url = "not a url".into();
        assert!(cfg.client.client_config().is_err());
    }
}
