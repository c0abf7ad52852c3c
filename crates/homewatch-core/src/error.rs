// ── Core error types ──
//
// User-facing errors from homewatch-core. Consumers never see HTTP status
// codes or JSON parse failures directly: the `From<homewatch_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to relay at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Relay connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Realtime link is not connected")]
    Disconnected,

    // ── Data errors ──────────────────────────────────────────────────
    /// A required ingestion field is missing. The message is surfaced verbatim.
    #[error("{message}")]
    Validation { message: String },

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Request rejected by relay: {message}")]
    Rejected { message: String },

    /// Delivering a queued or outbound message failed.
    #[error("Delivery failed: {message}")]
    Delivery { message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Local state errors ───────────────────────────────────────────
    #[error("Persistence error for '{key}': {message}")]
    Persistence { key: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Connectivity failures that a later probe or reconnect may clear.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Disconnected => true,
            Self::Api {
                status: Some(status),
                ..
            } => *status >= 502,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<homewatch_api::Error> for CoreError {
    fn from(err: homewatch_api::Error) -> Self {
        match err {
            homewatch_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            homewatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            homewatch_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            homewatch_api::Error::Rejected {
                status: 400,
                message,
            } => CoreError::Validation { message },
            homewatch_api::Error::Rejected { message, .. } => CoreError::Rejected { message },
            homewatch_api::Error::NotFound { resource, id } => CoreError::NotFound {
                entity_type: resource.into(),
                identifier: id,
            },
            homewatch_api::Error::Server { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            homewatch_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            homewatch_api::Error::WebSocketClosed { code, reason } => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason: format!("WebSocket closed (code {code}): {reason}"),
                }
            }
            homewatch_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
