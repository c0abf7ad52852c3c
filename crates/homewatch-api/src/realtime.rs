// ── Realtime channel messages ──
//
// Every WebSocket text frame is one JSON envelope:
// `{"channel": "<name>", "payload": {...}}`. Lifecycle frames (`ping`,
// `pong`) carry no payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::event::Event;

/// Named realtime message category used for fan-out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
    MotionDetected,
    ButtonPressed,
    CameraStatus,
    Alert,
    Event,
    Ping,
    Pong,
}

/// `details` block carried by shaped sensor messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub event_id: String,
    pub source: String,
    #[serde(default)]
    pub data: Value,
}

/// Payload of the `motion_detected` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionDetected {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    /// Display label of the sensor (the event's `source_name`).
    pub source: String,
    pub details: EventDetails,
}

/// Payload of the `button_pressed` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonPressed {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    /// Display label of the button (the event's `source_name`).
    pub button_name: String,
    pub details: EventDetails,
}

/// Payload of the `camera_status` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraStatus {
    pub camera_id: String,
    pub status: String,
}

/// Payload of the `alert` channel. Producers are free-form, so every
/// field falls back to an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotice {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// A typed realtime message, one variant per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "snake_case")]
pub enum RealtimeMessage {
    MotionDetected(MotionDetected),
    ButtonPressed(ButtonPressed),
    CameraStatus(CameraStatus),
    Alert(AlertNotice),
    /// Generic fallback carrying the full canonical event.
    Event(Box<Event>),
    Ping,
    Pong,
}

impl RealtimeMessage {
    pub fn channel(&self) -> Channel {
        match self {
            Self::MotionDetected(_) => Channel::MotionDetected,
            Self::ButtonPressed(_) => Channel::ButtonPressed,
            Self::CameraStatus(_) => Channel::CameraStatus,
            Self::Alert(_) => Channel::Alert,
            Self::Event(_) => Channel::Event,
            Self::Ping => Channel::Ping,
            Self::Pong => Channel::Pong,
        }
    }

    /// Encode as a WebSocket text frame body.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a WebSocket text frame body.
    pub fn from_frame(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
