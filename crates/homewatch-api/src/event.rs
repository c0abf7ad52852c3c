// ── Event wire types ──
//
// Shapes exchanged over the events API: the raw notification a sensor
// bridge posts, the canonical Event the relay stores, and the ack body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event type emitted by PIR motion sensors.
pub const MOTION_DETECTED: &str = "motion_detected";

/// Event type emitted by push buttons and pressure mats.
pub const BUTTON_PRESSED: &str = "button_pressed";

/// Canonical, enriched sensor event as stored and served by the relay.
///
/// `id` and `timestamp` are assigned once at ingestion and never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic, millisecond-derived identifier.
    pub id: u64,

    /// `motion_detected`, `button_pressed`, or any free-form tag.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Originating bridge / site.
    pub device_id: String,

    /// Assignment time at the ingestion endpoint.
    pub timestamp: DateTime<Utc>,

    /// External correlation id (`evt-<millis>` when the bridge sent none).
    pub event_id: String,

    /// Raw sensor tag, e.g. `PIR`.
    pub source: String,

    /// Display label for `source`.
    pub source_name: String,

    /// Display label for `device_id`.
    pub location: String,

    #[serde(default)]
    pub data: Value,

    #[serde(default)]
    pub mqtt_topic: Option<String>,

    /// Timestamp supplied by the bridge, kept verbatim.
    #[serde(default)]
    pub original_timestamp: Option<String>,

    /// The full original `details` object.
    #[serde(default)]
    pub metadata: Value,
}

/// Notification as posted by a sensor bridge: `{type, device_id, details?}`.
///
/// Every field is optional on the wire so that missing fields surface as
/// validation errors rather than body parse failures. Numeric and boolean
/// `type` / `device_id` values are accepted and rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNotification {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "scalar_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub event_type: Option<String>,

    #[serde(default, deserialize_with = "scalar_text", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

/// Strings pass through, numbers and booleans are rendered, anything else
/// (null, arrays, objects) reads as absent.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

impl RawNotification {
    pub fn new(event_type: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            device_id: Some(device_id.into()),
            details: None,
        }
    }

    /// Set one `details` entry, creating the object on first use.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.to_owned(), value.into());
        self
    }

    /// Read a `details` entry as text.
    ///
    /// Strings are returned as-is (empty strings count as absent), numbers
    /// and booleans are rendered, anything else is treated as absent.
    pub fn detail_text(&self, key: &str) -> Option<String> {
        match self.details.as_ref()?.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Read a `details` entry verbatim, skipping `null`.
    pub fn detail_value(&self, key: &str) -> Option<&Value> {
        self.details
            .as_ref()?
            .get(key)
            .filter(|v| !v.is_null())
    }
}

/// Summary of a stored event returned by the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAck {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Event> for EventAck {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type.clone(),
            timestamp: event.timestamp,
        }
    }
}

/// Body of every ingestion response: `{success, event?}` or `{success:false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventAck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestResponse {
    pub fn accepted(ack: EventAck) -> Self {
        Self {
            success: true,
            event: Some(ack),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            event: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_notification_tolerates_missing_fields() {
        let raw: RawNotification = serde_json::from_value(json!({ "device_id": "raspberry-1" })).unwrap();
        assert!(raw.event_type.is_none());
        assert_eq!(raw.device_id.as_deref(), Some("raspberry-1"));
        assert!(raw.details.is_none());
    }

    #[test]
    fn raw_notification_accepts_scalar_type_and_device() {
        let raw: RawNotification =
            serde_json::from_value(json!({ "type": 5, "device_id": true })).unwrap();
        assert_eq!(raw.event_type.as_deref(), Some("5"));
        assert_eq!(raw.device_id.as_deref(), Some("true"));

        let raw: RawNotification =
            serde_json::from_value(json!({ "type": ["motion"], "device_id": null })).unwrap();
        assert!(raw.event_type.is_none());
        assert!(raw.device_id.is_none());
    }

    #[test]
    fn detail_text_renders_scalars_and_skips_empty() {
        let raw = RawNotification::new("motion_detected", "raspberry-1")
            .with_detail("event_id", 42)
            .with_detail("source", "")
            .with_detail("mqtt_topic", "sensor/motion");

        assert_eq!(raw.detail_text("event_id").as_deref(), Some("42"));
        assert_eq!(raw.detail_text("source"), None);
        assert_eq!(raw.detail_text("mqtt_topic").as_deref(), Some("sensor/motion"));
        assert_eq!(raw.detail_text("missing"), None);
    }

    #[test]
    fn event_serializes_type_field_and_null_topic() {
        let event = Event {
            id: 1,
            event_type: MOTION_DETECTED.into(),
            device_id: "raspberry-1".into(),
            timestamp: Utc::now(),
            event_id: "evt-1".into(),
            source: "PIR".into(),
            source_name: "PIR Entrée".into(),
            location: "Maison".into(),
            data: json!({}),
            mqtt_topic: None,
            original_timestamp: None,
            metadata: json!({}),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "motion_detected");
        assert!(value["mqtt_topic"].is_null());
        assert!(value.get("event_type").is_none());
    }

    #[test]
    fn failed_response_omits_event() {
        let body = serde_json::to_value(IngestResponse::failed("Missing required field: type")).unwrap();
        assert_eq!(body, json!({ "success": false, "error": "Missing required field: type" }));
    }
}
