// ── Raw notification → canonical Event ──
//
// Pure enrichment: required-field checks, defaults and label lookups.
// The input is never mutated; the output carries the full original
// `details` object as `metadata`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use homewatch_api::{Event, RawNotification};

use crate::config::LabelTables;
use crate::error::CoreError;

/// Source recorded when the notification names none.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Reject notifications without a non-empty `type` and `device_id`.
pub fn validate(raw: &RawNotification) -> Result<(), CoreError> {
    required(raw.event_type.as_deref(), "type")?;
    required(raw.device_id.as_deref(), "device_id")?;
    Ok(())
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, CoreError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CoreError::validation(format!(
            "Missing required field: {field}"
        ))),
    }
}

/// Build the canonical event for `raw`, assigning `id` and `now`.
pub fn normalize(
    raw: &RawNotification,
    labels: &LabelTables,
    id: u64,
    now: DateTime<Utc>,
) -> Result<Event, CoreError> {
    let event_type = required(raw.event_type.as_deref(), "type")?;
    let device_id = required(raw.device_id.as_deref(), "device_id")?;

    let source = raw.detail_text("source");

    Ok(Event {
        id,
        event_type: event_type.to_owned(),
        device_id: device_id.to_owned(),
        timestamp: now,
        event_id: raw
            .detail_text("event_id")
            .unwrap_or_else(|| format!("evt-{}", now.timestamp_millis())),
        source_name: labels.source_name(source.as_deref()),
        source: source.unwrap_or_else(|| UNKNOWN_SOURCE.to_owned()),
        location: labels.location(device_id),
        data: raw
            .detail_value("data")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
        mqtt_topic: raw.detail_text("mqtt_topic"),
        original_timestamp: raw.detail_text("original_timestamp"),
        metadata: Value::Object(raw.details.clone().unwrap_or_default()),
    })
}
