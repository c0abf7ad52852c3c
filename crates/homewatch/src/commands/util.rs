//! Shared helpers for command handlers.

use serde_json::Value;

use homewatch_api::RawNotification;
use homewatch_core::{ClientConfig, Event};

use crate::error::CliError;

/// Build an events client, mapping construction failures.
pub fn events_client(config: &ClientConfig) -> Result<homewatch_api::EventsClient, CliError> {
    Ok(config.events_client()?)
}

/// Parse a `key=value` detail flag. Values that parse as JSON scalars
/// (numbers, booleans, null) keep their type; anything else is a string.
pub fn parse_detail(raw: &str) -> Result<(String, Value), CliError> {
    let (key, value) = raw.split_once('=').ok_or_else(|| CliError::Validation {
        field: "detail".into(),
        reason: format!("expected KEY=VALUE, got '{raw}'"),
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::Validation {
            field: "detail".into(),
            reason: "key cannot be empty".into(),
        });
    }

    let value = match serde_json::from_str::<Value>(value) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v,
        _ => Value::String(value.to_owned()),
    };
    Ok((key.to_owned(), value))
}

/// Assemble a notification from command-line parts.
pub fn notification(
    event_type: &str,
    device_id: &str,
    source: Option<&str>,
    details: &[String],
) -> Result<RawNotification, CliError> {
    let mut raw = RawNotification::new(event_type, device_id);
    if let Some(source) = source {
        raw = raw.with_detail("source", source);
    }
    for detail in details {
        let (key, value) = parse_detail(detail)?;
        raw = raw.with_detail(&key, value);
    }
    Ok(raw)
}

/// One-line summary used by `watch`.
pub fn event_line(event: &Event) -> String {
    format!(
        "{} #{} {} {} @ {} ({})",
        event.timestamp.format("%H:%M:%S"),
        event.id,
        event.event_type,
        event.source_name,
        event.location,
        event.device_id
    )
}
