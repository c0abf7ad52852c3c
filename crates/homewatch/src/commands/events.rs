//! Event command handlers.

use tabled::Tabled;

use homewatch_core::{ClientConfig, Event};

use crate::cli::{EventsArgs, EventsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Type")]
    event_type: String,
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Device")]
    device: String,
}

impl From<&Event> for EventRow {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id,
            time: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            event_type: e.event_type.clone(),
            sensor: e.source_name.clone(),
            location: e.location.clone(),
            device: e.device_id.clone(),
        }
    }
}

fn detail(e: &Event) -> String {
    let mut lines = vec![
        format!("ID:        {}", e.id),
        format!("Type:      {}", e.event_type),
        format!("Device:    {}", e.device_id),
        format!("Location:  {}", e.location),
        format!("Sensor:    {} ({})", e.source_name, e.source),
        format!("Time:      {}", e.timestamp.to_rfc3339()),
        format!("Event ID:  {}", e.event_id),
    ];
    if let Some(ref topic) = e.mqtt_topic {
        lines.push(format!("Topic:     {topic}"));
    }
    if let Some(ref original) = e.original_timestamp {
        lines.push(format!("Sent at:   {original}"));
    }
    if !e.data.is_null() {
        lines.push(format!("Data:      {}", e.data));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    config: &ClientConfig,
    args: EventsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = util::events_client(config)?;

    match args.command {
        EventsCommand::List { limit } => {
            let events = client.recent(limit).await?;
            let out = output::render_list(
                &global.output,
                &events,
                |e| EventRow::from(e),
                |e| e.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EventsCommand::Get { id } => {
            let event = client.get_event(id).await?;
            let out = output::render_single(&global.output, &event, detail, |e| e.id.to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EventsCommand::Send {
            event_type,
            device_id,
            source,
            details,
        } => {
            let raw = util::notification(&event_type, &device_id, source.as_deref(), &details)?;
            let ack = client.submit(&raw).await?;
            tracing::info!(id = ack.id, event_type = %ack.event_type, "event accepted");
            let out = output::render_single(
                &global.output,
                &ack,
                |a| format!("Event {} accepted ({}) at {}", a.id, a.event_type, a.timestamp.to_rfc3339()),
                |a| a.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
