// ── Realtime fan-out ──
//
// Best-effort delivery to every currently connected subscriber. No
// retry, no persistence: a subscriber that joins later never sees
// earlier messages.

use std::sync::Arc;

use tokio::sync::broadcast;

use homewatch_api::event::{BUTTON_PRESSED, MOTION_DETECTED};
use homewatch_api::{ButtonPressed, Event, EventDetails, MotionDetected, RealtimeMessage};

/// Fan-out hub backed by a `tokio::sync::broadcast` channel.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Arc<RealtimeMessage>>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver `message` to every current subscriber. Returns how many
    /// subscribers it was queued for.
    pub fn publish(&self, message: RealtimeMessage) -> usize {
        let channel = message.channel();
        // An error only means nobody is listening right now.
        let receivers = self.tx.send(Arc::new(message)).unwrap_or(0);
        tracing::debug!(%channel, receivers, "published realtime message");
        receivers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RealtimeMessage>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Shape a stored event into its channel payload.
///
/// Motion and button events get compact, channel-specific payloads; any
/// other type travels on the generic `event` channel as the full record.
pub fn message_for(event: &Event) -> RealtimeMessage {
    let details = || EventDetails {
        event_id: event.event_id.clone(),
        source: event.source.clone(),
        data: event.data.clone(),
    };

    match event.event_type.as_str() {
        MOTION_DETECTED => RealtimeMessage::MotionDetected(MotionDetected {
            device_id: event.device_id.clone(),
            timestamp: event.timestamp,
            location: event.location.clone(),
            source: event.source_name.clone(),
            details: details(),
        }),
        BUTTON_PRESSED => RealtimeMessage::ButtonPressed(ButtonPressed {
            device_id: event.device_id.clone(),
            timestamp: event.timestamp,
            location: event.location.clone(),
            button_name: event.source_name.clone(),
            details: details(),
        }),
        _ => RealtimeMessage::Event(Box::new(event.clone())),
    }
}
