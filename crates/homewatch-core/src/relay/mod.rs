// ── Event relay ──
//
// Process-scoped relay state: the ring buffer, the id generator and the
// broadcaster. The server constructs one `Relay` at startup and threads it
// through its handlers; nothing here is global.

pub mod broadcast;
pub mod normalize;
pub mod ring;

use std::sync::Arc;

use tokio::sync::Mutex;

use homewatch_api::{AlertNotice, CameraStatus, Event, EventAck, RawNotification, RealtimeMessage};

use crate::clock::{Clock, IdGenerator, SystemClock};
use crate::config::{LabelTables, RelayConfig};
use crate::error::CoreError;

pub use self::broadcast::{Broadcaster, message_for};
pub use self::normalize::{normalize, validate};
pub use self::ring::{DEFAULT_QUERY_LIMIT, EventRing};

/// Handle to the relay. Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    /// Held across normalize → append → publish so that insertion order
    /// equals broadcast order.
    state: Mutex<RelayState>,
    broadcaster: Broadcaster,
    labels: LabelTables,
    clock: Arc<dyn Clock>,
}

struct RelayState {
    ring: EventRing,
    ids: IdGenerator,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RelayConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                state: Mutex::new(RelayState {
                    ring: EventRing::new(config.history_capacity),
                    ids: IdGenerator::new(),
                }),
                broadcaster: Broadcaster::new(config.broadcast_capacity),
                labels: config.labels,
                clock,
            }),
        }
    }

    // ── Ingestion ────────────────────────────────────────────────────

    /// Normalize, store and broadcast one notification.
    ///
    /// A validation failure leaves the history untouched and publishes
    /// nothing. Duplicate notifications are stored twice with distinct ids.
    pub async fn ingest(&self, raw: &RawNotification) -> Result<EventAck, CoreError> {
        validate(raw)?;

        let mut state = self.inner.state.lock().await;
        let now = self.inner.clock.now();
        let id = state.ids.next_id(now);
        let event = normalize(raw, &self.inner.labels, id, now)?;

        tracing::info!(
            id = event.id,
            event_type = %event.event_type,
            device_id = %event.device_id,
            source = %event.source_name,
            location = %event.location,
            event_id = %event.event_id,
            mqtt_topic = event.mqtt_topic.as_deref().unwrap_or("-"),
            "event ingested"
        );

        let ack = EventAck::from(&event);
        let message = message_for(&event);
        state.ring.append(event);
        self.inner.broadcaster.publish(message);

        Ok(ack)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Up to `limit` events (default 50), newest first.
    pub async fn recent(&self, limit: Option<usize>) -> Vec<Event> {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        self.inner.state.lock().await.ring.recent(limit)
    }

    pub async fn get(&self, id: u64) -> Result<Event, CoreError> {
        self.inner
            .state
            .lock()
            .await
            .ring
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity_type: "Event".into(),
                identifier: id.to_string(),
            })
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.ring.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // ── Realtime ─────────────────────────────────────────────────────

    /// Receive every message published from now on.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Arc<RealtimeMessage>> {
        self.inner.broadcaster.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcaster.subscriber_count()
    }

    /// Announce a camera status change on the `camera_status` channel.
    pub fn publish_camera_status(&self, camera_id: &str, status: &str) -> usize {
        self.inner
            .broadcaster
            .publish(RealtimeMessage::CameraStatus(CameraStatus {
                camera_id: camera_id.to_owned(),
                status: status.to_owned(),
            }))
    }

    /// Push a free-form alert on the `alert` channel.
    pub fn publish_alert(&self, notice: AlertNotice) -> usize {
        self.inner.broadcaster.publish(RealtimeMessage::Alert(notice))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use homewatch_api::Channel;

    fn relay() -> (Relay, ManualClock) {
        let clock = ManualClock::at("2026-10-15T08:00:00Z".parse().unwrap());
        (
            Relay::with_clock(RelayConfig::default(), Arc::new(clock.clone())),
            clock,
        )
    }

    #[tokio::test]
    async fn sequential_ids_strictly_increase() {
        let (relay, _clock) = relay();
        let raw = RawNotification::new("motion_detected", "raspberry-1");

        let mut last = 0;
        for _ in 0..5 {
            let ack = relay.ingest(&raw).await.unwrap();
            assert!(ack.id > last);
            last = ack.id;
        }
        assert_eq!(relay.len().await, 5);
    }

    #[tokio::test]
    async fn invalid_notification_leaves_no_trace() {
        let (relay, _clock) = relay();
        let mut rx = relay.subscribe();

        let err = relay
            .ingest(&RawNotification {
                device_id: Some("raspberry-1".into()),
                ..RawNotification::default()
            })
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(relay.is_empty().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ingest_broadcasts_shaped_message() {
        let (relay, _clock) = relay();
        let mut rx = relay.subscribe();

        relay
            .ingest(&RawNotification::new("button_pressed", "raspberry-2").with_detail("source", "Button"))
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.channel(), Channel::ButtonPressed);
    }

    #[tokio::test]
    async fn camera_status_and_alert_reach_subscribers() {
        let (relay, _clock) = relay();
        let mut rx = relay.subscribe();

        assert_eq!(relay.publish_camera_status("cam-porch", "offline"), 1);
        assert_eq!(
            relay.publish_alert(AlertNotice {
                title: "Intrusion".into(),
                message: "Porte forcée".into(),
                device_id: "raspberry-2".into(),
                kind: "intrusion".into(),
            }),
            1
        );

        let status = rx.recv().await.unwrap();
        assert_eq!(status.channel(), Channel::CameraStatus);
        let frame: serde_json::Value = serde_json::from_str(&status.to_frame().unwrap()).unwrap();
        assert_eq!(frame["channel"], "camera_status");
        assert_eq!(frame["payload"]["camera_id"], "cam-porch");
        assert_eq!(frame["payload"]["status"], "offline");

        let alert = rx.recv().await.unwrap();
        let frame: serde_json::Value = serde_json::from_str(&alert.to_frame().unwrap()).unwrap();
        assert_eq!(frame["channel"], "alert");
        assert_eq!(frame["payload"]["title"], "Intrusion");
        assert_eq!(frame["payload"]["type"], "intrusion");
        assert!(relay.recent(None).await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_order_matches_insertion_order() {
        let (relay, clock) = relay();
        let mut rx = relay.subscribe();

        for device in ["a", "b", "c"] {
            clock.advance(std::time::Duration::from_millis(3));
            relay.ingest(&RawNotification::new("door_opened", device)).await.unwrap();
        }

        let stored: Vec<String> = relay
            .recent(None)
            .await
            .into_iter()
            .rev()
            .map(|e| e.device_id)
            .collect();
        let mut published = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let RealtimeMessage::Event(event) = msg.as_ref() {
                published.push(event.device_id.clone());
            }
        }
        assert_eq!(stored, published);
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let (relay, _clock) = relay();
        let ack = relay
            .ingest(&RawNotification::new("motion_detected", "raspberry-1"))
            .await
            .unwrap();

        assert_eq!(relay.get(ack.id).await.unwrap().location, "Maison");
        assert!(relay.get(ack.id + 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn recent_defaults_to_fifty() {
        let (relay, _clock) = relay();
        for _ in 0..60 {
            relay
                .ingest(&RawNotification::new("motion_detected", "raspberry-1"))
                .await
                .unwrap();
        }
        assert_eq!(relay.recent(None).await.len(), 50);
        assert_eq!(relay.recent(Some(500)).await.len(), 60);
    }
}
