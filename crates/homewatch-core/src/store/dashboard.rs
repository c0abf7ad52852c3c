// ── Dashboard event/alert store ──
//
// Client-side mirror of recent events plus the alerts derived from them.
// Plain `&mut self` state machine: one task owns it and feeds it realtime
// messages, initial loads and user actions in order.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use homewatch_api::event::{BUTTON_PRESSED, MOTION_DETECTED};
use homewatch_api::{AlertNotice, ButtonPressed, Event, EventDetails, MotionDetected, RealtimeMessage};

use super::persist::Persistence;
use crate::clock::{Clock, IdGenerator, SystemClock};
use crate::error::CoreError;

/// Persistence key for the dashboard (only `mode` is stored).
pub const STORAGE_KEY: &str = "surveillance-storage";

/// Events mirrored on the client.
pub const EVENT_MIRROR_CAPACITY: usize = 100;

// ── Types ────────────────────────────────────────────────────────────

/// Operating mode. Decides whether motion raises alerts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Every sensor notifies.
    Surveillance,
    /// Only the pressure mat notifies.
    #[default]
    Actif,
}

/// A client-side, acknowledgeable notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub device_id: String,
    /// `motion`, `button`, or whatever an `alert` producer sent.
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraState {
    pub id: String,
    pub name: String,
    pub status: String,
    pub location: String,
}

#[derive(Debug, Deserialize)]
struct PersistedDashboard {
    #[serde(default)]
    mode: Mode,
}

fn default_cameras() -> Vec<CameraState> {
    [
        ("raspberry-01", "Caméra 1", "Entrée"),
        ("raspberry-02", "Caméra 2", "Salon"),
    ]
    .into_iter()
    .map(|(id, name, location)| CameraState {
        id: id.into(),
        name: name.into(),
        status: "offline".into(),
        location: location.into(),
    })
    .collect()
}

// ── DashboardStore ───────────────────────────────────────────────────

pub struct DashboardStore {
    mode: Mode,
    cameras: Vec<CameraState>,
    events: VecDeque<Event>,
    /// Newest first.
    alerts: Vec<Alert>,
    ws_connected: bool,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
    persistence: Arc<dyn Persistence>,
}

impl DashboardStore {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self::with_clock(persistence, Arc::new(SystemClock))
    }

    /// Build the store, restoring `mode` from `persistence`. An unreadable
    /// document is logged and the default mode is used.
    pub fn with_clock(persistence: Arc<dyn Persistence>, clock: Arc<dyn Clock>) -> Self {
        let mode = match persistence.load(STORAGE_KEY) {
            Ok(Some(doc)) => serde_json::from_value::<PersistedDashboard>(doc)
                .map(|p| p.mode)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "ignoring unreadable dashboard state");
                    Mode::default()
                }),
            Ok(None) => Mode::default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load dashboard state");
                Mode::default()
            }
        };

        Self {
            mode,
            cameras: default_cameras(),
            events: VecDeque::with_capacity(EVENT_MIRROR_CAPACITY),
            alerts: Vec::new(),
            ws_connected: false,
            ids: IdGenerator::new(),
            clock,
            persistence,
        }
    }

    // ── Realtime reconciliation ──────────────────────────────────────

    /// Apply one realtime message. Returns the alert it raised, if any.
    pub fn apply(&mut self, message: &RealtimeMessage) -> Option<Alert> {
        match message {
            RealtimeMessage::Event(event) => {
                self.add_event(event.as_ref().clone());
                None
            }
            RealtimeMessage::MotionDetected(payload) => {
                let entry = self.mirror_motion(payload);
                self.add_event(entry);
                (self.mode == Mode::Surveillance).then(|| {
                    self.add_alert(AlertNotice {
                        title: "Mouvement détecté".into(),
                        message: format!("Mouvement détecté par {}", payload.device_id),
                        device_id: payload.device_id.clone(),
                        kind: "motion".into(),
                    })
                    .clone()
                })
            }
            RealtimeMessage::ButtonPressed(payload) => {
                let entry = self.mirror_button(payload);
                self.add_event(entry);
                Some(
                    self.add_alert(AlertNotice {
                        title: "Alerte : Pression détectée".into(),
                        message: format!("Quelqu'un a marché sur le tapis ({})", payload.device_id),
                        device_id: payload.device_id.clone(),
                        kind: "button".into(),
                    })
                    .clone(),
                )
            }
            RealtimeMessage::CameraStatus(status) => {
                self.update_camera_status(&status.camera_id, &status.status);
                None
            }
            RealtimeMessage::Alert(notice) => Some(self.add_alert(notice.clone()).clone()),
            RealtimeMessage::Ping | RealtimeMessage::Pong => None,
        }
    }

    fn mirror_motion(&mut self, payload: &MotionDetected) -> Event {
        let id = self.ids.next_id(self.clock.now());
        mirror_entry(
            id,
            MOTION_DETECTED,
            &payload.device_id,
            payload.timestamp,
            &payload.location,
            &payload.source,
            &payload.details,
        )
    }

    fn mirror_button(&mut self, payload: &ButtonPressed) -> Event {
        let id = self.ids.next_id(self.clock.now());
        mirror_entry(
            id,
            BUTTON_PRESSED,
            &payload.device_id,
            payload.timestamp,
            &payload.location,
            &payload.button_name,
            &payload.details,
        )
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn add_event(&mut self, event: Event) {
        self.events.push_front(event);
        self.events.truncate(EVENT_MIRROR_CAPACITY);
    }

    /// Replace the mirror, e.g. with the initial query result.
    pub fn set_events(&mut self, events: Vec<Event>) {
        self.events = events.into_iter().take(EVENT_MIRROR_CAPACITY).collect();
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    // ── Alerts ───────────────────────────────────────────────────────

    /// Record a new unacknowledged alert, stamped now.
    pub fn add_alert(&mut self, notice: AlertNotice) -> &Alert {
        let now = self.clock.now();
        let alert = Alert {
            id: self.ids.next_id(now),
            title: notice.title,
            message: notice.message,
            device_id: notice.device_id,
            kind: notice.kind,
            timestamp: now,
            acknowledged: false,
        };
        tracing::info!(id = alert.id, kind = %alert.kind, device_id = %alert.device_id, "alert raised");
        self.alerts.insert(0, alert);
        &self.alerts[0]
    }

    /// Mark an alert acknowledged. Idempotent; returns whether it exists.
    pub fn acknowledge(&mut self, id: u64) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Remove an alert. Returns whether it existed.
    pub fn clear(&mut self, id: u64) -> bool {
        let before = self.alerts.len();
        self.alerts.retain(|a| a.id != id);
        self.alerts.len() != before
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn active_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| !a.acknowledged)
    }

    // ── Cameras / connection ─────────────────────────────────────────

    /// Returns whether the camera is known.
    pub fn update_camera_status(&mut self, camera_id: &str, status: &str) -> bool {
        match self.cameras.iter_mut().find(|c| c.id == camera_id) {
            Some(camera) => {
                status.clone_into(&mut camera.status);
                true
            }
            None => {
                tracing::debug!(camera_id, "status for unknown camera ignored");
                false
            }
        }
    }

    pub fn cameras(&self) -> &[CameraState] {
        &self.cameras
    }

    pub fn set_ws_connected(&mut self, connected: bool) {
        self.ws_connected = connected;
    }

    pub fn ws_connected(&self) -> bool {
        self.ws_connected
    }

    // ── Mode ─────────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch mode and persist it.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), CoreError> {
        self.mode = mode;
        self.persistence.save(STORAGE_KEY, &json!({ "mode": mode }))
    }
}

fn mirror_entry(
    id: u64,
    event_type: &str,
    device_id: &str,
    timestamp: DateTime<Utc>,
    location: &str,
    label: &str,
    details: &EventDetails,
) -> Event {
    Event {
        id,
        event_type: event_type.to_owned(),
        device_id: device_id.to_owned(),
        timestamp,
        event_id: details.event_id.clone(),
        source: details.source.clone(),
        source_name: label.to_owned(),
        location: location.to_owned(),
        data: details.data.clone(),
        mqtt_topic: None,
        original_timestamp: None,
        metadata: serde_json::to_value(details).unwrap_or_default(),
    }
}
