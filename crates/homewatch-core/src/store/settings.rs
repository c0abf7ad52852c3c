// ── Surveillance settings ──
//
// Scenario catalogue, schedules and notification/network/recording
// preferences. Loaded once at construction, saved after every mutation
// under `surveillance-settings`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{AsRefStr, Display, EnumString};

use super::persist::Persistence;
use crate::clock::{Clock, IdGenerator, SystemClock};
use crate::error::CoreError;

/// Persistence key for the settings document.
pub const SETTINGS_KEY: &str = "surveillance-settings";

// ── Scenarios ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

/// Behaviour flags bundled by a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    pub alerts_enabled: bool,
    pub motion_detection: bool,
    pub button_detection: bool,
    pub recording_enabled: bool,
    pub notification_sound: bool,
    pub notification_desktop: bool,
    pub notification_email: bool,
    pub notification_sms: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion_sensitivity: Option<Sensitivity>,
    pub auto_record: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub settings: ScenarioSettings,
}

/// The built-in scenarios, keyed by id.
pub fn default_scenarios() -> IndexMap<String, Scenario> {
    let flags = |alerts, motion, button, recording, sound, desktop| ScenarioSettings {
        alerts_enabled: alerts,
        motion_detection: motion,
        button_detection: button,
        recording_enabled: recording,
        notification_sound: sound,
        notification_desktop: desktop,
        ..ScenarioSettings::default()
    };

    let entries = [
        (
            "normal",
            "Normal",
            "Surveillance standard avec alertes",
            flags(true, true, true, false, true, true),
        ),
        (
            "discreet",
            "Discret",
            "Surveillance silencieuse sans alertes sonores",
            flags(true, true, true, true, false, false),
        ),
        (
            "night",
            "Mode Nuit",
            "Surveillance nocturne renforcée",
            ScenarioSettings {
                motion_sensitivity: Some(Sensitivity::High),
                auto_record: true,
                ..flags(true, true, true, true, true, true)
            },
        ),
        (
            "away",
            "Absence",
            "Mode absence - alertes maximales",
            ScenarioSettings {
                notification_email: true,
                notification_sms: true,
                motion_sensitivity: Some(Sensitivity::High),
                auto_record: true,
                ..flags(true, true, true, true, true, true)
            },
        ),
        (
            "home",
            "À la maison",
            "Mode présence - surveillance légère",
            flags(false, false, true, false, false, false),
        ),
        (
            "off",
            "Désactivé",
            "Surveillance désactivée",
            flags(false, false, false, false, false, false),
        ),
    ];

    entries
        .into_iter()
        .map(|(id, name, description, settings)| {
            (
                id.to_owned(),
                Scenario {
                    name: name.to_owned(),
                    description: description.to_owned(),
                    settings,
                },
            )
        })
        .collect()
}

// ── Time of day ──────────────────────────────────────────────────────

/// Wall-clock time with minute precision, written `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    fn minutes(self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::validation(format!("invalid time '{s}', expected HH:MM"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = h.parse().map_err(|_| invalid())?;
        let minute = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive window check; a window whose end precedes its start wraps
/// past midnight.
fn in_window(now: TimeOfDay, start: TimeOfDay, end: TimeOfDay) -> bool {
    let (now, start, end) = (now.minutes(), start.minutes(), end.minutes());
    if end < start {
        now >= start || now <= end
    } else {
        now >= start && now <= end
    }
}

// ── Preference sections ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VideoQuality {
    #[default]
    Auto,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub auto_reconnect: bool,
    pub reconnect_interval_ms: u64,
    pub max_retries: u32,
    pub offline_mode: bool,
    pub cache_duration_hours: u32,
    pub low_bandwidth_mode: bool,
    pub video_quality: VideoQuality,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_interval_ms: 5000,
            max_retries: 10,
            offline_mode: true,
            cache_duration_hours: 24,
            low_bandwidth_mode: false,
            video_quality: VideoQuality::Auto,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSchedule {
    pub enabled: bool,
    pub times: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionZone {
    pub enabled: bool,
    pub sensitivity: Sensitivity,
    pub schedule: ZoneSchedule,
}

impl Default for DetectionZone {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitivity: Sensitivity::Medium,
            schedule: ZoneSchedule::default(),
        }
    }
}

/// A weekly window during which a scenario applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: u64,
    pub name: String,
    pub enabled: bool,
    /// 0 = Sunday … 6 = Saturday.
    pub days: Vec<u8>,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub scenario: String,
}

/// A schedule before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub name: String,
    pub enabled: bool,
    pub days: Vec<u8>,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub scenario: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: TimeOfDay(NaiveTime::MIN + chrono::Duration::hours(22)),
            end: TimeOfDay(NaiveTime::MIN + chrono::Duration::hours(7)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub sound: bool,
    pub desktop: bool,
    pub email: bool,
    pub sms: bool,
    pub email_address: String,
    pub phone_number: String,
    pub quiet_hours: QuietHours,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sound: true,
            desktop: true,
            email: false,
            sms: false,
            email_address: String::new(),
            phone_number: String::new(),
            quiet_hours: QuietHours::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub auto_record: bool,
    pub record_duration_secs: u32,
    pub pre_buffer_secs: u32,
    pub post_buffer_secs: u32,
    pub storage_limit_gb: u32,
    pub retention_days: u32,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            auto_record: false,
            record_duration_secs: 15,
            pre_buffer_secs: 5,
            post_buffer_secs: 5,
            storage_limit_gb: 50,
            retention_days: 7,
        }
    }
}

/// Everything that is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub active_scenario: String,
    pub network: NetworkSettings,
    pub detection_zones: IndexMap<String, DetectionZone>,
    pub schedules: Vec<Schedule>,
    pub notifications: NotificationSettings,
    pub recording: RecordingSettings,
}

impl Default for Preferences {
    fn default() -> Self {
        let at = |h, m| TimeOfDay(NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN));
        Self {
            active_scenario: "normal".into(),
            network: NetworkSettings::default(),
            detection_zones: ["raspberry-01", "raspberry-02"]
                .into_iter()
                .map(|id| (id.to_owned(), DetectionZone::default()))
                .collect(),
            schedules: vec![
                Schedule {
                    id: 1,
                    name: "Heures de travail".into(),
                    enabled: true,
                    days: vec![1, 2, 3, 4, 5],
                    start_time: at(8, 0),
                    end_time: at(18, 0),
                    scenario: "away".into(),
                },
                Schedule {
                    id: 2,
                    name: "Nuit".into(),
                    enabled: true,
                    days: vec![0, 1, 2, 3, 4, 5, 6],
                    start_time: at(22, 0),
                    end_time: at(7, 0),
                    scenario: "night".into(),
                },
            ],
            notifications: NotificationSettings::default(),
            recording: RecordingSettings::default(),
        }
    }
}

// ── SettingsStore ────────────────────────────────────────────────────

pub struct SettingsStore {
    prefs: Preferences,
    scenarios: IndexMap<String, Scenario>,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
    persistence: Arc<dyn Persistence>,
}

impl SettingsStore {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self::with_clock(persistence, Arc::new(SystemClock))
    }

    /// Build the store, restoring saved preferences. Missing sections fall
    /// back to defaults; an unreadable document is logged and ignored.
    pub fn with_clock(persistence: Arc<dyn Persistence>, clock: Arc<dyn Clock>) -> Self {
        let prefs = match persistence.load(SETTINGS_KEY) {
            Ok(Some(doc)) => serde_json::from_value(doc).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring unreadable settings");
                Preferences::default()
            }),
            Ok(None) => Preferences::default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load settings");
                Preferences::default()
            }
        };

        Self {
            prefs,
            scenarios: default_scenarios(),
            ids: IdGenerator::new(),
            clock,
            persistence,
        }
    }

    fn save(&self) -> Result<(), CoreError> {
        let doc = serde_json::to_value(&self.prefs).map_err(|e| CoreError::Persistence {
            key: SETTINGS_KEY.into(),
            message: e.to_string(),
        })?;
        self.persistence.save(SETTINGS_KEY, &doc)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn scenarios(&self) -> &IndexMap<String, Scenario> {
        &self.scenarios
    }

    pub fn active_scenario(&self) -> &str {
        &self.prefs.active_scenario
    }

    /// Flags of the active scenario; all off if the scenario is unknown.
    pub fn active_settings(&self) -> ScenarioSettings {
        self.scenarios
            .get(&self.prefs.active_scenario)
            .map(|s| s.settings.clone())
            .unwrap_or_default()
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.prefs.schedules
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn set_scenario(&mut self, scenario: &str) -> Result<(), CoreError> {
        if !self.scenarios.contains_key(scenario) {
            return Err(CoreError::validation(format!(
                "unknown scenario '{scenario}' (expected one of: {})",
                self.scenarios.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            )));
        }
        scenario.clone_into(&mut self.prefs.active_scenario);
        self.save()
    }

    pub fn update_network_settings(
        &mut self,
        update: impl FnOnce(&mut NetworkSettings),
    ) -> Result<(), CoreError> {
        update(&mut self.prefs.network);
        self.save()
    }

    /// Edit a camera's detection zone, creating it with defaults first.
    pub fn update_detection_zone(
        &mut self,
        camera_id: &str,
        update: impl FnOnce(&mut DetectionZone),
    ) -> Result<(), CoreError> {
        update(
            self.prefs
                .detection_zones
                .entry(camera_id.to_owned())
                .or_default(),
        );
        self.save()
    }

    /// Append a schedule and return its assigned id.
    pub fn add_schedule(&mut self, schedule: NewSchedule) -> Result<u64, CoreError> {
        if let Some(day) = schedule.days.iter().find(|d| **d > 6) {
            return Err(CoreError::validation(format!(
                "invalid weekday {day}, expected 0 (Sunday) to 6 (Saturday)"
            )));
        }
        let id = self.ids.next_id(self.clock.now());
        self.prefs.schedules.push(Schedule {
            id,
            name: schedule.name,
            enabled: schedule.enabled,
            days: schedule.days,
            start_time: schedule.start_time,
            end_time: schedule.end_time,
            scenario: schedule.scenario,
        });
        self.save()?;
        Ok(id)
    }

    /// Returns whether a schedule with `id` exists.
    pub fn update_schedule(
        &mut self,
        id: u64,
        update: impl FnOnce(&mut Schedule),
    ) -> Result<bool, CoreError> {
        let Some(schedule) = self.prefs.schedules.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        update(schedule);
        schedule.id = id;
        self.save()?;
        Ok(true)
    }

    pub fn delete_schedule(&mut self, id: u64) -> Result<bool, CoreError> {
        let before = self.prefs.schedules.len();
        self.prefs.schedules.retain(|s| s.id != id);
        if self.prefs.schedules.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn update_notification_settings(
        &mut self,
        update: impl FnOnce(&mut NotificationSettings),
    ) -> Result<(), CoreError> {
        update(&mut self.prefs.notifications);
        self.save()
    }

    pub fn update_recording_settings(
        &mut self,
        update: impl FnOnce(&mut RecordingSettings),
    ) -> Result<(), CoreError> {
        update(&mut self.prefs.recording);
        self.save()
    }

    /// Activate the scenario of the first enabled schedule covering `now`
    /// (local time). Returns the scenario switched to, if any.
    pub fn check_schedule(&mut self, now: NaiveDateTime) -> Result<Option<String>, CoreError> {
        let weekday = u8::try_from(now.weekday().num_days_from_sunday()).unwrap_or(0);
        let Some(time) = TimeOfDay::new(now.hour(), now.minute()) else {
            return Ok(None);
        };

        let matched = self.prefs.schedules.iter().find(|s| {
            s.enabled && s.days.contains(&weekday) && in_window(time, s.start_time, s.end_time)
        });

        match matched {
            Some(schedule) if schedule.scenario != self.prefs.active_scenario => {
                let scenario = schedule.scenario.clone();
                tracing::info!(schedule = %schedule.name, %scenario, "schedule switched scenario");
                self.prefs.active_scenario.clone_from(&scenario);
                self.save()?;
                Ok(Some(scenario))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::persist::MemoryPersistence;
    use chrono::NaiveDate;

    fn store() -> (SettingsStore, Arc<MemoryPersistence>) {
        let persistence = Arc::new(MemoryPersistence::new());
        let clock = ManualClock::at("2026-10-15T08:00:00Z".parse().unwrap());
        (
            SettingsStore::with_clock(persistence.clone(), Arc::new(clock)),
            persistence,
        )
    }

    /// 2026-10-12 is a Monday.
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn defaults_match_catalogue() {
        let (store, _) = store();
        assert_eq!(store.active_scenario(), "normal");
        assert_eq!(
            store.scenarios().keys().collect::<Vec<_>>(),
            ["normal", "discreet", "night", "away", "home", "off"]
        );
        assert!(store.active_settings().alerts_enabled);
        assert_eq!(store.schedules().len(), 2);
    }

    #[test]
    fn workday_schedule_switches_to_away() {
        let (mut store, _) = store();
        assert_eq!(store.check_schedule(at(12, 10, 30)).unwrap().as_deref(), Some("away"));
        assert_eq!(store.active_scenario(), "away");
        assert!(store.active_settings().notification_sms);

        // Already active: no second switch.
        assert_eq!(store.check_schedule(at(12, 11, 0)).unwrap(), None);
    }

    #[test]
    fn night_window_wraps_midnight() {
        let (mut store, _) = store();
        // Sunday 23:30 and Monday 06:59 are both inside 22:00–07:00.
        assert_eq!(store.check_schedule(at(11, 23, 30)).unwrap().as_deref(), Some("night"));
        store.set_scenario("normal").unwrap();
        assert_eq!(store.check_schedule(at(12, 6, 59)).unwrap().as_deref(), Some("night"));
        store.set_scenario("normal").unwrap();
        // Sunday afternoon matches nothing.
        assert_eq!(store.check_schedule(at(11, 15, 0)).unwrap(), None);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let start = TimeOfDay::new(8, 0).unwrap();
        let end = TimeOfDay::new(18, 0).unwrap();
        assert!(in_window(start, start, end));
        assert!(in_window(end, start, end));
        assert!(!in_window(TimeOfDay::new(18, 1).unwrap(), start, end));
    }

    #[test]
    fn unknown_scenario_is_rejected() {
        let (mut store, _) = store();
        assert!(store.set_scenario("party").unwrap_err().is_validation());
        assert_eq!(store.active_scenario(), "normal");
    }

    #[test]
    fn schedule_crud_persists() {
        let (mut store, persistence) = store();
        let id = store
            .add_schedule(NewSchedule {
                name: "Weekend".into(),
                enabled: true,
                days: vec![0, 6],
                start_time: "09:00".parse().unwrap(),
                end_time: "12:00".parse().unwrap(),
                scenario: "home".into(),
            })
            .unwrap();

        assert!(store.update_schedule(id, |s| s.enabled = false).unwrap());
        assert!(!store.update_schedule(id + 1, |s| s.enabled = true).unwrap());

        let reloaded = SettingsStore::new(persistence.clone());
        let saved = reloaded.schedules().iter().find(|s| s.id == id).unwrap();
        assert!(!saved.enabled);
        assert_eq!(saved.start_time.to_string(), "09:00");

        assert!(store.delete_schedule(id).unwrap());
        assert!(!store.delete_schedule(id).unwrap());
        assert_eq!(SettingsStore::new(persistence).schedules().len(), 2);
    }

    #[test]
    fn invalid_weekday_is_rejected() {
        let (mut store, _) = store();
        let err = store
            .add_schedule(NewSchedule {
                name: "Bad".into(),
                enabled: true,
                days: vec![7],
                start_time: "09:00".parse().unwrap(),
                end_time: "10:00".parse().unwrap(),
                scenario: "home".into(),
            })
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn section_updates_merge_and_persist() {
        let (mut store, persistence) = store();
        store.update_network_settings(|n| n.low_bandwidth_mode = true).unwrap();
        store
            .update_detection_zone("raspberry-03", |z| z.sensitivity = Sensitivity::High)
            .unwrap();
        store.update_notification_settings(|n| n.sound = false).unwrap();
        store.update_recording_settings(|r| r.retention_days = 30).unwrap();

        let prefs = SettingsStore::new(persistence).preferences().clone();
        assert!(prefs.network.low_bandwidth_mode);
        assert_eq!(prefs.network.max_retries, 10);
        assert!(prefs.detection_zones["raspberry-03"].enabled);
        assert_eq!(prefs.detection_zones["raspberry-03"].sensitivity, Sensitivity::High);
        assert!(!prefs.notifications.sound);
        assert_eq!(prefs.recording.retention_days, 30);
    }

    #[test]
    fn time_of_day_parsing() {
        assert_eq!("7:05".parse::<TimeOfDay>().unwrap().to_string(), "07:05");
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }
}
