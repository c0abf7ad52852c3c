// ── Client-side state ──
//
// Dashboard and settings stores plus the persistence seam they save through.

pub mod dashboard;
pub mod persist;
pub mod settings;

pub use dashboard::{Alert, CameraState, DashboardStore, Mode};
pub use persist::{JsonFilePersistence, MemoryPersistence, Persistence};
pub use settings::{
    DetectionZone, NetworkSettings, NewSchedule, NotificationSettings, Preferences,
    RecordingSettings, Scenario, ScenarioSettings, Schedule, SettingsStore, TimeOfDay,
};
