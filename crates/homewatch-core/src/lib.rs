// homewatch-core: event relay, realtime subscriber and dashboard state between homewatch-api and consumers (server/CLI).

pub mod clock;
pub mod config;
pub mod error;
pub mod network;
pub mod relay;
pub mod store;
pub mod subscriber;

// ── Primary re-exports ──────────────────────────────────────────────
pub use clock::{Clock, IdGenerator, ManualClock, SystemClock};
pub use config::{ClientConfig, LabelTables, RelayConfig};
pub use error::CoreError;
pub use network::{
    ConnectionQuality, ConnectionStats, ConnectivityProbe, Fault, FaultInjectingProbe, FlushReport,
    HistoryEntry, HistoryKind, HttpProbe, NetworkMonitor, NetworkTracker, OfflineSink,
    ProbeOutcome, QualityMetrics, QueuedEvent, Transition,
};
pub use relay::Relay;
pub use store::{
    Alert, CameraState, DashboardStore, JsonFilePersistence, MemoryPersistence, Mode,
    Persistence, SettingsStore,
};
pub use subscriber::{
    ConnectionState, LifecycleHooks, ListenerResult, RealtimeSubscriber, Subscription,
};

// Wire types consumers need alongside the core API.
pub use homewatch_api::{
    AlertNotice, Channel, Event, EventAck, RawNotification, RealtimeMessage,
};
