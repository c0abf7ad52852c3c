// ── Network state ──
//
// Connectivity tracking for the dashboard client: the tracker state
// machine, pluggable probes, and the periodic monitor that drives them.

pub mod monitor;
pub mod probe;
pub mod tracker;

pub use monitor::{NetworkMonitor, ProbeOutcome};
pub use probe::{ConnectivityProbe, Fault, FaultInjectingProbe, HttpProbe};
pub use tracker::{
    ConnectionQuality, ConnectionStats, FlushReport, HistoryEntry, HistoryKind, NetworkTracker,
    OfflineSink, QualityMetrics, QueuedEvent, Transition,
};
