// ── Network-state tracker ──
//
// Online/offline edges, connection quality, downtime accounting, a
// bounded transition history and the offline delivery queue. Independent
// of the realtime link: callers feed it probe results and connectivity
// signals.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use homewatch_api::{EventsClient, RawNotification};

use crate::clock::{Clock, elapsed_ms};
use crate::error::CoreError;

/// Transition entries kept.
pub const HISTORY_CAPACITY: usize = 100;

/// Latency above which the link is `Poor`.
pub const POOR_LATENCY_MS: u64 = 300;

/// Latency above which the link is `Fair`.
pub const FAIR_LATENCY_MS: u64 = 100;

// ── Types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionQuality {
    Good,
    Fair,
    Poor,
    Offline,
}

impl ConnectionQuality {
    /// Quality implied by a latency sample on a live link.
    pub fn from_latency(latency_ms: u64) -> Self {
        if latency_ms > POOR_LATENCY_MS {
            Self::Poor
        } else if latency_ms > FAIR_LATENCY_MS {
            Self::Fair
        } else {
            Self::Good
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub latency_ms: u64,
    pub jitter_ms: u64,
    pub packet_loss: f64,
    pub bandwidth_kbps: f64,
    pub reconnect_count: u32,
    pub total_downtime_ms: u64,
    /// Percentage, refreshed whenever the history changes.
    pub uptime: f64,
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            jitter_ms: 0,
            packet_loss: 0.0,
            bandwidth_kbps: 0.0,
            reconnect_count: 0,
            total_downtime_ms: 0,
            uptime: 100.0,
        }
    }
}

/// Optional metric samples for [`NetworkTracker::update_connection_quality`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityMetrics {
    pub latency_ms: Option<u64>,
    pub jitter_ms: Option<u64>,
    pub packet_loss: Option<f64>,
    pub bandwidth_kbps: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HistoryKind {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub timestamp: DateTime<Utc>,
    /// Length of the outage that just ended (online entries only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downtime_ms: Option<u64>,
}

/// A notification captured while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    pub payload: RawNotification,
    pub queued_at: DateTime<Utc>,
}

/// What a call to [`NetworkTracker::set_online`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The call did not change the online state.
    None,
    WentOffline,
    CameOnline {
        downtime: Duration,
        /// The offline queue is non-empty and should be flushed.
        flush_pending: bool,
    },
}

/// Result of one offline-queue flush.
#[derive(Debug)]
pub struct FlushReport {
    pub delivered: usize,
    /// Items still queued, in original order.
    pub remaining: usize,
    /// The failure that stopped the flush, if any.
    pub error: Option<CoreError>,
}

impl FlushReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.remaining == 0
    }
}

/// Delivery target for queued notifications.
pub trait OfflineSink: Send + Sync {
    fn deliver(&self, payload: &RawNotification) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl OfflineSink for EventsClient {
    async fn deliver(&self, payload: &RawNotification) -> Result<(), CoreError> {
        self.submit(payload).await?;
        Ok(())
    }
}

// ── NetworkTracker ───────────────────────────────────────────────────

pub struct NetworkTracker {
    online: bool,
    quality: ConnectionQuality,
    last_online: Option<DateTime<Utc>>,
    last_offline: Option<DateTime<Utc>>,
    stats: ConnectionStats,
    history: VecDeque<HistoryEntry>,
    queue: VecDeque<QueuedEvent>,
    clock: Arc<dyn Clock>,
}

impl NetworkTracker {
    /// A tracker starting in the given state. One starting offline records
    /// that as its first history entry so uptime has a reference point.
    pub fn new(online: bool, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let mut tracker = Self {
            online,
            quality: if online {
                ConnectionQuality::Good
            } else {
                ConnectionQuality::Offline
            },
            last_online: online.then_some(now),
            last_offline: (!online).then_some(now),
            stats: ConnectionStats::default(),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            queue: VecDeque::new(),
            clock,
        };
        if !online {
            tracker.record(HistoryKind::Offline, now, None);
        }
        tracker
    }

    // ── Edges ────────────────────────────────────────────────────────

    /// Apply a connectivity signal. Only an actual edge changes state.
    pub fn set_online(&mut self, online: bool) -> Transition {
        let now = self.clock.now();

        match (self.online, online) {
            (false, true) => {
                let downtime_ms = self.last_offline.map_or(0, |t| elapsed_ms(t, now));
                self.online = true;
                self.last_online = Some(now);
                self.quality = ConnectionQuality::Good;
                self.stats.reconnect_count += 1;
                self.stats.total_downtime_ms += downtime_ms;
                self.record(HistoryKind::Online, now, Some(downtime_ms));

                tracing::info!(downtime_ms, queued = self.queue.len(), "connection restored");
                Transition::CameOnline {
                    downtime: Duration::from_millis(downtime_ms),
                    flush_pending: !self.queue.is_empty(),
                }
            }
            (true, false) => {
                self.online = false;
                self.last_offline = Some(now);
                self.quality = ConnectionQuality::Offline;
                self.record(HistoryKind::Offline, now, None);

                tracing::warn!("connection lost");
                Transition::WentOffline
            }
            _ => Transition::None,
        }
    }

    fn record(&mut self, kind: HistoryKind, timestamp: DateTime<Utc>, downtime_ms: Option<u64>) {
        self.history.push_back(HistoryEntry {
            kind,
            timestamp,
            downtime_ms,
        });
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.stats.uptime = self.uptime_percentage();
    }

    // ── Quality ──────────────────────────────────────────────────────

    /// Record a latency sample. Quality follows it only while online.
    pub fn update_latency(&mut self, latency_ms: u64) {
        self.stats.latency_ms = latency_ms;
        self.quality = if self.online {
            ConnectionQuality::from_latency(latency_ms)
        } else {
            ConnectionQuality::Offline
        };
    }

    /// Overwrite quality and whichever metric samples are supplied.
    pub fn update_connection_quality(&mut self, quality: ConnectionQuality, metrics: QualityMetrics) {
        self.quality = quality;
        if let Some(v) = metrics.latency_ms {
            self.stats.latency_ms = v;
        }
        if let Some(v) = metrics.jitter_ms {
            self.stats.jitter_ms = v;
        }
        if let Some(v) = metrics.packet_loss {
            self.stats.packet_loss = v;
        }
        if let Some(v) = metrics.bandwidth_kbps {
            self.stats.bandwidth_kbps = v;
        }
    }

    // ── Offline queue ────────────────────────────────────────────────

    pub fn queue_offline(&mut self, payload: RawNotification) {
        self.queue.push_back(QueuedEvent {
            payload,
            queued_at: self.clock.now(),
        });
    }

    /// Deliver queued notifications in FIFO order, stopping at the first
    /// failure. Delivered items leave the queue; the failed item and
    /// everything after it stay, in order.
    pub async fn process_offline_queue<S: OfflineSink>(&mut self, sink: &S) -> FlushReport {
        let mut delivered = 0;
        let mut error = None;

        if !self.queue.is_empty() {
            tracing::info!(queued = self.queue.len(), "flushing offline queue");
        }

        while let Some(item) = self.queue.front() {
            match sink.deliver(&item.payload).await {
                Ok(()) => {
                    self.queue.pop_front();
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, delivered, remaining = self.queue.len(), "offline flush stopped");
                    error = Some(e);
                    break;
                }
            }
        }

        FlushReport {
            delivered,
            remaining: self.queue.len(),
            error,
        }
    }

    /// Flush the queue if `transition` asked for it.
    pub async fn flush_if_pending<S: OfflineSink>(
        &mut self,
        transition: Transition,
        sink: &S,
    ) -> Option<FlushReport> {
        match transition {
            Transition::CameOnline {
                flush_pending: true,
                ..
            } => Some(self.process_offline_queue(sink).await),
            _ => None,
        }
    }

    pub fn clear_offline_queue(&mut self) {
        self.queue.clear();
    }

    pub fn offline_queue(&self) -> impl Iterator<Item = &QueuedEvent> {
        self.queue.iter()
    }

    // ── Stats ────────────────────────────────────────────────────────

    /// Share of time online since the first history entry, in `[0, 100]`.
    ///
    /// An outage still in progress counts as downtime. Without history the
    /// answer is 100.
    #[allow(clippy::cast_precision_loss)]
    pub fn uptime_percentage(&self) -> f64 {
        let Some(first) = self.history.front() else {
            return 100.0;
        };
        let now = self.clock.now();
        let total = elapsed_ms(first.timestamp, now);
        if total == 0 {
            return 100.0;
        }

        let ongoing = match (self.online, self.last_offline) {
            (false, Some(since)) => elapsed_ms(since, now),
            _ => 0,
        };
        let down = self.stats.total_downtime_ms.saturating_add(ongoing);
        let up = total.saturating_sub(down);
        (up as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn reset_stats(&mut self) {
        self.stats = ConnectionStats::default();
        self.history.clear();
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn quality(&self) -> ConnectionQuality {
        self.quality
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn last_online(&self) -> Option<DateTime<Utc>> {
        self.last_online
    }

    pub fn last_offline(&self) -> Option<DateTime<Utc>> {
        self.last_offline
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Mutex;

    fn tracker(online: bool) -> (NetworkTracker, ManualClock) {
        let clock = ManualClock::at("2026-10-15T08:00:00Z".parse().unwrap());
        (NetworkTracker::new(online, Arc::new(clock.clone())), clock)
    }

    /// Records deliveries; fails on the n-th call (1-based).
    struct FlakySink {
        fail_on: usize,
        calls: Mutex<usize>,
        delivered: Mutex<Vec<String>>,
    }

    impl FlakySink {
        fn failing_on(fail_on: usize) -> Self {
            Self {
                fail_on,
                calls: Mutex::new(0),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl OfflineSink for FlakySink {
        async fn deliver(&self, payload: &RawNotification) -> Result<(), CoreError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if call == self.fail_on {
                return Err(CoreError::Delivery {
                    message: "relay unreachable".into(),
                });
            }
            self.delivered
                .lock()
                .unwrap()
                .push(payload.device_id.clone().unwrap_or_default());
            Ok(())
        }
    }

    fn queued(tracker: &mut NetworkTracker, n: usize) {
        for i in 1..=n {
            tracker.queue_offline(RawNotification::new("motion_detected", format!("dev-{i}")));
        }
    }

    #[test]
    fn outage_counts_reconnect_and_exact_downtime() {
        let (mut net, clock) = tracker(true);

        assert_eq!(net.set_online(false), Transition::WentOffline);
        assert_eq!(net.quality(), ConnectionQuality::Offline);
        clock.advance(Duration::from_millis(4_250));

        let transition = net.set_online(true);
        assert_eq!(
            transition,
            Transition::CameOnline {
                downtime: Duration::from_millis(4_250),
                flush_pending: false,
            }
        );
        assert_eq!(net.stats().reconnect_count, 1);
        assert_eq!(net.stats().total_downtime_ms, 4_250);
        assert_eq!(net.quality(), ConnectionQuality::Good);

        let last = net.history().last().unwrap();
        assert_eq!(last.kind, HistoryKind::Online);
        assert_eq!(last.downtime_ms, Some(4_250));
    }

    #[test]
    fn repeated_signal_is_a_no_op() {
        let (mut net, _clock) = tracker(true);
        assert_eq!(net.set_online(true), Transition::None);
        assert_eq!(net.history().count(), 0);

        net.set_online(false);
        assert_eq!(net.set_online(false), Transition::None);
        assert_eq!(net.history().count(), 1);
    }

    #[test]
    fn latency_thresholds_apply_only_online() {
        let (mut net, _clock) = tracker(true);
        net.update_latency(100);
        assert_eq!(net.quality(), ConnectionQuality::Good);
        net.update_latency(101);
        assert_eq!(net.quality(), ConnectionQuality::Fair);
        net.update_latency(301);
        assert_eq!(net.quality(), ConnectionQuality::Poor);

        net.set_online(false);
        net.update_latency(20);
        assert_eq!(net.quality(), ConnectionQuality::Offline);
        assert_eq!(net.stats().latency_ms, 20);
    }

    #[test]
    fn quality_override_merges_metrics() {
        let (mut net, _clock) = tracker(true);
        net.update_latency(40);
        net.update_connection_quality(
            ConnectionQuality::Poor,
            QualityMetrics {
                jitter_ms: Some(100),
                ..QualityMetrics::default()
            },
        );
        assert_eq!(net.quality(), ConnectionQuality::Poor);
        assert_eq!(net.stats().latency_ms, 40);
        assert_eq!(net.stats().jitter_ms, 100);
    }

    #[tokio::test]
    async fn flush_stops_at_third_item_and_keeps_the_rest() {
        let (mut net, _clock) = tracker(false);
        queued(&mut net, 5);

        let sink = FlakySink::failing_on(3);
        let report = net.process_offline_queue(&sink).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.remaining, 3);
        assert!(report.error.is_some());
        assert!(!report.is_complete());
        assert_eq!(*sink.delivered.lock().unwrap(), vec!["dev-1", "dev-2"]);

        let left: Vec<_> = net
            .offline_queue()
            .map(|q| q.payload.device_id.clone().unwrap())
            .collect();
        assert_eq!(left, vec!["dev-3", "dev-4", "dev-5"]);
    }

    #[tokio::test]
    async fn reconnect_requests_flush_and_full_success_empties_queue() {
        let (mut net, _clock) = tracker(false);
        queued(&mut net, 2);

        let transition = net.set_online(true);
        assert!(matches!(
            transition,
            Transition::CameOnline {
                flush_pending: true,
                ..
            }
        ));

        let report = net
            .flush_if_pending(transition, &FlakySink::failing_on(usize::MAX))
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(net.offline_queue().count(), 0);
    }

    #[test]
    fn uptime_without_history_is_full() {
        let (net, clock) = tracker(true);
        clock.advance(Duration::from_secs(60));
        assert!((net.uptime_percentage() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tracker_that_starts_offline_reports_zero_uptime() {
        let (net, clock) = tracker(false);
        clock.advance(Duration::from_secs(60));
        assert!(net.uptime_percentage().abs() < f64::EPSILON);
    }

    #[test]
    fn uptime_reflects_completed_and_ongoing_outages() {
        let (mut net, clock) = tracker(true);
        net.set_online(false);
        clock.advance(Duration::from_secs(10));
        net.set_online(true);
        clock.advance(Duration::from_secs(30));
        // 10s down out of 40s since the first entry.
        assert!((net.uptime_percentage() - 75.0).abs() < 1e-9);

        net.set_online(false);
        clock.advance(Duration::from_secs(10));
        // 20s down out of 50s.
        assert!((net.uptime_percentage() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn history_keeps_last_hundred() {
        let (mut net, clock) = tracker(true);
        for _ in 0..80 {
            net.set_online(false);
            clock.advance(Duration::from_millis(10));
            net.set_online(true);
        }
        assert_eq!(net.history().count(), HISTORY_CAPACITY);
        assert_eq!(net.history().next().unwrap().kind, HistoryKind::Offline);
        assert_eq!(net.stats().reconnect_count, 80);
    }

    #[test]
    fn reset_clears_stats_and_history() {
        let (mut net, clock) = tracker(true);
        net.set_online(false);
        clock.advance(Duration::from_secs(1));
        net.set_online(true);

        net.reset_stats();
        assert_eq!(net.stats(), &ConnectionStats::default());
        assert_eq!(net.history().count(), 0);
        assert!(net.is_online());
    }
}
