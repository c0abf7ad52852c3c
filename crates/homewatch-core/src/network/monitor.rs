// ── Periodic connectivity monitor ──
//
// Runs a probe on a fixed interval while the client believes it is
// online and hands the outcomes to whoever owns the tracker. The tracker
// itself stays a plain state machine on the owner's task.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::probe::ConnectivityProbe;
use super::tracker::{NetworkTracker, Transition};

const OUTCOME_CHANNEL_SIZE: usize = 16;

/// Result of one probe round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable { latency: Duration },
    Unreachable { reason: String },
}

impl ProbeOutcome {
    /// Feed this outcome into `tracker`: a success records the latency and
    /// marks the link online, a failure marks it offline.
    pub fn apply(&self, tracker: &mut NetworkTracker) -> Transition {
        match self {
            Self::Reachable { latency } => {
                tracker.update_latency(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX));
                tracker.set_online(true)
            }
            Self::Unreachable { .. } => tracker.set_online(false),
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable { .. })
    }
}

pub struct NetworkMonitor<P> {
    probe: P,
    interval: Duration,
}

impl<P: ConnectivityProbe> NetworkMonitor<P> {
    pub fn new(probe: P, interval: Duration) -> Self {
        Self { probe, interval }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Run a single check.
    pub async fn probe_once(&self) -> ProbeOutcome {
        match self.probe.check().await {
            Ok(latency) => {
                tracing::debug!(latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX), "probe ok");
                ProbeOutcome::Reachable { latency }
            }
            Err(e) => {
                tracing::debug!(error = %e, "probe failed");
                ProbeOutcome::Unreachable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Probe once and apply the outcome to `tracker`.
    pub async fn test_connection(&self, tracker: &mut NetworkTracker) -> (ProbeOutcome, Transition) {
        let outcome = self.probe_once().await;
        let transition = outcome.apply(tracker);
        (outcome, transition)
    }
}

impl<P: ConnectivityProbe + 'static> NetworkMonitor<P> {
    /// Probe every `interval` while `online` reads `true`, sending each
    /// outcome on the returned channel. The first probe runs one interval
    /// after the call. Stops on cancellation or when the receiver is dropped.
    pub fn spawn(
        self,
        online: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ProbeOutcome> {
        let (tx, rx) = mpsc::channel(OUTCOME_CHANNEL_SIZE);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if !*online.borrow() {
                            continue;
                        }
                        let outcome = self.probe_once().await;
                        if tx.send(outcome).await.is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("network monitor exiting");
        });

        rx
    }
}
