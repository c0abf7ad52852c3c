// ── Connectivity probes ──
//
// A probe performs one lightweight reachability check and reports its
// round-trip time. `FaultInjectingProbe` wraps any probe to simulate
// outages, slow links and flapping connections.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use homewatch_api::EventsClient;
use tokio::time::Instant;

use crate::error::CoreError;

/// One reachability check.
pub trait ConnectivityProbe: Send + Sync {
    /// Round-trip time on success.
    fn check(&self) -> impl Future<Output = Result<Duration, CoreError>> + Send;
}

impl<P: ConnectivityProbe> ConnectivityProbe for Arc<P> {
    fn check(&self) -> impl Future<Output = Result<Duration, CoreError>> + Send {
        self.as_ref().check()
    }
}

// ── HttpProbe ────────────────────────────────────────────────────────

/// Times `GET /api/ping` against the relay.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: EventsClient,
}

impl HttpProbe {
    pub fn new(client: EventsClient) -> Self {
        Self { client }
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn check(&self) -> Result<Duration, CoreError> {
        let start = Instant::now();
        let pong = self.client.ping().await?;
        if !pong.pong {
            return Err(CoreError::Rejected {
                message: "ping answered without pong".into(),
            });
        }
        Ok(start.elapsed())
    }
}

// ── Fault injection ──────────────────────────────────────────────────

/// A simulated network fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every check fails.
    Outage,
    /// Checks succeed but report `extra` on top of the measured latency.
    Slow { extra: Duration },
    /// Checks alternate between failure and success, starting with failure.
    Unstable,
}

/// Wraps a probe and applies the currently configured [`Fault`], if any.
#[derive(Debug)]
pub struct FaultInjectingProbe<P> {
    inner: P,
    fault: Mutex<Option<Fault>>,
    flips: AtomicU32,
}

impl<P> FaultInjectingProbe<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            fault: Mutex::new(None),
            flips: AtomicU32::new(0),
        }
    }

    /// Install or clear a fault. Takes effect on the next check.
    pub fn set_fault(&self, fault: Option<Fault>) {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = fault;
        self.flips.store(0, Ordering::SeqCst);
        tracing::info!(?fault, "probe fault changed");
    }

    pub fn fault(&self) -> Option<Fault> {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn simulated(reason: &str) -> CoreError {
    CoreError::ConnectionFailed {
        url: "<simulated>".into(),
        reason: reason.into(),
    }
}

impl<P: ConnectivityProbe> ConnectivityProbe for FaultInjectingProbe<P> {
    async fn check(&self) -> Result<Duration, CoreError> {
        match self.fault() {
            None => self.inner.check().await,
            Some(Fault::Outage) => Err(simulated("simulated outage")),
            Some(Fault::Slow { extra }) => Ok(self.inner.check().await? + extra),
            Some(Fault::Unstable) => {
                if self.flips.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                    Err(simulated("simulated unstable link"))
                } else {
                    self.inner.check().await
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Always reachable with a fixed latency.
    pub(crate) struct FixedProbe(pub Duration);

    impl ConnectivityProbe for FixedProbe {
        async fn check(&self) -> Result<Duration, CoreError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn no_fault_passes_through() {
        let probe = FaultInjectingProbe::new(FixedProbe(Duration::from_millis(20)));
        assert_eq!(probe.check().await.unwrap(), Duration::from_millis(20));
    }

    #[tokio::test]
    async fn outage_fails_every_check() {
        let probe = FaultInjectingProbe::new(FixedProbe(Duration::from_millis(20)));
        probe.set_fault(Some(Fault::Outage));
        assert!(probe.check().await.unwrap_err().is_transient());
        assert!(probe.check().await.is_err());

        probe.set_fault(None);
        assert!(probe.check().await.is_ok());
    }

    #[tokio::test]
    async fn slow_adds_latency() {
        let probe = FaultInjectingProbe::new(FixedProbe(Duration::from_millis(20)));
        probe.set_fault(Some(Fault::Slow {
            extra: Duration::from_millis(480),
        }));
        assert_eq!(probe.check().await.unwrap(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn unstable_alternates() {
        let probe = FaultInjectingProbe::new(FixedProbe(Duration::from_millis(20)));
        probe.set_fault(Some(Fault::Unstable));
        let results: Vec<bool> = [
            probe.check().await.is_ok(),
            probe.check().await.is_ok(),
            probe.check().await.is_ok(),
            probe.check().await.is_ok(),
        ]
        .into();
        assert_eq!(results, vec![false, true, false, true]);
    }
}
