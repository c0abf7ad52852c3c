//! Connectivity diagnostics: ping probes and relay health.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use homewatch_core::{
    ClientConfig, ConnectionQuality, HttpProbe, NetworkMonitor, NetworkTracker, ProbeOutcome,
    SystemClock,
};

use crate::cli::{GlobalOpts, NetworkArgs, NetworkCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ProbeResult {
    seq: u32,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    quality: ConnectionQuality,
}

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "#")]
    seq: u32,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Quality")]
    quality: String,
}

impl From<&ProbeResult> for ProbeRow {
    fn from(p: &ProbeResult) -> Self {
        let result = match (p.latency_ms, &p.error) {
            (Some(ms), _) => format!("{ms} ms"),
            (None, Some(e)) => e.clone(),
            (None, None) => "-".into(),
        };
        Self {
            seq: p.seq,
            result,
            quality: p.quality.to_string(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    config: &ClientConfig,
    args: NetworkArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = util::events_client(config)?;

    match args.command {
        NetworkCommand::Ping { count, interval } => {
            let monitor = NetworkMonitor::new(HttpProbe::new(client), config.probe_interval);
            let mut tracker = NetworkTracker::new(true, Arc::new(SystemClock));
            let mut results = Vec::new();

            for seq in 1..=count.max(1) {
                if seq > 1 {
                    tokio::time::sleep(Duration::from_millis(interval)).await;
                }
                let (outcome, transition) = monitor.test_connection(&mut tracker).await;
                tracing::debug!(seq, ?outcome, ?transition, "probe");
                let (latency_ms, error) = match outcome {
                    ProbeOutcome::Reachable { latency } => {
                        (Some(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)), None)
                    }
                    ProbeOutcome::Unreachable { reason } => (None, Some(reason)),
                };
                results.push(ProbeResult {
                    seq,
                    reachable: latency_ms.is_some(),
                    latency_ms,
                    error,
                    quality: tracker.quality(),
                });
            }

            let out = output::render_list(
                &global.output,
                &results,
                |p| ProbeRow::from(p),
                |p| p.latency_ms.map_or_else(|| "-".into(), |ms| ms.to_string()),
            );
            output::print_output(&out, global.quiet);

            let reached = results.iter().filter(|p| p.reachable).count();
            if !global.quiet {
                eprintln!(
                    "{reached}/{} reachable, quality {}, uptime {:.1}%",
                    results.len(),
                    tracker.quality(),
                    tracker.uptime_percentage()
                );
            }

            if reached == 0 {
                let reason = results
                    .iter()
                    .find_map(|p| p.error.clone())
                    .unwrap_or_else(|| "no probe succeeded".into());
                return Err(CliError::ConnectionFailed {
                    url: config.api_url.to_string(),
                    source: reason.into(),
                });
            }
            Ok(())
        }

        NetworkCommand::Health => {
            let health = client.health().await?;
            let out = output::render_single(
                &global.output,
                &health,
                |h| format!("Status:    {}\nTime:      {}", h.status, h.timestamp.to_rfc3339()),
                |h| h.status.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
