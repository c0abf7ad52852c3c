//! Live dashboard: follows the realtime channel, raises alerts and accepts
//! interactive commands on stdin.
//!
//! One task owns every store. Realtime listeners only forward messages
//! into a channel; the `select!` loop below applies them in order together
//! with connection changes, probe outcomes, stdin commands and the
//! schedule check.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use homewatch_api::{EventsClient, RealtimeMessage};
use homewatch_core::{
    Alert, Channel, ClientConfig, Clock, ConnectionState, DashboardStore, Fault, FaultInjectingProbe,
    HttpProbe, LifecycleHooks, Mode, NetworkMonitor, NetworkTracker, ProbeOutcome,
    RealtimeSubscriber, SettingsStore, Subscription, SystemClock, Transition,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

/// Events loaded when the dashboard opens.
const INITIAL_HISTORY: u32 = 100;

/// How often schedules are evaluated.
const SCHEDULE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

const FORWARDED_CHANNELS: [Channel; 6] = [
    Channel::Event,
    Channel::MotionDetected,
    Channel::ButtonPressed,
    Channel::CameraStatus,
    Channel::Alert,
    Channel::Pong,
];

const HELP: &str = "\
Commands:
  alerts                 list alerts (newest first)
  ack <id>|all           acknowledge alerts
  clear <id>             remove an alert
  events [n]             show the last n events (default 10)
  cameras                show camera status
  mode [surveillance|actif]
  scenario [name]        show or switch the active scenario
  send <type> <device> [key=value ...]
  queue                  show notifications waiting for the relay
  probe                  run a connectivity check now
  fault outage|slow <ms>|unstable|none
  ping                   ping the relay over the realtime channel
  reconnect              reconnect the realtime channel
  status                 connection and dashboard summary
  quit";

type ProbeHandle = Arc<FaultInjectingProbe<HttpProbe>>;

enum Flow {
    Continue,
    Quit,
}

// ── Dashboard session ───────────────────────────────────────────────

struct Dashboard {
    client: EventsClient,
    subscriber: RealtimeSubscriber,
    hooks: LifecycleHooks,
    dashboard: DashboardStore,
    settings: SettingsStore,
    tracker: NetworkTracker,
    probe: ProbeHandle,
    checker: NetworkMonitor<ProbeHandle>,
    link_up: watch::Sender<bool>,
    was_connected: bool,
    color: bool,
    frames: bool,
}

impl Dashboard {
    // ── Realtime messages ───────────────────────────────────────────

    fn on_message(&mut self, message: &RealtimeMessage) {
        if self.frames {
            match message.to_frame() {
                Ok(frame) => println!("{frame}"),
                Err(e) => tracing::warn!(error = %e, "could not encode frame"),
            }
        }

        let alert = self.dashboard.apply(message);
        if self.frames {
            return;
        }

        match message {
            RealtimeMessage::Event(event) => println!("{}", util::event_line(event)),
            RealtimeMessage::MotionDetected(m) => println!(
                "{} motion {} @ {} ({})",
                m.timestamp.format("%H:%M:%S"),
                m.source,
                m.location,
                m.device_id
            ),
            RealtimeMessage::ButtonPressed(b) => println!(
                "{} button {} @ {} ({})",
                b.timestamp.format("%H:%M:%S"),
                b.button_name,
                b.location,
                b.device_id
            ),
            RealtimeMessage::CameraStatus(c) => {
                println!("{}", output::dim(&format!("camera {} is {}", c.camera_id, c.status), self.color));
            }
            RealtimeMessage::Pong => println!("{}", output::dim("pong", self.color)),
            RealtimeMessage::Alert(_) | RealtimeMessage::Ping => {}
        }

        if let Some(alert) = alert {
            self.print_alert(&alert);
        }
    }

    fn print_alert(&self, alert: &Alert) {
        let title = format!("[ALERT #{}] {}", alert.id, alert.title);
        println!("{} {}", output::alert(&title, self.color), alert.message);
    }

    // ── Connectivity ────────────────────────────────────────────────

    async fn on_state(&mut self, state: ConnectionState) {
        let connected = state == ConnectionState::Connected;
        self.dashboard.set_ws_connected(connected);
        let _ = self.link_up.send(connected);

        match state {
            ConnectionState::Connecting { attempt } => {
                tracing::debug!(attempt, "connecting to realtime channel");
                if attempt > 1 {
                    self.notice(&output::warn(&format!("reconnecting (attempt {attempt})"), self.color));
                }
            }
            ConnectionState::Connected => {
                let transition = self.tracker.set_online(true);
                let message = match transition {
                    Transition::CameOnline { downtime, .. } if self.was_connected => {
                        format!("connection restored after {}", human(downtime))
                    }
                    _ => "connected to relay".to_owned(),
                };
                self.was_connected = true;
                self.notice(&output::ok(&message, self.color));
                self.flush(transition).await;
            }
            ConnectionState::Disconnected => {
                if self.tracker.set_online(false) == Transition::WentOffline {
                    self.notice(&output::warn("connection lost", self.color));
                }
            }
        }
    }

    async fn on_outcome(&mut self, outcome: &ProbeOutcome) {
        let transition = outcome.apply(&mut self.tracker);
        match (transition, outcome) {
            (Transition::WentOffline, ProbeOutcome::Unreachable { reason }) => {
                self.notice(&output::warn(&format!("relay unreachable: {reason}"), self.color));
            }
            (Transition::CameOnline { downtime, .. }, _) => {
                let message = format!("relay reachable again after {}", human(downtime));
                self.notice(&output::ok(&message, self.color));
            }
            _ => {}
        }
        self.flush(transition).await;
    }

    async fn flush(&mut self, transition: Transition) {
        let Some(report) = self.tracker.flush_if_pending(transition, &self.client).await else {
            return;
        };
        let mut message = format!(
            "offline queue: {} delivered, {} waiting",
            report.delivered, report.remaining
        );
        if let Some(e) = report.error {
            message.push_str(&format!(" ({e})"));
        }
        let styled = if report.remaining == 0 {
            output::ok(&message, self.color)
        } else {
            output::warn(&message, self.color)
        };
        self.notice(&styled);
    }

    fn check_schedule(&mut self) {
        match self.settings.check_schedule(chrono::Local::now().naive_local()) {
            Ok(Some(scenario)) => {
                self.notice(&output::ok(&format!("schedule activated scenario '{scenario}'"), self.color));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "schedule check failed"),
        }
    }

    fn notice(&self, text: &str) {
        if !self.frames {
            println!("{text}");
        }
    }

    // ── Interactive commands ────────────────────────────────────────

    async fn on_command(&mut self, line: &str) -> Flow {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Flow::Continue;
        };
        let rest: Vec<&str> = words.collect();

        let result = match command {
            "quit" | "exit" | "q" => return Flow::Quit,
            "help" | "?" => {
                println!("{HELP}");
                Ok(())
            }
            "alerts" => {
                self.list_alerts();
                Ok(())
            }
            "ack" => self.acknowledge(rest.first().copied()),
            "clear" => self.clear(rest.first().copied()),
            "events" => self.list_events(rest.first().copied()),
            "cameras" => {
                for camera in self.dashboard.cameras() {
                    println!("{:<14} {:<10} {:<8} {}", camera.id, camera.name, camera.status, camera.location);
                }
                Ok(())
            }
            "mode" => self.mode(rest.first().copied()),
            "scenario" => self.scenario(rest.first().copied()),
            "send" => self.send(&rest).await,
            "queue" => {
                for item in self.tracker.offline_queue() {
                    println!(
                        "{} {} {}",
                        item.queued_at.format("%H:%M:%S"),
                        item.payload.event_type.as_deref().unwrap_or("-"),
                        item.payload.device_id.as_deref().unwrap_or("-")
                    );
                }
                println!("{} queued", self.tracker.offline_queue().count());
                Ok(())
            }
            "probe" => {
                let (outcome, transition) = self.checker.test_connection(&mut self.tracker).await;
                match &outcome {
                    ProbeOutcome::Reachable { latency } => println!("reachable in {} ms", latency.as_millis()),
                    ProbeOutcome::Unreachable { reason } => println!("unreachable: {reason}"),
                }
                self.flush(transition).await;
                Ok(())
            }
            "fault" => self.fault(&rest),
            "ping" => {
                if !self.subscriber.ping() {
                    println!("not connected");
                }
                Ok(())
            }
            "reconnect" => {
                if !self.subscriber.connect(self.hooks.clone()) {
                    println!("already connected or connecting");
                }
                Ok(())
            }
            "status" => {
                self.status();
                Ok(())
            }
            other => Err(format!("unknown command '{other}', type 'help'")),
        };

        if let Err(message) = result {
            println!("{}", output::warn(&message, self.color));
        }
        Flow::Continue
    }

    fn list_alerts(&self) {
        if self.dashboard.alerts().is_empty() {
            println!("no alerts");
        }
        for alert in self.dashboard.alerts() {
            let marker = if alert.acknowledged { " " } else { "!" };
            println!(
                "{marker} #{} {} {} {} ({})",
                alert.id,
                alert.timestamp.format("%H:%M:%S"),
                alert.title,
                alert.message,
                alert.kind
            );
        }
    }

    fn acknowledge(&mut self, target: Option<&str>) -> Result<(), String> {
        match target {
            Some("all") => {
                let ids: Vec<u64> = self.dashboard.active_alerts().map(|a| a.id).collect();
                for id in &ids {
                    self.dashboard.acknowledge(*id);
                }
                println!("{} alert(s) acknowledged", ids.len());
                Ok(())
            }
            Some(raw) => {
                let id = parse_id(raw)?;
                if self.dashboard.acknowledge(id) {
                    Ok(())
                } else {
                    Err(format!("no alert #{id}"))
                }
            }
            None => Err("usage: ack <id>|all".into()),
        }
    }

    fn clear(&mut self, target: Option<&str>) -> Result<(), String> {
        let id = parse_id(target.ok_or("usage: clear <id>")?)?;
        if self.dashboard.clear(id) {
            Ok(())
        } else {
            Err(format!("no alert #{id}"))
        }
    }

    fn list_events(&self, count: Option<&str>) -> Result<(), String> {
        let count = match count {
            Some(raw) => raw.parse().map_err(|_| format!("'{raw}' is not a count"))?,
            None => 10,
        };
        for event in self.dashboard.events().take(count) {
            println!("{}", util::event_line(event));
        }
        Ok(())
    }

    fn mode(&mut self, value: Option<&str>) -> Result<(), String> {
        if let Some(raw) = value {
            let mode: Mode = raw
                .parse()
                .map_err(|_| format!("unknown mode '{raw}' (surveillance or actif)"))?;
            self.dashboard.set_mode(mode).map_err(|e| e.to_string())?;
        }
        println!("mode: {}", self.dashboard.mode());
        Ok(())
    }

    fn scenario(&mut self, value: Option<&str>) -> Result<(), String> {
        if let Some(name) = value {
            self.settings.set_scenario(name).map_err(|e| e.to_string())?;
        }
        println!("scenario: {}", self.settings.active_scenario());
        Ok(())
    }

    async fn send(&mut self, args: &[&str]) -> Result<(), String> {
        let [event_type, device_id, details @ ..] = args else {
            return Err("usage: send <type> <device> [key=value ...]".into());
        };
        let details: Vec<String> = details.iter().map(|d| (*d).to_owned()).collect();
        let raw = util::notification(event_type, device_id, None, &details).map_err(|e| e.to_string())?;

        if !self.tracker.is_online() {
            self.tracker.queue_offline(raw);
            println!("offline, queued ({} waiting)", self.tracker.offline_queue().count());
            return Ok(());
        }

        match self.client.submit(&raw).await {
            Ok(ack) => {
                println!("sent #{}", ack.id);
                Ok(())
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "submit failed, queueing");
                self.tracker.queue_offline(raw);
                println!("relay unreachable, queued");
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    fn fault(&self, args: &[&str]) -> Result<(), String> {
        let fault = match args {
            ["outage"] => Some(Fault::Outage),
            ["unstable"] => Some(Fault::Unstable),
            ["slow", ms] => {
                let ms: u64 = ms.parse().map_err(|_| format!("'{ms}' is not a number of ms"))?;
                Some(Fault::Slow {
                    extra: Duration::from_millis(ms),
                })
            }
            ["none" | "off"] => None,
            _ => return Err("usage: fault outage|slow <ms>|unstable|none".into()),
        };
        self.probe.set_fault(fault);
        println!("probe fault: {}", fault.map_or_else(|| "none".to_owned(), |f| format!("{f:?}")));
        Ok(())
    }

    fn status(&self) {
        let stats = self.tracker.stats();
        let active = self.dashboard.active_alerts().count();
        println!("realtime:   {}", if self.dashboard.ws_connected() { "connected" } else { "disconnected" });
        println!("relay:      {} ({})", if self.tracker.is_online() { "online" } else { "offline" }, self.tracker.quality());
        println!("latency:    {} ms", stats.latency_ms);
        println!("uptime:     {:.1}%", self.tracker.uptime_percentage());
        println!("reconnects: {}", stats.reconnect_count);
        println!("downtime:   {}", human(Duration::from_millis(stats.total_downtime_ms)));
        println!("queued:     {}", self.tracker.offline_queue().count());
        println!("mode:       {}", self.dashboard.mode());
        println!("scenario:   {}", self.settings.active_scenario());
        println!("alerts:     {active} active / {} total", self.dashboard.alerts().len());
        println!("events:     {}", self.dashboard.events().count());
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_id(raw: &str) -> Result<u64, String> {
    raw.parse().map_err(|_| format!("'{raw}' is not an id"))
}

/// Whole seconds, or milliseconds for sub-second spans.
fn human(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        return format!("{}ms", duration.as_millis());
    }
    humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}

async fn next_line(lines: &mut Option<Lines<BufReader<Stdin>>>) -> Option<String> {
    match lines {
        Some(reader) => match reader.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                None
            }
        },
        None => std::future::pending().await,
    }
}

fn forward_all(
    subscriber: &RealtimeSubscriber,
    tx: &mpsc::UnboundedSender<RealtimeMessage>,
) -> Vec<Subscription> {
    FORWARDED_CHANNELS
        .iter()
        .map(|channel| {
            let tx = tx.clone();
            subscriber.on(*channel, move |message| {
                tx.send(message.clone()).map_err(|e| e.to_string().into())
            })
        })
        .collect()
}

/// Sessions start online: the first realtime connect is not a reconnect
/// and sends go straight to the relay until a disconnect is observed.
fn session_tracker(clock: Arc<dyn Clock>) -> NetworkTracker {
    NetworkTracker::new(true, clock)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(config: &ClientConfig, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let persistence = config::persistence(config);
    let client = util::events_client(config)?;
    let probe: ProbeHandle = Arc::new(FaultInjectingProbe::new(HttpProbe::new(client.clone())));
    let (link_up, link_rx) = watch::channel(false);
    let hooks = LifecycleHooks::default()
        .on_connect(|| tracing::info!("realtime channel connected"))
        .on_disconnect(|| tracing::info!("realtime channel disconnected"));

    let mut session = Dashboard {
        client,
        subscriber: RealtimeSubscriber::new(config.websocket_url()?, config.reconnect()),
        hooks,
        dashboard: DashboardStore::new(persistence.clone()),
        settings: SettingsStore::new(persistence),
        tracker: session_tracker(Arc::new(SystemClock)),
        probe: probe.clone(),
        checker: NetworkMonitor::new(probe.clone(), config.probe_interval),
        link_up,
        was_connected: false,
        color: output::should_color(&global.color),
        frames: matches!(global.output, OutputFormat::Json | OutputFormat::JsonCompact),
    };

    if let Some(mode) = args.mode {
        session.dashboard.set_mode(mode.into())?;
    }

    if !args.no_history {
        match session.client.recent(Some(INITIAL_HISTORY)).await {
            Ok(events) => {
                session.notice(&output::dim(&format!("loaded {} recent events", events.len()), session.color));
                for event in events.iter().take(5).rev() {
                    session.notice(&util::event_line(event));
                }
                session.dashboard.set_events(events);
            }
            Err(e) => {
                tracing::warn!(error = %e, "initial load failed");
                session.notice(&output::warn(&format!("could not load history: {e}"), session.color));
            }
        }
    }

    session.notice(&output::dim(
        &format!(
            "mode {}, scenario {}. Type 'help' for commands.",
            session.dashboard.mode(),
            session.settings.active_scenario()
        ),
        session.color,
    ));
    session.check_schedule();

    let cancel = CancellationToken::new();
    let (tx, mut messages) = mpsc::unbounded_channel();
    let subscriptions = forward_all(&session.subscriber, &tx);
    drop(tx);

    let mut states = session.subscriber.state();
    session.subscriber.connect(session.hooks.clone());
    let mut outcomes = NetworkMonitor::new(probe, config.probe_interval).spawn(link_rx, cancel.clone());

    let mut stdin = (!args.no_input).then(|| BufReader::new(tokio::io::stdin()).lines());
    let mut schedule_tick = tokio::time::interval(SCHEDULE_CHECK_INTERVAL);
    schedule_tick.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            Some(message) = messages.recv() => session.on_message(&message),
            Ok(()) = states.changed() => {
                let state = *states.borrow_and_update();
                session.on_state(state).await;
            }
            Some(outcome) = outcomes.recv() => session.on_outcome(&outcome).await,
            line = next_line(&mut stdin) => match line {
                Some(line) => {
                    if matches!(session.on_command(line.trim()).await, Flow::Quit) {
                        break;
                    }
                }
                None => stdin = None,
            },
            _ = schedule_tick.tick() => session.check_schedule(),
        }
    }

    cancel.cancel();
    drop(subscriptions);
    session.subscriber.disconnect();
    let queued = session.tracker.offline_queue().count();
    if queued > 0 {
        tracing::warn!(queued, "exiting with undelivered notifications");
    }
    Ok(())
}
