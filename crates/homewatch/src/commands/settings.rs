//! Settings command handlers: scenarios, schedules and preference sections.

use std::str::FromStr;

use serde::Serialize;
use tabled::Tabled;

use homewatch_core::store::settings::{Sensitivity, VideoQuality};
use homewatch_core::store::{NewSchedule, Preferences, Schedule, SettingsStore, TimeOfDay};
use homewatch_core::ClientConfig;

use crate::cli::{
    GlobalOpts, NetworkSettingsArgs, NotificationArgs, RecordingArgs, SchedulesCommand,
    SettingsArgs, SettingsCommand, ZoneArgs,
};
use crate::config;
use crate::error::CliError;
use crate::output;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

// ── Parsing helpers ─────────────────────────────────────────────────

fn parse_time(field: &str, raw: &str) -> Result<TimeOfDay, CliError> {
    TimeOfDay::from_str(raw).map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("expected HH:MM, got '{raw}'"),
    })
}

fn parse_choice<T: FromStr>(field: &str, raw: &str, allowed: &str) -> Result<T, CliError> {
    raw.to_lowercase().parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("'{raw}' is not one of: {allowed}"),
    })
}

fn days_label(days: &[u8]) -> String {
    days.iter()
        .filter_map(|d| WEEKDAYS.get(usize::from(*d)).copied())
        .collect::<Vec<_>>()
        .join(",")
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ScenarioView {
    id: String,
    name: String,
    description: String,
    active: bool,
    alerts_enabled: bool,
    motion_detection: bool,
    recording_enabled: bool,
}

#[derive(Tabled)]
struct ScenarioRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Alerts")]
    alerts: &'static str,
    #[tabled(rename = "Motion")]
    motion: &'static str,
    #[tabled(rename = "Recording")]
    recording: &'static str,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&ScenarioView> for ScenarioRow {
    fn from(s: &ScenarioView) -> Self {
        Self {
            marker: if s.active { "*" } else { "" },
            id: s.id.clone(),
            name: s.name.clone(),
            alerts: on_off(s.alerts_enabled),
            motion: on_off(s.motion_detection),
            recording: on_off(s.recording_enabled),
            description: s.description.clone(),
        }
    }
}

fn scenario_views(store: &SettingsStore) -> Vec<ScenarioView> {
    store
        .scenarios()
        .iter()
        .map(|(id, s)| ScenarioView {
            id: id.clone(),
            name: s.name.clone(),
            description: s.description.clone(),
            active: id == store.active_scenario(),
            alerts_enabled: s.settings.alerts_enabled,
            motion_detection: s.settings.motion_detection,
            recording_enabled: s.settings.recording_enabled,
        })
        .collect()
}

#[derive(Tabled)]
struct ScheduleRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Enabled")]
    enabled: &'static str,
    #[tabled(rename = "Days")]
    days: String,
    #[tabled(rename = "Window")]
    window: String,
    #[tabled(rename = "Scenario")]
    scenario: String,
}

impl From<&Schedule> for ScheduleRow {
    fn from(s: &Schedule) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            enabled: if s.enabled { "yes" } else { "no" },
            days: days_label(&s.days),
            window: format!("{}-{}", s.start_time, s.end_time),
            scenario: s.scenario.clone(),
        }
    }
}

fn preferences_detail(p: &Preferences) -> String {
    let n = &p.network;
    let q = &p.notifications;
    let r = &p.recording;
    let mut lines = vec![
        format!("Scenario:        {}", p.active_scenario),
        String::new(),
        "Network".into(),
        format!("  Auto reconnect:  {} (every {} ms, {} retries)", on_off(n.auto_reconnect), n.reconnect_interval_ms, n.max_retries),
        format!("  Offline mode:    {} (cache {} h)", on_off(n.offline_mode), n.cache_duration_hours),
        format!("  Low bandwidth:   {}", on_off(n.low_bandwidth_mode)),
        format!("  Video quality:   {}", n.video_quality),
        String::new(),
        "Notifications".into(),
        format!("  Sound/desktop:   {}/{}", on_off(q.sound), on_off(q.desktop)),
        format!("  Email:           {} {}", on_off(q.email), q.email_address),
        format!("  SMS:             {} {}", on_off(q.sms), q.phone_number),
        format!(
            "  Quiet hours:     {} ({}-{})",
            on_off(q.quiet_hours.enabled),
            q.quiet_hours.start,
            q.quiet_hours.end
        ),
        String::new(),
        "Recording".into(),
        format!("  Auto record:     {} ({} s, buffers {}/{} s)", on_off(r.auto_record), r.record_duration_secs, r.pre_buffer_secs, r.post_buffer_secs),
        format!("  Storage:         {} GB, kept {} days", r.storage_limit_gb, r.retention_days),
        String::new(),
        "Detection zones".into(),
    ];
    for (camera, zone) in &p.detection_zones {
        lines.push(format!(
            "  {camera}:    {} (sensitivity {})",
            on_off(zone.enabled),
            zone.sensitivity
        ));
    }
    lines.push(String::new());
    lines.push(format!("Schedules:       {}", p.schedules.len()));
    lines.join("\n")
}

fn done(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("✓ {message}");
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(config: &ClientConfig, args: SettingsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut store = SettingsStore::new(config::persistence(config));

    match args.command {
        SettingsCommand::Show => {
            let out = output::render_single(
                &global.output,
                store.preferences(),
                preferences_detail,
                |p| p.active_scenario.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SettingsCommand::Scenarios => {
            let views = scenario_views(&store);
            let out = output::render_list(&global.output, &views, |s| ScenarioRow::from(s), |s| s.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SettingsCommand::Scenario { name } => {
            if let Some(name) = name {
                store.set_scenario(&name)?;
                done(global, &format!("Scenario set to '{name}'"));
            }
            let active = store.active_scenario().to_owned();
            let label = store
                .scenarios()
                .get(&active)
                .map_or_else(|| active.clone(), |s| format!("{active} ({})", s.name));
            let out = output::render_single(
                &global.output,
                &store.active_settings(),
                |_| format!("Active scenario: {label}"),
                |_| active.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SettingsCommand::Schedules(cmd) => schedules(&mut store, cmd, global),

        SettingsCommand::Check => {
            let now = chrono::Local::now().naive_local();
            match store.check_schedule(now)? {
                Some(scenario) => done(global, &format!("Schedule switched scenario to '{scenario}'")),
                None => done(
                    global,
                    &format!("No change, active scenario is '{}'", store.active_scenario()),
                ),
            }
            Ok(())
        }

        SettingsCommand::Network(args) => network(&mut store, &args, global),
        SettingsCommand::Notifications(args) => notifications(&mut store, args, global),
        SettingsCommand::Recording(args) => recording(&mut store, &args, global),
        SettingsCommand::Zone(args) => zone(&mut store, args, global),
    }
}

fn schedules(store: &mut SettingsStore, cmd: SchedulesCommand, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        SchedulesCommand::List => {
            let out = output::render_list(
                &global.output,
                store.schedules(),
                |s| ScheduleRow::from(s),
                |s| s.id.to_string(),
            );
            output::print_output(&out, global.quiet);
        }

        SchedulesCommand::Add {
            name,
            scenario,
            days,
            start,
            end,
            disabled,
        } => {
            if !store.scenarios().contains_key(&scenario) {
                return Err(CliError::Validation {
                    field: "scenario".into(),
                    reason: format!(
                        "unknown scenario '{scenario}'. Run: homewatch settings scenarios"
                    ),
                });
            }
            let id = store.add_schedule(NewSchedule {
                name,
                enabled: !disabled,
                days,
                start_time: parse_time("start", &start)?,
                end_time: parse_time("end", &end)?,
                scenario,
            })?;
            output::print_output(&id.to_string(), global.quiet);
        }

        SchedulesCommand::Enable { id } => toggle_schedule(store, id, true, global)?,
        SchedulesCommand::Disable { id } => toggle_schedule(store, id, false, global)?,

        SchedulesCommand::Delete { id } => {
            if !store.delete_schedule(id)? {
                return Err(schedule_not_found(id));
            }
            done(global, &format!("Schedule {id} deleted"));
        }
    }
    Ok(())
}

fn toggle_schedule(
    store: &mut SettingsStore,
    id: u64,
    enabled: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !store.update_schedule(id, |s| s.enabled = enabled)? {
        return Err(schedule_not_found(id));
    }
    let state = if enabled { "enabled" } else { "disabled" };
    done(global, &format!("Schedule {id} {state}"));
    Ok(())
}

fn schedule_not_found(id: u64) -> CliError {
    CliError::NotFound {
        resource_type: "schedule".into(),
        identifier: id.to_string(),
        list_command: "settings schedules list".into(),
    }
}

fn network(store: &mut SettingsStore, args: &NetworkSettingsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let quality = args
        .video_quality
        .as_deref()
        .map(|raw| parse_choice::<VideoQuality>("video_quality", raw, "auto, high, medium, low"))
        .transpose()?;

    store.update_network_settings(|n| {
        if let Some(v) = args.auto_reconnect {
            n.auto_reconnect = v;
        }
        if let Some(v) = args.reconnect_interval {
            n.reconnect_interval_ms = v;
        }
        if let Some(v) = args.max_retries {
            n.max_retries = v;
        }
        if let Some(v) = args.offline_mode {
            n.offline_mode = v;
        }
        if let Some(v) = args.cache_duration_hours {
            n.cache_duration_hours = v;
        }
        if let Some(v) = args.low_bandwidth {
            n.low_bandwidth_mode = v;
        }
        if let Some(v) = quality {
            n.video_quality = v;
        }
    })?;
    done(global, "Network settings updated");
    Ok(())
}

fn notifications(store: &mut SettingsStore, args: NotificationArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let quiet_start = args
        .quiet_start
        .as_deref()
        .map(|raw| parse_time("quiet_start", raw))
        .transpose()?;
    let quiet_end = args
        .quiet_end
        .as_deref()
        .map(|raw| parse_time("quiet_end", raw))
        .transpose()?;

    store.update_notification_settings(|n| {
        if let Some(v) = args.sound {
            n.sound = v;
        }
        if let Some(v) = args.desktop {
            n.desktop = v;
        }
        if let Some(v) = args.email {
            n.email = v;
        }
        if let Some(v) = args.sms {
            n.sms = v;
        }
        if let Some(v) = args.email_address {
            n.email_address = v;
        }
        if let Some(v) = args.phone_number {
            n.phone_number = v;
        }
        if let Some(v) = args.quiet_hours {
            n.quiet_hours.enabled = v;
        }
        if let Some(v) = quiet_start {
            n.quiet_hours.start = v;
        }
        if let Some(v) = quiet_end {
            n.quiet_hours.end = v;
        }
    })?;
    done(global, "Notification settings updated");
    Ok(())
}

fn recording(store: &mut SettingsStore, args: &RecordingArgs, global: &GlobalOpts) -> Result<(), CliError> {
    store.update_recording_settings(|r| {
        if let Some(v) = args.auto_record {
            r.auto_record = v;
        }
        if let Some(v) = args.duration_secs {
            r.record_duration_secs = v;
        }
        if let Some(v) = args.pre_buffer_secs {
            r.pre_buffer_secs = v;
        }
        if let Some(v) = args.post_buffer_secs {
            r.post_buffer_secs = v;
        }
        if let Some(v) = args.storage_limit_gb {
            r.storage_limit_gb = v;
        }
        if let Some(v) = args.retention_days {
            r.retention_days = v;
        }
    })?;
    done(global, "Recording settings updated");
    Ok(())
}

fn zone(store: &mut SettingsStore, args: ZoneArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let sensitivity = args
        .sensitivity
        .as_deref()
        .map(|raw| parse_choice::<Sensitivity>("sensitivity", raw, "low, medium, high"))
        .transpose()?;

    store.update_detection_zone(&args.camera_id, |z| {
        if let Some(v) = args.enabled {
            z.enabled = v;
        }
        if let Some(v) = sensitivity {
            z.sensitivity = v;
        }
    })?;
    done(global, &format!("Detection zone for {} updated", args.camera_id));
    Ok(())
}
