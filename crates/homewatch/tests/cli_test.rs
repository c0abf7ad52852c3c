//! Integration tests for the `homewatch` CLI binary.
//!
//! Argument parsing, completions, local state commands and relay-backed
//! commands against a wiremock relay. Nothing touches the user's real
//! configuration or state.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `homewatch` binary with env isolation.
///
/// Clears all `HOMEWATCH_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn homewatch_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("homewatch");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("HOMEWATCH_URL")
        .env_remove("HOMEWATCH_WS_URL")
        .env_remove("HOMEWATCH_STATE_DIR")
        .env_remove("HOMEWATCH_OUTPUT")
        .env_remove("HOMEWATCH_TIMEOUT");
    cmd
}

/// Same as [`homewatch_cmd`] with `--state-dir` pointing inside `home`.
fn stateful_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = homewatch_cmd(home);
    cmd.arg("--state-dir").arg(home.join("state"));
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn sample_event(id: u64, device_id: &str, location: &str) -> serde_json::Value {
    json!({
        "id": id,
        "type": "motion_detected",
        "device_id": device_id,
        "timestamp": "2026-10-15T08:00:00Z",
        "event_id": format!("evt-{id}"),
        "source": "PIR",
        "source_name": "PIR Entrée",
        "location": location,
        "data": null,
        "mqtt_topic": null,
        "original_timestamp": null,
        "metadata": {}
    })
}

/// Run a blocking command from an async test without stalling the mock server.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = homewatch_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    homewatch_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("events")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("settings"))
            .and(predicate::str::contains("network")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    homewatch_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("homewatch"));
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    homewatch_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    homewatch_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_invalid_output_format() {
    let home = tempfile::tempdir().unwrap();
    let output = homewatch_cmd(home.path())
        .args(["-o", "xml", "mode"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("xml"));
}

// ── Mode & settings (local state) ───────────────────────────────────

#[test]
fn test_mode_defaults_to_actif() {
    let home = tempfile::tempdir().unwrap();
    stateful_cmd(home.path())
        .args(["-o", "plain", "mode"])
        .assert()
        .success()
        .stdout("actif\n");
}

#[test]
fn test_mode_change_persists() {
    let home = tempfile::tempdir().unwrap();
    stateful_cmd(home.path())
        .args(["mode", "surveillance"])
        .assert()
        .success();

    stateful_cmd(home.path())
        .args(["-o", "json", "mode"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""mode": "surveillance""#)
                .and(predicate::str::contains(r#""motion_alerts": true"#)),
        );
}

#[test]
fn test_unknown_scenario_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let output = stateful_cmd(home.path())
        .args(["settings", "scenario", "party"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("party"));

    stateful_cmd(home.path())
        .args(["-o", "plain", "settings", "scenario"])
        .assert()
        .success()
        .stdout("normal\n");
}

#[test]
fn test_scenario_switch_persists() {
    let home = tempfile::tempdir().unwrap();
    stateful_cmd(home.path())
        .args(["settings", "scenario", "night"])
        .assert()
        .success();

    stateful_cmd(home.path())
        .args(["-o", "plain", "settings", "scenarios"])
        .assert()
        .success()
        .stdout(predicate::str::contains("night").and(predicate::str::contains("away")));

    stateful_cmd(home.path())
        .args(["-o", "plain", "settings", "show"])
        .assert()
        .success()
        .stdout("night\n");
}

#[test]
fn test_schedule_lifecycle() {
    let home = tempfile::tempdir().unwrap();
    let output = stateful_cmd(home.path())
        .args([
            "settings", "schedules", "add", "Weekend", "--scenario", "home", "--days", "0,6",
            "--start", "09:00", "--end", "12:00",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let id = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    assert!(id.parse::<u64>().is_ok(), "expected an id, got {id:?}");

    stateful_cmd(home.path())
        .args(["-o", "plain", "settings", "schedules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));

    stateful_cmd(home.path())
        .args(["settings", "schedules", "delete", &id])
        .assert()
        .success();

    let output = stateful_cmd(home.path())
        .args(["settings", "schedules", "delete", &id])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_schedule_rejects_bad_times() {
    let home = tempfile::tempdir().unwrap();
    let output = stateful_cmd(home.path())
        .args([
            "settings", "schedules", "add", "Broken", "--scenario", "night", "--days", "1",
            "--start", "25:00", "--end", "07:00",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("HH:MM"));
}

#[test]
fn test_zone_rejects_unknown_sensitivity() {
    let home = tempfile::tempdir().unwrap();
    let output = stateful_cmd(home.path())
        .args(["settings", "zone", "raspberry-01", "--sensitivity", "extreme"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_set_and_show() {
    let home = tempfile::tempdir().unwrap();
    homewatch_cmd(home.path())
        .args(["config", "set", "client.api_url", "http://pi.local:8000"])
        .assert()
        .success();

    homewatch_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://pi.local:8000"));
}

#[test]
fn test_config_set_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    let output = homewatch_cmd(home.path())
        .args(["config", "set", "client.colour", "red"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("unknown config key"));
}

// ── Relay-backed commands ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_events_list_renders_relay_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/events"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            sample_event(2, "raspberry-2", "Salon"),
            sample_event(1, "raspberry-1", "Maison"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = homewatch_cmd(home.path());
    cmd.args(["--url", &server.uri(), "events", "list", "--limit", "2"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Salon"), "{stdout}");
    assert!(stdout.contains("PIR Entrée"), "{stdout}");
    assert!(stdout.find("raspberry-2") < stdout.find("raspberry-1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_events_get_missing_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/events/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Événement non trouvé" })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = homewatch_cmd(home.path());
    cmd.args(["--url", &server.uri(), "events", "get", "99"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_events_send_prints_assigned_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "event": { "id": 1_760_515_200_000_u64, "type": "button_pressed", "timestamp": "2026-10-15T08:00:00Z" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = homewatch_cmd(home.path());
    cmd.args([
        "--url", &server.uri(), "-o", "plain", "events", "send", "button_pressed", "raspberry-1",
        "--source", "Button", "--detail", "mqtt_topic=home/button",
    ]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1760515200000");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_network_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "ok", "timestamp": "2026-10-15T08:00:00Z" })),
        )
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = homewatch_cmd(home.path());
    cmd.args(["--url", &server.uri(), "-o", "plain", "network", "health"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");
}

#[test]
fn test_unreachable_relay_exit_code() {
    let home = tempfile::tempdir().unwrap();
    let output = homewatch_cmd(home.path())
        .args(["--url", "http://127.0.0.1:9", "--timeout", "2", "events", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
}
