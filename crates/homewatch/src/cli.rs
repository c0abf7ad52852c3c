//! Clap derive structures for the `homewatch` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homewatch -- terminal dashboard for home-surveillance events
#[derive(Debug, Parser)]
#[command(
    name = "homewatch",
    version,
    about = "Follow home-surveillance events and alerts from the command line",
    long_about = "Dashboard client for a homewatch relay.\n\n\
        Lists and sends sensor events, follows the realtime channel with\n\
        acknowledgeable alerts, and manages mode, scenarios and schedules.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Relay base URL (overrides client.api_url)
    #[arg(long, short = 'u', env = "HOMEWATCH_URL", global = true)]
    pub url: Option<String>,

    /// Realtime endpoint (defaults to <url>/ws)
    #[arg(long, env = "HOMEWATCH_WS_URL", global = true)]
    pub ws_url: Option<String>,

    /// Directory for persisted mode and settings
    #[arg(long, env = "HOMEWATCH_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMEWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides client.request_timeout_secs)
    #[arg(long, env = "HOMEWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Query and send sensor events
    #[command(alias = "ev", alias = "e")]
    Events(EventsArgs),

    /// Follow the realtime channel with live alerts
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Show or change the surveillance mode
    Mode(ModeArgs),

    /// Manage scenarios, schedules and preferences
    #[command(alias = "set")]
    Settings(SettingsArgs),

    /// Connectivity diagnostics
    #[command(alias = "net")]
    Network(NetworkArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  EVENTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct EventsArgs {
    #[command(subcommand)]
    pub command: EventsCommand,
}

#[derive(Debug, Subcommand)]
pub enum EventsCommand {
    /// List recent events, newest first
    #[command(alias = "ls")]
    List {
        /// Max results (the relay keeps 100)
        #[arg(long, short = 'l')]
        limit: Option<u32>,
    },

    /// Show one event
    Get {
        /// Event id
        id: u64,
    },

    /// Submit a notification as a sensor bridge would
    Send {
        /// Event type, e.g. motion_detected or button_pressed
        #[arg(value_name = "TYPE")]
        event_type: String,

        /// Originating device id, e.g. raspberry-1
        device_id: String,

        /// Sensor tag (PIR, Button, Pressure, ...)
        #[arg(long, short = 's')]
        source: Option<String>,

        /// Extra detail fields as key=value (repeatable)
        #[arg(long = "detail", short = 'd', value_name = "KEY=VALUE")]
        details: Vec<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Switch to this mode before following
    #[arg(long, short = 'm')]
    pub mode: Option<ModeValue>,

    /// Skip loading recent history on start
    #[arg(long)]
    pub no_history: bool,

    /// Do not read interactive commands from stdin
    #[arg(long)]
    pub no_input: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  MODE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ModeArgs {
    /// New mode; omit to show the current one
    pub mode: Option<ModeValue>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeValue {
    /// Every sensor raises an alert
    Surveillance,
    /// Only the pressure mat raises an alert
    Actif,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SETTINGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show all preferences
    Show,

    /// List the scenario catalogue
    Scenarios,

    /// Show or activate a scenario
    Scenario {
        /// Scenario id (normal, discreet, night, away, home, off)
        name: Option<String>,
    },

    /// Manage weekly schedules
    #[command(subcommand)]
    Schedules(SchedulesCommand),

    /// Apply the schedule matching the current local time
    Check,

    /// Update network preferences
    Network(NetworkSettingsArgs),

    /// Update notification preferences
    Notifications(NotificationArgs),

    /// Update recording preferences
    Recording(RecordingArgs),

    /// Update a camera's detection zone
    Zone(ZoneArgs),
}

#[derive(Debug, Subcommand)]
pub enum SchedulesCommand {
    /// List schedules
    #[command(alias = "ls")]
    List,

    /// Add a schedule
    Add {
        /// Display name
        name: String,

        /// Scenario applied during the window
        #[arg(long, short = 's')]
        scenario: String,

        /// Weekdays, 0 = Sunday … 6 = Saturday (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        days: Vec<u8>,

        /// Window start, HH:MM
        #[arg(long)]
        start: String,

        /// Window end, HH:MM (may be earlier than start to wrap midnight)
        #[arg(long)]
        end: String,

        /// Create the schedule disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Enable a schedule
    Enable { id: u64 },

    /// Disable a schedule
    Disable { id: u64 },

    /// Delete a schedule
    #[command(alias = "rm")]
    Delete { id: u64 },
}

#[derive(Debug, Args)]
pub struct NetworkSettingsArgs {
    #[arg(long)]
    pub auto_reconnect: Option<bool>,

    /// Milliseconds between reconnect attempts
    #[arg(long)]
    pub reconnect_interval: Option<u64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long)]
    pub offline_mode: Option<bool>,

    #[arg(long)]
    pub cache_duration_hours: Option<u32>,

    #[arg(long)]
    pub low_bandwidth: Option<bool>,

    /// auto, high, medium or low
    #[arg(long)]
    pub video_quality: Option<String>,
}

#[derive(Debug, Args)]
pub struct NotificationArgs {
    #[arg(long)]
    pub sound: Option<bool>,

    #[arg(long)]
    pub desktop: Option<bool>,

    #[arg(long)]
    pub email: Option<bool>,

    #[arg(long)]
    pub sms: Option<bool>,

    #[arg(long)]
    pub email_address: Option<String>,

    #[arg(long)]
    pub phone_number: Option<String>,

    #[arg(long)]
    pub quiet_hours: Option<bool>,

    /// Quiet hours start, HH:MM
    #[arg(long)]
    pub quiet_start: Option<String>,

    /// Quiet hours end, HH:MM
    #[arg(long)]
    pub quiet_end: Option<String>,
}

#[derive(Debug, Args)]
pub struct RecordingArgs {
    #[arg(long)]
    pub auto_record: Option<bool>,

    #[arg(long)]
    pub duration_secs: Option<u32>,

    #[arg(long)]
    pub pre_buffer_secs: Option<u32>,

    #[arg(long)]
    pub post_buffer_secs: Option<u32>,

    #[arg(long)]
    pub storage_limit_gb: Option<u32>,

    #[arg(long)]
    pub retention_days: Option<u32>,
}

#[derive(Debug, Args)]
pub struct ZoneArgs {
    /// Camera id, e.g. raspberry-01
    pub camera_id: String,

    #[arg(long)]
    pub enabled: Option<bool>,

    /// low, medium or high
    #[arg(long)]
    pub sensitivity: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  NETWORK
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct NetworkArgs {
    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// Probe the relay and report latency and quality
    Ping {
        /// Number of probes
        #[arg(long, short = 'c', default_value = "4")]
        count: u32,

        /// Milliseconds between probes
        #[arg(long, default_value = "1000")]
        interval: u64,
    },

    /// Show relay health
    Health,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a configuration value
    Set {
        /// Config key (dot-separated, e.g. "client.api_url")
        key: String,

        /// Value to set
        value: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
