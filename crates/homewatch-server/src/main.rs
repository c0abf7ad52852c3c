//! `homewatch-server` - relay between sensor bridges and dashboards.
//!
//! Entry point: argument parsing, config layering, tracing setup, and the
//! axum server with graceful shutdown on Ctrl-C.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, WrapErr};
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use homewatch_core::Relay;
use homewatch_server::AppState;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// HTTP and WebSocket relay for home-surveillance sensor events.
#[derive(Parser, Debug)]
#[command(name = "homewatch-server", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "HOMEWATCH_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind`
    #[arg(short, long)]
    bind: Option<String>,

    /// Allowed CORS origin, overrides `server.cors_origin` (`*` for any)
    #[arg(long)]
    cors_origin: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(cli: &Cli) -> Option<WorkerGuard> {
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,homewatch_server={level},homewatch_core={level},homewatch_api={level},tower_http={level}"
        ))
    });

    let (writer, guard) = match &cli.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or(std::path::Path::new("."));
            let name = path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("homewatch-server.log"));
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(writer)).init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_ansi(cli.log_file.is_none())
                    .with_writer(writer),
            )
            .init(),
    }

    guard
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(&cli);

    let path = cli.config.clone().unwrap_or_else(homewatch_config::config_path);
    let mut cfg = homewatch_config::load_config_from(&path)
        .into_diagnostic()
        .wrap_err_with(|| format!("loading config from {}", path.display()))?;

    if let Some(bind) = cli.bind {
        cfg.server.bind = bind;
    }
    if let Some(origin) = cli.cors_origin {
        cfg.server.cors_origin = origin;
    }

    let addr = cfg.server.bind_addr().into_diagnostic()?;
    let relay = Relay::new(cfg.server.relay_config().into_diagnostic()?);
    let state = AppState::new(relay);

    let listener = TcpListener::bind(addr)
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("binding {addr}"))?;
    tracing::info!(
        addr = %addr,
        cors_origin = %cfg.server.cors_origin,
        history_capacity = cfg.server.history_capacity,
        "relay listening"
    );

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    homewatch_server::serve(listener, state, &cfg.server.cors_origin)
        .await
        .into_diagnostic()?;

    tracing::info!("relay stopped");
    Ok(())
}
