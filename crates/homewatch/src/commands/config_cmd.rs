//! Config subcommand handlers.

use homewatch_config::{Config, save_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn invalid(field: &str, reason: impl Into<String>) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, CliError> {
    value
        .parse()
        .map_err(|_| invalid(field, format!("'{value}' is not a valid number")))
}

/// Apply one `key = value` assignment to `cfg`.
fn set_key(cfg: &mut Config, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "server.bind" => cfg.server.bind = value,
        "server.cors_origin" => cfg.server.cors_origin = value,
        "server.history_capacity" => cfg.server.history_capacity = parse_number(key, &value)?,
        "server.broadcast_capacity" => {
            cfg.server.broadcast_capacity = parse_number(key, &value)?;
        }
        "client.api_url" => cfg.client.api_url = value,
        "client.ws_url" => cfg.client.ws_url = (!value.is_empty()).then_some(value),
        "client.reconnect_delay_ms" => cfg.client.reconnect_delay_ms = parse_number(key, &value)?,
        "client.reconnect_attempts" => cfg.client.reconnect_attempts = parse_number(key, &value)?,
        "client.probe_interval_secs" => {
            cfg.client.probe_interval_secs = parse_number(key, &value)?;
        }
        "client.request_timeout_secs" => {
            cfg.client.request_timeout_secs = parse_number(key, &value)?;
        }
        "client.state_dir" => {
            cfg.client.state_dir = (!value.is_empty()).then(|| value.into());
        }
        other => {
            if let Some(source) = other.strip_prefix("server.sources.") {
                cfg.server.sources.insert(source.to_owned(), value);
            } else if let Some(device) = other.strip_prefix("server.locations.") {
                cfg.server.locations.insert(device.to_owned(), value);
            } else {
                return Err(invalid(
                    other,
                    format!(
                        "unknown config key '{other}'. Valid keys: server.bind, server.cors_origin, \
                         server.history_capacity, server.broadcast_capacity, server.sources.<tag>, \
                         server.locations.<device>, client.api_url, client.ws_url, \
                         client.reconnect_delay_ms, client.reconnect_attempts, \
                         client.probe_interval_secs, client.request_timeout_secs, client.state_dir"
                    ),
                ));
            }
        }
    }

    // Reject values the server or client would refuse at startup.
    cfg.server.bind_addr()?;
    cfg.server.relay_config()?;
    cfg.client.client_config()?;
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { force } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(invalid(
                    "config",
                    format!("{} already exists (use --force to overwrite)", path.display()),
                ));
            }
            let path = save_config(&Config::default())?;
            if !global.quiet {
                eprintln!("✓ Configuration written to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load()?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n# {e}")),
                |_| config::config_path().display().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load()?;
            set_key(&mut cfg, &key, value)?;
            let path = save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Set {key} in {}", path.display());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_known_keys() {
        let mut cfg = Config::default();
        set_key(&mut cfg, "client.api_url", "http://pi.local:8000".into()).unwrap();
        set_key(&mut cfg, "client.reconnect_attempts", "0".into()).unwrap();
        set_key(&mut cfg, "server.sources.Door", "Contact porte".into()).unwrap();

        assert_eq!(cfg.client.api_url, "http://pi.local:8000");
        assert_eq!(cfg.client.reconnect_attempts, 0);
        assert_eq!(cfg.server.sources.get("Door").map(String::as_str), Some("Contact porte"));
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(set_key(&mut cfg, "client.colour", "red".into()).is_err());
        assert!(set_key(&mut cfg, "server.history_capacity", "many".into()).is_err());
        assert!(set_key(&mut cfg, "server.history_capacity", "0".into()).is_err());
        assert!(set_key(&mut cfg, "client.api_url", "not a url".into()).is_err());
    }
}
