//! CLI-side configuration: file + env via `homewatch_config`, then global
//! flag overrides, then translation to `homewatch_core::ClientConfig`.

use std::sync::Arc;

use homewatch_config::{ClientSection, Config};
use homewatch_core::{ClientConfig, JsonFilePersistence, MemoryPersistence, Persistence};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use homewatch_config::config_path;

/// Load the config file and environment layers.
pub fn load() -> Result<Config, CliError> {
    Ok(homewatch_config::load_config()?)
}

/// Apply global flags on top of the `[client]` section.
pub fn apply_overrides(mut section: ClientSection, global: &GlobalOpts) -> ClientSection {
    if let Some(ref url) = global.url {
        section.api_url.clone_from(url);
    }
    if let Some(ref ws) = global.ws_url {
        section.ws_url = Some(ws.clone());
    }
    if let Some(ref dir) = global.state_dir {
        section.state_dir = Some(dir.clone());
    }
    if let Some(timeout) = global.timeout {
        section.request_timeout_secs = timeout;
    }
    section
}

/// Resolve the effective client configuration.
pub fn client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let cfg = load()?;
    let section = apply_overrides(cfg.client, global);
    Ok(section.client_config()?)
}

/// Where mode and settings are stored.
pub fn persistence(config: &ClientConfig) -> Arc<dyn Persistence> {
    match config.state_dir {
        Some(ref dir) => Arc::new(JsonFilePersistence::new(dir.clone())),
        None => Arc::new(MemoryPersistence::new()),
    }
}
