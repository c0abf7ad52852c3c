//! Command dispatch: bridges CLI args -> core stores / relay client -> output formatting.

pub mod config_cmd;
pub mod events;
pub mod mode;
pub mod network;
pub mod settings;
pub mod util;
pub mod watch;

use homewatch_core::ClientConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a relay-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: &ClientConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Events(args) => events::handle(config, args, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Mode(args) => mode::handle(config, &args, global),
        Command::Settings(args) => settings::handle(config, args, global),
        Command::Network(args) => network::handle(config, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
