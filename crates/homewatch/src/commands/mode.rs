//! Surveillance mode command handler.

use serde::Serialize;

use homewatch_core::{ClientConfig, DashboardStore, Mode};

use crate::cli::{GlobalOpts, ModeArgs, ModeValue};
use crate::config;
use crate::error::CliError;
use crate::output;

impl From<ModeValue> for Mode {
    fn from(value: ModeValue) -> Self {
        match value {
            ModeValue::Surveillance => Mode::Surveillance,
            ModeValue::Actif => Mode::Actif,
        }
    }
}

#[derive(Serialize)]
struct ModeView {
    mode: Mode,
    motion_alerts: bool,
}

pub fn handle(config: &ClientConfig, args: &ModeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut store = DashboardStore::new(config::persistence(config));

    if let Some(value) = args.mode {
        store.set_mode(value.into())?;
        tracing::info!(mode = %store.mode(), "mode changed");
    }

    let view = ModeView {
        mode: store.mode(),
        motion_alerts: store.mode() == Mode::Surveillance,
    };
    let out = output::render_single(
        &global.output,
        &view,
        |v| {
            let scope = if v.motion_alerts {
                "all sensors raise alerts"
            } else {
                "only the pressure mat raises alerts"
            };
            format!("Mode: {} ({scope})", v.mode)
        },
        |v| v.mode.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
