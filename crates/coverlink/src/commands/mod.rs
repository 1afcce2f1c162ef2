//! Command dispatch: bridges CLI args -> config + core -> output formatting.

pub mod config_cmd;
pub mod covers;
pub mod simulate;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a command that needs configured devices.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_with_devices(global)?;
    match cmd {
        Command::Covers(args) => covers::handle(args, &cfg, global),
        Command::Simulate(args) => simulate::handle(args, &cfg, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
