//! CLI configuration: thin wrapper around `coverlink_config`.
//!
//! Adds `--config` / `COVERLINK_CONFIG` path resolution on top of the shared
//! loader.

use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use coverlink_config::{Config, save_config};

/// The file this invocation reads: `--config` if given, else the platform
/// default.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(coverlink_config::config_path)
}

/// Load and validate the active configuration.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = active_path(global);
    tracing::debug!(path = %path.display(), "resolving configuration");
    Ok(coverlink_config::load_config_from(&path)?)
}

/// Load the active configuration and fail if it names no devices.
pub fn load_with_devices(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = load(global)?;
    if cfg.devices.is_empty() {
        return Err(CliError::NoDevices {
            path: active_path(global).display().to_string(),
        });
    }
    Ok(cfg)
}
