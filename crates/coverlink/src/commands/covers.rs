//! Cover listing handler.

use coverlink_api::DpIndex;
use coverlink_config::{Config, ConfigError, DeviceProfile, cover_configs, device_settings};
use coverlink_core::cover::unique_id;
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use crate::cli::{CoversArgs, CoversCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Listing model ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CoverListing {
    device: String,
    friendly_name: String,
    address: String,
    device_id: String,
    protocol_version: String,
    unique_id: String,
    name: String,
    command_dp: DpIndex,
    get_position: DpIndex,
    set_position: DpIndex,
    last_movement: DpIndex,
    invert_position: bool,
    /// Where the local key resolves from, or "missing".
    local_key: String,
}

#[derive(Tabled)]
struct CoverRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Cover")]
    name: String,
    #[tabled(rename = "Unique ID")]
    unique_id: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "DPs (cmd/get/set/move)")]
    dps: String,
    #[tabled(rename = "Key")]
    local_key: String,
}

impl From<&CoverListing> for CoverRow {
    fn from(c: &CoverListing) -> Self {
        let dp = |i: DpIndex| if i == 0 { "-".to_owned() } else { i.to_string() };
        Self {
            device: c.friendly_name.clone(),
            name: c.name.clone(),
            unique_id: c.unique_id.clone(),
            address: c.address.clone(),
            dps: format!(
                "{}/{}/{}/{}",
                c.command_dp,
                dp(c.get_position),
                dp(c.set_position),
                dp(c.last_movement)
            ),
            local_key: c.local_key.clone(),
        }
    }
}

/// Resolve the device's connection settings; returns its address and key
/// source. A missing key is reported, not fatal.
fn connection(name: &str, profile: &DeviceProfile) -> Result<(String, String), CliError> {
    match device_settings(profile, name) {
        Ok(resolved) => Ok((resolved.settings.address(), resolved.key_source.to_string())),
        Err(ConfigError::NoLocalKey { .. }) => {
            debug!(device = name, "no local key resolved");
            Ok((profile.address(), "missing".into()))
        }
        Err(e) => Err(e.into()),
    }
}

fn listings(cfg: &Config, only: Option<&str>) -> Result<Vec<CoverListing>, CliError> {
    if let Some(name) = only {
        cfg.device(name)?;
    }

    let mut out = Vec::new();
    for (name, profile) in &cfg.devices {
        if only.is_some_and(|o| o != name) {
            continue;
        }
        let (address, local_key) = connection(name, profile)?;
        for cover in cover_configs(profile) {
            out.push(CoverListing {
                device: name.clone(),
                friendly_name: profile.display_name(name).to_owned(),
                address: address.clone(),
                device_id: profile.device_id.clone(),
                protocol_version: profile.protocol_version.clone(),
                unique_id: unique_id(&profile.device_id, cover.id),
                name: cover.name,
                command_dp: cover.id,
                get_position: cover.get_position,
                set_position: cover.set_position,
                last_movement: cover.last_movement,
                invert_position: cover.invert_position,
                local_key: local_key.clone(),
            });
        }
    }
    Ok(out)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: CoversArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        CoversCommand::List { device } => {
            let covers = listings(cfg, device.as_deref())?;
            let rendered = output::render_list(
                &global.output,
                &covers,
                |c| CoverRow::from(c),
                |c| c.unique_id.clone(),
            );
            output::print_output(&rendered, global.quiet);
            Ok(())
        }
    }
}
