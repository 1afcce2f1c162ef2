//! Host-style polling harness against simulated devices.
//!
//! Builds one simulated device per configured profile, wires the cover
//! entities through a shared [`DeviceRegistry`], issues the optional
//! command, then polls `update()` on an interval until the tick budget is
//! spent or Ctrl-C cancels.

use std::sync::Arc;
use std::time::Duration;

use coverlink_api::{SimLayout, SimulatedCover};
use coverlink_config::{Config, DeviceProfile, cache_config, cover_configs};
use coverlink_core::{CoverConfig, CoverEntity, DeviceRegistry, StatusCache, WriteOutcome};
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::{GlobalOpts, SimulateArgs};
use crate::error::CliError;
use crate::output;

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TickRecord {
    tick: u32,
    device: String,
    unique_id: String,
    name: String,
    available: bool,
    position: Option<u8>,
    movement: coverlink_core::Movement,
    last_command: Option<String>,
}

#[derive(Tabled)]
struct TickRow {
    #[tabled(rename = "Tick")]
    tick: u32,
    #[tabled(rename = "Cover")]
    name: String,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Movement")]
    movement: String,
    #[tabled(rename = "Last Command")]
    last_command: String,
}

fn to_row(r: &TickRecord, color: bool) -> TickRow {
    TickRow {
        tick: r.tick,
        name: r.name.clone(),
        available: output::paint_available(r.available, color),
        position: r.position.map_or_else(|| "-".into(), |p| format!("{p}%")),
        movement: output::paint_movement(r.movement, color),
        last_command: r.last_command.clone().unwrap_or_else(|| "-".into()),
    }
}

// ── Wiring ──────────────────────────────────────────────────────────

type Entity = CoverEntity<SimulatedCover>;

/// Simulated device shaped after the first cover of a profile. Command data
/// points of further covers are exposed as plain writable values.
fn simulated_device(profile: &DeviceProfile, covers: &[CoverConfig]) -> SimulatedCover {
    let layout = covers.first().map_or_else(SimLayout::default, |c| SimLayout {
        command_dp: c.id,
        position_dp: c.get_position,
        set_position_dp: c.set_position,
        movement_dp: c.last_movement,
        open_cmd: c.open_cmd.clone(),
        close_cmd: c.close_cmd.clone(),
        stop_cmd: c.stop_cmd.clone(),
        ..SimLayout::default()
    });
    covers
        .iter()
        .skip(1)
        .fold(SimulatedCover::new(&profile.device_id, layout), |dev, c| {
            dev.with_dp(c.id, "")
        })
}

fn build_entities(
    cfg: &Config,
    args: &SimulateArgs,
) -> Result<(DeviceRegistry<SimulatedCover>, Vec<(String, Entity)>), CliError> {
    let registry = DeviceRegistry::new();
    let mut entities = Vec::new();

    for (name, profile) in &cfg.devices {
        if args.device.as_deref().is_some_and(|d| d != name) {
            continue;
        }
        let covers = cover_configs(profile);
        let mut cache_cfg = cache_config(&cfg.defaults, profile);
        if let Some(ms) = args.staleness_ms {
            cache_cfg.staleness = Duration::from_millis(ms);
        }

        let cache = registry.get_or_try_insert_with(&profile.device_id, || {
            StatusCache::new(simulated_device(profile, &covers), cache_cfg)
        })?;
        debug!(device = %name, covers = covers.len(), "simulated device ready");

        for cover in covers {
            entities.push((name.clone(), CoverEntity::new(Arc::clone(&cache), cover)?));
        }
    }
    Ok((registry, entities))
}

async fn apply_command(entity: &Entity, args: &SimulateArgs) -> Result<(), CliError> {
    let outcome = if args.open {
        entity.open_cover().await?
    } else if args.close {
        entity.close_cover().await?
    } else if args.stop {
        entity.stop_cover().await?
    } else if let Some(position) = args.position {
        entity.set_cover_position(position).await?
    } else {
        return Ok(());
    };

    match outcome {
        WriteOutcome::Applied => info!(unique_id = entity.unique_id(), "command applied"),
        WriteOutcome::Abandoned => warn!(unique_id = entity.unique_id(), "command abandoned"),
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SimulateArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref device) = args.device {
        cfg.device(device)?;
    }
    let (registry, entities) = build_entities(cfg, &args)?;
    info!(
        devices = registry.len(),
        covers = entities.len(),
        "starting simulation"
    );

    for (_, entity) in &entities {
        apply_command(entity, &args).await?;
    }

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut interval = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut records = Vec::new();
    for tick in 1..=args.ticks {
        tokio::select! {
            () = cancel.cancelled() => {
                info!(tick, "simulation cancelled");
                break;
            }
            _ = interval.tick() => {}
        }

        for (device, entity) in &entities {
            entity.update().await;
            let state = entity.state();
            records.push(TickRecord {
                tick,
                device: device.clone(),
                unique_id: entity.unique_id().to_owned(),
                name: entity.name().to_owned(),
                available: state.available,
                position: state.position,
                movement: state.movement,
                last_command: state.last_command,
            });
        }
    }
    watcher.abort();

    let color = output::should_color(&global.color);
    let rendered = output::render_list(
        &global.output,
        &records,
        |r| to_row(r, color),
        |r| {
            format!(
                "{} {} {}",
                r.unique_id,
                r.position.map_or_else(|| "-".into(), |p| p.to_string()),
                r.movement
            )
        },
    );
    output::print_output(&rendered, global.quiet);
    Ok(())
}
