// ── Cover entity ──
//
// Maps host lifecycle calls onto the device's status cache, and raw
// data-point values onto host-visible cover properties. Holds no retry
// logic of its own.

use std::sync::Arc;

use coverlink_api::{DeviceClient, DpIndex, DpValue, StateSnapshot};
use serde::Serialize;
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::CoverConfig;
use crate::error::CoreError;
use crate::store::{StatusCache, WriteOutcome};

/// Direction the cover is currently travelling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Movement {
    #[default]
    Idle,
    Opening,
    Closing,
}

impl Movement {
    fn from_dp(value: &DpValue) -> Self {
        match value.as_str().map(str::to_ascii_lowercase).as_deref() {
            Some("opening") => Self::Opening,
            Some("closing") => Self::Closing,
            _ => Self::Idle,
        }
    }
}

/// Host-visible state derived from the last snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverState {
    pub available: bool,
    /// 0 = closed, 100 = fully open.
    pub position: Option<u8>,
    pub movement: Movement,
    pub last_command: Option<String>,
    pub last_movement: Option<String>,
    pub last_position_set: Option<i64>,
}

/// Host-facing identifier of the cover on `device_id` commanded via `id`.
pub fn unique_id(device_id: &str, id: DpIndex) -> String {
    format!("local_{device_id}_{id}")
}

/// One cover exposed to the host.
pub struct CoverEntity<C> {
    cache: Arc<StatusCache<C>>,
    config: CoverConfig,
    unique_id: String,
    state: watch::Sender<CoverState>,
}

impl<C: DeviceClient> CoverEntity<C> {
    pub fn new(cache: Arc<StatusCache<C>>, config: CoverConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let unique_id = unique_id(cache.device_id(), config.id);
        let (state, _) = watch::channel(CoverState::default());
        info!(unique_id, name = %config.name, "cover entity initialised");
        Ok(Self {
            cache,
            config,
            unique_id,
            state,
        })
    }

    // ── Host callbacks ───────────────────────────────────────────────

    /// Periodic poll. Never fails: errors mark the entity unavailable.
    pub async fn update(&self) {
        match self.cache.status().await {
            Ok(snapshot) => {
                let derived = self.derive(&snapshot);
                debug!(
                    unique_id = %self.unique_id,
                    position = ?derived.position,
                    movement = %derived.movement,
                    "cover state updated"
                );
                self.state.send_replace(derived);
            }
            Err(err) => {
                warn!(unique_id = %self.unique_id, error = %err, "cover update failed");
                self.state.send_modify(|s| s.available = false);
            }
        }
    }

    pub async fn open_cover(&self) -> Result<WriteOutcome, CoreError> {
        self.command(&self.config.open_cmd).await
    }

    pub async fn close_cover(&self) -> Result<WriteOutcome, CoreError> {
        self.command(&self.config.close_cmd).await
    }

    pub async fn stop_cover(&self) -> Result<WriteOutcome, CoreError> {
        self.command(&self.config.stop_cmd).await
    }

    /// Move to `position` (0 = closed, 100 = open). Out-of-range values are
    /// refused before the device is contacted.
    pub async fn set_cover_position(&self, position: i64) -> Result<WriteOutcome, CoreError> {
        if !(0..=100).contains(&position) {
            warn!(unique_id = %self.unique_id, position, "position outside 0-100");
            return Err(CoreError::ValidationFailed {
                message: format!("cover position must be between 0 and 100, got {position}"),
            });
        }
        if !self.supports_set_position() {
            return Err(CoreError::Config {
                message: format!("cover '{}' has no set_position data point", self.config.name),
            });
        }

        let raw = if self.config.invert_position {
            100 - position
        } else {
            position
        };
        debug!(unique_id = %self.unique_id, position, raw, "setting cover position");
        self.cache
            .set_value(self.config.set_position, DpValue::Int(raw))
            .await
    }

    // ── Properties ───────────────────────────────────────────────────

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CoverConfig {
        &self.config
    }

    /// Open, close and stop are always supported; positioning needs a
    /// set-position data point.
    pub fn supports_set_position(&self) -> bool {
        self.config.set_position != 0
    }

    pub fn available(&self) -> bool {
        self.state.borrow().available
    }

    pub fn current_cover_position(&self) -> Option<u8> {
        self.state.borrow().position
    }

    pub fn is_closed(&self) -> bool {
        self.current_cover_position() == Some(0)
    }

    pub fn is_opening(&self) -> bool {
        self.state.borrow().movement == Movement::Opening
    }

    pub fn is_closing(&self) -> bool {
        self.state.borrow().movement == Movement::Closing
    }

    pub fn last_command(&self) -> Option<String> {
        self.state.borrow().last_command.clone()
    }

    pub fn last_movement(&self) -> Option<String> {
        self.state.borrow().last_movement.clone()
    }

    pub fn state(&self) -> CoverState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoverState> {
        self.state.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn command(&self, cmd: &str) -> Result<WriteOutcome, CoreError> {
        debug!(unique_id = %self.unique_id, cmd, "sending cover command");
        self.cache
            .set_value(self.config.id, DpValue::from(cmd))
            .await
    }

    fn derive(&self, snapshot: &StateSnapshot) -> CoverState {
        let position = dp(snapshot, self.config.get_position)
            .and_then(DpValue::as_int)
            .map(|raw| {
                let raw = raw.clamp(0, 100);
                let host = if self.config.invert_position { 100 - raw } else { raw };
                u8::try_from(host).unwrap_or(0)
            });
        let last_movement = dp(snapshot, self.config.last_movement);

        CoverState {
            // The empty snapshot is the "nothing known" sentinel.
            available: !snapshot.is_empty(),
            position,
            movement: last_movement.map_or(Movement::Idle, Movement::from_dp),
            last_command: dp(snapshot, self.config.id).map(ToString::to_string),
            last_movement: last_movement.map(ToString::to_string),
            last_position_set: dp(snapshot, self.config.set_position).and_then(DpValue::as_int),
        }
    }
}

/// Data point `index` of `snapshot`, treating index 0 as unconfigured.
fn dp(snapshot: &StateSnapshot, index: DpIndex) -> Option<&DpValue> {
    if index == 0 {
        return None;
    }
    snapshot.get(index)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use coverlink_api::{SimLayout, SimulatedCover};
    use pretty_assertions::assert_eq;

    fn entity() -> CoverEntity<SimulatedCover> {
        let cache = StatusCache::new(
            SimulatedCover::new("dev-1", SimLayout::default()),
            CacheConfig::default(),
        )
        .unwrap();
        CoverEntity::new(
            Arc::new(cache),
            CoverConfig::new(1, "guests").with_positions(3, 2, 7),
        )
        .unwrap()
    }

    #[test]
    fn unique_id_combines_device_and_dp() {
        assert_eq!(entity().unique_id(), "local_dev-1_1");
    }

    #[test]
    fn derives_inverted_position_and_movement() {
        let e = entity();
        let snap: StateSnapshot = [
            (1, DpValue::from("close")),
            (2, DpValue::Int(100)),
            (3, DpValue::Int(100)),
            (7, DpValue::from("Closing")),
        ]
        .into_iter()
        .collect();

        let state = e.derive(&snap);
        assert_eq!(state.position, Some(0));
        assert_eq!(state.movement, Movement::Closing);
        assert_eq!(state.last_command.as_deref(), Some("close"));
        assert_eq!(state.last_position_set, Some(100));
        assert!(state.available);
    }

    #[test]
    fn empty_sentinel_reads_as_unavailable() {
        let state = entity().derive(&StateSnapshot::empty());
        assert_eq!(state, CoverState::default());
    }

    #[test]
    fn out_of_range_device_positions_are_clamped() {
        let e = entity();
        let snap: StateSnapshot = [(3, DpValue::Int(140))].into_iter().collect();
        assert_eq!(e.derive(&snap).position, Some(0));
    }
}
