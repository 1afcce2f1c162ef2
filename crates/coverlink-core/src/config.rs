// ── Runtime configuration ──
//
// These types describe how the cache and cover entities behave. They
// never touch disk; coverlink-config builds them from TOML and hands
// them in.

use std::time::Duration;

use coverlink_api::DpIndex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;

/// What a cache operation does once its retry budget is spent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Surface `CoreError::RetriesExhausted` to the caller.
    #[default]
    Fail,
    /// Log a warning and hand back the last known snapshot (or the empty
    /// sentinel); writes report `WriteOutcome::Abandoned`.
    ReturnStale,
}

/// Tuning for one device's status cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum attempts per logical operation. Must be at least 1.
    pub retries: u32,
    /// Oldest snapshot age still served without a refresh.
    pub staleness: Duration,
    pub on_exhaustion: ExhaustionPolicy,
    /// Upper bound on a single exchange with the device.
    pub attempt_timeout: Duration,
    /// Pause before a refresh so a device that just took a command can settle.
    pub settle_delay: Duration,
    /// Pause between failed attempts.
    pub retry_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            staleness: Duration::from_secs(15),
            on_exhaustion: ExhaustionPolicy::Fail,
            attempt_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_millis(500),
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.retries == 0 {
            return Err(CoreError::Config {
                message: "retries must be at least 1".into(),
            });
        }
        if self.attempt_timeout.is_zero() {
            return Err(CoreError::Config {
                message: "attempt timeout must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// How one cover entity maps onto its device's data points.
///
/// Index 0 means the data point is not configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverConfig {
    /// Data point receiving open/close/stop commands.
    pub id: DpIndex,
    pub name: String,
    pub open_cmd: String,
    pub close_cmd: String,
    pub stop_cmd: String,
    pub get_position: DpIndex,
    pub set_position: DpIndex,
    pub last_movement: DpIndex,
    /// The device reports 100 for fully closed; flip to the host's
    /// 0 = closed convention. Applies to writes too: with the default,
    /// `set_cover_position(30)` sends raw 70 rather than the host value.
    /// Set to `false` for firmware that takes host positions as written.
    pub invert_position: bool,
}

impl CoverConfig {
    pub fn new(id: DpIndex, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            open_cmd: "open".into(),
            close_cmd: "close".into(),
            stop_cmd: "stop".into(),
            get_position: 0,
            set_position: 0,
            last_movement: 0,
            invert_position: true,
        }
    }

    pub fn with_positions(mut self, get: DpIndex, set: DpIndex, last_movement: DpIndex) -> Self {
        self.get_position = get;
        self.set_position = set;
        self.last_movement = last_movement;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id == 0 {
            return Err(CoreError::Config {
                message: format!("cover '{}' needs a command data point", self.name),
            });
        }
        for (field, cmd) in [
            ("open_cmd", &self.open_cmd),
            ("close_cmd", &self.close_cmd),
            ("stop_cmd", &self.stop_cmd),
        ] {
            if cmd.is_empty() {
                return Err(CoreError::Config {
                    message: format!("cover '{}': {field} cannot be empty", self.name),
                });
            }
        }
        Ok(())
    }
}
