//! Shared configuration for coverlink.
//!
//! TOML device profiles, local-key resolution (env + keyring + plaintext),
//! and translation into `coverlink_core` / `coverlink_api` settings. The CLI
//! adds `--config` handling on top.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use coverlink_api::{DEFAULT_PORT, DeviceSettings, DpIndex, ProtocolVersion};
use coverlink_core::{CacheConfig, CoverConfig, ExhaustionPolicy};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tracing::debug;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no local key configured for device '{device}'")]
    NoLocalKey { device: String },

    #[error("device '{name}' is not configured")]
    UnknownDevice { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Cache tuning applied to every device unless overridden.
    #[serde(default)]
    pub defaults: CacheDefaults,

    /// Named devices, keyed by a short local name.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheDefaults {
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default)]
    pub on_exhaustion: ExhaustionPolicy,

    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for CacheDefaults {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
            retries: default_retries(),
            on_exhaustion: ExhaustionPolicy::default(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_staleness_secs() -> u64 {
    15
}
fn default_retries() -> u32 {
    3
}
fn default_attempt_timeout_ms() -> u64 {
    5_000
}
fn default_settle_delay_ms() -> u64 {
    500
}
fn default_retry_delay_ms() -> u64 {
    1_000
}

/// One physical device on the local network.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Display name shown in listings.
    pub friendly_name: Option<String>,

    /// IP address or hostname.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Vendor device identifier.
    pub device_id: String,

    /// Local key (plaintext; prefer keyring or env var).
    pub local_key: Option<String>,

    /// Environment variable name containing the local key.
    pub local_key_env: Option<String>,

    /// "3.1" or "3.3".
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    // Per-device cache overrides.
    pub staleness_secs: Option<u64>,
    pub retries: Option<u32>,
    pub on_exhaustion: Option<ExhaustionPolicy>,
    pub attempt_timeout_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,

    #[serde(default)]
    pub covers: Vec<CoverProfile>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_protocol_version() -> String {
    "3.3".into()
}

impl DeviceProfile {
    pub fn display_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.friendly_name.as_deref().unwrap_or(name)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One cover entity backed by a device.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoverProfile {
    /// Command data point; also the entity id.
    pub id: DpIndex,

    pub name: String,

    #[serde(default = "default_open_cmd")]
    pub open_cmd: String,

    #[serde(default = "default_close_cmd")]
    pub close_cmd: String,

    #[serde(default = "default_stop_cmd")]
    pub stop_cmd: String,

    #[serde(default)]
    pub get_position: DpIndex,

    #[serde(default)]
    pub set_position: DpIndex,

    #[serde(default)]
    pub last_movement: DpIndex,

    /// Override the raw-100-is-closed convention.
    pub invert_position: Option<bool>,
}

fn default_open_cmd() -> String {
    "open".into()
}
fn default_close_cmd() -> String {
    "close".into()
}
fn default_stop_cmd() -> String {
    "stop".into()
}

impl Config {
    /// Example configuration written by `config init`.
    pub fn starter() -> Self {
        let cover = CoverProfile {
            id: 1,
            name: "cover_guests".into(),
            open_cmd: default_open_cmd(),
            close_cmd: default_close_cmd(),
            stop_cmd: default_stop_cmd(),
            get_position: 3,
            set_position: 2,
            last_movement: 7,
            invert_position: None,
        };
        let device = DeviceProfile {
            friendly_name: Some("Cover guests".into()),
            host: "192.168.0.123".into(),
            port: DEFAULT_PORT,
            device_id: "123456789123456789abcd".into(),
            local_key: None,
            local_key_env: Some("GUESTS_LOCAL_KEY".into()),
            protocol_version: default_protocol_version(),
            staleness_secs: None,
            retries: None,
            on_exhaustion: None,
            attempt_timeout_ms: None,
            settle_delay_ms: None,
            retry_delay_ms: None,
            covers: vec![cover],
        };
        Self {
            defaults: CacheDefaults::default(),
            devices: BTreeMap::from([("guests".to_owned(), device)]),
        }
    }

    pub fn device(&self, name: &str) -> Result<&DeviceProfile, ConfigError> {
        self.devices
            .get(name)
            .ok_or_else(|| ConfigError::UnknownDevice { name: name.into() })
    }

    /// Check every device and cover for values the runtime would refuse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.retries == 0 {
            return Err(validation("defaults.retries", "must be at least 1"));
        }
        if self.defaults.attempt_timeout_ms == 0 {
            return Err(validation("defaults.attempt_timeout_ms", "must be greater than zero"));
        }
        for (name, profile) in &self.devices {
            validate_device(name, profile)?;
        }
        Ok(())
    }
}

fn validation(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

fn validate_device(name: &str, profile: &DeviceProfile) -> Result<(), ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(validation(format!("devices.{name}.host"), "cannot be empty"));
    }
    if profile.device_id.trim().is_empty() {
        return Err(validation(format!("devices.{name}.device_id"), "cannot be empty"));
    }
    if profile.retries == Some(0) {
        return Err(validation(format!("devices.{name}.retries"), "must be at least 1"));
    }
    if profile.attempt_timeout_ms == Some(0) {
        return Err(validation(
            format!("devices.{name}.attempt_timeout_ms"),
            "must be greater than zero",
        ));
    }
    protocol_version(name, profile)?;

    let mut seen = HashSet::new();
    for cover in &profile.covers {
        if cover.id == 0 {
            return Err(validation(
                format!("devices.{name}.covers.{}", cover.name),
                "id must be a non-zero data point",
            ));
        }
        if !seen.insert(cover.id) {
            return Err(validation(
                format!("devices.{name}.covers"),
                format!("duplicate cover id {}", cover.id),
            ));
        }
        for (field, cmd) in [
            ("open_cmd", &cover.open_cmd),
            ("close_cmd", &cover.close_cmd),
            ("stop_cmd", &cover.stop_cmd),
        ] {
            if cmd.is_empty() {
                return Err(validation(
                    format!("devices.{name}.covers.{}.{field}", cover.name),
                    "cannot be empty",
                ));
            }
        }
    }
    Ok(())
}

fn protocol_version(name: &str, profile: &DeviceProfile) -> Result<ProtocolVersion, ConfigError> {
    ProtocolVersion::from_str(&profile.protocol_version).map_err(|_| {
        validation(
            format!("devices.{name}.protocol_version"),
            format!("expected '3.1' or '3.3', got '{}'", profile.protocol_version),
        )
    })
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "coverlink", "coverlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("coverlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate the config from `path` + environment. A missing file
/// yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("COVERLINK_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Local key resolution ────────────────────────────────────────────

/// Where a device's local key was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KeySource {
    Env,
    Keyring,
    Plaintext,
}

/// Resolve a device's local key: env var, then system keyring, then
/// plaintext in the profile.
pub fn resolve_local_key(
    profile: &DeviceProfile,
    device_name: &str,
) -> Result<(SecretString, KeySource), ConfigError> {
    // 1. Profile's local_key_env → env var lookup
    if let Some(ref env_name) = profile.local_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok((SecretString::from(val), KeySource::Env));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new("coverlink", &format!("{device_name}/local-key")) {
        if let Ok(secret) = entry.get_password() {
            return Ok((SecretString::from(secret), KeySource::Keyring));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.local_key {
        return Ok((SecretString::from(key.clone()), KeySource::Plaintext));
    }

    Err(ConfigError::NoLocalKey {
        device: device_name.into(),
    })
}

// ── Translation to runtime settings ─────────────────────────────────

/// Connection settings for a device together with where its key came from.
#[derive(Debug, Clone)]
pub struct ResolvedDevice {
    pub settings: DeviceSettings,
    pub key_source: KeySource,
}

/// Connection settings for a device, with its local key resolved.
pub fn device_settings(
    profile: &DeviceProfile,
    device_name: &str,
) -> Result<ResolvedDevice, ConfigError> {
    validate_device(device_name, profile)?;
    let version = protocol_version(device_name, profile)?;
    let (key, key_source) = resolve_local_key(profile, device_name)?;
    let settings =
        DeviceSettings::new(&profile.host, &profile.device_id, key, version).with_port(profile.port);
    Ok(ResolvedDevice {
        settings,
        key_source,
    })
}

/// Cache tuning for a device: global defaults with per-device overrides.
pub fn cache_config(defaults: &CacheDefaults, profile: &DeviceProfile) -> CacheConfig {
    CacheConfig {
        retries: profile.retries.unwrap_or(defaults.retries),
        staleness: Duration::from_secs(profile.staleness_secs.unwrap_or(defaults.staleness_secs)),
        on_exhaustion: profile.on_exhaustion.unwrap_or(defaults.on_exhaustion),
        attempt_timeout: Duration::from_millis(
            profile
                .attempt_timeout_ms
                .unwrap_or(defaults.attempt_timeout_ms),
        ),
        settle_delay: Duration::from_millis(
            profile.settle_delay_ms.unwrap_or(defaults.settle_delay_ms),
        ),
        retry_delay: Duration::from_millis(profile.retry_delay_ms.unwrap_or(defaults.retry_delay_ms)),
    }
}

/// Entity configurations for every cover on a device.
pub fn cover_configs(profile: &DeviceProfile) -> Vec<CoverConfig> {
    profile
        .covers
        .iter()
        .map(|c| {
            let mut cfg = CoverConfig::new(c.id, c.name.clone()).with_positions(
                c.get_position,
                c.set_position,
                c.last_movement,
            );
            cfg.open_cmd.clone_from(&c.open_cmd);
            cfg.close_cmd.clone_from(&c.close_cmd);
            cfg.stop_cmd.clone_from(&c.stop_cmd);
            if let Some(invert) = c.invert_position {
                cfg.invert_position = invert;
            }
            cfg
        })
        .collect()
}
