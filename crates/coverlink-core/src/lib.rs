//! Status caching and cover entities on top of `coverlink-api`.
//!
//! This crate owns the device-facing logic of the coverlink workspace:
//!
//! - **[`StatusCache`]**: One per device. Serves reads from a snapshot that
//!   is at most [`CacheConfig::staleness`] old, refreshes it with bounded
//!   retries, collapses concurrent refreshes into one device round-trip, and
//!   invalidates the snapshot before every write.
//!
//! - **[`CoverEntity`]**: Host-facing adapter for one window covering.
//!   Translates open / close / stop / set-position into data-point writes
//!   and derives position and movement from the cached snapshot.
//!
//! - **[`DeviceRegistry`]**: `DashMap` of device id to shared
//!   `Arc<StatusCache>`, so every cover on a device goes through the same
//!   lock and the same cache.

pub mod config;
pub mod cover;
pub mod error;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CacheConfig, CoverConfig, ExhaustionPolicy};
pub use cover::{CoverEntity, CoverState, Movement};
pub use error::CoreError;
pub use store::{DeviceRegistry, StatusCache, WriteOutcome};
