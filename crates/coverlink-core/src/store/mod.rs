// ── Device status storage ──
//
// Per-device status caches and the registry that shares them between
// entities.

mod entry;
mod registry;
mod status_cache;

pub use registry::DeviceRegistry;
pub use status_cache::{StatusCache, WriteOutcome};
