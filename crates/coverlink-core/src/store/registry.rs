// ── Device registry ──
//
// One status cache per device connection, shared by every cover entity
// configured on that device. Concurrent lookups go through `DashMap`.

use std::sync::Arc;

use coverlink_api::DeviceClient;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::status_cache::StatusCache;
use crate::error::CoreError;

/// Concurrent map of device id to its shared [`StatusCache`].
pub struct DeviceRegistry<C> {
    caches: DashMap<String, Arc<StatusCache<C>>>,
}

impl<C: DeviceClient> Default for DeviceRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: DeviceClient> DeviceRegistry<C> {
    pub fn new() -> Self {
        Self {
            caches: DashMap::new(),
        }
    }

    /// Return the cache for `device_id`, building it with `build` on first
    /// use. A failed build leaves the registry unchanged.
    pub fn get_or_try_insert_with(
        &self,
        device_id: &str,
        build: impl FnOnce() -> Result<StatusCache<C>, CoreError>,
    ) -> Result<Arc<StatusCache<C>>, CoreError> {
        match self.caches.entry(device_id.to_owned()) {
            Entry::Occupied(existing) => Ok(Arc::clone(existing.get())),
            Entry::Vacant(slot) => {
                let cache = Arc::new(build()?);
                debug!(device_id, "registered device cache");
                slot.insert(Arc::clone(&cache));
                Ok(cache)
            }
        }
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<StatusCache<C>>> {
        self.caches.get(device_id).map(|r| Arc::clone(r.value()))
    }

    /// Forget a device. Entities still holding its cache keep working.
    pub fn remove(&self, device_id: &str) -> Option<Arc<StatusCache<C>>> {
        self.caches.remove(device_id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// All registered device ids, sorted.
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.caches.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use coverlink_api::{SimLayout, SimulatedCover};

    fn build(id: &str) -> Result<StatusCache<SimulatedCover>, CoreError> {
        StatusCache::new(
            SimulatedCover::new(id, SimLayout::default()),
            CacheConfig::default(),
        )
    }

    #[test]
    fn same_device_shares_one_cache() {
        let reg = DeviceRegistry::new();
        let a = reg.get_or_try_insert_with("dev-a", || build("dev-a")).unwrap();
        let again = reg
            .get_or_try_insert_with("dev-a", || panic!("must not rebuild"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn failed_build_is_not_registered() {
        let reg: DeviceRegistry<SimulatedCover> = DeviceRegistry::new();
        let err = reg.get_or_try_insert_with("bad", || {
            StatusCache::new(
                SimulatedCover::new("bad", SimLayout::default()),
                CacheConfig {
                    retries: 0,
                    ..CacheConfig::default()
                },
            )
        });
        assert!(err.is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn device_ids_sorted_and_remove_works() {
        let reg = DeviceRegistry::new();
        reg.get_or_try_insert_with("b", || build("b")).unwrap();
        reg.get_or_try_insert_with("a", || build("a")).unwrap();
        assert_eq!(reg.device_ids(), vec!["a".to_string(), "b".to_string()]);

        assert!(reg.remove("a").is_some());
        assert!(reg.get("a").is_none());
        assert!(reg.get("b").is_some());
    }
}
