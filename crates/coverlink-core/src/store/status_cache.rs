// ── Status cache ──
//
// Read-through cache with write invalidation around one device client.
// A single async mutex per device guards the cache entry and serialises
// every exchange with the device, reads and writes alike. The guard is
// held across the whole retry loop so concurrent readers collapse into
// one refresh.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use coverlink_api::{DeviceClient, DpIndex, DpValue, StateSnapshot};
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

use super::entry::CacheEntry;
use crate::config::{CacheConfig, ExhaustionPolicy};
use crate::error::CoreError;

/// Result of a write that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The device acknowledged the write.
    Applied,
    /// Every attempt failed and the policy is
    /// [`ExhaustionPolicy::ReturnStale`]; nothing reached the device.
    Abandoned,
}

impl WriteOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Caching, retrying, single-flight front for one device client.
///
/// Shared by every entity of the device (wrap it in an `Arc`). Snapshots
/// are handed out as `Arc<StateSnapshot>`, so every caller served from the
/// same fetch sees the same instance.
pub struct StatusCache<C> {
    client: C,
    config: CacheConfig,
    entry: Mutex<CacheEntry>,
    /// Latest stored snapshot, `None` after invalidation.
    snapshot: watch::Sender<Option<Arc<StateSnapshot>>>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl<C: DeviceClient> StatusCache<C> {
    /// Wrap `client`. Fails if `config` is unusable (e.g. zero retries).
    pub fn new(client: C, config: CacheConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let (snapshot, _) = watch::channel(None);
        let (last_refresh, _) = watch::channel(None);
        Ok(Self {
            client,
            config,
            entry: Mutex::new(CacheEntry::new()),
            snapshot,
            last_refresh,
        })
    }

    pub fn device_id(&self) -> &str {
        self.client.device_id()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current device state, from cache when fresh enough.
    ///
    /// On a miss the device is queried up to `retries` times. Callers that
    /// arrive during a refresh wait for it and receive its result.
    pub async fn status(&self) -> Result<Arc<StateSnapshot>, CoreError> {
        let mut entry = self.entry.lock().await;

        if let Some(snapshot) = entry.fresh(self.config.staleness, Instant::now()) {
            debug!(device_id = %self.device_id(), "status cache hit");
            return Ok(snapshot);
        }

        debug!(
            device_id = %self.device_id(),
            has_stale = entry.snapshot().is_some(),
            "status cache miss, refreshing"
        );

        if !self.config.settle_delay.is_zero() {
            sleep(self.config.settle_delay).await;
        }

        match self.with_retry("status", || self.client.status()).await {
            Ok(fetched) => {
                let snapshot = Arc::new(fetched);
                entry.store(Arc::clone(&snapshot), Instant::now());
                self.snapshot.send_replace(Some(Arc::clone(&snapshot)));
                self.last_refresh.send_replace(entry.fetched_at_utc());
                Ok(snapshot)
            }
            Err(err @ CoreError::RetriesExhausted { .. })
                if self.config.on_exhaustion == ExhaustionPolicy::ReturnStale =>
            {
                warn!(
                    device_id = %self.device_id(),
                    error = %err,
                    "status refresh gave up, serving last known state"
                );
                Ok(entry
                    .snapshot()
                    .unwrap_or_else(|| Arc::new(StateSnapshot::empty())))
            }
            Err(err) => Err(err),
        }
    }

    /// Peek at the stored snapshot without waiting on the device lock.
    pub fn cached(&self) -> Option<Arc<StateSnapshot>> {
        self.snapshot.borrow().clone()
    }

    /// Wall-clock time of the last successful refresh.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    /// Subscribe to stored snapshots; `None` is published on invalidation.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<StateSnapshot>>> {
        self.snapshot.subscribe()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Write one data point. The cache is invalidated first, so the next
    /// [`status()`](Self::status) always re-reads the device.
    pub async fn set_value(
        &self,
        index: DpIndex,
        value: DpValue,
    ) -> Result<WriteOutcome, CoreError> {
        let mut entry = self.entry.lock().await;
        self.invalidate_locked(&mut entry);

        debug!(device_id = %self.device_id(), index, %value, "writing data point");
        let result = self
            .with_retry("set_value", || self.client.set_value(index, value.clone()))
            .await;
        drop(entry);

        self.finish_write("set_value", result)
    }

    /// Switch a boolean data point. Same invalidation and retry rules as
    /// [`set_value()`](Self::set_value).
    pub async fn set_status(&self, on: bool, index: DpIndex) -> Result<WriteOutcome, CoreError> {
        let mut entry = self.entry.lock().await;
        self.invalidate_locked(&mut entry);

        debug!(device_id = %self.device_id(), index, on, "switching data point");
        let result = self
            .with_retry("set_status", || self.client.set_status(on, index))
            .await;
        drop(entry);

        self.finish_write("set_status", result)
    }

    /// Drop the stored snapshot so the next read goes to the device.
    pub async fn invalidate(&self) {
        let mut entry = self.entry.lock().await;
        self.invalidate_locked(&mut entry);
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn invalidate_locked(&self, entry: &mut CacheEntry) {
        entry.invalidate();
        self.snapshot.send_replace(None);
    }

    fn finish_write(
        &self,
        operation: &'static str,
        result: Result<(), CoreError>,
    ) -> Result<WriteOutcome, CoreError> {
        match result {
            Ok(()) => Ok(WriteOutcome::Applied),
            Err(err @ CoreError::RetriesExhausted { .. })
                if self.config.on_exhaustion == ExhaustionPolicy::ReturnStale =>
            {
                warn!(device_id = %self.device_id(), operation, error = %err, "write abandoned");
                Ok(WriteOutcome::Abandoned)
            }
            Err(err) => Err(err),
        }
    }

    /// Run `call` up to `retries` times, each bounded by the attempt
    /// timeout. Only connectivity failures are retried.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, coverlink_api::Error>>,
    {
        let retries = self.config.retries;
        let mut last_error = String::new();

        for attempt in 1..=retries {
            let outcome = match timeout(self.config.attempt_timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(coverlink_api::Error::Timeout {
                    timeout_ms: u64::try_from(self.config.attempt_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                }),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(device_id = %self.device_id(), operation, attempt, "device recovered");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_connectivity() => {
                    warn!(
                        device_id = %self.device_id(),
                        operation,
                        attempt,
                        retries,
                        error = %err,
                        "device attempt failed"
                    );
                    last_error = err.to_string();
                    if attempt < retries && !self.config.retry_delay.is_zero() {
                        sleep(self.config.retry_delay).await;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CoreError::RetriesExhausted {
            device_id: self.device_id().to_owned(),
            operation,
            attempts: retries,
            last_error,
        })
    }
}

impl<C: DeviceClient> std::fmt::Debug for StatusCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCache")
            .field("device_id", &self.device_id())
            .field("config", &self.config)
            .field("cached", &self.cached().is_some())
            .finish_non_exhaustive()
    }
}
