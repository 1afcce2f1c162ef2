// ── Cache entry ──
//
// The single mutable slot behind a device's status cache. Only touched
// while the device lock is held.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use coverlink_api::StateSnapshot;
use tokio::time::Instant;

/// Last successful snapshot and when it was fetched.
///
/// `snapshot` is `None` exactly when no fetch has succeeded yet or a
/// write has just invalidated the entry.
#[derive(Debug, Default)]
pub(crate) struct CacheEntry {
    snapshot: Option<Arc<StateSnapshot>>,
    fetched_at: Option<Instant>,
    fetched_at_utc: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The stored snapshot if it is no older than `staleness` at `now`.
    pub(crate) fn fresh(&self, staleness: Duration, now: Instant) -> Option<Arc<StateSnapshot>> {
        let snapshot = self.snapshot.as_ref()?;
        let fetched_at = self.fetched_at?;
        (now.saturating_duration_since(fetched_at) <= staleness).then(|| Arc::clone(snapshot))
    }

    /// Replace the snapshot wholesale.
    pub(crate) fn store(&mut self, snapshot: Arc<StateSnapshot>, now: Instant) {
        self.snapshot = Some(snapshot);
        self.fetched_at = Some(now);
        self.fetched_at_utc = Some(Utc::now());
    }

    pub(crate) fn invalidate(&mut self) {
        self.snapshot = None;
        self.fetched_at = None;
    }

    /// Whatever is stored, fresh or not.
    pub(crate) fn snapshot(&self) -> Option<Arc<StateSnapshot>> {
        self.snapshot.clone()
    }

    pub(crate) fn fetched_at_utc(&self) -> Option<DateTime<Utc>> {
        self.fetched_at_utc
    }
}
