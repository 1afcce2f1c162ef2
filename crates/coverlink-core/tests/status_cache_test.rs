#![allow(clippy::unwrap_used)]
// Behavioural tests for `StatusCache` against the simulated cover device.
// Every test runs on a paused clock, so sleeps and timeouts resolve
// instantly and staleness is driven with `tokio::time::advance`.

use std::sync::Arc;
use std::time::Duration;

use coverlink_api::{DpValue, Fault, SimLayout, SimulatedCover};
use coverlink_core::{CacheConfig, CoreError, ExhaustionPolicy, StatusCache, WriteOutcome};
use pretty_assertions::assert_eq;
use tokio::time::{Instant, advance};

// ── Helpers ─────────────────────────────────────────────────────────

/// Device exposing only data point 3 (position) plus whatever extras the
/// test adds.
fn position_only() -> SimLayout {
    SimLayout {
        command_dp: 0,
        set_position_dp: 0,
        movement_dp: 0,
        ..SimLayout::default()
    }
}

fn config() -> CacheConfig {
    CacheConfig {
        settle_delay: Duration::ZERO,
        ..CacheConfig::default()
    }
}

fn cache_with(dev: SimulatedCover, cfg: CacheConfig) -> Arc<StatusCache<Arc<SimulatedCover>>> {
    Arc::new(StatusCache::new(Arc::new(dev), cfg).unwrap())
}

fn cache(dev: SimulatedCover) -> Arc<StatusCache<Arc<SimulatedCover>>> {
    cache_with(dev, config())
}

// ── Freshness window ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reads_within_window_share_one_fetch() {
    let cache = cache(SimulatedCover::new("d1", position_only()).with_position(42));

    let first = cache.status().await.unwrap();
    advance(Duration::from_secs(5)).await;
    let second = cache.status().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.get(3), Some(&DpValue::Int(42)));
    assert_eq!(first.len(), 1);
    assert_eq!(cache.client().status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn fifteen_second_window_scenario() {
    let cache = cache(SimulatedCover::new("d1", position_only()).with_position(42));

    // t=0 fetches, t=10 is served from cache, t=20 refetches.
    cache.status().await.unwrap();
    assert_eq!(cache.client().status_calls(), 1);

    advance(Duration::from_secs(10)).await;
    cache.status().await.unwrap();
    assert_eq!(cache.client().status_calls(), 1);

    advance(Duration::from_secs(10)).await;
    let snap = cache.status().await.unwrap();
    assert_eq!(cache.client().status_calls(), 2);
    assert_eq!(snap.get(3), Some(&DpValue::Int(42)));
    assert!(cache.last_refresh().is_some());
}

#[tokio::test(start_paused = true)]
async fn refresh_waits_for_settle_delay() {
    let cache = cache_with(
        SimulatedCover::new("d1", position_only()),
        CacheConfig::default(),
    );

    let start = Instant::now();
    cache.status().await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(500));

    // A cache hit does not pay the delay.
    let start = Instant::now();
    cache.status().await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
}

// ── Single flight ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_readers_collapse_into_one_fetch() {
    let cache = cache(
        SimulatedCover::new("d1", position_only())
            .with_position(42)
            .with_latency(Duration::from_millis(200)),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.status().await })
        })
        .collect();

    let mut snapshots = Vec::new();
    for h in handles {
        snapshots.push(h.await.unwrap().unwrap());
    }

    assert_eq!(cache.client().status_calls(), 1);
    assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
}

#[tokio::test(start_paused = true)]
async fn concurrent_readers_after_expiry_refresh_once() {
    let cache = cache(
        SimulatedCover::new("d1", position_only()).with_latency(Duration::from_millis(50)),
    );
    let stale = cache.status().await.unwrap();
    advance(Duration::from_secs(16)).await;

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.status().await })
        })
        .collect();
    for h in handles {
        let snap = h.await.unwrap().unwrap();
        assert!(!Arc::ptr_eq(&snap, &stale));
    }

    assert_eq!(cache.client().status_calls(), 2);
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn write_invalidates_cached_snapshot() {
    let cache = cache(SimulatedCover::new("d1", position_only()).with_dp(20, false));

    let before = cache.status().await.unwrap();
    assert_eq!(before.get(20), Some(&DpValue::Bool(false)));
    assert!(cache.cached().is_some());

    let outcome = cache.set_status(true, 20).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Applied);
    assert!(cache.cached().is_none());

    // Still inside the window, but the write forced a re-read.
    let after = cache.status().await.unwrap();
    assert_eq!(after.get(20), Some(&DpValue::Bool(true)));
    assert_eq!(cache.client().status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_write_still_invalidates() {
    let cache = cache(SimulatedCover::new("d1", position_only()).with_dp(20, false));
    cache.status().await.unwrap();

    cache.client().inject(Fault::Reject, 1);
    let err = cache.set_value(20, DpValue::Bool(true)).await.unwrap_err();
    assert!(matches!(err, CoreError::Rejected { .. }));
    assert!(cache.cached().is_none());

    cache.status().await.unwrap();
    assert_eq!(cache.client().status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_invalidation_and_refresh() {
    let cache = cache(SimulatedCover::new("d1", position_only()).with_dp(20, false));
    let mut rx = cache.subscribe();
    assert!(rx.borrow_and_update().is_none());

    cache.status().await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().is_some());

    cache.invalidate().await;
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().is_none());
}

#[tokio::test(start_paused = true)]
async fn read_and_write_are_serialised() {
    let cache = cache(
        SimulatedCover::new("d1", position_only())
            .with_dp(20, false)
            .with_latency(Duration::from_millis(100)),
    );

    let reader = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.status().await })
    };
    // Let the reader take the device lock before the write queues up.
    tokio::task::yield_now().await;

    cache.set_status(true, 20).await.unwrap();
    let read = reader.await.unwrap().unwrap();
    assert_eq!(read.get(20), Some(&DpValue::Bool(false)));

    let after = cache.status().await.unwrap();
    assert_eq!(after.get(20), Some(&DpValue::Bool(true)));
    assert_eq!(cache.client().status_calls(), 2);
    assert_eq!(cache.client().write_calls(), 1);
}

// ── Retry budget ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn recovers_on_last_permitted_attempt() {
    let cache = cache(SimulatedCover::new("d1", position_only()).with_position(42));
    cache.client().inject(Fault::Unreachable, 2);

    let snap = cache.status().await.unwrap();
    assert_eq!(snap.get(3), Some(&DpValue::Int(42)));
    assert_eq!(cache.client().status_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_read_fails_under_default_policy() {
    let cache = cache(SimulatedCover::new("d1", position_only()));
    cache.client().inject(Fault::Unreachable, 3);

    let err = cache.status().await.unwrap_err();
    match &err {
        CoreError::RetriesExhausted {
            device_id,
            operation,
            attempts,
            ..
        } => {
            assert_eq!(device_id, "d1");
            assert_eq!(*operation, "status");
            assert_eq!(*attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_connectivity());
    assert_eq!(cache.client().status_calls(), 3);
    assert!(cache.cached().is_none());
}

#[tokio::test(start_paused = true)]
async fn exhausted_read_without_history_returns_empty_sentinel() {
    let cache = cache_with(
        SimulatedCover::new("d1", position_only()),
        CacheConfig {
            on_exhaustion: ExhaustionPolicy::ReturnStale,
            ..config()
        },
    );
    cache.client().inject(Fault::Unreachable, 3);

    let snap = cache.status().await.unwrap();
    assert!(snap.is_empty());
    assert_eq!(cache.client().status_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_read_serves_stale_snapshot() {
    let cache = cache_with(
        SimulatedCover::new("d1", position_only()).with_position(42),
        CacheConfig {
            on_exhaustion: ExhaustionPolicy::ReturnStale,
            ..config()
        },
    );
    let first = cache.status().await.unwrap();

    advance(Duration::from_secs(30)).await;
    cache.client().inject(Fault::Unreachable, 3);
    let stale = cache.status().await.unwrap();

    assert!(Arc::ptr_eq(&first, &stale));
    assert_eq!(cache.client().status_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn rejection_is_not_retried() {
    let cache = cache(SimulatedCover::new("d1", position_only()));
    cache.client().inject(Fault::Reject, 1);

    let err = cache.status().await.unwrap_err();
    assert!(matches!(err, CoreError::Rejected { .. }));
    assert_eq!(cache.client().status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_attempt_times_out_and_retries() {
    let cache = cache(SimulatedCover::new("d1", position_only()).with_position(42));
    cache.client().inject(Fault::Hang, 1);

    let start = Instant::now();
    let snap = cache.status().await.unwrap();

    assert_eq!(snap.get(3), Some(&DpValue::Int(42)));
    assert_eq!(cache.client().status_calls(), 2);
    // One attempt timeout plus one retry delay.
    assert!(start.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn write_retries_then_applies() {
    let cache = cache(SimulatedCover::new("d1", position_only()).with_dp(20, false));
    cache.client().inject(Fault::Unreachable, 2);

    let outcome = cache.set_status(true, 20).await.unwrap();
    assert!(outcome.is_applied());
    assert_eq!(cache.client().write_calls(), 3);
    assert_eq!(cache.client().writes(), vec![(20, DpValue::Bool(true))]);
}

#[tokio::test(start_paused = true)]
async fn exhausted_write_fails_or_is_abandoned() {
    let failing = cache(SimulatedCover::new("d1", position_only()).with_dp(20, false));
    failing.client().inject(Fault::Unreachable, 3);
    let err = failing.set_status(true, 20).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::RetriesExhausted {
            operation: "set_status",
            attempts: 3,
            ..
        }
    ));

    let lenient = cache_with(
        SimulatedCover::new("d2", position_only()).with_dp(20, false),
        CacheConfig {
            on_exhaustion: ExhaustionPolicy::ReturnStale,
            ..config()
        },
    );
    lenient.client().inject(Fault::Unreachable, 3);
    let outcome = lenient.set_status(true, 20).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Abandoned);
    assert!(lenient.client().writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_data_point_write_is_not_retried() {
    let cache = cache(SimulatedCover::new("d1", position_only()));

    let err = cache.set_status(true, 99).await.unwrap_err();
    assert!(matches!(err, CoreError::DataPointNotFound { index: 99 }));
    assert_eq!(cache.client().write_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn single_attempt_budget_never_retries() {
    let cache = cache_with(
        SimulatedCover::new("d1", position_only()),
        CacheConfig {
            retries: 1,
            ..config()
        },
    );
    cache.client().inject(Fault::Unreachable, 1);

    let err = cache.status().await.unwrap_err();
    assert!(matches!(err, CoreError::RetriesExhausted { attempts: 1, .. }));
    assert_eq!(cache.client().status_calls(), 1);
}
