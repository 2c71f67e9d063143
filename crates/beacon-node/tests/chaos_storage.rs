//! Chaos tests for rotation and regeneration
//!
//! `ChaoticStore` fails operations at random before they reach the inner
//! store. These tests check that:
//! - a failed report leaves rotation stopped and nothing half-applied that a
//!   retry cannot clean up
//! - retried reports converge to exactly one complete window
//! - failed ticks are skipped without forking the ratchet
//! - a report that wiped the chain but never rebuilt it is not resumed

mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use beacon_core::{
    ChainRecord, check_chain,
    invariants::{check_pending, check_ratchet},
};
use beacon_crypto::{Seed, derive_next};
use beacon_node::{
    BeaconError, Bootstrap, ChaoticStore, MemoryStore, RecordStore, SchedulerState, StorageError,
};
use common::{PERIOD_MS, SimEnv, day_config, manager};
use proptest::prelude::*;

#[tokio::test(start_paused = true)]
async fn failed_report_leaves_rotation_stopped() {
    let env = SimEnv::new(41);
    let store = ChaoticStore::new(MemoryStore::new(), 0.0);
    let mut manager = manager(day_config(), &env, store.clone(), store.clone());
    manager.bootstrap().unwrap();

    manager.start_rotation();
    env.sleep_past_boundaries(3, PERIOD_MS).await;

    store.set_failure_rate(1.0);
    let err = manager.trigger_report().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(!err.is_fatal());
    assert_eq!(manager.rotation_state(), SchedulerState::Idle);

    // No worker is left to touch the store
    let before = store.inner().all_sorted_records().unwrap();
    env.sleep_past_boundaries(5, PERIOD_MS).await;
    assert_eq!(store.inner().all_sorted_records().unwrap(), before);

    store.set_failure_rate(0.0);
    let chain = manager.trigger_report().await.unwrap();
    manager.shutdown().await;

    let records = store.inner().all_sorted_records().unwrap();
    assert_eq!(records.len(), 96);
    assert_eq!(chain.records, 96);
    check_chain(&records, PERIOD_MS).unwrap();
}

#[tokio::test(start_paused = true)]
async fn retried_reports_converge_to_one_window() {
    for seed in 0..8u64 {
        let env = SimEnv::new(seed);
        let store = ChaoticStore::with_seed(MemoryStore::new(), 0.3, seed);
        let mut manager = manager(day_config(), &env, store.clone(), store.clone());

        let mut attempts = 0;
        let chain = loop {
            attempts += 1;
            assert!(attempts <= 200, "seed {seed}: report never succeeded");

            match manager.trigger_report().await {
                Ok(chain) => break chain,
                Err(e) => {
                    assert!(e.is_retryable(), "seed {seed}: unexpected error {e}");
                    assert_eq!(manager.rotation_state(), SchedulerState::Idle);
                },
            }
        };
        manager.shutdown().await;
        store.set_failure_rate(0.0);

        let records = store.inner().all_sorted_records().unwrap();
        assert_eq!(records.len(), 96, "seed {seed}");
        check_chain(&records, PERIOD_MS).unwrap();
        assert_eq!(records.last().unwrap().timestamp, chain.head_timestamp);
        assert_eq!(manager.head().unwrap(), Some(records[95].head()));
    }
}

#[tokio::test(start_paused = true)]
async fn failed_ticks_never_fork_the_ratchet() {
    let env = SimEnv::new(43);
    let store = ChaoticStore::with_seed(MemoryStore::new(), 0.0, 43);
    let mut manager = manager(day_config(), &env, store.clone(), store.clone());
    manager.bootstrap().unwrap();

    store.set_failure_rate(0.25);
    manager.start_rotation();
    env.sleep_past_boundaries(200, PERIOD_MS).await;
    manager.shutdown().await;
    store.set_failure_rate(0.0);

    let records = store.inner().all_sorted_records().unwrap();
    assert!(records.len() > 1, "some ticks should have succeeded");
    check_pending(&records).unwrap();
    check_ratchet(&records).unwrap();

    for pair in records.windows(2) {
        assert!(pair[1].timestamp > pair[0].timestamp);
        assert_eq!(pair[1].timestamp % PERIOD_MS, 0);
    }

    // Every filled-in tick identifier comes from that record's own seed
    for record in records.iter().filter(|r| !r.is_pending()) {
        let link = derive_next(record.seed.as_bytes()).unwrap();
        assert_eq!(record.identifier, Some(link.identifier));
    }

    // A final tick may have stopped short of moving the head; it is then
    // exactly one step behind and the next tick repairs it
    let head = manager.head().unwrap().unwrap();
    let last = records.last().unwrap();
    if head.timestamp == last.timestamp {
        assert_eq!(head, last.head());
    } else {
        assert!(last.is_pending());
        assert_eq!(head.seed.next_link().seed, last.seed);
    }
}

/// Memory store whose batch inserts fail while `fail_batches` is set.
///
/// Lets a report get past its wipe and then stop before the new window lands.
#[derive(Clone)]
struct BatchFailingStore {
    inner: MemoryStore,
    fail_batches: Arc<AtomicBool>,
}

impl BatchFailingStore {
    fn new() -> Self {
        Self { inner: MemoryStore::new(), fail_batches: Arc::new(AtomicBool::new(false)) }
    }

    fn set_failing(&self, failing: bool) {
        self.fail_batches.store(failing, Ordering::SeqCst);
    }
}

impl RecordStore for BatchFailingStore {
    fn all_sorted_records(&self) -> Result<Vec<ChainRecord>, StorageError> {
        self.inner.all_sorted_records()
    }

    fn insert(&self, record: &ChainRecord) -> Result<(), StorageError> {
        self.inner.insert(record)
    }

    fn insert_batch(&self, records: &[ChainRecord]) -> Result<(), StorageError> {
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(StorageError::Io("batch insert refused".to_string()));
        }
        self.inner.insert_batch(records)
    }

    fn update_identifier(&self, record: &ChainRecord) -> Result<(), StorageError> {
        self.inner.update_identifier(record)
    }

    fn delete_all(&self) -> Result<usize, StorageError> {
        self.inner.delete_all()
    }

    fn record_at(&self, timestamp: u64) -> Result<Option<ChainRecord>, StorageError> {
        self.inner.record_at(timestamp)
    }
}

#[tokio::test(start_paused = true)]
async fn report_failing_after_wipe_is_never_resumed() {
    let env = SimEnv::new(44);
    let records = BatchFailingStore::new();
    let prefs = MemoryStore::new();
    let mut manager = manager(day_config(), &env, records.clone(), prefs.clone());
    manager.bootstrap().unwrap();

    manager.start_rotation();
    env.sleep_past_boundaries(3, PERIOD_MS).await;
    let stale = manager.head().unwrap().unwrap();

    records.set_failing(true);
    let err = manager.trigger_report().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(records.inner.record_count(), 0);

    // The old head survived the wipe but must not restart the old chain
    assert!(matches!(
        manager.bootstrap(),
        Err(BeaconError::InterruptedReport { head_timestamp: Some(ts) }) if ts == stale.timestamp
    ));

    // Rotation started anyway skips every boundary instead of extending it
    manager.start_rotation();
    env.sleep_past_boundaries(4, PERIOD_MS).await;
    assert_eq!(records.inner.record_count(), 0);
    assert_eq!(manager.head().unwrap(), Some(stale.clone()));

    records.set_failing(false);
    let chain = manager.trigger_report().await.unwrap();
    manager.shutdown().await;

    let window = records.all_sorted_records().unwrap();
    assert_eq!(window.len(), 96);
    check_chain(&window, PERIOD_MS).unwrap();
    assert!(window.iter().all(|r| r.seed != stale.seed));
    assert_eq!(
        manager.bootstrap().unwrap(),
        Bootstrap::Existing { timestamp: chain.head_timestamp }
    );
}

#[tokio::test(start_paused = true)]
async fn unreadable_head_over_wiped_store_is_interrupted() {
    let env = SimEnv::new(45);
    let records = BatchFailingStore::new();
    let prefs = MemoryStore::new();
    let mut first = manager(day_config(), &env, records.clone(), prefs.clone());
    first.bootstrap().unwrap();

    records.set_failing(true);
    first.trigger_report().await.unwrap_err();
    drop(first);

    // Fresh key store: the head no longer opens and there is nothing to rebuild from
    let second = manager(day_config(), &env, records.clone(), prefs.clone());
    assert!(matches!(
        second.bootstrap(),
        Err(BeaconError::InterruptedReport { head_timestamp: None })
    ));
    assert_eq!(records.inner.record_count(), 0);
}

fn batch(start: u64, len: u64) -> Vec<ChainRecord> {
    (start..start + len)
        .map(|i| ChainRecord::pending(i * PERIOD_MS, Seed::from_bytes([i as u8; 16])))
        .collect()
}

#[test]
fn prop_chaos_batches_are_atomic() {
    proptest!(|(failure_rate in 0.0..0.8, seed in any::<u64>(), batches in 1u64..30)| {
        let store = ChaoticStore::with_seed(MemoryStore::new(), failure_rate, seed);
        let mut expected = 0;

        for b in 0..batches {
            if store.insert_batch(&batch(b * 5, 5)).is_ok() {
                expected += 5;
            }
            prop_assert_eq!(store.inner().record_count(), expected);
        }
        prop_assert_eq!(store.operation_count() as u64, batches);
    });
}
