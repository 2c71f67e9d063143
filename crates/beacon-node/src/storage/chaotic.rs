//! Chaotic storage wrapper for fault injection testing
//!
//! Wraps any store and randomly fails operations before they reach it. Used to
//! check that a failed rotation is skipped cleanly and that a failed report
//! leaves nothing half-applied.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use beacon_core::ChainRecord;

use super::{PreferenceStore, RecordStore, StorageError, StoredHead};

/// Chaotic storage wrapper that randomly injects failures
///
/// A failed operation never reaches the inner store, so every operation is
/// either fully applied or not at all. The failure rate can be changed while
/// the wrapper is shared, which lets a test stop the chaos and then check that
/// a retry heals the store.
#[derive(Clone)]
pub struct ChaoticStore<S> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: Arc<Mutex<f64>>,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Operation counter
    operation_count: Arc<Mutex<usize>>,
}

/// Simple deterministic RNG for chaos injection
///
/// Linear congruential generator, so chaos tests are reproducible with the
/// same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S> ChaoticStore<S> {
    /// Create a new chaotic wrapper with the default RNG seed
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert_rate(failure_rate);
        Self {
            inner,
            failure_rate: Arc::new(Mutex::new(failure_rate)),
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Change the failure rate for every clone of this wrapper.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn set_failure_rate(&self, failure_rate: f64) {
        assert_rate(failure_rate);
        #[allow(clippy::expect_used)]
        let mut rate = self.failure_rate.lock().expect("failure_rate mutex poisoned");
        *rate = failure_rate;
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    /// Count the operation and decide whether it fails.
    fn roll(&self, operation: &'static str) -> Result<(), StorageError> {
        #[allow(clippy::expect_used)]
        {
            *self.operation_count.lock().expect("operation_count mutex poisoned") += 1;
            let rate = *self.failure_rate.lock().expect("failure_rate mutex poisoned");
            if self.rng.lock().expect("ChaoticRng mutex poisoned").next() < rate {
                return Err(StorageError::Io(format!("chaotic failure injection in {operation}")));
            }
        }
        Ok(())
    }
}

#[allow(clippy::panic)]
fn assert_rate(failure_rate: f64) {
    assert!(
        (0.0..=1.0).contains(&failure_rate),
        "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
    );
}

impl<S: RecordStore> RecordStore for ChaoticStore<S> {
    fn all_sorted_records(&self) -> Result<Vec<ChainRecord>, StorageError> {
        self.roll("all_sorted_records")?;
        self.inner.all_sorted_records()
    }

    fn insert(&self, record: &ChainRecord) -> Result<(), StorageError> {
        self.roll("insert")?;
        self.inner.insert(record)
    }

    fn insert_batch(&self, records: &[ChainRecord]) -> Result<(), StorageError> {
        self.roll("insert_batch")?;
        self.inner.insert_batch(records)
    }

    fn update_identifier(&self, record: &ChainRecord) -> Result<(), StorageError> {
        self.roll("update_identifier")?;
        self.inner.update_identifier(record)
    }

    fn delete_all(&self) -> Result<usize, StorageError> {
        self.roll("delete_all")?;
        self.inner.delete_all()
    }

    fn record_at(&self, timestamp: u64) -> Result<Option<ChainRecord>, StorageError> {
        self.roll("record_at")?;
        self.inner.record_at(timestamp)
    }

    fn latest_pending(&self) -> Result<Option<ChainRecord>, StorageError> {
        self.roll("latest_pending")?;
        self.inner.latest_pending()
    }
}

impl<S: PreferenceStore> PreferenceStore for ChaoticStore<S> {
    fn most_recent_seed(&self) -> Result<Option<StoredHead>, StorageError> {
        self.roll("most_recent_seed")?;
        self.inner.most_recent_seed()
    }

    fn set_most_recent_seed(&self, head: &StoredHead) -> Result<(), StorageError> {
        self.roll("set_most_recent_seed")?;
        self.inner.set_most_recent_seed(head)
    }
}

#[cfg(test)]
mod tests {
    use beacon_crypto::Seed;

    use super::*;
    use crate::storage::MemoryStore;

    fn record(timestamp: u64) -> ChainRecord {
        ChainRecord::pending(timestamp, Seed::from_bytes([1; 16]))
    }

    #[test]
    fn zero_rate_never_fails() {
        let store = ChaoticStore::new(MemoryStore::new(), 0.0);
        for i in 0..100 {
            store.insert(&record(i)).unwrap();
        }

        assert_eq!(store.inner().record_count(), 100);
        assert_eq!(store.operation_count(), 100);
    }

    #[test]
    fn full_rate_always_fails_without_side_effects() {
        let store = ChaoticStore::new(MemoryStore::new(), 1.0);
        for i in 0..20 {
            assert!(matches!(store.insert(&record(i)), Err(StorageError::Io(_))));
        }

        assert_eq!(store.inner().record_count(), 0);
    }

    #[test]
    fn same_seed_same_failures() {
        let run = |seed| {
            let store = ChaoticStore::with_seed(MemoryStore::new(), 0.5, seed);
            (0..50).map(|i| store.insert(&record(i)).is_ok()).collect::<Vec<_>>()
        };

        assert_eq!(run(7), run(7));
    }

    #[test]
    fn rate_change_is_shared_across_clones() {
        let store = ChaoticStore::new(MemoryStore::new(), 1.0);
        let clone = store.clone();
        clone.set_failure_rate(0.0);

        store.insert(&record(1)).unwrap();
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between")]
    fn rejects_out_of_range_rate() {
        let _ = ChaoticStore::new(MemoryStore::new(), 1.5);
    }
}
