#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use beacon_core::ChainRecord;

use super::{PreferenceStore, RecordStore, StorageError, StoredHead};

/// In-memory storage implementation for testing and simulation
///
/// Records live in a `BTreeMap` keyed by timestamp, so iteration is already
/// sorted. All state is wrapped in Arc<Mutex<>> to allow Clone and concurrent
/// access. Uses `lock().expect()`, which panics if the mutex is poisoned;
/// acceptable for test code.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    records: BTreeMap<u64, ChainRecord>,
    head: Option<StoredHead>,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn record_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").records.len()
    }
}

impl RecordStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn all_sorted_records(&self) -> Result<Vec<ChainRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.records.values().cloned().collect())
    }

    #[allow(clippy::expect_used)]
    fn insert(&self, record: &ChainRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if inner.records.contains_key(&record.timestamp) {
            return Err(StorageError::Conflict {
                timestamp: record.timestamp,
                reason: "record already exists",
            });
        }
        inner.records.insert(record.timestamp, record.clone());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn insert_batch(&self, records: &[ChainRecord]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        // Validate everything before touching the map
        let mut seen = std::collections::BTreeSet::new();
        for record in records {
            if inner.records.contains_key(&record.timestamp) || !seen.insert(record.timestamp) {
                return Err(StorageError::Conflict {
                    timestamp: record.timestamp,
                    reason: "record already exists",
                });
            }
        }

        for record in records {
            inner.records.insert(record.timestamp, record.clone());
        }
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn update_identifier(&self, record: &ChainRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let stored = inner
            .records
            .get_mut(&record.timestamp)
            .ok_or(StorageError::NotFound { timestamp: record.timestamp })?;

        if stored.identifier.is_some() {
            return Err(StorageError::Conflict {
                timestamp: record.timestamp,
                reason: "identifier already set",
            });
        }
        stored.identifier = record.identifier;
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn delete_all(&self) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let removed = inner.records.len();
        inner.records.clear();
        Ok(removed)
    }

    #[allow(clippy::expect_used)]
    fn record_at(&self, timestamp: u64) -> Result<Option<ChainRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.records.get(&timestamp).cloned())
    }

    #[allow(clippy::expect_used)]
    fn latest_pending(&self) -> Result<Option<ChainRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.records.values().rev().find(|r| r.is_pending()).cloned())
    }
}

impl PreferenceStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn most_recent_seed(&self) -> Result<Option<StoredHead>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").head.clone())
    }

    #[allow(clippy::expect_used)]
    fn set_most_recent_seed(&self, head: &StoredHead) -> Result<(), StorageError> {
        self.inner.lock().expect("Mutex poisoned").head = Some(head.clone());
        Ok(())
    }
}
