//! Fuzz target for record stores under injected failures
//!
//! Drives a `ChaoticStore<MemoryStore>` with arbitrary operations and mirrors
//! every successful one in a plain model.
//!
//! # Strategy
//!
//! - Variable failure rates (0% to 90%)
//! - Inserts, batches and identifier fills that may collide
//! - Point lookups and wipes interleaved with writes
//!
//! # Invariants
//!
//! - Storage errors propagate as Result::Err, NEVER panics
//! - A failed operation leaves the inner store untouched
//! - Records always come back sorted with one record per timestamp
//! - At most the model's pending records are pending in the store

#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use beacon_core::ChainRecord;
use beacon_crypto::{Seed, derive_next};
use beacon_node::{ChaoticStore, MemoryStore, RecordStore};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct ChaosScenario {
    /// Seed for ChaoticStore RNG (deterministic failures)
    chaos_seed: u64,
    /// Failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    /// Sequence of operations to perform
    operations: Vec<ChaosOperation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum ChaosOperation {
    /// Insert one pending record
    Insert { slot: u8 },
    /// Insert a run of pending records
    InsertBatch { start: u8, len: u8 },
    /// Fill the identifier of one record
    Fill { slot: u8 },
    /// Look up the record at one slot
    RecordAt { slot: u8 },
    /// Wipe everything
    DeleteAll,
}

fn timestamp(slot: u8) -> u64 {
    u64::from(slot) * 900_000
}

fn pending(slot: u8) -> ChainRecord {
    ChainRecord::pending(timestamp(slot), Seed::from_bytes([slot; 16]))
}

fuzz_target!(|scenario: ChaosScenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;
    let store = ChaoticStore::with_seed(MemoryStore::new(), failure_rate, scenario.chaos_seed);
    let mut model: BTreeMap<u64, ChainRecord> = BTreeMap::new();

    for operation in scenario.operations.iter().take(256) {
        match operation {
            ChaosOperation::Insert { slot } => {
                let record = pending(*slot);
                if store.insert(&record).is_ok() {
                    assert!(model.insert(record.timestamp, record).is_none());
                }
            },
            ChaosOperation::InsertBatch { start, len } => {
                let batch: Vec<_> = (0..*len % 16).map(|i| pending(start.wrapping_add(i))).collect();
                if store.insert_batch(&batch).is_ok() {
                    for record in batch {
                        assert!(model.insert(record.timestamp, record).is_none());
                    }
                }
            },
            ChaosOperation::Fill { slot } => {
                let link = derive_next(&[*slot; 16]).expect("16-byte seed must ratchet");
                let filled = ChainRecord {
                    timestamp: timestamp(*slot),
                    seed: Seed::from_bytes([*slot; 16]),
                    identifier: Some(link.identifier),
                };
                if store.update_identifier(&filled).is_ok() {
                    let entry = model.get_mut(&filled.timestamp).expect("filled record must exist");
                    assert!(entry.identifier.is_none());
                    entry.identifier = filled.identifier;
                }
            },
            ChaosOperation::RecordAt { slot } => {
                if let Ok(found) = store.record_at(timestamp(*slot)) {
                    assert_eq!(found.as_ref(), model.get(&timestamp(*slot)));
                }
            },
            ChaosOperation::DeleteAll => {
                if let Ok(removed) = store.delete_all() {
                    assert_eq!(removed, model.len());
                    model.clear();
                }
            },
        }

        let actual = store.inner().all_sorted_records().expect("inner store never fails");
        let expected: Vec<_> = model.values().cloned().collect();
        assert_eq!(actual, expected);
    }
});
