//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Records
//! and the sealed chain head survive restarts.

use std::{path::Path, sync::Arc};

use beacon_core::ChainRecord;
use redb::{Database, ReadableTable, TableDefinition};

use super::{PreferenceStore, RecordStore, StorageError, StoredHead, StoredRecord};

/// Table: chain_records
/// Key: record timestamp in milliseconds
/// Value: CBOR-encoded StoredRecord
const CHAIN_RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("chain_records");

/// Table: preferences
/// Key: preference name
/// Value: CBOR-encoded preference value
const PREFERENCES: TableDefinition<&str, &[u8]> = TableDefinition::new("preferences");

/// Preference key of the sealed chain head.
const MOST_RECENT_SEED: &str = "most_recent_seed";

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (CHAIN_RECORDS, PREFERENCES).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(CHAIN_RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(PREFERENCES).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

}

impl RecordStore for RedbStore {
    fn all_sorted_records(&self) -> Result<Vec<ChainRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(CHAIN_RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut records = Vec::new();
        for entry in table.iter().map_err(|e| StorageError::Io(e.to_string()))? {
            let (_, value) = entry.map_err(|e| StorageError::Io(e.to_string()))?;
            records.push(decode_record(value.value())?);
        }

        Ok(records)
    }

    fn insert(&self, record: &ChainRecord) -> Result<(), StorageError> {
        self.insert_batch(std::slice::from_ref(record))
    }

    fn insert_batch(&self, records: &[ChainRecord]) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(CHAIN_RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

            for record in records {
                let bytes = encode_record(record)?;
                let previous = table
                    .insert(record.timestamp, bytes.as_slice())
                    .map_err(|e| StorageError::Io(e.to_string()))?;

                // Returning before commit drops the transaction, which aborts
                // every insert made so far.
                if previous.is_some() {
                    return Err(StorageError::Conflict {
                        timestamp: record.timestamp,
                        reason: "record already exists",
                    });
                }
            }
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn update_identifier(&self, record: &ChainRecord) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(CHAIN_RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

            let mut stored = {
                let value = table
                    .get(record.timestamp)
                    .map_err(|e| StorageError::Io(e.to_string()))?
                    .ok_or(StorageError::NotFound { timestamp: record.timestamp })?;
                decode_record(value.value())?
            };

            if stored.identifier.is_some() {
                return Err(StorageError::Conflict {
                    timestamp: record.timestamp,
                    reason: "identifier already set",
                });
            }
            stored.identifier = record.identifier;

            let bytes = encode_record(&stored)?;
            table
                .insert(record.timestamp, bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn delete_all(&self) -> Result<usize, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        let removed;
        {
            let mut table =
                txn.open_table(CHAIN_RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

            let mut keys = Vec::new();
            for entry in table.iter().map_err(|e| StorageError::Io(e.to_string()))? {
                let (key, _) = entry.map_err(|e| StorageError::Io(e.to_string()))?;
                keys.push(key.value());
            }

            for key in &keys {
                table.remove(*key).map_err(|e| StorageError::Io(e.to_string()))?;
            }
            removed = keys.len();
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(removed)
    }

    fn record_at(&self, timestamp: u64) -> Result<Option<ChainRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(CHAIN_RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

        match table.get(timestamp).map_err(|e| StorageError::Io(e.to_string()))? {
            Some(value) => Ok(Some(decode_record(value.value())?)),
            None => Ok(None),
        }
    }

    fn latest_pending(&self) -> Result<Option<ChainRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(CHAIN_RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

        for entry in table.iter().map_err(|e| StorageError::Io(e.to_string()))?.rev() {
            let (_, value) = entry.map_err(|e| StorageError::Io(e.to_string()))?;
            let record = decode_record(value.value())?;
            if record.is_pending() {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }
}

impl PreferenceStore for RedbStore {
    fn most_recent_seed(&self) -> Result<Option<StoredHead>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(PREFERENCES).map_err(|e| StorageError::Io(e.to_string()))?;

        let Some(value) =
            table.get(MOST_RECENT_SEED).map_err(|e| StorageError::Io(e.to_string()))?
        else {
            return Ok(None);
        };

        let head: StoredHead = ciborium::from_reader(value.value())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Some(head))
    }

    fn set_most_recent_seed(&self, head: &StoredHead) -> Result<(), StorageError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(head, &mut bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(PREFERENCES).map_err(|e| StorageError::Io(e.to_string()))?;
            table
                .insert(MOST_RECENT_SEED, bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }
}

fn encode_record(record: &ChainRecord) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::with_capacity(96);
    ciborium::into_writer(&StoredRecord::from(record), &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode_record(bytes: &[u8]) -> Result<ChainRecord, StorageError> {
    let stored: StoredRecord =
        ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
    ChainRecord::try_from(stored)
}

#[cfg(test)]
mod tests {
    use beacon_crypto::{Seed, derive_chain};
    use tempfile::TempDir;

    use super::*;

    const PERIOD: u64 = 900_000;

    fn window(count: usize) -> Vec<ChainRecord> {
        derive_chain(&[3; 16], count)
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, link)| ChainRecord::from_link((i as u64 + 1) * PERIOD, link))
            .collect()
    }

    #[test]
    fn insert_and_load_sorted() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        let records = window(5);
        for record in records.iter().rev() {
            store.insert(record).unwrap();
        }

        assert_eq!(store.all_sorted_records().unwrap(), records);
    }

    #[test]
    fn failed_batch_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        let records = window(4);
        store.insert(&records[3]).unwrap();

        assert!(matches!(store.insert_batch(&records), Err(StorageError::Conflict { .. })));
        assert_eq!(store.all_sorted_records().unwrap(), vec![records[3].clone()]);
    }

    #[test]
    fn update_fills_pending_once() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        let mut record = ChainRecord::pending(PERIOD, Seed::from_bytes([8; 16]));
        store.insert(&record).unwrap();
        assert_eq!(store.latest_pending().unwrap(), Some(record.clone()));

        record.identifier = window(1)[0].identifier;
        store.update_identifier(&record).unwrap();
        assert_eq!(store.latest_pending().unwrap(), None);
        assert_eq!(store.all_sorted_records().unwrap(), vec![record.clone()]);

        assert!(matches!(store.update_identifier(&record), Err(StorageError::Conflict { .. })));
    }

    #[test]
    fn record_at_and_delete_all() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();
        let records = window(6);
        store.insert_batch(&records).unwrap();

        assert_eq!(store.record_at(4 * PERIOD).unwrap(), Some(records[3].clone()));
        assert_eq!(store.record_at(4 * PERIOD + 1).unwrap(), None);

        assert_eq!(store.delete_all().unwrap(), 6);
        assert!(store.all_sorted_records().unwrap().is_empty());
        assert_eq!(store.record_at(4 * PERIOD).unwrap(), None);
    }

    #[test]
    fn records_and_head_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.redb");
        let records = window(8);
        let head = StoredHead { timestamp: 8 * PERIOD, sealed_seed: "sealed".to_string() };

        {
            let store = RedbStore::open(&path).unwrap();
            store.insert_batch(&records).unwrap();
            store.set_most_recent_seed(&head).unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.all_sorted_records().unwrap(), records);
        assert_eq!(store.most_recent_seed().unwrap(), Some(head));
    }
}
