//! Storage abstraction for the seed chain
//!
//! Two collaborator traits: [`RecordStore`] holds the chain itself and
//! [`PreferenceStore`] holds the sealed chain head. Both are synchronous (no
//! async) so the rotation worker finishes every write before it moves on,
//! which is what orders a report's wipe after the last rotation.

mod chaotic;
mod error;
mod memory;
mod redb;

use beacon_core::ChainRecord;
use beacon_crypto::{Identifier, Seed};
pub use chaotic::ChaoticStore;
pub use error::StorageError;
pub use memory::MemoryStore;
use serde::{Deserialize, Serialize};

pub use self::redb::RedbStore;

/// Persistent store of chain records.
///
/// Must be Clone (the worker and the manager each hold one), Send + Sync, and
/// synchronous. Implementations share internal state via Arc, so clones
/// access the same underlying records.
///
/// # Invariants
///
/// - Records are keyed by timestamp; a timestamp is never stored twice
/// - An identifier, once set, never changes
pub trait RecordStore: Clone + Send + Sync + 'static {
    /// Every record, ascending by timestamp.
    fn all_sorted_records(&self) -> Result<Vec<ChainRecord>, StorageError>;

    /// Insert a single record.
    ///
    /// Fails with `Conflict` if a record already exists at its timestamp.
    fn insert(&self, record: &ChainRecord) -> Result<(), StorageError>;

    /// Insert records atomically: either all are stored or none are.
    fn insert_batch(&self, records: &[ChainRecord]) -> Result<(), StorageError>;

    /// Fill in the identifier of the stored record at `record.timestamp`.
    ///
    /// Fails with `NotFound` if no record exists there, and with `Conflict`
    /// if that record already carries an identifier.
    fn update_identifier(&self, record: &ChainRecord) -> Result<(), StorageError>;

    /// Delete every record. Returns how many were removed.
    fn delete_all(&self) -> Result<usize, StorageError>;

    /// Record stored at exactly `timestamp`, if any.
    fn record_at(&self, timestamp: u64) -> Result<Option<ChainRecord>, StorageError>;

    /// Newest record whose identifier is still absent.
    fn latest_pending(&self) -> Result<Option<ChainRecord>, StorageError> {
        Ok(self.all_sorted_records()?.into_iter().rev().find(ChainRecord::is_pending))
    }
}

/// Persistent key/value preferences holding the sealed chain head.
///
/// The head's seed is secret, so it is stored sealed by the at-rest cipher;
/// this trait never sees it in the clear.
pub trait PreferenceStore: Clone + Send + Sync + 'static {
    /// Cached head, if one was ever written.
    fn most_recent_seed(&self) -> Result<Option<StoredHead>, StorageError>;

    /// Overwrite the cached head.
    fn set_most_recent_seed(&self, head: &StoredHead) -> Result<(), StorageError>;
}

/// Serialized form of a [`ChainRecord`].
///
/// Seed and identifier use their hyphenated string encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Boundary-aligned timestamp in milliseconds.
    pub timestamp: u64,
    /// String-encoded seed.
    pub seed: String,
    /// String-encoded identifier, absent while pending.
    pub identifier: Option<String>,
}

impl From<&ChainRecord> for StoredRecord {
    fn from(record: &ChainRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            seed: record.seed.encode(),
            identifier: record.identifier.map(|id| id.to_string()),
        }
    }
}

impl TryFrom<StoredRecord> for ChainRecord {
    type Error = StorageError;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let seed = Seed::decode(&stored.seed)?;
        let identifier = stored.identifier.as_deref().map(str::parse::<Identifier>).transpose()?;
        Ok(Self { timestamp: stored.timestamp, seed, identifier })
    }
}

/// Chain head as kept in the [`PreferenceStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHead {
    /// Timestamp of the newest record.
    pub timestamp: u64,
    /// Seed of the newest record, string-encoded then sealed.
    pub sealed_seed: String,
}
