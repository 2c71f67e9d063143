//! Sealed chain-head cache.
//!
//! The head's seed is the one secret the device keeps outside the record
//! store, so it goes through the at-rest cipher on every read and write.

use std::sync::Arc;

use beacon_core::ChainHead;
use beacon_crypto::{AtRestCipher, Seed};

use crate::{
    error::BeaconError,
    storage::{PreferenceStore, RecordStore, StoredHead},
};

/// Reads and writes the chain head, sealing the seed at rest.
#[derive(Clone)]
pub struct HeadCache<P> {
    prefs: P,
    cipher: Arc<AtRestCipher>,
}

impl<P: PreferenceStore> HeadCache<P> {
    /// Wrap `prefs`, sealing with `cipher`.
    pub fn new(prefs: P, cipher: Arc<AtRestCipher>) -> Self {
        Self { prefs, cipher }
    }

    /// Cached head, if any.
    ///
    /// # Errors
    ///
    /// - `StoreUnavailable`: the preference store failed
    /// - `CryptoProviderFailure`: the sealed seed did not open
    /// - `InvalidSeedEncoding`: the opened seed is not a seed encoding
    pub fn load(&self) -> Result<Option<ChainHead>, BeaconError> {
        let Some(stored) = self.prefs.most_recent_seed()? else {
            return Ok(None);
        };

        let encoded = self.cipher.decrypt(&stored.sealed_seed)?;
        let seed = Seed::decode(&encoded)?;
        Ok(Some(ChainHead { seed, timestamp: stored.timestamp }))
    }

    /// Overwrite the cached head.
    pub fn store(&self, head: &ChainHead) -> Result<(), BeaconError> {
        let sealed_seed = self.cipher.encrypt(&head.seed.encode())?;
        self.prefs.set_most_recent_seed(&StoredHead { timestamp: head.timestamp, sealed_seed })?;
        Ok(())
    }
}

/// Whether `records` still holds the record `head` was taken from.
///
/// A head without its record is what an interrupted report leaves behind:
/// the chain it points into has been wiped.
pub(crate) fn is_backed<R>(head: &ChainHead, records: &R) -> Result<bool, BeaconError>
where
    R: RecordStore,
{
    Ok(records.record_at(head.timestamp)?.is_some_and(|record| record.seed == head.seed))
}

#[cfg(test)]
mod tests {
    use beacon_core::ChainRecord;
    use beacon_crypto::MemoryKeyStore;

    use super::*;
    use crate::storage::MemoryStore;

    fn cache(store: &MemoryStore) -> HeadCache<MemoryStore> {
        let cipher = AtRestCipher::select(MemoryKeyStore::with_symmetric_support());
        cipher.init().unwrap();
        HeadCache::new(store.clone(), Arc::new(cipher))
    }

    #[test]
    fn empty_cache_loads_none() {
        assert_eq!(cache(&MemoryStore::new()).load().unwrap(), None);
    }

    #[test]
    fn head_roundtrips_sealed() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let head = ChainHead { seed: Seed::from_bytes([6; 16]), timestamp: 900_000 };

        cache.store(&head).unwrap();
        assert_eq!(cache.load().unwrap(), Some(head.clone()));

        let raw = store.most_recent_seed().unwrap().unwrap();
        assert_ne!(raw.sealed_seed, head.seed.encode());
    }

    #[test]
    fn foreign_key_cannot_open_head() {
        let store = MemoryStore::new();
        cache(&store)
            .store(&ChainHead { seed: Seed::from_bytes([6; 16]), timestamp: 1 })
            .unwrap();

        let other = cache(&store);
        assert!(matches!(other.load(), Err(BeaconError::CryptoProviderFailure(_))));
    }

    #[test]
    fn head_is_backed_only_by_its_own_record() {
        let store = MemoryStore::new();
        let record = ChainRecord::pending(900_000, Seed::from_bytes([6; 16]));
        let head = record.head();
        assert!(!is_backed(&head, &store).unwrap());

        store.insert(&ChainRecord::pending(900_000, Seed::from_bytes([7; 16]))).unwrap();
        assert!(!is_backed(&head, &store).unwrap());

        store.delete_all().unwrap();
        store.insert(&record).unwrap();
        assert!(is_backed(&head, &store).unwrap());
    }
}
