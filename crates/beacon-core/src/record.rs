//! Chain records and the cached chain head.

use beacon_crypto::{ChainLink, Identifier, Seed};

/// One persisted step of the seed chain.
///
/// A record is *pending* while its identifier is absent. The scheduler fills
/// the identifier in on the rotation after the record was created, and it is
/// never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRecord {
    /// Boundary-aligned instant, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Secret seed for this step.
    pub seed: Seed,
    /// Disclosable identifier, absent until the following rotation.
    pub identifier: Option<Identifier>,
}

impl ChainRecord {
    /// Record whose identifier has not been computed yet.
    pub fn pending(timestamp: u64, seed: Seed) -> Self {
        Self { timestamp, seed, identifier: None }
    }

    /// Record built from a full chain link, as regeneration produces.
    pub fn from_link(timestamp: u64, link: ChainLink) -> Self {
        Self { timestamp, seed: link.seed, identifier: Some(link.identifier) }
    }

    /// Whether the identifier is still absent.
    pub fn is_pending(&self) -> bool {
        self.identifier.is_none()
    }

    /// Head pointing at this record.
    pub fn head(&self) -> ChainHead {
        ChainHead { seed: self.seed.clone(), timestamp: self.timestamp }
    }
}

/// Cached (seed, timestamp) of the newest record.
///
/// Rotation advances from this rather than scanning the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    /// Seed of the newest record.
    pub seed: Seed,
    /// Timestamp of the newest record.
    pub timestamp: u64,
}
