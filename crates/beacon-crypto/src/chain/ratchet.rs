//! SHA-256 seed ratchet
//!
//! # Security Properties
//!
//! - One-wayness: an identifier cannot be inverted to its seed
//! - Forward chaining: a seed yields every later link, never an earlier one
//! - Determinism: same seed always produces the same chain

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::{
    error::ChainError,
    seed::{IDENTIFIER_LEN, Identifier, SEED_LEN, Seed},
};

/// One ratchet step: the seed that continues the chain and the identifier
/// published for that step. Both halves come from the same digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainLink {
    /// First half of the digest
    pub seed: Seed,
    /// Second half of the digest
    pub identifier: Identifier,
}

impl Seed {
    /// Advance the chain by one step from this seed.
    pub fn next_link(&self) -> ChainLink {
        split_digest(self.as_bytes())
    }
}

/// Derive the next seed and identifier from `seed`.
///
/// Computes `H = SHA-256(seed)`; the next seed is `H[0..16]` and the
/// identifier is `H[16..32]`.
///
/// # Errors
///
/// - `InvalidSeedLength`: `seed` is not exactly 16 bytes
pub fn derive_next(seed: &[u8]) -> Result<ChainLink, ChainError> {
    let seed = Seed::from_slice(seed)?;
    Ok(seed.next_link())
}

/// Derive `count` consecutive links starting from `seed`.
///
/// Link `i` equals [`derive_next`] applied `i + 1` times to `seed`.
///
/// # Errors
///
/// - `InvalidSeedLength`: `seed` is not exactly 16 bytes, even when `count`
///   is zero
pub fn derive_chain(seed: &[u8], count: usize) -> Result<Vec<ChainLink>, ChainError> {
    let mut current = Seed::from_slice(seed)?;
    let mut links = Vec::with_capacity(count);

    for _ in 0..count {
        let link = current.next_link();
        current = link.seed.clone();
        links.push(link);
    }

    Ok(links)
}

/// Identifiers of the first `count` links after a string-encoded seed.
pub fn identifiers_from_seed(encoded: &str, count: usize) -> Result<Vec<Identifier>, ChainError> {
    let seed = Seed::decode(encoded)?;
    let links = derive_chain(seed.as_bytes(), count)?;
    Ok(links.into_iter().map(|link| link.identifier).collect())
}

fn split_digest(seed: &[u8; SEED_LEN]) -> ChainLink {
    let mut digest: [u8; 32] = Sha256::digest(seed).into();

    let mut next_seed = [0u8; SEED_LEN];
    next_seed.copy_from_slice(&digest[..SEED_LEN]);

    let mut identifier = [0u8; IDENTIFIER_LEN];
    identifier.copy_from_slice(&digest[SEED_LEN..]);

    digest.zeroize();

    let link = ChainLink {
        seed: Seed::from_bytes(next_seed),
        identifier: Identifier::from_bytes(identifier),
    };
    next_seed.zeroize();
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_seed() -> [u8; SEED_LEN] {
        let mut seed = [0u8; SEED_LEN];
        for (i, byte) in seed.iter_mut().enumerate() {
            *byte = i as u8;
        }
        seed
    }

    #[test]
    fn derive_next_is_deterministic() {
        let first = derive_next(&test_seed()).unwrap();
        let second = derive_next(&test_seed()).unwrap();
        assert_eq!(first, second, "same seed must produce same link");
    }

    #[test]
    fn derive_next_rejects_short_seed() {
        let result = derive_next(&[0u8; 8]);
        assert_eq!(result, Err(ChainError::InvalidSeedLength { expected: 16, actual: 8 }));
    }

    #[test]
    fn derive_next_rejects_empty_seed() {
        assert!(derive_next(&[]).is_err());
    }

    #[test]
    fn derive_chain_rejects_bad_seed_even_for_zero_count() {
        assert!(derive_chain(&[1, 2, 3], 0).is_err());
    }

    #[test]
    fn derive_chain_zero_count_is_empty() {
        assert!(derive_chain(&test_seed(), 0).unwrap().is_empty());
    }

    #[test]
    fn derive_chain_matches_repeated_derive_next() {
        let chain = derive_chain(&test_seed(), 8).unwrap();

        let mut current = test_seed().to_vec();
        for link in &chain {
            let expected = derive_next(&current).unwrap();
            assert_eq!(link, &expected);
            current = expected.seed.as_bytes().to_vec();
        }
    }

    #[test]
    fn seed_and_identifier_halves_differ() {
        let link = derive_next(&test_seed()).unwrap();
        assert_ne!(link.seed.as_bytes(), link.identifier.as_bytes());
    }

    #[test]
    fn identifiers_from_seed_matches_chain() {
        let seed = Seed::from_bytes(test_seed());
        let ids = identifiers_from_seed(&seed.encode(), 5).unwrap();
        let chain = derive_chain(seed.as_bytes(), 5).unwrap();

        assert_eq!(ids.len(), 5);
        for (id, link) in ids.iter().zip(&chain) {
            assert_eq!(id, &link.identifier);
        }
    }

    #[test]
    fn identifiers_from_seed_rejects_bad_encoding() {
        assert!(matches!(
            identifiers_from_seed("zz", 3),
            Err(ChainError::InvalidSeedEncoding { .. })
        ));
    }
}
