//! Seed and identifier value types

use std::{fmt, str::FromStr};

use uuid::Uuid;
use zeroize::Zeroize;

use super::error::ChainError;

/// Length of a chain seed in bytes.
pub const SEED_LEN: usize = 16;

/// Length of a broadcast identifier in bytes.
pub const IDENTIFIER_LEN: usize = 16;

/// Secret 16-byte value that advances the hash chain.
///
/// Never disclosed. The string encoding produced by [`Seed::encode`] is the
/// hyphenated UUID rendering of the raw bytes, which is how seeds are
/// persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Wrap raw seed bytes.
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy a seed out of a slice, rejecting anything that is not 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ChainError> {
        let array: [u8; SEED_LEN] = bytes.try_into().map_err(|_| {
            ChainError::InvalidSeedLength { expected: SEED_LEN, actual: bytes.len() }
        })?;
        Ok(Self(array))
    }

    /// Raw seed bytes.
    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }

    /// String encoding used for persistence.
    pub fn encode(&self) -> String {
        Uuid::from_bytes(self.0).hyphenated().to_string()
    }

    /// Parse the string encoding produced by [`Seed::encode`].
    pub fn decode(encoded: &str) -> Result<Self, ChainError> {
        let uuid = Uuid::parse_str(encoded)
            .map_err(|e| ChainError::InvalidSeedEncoding { reason: e.to_string() })?;
        Ok(Self(uuid.into_bytes()))
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

impl Drop for Seed {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// 16-byte identifier derived from a seed. Safe to broadcast and disclose.
///
/// Displays and parses as a UUID string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier([u8; IDENTIFIER_LEN]);

impl Identifier {
    /// Wrap raw identifier bytes.
    pub fn from_bytes(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LEN] {
        &self.0
    }

    /// Identifier as a UUID.
    pub fn to_uuid(self) -> Uuid {
        Uuid::from_bytes(self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_uuid().hyphenated(), f)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({self})")
    }
}

impl FromStr for Identifier {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s)
            .map_err(|e| ChainError::InvalidIdentifierEncoding { reason: e.to_string() })?;
        Ok(Self(uuid.into_bytes()))
    }
}
