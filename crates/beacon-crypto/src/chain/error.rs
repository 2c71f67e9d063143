//! Error types for seed chain operations

use thiserror::Error;

/// Errors from seed chain derivation and decoding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Seed is not exactly [`crate::SEED_LEN`] bytes.
    ///
    /// Seeds are 16 bytes by construction, so this is a programmer error.
    #[error("invalid seed length: expected {expected}, got {actual}")]
    InvalidSeedLength {
        /// Required seed length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// A string-encoded seed could not be decoded
    #[error("invalid seed encoding: {reason}")]
    InvalidSeedEncoding {
        /// Parser diagnostic
        reason: String,
    },

    /// A string-encoded identifier could not be decoded
    #[error("invalid identifier encoding: {reason}")]
    InvalidIdentifierEncoding {
        /// Parser diagnostic
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ChainError::InvalidSeedLength { expected: 16, actual: 15 };
        assert_eq!(err.to_string(), "invalid seed length: expected 16, got 15");
    }
}
