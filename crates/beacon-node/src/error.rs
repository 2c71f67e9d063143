//! Node error types.

use beacon_core::{ConfigError, Violation};
use beacon_crypto::{ChainError, CipherError};
use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by the scheduler, the report handler and the manager.
#[derive(Error, Debug)]
pub enum BeaconError {
    /// A seed was not 16 bytes.
    ///
    /// Seeds are 16 bytes by construction, so this is a programmer error.
    /// Fatal; never recovered.
    #[error("invalid seed length: expected {expected}, got {actual}")]
    InvalidSeedLength {
        /// Required seed length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// A stored or supplied seed string does not decode.
    #[error("invalid seed encoding: {reason}")]
    InvalidSeedEncoding {
        /// Decoder message
        reason: String,
    },

    /// Reading or writing records or preferences failed.
    ///
    /// During rotation the tick is skipped and the next boundary retries.
    /// During a report the whole protocol aborts.
    #[error("store unavailable: {0}")]
    StoreUnavailable(StorageError),

    /// Key generation or a cipher operation failed.
    #[error("crypto provider failure: {0}")]
    CryptoProviderFailure(#[from] CipherError),

    /// Scheduler start/cancel called out of sequence.
    ///
    /// Only raised by callers that opt in through
    /// [`Transition::require_changed`](crate::Transition::require_changed);
    /// the scheduler itself treats misuse as a no-op.
    #[error("scheduler misuse: cannot {operation} while {state}")]
    SchedulerStateMisuse {
        /// Operation that was attempted
        operation: &'static str,
        /// State the scheduler was in
        state: &'static str,
    },

    /// Configuration rejected at startup.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A regenerated window did not read back intact.
    #[error("regenerated chain failed verification: {0}")]
    RegenerationUnverified(#[from] Violation),

    /// The cached head matches no stored record.
    ///
    /// Left behind by an exposure report that wiped the chain but never
    /// pointed the head at the rebuilt window. The device has no valid
    /// identifier until `trigger_report` is run again and succeeds.
    #[error("chain head at {head_timestamp:?} has no matching record; rerun the exposure report")]
    InterruptedReport {
        /// Timestamp of the orphaned head, when it could still be read
        head_timestamp: Option<u64>,
    },
}

impl BeaconError {
    /// Whether this error indicates a bug or corrupt data rather than a
    /// transient condition.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidSeedLength { .. } | Self::InvalidSeedEncoding { .. })
    }

    /// Whether retrying the whole operation may succeed.
    ///
    /// Malformed ciphertext stays malformed, so only failures inside the key
    /// store count as retryable cipher errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) | Self::RegenerationUnverified(_) => true,
            Self::CryptoProviderFailure(e) => e.is_provider_failure(),
            _ => false,
        }
    }
}

impl From<ChainError> for BeaconError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::InvalidSeedLength { expected, actual } => {
                Self::InvalidSeedLength { expected, actual }
            },
            ChainError::InvalidSeedEncoding { reason }
            | ChainError::InvalidIdentifierEncoding { reason } => {
                Self::InvalidSeedEncoding { reason }
            },
        }
    }
}

impl From<StorageError> for BeaconError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupt(chain) => chain.into(),
            other => Self::StoreUnavailable(other),
        }
    }
}
