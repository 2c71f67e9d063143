//! Error types for at-rest encryption

use thiserror::Error;

/// Errors from the at-rest cipher and the key store behind it
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Key generation or a cipher primitive failed inside the provider
    #[error("crypto provider failure: {reason}")]
    ProviderFailure {
        /// Provider diagnostic
        reason: String,
    },

    /// No key of the required kind exists under the alias
    #[error("no {kind} key under alias {alias:?}")]
    MissingKey {
        /// Alias that was looked up
        alias: String,
        /// Key kind the caller needed
        kind: &'static str,
    },

    /// Ciphertext is not valid base64 or is structurally truncated
    #[error("malformed ciphertext: {reason}")]
    MalformedCiphertext {
        /// Decoder diagnostic
        reason: String,
    },

    /// Decryption succeeded but the plaintext is not UTF-8
    #[error("decrypted plaintext is not valid UTF-8")]
    InvalidUtf8,
}

impl CipherError {
    /// Returns true if the key store itself failed, as opposed to the input
    /// being malformed.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::ProviderFailure { .. } | Self::MissingKey { .. })
    }
}
