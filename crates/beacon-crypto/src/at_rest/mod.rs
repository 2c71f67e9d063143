//! At-rest encryption for cached secret material.
//!
//! [`AtRestCipher`] picks one [`CipherStrategy`] when it is constructed, based
//! on a single capability query against the [`SecureKeyStore`], and keeps it
//! for its lifetime. Ciphertext is standard base64 so it can sit in text-only
//! preference stores.
//!
//! Every operation returns a `Result`. "Decrypted to an empty string" is
//! `Ok(String::new())`; a failure is always a [`CipherError`].

mod asymmetric;
mod error;
mod key_store;
mod symmetric;

pub use asymmetric::{AsymmetricStrategy, SealedEnvelope};
use base64::{Engine, engine::general_purpose::STANDARD};
pub use error::CipherError;
pub use key_store::{MemoryKeyStore, SecureKeyStore};
pub use symmetric::SymmetricStrategy;

/// Fixed alias of the application's at-rest key.
pub const KEY_ALIAS: &str = "beacon.at_rest";

/// Which strategy a cipher was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Key store performs symmetric encryption with a device-bound key
    Symmetric,
    /// Local public-key sealing, key store unwraps with the private half
    Asymmetric,
}

/// One way of protecting bytes with keys held by a [`SecureKeyStore`].
pub trait CipherStrategy: Send + Sync {
    /// Strategy discriminant.
    fn kind(&self) -> StrategyKind;

    /// Create the key or keypair if it does not exist yet.
    ///
    /// Idempotent: when the alias already exists no key is generated.
    fn init(&self) -> Result<(), CipherError>;

    /// Encrypt raw bytes.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Decrypt raw bytes produced by [`CipherStrategy::encrypt`].
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Text-in, text-out cipher for cached secrets.
pub struct AtRestCipher {
    strategy: Box<dyn CipherStrategy>,
}

impl AtRestCipher {
    /// Select a strategy from the key store's capabilities.
    ///
    /// The capability is queried exactly once, here.
    pub fn select<K>(store: K) -> Self
    where
        K: SecureKeyStore + 'static,
    {
        let strategy: Box<dyn CipherStrategy> = if store.supports_hardware_backed_symmetric_keys()
        {
            Box::new(SymmetricStrategy::new(store, KEY_ALIAS))
        } else {
            Box::new(AsymmetricStrategy::new(store, KEY_ALIAS))
        };

        Self { strategy }
    }

    /// Use an explicit strategy.
    pub fn with_strategy(strategy: impl CipherStrategy + 'static) -> Self {
        Self { strategy: Box::new(strategy) }
    }

    /// Strategy chosen at construction.
    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Ensure the key or keypair exists. Safe to call repeatedly.
    pub fn init(&self) -> Result<(), CipherError> {
        self.strategy.init()
    }

    /// Encrypt `plaintext` and base64-encode the result.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let ciphertext = self.strategy.encrypt(plaintext.as_bytes())?;
        Ok(STANDARD.encode(ciphertext))
    }

    /// Decode and decrypt output of [`AtRestCipher::encrypt`].
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let bytes = STANDARD
            .decode(ciphertext)
            .map_err(|e| CipherError::MalformedCiphertext { reason: e.to_string() })?;
        let plaintext = self.strategy.decrypt(&bytes)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}

impl std::fmt::Debug for AtRestCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtRestCipher").field("strategy", &self.strategy_kind()).finish()
    }
}
