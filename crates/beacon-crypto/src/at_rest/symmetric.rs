//! Symmetric strategy: the key store owns a device-bound key and performs
//! the cipher operations itself.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};

use super::{CipherError, CipherStrategy, SecureKeyStore, StrategyKind};

/// XChaCha20 nonce size (24 bytes)
const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
const TAG_SIZE: usize = 16;

/// Strategy used when the platform can hold a symmetric key that never
/// leaves its secure service.
pub struct SymmetricStrategy<K> {
    store: K,
    alias: String,
}

impl<K: SecureKeyStore> SymmetricStrategy<K> {
    /// Bind the strategy to `alias` in `store`.
    pub fn new(store: K, alias: impl Into<String>) -> Self {
        Self { store, alias: alias.into() }
    }
}

impl<K: SecureKeyStore> CipherStrategy for SymmetricStrategy<K> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Symmetric
    }

    fn init(&self) -> Result<(), CipherError> {
        self.store.generate_key_if_absent(&self.alias)?;
        Ok(())
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.store.seal(&self.alias, plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.store.open(&self.alias, ciphertext)
    }
}

/// Generate a fresh XChaCha20-Poly1305 key.
pub(crate) fn generate_key() -> Key {
    XChaCha20Poly1305::generate_key(&mut OsRng)
}

/// Encrypt under `key` with a random nonce.
///
/// Output layout: `nonce (24) || ciphertext || tag (16)`.
pub(crate) fn seal_with_key(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = XChaCha20Poly1305::new(key);
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher.encrypt(&nonce, plaintext).map_err(|_| CipherError::ProviderFailure {
        reason: "symmetric encryption failed".to_string(),
    })?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt output of [`seal_with_key`].
pub(crate) fn open_with_key(key: &Key, sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CipherError::MalformedCiphertext {
            reason: format!(
                "sealed data is {} bytes, need at least {}",
                sealed.len(),
                NONCE_SIZE + TAG_SIZE
            ),
        });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key);

    cipher.decrypt(XNonce::from_slice(nonce), ciphertext).map_err(|_| {
        CipherError::ProviderFailure { reason: "symmetric authentication failed".to_string() }
    })
}
