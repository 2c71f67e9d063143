//! Secure key-storage service abstraction.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory key table only")]

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Arc, Mutex, MutexGuard},
};

use chacha20poly1305::Key;
use crypto_box::{SecretKey, aead::OsRng};

use super::{CipherError, asymmetric::SealedEnvelope, symmetric};

/// Platform secure key-storage service.
///
/// Key material is created inside the service and never returned, except for
/// the public half of a keypair. All cipher primitives that need a private or
/// symmetric key run inside the service.
///
/// # Invariants
///
/// - `generate_key` / `generate_key_pair` replace any key under the alias
/// - The `_if_absent` variants check and create as one step, so concurrent
///   callers agree on a single key
/// - `seal` / `open` require a symmetric key under the alias
/// - `public_key` / `unwrap_sealed` require a keypair under the alias
pub trait SecureKeyStore: Send + Sync {
    /// Whether the service can create and use a device-bound symmetric key.
    fn supports_hardware_backed_symmetric_keys(&self) -> bool;

    /// Whether any key exists under `alias`.
    fn contains_alias(&self, alias: &str) -> Result<bool, CipherError>;

    /// Create a symmetric key under `alias`.
    fn generate_key(&self, alias: &str) -> Result<(), CipherError>;

    /// Create an asymmetric keypair under `alias`.
    fn generate_key_pair(&self, alias: &str) -> Result<(), CipherError>;

    /// Create a symmetric key under `alias` unless any key already exists
    /// there. Returns whether a key was created.
    fn generate_key_if_absent(&self, alias: &str) -> Result<bool, CipherError>;

    /// Create a keypair under `alias` unless any key already exists there.
    /// Returns whether a keypair was created.
    fn generate_key_pair_if_absent(&self, alias: &str) -> Result<bool, CipherError>;

    /// Encrypt with the symmetric key under `alias`.
    fn seal(&self, alias: &str, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Decrypt with the symmetric key under `alias`.
    fn open(&self, alias: &str, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Public half of the keypair under `alias`.
    fn public_key(&self, alias: &str) -> Result<[u8; 32], CipherError>;

    /// Open a [`SealedEnvelope`] with the private half of the keypair under
    /// `alias`.
    fn unwrap_sealed(&self, alias: &str, envelope: &[u8]) -> Result<Vec<u8>, CipherError>;
}

enum StoredKey {
    Symmetric(Key),
    KeyPair(SecretKey),
}

struct MemoryKeyStoreInner {
    keys: HashMap<String, StoredKey>,
    /// Number of successful key or keypair generations
    generations: usize,
}

/// In-process key store for tests and development.
///
/// Keys live in process memory and are lost when the last clone is dropped.
/// The symmetric capability is fixed at construction so both cipher
/// strategies can be exercised on any host. Clones share the same key table.
#[derive(Clone)]
pub struct MemoryKeyStore {
    inner: Arc<Mutex<MemoryKeyStoreInner>>,
    symmetric_keys: bool,
}

impl MemoryKeyStore {
    /// Key store that reports support for device-bound symmetric keys.
    pub fn with_symmetric_support() -> Self {
        Self::new(true)
    }

    /// Key store that only supports keypairs.
    pub fn without_symmetric_support() -> Self {
        Self::new(false)
    }

    fn new(symmetric_keys: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryKeyStoreInner {
                keys: HashMap::new(),
                generations: 0,
            })),
            symmetric_keys,
        }
    }

    /// Number of keys or keypairs generated so far, across all aliases.
    pub fn generation_count(&self) -> Result<usize, CipherError> {
        Ok(self.lock()?.generations)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryKeyStoreInner>, CipherError> {
        self.inner.lock().map_err(|_| CipherError::ProviderFailure {
            reason: "key store lock poisoned".to_string(),
        })
    }

    fn missing(alias: &str, kind: &'static str) -> CipherError {
        CipherError::MissingKey { alias: alias.to_string(), kind }
    }

    fn require_symmetric(&self) -> Result<(), CipherError> {
        if self.symmetric_keys {
            return Ok(());
        }
        Err(CipherError::ProviderFailure {
            reason: "symmetric keys are not supported by this key store".to_string(),
        })
    }

    /// Store `make()` under `alias`. With `replace` unset, an existing key is
    /// kept and `make` is never called.
    fn put(
        &self,
        alias: &str,
        replace: bool,
        make: impl FnOnce() -> StoredKey,
    ) -> Result<bool, CipherError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        match inner.keys.entry(alias.to_string()) {
            Entry::Occupied(_) if !replace => return Ok(false),
            Entry::Occupied(mut slot) => {
                slot.insert(make());
            },
            Entry::Vacant(slot) => {
                slot.insert(make());
            },
        }
        inner.generations += 1;
        Ok(true)
    }
}

fn symmetric_key() -> StoredKey {
    StoredKey::Symmetric(symmetric::generate_key())
}

fn key_pair() -> StoredKey {
    StoredKey::KeyPair(SecretKey::generate(&mut OsRng))
}

impl SecureKeyStore for MemoryKeyStore {
    fn supports_hardware_backed_symmetric_keys(&self) -> bool {
        self.symmetric_keys
    }

    fn contains_alias(&self, alias: &str) -> Result<bool, CipherError> {
        Ok(self.lock()?.keys.contains_key(alias))
    }

    fn generate_key(&self, alias: &str) -> Result<(), CipherError> {
        self.require_symmetric()?;
        self.put(alias, true, symmetric_key)?;
        Ok(())
    }

    fn generate_key_pair(&self, alias: &str) -> Result<(), CipherError> {
        self.put(alias, true, key_pair)?;
        Ok(())
    }

    fn generate_key_if_absent(&self, alias: &str) -> Result<bool, CipherError> {
        self.require_symmetric()?;
        self.put(alias, false, symmetric_key)
    }

    fn generate_key_pair_if_absent(&self, alias: &str) -> Result<bool, CipherError> {
        self.put(alias, false, key_pair)
    }

    fn seal(&self, alias: &str, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let inner = self.lock()?;
        match inner.keys.get(alias) {
            Some(StoredKey::Symmetric(key)) => symmetric::seal_with_key(key, plaintext),
            _ => Err(Self::missing(alias, "symmetric")),
        }
    }

    fn open(&self, alias: &str, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let inner = self.lock()?;
        match inner.keys.get(alias) {
            Some(StoredKey::Symmetric(key)) => symmetric::open_with_key(key, ciphertext),
            _ => Err(Self::missing(alias, "symmetric")),
        }
    }

    fn public_key(&self, alias: &str) -> Result<[u8; 32], CipherError> {
        let inner = self.lock()?;
        match inner.keys.get(alias) {
            Some(StoredKey::KeyPair(secret)) => Ok(*secret.public_key().as_bytes()),
            _ => Err(Self::missing(alias, "asymmetric")),
        }
    }

    fn unwrap_sealed(&self, alias: &str, envelope: &[u8]) -> Result<Vec<u8>, CipherError> {
        let envelope = SealedEnvelope::from_bytes(envelope)?;
        let inner = self.lock()?;
        match inner.keys.get(alias) {
            Some(StoredKey::KeyPair(secret)) => envelope.open(secret),
            _ => Err(Self::missing(alias, "asymmetric")),
        }
    }
}
