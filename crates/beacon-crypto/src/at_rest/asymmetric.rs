//! Asymmetric fallback strategy.
//!
//! The key store generates an X25519 keypair and only ever hands out the
//! public half. Encryption happens locally against an ephemeral keypair
//! (X25519 + XSalsa20-Poly1305); decryption is delegated back to the store,
//! which holds the private half.

use crypto_box::{
    PublicKey, SalsaBox, SecretKey,
    aead::{Aead, AeadCore, OsRng},
};

use super::{CipherError, CipherStrategy, SecureKeyStore, StrategyKind};

/// X25519 public key size
const PUBLIC_KEY_SIZE: usize = 32;

/// XSalsa20 nonce size
const NONCE_SIZE: usize = 24;

/// Poly1305 tag size
const TAG_SIZE: usize = 16;

/// Strategy used when the platform cannot keep a symmetric key inside its
/// secure service.
pub struct AsymmetricStrategy<K> {
    store: K,
    alias: String,
}

impl<K: SecureKeyStore> AsymmetricStrategy<K> {
    /// Bind the strategy to `alias` in `store`.
    pub fn new(store: K, alias: impl Into<String>) -> Self {
        Self { store, alias: alias.into() }
    }
}

impl<K: SecureKeyStore> CipherStrategy for AsymmetricStrategy<K> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Asymmetric
    }

    fn init(&self) -> Result<(), CipherError> {
        self.store.generate_key_pair_if_absent(&self.alias)?;
        Ok(())
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let public_key = self.store.public_key(&self.alias)?;
        Ok(SealedEnvelope::seal(&public_key, plaintext)?.to_bytes())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.store.unwrap_sealed(&self.alias, ciphertext)
    }
}

/// Envelope sealed to a recipient's X25519 public key.
///
/// Wire layout: `ephemeral_public_key (32) || nonce (24) || ciphertext`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedEnvelope {
    /// Ephemeral X25519 public key (sender side of the key agreement)
    pub ephemeral_public_key: [u8; PUBLIC_KEY_SIZE],
    /// XSalsa20 nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext including the Poly1305 tag
    pub ciphertext: Vec<u8>,
}

impl SealedEnvelope {
    /// Seal `plaintext` to `recipient` using a fresh ephemeral keypair.
    pub fn seal(
        recipient: &[u8; PUBLIC_KEY_SIZE],
        plaintext: &[u8],
    ) -> Result<Self, CipherError> {
        let ephemeral = SecretKey::generate(&mut OsRng);
        let salsa_box = SalsaBox::new(&PublicKey::from(*recipient), &ephemeral);
        let nonce = SalsaBox::generate_nonce(&mut OsRng);

        let ciphertext = salsa_box.encrypt(&nonce, plaintext).map_err(|_| {
            CipherError::ProviderFailure { reason: "envelope seal failed".to_string() }
        })?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(&nonce);

        Ok(Self {
            ephemeral_public_key: *ephemeral.public_key().as_bytes(),
            nonce: nonce_bytes,
            ciphertext,
        })
    }

    /// Open the envelope with the recipient's secret key.
    pub fn open(&self, recipient: &SecretKey) -> Result<Vec<u8>, CipherError> {
        let salsa_box = SalsaBox::new(&PublicKey::from(self.ephemeral_public_key), recipient);

        salsa_box
            .decrypt(crypto_box::Nonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map_err(|_| CipherError::ProviderFailure {
                reason: "envelope open failed (wrong key or tampered data)".to_string(),
            })
    }

    /// Serialize to the wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(PUBLIC_KEY_SIZE + NONCE_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.ephemeral_public_key);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parse the wire layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        let header = PUBLIC_KEY_SIZE + NONCE_SIZE;
        if bytes.len() < header + TAG_SIZE {
            return Err(CipherError::MalformedCiphertext {
                reason: format!(
                    "envelope is {} bytes, need at least {}",
                    bytes.len(),
                    header + TAG_SIZE
                ),
            });
        }

        let mut ephemeral_public_key = [0u8; PUBLIC_KEY_SIZE];
        ephemeral_public_key.copy_from_slice(&bytes[..PUBLIC_KEY_SIZE]);

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[PUBLIC_KEY_SIZE..header]);

        Ok(Self { ephemeral_public_key, nonce, ciphertext: bytes[header..].to_vec() })
    }
}
