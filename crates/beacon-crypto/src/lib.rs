//! Beacon Cryptographic Primitives
//!
//! Cryptographic building blocks for the Beacon rotating-identifier core.
//! The seed chain is made of pure functions with deterministic outputs. The
//! at-rest cipher delegates key custody to a [`SecureKeyStore`] and never
//! sees private key material.
//!
//! # Seed Chain
//!
//! Every rotation period the chain advances by one SHA-256 step. The first
//! half of the digest becomes the next secret seed; the second half becomes
//! the identifier that may be broadcast and, after a positive report,
//! disclosed.
//!
//! ```text
//! Seed[i-1]
//!     │
//!     ▼
//! SHA-256 ──► [0..16]  → Seed[i]       (secret, continues the chain)
//!         └─► [16..32] → Identifier[i] (disclosable, UUID formatted)
//! ```
//!
//! # Security
//!
//! One-wayness:
//! - Identifiers reveal nothing about the seed they were derived from
//! - Knowing a seed reveals later identifiers, never earlier ones
//! - Seeds are zeroized on drop and redacted from `Debug`
//!
//! At-rest protection:
//! - Symmetric keys are generated and used inside the key store
//! - Asymmetric fallback encrypts with the public half only; the private half
//!   never leaves the key store
//! - Every failure is reported as a [`CipherError`], never as empty output

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod at_rest;
pub mod chain;

pub use at_rest::{
    AsymmetricStrategy, AtRestCipher, CipherError, CipherStrategy, KEY_ALIAS, MemoryKeyStore,
    SealedEnvelope, SecureKeyStore, StrategyKind, SymmetricStrategy,
};
pub use chain::{
    ChainError, ChainLink, IDENTIFIER_LEN, Identifier, SEED_LEN, Seed, derive_chain, derive_next,
    identifiers_from_seed,
};
