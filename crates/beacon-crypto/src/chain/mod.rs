//! Seed chain engine
//!
//! Stateless derivation of seeds and identifiers. Rotation and bulk window
//! reconstruction both go through [`derive_next`], so a chain rebuilt after a
//! report is bit-identical to one produced tick by tick from the same seed.

mod error;
mod ratchet;
mod seed;

pub use error::ChainError;
pub use ratchet::{ChainLink, derive_chain, derive_next, identifiers_from_seed};
pub use seed::{IDENTIFIER_LEN, Identifier, SEED_LEN, Seed};
