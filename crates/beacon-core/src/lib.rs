//! Beacon core: chain record model, rotation clock and environment
//! abstraction.
//!
//! Everything here is synchronous and free of I/O. The node crate drives it
//! from a tokio worker against real stores.
//!
//! ```text
//!   ChainConfig ──validate──► RotationClock ──► boundary arithmetic
//!                                   │
//!   Environment ──now/sleep/rng─────┘
//!                                   ▼
//!                     ChainRecord / ChainHead ──► invariants
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod env;
pub mod error;
pub mod invariants;
pub mod record;

pub use clock::RotationClock;
pub use config::{ChainConfig, DEFAULT_DISCLOSURE_WINDOW, DEFAULT_ROTATION_PERIOD};
pub use env::Environment;
pub use error::ConfigError;
pub use invariants::{InvariantResult, Violation, check_chain};
pub use record::{ChainHead, ChainRecord};
