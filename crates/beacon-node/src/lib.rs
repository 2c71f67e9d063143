//! Beacon node: rotation runtime and persistent chain storage.
//!
//! Wraps the pure chain engine and record model with real I/O: a tokio worker
//! for periodic rotation, redb for durable records, and the system clock and
//! RNG.
//!
//! # Components
//!
//! - [`BeaconManager`]: owned device state; bootstrap, rotation control,
//!   reports and disclosure queries
//! - [`RotationScheduler`]: boundary-aligned worker driving [`Rotator`]
//! - [`ExposureReportHandler`]: destructive window regeneration
//! - [`HeadCache`]: chain head sealed by the at-rest cipher
//! - [`storage`]: record and preference stores (memory, chaotic, redb)
//! - [`SystemEnv`]: production environment (wall clock, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod head;
mod manager;
mod report;
mod scheduler;
pub mod storage;
mod system_env;

pub use error::BeaconError;
pub use head::HeadCache;
pub use manager::{BeaconManager, Bootstrap};
pub use report::{ExposureReportHandler, RegeneratedChain};
pub use scheduler::{RotationScheduler, Rotator, SchedulerState, SkipReason, TickOutcome, Transition};
pub use storage::{
    ChaoticStore, MemoryStore, PreferenceStore, RecordStore, RedbStore, StorageError, StoredHead,
    StoredRecord,
};
pub use system_env::SystemEnv;
