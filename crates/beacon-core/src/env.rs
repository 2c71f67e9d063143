//! Environment abstraction for deterministic testing.
//!
//! Decouples rotation logic from system resources (wall clock, sleeping,
//! randomness). Production uses the real clock and OS entropy; tests run on
//! tokio's paused clock with a seeded RNG so whole disclosure windows can be
//! simulated in milliseconds.

use std::time::Duration;

use beacon_crypto::{SEED_LEN, Seed};
use zeroize::Zeroize;

/// Abstract environment providing wall-clock time, sleeping and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `sleep()` never completes before the requested duration has elapsed on
///   the clock that `wall_clock_millis()` reports
pub trait Environment: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    ///
    /// Rotation boundaries are absolute, so this must be wall-clock time that
    /// other devices agree on, not a process-local monotonic counter.
    fn wall_clock_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by the rotation worker.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Draws a fresh random seed.
    fn random_seed(&self) -> Seed {
        let mut bytes = [0u8; SEED_LEN];
        self.random_bytes(&mut bytes);
        let seed = Seed::from_bytes(bytes);
        bytes.zeroize();
        seed
    }
}
